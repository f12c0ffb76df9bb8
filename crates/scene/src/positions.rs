use std::path::Path;

use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

/// One named camera pose.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPosition {
    pub name: String,
    pub position: Vec3,
    pub radius: f32,
    pub rotation: Mat3,
}

#[derive(Debug)]
pub enum PositionsError {
    Read { path: String, message: String },
    Write { path: String, message: String },
    Malformed { message: String },
}

impl PositionsError {
    pub fn message(&self) -> String {
        match self {
            PositionsError::Read { path, message } => {
                format!("Cannot read camera positions from {path}: {message}")
            }
            PositionsError::Write { path, message } => {
                format!("Cannot write camera positions to {path}: {message}")
            }
            PositionsError::Malformed { message } => {
                format!("Malformed camera positions file: {message}")
            }
        }
    }
}

// Numeric fields are stored as decimal strings; Rust's float formatting is
// locale-independent and the shortest form round-trips exactly.
#[derive(Debug, Serialize, Deserialize)]
struct PositionsFile {
    filename: String,
    positions: Vec<PositionEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PositionEntry {
    name: String,
    position: String,
    radius: String,
    rotation: String,
}

fn encode_floats(values: &[f32]) -> String {
    values
        .iter()
        .map(|v| format!("{v}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn decode_floats(text: &str, expected: usize, field: &str) -> Result<Vec<f32>, PositionsError> {
    let values = text
        .split(',')
        .map(|token| token.trim().parse::<f32>())
        .collect::<Result<Vec<f32>, _>>()
        .map_err(|err| PositionsError::Malformed {
            message: format!("bad {field} value \"{text}\": {err}"),
        })?;
    if values.len() != expected {
        return Err(PositionsError::Malformed {
            message: format!(
                "{field} needs {expected} values, found {} in \"{text}\"",
                values.len()
            ),
        });
    }
    Ok(values)
}

pub fn save_positions(
    path: &Path,
    dataset_name: &str,
    positions: &[CameraPosition],
) -> Result<(), PositionsError> {
    let file = PositionsFile {
        filename: dataset_name.to_string(),
        positions: positions
            .iter()
            .map(|p| PositionEntry {
                name: p.name.clone(),
                position: encode_floats(&p.position.to_array()),
                radius: format!("{}", p.radius),
                rotation: encode_floats(&p.rotation.to_cols_array()),
            })
            .collect(),
    };
    let data = serde_json::to_vec_pretty(&file).map_err(|err| PositionsError::Malformed {
        message: err.to_string(),
    })?;
    std::fs::write(path, data).map_err(|err| PositionsError::Write {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    tracing::info!(path = %path.display(), count = positions.len(), "camera positions saved");
    Ok(())
}

/// Loads a positions file. A `filename` that does not match the current
/// dataset is only a warning; the poses still load.
pub fn load_positions(
    path: &Path,
    dataset_name: &str,
) -> Result<Vec<CameraPosition>, PositionsError> {
    let data = std::fs::read(path).map_err(|err| PositionsError::Read {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    let file: PositionsFile =
        serde_json::from_slice(&data).map_err(|err| PositionsError::Malformed {
            message: err.to_string(),
        })?;

    if file.filename != dataset_name {
        tracing::warn!(
            saved_for = %file.filename,
            current = %dataset_name,
            "camera positions were saved for a different dataset"
        );
    }

    let mut positions = Vec::with_capacity(file.positions.len());
    for entry in &file.positions {
        let p = decode_floats(&entry.position, 3, "position")?;
        let radius = entry
            .radius
            .trim()
            .parse::<f32>()
            .map_err(|err| PositionsError::Malformed {
                message: format!("bad radius value \"{}\": {err}", entry.radius),
            })?;
        let r = decode_floats(&entry.rotation, 9, "rotation")?;
        let mut cols = [0.0f32; 9];
        cols.copy_from_slice(&r);
        positions.push(CameraPosition {
            name: entry.name.clone(),
            position: Vec3::new(p[0], p[1], p[2]),
            radius,
            rotation: Mat3::from_cols_array(&cols),
        });
    }
    tracing::info!(path = %path.display(), count = positions.len(), "camera positions loaded");
    Ok(positions)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_positions() -> Vec<CameraPosition> {
        vec![
            CameraPosition {
                name: "overview".to_string(),
                position: Vec3::new(0.1 + 0.2, -37.25, 1.0e-7),
                radius: 123.456,
                rotation: Mat3::from_rotation_y(0.7531),
            },
            CameraPosition {
                name: "detail".to_string(),
                position: Vec3::new(5.0, 6.0, 7.0),
                radius: 0.25,
                rotation: Mat3::IDENTITY,
            },
        ]
    }

    #[test]
    fn round_trip_preserves_exact_values() {
        let path = std::env::temp_dir().join("neurotess_positions_roundtrip.json");
        let original = sample_positions();
        save_positions(&path, "circuit.xml", &original).expect("save");
        let loaded = load_positions(&path, "circuit.xml").expect("load");
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, original);
    }

    #[test]
    fn mismatched_dataset_name_still_loads() {
        let path = std::env::temp_dir().join("neurotess_positions_mismatch.json");
        save_positions(&path, "other.xml", &sample_positions()).expect("save");
        let loaded = load_positions(&path, "current.xml").expect("load");
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded.len(), 2);
    }

    #[test]
    fn malformed_rotation_fails_the_load() {
        let path = std::env::temp_dir().join("neurotess_positions_bad.json");
        let json = r#"{
            "filename": "x.swc",
            "positions": [{
                "name": "broken",
                "position": "1,2,3",
                "radius": "4",
                "rotation": "1,0,0,0,1,0"
            }]
        }"#;
        std::fs::write(&path, json).expect("write fixture");
        let err = load_positions(&path, "x.swc").unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(matches!(err, PositionsError::Malformed { .. }));
        assert!(err.message().contains("rotation"));
    }

    #[test]
    fn missing_file_reports_a_read_error() {
        let path = std::env::temp_dir().join("neurotess_positions_missing.json");
        let err = load_positions(&path, "x.swc").unwrap_err();
        assert!(matches!(err, PositionsError::Read { .. }));
    }

    #[test]
    fn unparsable_number_reports_the_field() {
        let path = std::env::temp_dir().join("neurotess_positions_nan.json");
        let json = r#"{
            "filename": "x.swc",
            "positions": [{
                "name": "broken",
                "position": "1,zwei,3",
                "radius": "4",
                "rotation": "1,0,0,0,1,0,0,0,1"
            }]
        }"#;
        std::fs::write(&path, json).expect("write fixture");
        let err = load_positions(&path, "x.swc").unwrap_err();
        std::fs::remove_file(&path).ok();
        assert!(err.message().contains("position"));
    }
}
