use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use glam::Vec3;

use crate::dataset::Dataset;
use crate::morphology::{Morphology, MorphologyId, Neurite, NeuriteKind, Sample, Section, Soma};
use crate::neuron::Neuron;

#[derive(Debug)]
pub enum SwcError {
    Read { path: String, message: String },
    Malformed { line: usize, message: String },
    UnknownParent { line: usize, parent: i64 },
    DuplicateId { line: usize, id: i64 },
    Disconnected { count: usize },
}

impl SwcError {
    pub fn message(&self) -> String {
        match self {
            SwcError::Read { path, message } => format!("Cannot read {path}: {message}"),
            SwcError::Malformed { line, message } => format!("SWC line {line}: {message}"),
            SwcError::UnknownParent { line, parent } => {
                format!("SWC line {line}: parent {parent} is not defined")
            }
            SwcError::DuplicateId { line, id } => {
                format!("SWC line {line}: duplicate sample id {id}")
            }
            SwcError::Disconnected { count } => {
                format!("SWC file has {count} samples unreachable from any root")
            }
        }
    }
}

struct Row {
    line: usize,
    kind: i32,
    sample: Sample,
    parent: i64,
}

const SOMA_KIND: i32 = 1;
const AXON_KIND: i32 = 2;
const APICAL_KIND: i32 = 4;

/// Parse SWC text: `id type x y z radius parent` per row, `#` comments.
/// A morphology without soma rows parses; mesh generation rejects it later.
pub fn parse_swc(source: &str, id: MorphologyId) -> Result<Morphology, SwcError> {
    let mut rows: BTreeMap<i64, Row> = BTreeMap::new();

    for (index, raw) in source.lines().enumerate() {
        let line = index + 1;
        let text = match raw.find('#') {
            Some(pos) => &raw[..pos],
            None => raw,
        };
        if text.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() != 7 {
            return Err(SwcError::Malformed {
                line,
                message: format!("expected 7 fields, found {}", fields.len()),
            });
        }

        let sample_id = parse_int(fields[0], line, "sample id")?;
        let kind = parse_int(fields[1], line, "type")? as i32;
        let x = parse_float(fields[2], line, "x")?;
        let y = parse_float(fields[3], line, "y")?;
        let z = parse_float(fields[4], line, "z")?;
        let radius = parse_float(fields[5], line, "radius")?;
        let parent = parse_int(fields[6], line, "parent")?;

        let row = Row {
            line,
            kind,
            sample: Sample {
                position: Vec3::new(x, y, z),
                radius: radius.max(0.0),
            },
            parent,
        };
        if rows.insert(sample_id, row).is_some() {
            return Err(SwcError::DuplicateId {
                line,
                id: sample_id,
            });
        }
    }

    let mut soma = Soma::default();
    let mut children: BTreeMap<i64, Vec<i64>> = BTreeMap::new();
    let mut roots: Vec<i64> = Vec::new();
    let mut neurite_rows = 0usize;

    for (&sample_id, row) in &rows {
        if row.kind == SOMA_KIND {
            soma.samples.push(row.sample);
            continue;
        }
        neurite_rows += 1;

        if row.parent < 0 {
            roots.push(sample_id);
            continue;
        }
        match rows.get(&row.parent) {
            Some(parent) if parent.kind == SOMA_KIND => roots.push(sample_id),
            Some(_) => children.entry(row.parent).or_default().push(sample_id),
            None => {
                return Err(SwcError::UnknownParent {
                    line: row.line,
                    parent: row.parent,
                })
            }
        }
    }

    if soma.is_empty() {
        tracing::warn!("SWC morphology has no soma samples");
    }

    let mut neurites = Vec::new();
    let mut visited = 0usize;
    for root in roots {
        let kind = match rows[&root].kind {
            AXON_KIND => NeuriteKind::Axon,
            APICAL_KIND => NeuriteKind::ApicalDendrite,
            _ => NeuriteKind::BasalDendrite,
        };
        let sections = build_sections(root, &rows, &children, &mut visited);
        neurites.push(Neurite { kind, sections });
    }

    if visited < neurite_rows {
        return Err(SwcError::Disconnected {
            count: neurite_rows - visited,
        });
    }

    Ok(Morphology::new(id, soma, neurites))
}

/// Walk one neurite tree into sections, splitting at branch points. Child
/// sections repeat the branch sample so surfaces stay connected.
fn build_sections(
    root: i64,
    rows: &BTreeMap<i64, Row>,
    children: &BTreeMap<i64, Vec<i64>>,
    visited: &mut usize,
) -> Vec<Section> {
    let mut sections: Vec<Section> = Vec::new();
    let mut stack: Vec<(i64, Option<Sample>, Option<usize>)> = vec![(root, None, None)];

    while let Some((start, seed, parent_section)) = stack.pop() {
        let mut samples = Vec::new();
        if let Some(seed) = seed {
            samples.push(seed);
        }

        let mut node = start;
        let branch_children = loop {
            samples.push(rows[&node].sample);
            *visited += 1;
            match children.get(&node).map(Vec::as_slice) {
                Some([only]) => node = *only,
                Some(rest) => break rest,
                None => break &[],
            }
        };

        let index = sections.len();
        sections.push(Section {
            samples,
            parent: parent_section,
            children: Vec::new(),
        });
        if let Some(parent) = parent_section {
            sections[parent].children.push(index);
        }

        let last = sections[index].samples.last().copied();
        for &child in branch_children.iter().rev() {
            stack.push((child, last, Some(index)));
        }
    }

    sections
}

fn parse_int(text: &str, line: usize, what: &str) -> Result<i64, SwcError> {
    text.parse::<i64>().map_err(|_| SwcError::Malformed {
        line,
        message: format!("cannot parse {what} from {text:?}"),
    })
}

fn parse_float(text: &str, line: usize, what: &str) -> Result<f32, SwcError> {
    let value = text.parse::<f32>().map_err(|_| SwcError::Malformed {
        line,
        message: format!("cannot parse {what} from {text:?}"),
    })?;
    if !value.is_finite() {
        return Err(SwcError::Malformed {
            line,
            message: format!("{what} is not finite"),
        });
    }
    Ok(value)
}

pub fn load_swc(path: &Path, id: MorphologyId) -> Result<Morphology, SwcError> {
    let source = std::fs::read_to_string(path).map_err(|err| SwcError::Read {
        path: path.display().to_string(),
        message: err.to_string(),
    })?;
    let morphology = parse_swc(&source, id)?;
    tracing::info!(
        path = %path.display(),
        samples = morphology.sample_count(),
        sections = morphology.section_count(),
        "Loaded SWC morphology"
    );
    Ok(morphology)
}

/// One SWC file is one morphology placed once: gid 1, identity transform.
pub fn load_swc_dataset(path: &Path) -> Result<Dataset, SwcError> {
    let morphology = Arc::new(load_swc(path, MorphologyId(0))?);
    let mut dataset = Dataset::new();
    dataset.morphologies.push(morphology.clone());
    let _ = dataset.add_neuron(Neuron::new(1, morphology));
    dataset.source = Some(path.to_path_buf());
    Ok(dataset)
}
