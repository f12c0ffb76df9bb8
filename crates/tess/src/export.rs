use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::mesh::TriangleMesh;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Obj,
    Off,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Obj => "obj",
            ExportFormat::Off => "off",
        }
    }

    pub fn parse(text: &str) -> Option<ExportFormat> {
        match text.to_ascii_lowercase().as_str() {
            "obj" => Some(ExportFormat::Obj),
            "off" => Some(ExportFormat::Off),
            _ => None,
        }
    }
}

/// Provenance comments written at the top of exported files.
#[derive(Debug, Clone, Copy)]
pub struct ExportInfo<'a> {
    pub tool: &'a str,
    pub version: &'a str,
    pub source: &'a str,
    pub level: f32,
}

fn write_header(file: &mut File, info: &ExportInfo) -> Result<(), String> {
    writeln!(file, "# Mesh generated with {} {}", info.tool, info.version)
        .map_err(|err| err.to_string())?;
    writeln!(file, "# Source: {}", info.source).map_err(|err| err.to_string())?;
    writeln!(file, "# Level of subdivision applied: {}", info.level)
        .map_err(|err| err.to_string())?;
    Ok(())
}

pub fn write_obj(path: &Path, mesh: &TriangleMesh, info: &ExportInfo) -> Result<(), String> {
    let mut file = File::create(path).map_err(|err| err.to_string())?;
    write_header(&mut file, info)?;

    for p in &mesh.positions {
        writeln!(file, "v {} {} {}", p[0], p[1], p[2]).map_err(|err| err.to_string())?;
    }
    let has_normals = mesh
        .normals
        .as_ref()
        .is_some_and(|normals| normals.len() == mesh.positions.len());
    if let Some(normals) = mesh.normals.as_ref().filter(|_| has_normals) {
        for n in normals {
            writeln!(file, "vn {} {} {}", n[0], n[1], n[2]).map_err(|err| err.to_string())?;
        }
    }
    for triangle in mesh.indices.chunks_exact(3) {
        let (a, b, c) = (triangle[0] + 1, triangle[1] + 1, triangle[2] + 1);
        if has_normals {
            writeln!(file, "f {}//{} {}//{} {}//{}", a, a, b, b, c, c)
                .map_err(|err| err.to_string())?;
        } else {
            writeln!(file, "f {} {} {}", a, b, c).map_err(|err| err.to_string())?;
        }
    }

    tracing::info!(
        path = %path.display(),
        vertices = mesh.positions.len(),
        triangles = mesh.triangle_count(),
        "Wrote obj file"
    );
    Ok(())
}

pub fn write_off(path: &Path, mesh: &TriangleMesh, info: &ExportInfo) -> Result<(), String> {
    let mut file = File::create(path).map_err(|err| err.to_string())?;
    writeln!(file, "OFF").map_err(|err| err.to_string())?;
    write_header(&mut file, info)?;

    writeln!(
        file,
        "{} {} 0",
        mesh.positions.len(),
        mesh.triangle_count()
    )
    .map_err(|err| err.to_string())?;
    for p in &mesh.positions {
        writeln!(file, "{} {} {}", p[0], p[1], p[2]).map_err(|err| err.to_string())?;
    }
    for triangle in mesh.indices.chunks_exact(3) {
        writeln!(file, "3 {} {} {}", triangle[0], triangle[1], triangle[2])
            .map_err(|err| err.to_string())?;
    }

    tracing::info!(
        path = %path.display(),
        vertices = mesh.positions.len(),
        triangles = mesh.triangle_count(),
        "Wrote off file"
    );
    Ok(())
}
