use std::collections::HashMap;

use glam::{Mat4, Vec3};
use morpho::Aabb;

/// Refined triangle mesh, the output of patch tessellation and the unit of
/// GPU upload and export.
#[derive(Debug, Clone, Default)]
pub struct TriangleMesh {
    pub positions: Vec<[f32; 3]>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub indices: Vec<u32>,
}

impl TriangleMesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_positions_indices(positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            normals: None,
            indices,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn bounds(&self) -> Option<Aabb> {
        Aabb::from_points(self.positions.iter().map(|p| Vec3::from(*p)))
    }

    pub fn compute_normals(&mut self) -> bool {
        if self.indices.len() % 3 != 0 || self.positions.is_empty() {
            return false;
        }

        let mut accum = vec![Vec3::ZERO; self.positions.len()];
        for tri in self.indices.chunks_exact(3) {
            let i0 = tri[0] as usize;
            let i1 = tri[1] as usize;
            let i2 = tri[2] as usize;
            if i0 >= self.positions.len()
                || i1 >= self.positions.len()
                || i2 >= self.positions.len()
            {
                continue;
            }
            let p0 = Vec3::from(self.positions[i0]);
            let p1 = Vec3::from(self.positions[i1]);
            let p2 = Vec3::from(self.positions[i2]);
            let normal = (p1 - p0).cross(p2 - p0);
            accum[i0] += normal;
            accum[i1] += normal;
            accum[i2] += normal;
        }

        let normals = accum
            .into_iter()
            .map(|n| {
                let len = n.length();
                if len > 0.0 {
                    (n / len).to_array()
                } else {
                    [0.0, 1.0, 0.0]
                }
            })
            .collect();
        self.normals = Some(normals);
        true
    }

    pub fn transform(&mut self, matrix: Mat4) {
        for p in &mut self.positions {
            *p = matrix.transform_point3(Vec3::from(*p)).to_array();
        }
        if let Some(normals) = &mut self.normals {
            let normal_matrix = matrix.inverse().transpose();
            for n in normals {
                let v = normal_matrix.transform_vector3(Vec3::from(*n));
                let len = v.length();
                *n = if len > 0.0 {
                    (v / len).to_array()
                } else {
                    [0.0, 1.0, 0.0]
                };
            }
        }
    }

    pub fn merge(meshes: &[TriangleMesh]) -> TriangleMesh {
        let mut merged = TriangleMesh::default();
        let include_normals = meshes.iter().all(|m| m.normals.is_some());
        let mut offset = 0u32;

        for mesh in meshes {
            merged.positions.extend_from_slice(&mesh.positions);
            merged.indices.extend(mesh.indices.iter().map(|i| i + offset));
            offset += mesh.positions.len() as u32;
        }
        if include_normals {
            let mut normals = Vec::new();
            for mesh in meshes {
                if let Some(n) = &mesh.normals {
                    normals.extend_from_slice(n);
                }
            }
            merged.normals = Some(normals);
        }
        merged
    }

    /// Merge vertices that land on the same quantized position. Normals are
    /// re-averaged over the merged vertex; degenerate triangles produced by
    /// the merge are dropped.
    pub fn weld(&mut self) {
        if self.positions.is_empty() {
            return;
        }

        let mut first_at: HashMap<(i32, i32, i32), u32> = HashMap::new();
        let mut remap = vec![0u32; self.positions.len()];
        let mut positions = Vec::with_capacity(self.positions.len());
        let mut normal_sums: Vec<Vec3> = Vec::new();
        let normals = self.normals.take();

        for (index, p) in self.positions.iter().enumerate() {
            let key = quantize_position(*p);
            let target = *first_at.entry(key).or_insert_with(|| {
                positions.push(*p);
                normal_sums.push(Vec3::ZERO);
                (positions.len() - 1) as u32
            });
            remap[index] = target;
            if let Some(normals) = &normals {
                normal_sums[target as usize] += Vec3::from(normals[index]);
            }
        }

        let mut indices = Vec::with_capacity(self.indices.len());
        for tri in self.indices.chunks_exact(3) {
            let a = remap[tri[0] as usize];
            let b = remap[tri[1] as usize];
            let c = remap[tri[2] as usize];
            if a == b || b == c || a == c {
                continue;
            }
            indices.extend_from_slice(&[a, b, c]);
        }

        self.positions = positions;
        self.indices = indices;
        if normals.is_some() {
            self.normals = Some(
                normal_sums
                    .into_iter()
                    .map(|n| {
                        let len = n.length();
                        if len > 0.0 {
                            (n / len).to_array()
                        } else {
                            [0.0, 1.0, 0.0]
                        }
                    })
                    .collect(),
            );
        }
    }
}

fn quantize_position(position: [f32; 3]) -> (i32, i32, i32) {
    let epsilon = 1.0e-5;
    (
        (position[0] / epsilon).round() as i32,
        (position[1] / epsilon).round() as i32,
        (position[2] / epsilon).round() as i32,
    )
}
