use std::collections::hash_map::{DefaultHasher, Entry};
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use egui_wgpu::wgpu;
use egui_wgpu::wgpu::util::DeviceExt as _;
use glam::Mat4;
use morpho::MorphologyId;
use tess::{refinement_signature, PatchMesh, RefineContext, TessellationParams, TriangleMesh};

/// Interleaved layout shared by the fill and wireframe pipelines.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

pub const MESH_VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 2] =
    wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

/// Morphology id plus the refinement signature its buffers were built for.
pub type MeshKey = (MorphologyId, u64);

pub struct GpuMeshEntry {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
    pub line_buffer: wgpu::Buffer,
    pub line_count: u32,
    pub vertex_count: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct GpuMeshCacheStats {
    pub hits: u64,
    pub misses: u64,
    pub uploads: u64,
    pub mesh_count: u32,
}

pub struct GpuMeshCache {
    entries: HashMap<MeshKey, GpuMeshEntry>,
    hits: u64,
    misses: u64,
    uploads: u64,
}

impl GpuMeshCache {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
            uploads: 0,
        }
    }

    /// Returns the entry for `key`, refining and uploading on a miss.
    pub fn ensure(
        &mut self,
        device: &wgpu::Device,
        key: MeshKey,
        refine: impl FnOnce() -> TriangleMesh,
    ) -> &GpuMeshEntry {
        match self.entries.entry(key) {
            Entry::Occupied(slot) => {
                self.hits += 1;
                slot.into_mut()
            }
            Entry::Vacant(slot) => {
                self.misses += 1;
                self.uploads += 1;
                slot.insert(upload(device, &refine()))
            }
        }
    }

    pub fn entry(&self, key: &MeshKey) -> Option<&GpuMeshEntry> {
        self.entries.get(key)
    }

    /// Drops every entry whose key is not in `live`. Called once per
    /// prepare pass so stale signatures do not pin GPU memory.
    pub fn retain(&mut self, live: &HashSet<MeshKey>) {
        self.entries.retain(|key, _| live.contains(key));
    }

    pub fn stats_snapshot(&self) -> GpuMeshCacheStats {
        GpuMeshCacheStats {
            hits: self.hits,
            misses: self.misses,
            uploads: self.uploads,
            mesh_count: self.entries.len() as u32,
        }
    }
}

/// Cache key half for one instance. The patch mesh pointer stands in for
/// its content: edits replace the whole `Arc`, so a regenerated mesh gets
/// a fresh signature even when the refinement inputs did not move.
pub fn mesh_signature(
    mesh: &Arc<PatchMesh>,
    params: &TessellationParams,
    context: Option<&RefineContext>,
    model: Mat4,
    include_soma: bool,
    include_neurites: bool,
) -> u64 {
    let mut hasher = DefaultHasher::new();
    (Arc::as_ptr(mesh) as usize).hash(&mut hasher);
    refinement_signature(mesh, params, context, model, include_soma, include_neurites)
        .hash(&mut hasher);
    hasher.finish()
}

fn upload(device: &wgpu::Device, mesh: &TriangleMesh) -> GpuMeshEntry {
    let vertices = vertex_data(mesh);
    let lines = line_indices(&mesh.indices);
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("neurotess_mesh_vertices"),
        contents: bytemuck::cast_slice(&vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("neurotess_mesh_indices"),
        contents: bytemuck::cast_slice(&mesh.indices),
        usage: wgpu::BufferUsages::INDEX,
    });
    let line_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("neurotess_mesh_lines"),
        contents: bytemuck::cast_slice(&lines),
        usage: wgpu::BufferUsages::INDEX,
    });
    GpuMeshEntry {
        vertex_buffer,
        index_buffer,
        index_count: mesh.indices.len() as u32,
        line_buffer,
        line_count: lines.len() as u32,
        vertex_count: vertices.len() as u32,
    }
}

fn vertex_data(mesh: &TriangleMesh) -> Vec<MeshVertex> {
    mesh.positions
        .iter()
        .enumerate()
        .map(|(i, position)| MeshVertex {
            position: *position,
            normal: mesh
                .normals
                .as_ref()
                .and_then(|normals| normals.get(i))
                .copied()
                .unwrap_or([0.0, 0.0, 1.0]),
        })
        .collect()
}

/// Unique undirected edges of the triangle list, as a line-list index
/// buffer. Shared edges appear once.
fn line_indices(indices: &[u32]) -> Vec<u32> {
    let mut seen = HashSet::with_capacity(indices.len());
    let mut lines = Vec::with_capacity(indices.len() * 2);
    for triangle in indices.chunks_exact(3) {
        let edges = [
            (triangle[0], triangle[1]),
            (triangle[1], triangle[2]),
            (triangle[2], triangle[0]),
        ];
        for (a, b) in edges {
            if seen.insert((a.min(b), a.max(b))) {
                lines.push(a);
                lines.push(b);
            }
        }
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use morpho::{Morphology, Sample, Soma};
    use tess::generate_mesh;

    fn ball(radius: f32) -> Arc<PatchMesh> {
        let morphology = Morphology::new(
            MorphologyId(0),
            Soma {
                samples: vec![Sample {
                    position: Vec3::ZERO,
                    radius,
                }],
            },
            Vec::new(),
        );
        Arc::new(generate_mesh(&morphology).expect("mesh"))
    }

    #[test]
    fn shared_edges_are_emitted_once() {
        // Two triangles over a quad: five edges, not six.
        let lines = line_indices(&[0, 1, 2, 0, 2, 3]);
        assert_eq!(lines.len(), 10);
        let edges: HashSet<(u32, u32)> = lines
            .chunks_exact(2)
            .map(|pair| (pair[0].min(pair[1]), pair[0].max(pair[1])))
            .collect();
        assert_eq!(edges.len(), 5);
        assert!(edges.contains(&(0, 2)));
    }

    #[test]
    fn vertex_data_interleaves_positions_and_normals() {
        let mesh = TriangleMesh {
            positions: vec![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]],
            normals: Some(vec![[0.0, 1.0, 0.0], [1.0, 0.0, 0.0]]),
            indices: vec![],
        };
        let vertices = vertex_data(&mesh);
        assert_eq!(vertices.len(), 2);
        assert_eq!(vertices[0].position, [1.0, 2.0, 3.0]);
        assert_eq!(vertices[1].normal, [1.0, 0.0, 0.0]);

        let bare = TriangleMesh {
            positions: vec![[0.0; 3]],
            normals: None,
            indices: vec![],
        };
        assert_eq!(vertex_data(&bare)[0].normal, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn signature_is_stable_per_mesh_pointer() {
        let mesh = ball(2.0);
        let params = TessellationParams::default();

        let a = mesh_signature(&mesh, &params, None, Mat4::IDENTITY, true, true);
        let b = mesh_signature(&mesh, &params, None, Mat4::IDENTITY, true, true);
        assert_eq!(a, b);

        // Same content behind a different pointer reads as a new mesh.
        let regenerated = Arc::new(mesh.as_ref().clone());
        assert_ne!(
            a,
            mesh_signature(&regenerated, &params, None, Mat4::IDENTITY, true, true)
        );

        assert_ne!(
            a,
            mesh_signature(&mesh, &params, None, Mat4::IDENTITY, true, false)
        );
    }
}
