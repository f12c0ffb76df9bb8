use std::sync::Arc;

use glam::Mat4;

use morpho::MorphologyId;
use tess::{PatchMesh, TessellationParams};

/// One neuron instance scheduled for drawing: a shared patch mesh placed by
/// its model transform, with the already-resolved instance color and the
/// visibility flags of the batch it came from.
#[derive(Clone)]
pub struct RenderInstance {
    pub mesh_id: MorphologyId,
    pub mesh: Arc<PatchMesh>,
    pub model: Mat4,
    pub color: [f32; 3],
    pub soma: bool,
    pub neurites: bool,
}

/// Immutable snapshot the UI hands to the renderer. Meshes are shared Arcs,
/// so building one per frame stays cheap; the live camera arrives with each
/// paint callback instead.
#[derive(Clone)]
pub struct RenderScene {
    pub instances: Vec<RenderInstance>,
    pub background: [f32; 3],
    pub params: TessellationParams,
}

impl RenderScene {
    pub fn empty() -> Self {
        Self {
            instances: Vec::new(),
            background: [0.15, 0.15, 0.17],
            params: TessellationParams::default(),
        }
    }
}
