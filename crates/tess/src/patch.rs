use glam::Vec3;

/// One corner of a quad patch. `position` lies on the coarse surface,
/// `center` on the skeleton axis (the soma center for soma patches), and
/// `tangent` along the axis (zero on the soma). Refinement re-projects
/// interpolated vertices to the interpolated radius around `center`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatchVertex {
    pub position: Vec3,
    pub center: Vec3,
    pub tangent: Vec3,
}

impl PatchVertex {
    pub fn radius(&self) -> f32 {
        (self.position - self.center).length()
    }
}

/// Corners in grid order: (u0 v0), (u1 v0), (u1 v1), (u0 v1), with u running
/// around the tube and v along the axis. Winding is counter-clockwise seen
/// from outside.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuadPatch {
    pub corners: [PatchVertex; 4],
}

/// Generated surface for one morphology: soma and neurite patches kept
/// apart so each can be shown or refined on its own.
#[derive(Debug, Clone, Default)]
pub struct PatchMesh {
    pub soma_patches: Vec<QuadPatch>,
    pub neurite_patches: Vec<QuadPatch>,
}

impl PatchMesh {
    pub fn patch_count(&self) -> usize {
        self.soma_patches.len() + self.neurite_patches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.soma_patches.is_empty() && self.neurite_patches.is_empty()
    }
}
