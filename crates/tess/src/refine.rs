use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use glam::{Mat4, Vec3};

use crate::mesh::TriangleMesh;
use crate::patch::{PatchMesh, PatchVertex, QuadPatch};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubdivisionCriterion {
    /// Same subdivision everywhere.
    Homogeneous,
    /// Subdivision falls off with distance from the camera.
    CameraDistance,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TessellationParams {
    /// Subdivision level, 0.1 to 3.0. Ten times the per-edge segment count.
    pub level: f32,
    /// Distance cutoff as a fraction of the far plane, 0 to 1.
    pub max_distance: f32,
    pub criterion: SubdivisionCriterion,
}

impl Default for TessellationParams {
    fn default() -> Self {
        Self {
            level: 0.4,
            max_distance: 0.01,
            criterion: SubdivisionCriterion::Homogeneous,
        }
    }
}

impl TessellationParams {
    fn base_segments(&self) -> u32 {
        ((self.level * 10.0).round() as i64).clamp(1, 64) as u32
    }
}

/// Camera state the distance criterion samples.
#[derive(Debug, Clone, Copy)]
pub struct RefineContext {
    pub eye: Vec3,
    pub far_plane: f32,
}

/// Tessellate patches into triangles in morphology-local space. The model
/// matrix only enters the distance criterion.
pub fn refine_patches(
    patches: &[QuadPatch],
    params: &TessellationParams,
    context: Option<&RefineContext>,
    model: Mat4,
) -> TriangleMesh {
    let mut out = TriangleMesh::new();
    emit_patches(patches, params, context, &model, &mut out);
    out.weld();
    out
}

pub fn refine_mesh(
    mesh: &PatchMesh,
    params: &TessellationParams,
    context: Option<&RefineContext>,
    model: Mat4,
    include_soma: bool,
    include_neurites: bool,
) -> TriangleMesh {
    let mut out = TriangleMesh::new();
    if include_soma {
        emit_patches(&mesh.soma_patches, params, context, &model, &mut out);
    }
    if include_neurites {
        emit_patches(&mesh.neurite_patches, params, context, &model, &mut out);
    }
    out.weld();
    out
}

/// Hash of everything the refinement of one patch mesh depends on: the
/// included patch groups and every corner's subdivision level. Equal
/// signatures mean `refine_mesh` would emit the same triangles, which lets
/// caches skip re-refining until the camera moves far enough to change a
/// level.
pub fn refinement_signature(
    mesh: &PatchMesh,
    params: &TessellationParams,
    context: Option<&RefineContext>,
    model: Mat4,
    include_soma: bool,
    include_neurites: bool,
) -> u64 {
    let mut hasher = DefaultHasher::new();
    include_soma.hash(&mut hasher);
    include_neurites.hash(&mut hasher);
    if include_soma {
        hash_corner_levels(&mesh.soma_patches, params, context, &model, &mut hasher);
    }
    if include_neurites {
        hash_corner_levels(&mesh.neurite_patches, params, context, &model, &mut hasher);
    }
    hasher.finish()
}

fn hash_corner_levels(
    patches: &[QuadPatch],
    params: &TessellationParams,
    context: Option<&RefineContext>,
    model: &Mat4,
    hasher: &mut DefaultHasher,
) {
    patches.len().hash(hasher);
    for patch in patches {
        for corner in &patch.corners {
            corner_level(corner, params, context, model).hash(hasher);
        }
    }
}

fn corner_level(
    corner: &PatchVertex,
    params: &TessellationParams,
    context: Option<&RefineContext>,
    model: &Mat4,
) -> u32 {
    let base = params.base_segments();
    match params.criterion {
        SubdivisionCriterion::Homogeneous => base,
        SubdivisionCriterion::CameraDistance => {
            let Some(context) = context else { return base };
            let cutoff = (params.max_distance * context.far_plane).max(1.0e-6);
            let world = model.transform_point3(corner.position);
            let factor = (1.0 - world.distance(context.eye) / cutoff).clamp(0.0, 1.0);
            ((base as f32 * factor).round() as u32).max(1)
        }
    }
}

fn snap(t: f32, segments: u32) -> f32 {
    let s = segments as f32;
    (t * s).round() / s
}

fn bilerp(c0: Vec3, c1: Vec3, c2: Vec3, c3: Vec3, u: f32, v: f32) -> Vec3 {
    let bottom = c0.lerp(c1, u);
    let top = c3.lerp(c2, u);
    bottom.lerp(top, v)
}

fn bilerp_scalar(c0: f32, c1: f32, c2: f32, c3: f32, u: f32, v: f32) -> f32 {
    let bottom = c0 + (c1 - c0) * u;
    let top = c3 + (c2 - c3) * u;
    bottom + (top - bottom) * v
}

/// Bilinear interpolation followed by radial reprojection: the point is
/// pushed onto the surface at the interpolated radius around the
/// interpolated axis. The axial component is removed first so tube
/// cross-sections stay circular.
fn surface_point(patch: &QuadPatch, u: f32, v: f32) -> (Vec3, Vec3) {
    let [c0, c1, c2, c3] = patch.corners;
    let position = bilerp(c0.position, c1.position, c2.position, c3.position, u, v);
    let center = bilerp(c0.center, c1.center, c2.center, c3.center, u, v);
    let radius = bilerp_scalar(c0.radius(), c1.radius(), c2.radius(), c3.radius(), u, v);
    let tangent = bilerp(c0.tangent, c1.tangent, c2.tangent, c3.tangent, u, v).normalize_or_zero();

    let mut dir = position - center;
    dir -= tangent * dir.dot(tangent);
    let dir = dir.normalize_or_zero();
    if dir == Vec3::ZERO {
        return (position, Vec3::ZERO);
    }
    (center + dir * radius, dir)
}

/// Grid counts come from the four corner levels; boundary vertices snap to
/// the shared edge's own count so adjacent patches emit identical points
/// and welding closes the seams.
fn emit_patches(
    patches: &[QuadPatch],
    params: &TessellationParams,
    context: Option<&RefineContext>,
    model: &Mat4,
    out: &mut TriangleMesh,
) {
    for patch in patches {
        let levels = [
            corner_level(&patch.corners[0], params, context, model),
            corner_level(&patch.corners[1], params, context, model),
            corner_level(&patch.corners[2], params, context, model),
            corner_level(&patch.corners[3], params, context, model),
        ];
        let e_bottom = levels[0].max(levels[1]);
        let e_right = levels[1].max(levels[2]);
        let e_top = levels[3].max(levels[2]);
        let e_left = levels[0].max(levels[3]);
        let nu = e_bottom.max(e_top) as usize;
        let nv = e_left.max(e_right) as usize;

        let base_index = out.positions.len() as u32;
        {
            let normals = out.normals.get_or_insert_with(Vec::new);
            for j in 0..=nv {
                let v = j as f32 / nv as f32;
                for i in 0..=nu {
                    let u = i as f32 / nu as f32;
                    let mut uu = u;
                    let mut vv = v;
                    if j == 0 {
                        uu = snap(u, e_bottom);
                    } else if j == nv {
                        uu = snap(u, e_top);
                    }
                    if i == 0 {
                        vv = snap(v, e_left);
                    } else if i == nu {
                        vv = snap(v, e_right);
                    }
                    let (position, normal) = surface_point(patch, uu, vv);
                    out.positions.push(position.to_array());
                    normals.push(normal.to_array());
                }
            }
        }

        let stride = (nu + 1) as u32;
        for j in 0..nv as u32 {
            for i in 0..nu as u32 {
                let a = base_index + j * stride + i;
                let b = a + 1;
                let c = a + stride;
                let d = c + 1;
                out.indices.extend_from_slice(&[a, b, d, a, d, c]);
            }
        }
    }
}
