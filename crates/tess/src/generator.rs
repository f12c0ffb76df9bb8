use std::sync::Arc;

use glam::{Quat, Vec3};
use rayon::prelude::*;

use morpho::{Morphology, MorphologyId, Neurite, Sample};

use crate::patch::{PatchMesh, PatchVertex, QuadPatch};
use crate::simplify::{adapt_soma, simplify};

#[derive(Debug)]
pub enum GeometryError {
    SomaMissing { morphology: MorphologyId },
}

impl GeometryError {
    pub fn message(&self) -> String {
        match self {
            GeometryError::SomaMissing { morphology } => format!(
                "Morphology {} has no soma samples, cannot generate a mesh",
                morphology.0
            ),
        }
    }
}

const MIN_RADIUS: f32 = 1.0e-4;

/// Standard pipeline: soma adaptation, simplification, patch generation.
pub fn generate_mesh(morphology: &Morphology) -> Result<PatchMesh, GeometryError> {
    generate_mesh_with(morphology, 1.0, &[])
}

/// Edit-mode variant: `alpha_radius` scales the soma, `alpha_neurites`
/// scales each neurite's pull distance onto the soma surface.
pub fn generate_mesh_with(
    morphology: &Morphology,
    alpha_radius: f32,
    alpha_neurites: &[f32],
) -> Result<PatchMesh, GeometryError> {
    if morphology.soma.is_empty() {
        return Err(GeometryError::SomaMissing {
            morphology: morphology.id,
        });
    }

    let mut working = morphology.clone();
    adapt_soma(&mut working, alpha_radius, alpha_neurites);
    simplify(&mut working);

    let mut mesh = PatchMesh::default();
    build_soma_patches(&working, &mut mesh);
    for neurite in &working.neurites {
        build_neurite_patches(neurite, &mut mesh);
    }
    tracing::debug!(
        morphology = morphology.id.0,
        patches = mesh.patch_count(),
        "Generated patch mesh"
    );
    Ok(mesh)
}

/// Generate every morphology of a dataset. The first failure wins; there is
/// no partial result.
pub fn generate_meshes(
    morphologies: &[Arc<Morphology>],
) -> Result<Vec<(MorphologyId, Arc<PatchMesh>)>, GeometryError> {
    morphologies
        .par_iter()
        .map(|morphology| generate_mesh(morphology).map(|mesh| (morphology.id, Arc::new(mesh))))
        .collect()
}

/// Spherified cube: six quad faces that refinement inflates into a sphere
/// of the soma's mean radius.
fn build_soma_patches(morphology: &Morphology, mesh: &mut PatchMesh) {
    let center = morphology.soma.center();
    let radius = morphology.soma.mean_radius().max(MIN_RADIUS);

    // Face corners counter-clockwise seen from outside.
    const FACES: [[[f32; 3]; 4]; 6] = [
        [
            [1.0, -1.0, -1.0],
            [1.0, 1.0, -1.0],
            [1.0, 1.0, 1.0],
            [1.0, -1.0, 1.0],
        ], // +X
        [
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, -1.0],
            [-1.0, -1.0, 1.0],
            [-1.0, 1.0, 1.0],
        ], // -X
        [
            [-1.0, 1.0, -1.0],
            [-1.0, 1.0, 1.0],
            [1.0, 1.0, 1.0],
            [1.0, 1.0, -1.0],
        ], // +Y
        [
            [-1.0, -1.0, 1.0],
            [-1.0, -1.0, -1.0],
            [1.0, -1.0, -1.0],
            [1.0, -1.0, 1.0],
        ], // -Y
        [
            [-1.0, -1.0, 1.0],
            [1.0, -1.0, 1.0],
            [1.0, 1.0, 1.0],
            [-1.0, 1.0, 1.0],
        ], // +Z
        [
            [1.0, -1.0, -1.0],
            [-1.0, -1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [1.0, 1.0, -1.0],
        ], // -Z
    ];

    for face in FACES {
        let corners = face.map(|dir| {
            let direction = Vec3::from(dir).normalize();
            PatchVertex {
                position: center + direction * radius,
                center,
                tangent: Vec3::ZERO,
            }
        });
        mesh.soma_patches.push(QuadPatch { corners });
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    normal: Vec3,
    binormal: Vec3,
    tangent: Vec3,
}

fn initial_frame(tangent: Vec3) -> Frame {
    let mut up = Vec3::Y;
    if tangent.cross(up).length_squared() < 1.0e-6 {
        up = Vec3::X;
    }
    let binormal = tangent.cross(up).normalize_or_zero();
    let normal = binormal.cross(tangent).normalize_or_zero();
    Frame {
        normal,
        binormal,
        tangent,
    }
}

/// Rotate the frame onto a new tangent, keeping roll continuous along the
/// polyline so tube cross-sections do not twist.
fn transported(frame: &Frame, tangent: Vec3) -> Frame {
    if tangent == Vec3::ZERO {
        return *frame;
    }
    let rotation = Quat::from_rotation_arc(frame.tangent, tangent);
    let rotated = (rotation * frame.normal).normalize_or_zero();
    let binormal = tangent.cross(rotated).normalize_or_zero();
    let normal = binormal.cross(tangent).normalize_or_zero();
    Frame {
        normal,
        binormal,
        tangent,
    }
}

/// Central-difference tangents along a section polyline. Degenerate runs
/// inherit the nearest real tangent.
fn sample_tangents(samples: &[Sample]) -> Vec<Vec3> {
    let count = samples.len();
    let mut tangents = Vec::with_capacity(count);
    for i in 0..count {
        let prev = i.saturating_sub(1);
        let next = (i + 1).min(count - 1);
        let dir = samples[next].position - samples[prev].position;
        tangents.push(if dir.length_squared() > 1.0e-12 {
            dir.normalize()
        } else {
            Vec3::ZERO
        });
    }

    let first_real = tangents
        .iter()
        .copied()
        .find(|t| *t != Vec3::ZERO)
        .unwrap_or(Vec3::Y);
    let mut last = first_real;
    for tangent in &mut tangents {
        if *tangent == Vec3::ZERO {
            *tangent = last;
        } else {
            last = *tangent;
        }
    }
    tangents
}

/// Square cross-section inscribed in the sample radius, rotated 45 degrees
/// so edges face the frame axes.
fn ring_positions(sample: &Sample, frame: &Frame) -> [Vec3; 4] {
    let radius = sample.radius.max(MIN_RADIUS);
    let mut ring = [Vec3::ZERO; 4];
    for (k, point) in ring.iter_mut().enumerate() {
        let angle = std::f32::consts::FRAC_PI_4 + k as f32 * std::f32::consts::FRAC_PI_2;
        let offset = frame.normal * angle.cos() + frame.binormal * angle.sin();
        *point = sample.position + offset * radius;
    }
    ring
}

/// Four side patches per segment. Child sections continue the parent's
/// end frame so cross-sections stay aligned across branch points; the
/// section list orders parents before children.
fn build_neurite_patches(neurite: &Neurite, mesh: &mut PatchMesh) {
    let mut exit_frames: Vec<Option<Frame>> = vec![None; neurite.sections.len()];

    for (index, section) in neurite.sections.iter().enumerate() {
        if section.samples.len() < 2 {
            exit_frames[index] = section.parent.and_then(|p| exit_frames[p]);
            continue;
        }

        let tangents = sample_tangents(&section.samples);
        let entry = section.parent.and_then(|p| exit_frames[p]);
        let mut frame = match entry {
            Some(parent_frame) => transported(&parent_frame, tangents[0]),
            None => initial_frame(tangents[0]),
        };

        let mut rings = Vec::with_capacity(section.samples.len());
        rings.push(ring_positions(&section.samples[0], &frame));
        for i in 1..section.samples.len() {
            frame = transported(&frame, tangents[i]);
            rings.push(ring_positions(&section.samples[i], &frame));
        }

        for i in 0..section.samples.len() - 1 {
            let s0 = section.samples[i];
            let s1 = section.samples[i + 1];
            if (s1.position - s0.position).length_squared() <= 1.0e-12 {
                continue;
            }
            for k in 0..4 {
                let k1 = (k + 1) % 4;
                mesh.neurite_patches.push(QuadPatch {
                    corners: [
                        PatchVertex {
                            position: rings[i][k],
                            center: s0.position,
                            tangent: tangents[i],
                        },
                        PatchVertex {
                            position: rings[i][k1],
                            center: s0.position,
                            tangent: tangents[i],
                        },
                        PatchVertex {
                            position: rings[i + 1][k1],
                            center: s1.position,
                            tangent: tangents[i + 1],
                        },
                        PatchVertex {
                            position: rings[i + 1][k],
                            center: s1.position,
                            tangent: tangents[i + 1],
                        },
                    ],
                });
            }
        }
        exit_frames[index] = Some(frame);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use morpho::{NeuriteKind, Section, Soma};

    fn sample(x: f32, y: f32, z: f32, radius: f32) -> Sample {
        Sample {
            position: Vec3::new(x, y, z),
            radius,
        }
    }

    fn ball_soma(radius: f32) -> Soma {
        Soma {
            samples: vec![sample(0.0, 0.0, 0.0, radius)],
        }
    }

    fn single_section_neurite(samples: Vec<Sample>) -> Neurite {
        Neurite {
            kind: NeuriteKind::BasalDendrite,
            sections: vec![Section {
                samples,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    #[test]
    fn soma_less_morphology_is_rejected() {
        let morphology = Morphology::new(MorphologyId(3), Soma::default(), Vec::new());
        let err = generate_mesh(&morphology).unwrap_err();
        assert!(matches!(
            err,
            GeometryError::SomaMissing {
                morphology: MorphologyId(3)
            }
        ));
        assert!(err.message().contains("3"));
    }

    #[test]
    fn ball_morphology_makes_six_soma_patches() {
        let morphology = Morphology::new(MorphologyId(0), ball_soma(2.0), Vec::new());
        let mesh = generate_mesh(&morphology).expect("mesh");
        assert_eq!(mesh.soma_patches.len(), 6);
        assert!(mesh.neurite_patches.is_empty());
        for patch in &mesh.soma_patches {
            for corner in patch.corners {
                assert!((corner.radius() - 2.0).abs() < 1.0e-5);
                assert_eq!(corner.center, Vec3::ZERO);
                assert_eq!(corner.tangent, Vec3::ZERO);
            }
        }
    }

    #[test]
    fn straight_neurite_makes_four_patches_per_segment() {
        let morphology = Morphology::new(
            MorphologyId(0),
            ball_soma(1.0),
            vec![single_section_neurite(vec![
                sample(0.0, 2.0, 0.0, 0.2),
                sample(0.0, 5.0, 0.0, 0.2),
                sample(0.0, 8.0, 0.0, 0.2),
            ])],
        );
        let mesh = generate_mesh(&morphology).expect("mesh");
        assert_eq!(mesh.neurite_patches.len(), 2 * 4);
        for patch in &mesh.neurite_patches {
            for corner in patch.corners {
                assert!((corner.radius() - 0.2).abs() < 1.0e-5);
            }
        }
    }

    #[test]
    fn branched_neurite_continues_across_sections() {
        let branch = sample(0.0, 5.0, 0.0, 0.3);
        let neurite = Neurite {
            kind: NeuriteKind::BasalDendrite,
            sections: vec![
                Section {
                    samples: vec![sample(0.0, 2.0, 0.0, 0.3), branch],
                    parent: None,
                    children: vec![1],
                },
                Section {
                    samples: vec![branch, sample(3.0, 8.0, 0.0, 0.3)],
                    parent: Some(0),
                    children: Vec::new(),
                },
            ],
        };
        let morphology = Morphology::new(MorphologyId(0), ball_soma(1.0), vec![neurite]);
        let mesh = generate_mesh(&morphology).expect("mesh");
        assert_eq!(mesh.neurite_patches.len(), 2 * 4);
    }

    #[test]
    fn zero_length_segments_are_skipped() {
        // A trailing duplicate sample survives simplification; the
        // degenerate segment must not produce patches.
        let morphology = Morphology::new(
            MorphologyId(0),
            ball_soma(1.0),
            vec![single_section_neurite(vec![
                sample(0.0, 2.0, 0.0, 0.2),
                sample(0.0, 8.0, 0.0, 0.2),
                sample(0.0, 8.0, 0.0, 0.2),
            ])],
        );
        let mesh = generate_mesh(&morphology).expect("mesh");
        assert_eq!(mesh.neurite_patches.len(), 4);
    }

    #[test]
    fn alpha_radius_scales_the_soma_patches() {
        let morphology = Morphology::new(MorphologyId(0), ball_soma(2.0), Vec::new());
        let mesh = generate_mesh_with(&morphology, 0.5, &[]).expect("mesh");
        for patch in &mesh.soma_patches {
            for corner in patch.corners {
                assert!((corner.radius() - 1.0).abs() < 1.0e-5);
            }
        }
    }

    #[test]
    fn generate_meshes_keeps_input_order() {
        let first = Arc::new(Morphology::new(MorphologyId(0), ball_soma(1.0), Vec::new()));
        let second = Arc::new(Morphology::new(MorphologyId(1), ball_soma(2.0), Vec::new()));
        let meshes = generate_meshes(&[first, second]).expect("meshes");
        assert_eq!(meshes.len(), 2);
        assert_eq!(meshes[0].0, MorphologyId(0));
        assert_eq!(meshes[1].0, MorphologyId(1));
    }

    #[test]
    fn generate_meshes_fails_wholesale() {
        let good = Arc::new(Morphology::new(MorphologyId(0), ball_soma(1.0), Vec::new()));
        let bad = Arc::new(Morphology::new(MorphologyId(1), Soma::default(), Vec::new()));
        assert!(generate_meshes(&[good, bad]).is_err());
    }
}
