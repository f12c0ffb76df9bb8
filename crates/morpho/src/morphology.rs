use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Aabb> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut bounds = Aabb {
            min: first,
            max: first,
        };
        for p in iter {
            bounds.expand(p);
        }
        Some(bounds)
    }

    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Radius of the bounding sphere around `center`.
    pub fn radius(&self) -> f32 {
        (self.max - self.min).length() * 0.5
    }

    pub fn transformed(&self, matrix: Mat4) -> Aabb {
        let corners = [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ];
        let mut iter = corners.iter().map(|c| matrix.transform_point3(*c));
        let first = iter.next().unwrap_or(Vec3::ZERO);
        let mut bounds = Aabb {
            min: first,
            max: first,
        };
        for p in iter {
            bounds.expand(p);
        }
        bounds
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub position: Vec3,
    pub radius: f32,
}

/// Unbranched run of samples. Child sections repeat the last sample of the
/// parent as their first so tube surfaces meet at branch points.
#[derive(Debug, Clone, Default)]
pub struct Section {
    pub samples: Vec<Sample>,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeuriteKind {
    Axon,
    BasalDendrite,
    ApicalDendrite,
}

impl NeuriteKind {
    pub fn label(self) -> &'static str {
        match self {
            NeuriteKind::Axon => "axon",
            NeuriteKind::BasalDendrite => "basal dendrite",
            NeuriteKind::ApicalDendrite => "apical dendrite",
        }
    }
}

/// One axon or dendrite: a tree of sections with the root at index 0.
#[derive(Debug, Clone)]
pub struct Neurite {
    pub kind: NeuriteKind,
    pub sections: Vec<Section>,
}

impl Neurite {
    pub fn sample_count(&self) -> usize {
        self.sections.iter().map(|s| s.samples.len()).sum()
    }

    pub fn first_sample(&self) -> Option<Sample> {
        self.sections.first().and_then(|s| s.samples.first()).copied()
    }
}

/// Cell body as a sample cloud. Single-sample somas carry the radius on the
/// sample; contour somas encode it as the spread around the centroid, so the
/// derived radii take whichever is larger.
#[derive(Debug, Clone, Default)]
pub struct Soma {
    pub samples: Vec<Sample>,
}

impl Soma {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn center(&self) -> Vec3 {
        if self.samples.is_empty() {
            return Vec3::ZERO;
        }
        let mut sum = Vec3::ZERO;
        for s in &self.samples {
            sum += s.position;
        }
        sum / self.samples.len() as f32
    }

    pub fn mean_radius(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let center = self.center();
        let mut sum = 0.0;
        for s in &self.samples {
            sum += s.radius.max((s.position - center).length());
        }
        sum / self.samples.len() as f32
    }

    pub fn max_radius(&self) -> f32 {
        let center = self.center();
        let mut max = 0.0f32;
        for s in &self.samples {
            max = max.max(s.radius.max((s.position - center).length()));
        }
        max
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct MorphologyId(pub u32);

/// Skeletal structure shared by every neuron instance with the same shape.
/// Immutable after load; edits regenerate meshes, never the morphology.
#[derive(Debug, Clone)]
pub struct Morphology {
    pub id: MorphologyId,
    pub soma: Soma,
    pub neurites: Vec<Neurite>,
}

impl Morphology {
    pub fn new(id: MorphologyId, soma: Soma, neurites: Vec<Neurite>) -> Self {
        Self { id, soma, neurites }
    }

    pub fn sample_count(&self) -> usize {
        self.soma.samples.len() + self.neurites.iter().map(Neurite::sample_count).sum::<usize>()
    }

    pub fn section_count(&self) -> usize {
        self.neurites.iter().map(|n| n.sections.len()).sum()
    }

    /// Local-space bounds over every sample, grown by the sample radius so
    /// the generated surface stays inside.
    pub fn bounds(&self) -> Option<Aabb> {
        let mut bounds: Option<Aabb> = None;
        let mut visit = |sample: &Sample| {
            let lo = sample.position - Vec3::splat(sample.radius);
            let hi = sample.position + Vec3::splat(sample.radius);
            match &mut bounds {
                Some(b) => {
                    b.expand(lo);
                    b.expand(hi);
                }
                None => bounds = Some(Aabb { min: lo, max: hi }),
            }
        };
        for s in &self.soma.samples {
            visit(s);
        }
        for neurite in &self.neurites {
            for section in &neurite.sections {
                for s in &section.samples {
                    visit(s);
                }
            }
        }
        bounds
    }
}
