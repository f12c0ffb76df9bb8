use std::sync::Arc;

use glam::Mat4;

use crate::morphology::{Aabb, Morphology};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MorphologicalType {
    Undefined,
    Pyramidal,
    Interneuron,
    Granule,
    Golgi,
    Purkinje,
    Stellate,
    Basket,
}

impl MorphologicalType {
    pub const ALL: [MorphologicalType; 8] = [
        MorphologicalType::Undefined,
        MorphologicalType::Pyramidal,
        MorphologicalType::Interneuron,
        MorphologicalType::Granule,
        MorphologicalType::Golgi,
        MorphologicalType::Purkinje,
        MorphologicalType::Stellate,
        MorphologicalType::Basket,
    ];

    pub fn id(self) -> u32 {
        match self {
            MorphologicalType::Undefined => 0,
            MorphologicalType::Pyramidal => 1,
            MorphologicalType::Interneuron => 2,
            MorphologicalType::Granule => 3,
            MorphologicalType::Golgi => 4,
            MorphologicalType::Purkinje => 5,
            MorphologicalType::Stellate => 6,
            MorphologicalType::Basket => 7,
        }
    }

    pub fn from_id(id: u32) -> Option<MorphologicalType> {
        MorphologicalType::ALL.into_iter().find(|t| t.id() == id)
    }

    pub fn parse(text: &str) -> Option<MorphologicalType> {
        match text.trim().to_ascii_uppercase().as_str() {
            "UNDEFINED" => Some(MorphologicalType::Undefined),
            "PYRAMIDAL" => Some(MorphologicalType::Pyramidal),
            "INTERNEURON" => Some(MorphologicalType::Interneuron),
            "GRANULE" => Some(MorphologicalType::Granule),
            "GOLGI" => Some(MorphologicalType::Golgi),
            "PURKINJE" => Some(MorphologicalType::Purkinje),
            "STELLATE" => Some(MorphologicalType::Stellate),
            "BASKET" => Some(MorphologicalType::Basket),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MorphologicalType::Undefined => "undefined",
            MorphologicalType::Pyramidal => "pyramidal",
            MorphologicalType::Interneuron => "interneuron",
            MorphologicalType::Granule => "granule",
            MorphologicalType::Golgi => "golgi",
            MorphologicalType::Purkinje => "purkinje",
            MorphologicalType::Stellate => "stellate",
            MorphologicalType::Basket => "basket",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionalType {
    Undefined,
    Inhibitory,
    Excitatory,
}

impl FunctionalType {
    pub const ALL: [FunctionalType; 3] = [
        FunctionalType::Undefined,
        FunctionalType::Inhibitory,
        FunctionalType::Excitatory,
    ];

    pub fn id(self) -> u32 {
        match self {
            FunctionalType::Undefined => 0,
            FunctionalType::Inhibitory => 1,
            FunctionalType::Excitatory => 2,
        }
    }

    pub fn from_id(id: u32) -> Option<FunctionalType> {
        FunctionalType::ALL.into_iter().find(|t| t.id() == id)
    }

    pub fn parse(text: &str) -> Option<FunctionalType> {
        match text.trim().to_ascii_uppercase().as_str() {
            "UNDEFINED" => Some(FunctionalType::Undefined),
            "INHIBITORY" => Some(FunctionalType::Inhibitory),
            "EXCITATORY" => Some(FunctionalType::Excitatory),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FunctionalType::Undefined => "undefined",
            FunctionalType::Inhibitory => "inhibitory",
            FunctionalType::Excitatory => "excitatory",
        }
    }
}

/// One placed instance of a shared morphology. Layer 0 means unknown.
#[derive(Debug, Clone)]
pub struct Neuron {
    pub gid: u32,
    pub layer: u8,
    pub morphological_type: MorphologicalType,
    pub functional_type: FunctionalType,
    pub transform: Mat4,
    pub morphology: Arc<Morphology>,
}

impl Neuron {
    pub fn new(gid: u32, morphology: Arc<Morphology>) -> Self {
        Self {
            gid,
            layer: 0,
            morphological_type: MorphologicalType::Undefined,
            functional_type: FunctionalType::Undefined,
            transform: Mat4::IDENTITY,
            morphology,
        }
    }

    /// World-space bounds of the placed morphology.
    pub fn bounds(&self) -> Option<Aabb> {
        self.morphology
            .bounds()
            .map(|b| b.transformed(self.transform))
    }
}
