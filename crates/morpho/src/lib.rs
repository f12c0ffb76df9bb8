mod dataset;
mod morphology;
mod neuron;
mod scene_xml;
mod spikes;
mod swc;

pub use dataset::Dataset;
pub use morphology::{Aabb, Morphology, MorphologyId, Neurite, NeuriteKind, Sample, Section, Soma};
pub use neuron::{FunctionalType, MorphologicalType, Neuron};
pub use scene_xml::{load_xml_scene, parse_xml_scene, SceneXmlError};
pub use spikes::{load_spikes, parse_spikes, SpikeReport, SpikesError};
pub use swc::{load_swc, load_swc_dataset, parse_swc, SwcError};
