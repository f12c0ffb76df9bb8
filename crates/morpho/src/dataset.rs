use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::morphology::{Aabb, Morphology};
use crate::neuron::Neuron;

/// One loaded population. Neurons iterate in ascending gid order, which is
/// the dataset order every downstream pass relies on.
#[derive(Debug, Default)]
pub struct Dataset {
    pub neurons: BTreeMap<u32, Neuron>,
    pub morphologies: Vec<Arc<Morphology>>,
    pub source: Option<PathBuf>,
}

impl Dataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.neurons.is_empty()
    }

    pub fn len(&self) -> usize {
        self.neurons.len()
    }

    pub fn add_neuron(&mut self, neuron: Neuron) -> Result<(), String> {
        if self.neurons.contains_key(&neuron.gid) {
            return Err(format!("Duplicate neuron gid {}", neuron.gid));
        }
        self.neurons.insert(neuron.gid, neuron);
        Ok(())
    }

    pub fn source_name(&self) -> String {
        self.source
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// World-space bounds over the whole population.
    pub fn bounds(&self) -> Option<Aabb> {
        self.bounds_of(self.neurons.keys().copied())
    }

    /// World-space bounds over a subset of gids; unknown gids are ignored.
    pub fn bounds_of(&self, gids: impl IntoIterator<Item = u32>) -> Option<Aabb> {
        let mut bounds: Option<Aabb> = None;
        for gid in gids {
            let Some(neuron) = self.neurons.get(&gid) else {
                continue;
            };
            let Some(b) = neuron.bounds() else {
                continue;
            };
            bounds = Some(match bounds {
                Some(acc) => acc.union(&b),
                None => b,
            });
        }
        bounds
    }
}
