use std::collections::HashMap;

use morpho::{FunctionalType, MorphologicalType, Neuron};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColoringMode {
    Selection,
    Morphology,
    Layer,
    Function,
}

impl ColoringMode {
    pub const ALL: [ColoringMode; 4] = [
        ColoringMode::Selection,
        ColoringMode::Morphology,
        ColoringMode::Layer,
        ColoringMode::Function,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ColoringMode::Selection => "Selection",
            ColoringMode::Morphology => "Morphological type",
            ColoringMode::Layer => "Layer",
            ColoringMode::Function => "Functional type",
        }
    }
}

pub const UNSELECTED_BASE: [f32; 3] = [0.5, 0.5, 0.8];
pub const SELECTED_BASE: [f32; 3] = [0.8, 0.5, 0.5];

/// Per-mode, per-category colors. A missing entry means "unset" and falls
/// back to the selection base colors; an entry may legally be pure black.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorTable {
    colors: HashMap<ColoringMode, HashMap<u32, [f32; 3]>>,
}

impl Default for ColorTable {
    fn default() -> Self {
        let mut table = Self {
            colors: HashMap::new(),
        };
        table.set_color(ColoringMode::Selection, 0, UNSELECTED_BASE);
        table.set_color(ColoringMode::Selection, 1, SELECTED_BASE);

        // Undefined categories (id 0) stay unset and render as base color.
        const TYPE_PALETTE: [[f32; 3]; 7] = [
            [0.85, 0.35, 0.30],
            [0.30, 0.65, 0.85],
            [0.40, 0.75, 0.40],
            [0.85, 0.70, 0.25],
            [0.65, 0.40, 0.80],
            [0.30, 0.75, 0.70],
            [0.85, 0.50, 0.70],
        ];
        for (index, color) in TYPE_PALETTE.iter().enumerate() {
            table.set_color(ColoringMode::Morphology, index as u32 + 1, *color);
        }
        const LAYER_PALETTE: [[f32; 3]; 6] = [
            [0.90, 0.45, 0.35],
            [0.90, 0.70, 0.30],
            [0.55, 0.80, 0.35],
            [0.30, 0.75, 0.65],
            [0.35, 0.55, 0.90],
            [0.65, 0.45, 0.85],
        ];
        for (index, color) in LAYER_PALETTE.iter().enumerate() {
            table.set_color(ColoringMode::Layer, index as u32 + 1, *color);
        }
        table.set_color(ColoringMode::Function, FunctionalType::Inhibitory.id(), [0.25, 0.35, 0.85]);
        table.set_color(ColoringMode::Function, FunctionalType::Excitatory.id(), [0.85, 0.30, 0.25]);
        table
    }
}

impl ColorTable {
    pub fn color(&self, mode: ColoringMode, id: u32) -> Option<[f32; 3]> {
        self.colors.get(&mode).and_then(|inner| inner.get(&id)).copied()
    }

    pub fn unselected_base(&self) -> [f32; 3] {
        self.color(ColoringMode::Selection, 0).unwrap_or(UNSELECTED_BASE)
    }

    pub fn selected_base(&self) -> [f32; 3] {
        self.color(ColoringMode::Selection, 1).unwrap_or(SELECTED_BASE)
    }

    /// Writes a category color. Ids outside the mode's range are rejected
    /// and leave the table untouched; returns whether anything changed.
    pub fn set_color(&mut self, mode: ColoringMode, id: u32, color: [f32; 3]) -> bool {
        if !Self::id_in_range(mode, id) {
            tracing::warn!(?mode, id, "ignoring color for out-of-range category");
            return false;
        }
        self.colors.entry(mode).or_default().insert(id, color);
        true
    }

    fn id_in_range(mode: ColoringMode, id: u32) -> bool {
        match mode {
            ColoringMode::Selection => id <= 1,
            ColoringMode::Morphology => MorphologicalType::from_id(id).is_some(),
            ColoringMode::Layer => (1..=6).contains(&id),
            ColoringMode::Function => FunctionalType::from_id(id).is_some(),
        }
    }

    fn category_id(mode: ColoringMode, neuron: &Neuron, selected: bool) -> u32 {
        match mode {
            ColoringMode::Selection => selected as u32,
            ColoringMode::Morphology => neuron.morphological_type.id(),
            ColoringMode::Layer => neuron.layer as u32,
            ColoringMode::Function => neuron.functional_type.id(),
        }
    }

    /// Pure lookup: the neuron's category color under the mode, or the
    /// selection base color when the category is unset.
    pub fn resolve(&self, mode: ColoringMode, neuron: &Neuron, selected: bool) -> [f32; 3] {
        let id = Self::category_id(mode, neuron, selected);
        self.color(mode, id).unwrap_or(if selected {
            self.selected_base()
        } else {
            self.unselected_base()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;
    use morpho::{Morphology, MorphologyId, Sample, Soma};
    use std::sync::Arc;

    fn neuron(gid: u32) -> Neuron {
        let morphology = Arc::new(Morphology::new(
            MorphologyId(0),
            Soma {
                samples: vec![Sample {
                    position: Vec3::ZERO,
                    radius: 1.0,
                }],
            },
            Vec::new(),
        ));
        Neuron::new(gid, morphology)
    }

    #[test]
    fn selection_mode_is_binary() {
        let table = ColorTable::default();
        let n = neuron(1);
        assert_eq!(table.resolve(ColoringMode::Selection, &n, false), UNSELECTED_BASE);
        assert_eq!(table.resolve(ColoringMode::Selection, &n, true), SELECTED_BASE);
    }

    #[test]
    fn unset_categories_fall_back_to_base() {
        let table = ColorTable::default();
        let n = neuron(1);
        // Undefined morphological type and unknown layer are unset.
        assert_eq!(table.resolve(ColoringMode::Morphology, &n, false), UNSELECTED_BASE);
        assert_eq!(table.resolve(ColoringMode::Layer, &n, true), SELECTED_BASE);
    }

    #[test]
    fn set_color_overrides_resolution() {
        let mut table = ColorTable::default();
        let mut n = neuron(1);
        n.layer = 3;
        assert!(table.set_color(ColoringMode::Layer, 3, [0.0, 0.0, 0.0]));
        // Pure black is a legal category color.
        assert_eq!(table.resolve(ColoringMode::Layer, &n, false), [0.0, 0.0, 0.0]);
    }

    #[test]
    fn out_of_range_ids_leave_the_table_unchanged() {
        let mut table = ColorTable::default();
        let before = table.clone();
        assert!(!table.set_color(ColoringMode::Layer, 0, [1.0, 0.0, 0.0]));
        assert!(!table.set_color(ColoringMode::Layer, 7, [1.0, 0.0, 0.0]));
        assert!(!table.set_color(ColoringMode::Selection, 2, [1.0, 0.0, 0.0]));
        assert!(!table.set_color(ColoringMode::Morphology, 99, [1.0, 0.0, 0.0]));
        assert_eq!(table, before);
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut table = ColorTable::default();
        let mut n = neuron(1);
        n.functional_type = FunctionalType::Excitatory;
        table.set_color(ColoringMode::Function, FunctionalType::Excitatory.id(), [0.1, 0.2, 0.3]);
        let first = table.resolve(ColoringMode::Function, &n, false);
        let second = table.resolve(ColoringMode::Function, &n, false);
        assert_eq!(first, second);
        assert_eq!(first, [0.1, 0.2, 0.3]);
    }
}
