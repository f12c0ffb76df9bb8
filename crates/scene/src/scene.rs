use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use glam::Mat4;

use morpho::{Dataset, MorphologyId, SpikeReport};
use tess::{
    generate_mesh_with, generate_meshes, GeometryError, PatchMesh, RefineContext,
    TessellationParams, TriangleMesh,
};

use crate::animation::CameraAnimator;
use crate::camera::OrbitCamera;
use crate::coloring::{ColorTable, ColoringMode};
use crate::gradient::ColorGradient;
use crate::loader::{spawn_load, DatasetLoader, LoadEvent, SceneFormat};
use crate::positions::CameraPosition;
use crate::spikes::SpikePlayer;

/// One draw grouping: parallel arrays, same index = same neuron.
#[derive(Debug, Clone, Default)]
pub struct RenderBatch {
    pub gids: Vec<u32>,
    pub meshes: Vec<Arc<PatchMesh>>,
    pub transforms: Vec<Mat4>,
    pub colors: Vec<[f32; 3]>,
}

impl RenderBatch {
    pub fn len(&self) -> usize {
        self.gids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gids.is_empty()
    }

    fn clear(&mut self) {
        self.gids.clear();
        self.meshes.clear();
        self.transforms.clear();
        self.colors.clear();
    }

    fn push(&mut self, gid: u32, mesh: Arc<PatchMesh>, transform: Mat4, color: [f32; 3]) {
        self.gids.push(gid);
        self.meshes.push(mesh);
        self.transforms.push(transform);
        self.colors.push(color);
    }
}

/// Soma/neurite visibility for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaintFlags {
    pub soma: bool,
    pub neurites: bool,
}

impl Default for PaintFlags {
    fn default() -> Self {
        Self {
            soma: true,
            neurites: true,
        }
    }
}

/// Alpha factors for the neuron under edit.
#[derive(Debug, Clone, PartialEq)]
pub struct EditState {
    pub gid: u32,
    pub alpha_radius: f32,
    pub alpha_neurites: Vec<f32>,
}

/// The composition layer: dataset, mesh cache, partitioned render batches,
/// coloring, camera, playback, and the background loader.
pub struct Scene {
    dataset: Dataset,
    meshes: HashMap<MorphologyId, Arc<PatchMesh>>,
    selection: BTreeSet<u32>,
    selected_batch: RenderBatch,
    unselected_batch: RenderBatch,
    edit: Option<EditState>,
    loader: Option<DatasetLoader>,
    progress: Option<(u32, String)>,
    last_error: Option<String>,
    pub coloring_mode: ColoringMode,
    pub colors: ColorTable,
    pub gradient: ColorGradient,
    pub selected_paint: PaintFlags,
    pub unselected_paint: PaintFlags,
    pub tessellation: TessellationParams,
    pub background: [f32; 3],
    pub camera: OrbitCamera,
    pub animator: CameraAnimator,
    pub player: SpikePlayer,
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    pub fn new() -> Self {
        Self {
            dataset: Dataset::new(),
            meshes: HashMap::new(),
            selection: BTreeSet::new(),
            selected_batch: RenderBatch::default(),
            unselected_batch: RenderBatch::default(),
            edit: None,
            loader: None,
            progress: None,
            last_error: None,
            coloring_mode: ColoringMode::Selection,
            colors: ColorTable::default(),
            gradient: ColorGradient::default(),
            selected_paint: PaintFlags::default(),
            unselected_paint: PaintFlags::default(),
            tessellation: TessellationParams::default(),
            background: [0.15, 0.15, 0.17],
            camera: OrbitCamera::default(),
            animator: CameraAnimator::default(),
            player: SpikePlayer::default(),
        }
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    pub fn is_empty(&self) -> bool {
        self.dataset.is_empty()
    }

    pub fn mesh(&self, id: MorphologyId) -> Option<&Arc<PatchMesh>> {
        self.meshes.get(&id)
    }

    pub fn selected_batch(&self) -> &RenderBatch {
        &self.selected_batch
    }

    pub fn unselected_batch(&self) -> &RenderBatch {
        &self.unselected_batch
    }

    pub fn selection(&self) -> &BTreeSet<u32> {
        &self.selection
    }

    pub fn is_selected(&self, gid: u32) -> bool {
        self.selection.contains(&gid)
    }

    /// Replaces the dataset wholesale. Every distinct morphology gets a
    /// patch mesh up front; a geometry failure rejects the whole dataset
    /// and keeps the current one attached.
    pub fn attach_dataset(&mut self, dataset: Dataset) -> Result<(), GeometryError> {
        let generated = generate_meshes(&dataset.morphologies)?;

        self.dataset = dataset;
        self.meshes = generated.into_iter().collect();
        self.selection.clear();
        self.edit = None;
        self.player.detach();
        self.rebuild_batches();
        self.home();
        tracing::info!(
            neurons = self.dataset.len(),
            meshes = self.meshes.len(),
            "dataset attached"
        );
        Ok(())
    }

    pub fn close(&mut self) {
        self.dataset = Dataset::new();
        self.meshes.clear();
        self.selection.clear();
        self.selected_batch.clear();
        self.unselected_batch.clear();
        self.edit = None;
        self.player.detach();
        self.animator.cancel();
        self.loader = None;
        self.progress = None;
        tracing::info!("scene closed");
    }

    // ---- background loading ----

    /// Kicks off a worker-thread load. A load already in flight makes this
    /// a silent no-op; unsupported formats fail synchronously.
    pub fn begin_load(&mut self, path: &Path, format: SceneFormat) -> Result<(), String> {
        if self.loader.is_some() {
            tracing::debug!(path = %path.display(), "ignoring load request, one is in flight");
            return Ok(());
        }
        let loader = spawn_load(path, format)?;
        self.loader = Some(loader);
        self.progress = Some((0, format!("Loading {}", path.display())));
        Ok(())
    }

    pub fn is_loading(&self) -> bool {
        self.loader.is_some()
    }

    pub fn load_progress(&self) -> Option<(u32, &str)> {
        self.progress
            .as_ref()
            .map(|(value, message)| (*value, message.as_str()))
    }

    /// Pops the most recent load or geometry error for display.
    pub fn take_error(&mut self) -> Option<String> {
        self.last_error.take()
    }

    /// Drains loader events. Call once per frame from the UI thread; mesh
    /// generation for a finished dataset happens here, not on the worker.
    pub fn poll_loader(&mut self) {
        let mut events = Vec::new();
        if let Some(loader) = &self.loader {
            while let Some(event) = loader.poll() {
                events.push(event);
            }
        }
        for event in events {
            match event {
                LoadEvent::Progress { value, message } => {
                    self.progress = Some((value, message));
                }
                LoadEvent::Finished(dataset) => {
                    self.loader = None;
                    self.progress = None;
                    if let Err(err) = self.attach_dataset(dataset) {
                        tracing::error!(message = %err.message(), "mesh generation failed");
                        self.last_error = Some(err.message());
                    }
                }
                LoadEvent::Failed { message } => {
                    self.loader = None;
                    self.progress = None;
                    self.last_error = Some(message);
                }
            }
        }
    }

    // ---- selection ----

    pub fn select(&mut self, gid: u32) {
        if self.dataset.neurons.contains_key(&gid) && self.selection.insert(gid) {
            self.rebuild_batches();
        }
    }

    pub fn deselect(&mut self, gid: u32) {
        if self.selection.remove(&gid) {
            self.rebuild_batches();
        }
    }

    pub fn toggle_selected(&mut self, gid: u32) {
        if self.selection.contains(&gid) {
            self.deselect(gid);
        } else {
            self.select(gid);
        }
    }

    pub fn select_all(&mut self) {
        self.selection = self.dataset.neurons.keys().copied().collect();
        self.rebuild_batches();
    }

    pub fn clear_selection(&mut self) {
        if !self.selection.is_empty() {
            self.selection.clear();
            self.rebuild_batches();
        }
    }

    // ---- batches ----

    /// Full deterministic rebuild in dataset order. Neurons whose
    /// morphology has no cached mesh are skipped.
    pub fn rebuild_batches(&mut self) {
        self.selected_batch.clear();
        self.unselected_batch.clear();
        let mut skipped = 0usize;
        for (gid, neuron) in &self.dataset.neurons {
            let Some(mesh) = self.meshes.get(&neuron.morphology.id) else {
                skipped += 1;
                continue;
            };
            let selected = self.selection.contains(gid);
            let color = self.colors.resolve(self.coloring_mode, neuron, selected);
            let batch = if selected {
                &mut self.selected_batch
            } else {
                &mut self.unselected_batch
            };
            batch.push(*gid, mesh.clone(), neuron.transform, color);
        }
        if skipped > 0 {
            tracing::warn!(skipped, "neurons without meshes were skipped");
        }
    }

    /// Recomputes only the per-instance colors, preserving mesh and
    /// transform arrays.
    pub fn refresh_colors(&mut self) {
        for i in 0..self.selected_batch.gids.len() {
            let gid = self.selected_batch.gids[i];
            if let Some(neuron) = self.dataset.neurons.get(&gid) {
                self.selected_batch.colors[i] =
                    self.colors.resolve(self.coloring_mode, neuron, true);
            }
        }
        for i in 0..self.unselected_batch.gids.len() {
            let gid = self.unselected_batch.gids[i];
            if let Some(neuron) = self.dataset.neurons.get(&gid) {
                self.unselected_batch.colors[i] =
                    self.colors.resolve(self.coloring_mode, neuron, false);
            }
        }
    }

    pub fn set_coloring_mode(&mut self, mode: ColoringMode) {
        if self.coloring_mode != mode {
            self.coloring_mode = mode;
            self.refresh_colors();
        }
    }

    /// Color edit under the active mode. Out-of-range ids change nothing.
    pub fn set_color(&mut self, id: u32, color: [f32; 3]) -> bool {
        if self.colors.set_color(self.coloring_mode, id, color) {
            self.refresh_colors();
            true
        } else {
            false
        }
    }

    /// Base color edits apply regardless of the active mode; the cold
    /// gradient stop follows the unselected base.
    pub fn set_base_color(&mut self, selected: bool, color: [f32; 3]) {
        let id = selected as u32;
        if self.colors.set_color(ColoringMode::Selection, id, color) {
            if !selected {
                self.gradient.set_cold(color);
            }
            self.refresh_colors();
        }
    }

    // ---- playback ----

    pub fn attach_spikes(&mut self, report: SpikeReport) {
        self.player.attach(report);
    }

    pub fn play_pause(&mut self) {
        if self.player.is_playing() {
            self.player.pause();
            self.refresh_colors();
        } else {
            self.player.play();
        }
    }

    fn apply_activation(&mut self) {
        for i in 0..self.unselected_batch.gids.len() {
            let gid = self.unselected_batch.gids[i];
            let position = self.player.activation_position(gid);
            self.unselected_batch.colors[i] = self.gradient.sample(position);
        }
    }

    /// Per-frame step: animation, playback, loader events. Returns true
    /// when another repaint should be scheduled right away.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.poll_loader();

        let animating = self.animator.advance(&mut self.camera, dt);

        if self.player.is_playing() {
            self.player.advance(dt);
            self.apply_activation();
            if !self.player.is_playing() {
                // Playback ran off the end of the report.
                self.refresh_colors();
            }
        }
        animating || self.player.is_playing() || self.is_loading()
    }

    // ---- camera ----

    pub fn home(&mut self) {
        match self.dataset.bounds() {
            Some(bounds) => {
                let radius = self.camera.fit_radius(bounds.radius());
                self.animator
                    .start_recenter(&self.camera, bounds.center(), radius);
            }
            None => {
                let home = OrbitCamera::default();
                self.animator
                    .start_recenter(&self.camera, home.position, home.radius);
            }
        }
    }

    /// Centers on the selection, or on everything when nothing is selected.
    pub fn focus_selection(&mut self) {
        let bounds = if self.selection.is_empty() {
            self.dataset.bounds()
        } else {
            self.dataset.bounds_of(self.selection.iter().copied())
        };
        if let Some(bounds) = bounds {
            let radius = self.camera.fit_radius(bounds.radius());
            self.animator
                .start_recenter(&self.camera, bounds.center(), radius);
        }
    }

    pub fn focus_edit(&mut self) {
        let Some(edit) = &self.edit else {
            return;
        };
        if let Some(bounds) = self.dataset.bounds_of([edit.gid]) {
            let radius = self.camera.fit_radius(bounds.radius());
            self.animator
                .start_recenter(&self.camera, bounds.center(), radius);
        }
    }

    pub fn apply_position(&mut self, position: &CameraPosition) {
        self.animator.start_pose(
            &self.camera,
            position.position,
            position.radius,
            position.rotation,
        );
    }

    // ---- editing ----

    pub fn edit(&self) -> Option<&EditState> {
        self.edit.as_ref()
    }

    pub fn edit_mut(&mut self) -> Option<&mut EditState> {
        self.edit.as_mut()
    }

    pub fn begin_edit(&mut self, gid: u32) -> bool {
        let Some(neuron) = self.dataset.neurons.get(&gid) else {
            return false;
        };
        let neurites = neuron.morphology.neurites.len();
        self.edit = Some(EditState {
            gid,
            alpha_radius: 1.0,
            alpha_neurites: vec![1.0; neurites],
        });
        true
    }

    pub fn end_edit(&mut self) {
        self.edit = None;
    }

    /// Regenerates the edited neuron's morphology mesh with the current
    /// alpha factors and swaps the cache entry, so every instance of that
    /// morphology picks up the new shape.
    pub fn regenerate_edit_mesh(&mut self) -> Result<(), GeometryError> {
        let Some(edit) = self.edit.clone() else {
            return Ok(());
        };
        let Some(neuron) = self.dataset.neurons.get(&edit.gid) else {
            return Ok(());
        };
        let morphology = neuron.morphology.clone();
        let mesh = generate_mesh_with(&morphology, edit.alpha_radius, &edit.alpha_neurites)?;
        self.meshes.insert(morphology.id, Arc::new(mesh));
        self.rebuild_batches();
        Ok(())
    }

    /// Refines one neuron with the live parameters and camera into a
    /// world-space triangle mesh for export.
    pub fn extract_mesh(&self, gid: u32) -> Option<TriangleMesh> {
        let neuron = self.dataset.neurons.get(&gid)?;
        let mesh = self.meshes.get(&neuron.morphology.id)?;
        let context = RefineContext {
            eye: self.camera.eye(),
            far_plane: self.camera.far,
        };
        let mut refined = tess::refine_mesh(
            mesh,
            &self.tessellation,
            Some(&context),
            neuron.transform,
            true,
            true,
        );
        refined.transform(neuron.transform);
        Some(refined)
    }

    pub fn source_name(&self) -> String {
        self.dataset.source_name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::ANIMATION_DURATION;
    use glam::Vec3;
    use morpho::{Morphology, Neurite, NeuriteKind, Neuron, Sample, Section, Soma};

    fn test_morphology(id: u32) -> Arc<Morphology> {
        Arc::new(Morphology::new(
            MorphologyId(id),
            Soma {
                samples: vec![Sample {
                    position: Vec3::ZERO,
                    radius: 2.0,
                }],
            },
            vec![Neurite {
                kind: NeuriteKind::Axon,
                sections: vec![Section {
                    samples: vec![
                        Sample {
                            position: Vec3::new(0.0, 4.0, 0.0),
                            radius: 0.5,
                        },
                        Sample {
                            position: Vec3::new(0.0, 12.0, 0.0),
                            radius: 0.5,
                        },
                    ],
                    parent: None,
                    children: Vec::new(),
                }],
            }],
        ))
    }

    fn two_neuron_dataset() -> Dataset {
        let morphology = test_morphology(0);
        let mut dataset = Dataset::new();
        dataset.morphologies.push(morphology.clone());
        let mut first = Neuron::new(1, morphology.clone());
        first.transform = Mat4::from_translation(Vec3::new(-20.0, 0.0, 0.0));
        let mut second = Neuron::new(2, morphology);
        second.transform = Mat4::from_translation(Vec3::new(20.0, 0.0, 0.0));
        dataset.add_neuron(first).expect("add");
        dataset.add_neuron(second).expect("add");
        dataset
    }

    fn scene_with_dataset() -> Scene {
        let mut scene = Scene::new();
        scene
            .attach_dataset(two_neuron_dataset())
            .expect("attach dataset");
        scene
    }

    #[test]
    fn instances_share_one_mesh_arc() {
        let scene = scene_with_dataset();
        assert_eq!(scene.meshes.len(), 1);
        let batch = scene.unselected_batch();
        assert_eq!(batch.len(), 2);
        assert!(Arc::ptr_eq(&batch.meshes[0], &batch.meshes[1]));
        let cached = scene.mesh(MorphologyId(0)).expect("cached mesh");
        assert!(Arc::ptr_eq(cached, &batch.meshes[0]));
    }

    #[test]
    fn selection_partitions_in_dataset_order() {
        let mut scene = scene_with_dataset();
        scene.select(2);
        assert_eq!(scene.selected_batch().gids, vec![2]);
        assert_eq!(scene.unselected_batch().gids, vec![1]);

        scene.select(1);
        assert_eq!(scene.selected_batch().gids, vec![1, 2]);
        assert!(scene.unselected_batch().is_empty());

        scene.deselect(2);
        assert_eq!(scene.selected_batch().gids, vec![1]);
        assert_eq!(scene.unselected_batch().gids, vec![2]);
    }

    #[test]
    fn selecting_an_unknown_gid_changes_nothing() {
        let mut scene = scene_with_dataset();
        scene.select(99);
        assert!(scene.selection().is_empty());
        assert_eq!(scene.unselected_batch().len(), 2);
    }

    #[test]
    fn batch_colors_follow_selection_state() {
        let mut scene = scene_with_dataset();
        scene.select(1);
        assert_eq!(
            scene.selected_batch().colors[0],
            scene.colors.selected_base()
        );
        assert_eq!(
            scene.unselected_batch().colors[0],
            scene.colors.unselected_base()
        );
    }

    #[test]
    fn out_of_range_color_edit_is_a_no_op() {
        let mut scene = scene_with_dataset();
        scene.set_coloring_mode(ColoringMode::Layer);
        let before = scene.unselected_batch().colors.clone();
        assert!(!scene.set_color(9, [1.0, 0.0, 0.0]));
        assert_eq!(scene.unselected_batch().colors, before);
    }

    #[test]
    fn rebuilding_twice_is_stable() {
        let mut scene = scene_with_dataset();
        scene.select(1);
        let gids = scene.selected_batch().gids.clone();
        let colors = scene.selected_batch().colors.clone();
        scene.rebuild_batches();
        assert_eq!(scene.selected_batch().gids, gids);
        assert_eq!(scene.selected_batch().colors, colors);
    }

    #[test]
    fn home_fits_the_dataset_bounds() {
        let mut scene = scene_with_dataset();
        scene.home();
        assert!(scene.animator.is_animating());
        let mut camera = scene.camera;
        scene.animator.advance(&mut camera, ANIMATION_DURATION);
        scene.camera = camera;

        let bounds = scene.dataset().bounds().expect("bounds");
        assert!(camera.position.distance(bounds.center()) < 1.0e-4);
        let expected = camera.fit_radius(bounds.radius());
        assert!((camera.radius - expected).abs() < 1.0e-3);
    }

    #[test]
    fn end_to_end_select_and_home() {
        let mut scene = scene_with_dataset();
        scene.select(1);
        scene.select(2);
        assert_eq!(scene.selected_batch().len(), 2);
        assert!(scene.unselected_batch().is_empty());

        scene.focus_selection();
        for _ in 0..130 {
            scene.tick(1.0 / 60.0);
        }
        assert!(!scene.animator.is_animating());
        let bounds = scene.dataset().bounds().expect("bounds");
        assert!(scene.camera.position.distance(bounds.center()) < 1.0e-3);
    }

    #[test]
    fn edit_regeneration_replaces_the_cache_entry() {
        let mut scene = scene_with_dataset();
        let before = scene.mesh(MorphologyId(0)).expect("mesh").clone();

        assert!(scene.begin_edit(1));
        scene.edit_mut().expect("edit").alpha_radius = 0.5;
        scene.regenerate_edit_mesh().expect("regenerate");

        let after = scene.mesh(MorphologyId(0)).expect("mesh").clone();
        assert!(!Arc::ptr_eq(&before, &after));
        // Both instances in the batches now reference the new mesh.
        for mesh in &scene.unselected_batch().meshes {
            assert!(Arc::ptr_eq(mesh, &after));
        }
        let shrunk = after.soma_patches[0].corners[0].radius();
        let original = before.soma_patches[0].corners[0].radius();
        assert!((shrunk - original * 0.5).abs() < 1.0e-4);
    }

    #[test]
    fn soma_less_dataset_is_rejected_and_previous_kept() {
        let mut scene = scene_with_dataset();
        let bad_morphology = Arc::new(Morphology::new(MorphologyId(0), Soma::default(), Vec::new()));
        let mut bad = Dataset::new();
        bad.morphologies.push(bad_morphology.clone());
        bad.add_neuron(Neuron::new(7, bad_morphology)).expect("add");

        assert!(scene.attach_dataset(bad).is_err());
        assert_eq!(scene.dataset().len(), 2);
        assert_eq!(scene.unselected_batch().len(), 2);
    }

    #[test]
    fn playback_overrides_unselected_colors() {
        let mut scene = scene_with_dataset();
        scene.attach_spikes(SpikeReport {
            events: vec![(0.0, 1), (100.0, 2)],
        });
        scene.play_pause();
        scene.tick(0.1);

        let colors = &scene.unselected_batch().colors;
        // Neuron 1 spiked at the start, neuron 2 is still cold.
        assert_eq!(colors[1], scene.gradient.cold());
        assert!(colors[0] != colors[1]);

        scene.play_pause();
        assert_eq!(
            scene.unselected_batch().colors[0],
            scene.colors.unselected_base()
        );
    }

    #[test]
    fn extract_mesh_is_world_space() {
        let scene = scene_with_dataset();
        let mesh = scene.extract_mesh(2).expect("mesh");
        let bounds = mesh.bounds().expect("bounds");
        // Neuron 2 sits at +20 on x.
        assert!(bounds.center().x > 10.0);
    }

    #[test]
    fn close_empties_everything() {
        let mut scene = scene_with_dataset();
        scene.select(1);
        scene.close();
        assert!(scene.is_empty());
        assert!(scene.selection().is_empty());
        assert!(scene.selected_batch().is_empty());
        assert!(scene.unselected_batch().is_empty());
        assert!(scene.mesh(MorphologyId(0)).is_none());
    }

    #[test]
    fn loader_round_trip_through_the_scene() {
        let path = std::env::temp_dir().join("neurotess_scene_load.swc");
        std::fs::write(
            &path,
            "1 1 0 0 0 5 -1\n2 3 0 10 0 1 1\n3 3 0 20 0 1 2\n",
        )
        .expect("write fixture");

        let mut scene = Scene::new();
        scene
            .begin_load(&path, SceneFormat::Swc)
            .expect("begin load");
        assert!(scene.is_loading());

        // A second request while one is in flight is ignored.
        scene
            .begin_load(&path, SceneFormat::Swc)
            .expect("second request");

        let mut waited = 0;
        while scene.is_loading() && waited < 1000 {
            scene.poll_loader();
            std::thread::sleep(std::time::Duration::from_millis(10));
            waited += 1;
        }
        std::fs::remove_file(&path).ok();

        assert!(!scene.is_loading());
        assert!(scene.take_error().is_none());
        assert_eq!(scene.dataset().len(), 1);
        assert_eq!(scene.unselected_batch().len(), 1);
    }

    #[test]
    fn unsupported_format_fails_synchronously() {
        let mut scene = Scene::new();
        let err = scene
            .begin_load(Path::new("circuit"), SceneFormat::BlueConfig)
            .unwrap_err();
        assert!(err.contains("not built in"));
        assert!(!scene.is_loading());
    }
}
