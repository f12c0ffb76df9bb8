use std::sync::{Arc, Mutex};
use std::time::Instant;

use egui::epaint::{PaintCallback, Rect};
use egui_wgpu::Callback;

use neurotess_scene::OrbitCamera;

use crate::scene::RenderScene;

mod callback;
mod pipeline;

use callback::ViewportCallback;

/// Shared handle the UI paints through. Scene snapshots and frame stats
/// cross into the render callbacks behind mutexes.
pub struct ViewportRenderer {
    target_format: egui_wgpu::wgpu::TextureFormat,
    stats: Arc<Mutex<ViewportStatsState>>,
    scene: Arc<Mutex<ViewportSceneState>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportOptions {
    pub wireframe: bool,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ViewportStats {
    pub fps: f32,
    pub frame_time_ms: f32,
    pub refine_ms: f32,
    pub draw_calls: u32,
    pub vertex_count: u32,
    pub triangle_count: u32,
    pub mesh_count: u32,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_uploads: u64,
}

pub(super) struct ViewportStatsState {
    last_frame: Option<Instant>,
    stats: ViewportStats,
}

pub(super) struct ViewportSceneState {
    scene: Option<Arc<RenderScene>>,
}

impl ViewportRenderer {
    pub fn new(target_format: egui_wgpu::wgpu::TextureFormat) -> Self {
        Self {
            target_format,
            stats: Arc::new(Mutex::new(ViewportStatsState {
                last_frame: None,
                stats: ViewportStats::default(),
            })),
            scene: Arc::new(Mutex::new(ViewportSceneState { scene: None })),
        }
    }

    pub fn paint_callback(
        &self,
        rect: Rect,
        camera: OrbitCamera,
        options: ViewportOptions,
    ) -> PaintCallback {
        Callback::new_paint_callback(
            rect,
            ViewportCallback {
                target_format: self.target_format,
                rect,
                camera,
                options,
                stats: self.stats.clone(),
                scene: self.scene.clone(),
            },
        )
    }

    pub fn stats_snapshot(&self) -> ViewportStats {
        self.stats
            .lock()
            .map(|state| state.stats)
            .unwrap_or_default()
    }

    pub fn set_scene(&self, scene: RenderScene) {
        if let Ok(mut state) = self.scene.lock() {
            state.scene = Some(Arc::new(scene));
        }
    }

    pub fn clear_scene(&self) {
        if let Ok(mut state) = self.scene.lock() {
            state.scene = None;
        }
    }
}
