use std::sync::atomic::AtomicU8;
use std::sync::Arc;

use neurotess_scene::{CameraPosition, Scene};
use render::ViewportRenderer;
use tracing_subscriber::filter::LevelFilter;

mod io;
mod logging;
mod ui;
mod viewport;

pub(crate) use logging::ConsoleBuffer;

use logging::level_filter_to_u8;

pub(crate) struct NeuroTessApp {
    scene: Scene,
    console: ConsoleBuffer,
    log_level: LevelFilter,
    log_level_state: Arc<AtomicU8>,
    viewport_renderer: Option<ViewportRenderer>,
    wireframe: bool,
    show_console: bool,
    error: Option<String>,
    camera_positions: Vec<CameraPosition>,
    position_name: String,
}

pub(crate) fn setup_tracing() -> (ConsoleBuffer, Arc<AtomicU8>) {
    logging::setup_tracing()
}

impl NeuroTessApp {
    pub(crate) fn new(console: ConsoleBuffer, log_level_state: Arc<AtomicU8>) -> Self {
        Self {
            scene: Scene::new(),
            console,
            log_level: LevelFilter::INFO,
            log_level_state,
            viewport_renderer: None,
            wireframe: false,
            show_console: false,
            error: None,
            camera_positions: Vec::new(),
            position_name: String::new(),
        }
    }

    fn set_log_level(&mut self, new_level: LevelFilter) {
        if new_level == self.log_level {
            return;
        }

        self.log_level_state.store(
            level_filter_to_u8(new_level),
            std::sync::atomic::Ordering::Relaxed,
        );
        self.log_level = new_level;
    }
}
