mod animation;
mod camera;
mod coloring;
mod gradient;
mod loader;
mod positions;
mod scene;
mod spikes;

pub use animation::{CameraAnimator, ANIMATION_DURATION};
pub use camera::OrbitCamera;
pub use coloring::{ColorTable, ColoringMode, SELECTED_BASE, UNSELECTED_BASE};
pub use gradient::{ColorGradient, ColorStop};
pub use loader::{spawn_load, DatasetLoader, LoadEvent, SceneFormat};
pub use positions::{load_positions, save_positions, CameraPosition, PositionsError};
pub use scene::{EditState, PaintFlags, RenderBatch, Scene};
pub use spikes::{SpikePlayer, ACTIVATION_DELAY};
