mod camera;
mod mesh_cache;
mod scene;
mod viewport;

pub use camera::camera_view_proj;
pub use scene::{RenderInstance, RenderScene};
pub use viewport::{ViewportOptions, ViewportRenderer, ViewportStats};
