use egui::epaint::Rect;
use egui_wgpu::ScreenDescriptor;
use glam::Mat4;

use neurotess_scene::OrbitCamera;

/// Combined view-projection matrix for a viewport rectangle. The aspect
/// ratio comes from the rect in physical pixels, not logical points.
pub fn camera_view_proj(
    camera: &OrbitCamera,
    rect: Rect,
    screen_descriptor: &ScreenDescriptor,
) -> Mat4 {
    let viewport_width = (rect.width() * screen_descriptor.pixels_per_point).max(1.0);
    let viewport_height = (rect.height() * screen_descriptor.pixels_per_point).max(1.0);
    let aspect = viewport_width / viewport_height;
    camera.projection_matrix(aspect) * camera.view_matrix()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec4;

    fn descriptor(width: u32, height: u32, scale: f32) -> ScreenDescriptor {
        ScreenDescriptor {
            size_in_pixels: [width, height],
            pixels_per_point: scale,
        }
    }

    #[test]
    fn pivot_projects_to_the_screen_center() {
        let camera = OrbitCamera::default();
        let rect = Rect::from_min_size(egui::Pos2::ZERO, egui::Vec2::new(800.0, 600.0));
        let view_proj = camera_view_proj(&camera, rect, &descriptor(800, 600, 1.0));

        let clip = view_proj * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((clip.x / clip.w).abs() < 1.0e-5);
        assert!((clip.y / clip.w).abs() < 1.0e-5);
    }

    #[test]
    fn aspect_ignores_the_scale_factor() {
        let camera = OrbitCamera::default();
        let rect = Rect::from_min_size(egui::Pos2::ZERO, egui::Vec2::new(400.0, 300.0));

        // The same logical rect at 1x and 2x keeps the same aspect ratio.
        let a = camera_view_proj(&camera, rect, &descriptor(400, 300, 1.0));
        let b = camera_view_proj(&camera, rect, &descriptor(800, 600, 2.0));
        let point = Vec4::new(1.0, 1.0, -5.0, 1.0);
        let pa = a * point;
        let pb = b * point;
        assert!((pa.x / pa.w - pb.x / pb.w).abs() < 1.0e-5);
        assert!((pa.y / pa.w - pb.y / pb.w).abs() < 1.0e-5);
    }
}
