use eframe::egui;
use glam::Vec2;

use render::{RenderInstance, RenderScene, ViewportRenderer};

use super::NeuroTessApp;

const ORBIT_SPEED: f32 = 0.01;

impl NeuroTessApp {
    pub(super) fn sync_wgpu_renderer(&mut self, frame: &eframe::Frame) {
        let Some(render_state) = frame.wgpu_render_state() else {
            return;
        };

        if self.viewport_renderer.is_none() {
            self.viewport_renderer = Some(ViewportRenderer::new(render_state.target_format));
        }

        if let Some(renderer) = &self.viewport_renderer {
            renderer.set_scene(self.build_render_scene());
        }
    }

    /// Flattens both batches into the renderer's instance list. Neurons
    /// whose batch hides somas and neurites alike are skipped by the
    /// renderer, not here, so the stats stay honest about what was asked.
    fn build_render_scene(&self) -> RenderScene {
        let mut scene = RenderScene::empty();
        scene.background = self.scene.background;
        scene.params = self.scene.tessellation;

        let dataset = self.scene.dataset();
        let batches = [
            (self.scene.unselected_batch(), self.scene.unselected_paint),
            (self.scene.selected_batch(), self.scene.selected_paint),
        ];
        for (batch, flags) in batches {
            for index in 0..batch.len() {
                let gid = batch.gids[index];
                let Some(neuron) = dataset.neurons.get(&gid) else {
                    continue;
                };
                scene.instances.push(RenderInstance {
                    mesh_id: neuron.morphology.id,
                    mesh: batch.meshes[index].clone(),
                    model: batch.transforms[index],
                    color: batch.colors[index],
                    soma: flags.soma,
                    neurites: flags.neurites,
                });
            }
        }
        scene
    }

    pub(super) fn handle_viewport_input(&mut self, response: &egui::Response) {
        if !response.hovered() && !response.dragged() {
            return;
        }

        if response.dragged_by(egui::PointerButton::Primary) {
            let delta = response.drag_motion();
            if delta != egui::Vec2::ZERO {
                self.scene.animator.cancel();
                let shift = response.ctx.input(|i| i.modifiers.shift);
                if shift {
                    let factor = self.scene.camera.radius * 0.002;
                    self.scene.camera.pan(Vec2::new(-delta.x, delta.y) * factor);
                } else {
                    self.scene
                        .camera
                        .orbit(delta.x * ORBIT_SPEED, delta.y * ORBIT_SPEED);
                }
            }
        }

        let scroll = response.ctx.input(|i| i.raw_scroll_delta.y);
        if scroll != 0.0 {
            self.scene.animator.cancel();
            // One wheel notch is about 50 logical points.
            let steps = scroll / 50.0;
            self.scene.camera.zoom(1.1f32.powf(-steps));
        }

        if !response.ctx.wants_keyboard_input() {
            let (home, focus) = response
                .ctx
                .input(|i| (i.key_pressed(egui::Key::C), i.key_pressed(egui::Key::F)));
            if home {
                self.scene.home();
            }
            if focus {
                self.scene.focus_selection();
            }
        }
    }
}
