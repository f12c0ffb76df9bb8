use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use egui::epaint::Rect;
use egui_wgpu::{CallbackResources, CallbackTrait};

use neurotess_scene::OrbitCamera;
use tess::{refine_mesh, RefineContext};

use super::pipeline::{
    ensure_draw_capacity, ensure_offscreen_targets, DrawUniform, Globals, PipelineState,
};
use super::{ViewportOptions, ViewportSceneState, ViewportStatsState};
use crate::camera::camera_view_proj;
use crate::mesh_cache::{mesh_signature, MeshKey};

pub(super) struct ViewportCallback {
    pub(super) target_format: egui_wgpu::wgpu::TextureFormat,
    pub(super) rect: Rect,
    pub(super) camera: OrbitCamera,
    pub(super) options: ViewportOptions,
    pub(super) stats: Arc<Mutex<ViewportStatsState>>,
    pub(super) scene: Arc<Mutex<ViewportSceneState>>,
}

impl CallbackTrait for ViewportCallback {
    fn prepare(
        &self,
        device: &egui_wgpu::wgpu::Device,
        queue: &egui_wgpu::wgpu::Queue,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
        _egui_encoder: &mut egui_wgpu::wgpu::CommandEncoder,
        callback_resources: &mut CallbackResources,
    ) -> Vec<egui_wgpu::wgpu::CommandBuffer> {
        if callback_resources.get::<PipelineState>().is_none() {
            callback_resources.insert(PipelineState::new(device, self.target_format));
        }

        let view_proj = camera_view_proj(&self.camera, self.rect, screen_descriptor);
        let eye = self.camera.eye();
        // View basis in world space: the rotation rows are right, up and
        // the direction the camera looks away from.
        let right = self.camera.rotation.row(0);
        let up = self.camera.rotation.row(1);
        let backward = self.camera.rotation.row(2);
        let light_dir = (backward + right * 0.4 + up * 0.6).normalize_or_zero();

        let scene = match self.scene.lock() {
            Ok(state) => state.scene.clone(),
            Err(_) => None,
        };

        if let Some(pipeline) = callback_resources.get_mut::<PipelineState>() {
            let width = (self.rect.width() * screen_descriptor.pixels_per_point)
                .round()
                .max(1.0) as u32;
            let height = (self.rect.height() * screen_descriptor.pixels_per_point)
                .round()
                .max(1.0) as u32;
            ensure_offscreen_targets(device, pipeline, self.target_format, width, height);

            let mut draws: Vec<(MeshKey, DrawUniform)> = Vec::new();
            let mut live: HashSet<MeshKey> = HashSet::new();
            let mut refine_seconds = 0.0f32;
            let mut triangle_count = 0u32;
            let mut vertex_count = 0u32;
            if let Some(scene) = &scene {
                let context = RefineContext {
                    eye,
                    far_plane: self.camera.far,
                };
                for instance in &scene.instances {
                    if !instance.soma && !instance.neurites {
                        continue;
                    }
                    let signature = mesh_signature(
                        &instance.mesh,
                        &scene.params,
                        Some(&context),
                        instance.model,
                        instance.soma,
                        instance.neurites,
                    );
                    let key = (instance.mesh_id, signature);
                    let entry = pipeline.mesh_cache.ensure(device, key, || {
                        let start = Instant::now();
                        let refined = refine_mesh(
                            &instance.mesh,
                            &scene.params,
                            Some(&context),
                            instance.model,
                            instance.soma,
                            instance.neurites,
                        );
                        refine_seconds += start.elapsed().as_secs_f32();
                        refined
                    });
                    // Empty entries stay live so they are not re-refined
                    // every frame, they just issue no draw.
                    live.insert(key);
                    if entry.index_count == 0 {
                        continue;
                    }
                    triangle_count += entry.index_count / 3;
                    vertex_count += entry.vertex_count;
                    draws.push((
                        key,
                        DrawUniform {
                            model: instance.model.to_cols_array_2d(),
                            color: [
                                instance.color[0],
                                instance.color[1],
                                instance.color[2],
                                1.0,
                            ],
                        },
                    ));
                }
            }
            pipeline.mesh_cache.retain(&live);

            ensure_draw_capacity(device, pipeline, draws.len() as u32);
            if !draws.is_empty() {
                let stride = pipeline.draw_stride as usize;
                let mut staging = vec![0u8; draws.len() * stride];
                for (i, (_, uniform)) in draws.iter().enumerate() {
                    let bytes = bytemuck::bytes_of(uniform);
                    staging[i * stride..i * stride + bytes.len()].copy_from_slice(bytes);
                }
                queue.write_buffer(&pipeline.draw_buffer, 0, &staging);
            }

            let globals = Globals {
                view_proj: view_proj.to_cols_array_2d(),
                light_dir: light_dir.to_array(),
                _pad0: 0.0,
                eye: eye.to_array(),
                _pad1: 0.0,
            };
            queue.write_buffer(&pipeline.globals_buffer, 0, bytemuck::bytes_of(&globals));

            if let Ok(mut stats_state) = self.stats.lock() {
                let now = Instant::now();
                if let Some(last) = stats_state.last_frame {
                    let dt = (now - last).as_secs_f32();
                    if dt > 0.0 {
                        let fps = 1.0 / dt;
                        let frame_ms = dt * 1000.0;
                        let alpha = 0.1;
                        if stats_state.stats.fps == 0.0 {
                            stats_state.stats.fps = fps;
                            stats_state.stats.frame_time_ms = frame_ms;
                        } else {
                            stats_state.stats.fps += (fps - stats_state.stats.fps) * alpha;
                            stats_state.stats.frame_time_ms +=
                                (frame_ms - stats_state.stats.frame_time_ms) * alpha;
                        }
                    }
                }
                stats_state.last_frame = Some(now);

                let cache_stats = pipeline.mesh_cache.stats_snapshot();
                stats_state.stats.mesh_count = cache_stats.mesh_count;
                stats_state.stats.cache_hits = cache_stats.hits;
                stats_state.stats.cache_misses = cache_stats.misses;
                stats_state.stats.cache_uploads = cache_stats.uploads;
                stats_state.stats.draw_calls = draws.len() as u32;
                stats_state.stats.triangle_count = triangle_count;
                stats_state.stats.vertex_count = vertex_count;
                stats_state.stats.refine_ms = refine_seconds * 1000.0;
            }

            let background = scene
                .as_ref()
                .map(|scene| scene.background)
                .unwrap_or([0.15, 0.15, 0.17]);
            let mut render_pass =
                _egui_encoder.begin_render_pass(&egui_wgpu::wgpu::RenderPassDescriptor {
                    label: Some("neurotess_viewport_offscreen"),
                    color_attachments: &[Some(egui_wgpu::wgpu::RenderPassColorAttachment {
                        view: &pipeline.offscreen_view,
                        resolve_target: None,
                        depth_slice: None,
                        ops: egui_wgpu::wgpu::Operations {
                            load: egui_wgpu::wgpu::LoadOp::Clear(egui_wgpu::wgpu::Color {
                                r: background[0] as f64,
                                g: background[1] as f64,
                                b: background[2] as f64,
                                a: 1.0,
                            }),
                            store: egui_wgpu::wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: Some(
                        egui_wgpu::wgpu::RenderPassDepthStencilAttachment {
                            view: &pipeline.depth_view,
                            depth_ops: Some(egui_wgpu::wgpu::Operations {
                                load: egui_wgpu::wgpu::LoadOp::Clear(1.0),
                                store: egui_wgpu::wgpu::StoreOp::Store,
                            }),
                            stencil_ops: None,
                        },
                    ),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });

            render_pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
            if !draws.is_empty() {
                if self.options.wireframe {
                    render_pass.set_pipeline(&pipeline.wire_pipeline);
                } else {
                    render_pass.set_pipeline(&pipeline.mesh_pipeline);
                }
                render_pass.set_bind_group(0, &pipeline.globals_bind_group, &[]);
                for (i, (key, _)) in draws.iter().enumerate() {
                    let Some(entry) = pipeline.mesh_cache.entry(key) else {
                        continue;
                    };
                    let offset = (i as u64 * pipeline.draw_stride) as u32;
                    render_pass.set_bind_group(1, &pipeline.draw_bind_group, &[offset]);
                    render_pass.set_vertex_buffer(0, entry.vertex_buffer.slice(..));
                    if self.options.wireframe {
                        render_pass.set_index_buffer(
                            entry.line_buffer.slice(..),
                            egui_wgpu::wgpu::IndexFormat::Uint32,
                        );
                        render_pass.draw_indexed(0..entry.line_count, 0, 0..1);
                    } else {
                        render_pass.set_index_buffer(
                            entry.index_buffer.slice(..),
                            egui_wgpu::wgpu::IndexFormat::Uint32,
                        );
                        render_pass.draw_indexed(0..entry.index_count, 0, 0..1);
                    }
                }
            }
        }

        Vec::new()
    }

    fn paint(
        &self,
        info: egui::epaint::PaintCallbackInfo,
        render_pass: &mut egui_wgpu::wgpu::RenderPass<'static>,
        callback_resources: &CallbackResources,
    ) {
        let viewport = info.viewport_in_pixels();
        if viewport.width_px <= 0 || viewport.height_px <= 0 {
            return;
        }

        let clip = info.clip_rect_in_pixels();
        if clip.width_px <= 0 || clip.height_px <= 0 {
            return;
        }

        let Some(pipeline) = callback_resources.get::<PipelineState>() else {
            return;
        };

        render_pass.set_viewport(
            viewport.left_px as f32,
            viewport.top_px as f32,
            viewport.width_px as f32,
            viewport.height_px as f32,
            0.0,
            1.0,
        );
        render_pass.set_scissor_rect(
            clip.left_px.max(0) as u32,
            clip.top_px.max(0) as u32,
            clip.width_px.max(0) as u32,
            clip.height_px.max(0) as u32,
        );
        render_pass.set_pipeline(&pipeline.blit_pipeline);
        render_pass.set_bind_group(0, &pipeline.blit_bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}
