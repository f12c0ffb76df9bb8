use eframe::egui;

use morpho::{FunctionalType, MorphologicalType};
use neurotess_scene::{CameraPosition, ColoringMode};
use render::ViewportOptions;
use tess::SubdivisionCriterion;
use tracing_subscriber::filter::LevelFilter;

use super::NeuroTessApp;

impl eframe::App for NeuroTessApp {
    fn update(&mut self, ctx: &egui::Context, frame: &mut eframe::Frame) {
        let dt = ctx.input(|i| i.stable_dt).min(0.1);
        if self.scene.tick(dt) {
            ctx.request_repaint();
        }
        if let Some(message) = self.scene.take_error() {
            self.error = Some(message);
        }
        self.sync_wgpu_renderer(frame);

        self.top_bar(ctx);
        self.side_panel(ctx);
        self.status_bar(ctx);
        self.console_window(ctx);
        self.error_window(ctx);
        self.central_viewport(ctx);
    }
}

impl NeuroTessApp {
    fn top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Open...").clicked() {
                        self.open_dataset_dialog();
                        ui.close();
                    }
                    if ui.button("Attach spike report...").clicked() {
                        self.attach_spikes_dialog();
                        ui.close();
                    }
                    if ui.button("Close dataset").clicked() {
                        self.close_dataset();
                        ui.close();
                    }
                    ui.separator();
                    if ui.button("Quit").clicked() {
                        ui.ctx().send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });

                ui.separator();
                ui.label("NeuroTess");
                ui.separator();
                ui.checkbox(&mut self.show_console, "Console");
            });
        });
    }

    fn close_dataset(&mut self) {
        self.scene.close();
        if let Some(renderer) = &self.viewport_renderer {
            renderer.clear_scene();
        }
    }

    fn side_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::right("side_panels")
            .resizable(true)
            .default_width(280.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| {
                    self.tessellation_group(ui);
                    self.render_options_group(ui);
                    self.coloring_group(ui);
                    self.selection_group(ui);
                    self.edit_group(ui);
                    self.simulation_group(ui);
                    self.camera_group(ui);
                    self.log_group(ui);
                });
            });
    }

    fn tessellation_group(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new("Tessellation")
            .default_open(true)
            .show(ui, |ui| {
                let mut lod = (self.scene.tessellation.level * 10.0).round() as i32;
                if ui
                    .add(egui::Slider::new(&mut lod, 1..=30).text("Subdivision level"))
                    .changed()
                {
                    self.scene.tessellation.level = lod as f32 / 10.0;
                }

                let mut distance = (self.scene.tessellation.max_distance * 1000.0).round() as i32;
                if ui
                    .add(egui::Slider::new(&mut distance, 0..=1000).text("Distance cutoff"))
                    .changed()
                {
                    self.scene.tessellation.max_distance = distance as f32 / 1000.0;
                }

                ui.horizontal(|ui| {
                    ui.radio_value(
                        &mut self.scene.tessellation.criterion,
                        SubdivisionCriterion::Homogeneous,
                        "Homogeneous",
                    );
                    ui.radio_value(
                        &mut self.scene.tessellation.criterion,
                        SubdivisionCriterion::CameraDistance,
                        "Camera distance",
                    );
                });
            });
    }

    fn render_options_group(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new("Render options")
            .default_open(true)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.color_edit_button_rgb(&mut self.scene.background);
                    ui.label("Background");
                });

                let mut unselected = self.scene.colors.unselected_base();
                ui.horizontal(|ui| {
                    if ui.color_edit_button_rgb(&mut unselected).changed() {
                        self.scene.set_base_color(false, unselected);
                    }
                    ui.label("Unselected base");
                });
                let mut selected = self.scene.colors.selected_base();
                ui.horizontal(|ui| {
                    if ui.color_edit_button_rgb(&mut selected).changed() {
                        self.scene.set_base_color(true, selected);
                    }
                    ui.label("Selected base");
                });

                ui.separator();
                ui.label("Unselected neurons");
                ui.checkbox(&mut self.scene.unselected_paint.soma, "Somas");
                ui.checkbox(&mut self.scene.unselected_paint.neurites, "Neurites");
                ui.label("Selected neurons");
                ui.checkbox(&mut self.scene.selected_paint.soma, "Somas");
                ui.checkbox(&mut self.scene.selected_paint.neurites, "Neurites");

                ui.separator();
                ui.checkbox(&mut self.wireframe, "Wireframe");
            });
    }

    fn coloring_group(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new("Coloring")
            .default_open(false)
            .show(ui, |ui| {
                let mut mode = self.scene.coloring_mode;
                egui::ComboBox::from_label("Mode")
                    .selected_text(mode.label())
                    .show_ui(ui, |ui| {
                        for candidate in ColoringMode::ALL {
                            if ui
                                .selectable_label(mode == candidate, candidate.label())
                                .clicked()
                            {
                                mode = candidate;
                            }
                        }
                    });
                if mode != self.scene.coloring_mode {
                    self.scene.set_coloring_mode(mode);
                }

                match self.scene.coloring_mode {
                    ColoringMode::Selection => {
                        self.category_picker(ui, 0, "Unselected");
                        self.category_picker(ui, 1, "Selected");
                    }
                    ColoringMode::Morphology => {
                        for kind in MorphologicalType::ALL {
                            self.category_picker(ui, kind.id(), kind.label());
                        }
                    }
                    ColoringMode::Layer => {
                        for layer in 1..=6u32 {
                            self.category_picker(ui, layer, &format!("Layer {layer}"));
                        }
                    }
                    ColoringMode::Function => {
                        for kind in FunctionalType::ALL {
                            self.category_picker(ui, kind.id(), kind.label());
                        }
                    }
                }
            });
    }

    fn category_picker(&mut self, ui: &mut egui::Ui, id: u32, label: &str) {
        let mode = self.scene.coloring_mode;
        let mut color = self
            .scene
            .colors
            .color(mode, id)
            .unwrap_or(self.scene.colors.unselected_base());
        ui.horizontal(|ui| {
            if ui.color_edit_button_rgb(&mut color).changed() {
                self.scene.set_color(id, color);
            }
            ui.label(label);
        });
    }

    fn selection_group(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new("Selection")
            .default_open(true)
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    if ui.button("Select all").clicked() {
                        self.scene.select_all();
                    }
                    if ui.button("Clear").clicked() {
                        self.scene.clear_selection();
                    }
                    if ui.button("Focus").clicked() {
                        self.scene.focus_selection();
                    }
                });
                ui.label(format!(
                    "{} of {} selected",
                    self.scene.selection().len(),
                    self.scene.dataset().len()
                ));

                let rows: Vec<(u32, String)> = self
                    .scene
                    .dataset()
                    .neurons
                    .values()
                    .map(|neuron| {
                        (
                            neuron.gid,
                            format!(
                                "{} (layer {}, {})",
                                neuron.gid,
                                neuron.layer,
                                neuron.morphological_type.label()
                            ),
                        )
                    })
                    .collect();
                let mut toggled = None;
                egui::ScrollArea::vertical()
                    .max_height(160.0)
                    .show(ui, |ui| {
                        for (gid, label) in &rows {
                            if ui
                                .selectable_label(self.scene.is_selected(*gid), label)
                                .clicked()
                            {
                                toggled = Some(*gid);
                            }
                        }
                    });
                if let Some(gid) = toggled {
                    self.scene.toggle_selected(gid);
                }
            });
    }

    fn edit_group(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new("Edit")
            .default_open(false)
            .show(ui, |ui| {
                let editing = self.scene.edit().map(|edit| edit.gid);
                let selected_text = match editing {
                    Some(gid) => format!("Neuron {gid}"),
                    None => "None".to_string(),
                };
                let gids: Vec<u32> = self.scene.dataset().neurons.keys().copied().collect();
                let mut picked = None;
                egui::ComboBox::from_label("Neuron")
                    .selected_text(selected_text)
                    .show_ui(ui, |ui| {
                        for gid in &gids {
                            if ui
                                .selectable_label(editing == Some(*gid), format!("Neuron {gid}"))
                                .clicked()
                            {
                                picked = Some(*gid);
                            }
                        }
                    });
                if let Some(gid) = picked {
                    if editing != Some(gid) {
                        self.scene.begin_edit(gid);
                        self.scene.focus_edit();
                    }
                }

                let mut regenerate = false;
                let mut export = None;
                let mut stop = false;
                if let Some(edit) = self.scene.edit_mut() {
                    let mut radius = (edit.alpha_radius * 100.0).round() as i32;
                    if ui
                        .add(egui::Slider::new(&mut radius, 25..=100).text("Soma radius"))
                        .changed()
                    {
                        edit.alpha_radius = radius as f32 * 0.01;
                    }
                    for (index, alpha) in edit.alpha_neurites.iter_mut().enumerate() {
                        let mut scale = (*alpha * 100.0).round() as i32;
                        if ui
                            .add(
                                egui::Slider::new(&mut scale, 0..=200)
                                    .text(format!("Neurite {index}")),
                            )
                            .changed()
                        {
                            *alpha = scale as f32 * 0.01;
                        }
                    }
                    ui.horizontal(|ui| {
                        regenerate = ui.button("Regenerate").clicked();
                        if ui.button("Export...").clicked() {
                            export = Some(edit.gid);
                        }
                        stop = ui.button("Done").clicked();
                    });
                }

                if regenerate {
                    if let Err(err) = self.scene.regenerate_edit_mesh() {
                        let message = err.message();
                        tracing::error!(message, "regeneration failed");
                        self.error = Some(message);
                    }
                }
                if let Some(gid) = export {
                    self.export_mesh_dialog(gid);
                }
                if stop {
                    self.scene.end_edit();
                }
            });
    }

    fn simulation_group(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new("Simulation")
            .default_open(false)
            .show(ui, |ui| {
                if ui.button("Attach spike report...").clicked() {
                    self.attach_spikes_dialog();
                }
                if self.scene.player.is_attached() {
                    let label = if self.scene.player.is_playing() {
                        "Pause"
                    } else {
                        "Play"
                    };
                    if ui.button(label).clicked() {
                        self.scene.play_pause();
                    }
                    ui.label(format!(
                        "{:.1} / {:.1} ms",
                        self.scene.player.time(),
                        self.scene.player.end_time()
                    ));
                } else {
                    ui.label("No spike report attached");
                }
            });
    }

    fn camera_group(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new("Camera")
            .default_open(false)
            .show(ui, |ui| {
                if ui.button("Home").clicked() {
                    self.scene.home();
                }

                ui.separator();
                ui.horizontal(|ui| {
                    ui.text_edit_singleline(&mut self.position_name);
                    if ui.button("Save pose").clicked() {
                        let name = self.position_name.trim();
                        if !name.is_empty() {
                            let camera = self.scene.camera;
                            self.camera_positions.push(CameraPosition {
                                name: name.to_string(),
                                position: camera.position,
                                radius: camera.radius,
                                rotation: camera.rotation,
                            });
                            self.position_name.clear();
                        }
                    }
                });

                let mut applied = None;
                let mut removed = None;
                for (index, position) in self.camera_positions.iter().enumerate() {
                    ui.horizontal(|ui| {
                        if ui.button(&position.name).clicked() {
                            applied = Some(index);
                        }
                        if ui.small_button("Remove").clicked() {
                            removed = Some(index);
                        }
                    });
                }
                if let Some(index) = applied {
                    self.scene.apply_position(&self.camera_positions[index]);
                }
                if let Some(index) = removed {
                    self.camera_positions.remove(index);
                }

                ui.horizontal(|ui| {
                    if ui.button("Load...").clicked() {
                        self.load_positions_dialog();
                    }
                    if ui.button("Save...").clicked() {
                        self.save_positions_dialog();
                    }
                });
            });
    }

    fn log_group(&mut self, ui: &mut egui::Ui) {
        egui::CollapsingHeader::new("Log")
            .default_open(false)
            .show(ui, |ui| {
                egui::ComboBox::from_label("Log level")
                    .selected_text(format!("{:?}", self.log_level))
                    .show_ui(ui, |ui| {
                        for level in [
                            LevelFilter::ERROR,
                            LevelFilter::WARN,
                            LevelFilter::INFO,
                            LevelFilter::DEBUG,
                            LevelFilter::TRACE,
                        ] {
                            if ui
                                .selectable_label(self.log_level == level, format!("{:?}", level))
                                .clicked()
                            {
                                self.set_log_level(level);
                            }
                        }
                    });
            });
    }

    fn status_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let progress = self
                    .scene
                    .load_progress()
                    .map(|(value, message)| (value, message.to_string()));
                if let Some((value, message)) = progress {
                    ui.add(
                        egui::ProgressBar::new(value as f32 / 100.0)
                            .desired_width(200.0)
                            .text(message),
                    );
                } else if let Some(renderer) = &self.viewport_renderer {
                    let stats = renderer.stats_snapshot();
                    ui.label(format!(
                        "{:.0} fps, {} draws, {} triangles, refine {:.2} ms",
                        stats.fps, stats.draw_calls, stats.triangle_count, stats.refine_ms
                    ));
                    if !self.scene.is_empty() {
                        ui.separator();
                        ui.label(self.scene.source_name());
                    }
                }
            });
        });
    }

    fn console_window(&mut self, ctx: &egui::Context) {
        if !self.show_console {
            return;
        }
        let mut open = self.show_console;
        egui::Window::new("Console")
            .open(&mut open)
            .default_size([520.0, 240.0])
            .show(ctx, |ui| {
                let lines = self.console.snapshot();
                egui::ScrollArea::vertical()
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for line in lines {
                            ui.label(line);
                        }
                    });
            });
        self.show_console = open;
    }

    fn error_window(&mut self, ctx: &egui::Context) {
        let Some(message) = self.error.clone() else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new("Error")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, egui::Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(&message);
                if ui.button("Dismiss").clicked() {
                    dismissed = true;
                }
            });
        if dismissed {
            self.error = None;
        }
    }

    fn central_viewport(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let available = ui.available_size();
            let (rect, response) =
                ui.allocate_exact_size(available, egui::Sense::click_and_drag());
            self.handle_viewport_input(&response);

            if let Some(renderer) = &self.viewport_renderer {
                let options = ViewportOptions {
                    wireframe: self.wireframe,
                };
                let callback = renderer.paint_callback(rect, self.scene.camera, options);
                ui.painter().add(egui::Shape::Callback(callback));
            } else {
                ui.painter()
                    .rect_filled(rect, 0.0, egui::Color32::from_rgb(28, 28, 28));
                ui.painter().text(
                    rect.center(),
                    egui::Align2::CENTER_CENTER,
                    "WGPU not ready",
                    egui::FontId::proportional(14.0),
                    egui::Color32::GRAY,
                );
            }
        });
    }
}
