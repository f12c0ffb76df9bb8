use std::process;

use eframe::egui;
use neurotess_scene::SceneFormat;

mod app;
mod cli;
mod headless;

fn main() -> eframe::Result<()> {
    let (console, log_level_state) = app::setup_tracing();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "NeuroTess starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    match headless::maybe_run_headless(&args) {
        Ok(true) => return Ok(()),
        Ok(false) => {}
        Err(err) => {
            eprintln!("export error: {err}");
            process::exit(1);
        }
    }

    let options = match cli::parse(&args) {
        Ok(options) => options,
        Err(err) => {
            eprintln!("{err}\n\n{}", cli::USAGE);
            process::exit(1);
        }
    };
    if matches!(options.dataset, Some((_, SceneFormat::BlueConfig))) {
        eprintln!("Support for {} files is not built in", SceneFormat::BlueConfig.label());
        process::exit(1);
    }

    let mut viewport = egui::ViewportBuilder::default().with_inner_size(options.window_size);
    if options.fullscreen {
        viewport = viewport.with_fullscreen(true);
    }
    if options.maximized {
        viewport = viewport.with_maximized(true);
    }
    let native_options = eframe::NativeOptions {
        viewport,
        renderer: eframe::Renderer::Wgpu,
        multisampling: options.samples as u16,
        wgpu_options: eframe::egui_wgpu::WgpuConfiguration {
            present_mode: if options.vsync {
                eframe::egui_wgpu::wgpu::PresentMode::AutoVsync
            } else {
                eframe::egui_wgpu::wgpu::PresentMode::AutoNoVsync
            },
            ..Default::default()
        },
        ..Default::default()
    };

    eframe::run_native(
        "NeuroTess",
        native_options,
        Box::new(move |_cc| {
            let mut app = app::NeuroTessApp::new(console, log_level_state);
            if let Some((path, format)) = options.dataset {
                app.begin_load(path, format);
            }
            Ok(Box::new(app))
        }),
    )
}
