use std::path::PathBuf;

use rfd::FileDialog;

use morpho::load_spikes;
use neurotess_scene::{load_positions, save_positions, SceneFormat};
use tess::{write_obj, write_off, ExportFormat, ExportInfo};

use super::NeuroTessApp;

impl NeuroTessApp {
    pub(crate) fn begin_load(&mut self, path: PathBuf, format: SceneFormat) {
        if let Err(message) = self.scene.begin_load(&path, format) {
            tracing::error!(message, "cannot start load");
            self.error = Some(message);
        }
    }

    pub(super) fn open_dataset_dialog(&mut self) {
        let Some(path) = FileDialog::new()
            .add_filter("Neuron datasets", &["swc", "xml"])
            .add_filter("SWC morphology", &["swc"])
            .add_filter("XML scene", &["xml"])
            .pick_file()
        else {
            return;
        };
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("xml") => SceneFormat::XmlScene,
            _ => SceneFormat::Swc,
        };
        self.begin_load(path, format);
    }

    pub(super) fn attach_spikes_dialog(&mut self) {
        let Some(path) = FileDialog::new()
            .add_filter("Spike reports", &["dat", "spikes", "txt"])
            .pick_file()
        else {
            return;
        };
        match load_spikes(&path) {
            Ok(report) => self.scene.attach_spikes(report),
            Err(err) => {
                let message = err.message();
                tracing::error!(message, "cannot read spike report");
                self.error = Some(message);
            }
        }
    }

    pub(super) fn export_mesh_dialog(&mut self, gid: u32) {
        let Some(mesh) = self.scene.extract_mesh(gid) else {
            tracing::warn!(gid, "no mesh to export");
            return;
        };
        let Some(path) = FileDialog::new()
            .add_filter("OBJ mesh", &["obj"])
            .add_filter("OFF mesh", &["off"])
            .set_file_name(format!("neuron_{gid}.obj"))
            .save_file()
        else {
            return;
        };
        let format = match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("off") => ExportFormat::Off,
            _ => ExportFormat::Obj,
        };
        let source = self.scene.source_name();
        let info = ExportInfo {
            tool: "NeuroTess",
            version: env!("CARGO_PKG_VERSION"),
            source: &source,
            level: self.scene.tessellation.level,
        };
        let result = match format {
            ExportFormat::Obj => write_obj(&path, &mesh, &info),
            ExportFormat::Off => write_off(&path, &mesh, &info),
        };
        if let Err(message) = result {
            tracing::error!(message, "mesh export failed");
            self.error = Some(message);
        }
    }

    pub(super) fn load_positions_dialog(&mut self) {
        let Some(path) = FileDialog::new()
            .add_filter("Camera positions", &["json"])
            .pick_file()
        else {
            return;
        };
        match load_positions(&path, &self.scene.source_name()) {
            Ok(positions) => self.camera_positions = positions,
            Err(err) => {
                let message = err.message();
                tracing::error!(message, "cannot load camera positions");
                self.error = Some(message);
            }
        }
    }

    pub(super) fn save_positions_dialog(&mut self) {
        let Some(path) = FileDialog::new()
            .add_filter("Camera positions", &["json"])
            .set_file_name("positions.json")
            .save_file()
        else {
            return;
        };
        if let Err(err) = save_positions(&path, &self.scene.source_name(), &self.camera_positions)
        {
            let message = err.message();
            tracing::error!(message, "cannot save camera positions");
            self.error = Some(message);
        }
    }
}
