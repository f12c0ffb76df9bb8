use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, Sender};

use morpho::{load_swc_dataset, parse_xml_scene, Dataset};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneFormat {
    Swc,
    XmlScene,
    BlueConfig,
    Hdf5,
}

impl SceneFormat {
    pub fn label(&self) -> &'static str {
        match self {
            SceneFormat::Swc => "SWC morphology",
            SceneFormat::XmlScene => "XML scene",
            SceneFormat::BlueConfig => "BlueConfig circuit",
            SceneFormat::Hdf5 => "HDF5 circuit",
        }
    }
}

#[derive(Debug)]
pub enum LoadEvent {
    Progress { value: u32, message: String },
    Finished(Dataset),
    Failed { message: String },
}

/// Receiving end of one in-flight load. The worker thread detaches and
/// runs to completion; dropping the loader just abandons its events.
#[derive(Debug)]
pub struct DatasetLoader {
    receiver: Receiver<LoadEvent>,
}

impl DatasetLoader {
    pub fn poll(&self) -> Option<LoadEvent> {
        self.receiver.try_recv().ok()
    }
}

/// Starts a worker thread parsing the dataset. Formats whose support is
/// not built in fail synchronously, before any thread spawns.
pub fn spawn_load(path: &Path, format: SceneFormat) -> Result<DatasetLoader, String> {
    match format {
        SceneFormat::BlueConfig | SceneFormat::Hdf5 => {
            return Err(format!(
                "Support for {} files is not built in",
                format.label()
            ));
        }
        SceneFormat::Swc | SceneFormat::XmlScene => {}
    }

    let (sender, receiver) = channel();
    let path = path.to_path_buf();
    std::thread::spawn(move || {
        run_load(&path, format, &sender);
        tracing::debug!(path = %path.display(), "load worker finished");
    });
    Ok(DatasetLoader { receiver })
}

fn progress(sender: &Sender<LoadEvent>, value: u32, message: String) {
    let _ = sender.send(LoadEvent::Progress { value, message });
}

fn run_load(path: &PathBuf, format: SceneFormat, sender: &Sender<LoadEvent>) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    progress(sender, 10, format!("Loading {name}"));

    let result = match format {
        SceneFormat::Swc => {
            progress(sender, 50, "Loading Neuron".to_string());
            load_swc_dataset(path).map_err(|err| err.message())
        }
        SceneFormat::XmlScene => {
            progress(sender, 25, "Loading Scene".to_string());
            match std::fs::read_to_string(path) {
                Ok(source) => {
                    progress(sender, 50, "Loading Morphologies".to_string());
                    let base = path.parent().unwrap_or_else(|| Path::new("."));
                    parse_xml_scene(&source, base)
                        .map(|mut dataset| {
                            dataset.source = Some(path.clone());
                            dataset
                        })
                        .map_err(|err| err.message())
                }
                Err(err) => Err(format!("Cannot read {}: {err}", path.display())),
            }
        }
        SceneFormat::BlueConfig | SceneFormat::Hdf5 => unreachable!(),
    };

    match result {
        Ok(dataset) => {
            tracing::info!(
                path = %path.display(),
                neurons = dataset.len(),
                morphologies = dataset.morphologies.len(),
                "dataset loaded"
            );
            progress(sender, 100, "Generating Meshes".to_string());
            let _ = sender.send(LoadEvent::Finished(dataset));
        }
        Err(message) => {
            tracing::error!(path = %path.display(), message, "load failed");
            let _ = sender.send(LoadEvent::Failed { message });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(10);

    fn write_temp_swc(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(
            &path,
            "1 1 0 0 0 5 -1\n2 3 0 10 0 1 1\n3 3 0 20 0 1 2\n",
        )
        .expect("write fixture");
        path
    }

    #[test]
    fn swc_load_reports_milestones_then_finishes() {
        let path = write_temp_swc("neurotess_loader_ok.swc");
        let loader = spawn_load(&path, SceneFormat::Swc).expect("spawn");

        let mut values = Vec::new();
        let dataset = loop {
            match loader.receiver.recv_timeout(TIMEOUT).expect("event") {
                LoadEvent::Progress { value, .. } => values.push(value),
                LoadEvent::Finished(dataset) => break dataset,
                LoadEvent::Failed { message } => panic!("unexpected failure: {message}"),
            }
        };
        std::fs::remove_file(&path).ok();

        assert_eq!(values, vec![10, 50, 100]);
        assert_eq!(dataset.len(), 1);
        assert_eq!(dataset.morphologies.len(), 1);
    }

    #[test]
    fn missing_file_fails_with_a_message() {
        let path = std::env::temp_dir().join("neurotess_loader_missing.swc");
        let loader = spawn_load(&path, SceneFormat::Swc).expect("spawn");
        loop {
            match loader.receiver.recv_timeout(TIMEOUT).expect("event") {
                LoadEvent::Progress { .. } => {}
                LoadEvent::Failed { message } => {
                    assert!(!message.is_empty());
                    break;
                }
                LoadEvent::Finished(_) => panic!("load should have failed"),
            }
        }
    }

    #[test]
    fn unsupported_formats_fail_before_spawning() {
        let path = Path::new("circuit.h5");
        let err = spawn_load(path, SceneFormat::Hdf5).unwrap_err();
        assert!(err.contains("not built in"));
        let err = spawn_load(path, SceneFormat::BlueConfig).unwrap_err();
        assert!(err.contains("not built in"));
    }

    #[test]
    fn xml_scene_load_walks_its_own_milestones() {
        let dir = std::env::temp_dir().join("neurotess_loader_xml");
        std::fs::create_dir_all(&dir).expect("temp dir");
        std::fs::write(
            dir.join("cell.swc"),
            "1 1 0 0 0 5 -1\n2 3 0 10 0 1 1\n",
        )
        .expect("write swc");
        let scene_path = dir.join("scene.xml");
        std::fs::write(
            &scene_path,
            "<scene version=\"0.1\">\n<morphologies>\n<morphology id=\"0\" swc=\"cell.swc\"/>\n</morphologies>\n<neurons>\n<neuron gid=\"1\" morphology=\"0\"/>\n<neuron gid=\"2\" morphology=\"0\"/>\n</neurons>\n</scene>\n",
        )
        .expect("write scene");

        let loader = spawn_load(&scene_path, SceneFormat::XmlScene).expect("spawn");
        let mut values = Vec::new();
        let dataset = loop {
            match loader.receiver.recv_timeout(TIMEOUT).expect("event") {
                LoadEvent::Progress { value, .. } => values.push(value),
                LoadEvent::Finished(dataset) => break dataset,
                LoadEvent::Failed { message } => panic!("unexpected failure: {message}"),
            }
        };
        std::fs::remove_dir_all(&dir).ok();

        assert_eq!(values, vec![10, 25, 50, 100]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.source_name(), "scene.xml");
    }
}
