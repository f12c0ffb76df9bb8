use std::path::PathBuf;
use std::process;

use neurotess_scene::SceneFormat;

pub(crate) const USAGE: &str = "\
Usage: neurotess [OPTIONS]

  -swc <file>                 load an SWC morphology on startup
  -xml <file>                 load an XML scene on startup
  -bc <file> -target <name>   load a BlueConfig circuit target
  --fullscreen, -fs           start fullscreen
  --maximize-window, -mw      start maximized
  --window-size, -ws <w> <h>  initial window size in pixels
  --samples, -s <n>           MSAA sample count
  --no-vsync, -nvs            disable vertical sync
  --export [-l <level>] [-f obj|off] <file.swc>...
                              batch export meshes without opening a window
  --version                   print the version and exit
  --help, -h                  print this help and exit

The environment variables CONTEXT_OPENGL_SAMPLES and CONTEXT_OPENGL_VSYNC
take precedence over --samples and --no-vsync.";

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LaunchOptions {
    pub dataset: Option<(PathBuf, SceneFormat)>,
    pub target: Option<String>,
    pub fullscreen: bool,
    pub maximized: bool,
    pub window_size: [f32; 2],
    pub samples: u32,
    pub vsync: bool,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self {
            dataset: None,
            target: None,
            fullscreen: false,
            maximized: false,
            window_size: [1200.0, 800.0],
            samples: 1,
            vsync: true,
        }
    }
}

pub(crate) fn parse(args: &[String]) -> Result<LaunchOptions, String> {
    let mut options = LaunchOptions::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-swc" => {
                let path = value(&mut iter, "-swc")?;
                set_dataset(&mut options, path, SceneFormat::Swc)?;
            }
            "-xml" => {
                let path = value(&mut iter, "-xml")?;
                set_dataset(&mut options, path, SceneFormat::XmlScene)?;
            }
            "-bc" => {
                let path = value(&mut iter, "-bc")?;
                set_dataset(&mut options, path, SceneFormat::BlueConfig)?;
            }
            "-target" => {
                options.target = Some(value(&mut iter, "-target")?);
            }
            "--fullscreen" | "-fs" => options.fullscreen = true,
            "--maximize-window" | "-mw" => options.maximized = true,
            "--window-size" | "-ws" => {
                let width: f32 = number(&mut iter, "--window-size")?;
                let height: f32 = number(&mut iter, "--window-size")?;
                options.window_size = [width, height];
            }
            "--samples" | "-s" => {
                options.samples = number(&mut iter, "--samples")?;
            }
            "--no-vsync" | "-nvs" => options.vsync = false,
            "--version" => {
                println!("neurotess {}", env!("CARGO_PKG_VERSION"));
                process::exit(0);
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                process::exit(0);
            }
            other => return Err(format!("Unknown argument \"{other}\"")),
        }
    }

    apply_env(
        &mut options,
        std::env::var("CONTEXT_OPENGL_SAMPLES").ok(),
        std::env::var("CONTEXT_OPENGL_VSYNC").ok(),
    );
    Ok(options)
}

fn set_dataset(
    options: &mut LaunchOptions,
    path: String,
    format: SceneFormat,
) -> Result<(), String> {
    if options.dataset.is_some() {
        return Err("Only one of -swc, -xml and -bc may be given".to_string());
    }
    options.dataset = Some((PathBuf::from(path), format));
    Ok(())
}

fn value<'a>(
    iter: &mut impl Iterator<Item = &'a String>,
    flag: &str,
) -> Result<String, String> {
    iter.next()
        .cloned()
        .ok_or_else(|| format!("{flag} requires a value"))
}

fn number<'a, T, I>(iter: &mut I, flag: &str) -> Result<T, String>
where
    T: std::str::FromStr,
    I: Iterator<Item = &'a String>,
{
    let text = value(iter, flag)?;
    text.parse::<T>()
        .map_err(|_| format!("{flag} needs a number, got \"{text}\""))
}

/// Applies the historical environment overrides on top of the parsed flags.
fn apply_env(options: &mut LaunchOptions, samples: Option<String>, vsync: Option<String>) {
    if let Some(text) = samples {
        match text.trim().parse::<u32>() {
            Ok(count) => options.samples = count,
            Err(_) => {
                tracing::warn!(value = %text, "ignoring unparsable CONTEXT_OPENGL_SAMPLES")
            }
        }
    }
    if let Some(text) = vsync {
        match text.trim().parse::<i32>() {
            Ok(flag) => options.vsync = flag != 0,
            Err(_) => tracing::warn!(value = %text, "ignoring unparsable CONTEXT_OPENGL_VSYNC"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn defaults_match_an_empty_command_line() {
        let options = parse(&args(&[])).expect("parse");
        assert_eq!(options.window_size, [1200.0, 800.0]);
        assert_eq!(options.samples, 1);
        assert!(options.vsync);
        assert!(!options.fullscreen);
        assert!(!options.maximized);
        assert!(options.dataset.is_none());
    }

    #[test]
    fn dataset_flags_are_mutually_exclusive() {
        let err = parse(&args(&["-swc", "a.swc", "-xml", "b.xml"])).unwrap_err();
        assert!(err.contains("Only one of"));
        let err = parse(&args(&["-xml", "b.xml", "-bc", "c.json"])).unwrap_err();
        assert!(err.contains("Only one of"));
    }

    #[test]
    fn blueconfig_takes_a_target() {
        let options = parse(&args(&["-bc", "circuit.json", "-target", "MiniColumn"]))
            .expect("parse");
        let (path, format) = options.dataset.expect("dataset");
        assert_eq!(path, PathBuf::from("circuit.json"));
        assert_eq!(format, SceneFormat::BlueConfig);
        assert_eq!(options.target.as_deref(), Some("MiniColumn"));
    }

    #[test]
    fn window_geometry_flags_parse() {
        let options = parse(&args(&["-ws", "1600", "1000", "-fs", "-mw"])).expect("parse");
        assert_eq!(options.window_size, [1600.0, 1000.0]);
        assert!(options.fullscreen);
        assert!(options.maximized);
    }

    #[test]
    fn sampling_flags_parse() {
        let options = parse(&args(&["-s", "4", "-nvs"])).expect("parse");
        assert_eq!(options.samples, 4);
        assert!(!options.vsync);
    }

    #[test]
    fn unknown_arguments_are_rejected() {
        let err = parse(&args(&["--frobnicate"])).unwrap_err();
        assert!(err.contains("Unknown argument"));
    }

    #[test]
    fn missing_values_are_reported() {
        let err = parse(&args(&["-swc"])).unwrap_err();
        assert!(err.contains("-swc requires"));
        let err = parse(&args(&["-ws", "800"])).unwrap_err();
        assert!(err.contains("--window-size"));
    }

    #[test]
    fn environment_overrides_beat_flags() {
        let mut options = LaunchOptions {
            samples: 2,
            vsync: false,
            ..LaunchOptions::default()
        };
        apply_env(&mut options, Some("8".to_string()), Some("1".to_string()));
        assert_eq!(options.samples, 8);
        assert!(options.vsync);
    }

    #[test]
    fn unparsable_environment_values_are_ignored() {
        let mut options = LaunchOptions {
            samples: 2,
            vsync: false,
            ..LaunchOptions::default()
        };
        apply_env(&mut options, Some("lots".to_string()), Some("maybe".to_string()));
        assert_eq!(options.samples, 2);
        assert!(!options.vsync);
    }
}
