use std::path::{Path, PathBuf};

use glam::Mat4;

use morpho::{load_swc, MorphologyId};
use tess::{
    generate_mesh, refine_mesh, write_obj, write_off, ExportFormat, ExportInfo,
    TessellationParams,
};

struct ExportJob {
    level: f32,
    format: ExportFormat,
    inputs: Vec<PathBuf>,
}

/// Looks for `--export` and runs the batch exporter when it is present.
/// `Ok(true)` means the process is done and no window should open.
pub(crate) fn maybe_run_headless(args: &[String]) -> Result<bool, String> {
    if !args.iter().any(|arg| arg == "--export") {
        return Ok(false);
    }

    let job = parse_export_args(args)?;
    for input in &job.inputs {
        export_one(input, &job)?;
    }
    tracing::info!(files = job.inputs.len(), "batch export completed");
    Ok(true)
}

fn parse_export_args(args: &[String]) -> Result<ExportJob, String> {
    let mut level = TessellationParams::default().level;
    let mut format = ExportFormat::Obj;
    let mut inputs = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--export" => {}
            "-l" => {
                let text = iter
                    .next()
                    .ok_or_else(|| "-l requires a subdivision level".to_string())?;
                level = text
                    .parse::<f32>()
                    .map_err(|_| format!("-l needs a number, got \"{text}\""))?;
            }
            "-f" => {
                let text = iter
                    .next()
                    .ok_or_else(|| "-f requires a format".to_string())?;
                format = ExportFormat::parse(text)
                    .ok_or_else(|| format!("Unknown export format \"{text}\""))?;
            }
            flag if flag.starts_with('-') => {
                return Err(format!("Unknown argument \"{flag}\""));
            }
            input => inputs.push(PathBuf::from(input)),
        }
    }

    if inputs.is_empty() {
        return Err("--export needs at least one input file".to_string());
    }
    Ok(ExportJob {
        level,
        format,
        inputs,
    })
}

fn export_one(input: &Path, job: &ExportJob) -> Result<(), String> {
    let morphology = load_swc(input, MorphologyId(0)).map_err(|err| err.message())?;
    let patches = generate_mesh(&morphology).map_err(|err| err.message())?;
    let params = TessellationParams {
        level: job.level,
        ..TessellationParams::default()
    };
    let mesh = refine_mesh(&patches, &params, None, Mat4::IDENTITY, true, true);

    let source = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.display().to_string());
    let info = ExportInfo {
        tool: "NeuroTess",
        version: env!("CARGO_PKG_VERSION"),
        source: &source,
        level: job.level,
    };
    let output = input.with_extension(job.format.extension());
    match job.format {
        ExportFormat::Obj => write_obj(&output, &mesh, &info)?,
        ExportFormat::Off => write_off(&output, &mesh, &info)?,
    }
    Ok(())
}
