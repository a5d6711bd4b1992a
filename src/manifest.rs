use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::encoding::ArtifactEncoding;
use crate::schema::{
    validate_quality, ArtifactFormat, CanvasSize, DurationPreset, ResolutionPreset,
    DEFAULT_JPEG_QUALITY,
};
use crate::sequence::GenerationRequest;

/// A generation job read from YAML.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct JobManifest {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub duration: Option<DurationPreset>,
    #[serde(default)]
    pub resolution: Option<ResolutionPreset>,
    #[serde(default)]
    pub output: OutputSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputSection {
    #[serde(default)]
    pub format: Option<ArtifactFormat>,
    #[serde(default)]
    pub quality: Option<u8>,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

/// Values that can come from the command line; `None` defers to the job file.
#[derive(Debug, Clone, Default)]
pub struct JobOverrides {
    pub prompt: Option<String>,
    pub duration: Option<DurationPreset>,
    pub resolution: Option<ResolutionPreset>,
    pub size: Option<CanvasSize>,
    pub format: Option<ArtifactFormat>,
    pub quality: Option<u8>,
    pub out_dir: Option<PathBuf>,
}

/// Fully resolved job: CLI flags over job file over defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedJob {
    pub request: GenerationRequest,
    pub resolution: ResolutionPreset,
    pub encoding: ArtifactEncoding,
    pub out_dir: PathBuf,
}

pub fn load_job_manifest(path: &Path) -> Result<JobManifest> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read job file {}", path.display()))?;
    let mut manifest = parse_job_manifest(&contents)
        .map_err(|error| anyhow!("failed to parse yaml in {}: {error}", path.display()))?;

    // Relative output dirs are relative to the job file.
    if let Some(dir) = manifest.output.dir.as_mut() {
        if dir.is_relative() {
            let job_dir = path
                .parent()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
            *dir = job_dir.join(&*dir);
        }
    }
    Ok(manifest)
}

pub fn parse_job_manifest(contents: &str) -> Result<JobManifest> {
    serde_yaml::from_str(contents).map_err(|error| {
        let location = error
            .location()
            .map(|location| format!("line {}, column {}", location.line(), location.column()))
            .unwrap_or_else(|| "unknown location".to_owned());
        anyhow!("{location}: {error}")
    })
}

pub fn resolve_job(manifest: Option<&JobManifest>, overrides: JobOverrides) -> Result<ResolvedJob> {
    let prompt = overrides
        .prompt
        .or_else(|| manifest.and_then(|job| job.prompt.clone()))
        .unwrap_or_default();
    let duration = overrides
        .duration
        .or_else(|| manifest.and_then(|job| job.duration))
        .unwrap_or_default();
    let resolution = overrides
        .resolution
        .or_else(|| manifest.and_then(|job| job.resolution))
        .unwrap_or_default();
    let canvas = overrides.size.unwrap_or_else(|| resolution.canvas());
    let format = overrides
        .format
        .or_else(|| manifest.and_then(|job| job.output.format))
        .unwrap_or_default();
    let quality = overrides
        .quality
        .or_else(|| manifest.and_then(|job| job.output.quality))
        .unwrap_or(DEFAULT_JPEG_QUALITY);
    let quality = validate_quality(quality)?;
    let out_dir = overrides
        .out_dir
        .or_else(|| manifest.and_then(|job| job.output.dir.clone()))
        .unwrap_or_else(|| PathBuf::from("."));

    let request = GenerationRequest::new(prompt, duration, canvas);
    request.validate()?;

    Ok(ResolvedJob {
        request,
        resolution,
        encoding: ArtifactEncoding { format, quality },
        out_dir,
    })
}
