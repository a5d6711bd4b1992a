use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;

use anyhow::{anyhow, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use serde::Serialize;
use tracing::level_filters::LevelFilter;

use sora::encoding::{
    now_epoch_millis, write_artifact, write_timestamped_artifact, ArtifactEncoding, FrameDirSink,
};
use sora::error_codes::{find_coded_error, internal_envelope};
use sora::manifest::{load_job_manifest, resolve_job, JobOverrides, ResolvedJob};
use sora::renderer::{FrameRenderer, RenderParams};
use sora::schema::{parse_quality, ArtifactFormat, CanvasSize, DurationPreset, ResolutionPreset};
use sora::sequence::{
    generate, GenerationReport, GenerationStatus, LogProgress, RepresentativeFrame, SequencePlan,
    TeeSink,
};

const VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), " (", env!("SORA_GIT_HASH"), ")");

#[derive(Debug, Parser)]
#[command(name = "sora")]
#[command(version = VERSION)]
#[command(about = "Procedural placeholder-video generator")]
struct Cli {
    /// More log output on stderr (-v debug, -vv trace).
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    verbose: u8,
    /// Only log errors.
    #[arg(short = 'q', long = "quiet", global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render the full frame sequence and save the middle frame.
    Generate(GenerateArgs),
    /// Render a single instant.
    Frame(FrameArgs),
    /// Validate a job file and print its plan.
    Check {
        job: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

// Raw text; parsed in the command runners into coded errors.
#[derive(Debug, Args)]
struct CanvasArgs {
    /// 720p, 1080p or 4K.
    #[arg(long)]
    resolution: Option<String>,
    /// Explicit canvas size, e.g. 320x180. Wins over --resolution.
    #[arg(long)]
    size: Option<String>,
}

impl CanvasArgs {
    fn resolution(&self) -> Result<Option<ResolutionPreset>> {
        self.resolution
            .as_deref()
            .map(ResolutionPreset::from_label)
            .transpose()
    }

    fn size(&self) -> Result<Option<CanvasSize>> {
        self.size.as_deref().map(CanvasSize::parse).transpose()
    }
}

#[derive(Debug, Args)]
struct GenerateArgs {
    #[arg(long)]
    prompt: Option<String>,
    /// Seconds: 3, 5, 10 or 15.
    #[arg(long)]
    duration: Option<String>,
    #[command(flatten)]
    canvas: CanvasArgs,
    /// YAML job file; flags override its values.
    #[arg(long)]
    job: Option<PathBuf>,
    /// jpeg, png or webp.
    #[arg(long)]
    format: Option<String>,
    /// JPEG quality, 1-100.
    #[arg(long)]
    quality: Option<String>,
    /// Directory for the timestamped artifact.
    #[arg(long = "out-dir")]
    out_dir: Option<PathBuf>,
    /// Exact artifact path instead of sora-<millis>.<ext>.
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,
    /// Also write every frame as PNG into this directory.
    #[arg(long = "frames-dir")]
    frames_dir: Option<PathBuf>,
    /// Font file to use instead of the bundled one.
    #[arg(long)]
    font: Option<PathBuf>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct FrameArgs {
    #[arg(long, default_value = "")]
    prompt: String,
    /// Seconds since the start of the sequence.
    #[arg(long, default_value_t = 0.0)]
    time: f64,
    #[command(flatten)]
    canvas: CanvasArgs,
    #[arg(long)]
    format: Option<String>,
    #[arg(long)]
    quality: Option<String>,
    #[arg(short = 'o', long = "output")]
    output: PathBuf,
    #[arg(long)]
    font: Option<PathBuf>,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Serialize)]
struct GenerateSummary {
    ok: bool,
    status: GenerationStatus,
    frames_rendered: u32,
    plan: SequencePlan,
    canvas: CanvasSize,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frames_dir: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct CheckSummary {
    ok: bool,
    prompt: String,
    resolution: String,
    canvas: CanvasSize,
    plan: SequencePlan,
    format: ArtifactFormat,
    quality: u8,
    out_dir: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let json = match &cli.command {
        Commands::Generate(args) => args.json,
        Commands::Check { json, .. } => *json,
        Commands::Frame(args) => args.json,
    };

    let result = match cli.command {
        Commands::Generate(args) => run_generate(args),
        Commands::Frame(args) => run_frame(args),
        Commands::Check { job, json } => run_check(&job, json),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => report_error(&error, json),
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::ERROR
    } else {
        match verbose {
            0 => LevelFilter::INFO,
            1 => LevelFilter::DEBUG,
            _ => LevelFilter::TRACE,
        }
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn report_error(error: &anyhow::Error, json: bool) -> ExitCode {
    let coded = find_coded_error(error);
    if json {
        let envelope = coded.map_or_else(|| internal_envelope(error), |coded| coded.envelope());
        match serde_json::to_string_pretty(&envelope) {
            Ok(text) => println!("{text}"),
            Err(_) => eprintln!("error: {error:#}"),
        }
    } else {
        eprintln!("error: {error:#}");
    }

    ExitCode::from(coded.map_or(1, |coded| coded.exit_code()))
}

fn build_renderer(font: Option<&Path>) -> Result<FrameRenderer> {
    match font {
        Some(path) => FrameRenderer::from_font_file(path),
        None => FrameRenderer::new(),
    }
}

fn parse_format(raw: Option<&str>) -> Result<Option<ArtifactFormat>> {
    raw.map(ArtifactFormat::from_keyword).transpose()
}

fn parse_quality_flag(raw: Option<&str>) -> Result<Option<u8>> {
    raw.map(parse_quality).transpose()
}

fn resolve_generate_job(args: &GenerateArgs) -> Result<ResolvedJob> {
    let overrides = JobOverrides {
        prompt: args.prompt.clone(),
        duration: args.duration.as_deref().map(DurationPreset::parse).transpose()?,
        resolution: args.canvas.resolution()?,
        size: args.canvas.size()?,
        format: parse_format(args.format.as_deref())?,
        quality: parse_quality_flag(args.quality.as_deref())?,
        out_dir: args.out_dir.clone(),
    };
    let manifest = args.job.as_deref().map(load_job_manifest).transpose()?;
    resolve_job(manifest.as_ref(), overrides)
}

fn run_generate(args: GenerateArgs) -> Result<()> {
    let job = resolve_generate_job(&args)?;
    let mut renderer = build_renderer(args.font.as_deref())?;
    let plan = SequencePlan::new(job.request.duration);
    tracing::info!(
        frames = plan.total_frames,
        canvas = %job.request.canvas,
        "generating"
    );

    let mut keep = RepresentativeFrame::for_plan(&plan);
    let mut progress = LogProgress::new(plan.fps);
    // Nothing sets this from the CLI; library callers may cancel a run.
    let cancel = AtomicBool::new(false);
    let report = match args.frames_dir.as_deref() {
        Some(dir) => {
            let mut export = FrameDirSink::create(dir)?;
            let mut tee = TeeSink::new(&mut keep, &mut export);
            generate(&mut renderer, &job.request, &mut tee, &mut progress, &cancel)?
        }
        None => generate(&mut renderer, &job.request, &mut keep, &mut progress, &cancel)?,
    };

    let artifact = match (report.is_complete(), keep.frame()) {
        (true, Some(frame)) => Some(match args.output.as_deref() {
            Some(path) => write_artifact(frame, job.encoding, path)?,
            None => write_timestamped_artifact(
                frame,
                job.encoding,
                &job.out_dir,
                now_epoch_millis(),
            )?,
        }),
        (true, None) => {
            return Err(anyhow!(
                "sequence completed without frame {}",
                plan.representative_index
            ))
        }
        (false, _) => None,
    };

    print_generate_summary(&report, &job, artifact, args.frames_dir, args.json)
}

fn print_generate_summary(
    report: &GenerationReport,
    job: &ResolvedJob,
    artifact: Option<PathBuf>,
    frames_dir: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    if json {
        let summary = GenerateSummary {
            ok: true,
            status: report.status,
            frames_rendered: report.frames_rendered,
            plan: report.plan,
            canvas: job.request.canvas,
            artifact,
            frames_dir,
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    match artifact {
        Some(path) => println!(
            "Wrote {} (frame {} of {}, {})",
            path.display(),
            report.plan.representative_index,
            report.plan.total_frames,
            job.request.canvas
        ),
        None => println!(
            "No artifact written: generation {:?} after {} frames",
            report.status, report.frames_rendered
        ),
    }
    Ok(())
}

fn run_frame(args: FrameArgs) -> Result<()> {
    let canvas = match args.canvas.size()? {
        Some(size) => size,
        None => args.canvas.resolution()?.unwrap_or_default().canvas(),
    };
    let encoding = ArtifactEncoding {
        format: parse_format(args.format.as_deref())?
            .or_else(|| ArtifactFormat::from_extension(&args.output))
            .unwrap_or_default(),
        quality: parse_quality_flag(args.quality.as_deref())?
            .unwrap_or(ArtifactEncoding::default().quality),
    };

    let params = RenderParams::new(args.time, canvas, args.prompt);
    let mut renderer = build_renderer(args.font.as_deref())?;
    let frame = renderer.render(&params)?;
    let path = write_artifact(&frame, encoding, &args.output)?;

    if args.json {
        let summary = serde_json::json!({
            "ok": true,
            "artifact": path,
            "time": params.time,
            "canvas": params.canvas(),
            "format": encoding.format,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!("Wrote {} ({}, t={}s)", path.display(), params.canvas(), params.time);
    }
    Ok(())
}

fn run_check(job_path: &Path, json: bool) -> Result<()> {
    let manifest = load_job_manifest(job_path)?;
    let job = resolve_job(Some(&manifest), JobOverrides::default())?;
    let plan = SequencePlan::new(job.request.duration);

    if json {
        let summary = CheckSummary {
            ok: true,
            prompt: job.request.prompt.clone(),
            resolution: job.resolution.label().to_owned(),
            canvas: job.request.canvas,
            plan,
            format: job.encoding.format,
            quality: job.encoding.quality,
            out_dir: job.out_dir.clone(),
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!(
        "OK: {} ({} {}, {} fps, {} frames, representative frame {})",
        job_path.display(),
        job.resolution,
        job.request.canvas,
        plan.fps,
        plan.total_frames,
        plan.representative_index
    );
    println!("Prompt: {}", job.request.prompt);
    Ok(())
}
