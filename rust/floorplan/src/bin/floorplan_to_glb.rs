// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CLI tool: turn wall/door/window masks into a cutaway GLB model
//!
//! Usage:
//!   floorplan-to-glb --wall wall.png --door door.png --window window.png --output out/
//!   floorplan-to-glb --batch plans/ --output out/

use anyhow::{bail, Context, Result};
use clap::Parser;
use cutaway_floorplan::{MaskSet, Pipeline, PipelineConfig};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Convert floor plan segmentation masks into a 3D cutaway model
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Wall mask image
    #[arg(long, value_name = "FILE", required_unless_present = "batch")]
    wall: Option<PathBuf>,

    /// Door mask image
    #[arg(long, value_name = "FILE", required_unless_present = "batch")]
    door: Option<PathBuf>,

    /// Window mask image
    #[arg(long, value_name = "FILE", required_unless_present = "batch")]
    window: Option<PathBuf>,

    /// Directory of plans, one sub-directory with wall.png, door.png and
    /// window.png per plan
    #[arg(long, value_name = "DIR", conflicts_with_all = ["wall", "door", "window"])]
    batch: Option<PathBuf>,

    /// Output directory
    #[arg(long, value_name = "DIR", default_value = "out")]
    output: PathBuf,

    /// Pipeline configuration (JSON, partial files allowed)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Assumed building width in meters
    #[arg(long, value_name = "METERS")]
    target_width: Option<f64>,

    /// Mask binarization threshold
    #[arg(long, default_value = "127", value_name = "THRESHOLD")]
    threshold: u8,

    /// Export meshes that failed validation
    #[arg(long)]
    allow_invalid: bool,
}

struct Job {
    name: String,
    wall: PathBuf,
    door: PathBuf,
    window: PathBuf,
    output: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,cutaway_floorplan=info".into()),
        )
        .init();

    let args = Args::parse();

    let worker_threads =
        parse_worker_threads(std::env::var("CUTAWAY_WORKER_THREADS").ok().as_deref());
    rayon::ThreadPoolBuilder::new()
        .num_threads(worker_threads)
        .build_global()
        .context("Failed to initialize rayon thread pool")?;

    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(width) = args.target_width {
        config.normalize.target_width_m = width;
    }
    if args.allow_invalid {
        config.require_valid_export = false;
    }
    let pipeline = Pipeline::new(config).context("Invalid pipeline configuration")?;

    let jobs = match &args.batch {
        Some(dir) => batch_jobs(dir, &args.output)?,
        None => vec![single_job(&args)?],
    };
    if jobs.is_empty() {
        bail!("No plans found");
    }

    tracing::info!(jobs = jobs.len(), worker_threads, "Starting reconstruction");

    let failures = run_jobs(&pipeline, &jobs, args.threshold);
    if !failures.is_empty() {
        bail!(
            "{} of {} plans failed: {}",
            failures.len(),
            jobs.len(),
            failures.join(", ")
        );
    }
    tracing::info!(jobs = jobs.len(), "All plans exported");
    Ok(())
}

/// Worker thread count from `CUTAWAY_WORKER_THREADS`; 0 lets rayon decide
fn parse_worker_threads(value: Option<&str>) -> usize {
    match value.map(str::trim) {
        None | Some("") => 0,
        Some(v) => v.parse().unwrap_or_else(|_| {
            tracing::warn!(
                value = v,
                "Ignoring unparsable CUTAWAY_WORKER_THREADS, using the rayon default"
            );
            0
        }),
    }
}

/// Run every job in parallel, returning the names of the plans that failed.
/// A failed plan never stops the others.
fn run_jobs(pipeline: &Pipeline, jobs: &[Job], threshold: u8) -> Vec<String> {
    jobs.par_iter()
        .filter_map(|job| match run_job(pipeline, job, threshold) {
            Ok(()) => None,
            Err(e) => {
                tracing::error!(plan = %job.name, error = format!("{:#}", e), "Plan failed");
                Some(job.name.clone())
            }
        })
        .collect()
}

fn single_job(args: &Args) -> Result<Job> {
    let (Some(wall), Some(door), Some(window)) = (&args.wall, &args.door, &args.window) else {
        bail!("--wall, --door and --window are required without --batch");
    };
    let name = wall
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "plan".into());
    Ok(Job {
        name,
        wall: wall.clone(),
        door: door.clone(),
        window: window.clone(),
        output: args.output.clone(),
    })
}

/// One job per sub-directory holding all three masks, each with its own
/// output folder
fn batch_jobs(dir: &Path, output: &Path) -> Result<Vec<Job>> {
    let mut jobs = Vec::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("Failed to read batch directory {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let (wall, door, window) = (
            path.join("wall.png"),
            path.join("door.png"),
            path.join("window.png"),
        );
        if !(wall.is_file() && door.is_file() && window.is_file()) {
            tracing::warn!(dir = %path.display(), "Skipping directory without wall/door/window masks");
            continue;
        }
        let name = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        jobs.push(Job {
            output: output.join(&name),
            name,
            wall,
            door,
            window,
        });
    }
    jobs.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(jobs)
}

fn run_job(pipeline: &Pipeline, job: &Job, threshold: u8) -> Result<()> {
    let masks = MaskSet::load(&job.wall, &job.door, &job.window, threshold)
        .with_context(|| format!("Failed to load masks for {}", job.name))?;
    let result = pipeline.run(&masks)?;

    fs::create_dir_all(&job.output)
        .with_context(|| format!("Failed to create {}", job.output.display()))?;

    let report = serde_json::to_string_pretty(&result.report())?;
    let report_path = job.output.join("report.json");
    fs::write(&report_path, report)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;

    let model_path = job.output.join("model.glb");
    let bytes = result.export(&model_path)?;

    tracing::info!(
        plan = %job.name,
        rooms = result.rooms.room_count(),
        walls = result.model.walls.len(),
        openings = result.opening_report.applied,
        valid = result.validation.passed,
        bytes,
        path = %model_path.display(),
        "Plan exported"
    );
    Ok(())
}
