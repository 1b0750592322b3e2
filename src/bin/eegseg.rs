use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use eegseg::{annotate_all, discover_recordings, split_all, BatchReport, RecordingMode, SegmentConfig, Subject};

#[derive(Parser, Debug)]
#[command(name = "eegseg", about = "Annotate BDF recordings and cut them into labelled EEG segments")]
struct Args {
    /// Directory searched recursively for .bdf and .safetensors files.
    #[arg(long, default_value = "data")]
    dir: PathBuf,

    #[command(subcommand)]
    stage: Stage,
}

#[derive(Subcommand, Debug)]
enum Stage {
    /// Decode Status-channel markers of every .bdf file.
    Annotate,
    /// Preprocess, epoch, segment and merge every annotated file.
    Split {
        /// Segment length in seconds.
        #[arg(long, default_value_t = 2.0)]
        segment_length: f64,

        /// Step between segment starts in seconds.
        #[arg(long, default_value_t = 1.0)]
        step: f64,

        /// manual (1) or live-stream (2).
        #[arg(long, default_value_t = RecordingMode::Manual)]
        mode: RecordingMode,

        /// Electrode table; detected from each file name when omitted.
        #[arg(long)]
        subject: Option<Subject>,

        /// Output directory.
        #[arg(long, default_value = "data/processed")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let files = discover_recordings(&args.dir)?;
    if files.is_empty() {
        warn!("no .bdf/.safetensors files found in {}", args.dir.display());
        return Ok(());
    }
    info!("{} candidate files in {}", files.len(), args.dir.display());

    let report = match args.stage {
        Stage::Annotate => annotate_all(&files),
        Stage::Split { segment_length, step, mode, subject, out_dir } => {
            let cfg = SegmentConfig {
                segment_length_s: segment_length,
                step_s: step,
                mode,
                subject,
                out_dir,
                ..SegmentConfig::default()
            };
            split_all(&files, &cfg)
        }
    };
    summarize(&report)
}

fn summarize(report: &BatchReport) -> Result<()> {
    info!(
        "done: {} written, {} skipped, {} failed",
        report.succeeded.len(),
        report.skipped.len(),
        report.failed.len()
    );
    if !report.is_clean() {
        for (path, err) in &report.failed {
            warn!("  {}: {err}", path.display());
        }
        bail!("{} recordings failed", report.failed.len());
    }
    Ok(())
}
