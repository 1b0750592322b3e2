//! The two batch stages.
//!
//! ```text
//! annotate:  rec.bdf ─ Status edges ─ decode ─▶ rec_annotated.safetensors
//! split:     rec_annotated.safetensors ─ pick ─ resample ─ band-pass ─ notch
//!            ─ rename ─ layout ─ epoch (per group) ─ slice ─ merge
//!            ─▶ {out_dir}/{name}_epochs_splitted_segment=…-epo.safetensors
//! ```
//! A failing recording is logged and counted; the batch moves on.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{error, info, warn};

use crate::bdf::read_bdf;
use crate::channels::Subject;
use crate::config::SegmentConfig;
use crate::dataset::{merge, SegmentedDataset};
use crate::epochs::extract_epochs;
use crate::events::{decode_events, find_events};
use crate::io::{load_annotated, save_annotated, save_dataset, AnnotatedRecording};
use crate::segment::split_into_segments;

const BDF_EXT: &str = "bdf";
const SAFETENSORS_EXT: &str = "safetensors";
const ANNOTATED_TAG: &str = "annotated";

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Output file per input that went through.
    pub succeeded: Vec<(PathBuf, PathBuf)>,
    /// Inputs the stage does not apply to.
    pub skipped: Vec<PathBuf>,
    /// Inputs that failed, with the rendered error chain.
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    fn record(&mut self, input: &Path, result: Result<PathBuf>) {
        match result {
            Ok(out) => {
                info!("saved {}", out.display());
                self.succeeded.push((input.to_path_buf(), out));
            }
            Err(e) => {
                error!("{}: {e:#}", input.display());
                self.failed.push((input.to_path_buf(), format!("{e:#}")));
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

// ── Discovery ────────────────────────────────────────────────────────────────

/// Every `.bdf` and `.safetensors` file below `dir`, sorted by path.
pub fn discover_recordings(dir: &Path) -> Result<Vec<PathBuf>> {
    fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
        for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
            let path = entry?.path();
            if path.is_dir() {
                walk(&path, out)?;
            } else if matches!(path.extension().and_then(|e| e.to_str()), Some(BDF_EXT | SAFETENSORS_EXT)) {
                out.push(path);
            }
        }
        Ok(())
    }
    let mut files = Vec::new();
    walk(dir, &mut files)?;
    files.sort();
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn file_stem(path: &Path) -> String {
    path.file_stem().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

// ── Annotate ─────────────────────────────────────────────────────────────────

/// `dir/rec.bdf` → `dir/rec_annotated.safetensors`.
pub fn annotated_path(bdf: &Path) -> PathBuf {
    bdf.with_file_name(format!("{}_{ANNOTATED_TAG}.{SAFETENSORS_EXT}", file_stem(bdf)))
}

/// Decode the status channel of one BDF file and store signal plus markers.
pub fn annotate_recording(path: &Path) -> Result<PathBuf> {
    let rec = read_bdf(path)?;
    let raw = find_events(&rec.status);
    let markers = decode_events(&raw, rec.signal.sfreq)?;
    info!("{}: {} status events, {} markers", path.display(), raw.len(), markers.len());

    let out = annotated_path(path);
    save_annotated(&out, &rec.signal, &markers)?;
    Ok(out)
}

/// Annotate every BDF file that has not been annotated yet.
pub fn annotate_all(files: &[PathBuf]) -> BatchReport {
    let mut report = BatchReport::default();
    for path in files {
        let name = file_name(path);
        if name.contains(ANNOTATED_TAG) || path.extension().and_then(|e| e.to_str()) != Some(BDF_EXT) {
            info!("skipping {}", path.display());
            report.skipped.push(path.clone());
            continue;
        }
        info!("annotating {}", path.display());
        report.record(path, annotate_recording(path));
    }
    report
}

// ── Split ────────────────────────────────────────────────────────────────────

/// Preprocess an annotated recording and cut it into the merged segment set.
pub fn segment_recording(
    rec: &AnnotatedRecording,
    recording_name: &str,
    cfg: &SegmentConfig,
) -> Result<SegmentedDataset> {
    let subject = match cfg.subject {
        Some(s) => s,
        None => Subject::detect(recording_name)?,
    };
    info!("{recording_name}: subject {subject}, mode {}", cfg.mode);

    let mut signal = rec.signal.pick(&cfg.preprocess.eeg_channels)?.preprocess(&cfg.preprocess)?;
    signal.rename_channels(subject);
    signal.set_standard_montage()?;

    let codes = cfg.mode.label_codes();
    let groups = cfg
        .mode
        .epoch_plan()
        .iter()
        .map(|spec| {
            let epochs = extract_epochs(&signal, &rec.markers, spec, &codes);
            split_into_segments(&epochs, cfg.segment_length_s, Some(cfg.step_s))
                .with_context(|| format!("slicing {} epochs", spec.name))
        })
        .collect::<Result<Vec<_>>>()?;

    let merged = merge(&groups)?;
    for (label, n) in merged.class_counts() {
        info!("  {label}: {n}");
    }
    Ok(merged)
}

/// Run the split stage on one annotated file; returns the dataset path.
pub fn split_recording(path: &Path, cfg: &SegmentConfig) -> Result<PathBuf> {
    let recording_name = file_stem(path);
    if cfg.subject.is_none() {
        // Fail before loading and filtering.
        Subject::detect(&recording_name)?;
    }
    let rec = load_annotated(path)?;
    if rec.markers.is_empty() {
        warn!("{}: no markers", path.display());
    }
    let ds = segment_recording(&rec, &recording_name, cfg)?;

    std::fs::create_dir_all(&cfg.out_dir).with_context(|| format!("creating {}", cfg.out_dir.display()))?;
    let out = cfg.out_dir.join(cfg.output_file_name(&recording_name));
    save_dataset(&out, &ds)?;
    Ok(out)
}

/// Split every annotated file; raw `.bdf` inputs are skipped.
pub fn split_all(files: &[PathBuf], cfg: &SegmentConfig) -> BatchReport {
    let mut report = BatchReport::default();
    for path in files {
        if path.extension().and_then(|e| e.to_str()) == Some(BDF_EXT) {
            info!("skipping not annotated file {}", path.display());
            report.skipped.push(path.clone());
            continue;
        }
        info!("splitting {}", path.display());
        report.record(path, split_recording(path, cfg));
    }
    report
}
