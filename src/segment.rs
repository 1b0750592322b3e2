//! Sliding-window segmentation of epochs.
//!
//! Every epoch of length `L` is cut into windows `[start, start + seg)` for
//! `start = 0, step, 2·step, …` while the window fits.  The trailing partial
//! window is dropped and an epoch shorter than `seg` yields nothing.
//!
//! Output order is class order of the group's label table, then epoch order,
//! then increasing start offset.  Classes are sliced on the rayon pool; the
//! collected order does not depend on scheduling.
use log::{debug, info};
use ndarray::{s, Array2};
use rayon::prelude::*;

use crate::dataset::SegmentedDataset;
use crate::epochs::Epochs;
use crate::error::{SegResult, SegmentError};
use crate::events::EventLabel;

/// Window and hop in samples.  Both are at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentWindow {
    segment_samples: usize,
    step_samples: usize,
}

impl SegmentWindow {
    /// Convert seconds to samples: `round(seconds · sfreq)`, ties to even.
    ///
    /// A missing step gives non-overlapping windows.
    pub fn from_seconds(segment_length_s: f64, step_s: Option<f64>, sfreq: f32) -> SegResult<Self> {
        let to_samples = |what: &'static str, seconds: f64| {
            let n = (seconds * f64::from(sfreq)).round_ties_even();
            if !seconds.is_finite() || !sfreq.is_finite() || seconds <= 0.0 || sfreq <= 0.0 || n < 1.0 {
                return Err(SegmentError::InvalidWindow { what, seconds, sfreq });
            }
            Ok(n as usize)
        };
        let segment_samples = to_samples("segment length", segment_length_s)?;
        let step_samples = match step_s {
            Some(step) => to_samples("step", step)?,
            None => segment_samples,
        };
        Ok(Self { segment_samples, step_samples })
    }

    pub fn segment_samples(&self) -> usize {
        self.segment_samples
    }

    pub fn step_samples(&self) -> usize {
        self.step_samples
    }

    /// Windows that fit in `len` samples: `⌊(len − seg) / step⌋ + 1`, or 0.
    pub fn n_segments(&self, len: usize) -> usize {
        if len < self.segment_samples {
            0
        } else {
            (len - self.segment_samples) / self.step_samples.max(1) + 1
        }
    }

    /// Start offsets of the windows that fit in `len` samples.
    pub fn starts(&self, len: usize) -> impl Iterator<Item = usize> {
        let last = len.checked_sub(self.segment_samples);
        let step = self.step_samples.max(1);
        last.into_iter().flat_map(move |last| (0..=last).step_by(step))
    }

    /// Cut one `[C, L]` epoch into `[C, seg]` windows.
    pub fn slice(&self, epoch: &Array2<f32>) -> Vec<Array2<f32>> {
        self.starts(epoch.ncols())
            .map(|start| epoch.slice(s![.., start..start + self.segment_samples]).to_owned())
            .collect()
    }
}

/// Slice every epoch of `epochs` into fixed-length segments.
///
/// Fails with [`SegmentError::NoSegmentsProduced`] when no epoch is long
/// enough for a single window, and with [`SegmentError::InvalidWindow`]
/// when the durations round to zero samples.
pub fn split_into_segments(
    epochs: &Epochs,
    segment_length_s: f64,
    step_s: Option<f64>,
) -> SegResult<SegmentedDataset> {
    let window = SegmentWindow::from_seconds(segment_length_s, step_s, epochs.sfreq)?;
    debug!(
        "slicing {} epochs into {} samples, step {}",
        epochs.len(),
        window.segment_samples,
        window.step_samples
    );

    let classes: Vec<EventLabel> = epochs.label_codes.labels().collect();
    let per_class: Vec<Vec<(EventLabel, Array2<f32>)>> = classes
        .par_iter()
        .map(|&label| {
            epochs
                .of_class(label)
                .flat_map(|e| window.slice(&e.data))
                .map(|seg| (label, seg))
                .collect()
        })
        .collect();

    for (label, segs) in classes.iter().zip(&per_class) {
        info!("{label}: {} segments from {} epochs", segs.len(), epochs.of_class(*label).count());
    }

    let segments: Vec<_> = per_class.into_iter().flatten().collect();
    if segments.is_empty() {
        return Err(SegmentError::NoSegmentsProduced {
            segment_samples: window.segment_samples,
            step_samples: window.step_samples,
            n_epochs: epochs.len(),
        });
    }

    SegmentedDataset::new(
        epochs.sfreq,
        epochs.ch_names.clone(),
        epochs.montage.clone(),
        epochs.label_codes.clone(),
        segments,
    )
}
