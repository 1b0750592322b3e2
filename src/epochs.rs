//! Event-locked epoching.
//!
//! Cuts one `[C, n]` window per marker, anchored at the marker onset and
//! spanning `[onset + round(tmin·sr), onset + round(tmax·sr)]` inclusive.
//! Windows running past either end of the recording are dropped, as are
//! windows failing the optional peak-to-peak amplitude check.
use log::{debug, info};
use ndarray::{s, Array2, Axis};

use crate::config::EpochGroupSpec;
use crate::dataset::LabelCodes;
use crate::error::{SegResult, SegmentError};
use crate::events::{EventLabel, EventMarker};
use crate::montage::Montage;
use crate::signal::ContinuousSignal;

/// One extracted occurrence of a class.
#[derive(Debug, Clone, PartialEq)]
pub struct Epoch {
    pub label: EventLabel,
    /// Marker onset in the source recording.
    pub onset_sample: usize,
    /// `[C, n_samples]`.
    pub data: Array2<f32>,
}

/// Equally shaped epochs sharing a window and the recording's metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Epochs {
    pub sfreq: f32,
    pub ch_names: Vec<String>,
    pub montage: Option<Montage>,
    /// Codes for the classes this group was cut for, in slicing order.
    pub label_codes: LabelCodes,
    epochs: Vec<Epoch>,
    /// Markers of the group's classes that produced no epoch.
    pub n_dropped: usize,
}

impl Epochs {
    /// Assemble a group from already extracted epochs.
    pub fn from_parts(
        sfreq: f32,
        ch_names: Vec<String>,
        montage: Option<Montage>,
        label_codes: LabelCodes,
        epochs: Vec<Epoch>,
    ) -> SegResult<Self> {
        let n_t = epochs.first().map_or(0, |e| e.data.ncols());
        for (i, e) in epochs.iter().enumerate() {
            if e.data.dim() != (ch_names.len(), n_t) {
                return Err(SegmentError::IncompatibleSegmentSets {
                    reason: format!("epoch {i} has shape {:?}, expected ({}, {n_t})", e.data.dim(), ch_names.len()),
                });
            }
            if label_codes.code(e.label).is_none() {
                return Err(SegmentError::IncompatibleSegmentSets {
                    reason: format!("epoch {i} label {} has no code", e.label),
                });
            }
        }
        Ok(Self { sfreq, ch_names, montage, label_codes, epochs, n_dropped: 0 })
    }

    pub fn epochs(&self) -> &[Epoch] {
        &self.epochs
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    /// Samples per epoch, `None` when empty.
    pub fn n_samples(&self) -> Option<usize> {
        self.epochs.first().map(|e| e.data.ncols())
    }

    /// Epochs of one class in onset order.
    pub fn of_class(&self, label: EventLabel) -> impl Iterator<Item = &Epoch> + '_ {
        self.epochs.iter().filter(move |e| e.label == label)
    }
}

/// Largest peak-to-peak amplitude over the channels of `data`.
pub fn peak_to_peak(data: &Array2<f32>) -> f32 {
    data.axis_iter(Axis(0))
        .map(|row| {
            let (lo, hi) = row
                .iter()
                .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
            if hi >= lo { hi - lo } else { 0.0 }
        })
        .fold(0.0, f32::max)
}

/// Cut `spec`'s window around every marker whose label belongs to `spec`.
///
/// `codes` is the mode's full table; the group keeps the entries for its
/// own classes.
pub fn extract_epochs(
    signal: &ContinuousSignal,
    markers: &[EventMarker],
    spec: &EpochGroupSpec,
    codes: &LabelCodes,
) -> Epochs {
    let (off_lo, off_hi) = spec.window.sample_offsets(signal.sfreq);
    let n_times = signal.n_times() as i64;
    let mut epochs = Vec::new();
    let (mut out_of_bounds, mut rejected) = (0usize, 0usize);

    for m in markers.iter().filter(|m| spec.classes.contains(&m.label)) {
        let onset = m.onset_sample(signal.sfreq);
        let (first, last) = (onset as i64 + off_lo, onset as i64 + off_hi);
        if first < 0 || last >= n_times || last < first {
            debug!("{} at {:.3} s: window [{first}, {last}] outside recording", m.label, m.onset_s);
            out_of_bounds += 1;
            continue;
        }

        let data = signal.data.slice(s![.., first as usize..=last as usize]).to_owned();
        if let Some(limit) = spec.reject_peak_to_peak {
            let ptp = peak_to_peak(&data);
            if ptp > limit {
                debug!("{} at {:.3} s rejected: peak-to-peak {ptp:.3e} > {limit:.3e}", m.label, m.onset_s);
                rejected += 1;
                continue;
            }
        }
        epochs.push(Epoch { label: m.label, onset_sample: onset, data });
    }

    info!(
        "{}: {} epochs of {} samples ({} out of bounds, {} rejected)",
        spec.name,
        epochs.len(),
        spec.window.n_samples(signal.sfreq),
        out_of_bounds,
        rejected
    );

    Epochs {
        sfreq: signal.sfreq,
        ch_names: signal.ch_names.clone(),
        montage: signal.montage.clone(),
        label_codes: codes.subset(&spec.classes),
        epochs,
        n_dropped: out_of_bounds + rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EpochWindow, RecordingMode};

    fn signal(n_times: usize) -> ContinuousSignal {
        let data = Array2::from_shape_fn((2, n_times), |(c, t)| (c * 10_000 + t) as f32);
        ContinuousSignal::new(data, vec!["C3".into(), "C4".into()], 250.0).unwrap()
    }

    fn marker(onset_s: f64, label: EventLabel) -> EventMarker {
        EventMarker { onset_s, label, duration_s: None }
    }

    fn spec(classes: Vec<EventLabel>, tmin: f32, tmax: f32) -> EpochGroupSpec {
        EpochGroupSpec { name: "test", classes, window: EpochWindow { tmin, tmax }, reject_peak_to_peak: None }
    }

    #[test]
    fn window_is_inclusive_and_anchored() {
        let sig = signal(5000);
        let codes = RecordingMode::Manual.label_codes();
        let ep = extract_epochs(&sig, &[marker(2.0, EventLabel::LeftHand)], &spec(vec![EventLabel::LeftHand], 1.0, 9.0), &codes);
        assert_eq!(ep.len(), 1);
        let e = &ep.epochs()[0];
        assert_eq!(e.data.dim(), (2, 2001));
        assert_eq!(e.onset_sample, 500);
        assert_eq!(e.data[[0, 0]], 750.0);
        assert_eq!(e.data[[1, 2000]], 12_750.0);
    }

    #[test]
    fn other_classes_and_overruns_are_skipped() {
        let sig = signal(2000);
        let codes = RecordingMode::Manual.label_codes();
        let markers = [
            marker(0.5, EventLabel::Rest),
            marker(1.0, EventLabel::LeftHand),
            marker(6.5, EventLabel::Rest),
        ];
        let ep = extract_epochs(&sig, &markers, &spec(vec![EventLabel::Rest], 1.0, 4.0), &codes);
        assert_eq!(ep.len(), 1);
        assert_eq!(ep.n_dropped, 1);
        assert_eq!(ep.label_codes.len(), 1);
        assert_eq!(ep.label_codes.code(EventLabel::Rest), Some(4));
    }

    #[test]
    fn large_artifacts_are_rejected() {
        let mut sig = signal(3000);
        sig.data.fill(0.0);
        sig.data[[1, 1000]] = 1e-3;
        let codes = RecordingMode::LiveStream.label_codes();
        let mut s = spec(vec![EventLabel::Rest], 0.0, 1.0);
        s.reject_peak_to_peak = Some(80e-6);
        let markers = [marker(3.5, EventLabel::Rest), marker(8.0, EventLabel::Rest)];
        let ep = extract_epochs(&sig, &markers, &s, &codes);
        assert_eq!(ep.len(), 1);
        assert_eq!(ep.epochs()[0].onset_sample, 2000);
        assert_eq!(ep.n_dropped, 1);
    }

    #[test]
    fn from_parts_checks_shapes() {
        let codes = RecordingMode::Manual.label_codes();
        let ok = Epoch { label: EventLabel::Rest, onset_sample: 0, data: Array2::zeros((2, 10)) };
        let short = Epoch { label: EventLabel::Rest, onset_sample: 0, data: Array2::zeros((2, 9)) };
        let names = vec!["C3".to_string(), "C4".to_string()];
        assert!(Epochs::from_parts(250.0, names.clone(), None, codes.clone(), vec![ok.clone()]).is_ok());
        assert!(Epochs::from_parts(250.0, names, None, codes, vec![ok, short]).is_err());
    }

    #[test]
    fn peak_to_peak_takes_worst_channel() {
        let data = ndarray::arr2(&[[0.0_f32, 1.0, -1.0], [5.0, 5.0, 5.0]]);
        assert_eq!(peak_to_peak(&data), 2.0);
    }
}
