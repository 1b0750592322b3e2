//! Run configuration.
//!
//! Two things vary by [`RecordingMode`]: the integer code each class gets in
//! the saved dataset, and which epoch window each class is cut with.  Both
//! are mode-scoped tables here, never globals, because the two modes assign
//! different codes to the same label.
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::channels::Subject;
use crate::dataset::LabelCodes;
use crate::events::EventLabel;

/// How the recording was acquired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingMode {
    /// Cue-paced sessions run by hand.
    #[default]
    Manual,
    /// Sessions streamed over LSL.
    LiveStream,
}

impl RecordingMode {
    /// Label → integer code written into datasets for this mode.
    pub fn label_codes(self) -> LabelCodes {
        use EventLabel::*;
        let table: &[(EventLabel, i32)] = match self {
            Self::Manual => &[(BothFeet, 1), (BothHands, 2), (LeftHand, 3), (Rest, 4), (RightHand, 5)],
            Self::LiveStream => &[(Rest, 1), (LeftHand, 2), (RightHand, 3), (BothHands, 4), (BothFeet, 5)],
        };
        LabelCodes::from_static(table)
    }

    /// Epoch groups to cut, slice and merge, in output order.
    pub fn epoch_plan(self) -> Vec<EpochGroupSpec> {
        use EventLabel::*;
        match self {
            Self::Manual => vec![
                EpochGroupSpec {
                    name: "task",
                    classes: vec![BothFeet, BothHands, LeftHand, RightHand],
                    window: EpochWindow { tmin: 1.0, tmax: 9.0 },
                    reject_peak_to_peak: None,
                },
                EpochGroupSpec {
                    name: "rest",
                    classes: vec![Rest],
                    window: EpochWindow { tmin: 1.0, tmax: 4.0 },
                    reject_peak_to_peak: None,
                },
            ],
            Self::LiveStream => vec![EpochGroupSpec {
                name: "all",
                classes: vec![Rest, LeftHand, RightHand, BothHands, BothFeet],
                window: EpochWindow { tmin: 1.0, tmax: 6.0 },
                reject_peak_to_peak: Some(80e-6),
            }],
        }
    }
}

impl fmt::Display for RecordingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Manual => "manual",
            Self::LiveStream => "live-stream",
        })
    }
}

impl FromStr for RecordingMode {
    type Err = String;

    /// `manual`/`1` or `live-stream`/`lsl`/`2`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "manual" | "1" => Ok(Self::Manual),
            "live-stream" | "live_stream" | "lsl" | "2" => Ok(Self::LiveStream),
            other => Err(format!("unknown recording mode {other:?}")),
        }
    }
}

/// Time span cut around each marker, seconds relative to its onset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochWindow {
    pub tmin: f32,
    pub tmax: f32,
}

impl EpochWindow {
    /// `(first, last)` sample offsets, inclusive.
    pub fn sample_offsets(&self, sfreq: f32) -> (i64, i64) {
        let s = |t: f32| (t as f64 * sfreq as f64).round() as i64;
        (s(self.tmin), s(self.tmax))
    }

    /// Samples per epoch, counting both ends.
    pub fn n_samples(&self, sfreq: f32) -> usize {
        let (a, b) = self.sample_offsets(sfreq);
        (b - a + 1).max(0) as usize
    }
}

/// One group of classes sharing an epoch window.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochGroupSpec {
    pub name: &'static str,
    pub classes: Vec<EventLabel>,
    pub window: EpochWindow,
    /// Drop epochs whose peak-to-peak amplitude on any channel exceeds this (volts).
    pub reject_peak_to_peak: Option<f32>,
}

/// Preprocessing applied before epoching.
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Amplifier inputs kept; everything else (the status channel, aux) is dropped.
    pub eeg_channels: Vec<String>,
    /// Target sampling rate in Hz.  Default: `250.0`.
    pub target_sfreq: f32,
    /// Band-pass low edge in Hz.  Default: `1.0`.
    pub l_freq: f32,
    /// Band-pass high edge in Hz.  Default: `40.0`.
    pub h_freq: f32,
    /// Mains frequencies to notch out.  Default: `[50.0]`.
    pub notch_freqs: Vec<f32>,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            eeg_channels: (1..=16).map(|i| format!("A{i}")).collect(),
            target_sfreq: 250.0,
            l_freq: 1.0,
            h_freq: 40.0,
            notch_freqs: vec![50.0],
        }
    }
}

/// Settings for the split stage.
///
/// ```
/// use eegseg::{RecordingMode, SegmentConfig};
///
/// let cfg = SegmentConfig {
///     segment_length_s: 1.0,
///     mode: RecordingMode::LiveStream,
///     ..SegmentConfig::default()
/// };
/// assert_eq!(cfg.step_s, 1.0);
/// ```
#[derive(Debug, Clone)]
pub struct SegmentConfig {
    /// Segment length in seconds.  Default: `2.0`.
    pub segment_length_s: f64,
    /// Hop between segment starts in seconds.  Default: `1.0`.
    pub step_s: f64,
    pub mode: RecordingMode,
    /// Electrode table; `None` detects the subject from the file name.
    pub subject: Option<Subject>,
    /// Where datasets are written.  Default: `data/processed`.
    pub out_dir: PathBuf,
    pub preprocess: PreprocessConfig,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            segment_length_s: 2.0,
            step_s: 1.0,
            mode: RecordingMode::Manual,
            subject: None,
            out_dir: PathBuf::from("data/processed"),
            preprocess: PreprocessConfig::default(),
        }
    }
}

impl SegmentConfig {
    /// Dataset file name for a recording:
    /// `{name}_epochs_splitted_segment={len}-step={step}-epo.safetensors`.
    ///
    /// Durations are written the way Python's `repr` writes floats, so names
    /// match datasets produced by the earlier tooling.
    pub fn output_file_name(&self, recording_name: &str) -> String {
        format!(
            "{recording_name}_epochs_splitted_segment={}-step={}-epo.safetensors",
            float_repr(self.segment_length_s),
            float_repr(self.step_s)
        )
    }
}

/// Shortest round-trip form; scientific below `1e-4` and from `1e16`, with a
/// signed exponent of at least two digits (`1e-05`, `2.5e+16`).
fn float_repr(v: f64) -> String {
    let sci = format!("{v:e}");
    let Some((mantissa, exp)) = sci.split_once('e') else {
        return format!("{v:?}");
    };
    match exp.parse::<i32>() {
        Ok(e) if !(-4..16).contains(&e) => {
            let sign = if e < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", e.unsigned_abs())
        }
        _ => format!("{v:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_disagree_on_codes() {
        let manual = RecordingMode::Manual.label_codes();
        let live = RecordingMode::LiveStream.label_codes();
        assert_eq!(manual.code(EventLabel::Rest), Some(4));
        assert_eq!(live.code(EventLabel::Rest), Some(1));
        assert_eq!(manual.code(EventLabel::BothFeet), Some(1));
        assert_eq!(live.code(EventLabel::BothFeet), Some(5));
    }

    #[test]
    fn manual_plan_has_task_then_rest() {
        let plan = RecordingMode::Manual.epoch_plan();
        assert_eq!(plan.len(), 2);
        assert!(!plan[0].classes.contains(&EventLabel::Rest));
        assert_eq!(plan[1].classes, vec![EventLabel::Rest]);
        assert_eq!(plan[0].window, EpochWindow { tmin: 1.0, tmax: 9.0 });
        assert_eq!(plan[1].window, EpochWindow { tmin: 1.0, tmax: 4.0 });
    }

    #[test]
    fn live_plan_rejects_large_artifacts() {
        let plan = RecordingMode::LiveStream.epoch_plan();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].classes.len(), 5);
        assert_eq!(plan[0].reject_peak_to_peak, Some(80e-6));
    }

    #[test]
    fn window_counts_both_ends() {
        let w = EpochWindow { tmin: 1.0, tmax: 9.0 };
        assert_eq!(w.sample_offsets(250.0), (250, 2250));
        assert_eq!(w.n_samples(250.0), 2001);
    }

    #[test]
    fn output_name_matches_convention() {
        let cfg = SegmentConfig::default();
        assert_eq!(
            cfg.output_file_name("mati_real_annotated"),
            "mati_real_annotated_epochs_splitted_segment=2.0-step=1.0-epo.safetensors"
        );
        let cfg = SegmentConfig { segment_length_s: 1.5, step_s: 0.25, ..cfg };
        assert!(cfg.output_file_name("x").contains("segment=1.5-step=0.25"));
    }

    #[test]
    fn output_name_durations_print_like_python() {
        assert_eq!(float_repr(2.0), "2.0");
        assert_eq!(float_repr(0.35), "0.35");
        assert_eq!(float_repr(0.0001), "0.0001");
        assert_eq!(float_repr(0.00001), "1e-05");
        assert_eq!(float_repr(0.000015), "1.5e-05");
        assert_eq!(float_repr(1e16), "1e+16");
        assert_eq!(float_repr(123.0), "123.0");

        let cfg = SegmentConfig { segment_length_s: 0.00001, step_s: 0.3, ..SegmentConfig::default() };
        assert_eq!(cfg.output_file_name("r"), "r_epochs_splitted_segment=1e-05-step=0.3-epo.safetensors");
    }

    #[test]
    fn mode_parses_menu_numbers() {
        assert_eq!("1".parse::<RecordingMode>().unwrap(), RecordingMode::Manual);
        assert_eq!("lsl".parse::<RecordingMode>().unwrap(), RecordingMode::LiveStream);
        assert!("3".parse::<RecordingMode>().is_err());
    }
}
