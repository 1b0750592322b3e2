//! Event markers from the acquisition status channel.
//!
//! The trigger word of each status sample carries the cue class in its upper
//! byte:
//!
//! ```text
//! mask  = (code & 0xFF00) >> 8
//! 1 → REST   2 → LEFT_HAND   4 → RIGHT_HAND   8 → BOTH_HANDS   16 → BOTH_FEET
//! ```
//!
//! Codes whose mask is not in the table are dropped silently; the
//! acquisition software emits housekeeping codes that are not cues.
use std::fmt;
use std::str::FromStr;

use log::warn;

use crate::error::{SegResult, SegmentError};

/// Low 16 bits of a BDF status word hold the trigger code.
pub const TRIGGER_MASK: i32 = 0xFFFF;

/// Symbolic cue class of a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventLabel {
    Rest,
    LeftHand,
    RightHand,
    BothHands,
    BothFeet,
}

impl EventLabel {
    /// All labels in status-mask order.
    pub const ALL: [Self; 5] = [
        Self::Rest, Self::LeftHand, Self::RightHand, Self::BothHands, Self::BothFeet,
    ];

    /// Short tag written into annotated recordings (`"R"`, `"LH"`, …).
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Rest      => "R",
            Self::LeftHand  => "LH",
            Self::RightHand => "RH",
            Self::BothHands => "BH",
            Self::BothFeet  => "BF",
        }
    }

    /// Class name used in segmented datasets (`"relax"`, `"left_hand"`, …).
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rest      => "relax",
            Self::LeftHand  => "left_hand",
            Self::RightHand => "right_hand",
            Self::BothHands => "both_hands",
            Self::BothFeet  => "both_feets",
        }
    }

    /// Look up the label for a decoded status mask.
    pub fn from_mask(mask: u32) -> Option<Self> {
        CODE_TABLE.iter().find(|(m, _)| *m == mask).map(|&(_, l)| l)
    }
}

impl fmt::Display for EventLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EventLabel {
    type Err = String;

    /// Accepts either the short tag or the class name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.tag() == s || l.name() == s)
            .ok_or_else(|| format!("unknown event label {s:?}"))
    }
}

/// Status mask → label.
pub const CODE_TABLE: [(u32, EventLabel); 5] = [
    (1,  EventLabel::Rest),
    (2,  EventLabel::LeftHand),
    (4,  EventLabel::RightHand),
    (8,  EventLabel::BothHands),
    (16, EventLabel::BothFeet),
];

/// One transition on the status channel: `(sample, previous code, new code)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub sample: usize,
    pub previous: i32,
    pub code: i32,
}

/// A decoded cue with its onset in seconds from the start of the recording.
#[derive(Debug, Clone, PartialEq)]
pub struct EventMarker {
    pub onset_s: f64,
    pub label: EventLabel,
    /// Time to the next retained marker; `None` for the last one.
    pub duration_s: Option<f64>,
}

impl EventMarker {
    /// Onset as a sample index at `sfreq`.
    pub fn onset_sample(&self, sfreq: f32) -> usize {
        (self.onset_s * sfreq as f64).round().max(0.0) as usize
    }
}

/// Upper byte of the 16-bit trigger word.
#[inline]
pub fn status_mask(code: i32) -> u32 {
    ((code as u32) & 0xFF00) >> 8
}

/// Find every sample where the status channel steps to a non-zero code.
///
/// Consecutive events are reported (a step from one non-zero code straight
/// to another counts), and a single-sample pulse is enough.  A non-zero
/// value at sample 0 has no preceding edge and is ignored.
pub fn find_events(status: &[i32]) -> Vec<RawEvent> {
    let Some(&first) = status.first() else {
        return vec![];
    };
    if first & TRIGGER_MASK != 0 {
        warn!("status channel starts on non-zero code {first:#06x}; initial event ignored");
    }

    status
        .windows(2)
        .enumerate()
        .filter_map(|(i, w)| {
            let (prev, cur) = (w[0] & TRIGGER_MASK, w[1] & TRIGGER_MASK);
            (cur != prev && cur != 0).then_some(RawEvent { sample: i + 1, previous: prev, code: cur })
        })
        .collect()
}

/// Decode raw status events into labelled markers.
///
/// Onsets are `sample / sfreq`; durations are the gap to the next retained
/// marker.  Fails with [`SegmentError::EmptyMarkerSet`] when nothing decodes.
pub fn decode_events(raw: &[RawEvent], sfreq: f32) -> SegResult<Vec<EventMarker>> {
    let sfreq = sfreq as f64;
    let mut markers: Vec<EventMarker> = raw
        .iter()
        .filter_map(|ev| {
            EventLabel::from_mask(status_mask(ev.code)).map(|label| EventMarker {
                onset_s: ev.sample as f64 / sfreq,
                label,
                duration_s: None,
            })
        })
        .collect();

    if markers.is_empty() {
        return Err(SegmentError::EmptyMarkerSet { n_raw: raw.len() });
    }

    fill_durations(&mut markers);
    Ok(markers)
}

/// Set `duration_s` to the gap to the following marker; the last stays `None`.
pub fn fill_durations(markers: &mut [EventMarker]) {
    let n = markers.len();
    for i in 0..n {
        markers[i].duration_s = if i + 1 < n {
            Some(markers[i + 1].onset_s - markers[i].onset_s)
        } else {
            None
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(sample: usize, code: i32) -> RawEvent {
        RawEvent { sample, previous: 0, code }
    }

    #[test]
    fn left_hand_code_decodes() {
        let m = decode_events(&[ev(500, 0x0200)], 250.0).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].label, EventLabel::LeftHand);
        approx::assert_abs_diff_eq!(m[0].onset_s, 2.0, epsilon = 1e-12);
    }

    #[test]
    fn unmapped_masks_are_dropped() {
        // 0x0000 → mask 0, 0x0300 → mask 3: neither is a cue.
        let raw = [ev(10, 0x0000), ev(20, 0x0300), ev(30, 0x1000), ev(40, 0x00FF)];
        let m = decode_events(&raw, 100.0).unwrap();
        assert_eq!(m.len(), 1);
        assert_eq!(m[0].label, EventLabel::BothFeet);
    }

    #[test]
    fn empty_marker_set_is_an_error() {
        let raw = [ev(10, 0x0000), ev(20, 0x0003)];
        assert_eq!(
            decode_events(&raw, 100.0),
            Err(SegmentError::EmptyMarkerSet { n_raw: 2 })
        );
    }

    #[test]
    fn durations_span_to_next_marker() {
        let raw = [ev(0, 0x0100), ev(250, 0x0900), ev(1000, 0x0400)];
        let m = decode_events(&raw, 250.0).unwrap();
        // middle event (mask 9) dropped, so R lasts until RH.
        assert_eq!(m.len(), 2);
        approx::assert_abs_diff_eq!(m[0].duration_s.unwrap(), 4.0, epsilon = 1e-12);
        assert_eq!(m[1].duration_s, None);
    }

    #[test]
    fn find_events_reports_rising_and_consecutive_steps() {
        let status = [0, 0, 0x0100, 0x0100, 0x0400, 0, 0, 0x0200];
        let evs = find_events(&status);
        assert_eq!(
            evs,
            vec![
                RawEvent { sample: 2, previous: 0, code: 0x0100 },
                RawEvent { sample: 4, previous: 0x0100, code: 0x0400 },
                RawEvent { sample: 7, previous: 0, code: 0x0200 },
            ]
        );
    }

    #[test]
    fn find_events_ignores_initial_value_and_high_status_bits() {
        // Bits above the trigger word (CMS/battery flags) never make an edge.
        let status = [0x0100, 0x0100, 0x0100 | 0x10_0000, 0];
        assert!(find_events(&status).is_empty());
    }

    #[test]
    fn label_round_trips_through_text() {
        for l in EventLabel::ALL {
            assert_eq!(l.tag().parse::<EventLabel>().unwrap(), l);
            assert_eq!(l.name().parse::<EventLabel>().unwrap(), l);
        }
    }
}
