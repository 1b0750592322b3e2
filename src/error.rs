//! Error taxonomy for the segmentation core.
//!
//! Every variant is fatal for the recording being processed.  The I/O and
//! pipeline layers wrap these in `anyhow::Error`; use
//! `err.downcast_ref::<SegmentError>()` to recover the variant.
use thiserror::Error;

/// Errors raised by event decoding, slicing, merging and channel mapping.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SegmentError {
    /// No status code decoded to a known event label.
    #[error("no event markers decoded from {n_raw} raw status events")]
    EmptyMarkerSet {
        /// Number of raw events that were inspected.
        n_raw: usize,
    },

    /// The slicer produced nothing across every epoch and class.
    #[error(
        "no segments produced: segment of {segment_samples} samples \
         (step {step_samples}) does not fit any of {n_epochs} epochs"
    )]
    NoSegmentsProduced {
        /// Window length in samples.
        segment_samples: usize,
        /// Hop length in samples.
        step_samples: usize,
        /// Number of epochs offered to the slicer.
        n_epochs: usize,
    },

    /// Segment sets disagree on channel layout, sample rate, length or labels.
    #[error("incompatible segment sets: {reason}")]
    IncompatibleSegmentSets {
        /// Which property differed.
        reason: String,
    },

    /// No channel table exists for the requested subject.
    #[error("no channel mapping for subject {name:?}")]
    UnknownSubjectMapping {
        /// Subject name or recording name that failed to resolve.
        name: String,
    },

    /// `merge` was called with an empty list of groups.
    #[error("no segment sets provided to merge")]
    NothingToMerge,

    /// Segment or step length is not a positive, finite duration of at least one sample.
    #[error("invalid {what}: {seconds} s at {sfreq} Hz")]
    InvalidWindow {
        /// `"segment length"` or `"step"`.
        what: &'static str,
        /// Requested duration.
        seconds: f64,
        /// Sample rate used for the conversion.
        sfreq: f32,
    },

    /// A channel name was requested that the signal or layout does not carry.
    #[error("unknown channel {name:?}")]
    UnknownChannel {
        /// Offending channel name.
        name: String,
    },

    /// A label→code table maps two labels to one code.
    #[error("label codes are not injective: code {code} is used twice")]
    InvalidLabelCodes {
        /// Duplicated integer code.
        code: i32,
    },
}

/// Convenience alias for core results.
pub type SegResult<T> = std::result::Result<T, SegmentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_mention_the_details() {
        let e = SegmentError::NoSegmentsProduced { segment_samples: 500, step_samples: 250, n_epochs: 3 };
        let msg = e.to_string();
        assert!(msg.contains("500") && msg.contains("250") && msg.contains('3'));

        let e = SegmentError::UnknownSubjectMapping { name: "zofia".into() };
        assert!(e.to_string().contains("zofia"));
    }

    #[test]
    fn wraps_into_anyhow_and_downcasts() {
        let err: anyhow::Error = SegmentError::NothingToMerge.into();
        assert_eq!(err.downcast_ref::<SegmentError>(), Some(&SegmentError::NothingToMerge));
    }
}
