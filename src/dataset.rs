//! Segmented datasets and the merger that combines them.
//!
//! A [`SegmentedDataset`] is the persisted artefact: equally shaped
//! `[C, seg_samples]` segments, one label each, plus the metadata every
//! segment shares (sample rate, channel order, optional layout, and the
//! label → code table).
use ndarray::{Array2, Array3, Axis};

use crate::error::{SegResult, SegmentError};
use crate::events::EventLabel;
use crate::montage::Montage;

// ── Label codes ──────────────────────────────────────────────────────────────

/// Ordered, injective label → integer code table.
///
/// Order matters: the slicer walks classes in table order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LabelCodes {
    entries: Vec<(EventLabel, i32)>,
}

impl LabelCodes {
    /// Validate that labels and codes are both unique.
    pub fn new(entries: Vec<(EventLabel, i32)>) -> SegResult<Self> {
        for (i, &(label, code)) in entries.iter().enumerate() {
            for &(other_label, other_code) in &entries[..i] {
                if other_code == code {
                    return Err(SegmentError::InvalidLabelCodes { code });
                }
                if other_label == label {
                    return Err(SegmentError::IncompatibleSegmentSets {
                        reason: format!("label {label} listed twice"),
                    });
                }
            }
        }
        Ok(Self { entries })
    }

    /// Build from a compile-time table known to be injective.
    pub(crate) fn from_static(table: &[(EventLabel, i32)]) -> Self {
        debug_assert!(Self::new(table.to_vec()).is_ok(), "static label table is not injective");
        Self { entries: table.to_vec() }
    }

    pub fn code(&self, label: EventLabel) -> Option<i32> {
        self.entries.iter().find(|(l, _)| *l == label).map(|&(_, c)| c)
    }

    pub fn label(&self, code: i32) -> Option<EventLabel> {
        self.entries.iter().find(|(_, c)| *c == code).map(|&(l, _)| l)
    }

    pub fn labels(&self) -> impl Iterator<Item = EventLabel> + '_ {
        self.entries.iter().map(|&(l, _)| l)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(EventLabel, i32)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries for `labels` only, keeping this table's order.
    pub fn subset(&self, labels: &[EventLabel]) -> Self {
        Self {
            entries: self.entries.iter().filter(|(l, _)| labels.contains(l)).copied().collect(),
        }
    }

    /// Union with `other`; a label with two codes or a code with two labels fails.
    pub fn union(&self, other: &LabelCodes) -> SegResult<Self> {
        let mut entries = self.entries.clone();
        for &(label, code) in &other.entries {
            match (self.code(label), self.label(code)) {
                (Some(c), _) if c == code => {}
                (None, None) => entries.push((label, code)),
                _ => {
                    return Err(SegmentError::IncompatibleSegmentSets {
                        reason: format!("label codes disagree on {label} = {code}"),
                    })
                }
            }
        }
        Ok(Self { entries })
    }
}

// ── Segments ─────────────────────────────────────────────────────────────────

/// One fixed-length window cut from an epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    /// Position in the dataset, dense from 0.
    pub index: usize,
    pub label: EventLabel,
    /// `[C, seg_samples]`.
    pub data: Array2<f32>,
}

/// Equally shaped, labelled segments with shared metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentedDataset {
    pub sfreq: f32,
    pub ch_names: Vec<String>,
    pub montage: Option<Montage>,
    pub label_codes: LabelCodes,
    segments: Vec<Segment>,
}

impl SegmentedDataset {
    /// Check shapes and labels, then number the segments `0..n` in the given order.
    pub fn new(
        sfreq: f32,
        ch_names: Vec<String>,
        montage: Option<Montage>,
        label_codes: LabelCodes,
        segments: Vec<(EventLabel, Array2<f32>)>,
    ) -> SegResult<Self> {
        let n_ch = ch_names.len();
        let seg_len = segments.first().map(|(_, d)| d.ncols());
        if let Some(m) = &montage {
            if m.ch_names != ch_names {
                return Err(SegmentError::IncompatibleSegmentSets {
                    reason: "layout channel order differs from data channel order".into(),
                });
            }
        }

        let segments = segments
            .into_iter()
            .enumerate()
            .map(|(index, (label, data))| {
                if data.dim() != (n_ch, seg_len.unwrap_or(0)) {
                    return Err(SegmentError::IncompatibleSegmentSets {
                        reason: format!(
                            "segment {index} has shape {:?}, expected ({n_ch}, {})",
                            data.dim(),
                            seg_len.unwrap_or(0)
                        ),
                    });
                }
                if label_codes.code(label).is_none() {
                    return Err(SegmentError::IncompatibleSegmentSets {
                        reason: format!("segment {index} label {label} has no code"),
                    });
                }
                Ok(Segment { index, label, data })
            })
            .collect::<SegResult<Vec<_>>>()?;

        Ok(Self { sfreq, ch_names, montage, label_codes, segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Time points per segment, `None` when empty.
    pub fn segment_samples(&self) -> Option<usize> {
        self.segments.first().map(|s| s.data.ncols())
    }

    /// Integer code of every segment, in order.
    pub fn codes(&self) -> Vec<i32> {
        self.segments
            .iter()
            .filter_map(|s| self.label_codes.code(s.label))
            .collect()
    }

    /// Segment count per label, in table order.
    pub fn class_counts(&self) -> Vec<(EventLabel, usize)> {
        self.label_codes
            .labels()
            .map(|l| (l, self.segments.iter().filter(|s| s.label == l).count()))
            .collect()
    }

    /// Stack all segments into `[N, C, seg_samples]`.
    pub fn to_array3(&self) -> Array3<f32> {
        let (n_ch, n_t) = (self.ch_names.len(), self.segment_samples().unwrap_or(0));
        let mut out = Array3::<f32>::zeros((self.len(), n_ch, n_t));
        for (mut dst, seg) in out.axis_iter_mut(Axis(0)).zip(&self.segments) {
            dst.assign(&seg.data);
        }
        out
    }
}

// ── Merger ───────────────────────────────────────────────────────────────────

fn incompatible(reason: String) -> SegmentError {
    SegmentError::IncompatibleSegmentSets { reason }
}

/// Concatenate segment sets in input order.
///
/// All groups must agree on sample rate, channel order and (when non-empty)
/// segment length.  The first layout found is kept and every other layout
/// must place the same channels at the same positions.  Label tables are
/// united.  Segment identities are renumbered densely from 0.  A single
/// group comes back as an independent copy.
pub fn merge(groups: &[SegmentedDataset]) -> SegResult<SegmentedDataset> {
    let (first, rest) = groups.split_first().ok_or(SegmentError::NothingToMerge)?;
    if rest.is_empty() {
        return Ok(first.clone());
    }

    let mut montage = first.montage.clone();
    let mut label_codes = first.label_codes.clone();
    let mut seg_len = first.segment_samples();

    for (i, g) in rest.iter().enumerate() {
        let i = i + 1;
        if g.sfreq != first.sfreq {
            return Err(incompatible(format!("group {i} sample rate {} Hz ≠ {} Hz", g.sfreq, first.sfreq)));
        }
        if g.ch_names != first.ch_names {
            return Err(incompatible(format!("group {i} channel list differs: {:?} vs {:?}", g.ch_names, first.ch_names)));
        }
        match (seg_len, g.segment_samples()) {
            (Some(a), Some(b)) if a != b => {
                return Err(incompatible(format!("group {i} segments have {b} samples, expected {a}")));
            }
            (None, b) => seg_len = b,
            _ => {}
        }
        match (&montage, &g.montage) {
            (Some(m), Some(other)) if !m.is_compatible(other) => {
                return Err(incompatible(format!("group {i} spatial layout differs")));
            }
            (None, Some(other)) => montage = Some(other.clone()),
            _ => {}
        }
        label_codes = label_codes.union(&g.label_codes)?;
    }

    let segments = groups
        .iter()
        .flat_map(|g| g.segments.iter().map(|s| (s.label, s.data.clone())))
        .collect();
    SegmentedDataset::new(first.sfreq, first.ch_names.clone(), montage, label_codes, segments)
}
