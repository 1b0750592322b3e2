//! Per-subject electrode tables: generic amplifier inputs (`A1`…`A16`) to
//! standard 10-10 names.
//!
//! The caps were wired differently for each subject, so every table is
//! hand-calibrated.  Entries the curator changed after the first session are
//! flagged [`Confidence::Modified`]; the one they were not sure about is
//! [`Confidence::Uncertain`].  Nothing here is inferred.
use std::fmt;
use std::str::FromStr;

use log::warn;

use crate::error::{SegResult, SegmentError};

/// Bumped whenever any table below changes.
pub const MAPPING_VERSION: u32 = 1;

/// Recording subject; selects the electrode table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Subject {
    Mati,
    Konrad,
    Hania,
}

impl Subject {
    pub const ALL: [Self; 3] = [Self::Mati, Self::Konrad, Self::Hania];

    /// Lowercase name as it appears in recording file names.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Mati   => "mati",
            Self::Konrad => "konrad",
            Self::Hania  => "hania",
        }
    }

    /// First subject whose name occurs in `recording_name` (case-insensitive).
    pub fn detect(recording_name: &str) -> SegResult<Self> {
        let lower = recording_name.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|s| lower.contains(s.name()))
            .ok_or_else(|| SegmentError::UnknownSubjectMapping { name: recording_name.to_string() })
    }

    /// Electrode table for this subject.
    pub const fn mapping(self) -> &'static [ChannelMapping] {
        match self {
            Self::Mati   => &MATI,
            Self::Konrad => &KONRAD,
            Self::Hania  => &HANIA,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Subject {
    type Err = SegmentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|subj| subj.name() == lower)
            .ok_or_else(|| SegmentError::UnknownSubjectMapping { name: s.to_string() })
    }
}

/// How much the curator trusts a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    Verified,
    /// Changed from the default cap layout for this subject.
    Modified,
    /// Changed, and the curator was not sure the new position is right.
    Uncertain,
}

/// One generic-input → standard-name correspondence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMapping {
    pub generic: &'static str,
    pub standard: &'static str,
    pub confidence: Confidence,
}

const fn m(generic: &'static str, standard: &'static str) -> ChannelMapping {
    ChannelMapping { generic, standard, confidence: Confidence::Verified }
}

const fn modified(generic: &'static str, standard: &'static str) -> ChannelMapping {
    ChannelMapping { generic, standard, confidence: Confidence::Modified }
}

const fn uncertain(generic: &'static str, standard: &'static str) -> ChannelMapping {
    ChannelMapping { generic, standard, confidence: Confidence::Uncertain }
}

const MATI: [ChannelMapping; 16] = [
    m("A1", "Fp1"),  m("A2", "Fp2"),  m("A3", "F4"),   m("A4", "Fz"),
    m("A5", "F3"),   m("A6", "T7"),   m("A7", "C3"),   m("A8", "Cz"),
    m("A9", "C4"),   m("A10", "T8"),  m("A11", "P4"),  m("A12", "Pz"),
    m("A13", "P3"),  m("A14", "O1"),  m("A15", "Oz"),  m("A16", "O2"),
];

const KONRAD: [ChannelMapping; 16] = [
    m("A1", "Cz"),   m("A2", "FCz"),  m("A3", "CP1"),  m("A4", "FC1"),
    m("A5", "C1"),   m("A6", "CP3"),  m("A7", "C3"),   m("A8", "FC3"),
    m("A9", "C4"),   m("A10", "FC4"), m("A11", "Pz"),  m("A12", "CP2"),
    m("A13", "CP4"), m("A14", "C2"),  m("A15", "CPz"), m("A16", "FC2"),
];

const HANIA: [ChannelMapping; 16] = [
    m("A1", "Fp1"),         m("A2", "Fp2"),          m("A3", "F4"),           m("A4", "Fz"),
    m("A5", "F3"),          modified("A6", "CP1"),   m("A7", "C3"),           m("A8", "Cz"),
    m("A9", "C4"),          modified("A10", "CP2"),  m("A11", "P4"),          m("A12", "Pz"),
    m("A13", "P3"),         modified("A14", "FC1"),  uncertain("A15", "CPz"), modified("A16", "FC2"),
];

/// Standard name for one generic input, or `None` if the table has no entry.
pub fn lookup(subject: Subject, generic: &str) -> Option<&'static ChannelMapping> {
    subject.mapping().iter().find(|e| e.generic == generic)
}

/// Rename `channel_names` with `subject`'s table.
///
/// Names without a table entry are kept as they are.  Applying an
/// [`Confidence::Uncertain`] entry logs a warning.
pub fn rename(channel_names: &[String], subject: Subject) -> Vec<String> {
    channel_names
        .iter()
        .map(|name| match lookup(subject, name) {
            Some(entry) => {
                if entry.confidence == Confidence::Uncertain {
                    warn!(
                        "{subject}: mapping {} → {} is marked uncertain (table v{MAPPING_VERSION})",
                        entry.generic, entry.standard
                    );
                }
                entry.standard.to_string()
            }
            None => name.clone(),
        })
        .collect()
}

/// Rename by subject name; unknown subjects fail with
/// [`SegmentError::UnknownSubjectMapping`].
pub fn rename_for(channel_names: &[String], subject: &str) -> SegResult<Vec<String>> {
    Ok(rename(channel_names, subject.parse()?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generic() -> Vec<String> {
        (1..=16).map(|i| format!("A{i}")).collect()
    }

    #[test]
    fn tables_cover_all_sixteen_inputs_without_duplicates() {
        for s in Subject::ALL {
            let renamed = rename(&generic(), s);
            let mut sorted = renamed.clone();
            sorted.sort();
            sorted.dedup();
            assert_eq!(sorted.len(), 16, "{s}: duplicate standard names");
            assert!(renamed.iter().all(|n| !n.starts_with('A')), "{s}: unmapped input");
        }
    }

    #[test]
    fn konrad_table_is_verbatim() {
        let renamed = rename(&generic(), Subject::Konrad);
        assert_eq!(
            renamed,
            ["Cz", "FCz", "CP1", "FC1", "C1", "CP3", "C3", "FC3",
             "C4", "FC4", "Pz", "CP2", "CP4", "C2", "CPz", "FC2"]
        );
    }

    #[test]
    fn hania_flags_curated_entries() {
        let flagged: Vec<_> = Subject::Hania
            .mapping()
            .iter()
            .filter(|e| e.confidence != Confidence::Verified)
            .map(|e| (e.generic, e.confidence))
            .collect();
        assert_eq!(
            flagged,
            [
                ("A6", Confidence::Modified),
                ("A10", Confidence::Modified),
                ("A14", Confidence::Modified),
                ("A15", Confidence::Uncertain),
                ("A16", Confidence::Modified),
            ]
        );
        assert!(Subject::Mati.mapping().iter().all(|e| e.confidence == Confidence::Verified));
    }

    #[test]
    fn unknown_names_pass_through() {
        let names = vec!["A1".to_string(), "Status".to_string()];
        assert_eq!(rename(&names, Subject::Mati), ["Fp1", "Status"]);
    }

    #[test]
    fn unknown_subject_is_an_error() {
        assert!(matches!(
            rename_for(&generic(), "zofia"),
            Err(SegmentError::UnknownSubjectMapping { .. })
        ));
        assert_eq!(rename_for(&generic(), "MATI").unwrap()[0], "Fp1");
    }

    #[test]
    fn subject_detected_from_recording_name() {
        assert_eq!(Subject::detect("Konrad-real_movement_03_annotated").unwrap(), Subject::Konrad);
        assert!(Subject::detect("anonymous_run1").is_err());
    }
}
