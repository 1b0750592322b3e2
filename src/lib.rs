//! # eegseg — motor-imagery EEG segmentation
//!
//! Turns BioSemi recordings of cue-paced motor-imagery sessions into
//! fixed-length, labelled training segments.
//!
//! ## Pipeline overview
//!
//! ```text
//! rec.bdf
//!   │
//!   ├─ bdf::read_bdf()               24-bit samples → volts, Status codes
//!   ├─ events::find_events()         edges on the Status channel
//!   ├─ events::decode_events()       (code & 0xFF00) >> 8 → R/LH/RH/BH/BF
//!   └─ io::save_annotated()          rec_annotated.safetensors
//!
//! rec_annotated.safetensors
//!   │
//!   ├─ ContinuousSignal::pick()      A1..A16
//!   ├─ ContinuousSignal::preprocess  resample 250 Hz, FIR 1–40 Hz, notch 50 Hz
//!   ├─ channels::rename()            per-subject electrode table
//!   ├─ montage::Montage::standard()  10-10 positions
//!   ├─ epochs::extract_epochs()      one window per marker, per epoch group
//!   ├─ segment::split_into_segments  sliding window per class
//!   ├─ dataset::merge()              task then rest
//!   └─ io::save_dataset()            {name}_epochs_splitted_segment=…-epo.safetensors
//! ```
//!
//! ## Quick start
//!
//! ```no_run
//! use eegseg::{split_into_segments, extract_epochs, merge, RecordingMode};
//! use eegseg::io::load_annotated;
//! use std::path::Path;
//!
//! let rec = load_annotated(Path::new("data/mati_real_annotated.safetensors")).unwrap();
//! let mode = RecordingMode::Manual;
//! let codes = mode.label_codes();
//!
//! let groups: Vec<_> = mode
//!     .epoch_plan()
//!     .iter()
//!     .map(|spec| {
//!         let epochs = extract_epochs(&rec.signal, &rec.markers, spec, &codes);
//!         split_into_segments(&epochs, 2.0, Some(1.0)).unwrap()
//!     })
//!     .collect();
//! let dataset = merge(&groups).unwrap();
//! println!("{} segments of {:?} samples", dataset.len(), dataset.segment_samples());
//! ```

pub mod bdf;
pub mod channels;
pub mod config;
pub mod dataset;
pub mod epochs;
pub mod error;
pub mod events;
pub mod filter;
pub mod io;
pub mod montage;
pub mod pipeline;
pub mod resample;
pub mod segment;
pub mod signal;

// ── Crate-root re-exports ─────────────────────────────────────────────────

// errors
pub use error::{SegResult, SegmentError};

// config
pub use config::{EpochGroupSpec, EpochWindow, PreprocessConfig, RecordingMode, SegmentConfig};

// events
pub use events::{decode_events, find_events, EventLabel, EventMarker, RawEvent};

// channels + layout
pub use channels::{rename, ChannelMapping, Confidence, Subject, MAPPING_VERSION};
pub use montage::Montage;

// signal, epochs, segments
pub use dataset::{merge, LabelCodes, Segment, SegmentedDataset};
pub use epochs::{extract_epochs, Epoch, Epochs};
pub use segment::{split_into_segments, SegmentWindow};
pub use signal::ContinuousSignal;

// pipeline
pub use pipeline::{annotate_all, discover_recordings, split_all, BatchReport};
