//! Safetensors I/O for annotated recordings and segmented datasets.
//!
//! Both artefacts are plain safetensors files: an 8-byte little-endian header
//! length, a JSON header, then the raw tensor bytes.  Everything that is not
//! an array (channel names, markers, the label table) travels as JSON strings
//! under `__metadata__`.
//!
//! Annotated recording:
//! ```text
//! data      F32 [C, T]   volts
//! sfreq     F32 [1]
//! chan_pos  F32 [C, 3]   optional
//! __metadata__: ch_names, markers = [{onset, duration, description}]
//! ```
//!
//! Segmented dataset:
//! ```text
//! data        F32 [N, C, seg_samples]
//! labels      I32 [N]    label codes
//! segment_id  I32 [N]
//! sfreq       F32 [1]
//! chan_pos    F32 [C, 3] optional
//! __metadata__: ch_names, label_codes = [[tag, code], ...]
//! ```
use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use log::info;
use ndarray::{Array2, Array3, Axis};
use serde_json::{json, Value};

use crate::dataset::{LabelCodes, SegmentedDataset};
use crate::events::{EventLabel, EventMarker};
use crate::montage::Montage;
use crate::signal::ContinuousSignal;

const METADATA_KEY: &str = "__metadata__";

// ── Reader ───────────────────────────────────────────────────────────────────

/// An in-memory safetensors file.
pub struct StFile {
    bytes: Vec<u8>,
    data_start: usize,
    header: HashMap<String, Value>,
}

impl StFile {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        Self::from_bytes(bytes).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        let len_bytes: [u8; 8] = bytes
            .get(..8)
            .and_then(|b| b.try_into().ok())
            .context("safetensors file too small")?;
        let data_start = usize::try_from(u64::from_le_bytes(len_bytes))
            .ok()
            .and_then(|n| n.checked_add(8))
            .context("safetensors header truncated")?;
        let raw = bytes.get(8..data_start).context("safetensors header truncated")?;
        let header: HashMap<String, Value> =
            serde_json::from_slice(raw).context("failed to parse safetensors header")?;
        Ok(Self { bytes, data_start, header })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.header.contains_key(name)
    }

    /// A `__metadata__` string entry.
    pub fn metadata(&self, key: &str) -> Result<&str> {
        self.header
            .get(METADATA_KEY)
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
            .with_context(|| format!("missing metadata entry {key:?}"))
    }

    /// A `__metadata__` entry holding JSON, decoded.
    pub fn metadata_json(&self, key: &str) -> Result<Value> {
        serde_json::from_str(self.metadata(key)?).with_context(|| format!("metadata {key:?} is not JSON"))
    }

    fn tensor(&self, name: &str, dtype: &str) -> Result<(&[u8], Vec<usize>)> {
        let entry = self.header.get(name).with_context(|| format!("missing tensor {name:?}"))?;
        let found = entry["dtype"].as_str().unwrap_or_default();
        ensure!(found == dtype, "tensor {name:?} is {found}, expected {dtype}");

        let shape = entry["shape"]
            .as_array()
            .with_context(|| format!("tensor {name:?} has no shape"))?
            .iter()
            .map(|v| v.as_u64().map(|d| d as usize))
            .collect::<Option<Vec<_>>>()
            .with_context(|| format!("tensor {name:?} has a bad shape"))?;
        let offsets = entry["data_offsets"]
            .as_array()
            .and_then(|o| Some((o.first()?.as_u64()? as usize, o.get(1)?.as_u64()? as usize)))
            .with_context(|| format!("tensor {name:?} has bad offsets"))?;

        let raw = self
            .data_start
            .checked_add(offsets.0)
            .zip(self.data_start.checked_add(offsets.1))
            .and_then(|(start, end)| self.bytes.get(start..end))
            .with_context(|| format!("tensor {name:?} runs past the end of the file"))?;
        let n_bytes = shape
            .iter()
            .try_fold(4usize, |acc, &d| acc.checked_mul(d))
            .with_context(|| format!("tensor {name:?} has a bad shape"))?;
        ensure!(
            raw.len() == n_bytes,
            "tensor {name:?}: {} bytes for shape {shape:?}",
            raw.len()
        );
        Ok((raw, shape))
    }

    pub fn f32(&self, name: &str) -> Result<(Vec<f32>, Vec<usize>)> {
        let (raw, shape) = self.tensor(name, "F32")?;
        let v = raw.chunks_exact(4).map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])).collect();
        Ok((v, shape))
    }

    pub fn i32(&self, name: &str) -> Result<(Vec<i32>, Vec<usize>)> {
        let (raw, shape) = self.tensor(name, "I32")?;
        let v = raw.chunks_exact(4).map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]])).collect();
        Ok((v, shape))
    }

    pub fn f32_arr2(&self, name: &str) -> Result<Array2<f32>> {
        let (v, shape) = self.f32(name)?;
        let [r, c] = shape[..] else { bail!("tensor {name:?} is not 2-D: {shape:?}") };
        Ok(Array2::from_shape_vec((r, c), v)?)
    }

    pub fn f32_arr3(&self, name: &str) -> Result<Array3<f32>> {
        let (v, shape) = self.f32(name)?;
        let [a, b, c] = shape[..] else { bail!("tensor {name:?} is not 3-D: {shape:?}") };
        Ok(Array3::from_shape_vec((a, b, c), v)?)
    }

    pub fn f32_scalar(&self, name: &str) -> Result<f32> {
        let (v, _) = self.f32(name)?;
        v.first().copied().with_context(|| format!("tensor {name:?} is empty"))
    }
}

// ── Writer ───────────────────────────────────────────────────────────────────

/// Safetensors writer for F32 and I32 tensors plus string metadata.
///
/// ```rust,no_run
/// use eegseg::io::StWriter;
/// use std::path::Path;
/// let mut w = StWriter::new();
/// w.add_f32("signal", &[1.0f32, 2.0, 3.0], &[1, 3]);
/// w.add_metadata("source", "synthetic");
/// w.write(Path::new("/tmp/out.safetensors")).unwrap();
/// ```
#[derive(Default)]
pub struct StWriter {
    entries: Vec<(String, Vec<u8>, &'static str, Vec<usize>)>,
    metadata: serde_json::Map<String, Value>,
}

impl StWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_f32(&mut self, name: &str, data: &[f32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "F32", shape.to_vec()));
    }

    pub fn add_f32_arr2(&mut self, name: &str, arr: &Array2<f32>) {
        let data: Vec<f32> = arr.iter().copied().collect();
        self.add_f32(name, &data, &[arr.nrows(), arr.ncols()]);
    }

    pub fn add_f32_arr3(&mut self, name: &str, arr: &Array3<f32>) {
        let data: Vec<f32> = arr.iter().copied().collect();
        self.add_f32(name, &data, arr.shape());
    }

    pub fn add_i32(&mut self, name: &str, data: &[i32], shape: &[usize]) {
        let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
        self.entries.push((name.to_string(), bytes, "I32", shape.to_vec()));
    }

    pub fn add_metadata(&mut self, key: &str, value: impl Into<String>) {
        self.metadata.insert(key.to_string(), Value::String(value.into()));
    }

    /// Write (or overwrite) `path`.
    pub fn write(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut header_map = serde_json::Map::new();
        if !self.metadata.is_empty() {
            header_map.insert(METADATA_KEY.into(), Value::Object(self.metadata.clone()));
        }
        let mut offset: usize = 0;
        for (name, data, dtype, shape) in &self.entries {
            header_map.insert(name.clone(), json!({
                "dtype": dtype,
                "shape": shape,
                "data_offsets": [offset, offset + data.len()],
            }));
            offset += data.len();
        }
        let hdr_bytes = serde_json::to_vec(&header_map)?;
        let pad = (8 - hdr_bytes.len() % 8) % 8;
        let padded: Vec<u8> = hdr_bytes.into_iter().chain(std::iter::repeat(b' ').take(pad)).collect();

        let mut f = std::fs::File::create(path).with_context(|| format!("creating {}", path.display()))?;
        f.write_all(&(padded.len() as u64).to_le_bytes())?;
        f.write_all(&padded)?;
        for (_, data, _, _) in &self.entries {
            f.write_all(data)?;
        }
        Ok(())
    }
}

// ── Shared pieces ────────────────────────────────────────────────────────────

fn add_layout(w: &mut StWriter, ch_names: &[String], montage: Option<&Montage>) -> Result<()> {
    w.add_metadata("ch_names", serde_json::to_string(ch_names)?);
    if let Some(m) = montage {
        w.add_f32_arr2("chan_pos", &m.positions);
    }
    Ok(())
}

fn read_layout(st: &StFile) -> Result<(Vec<String>, Option<Montage>)> {
    let ch_names: Vec<String> =
        serde_json::from_value(st.metadata_json("ch_names")?).context("ch_names must be a list of strings")?;
    let montage = if st.contains("chan_pos") {
        let positions = st.f32_arr2("chan_pos")?;
        ensure!(
            positions.dim() == (ch_names.len(), 3),
            "chan_pos has shape {:?} for {} channels",
            positions.dim(),
            ch_names.len()
        );
        Some(Montage { ch_names: ch_names.clone(), positions })
    } else {
        None
    };
    Ok((ch_names, montage))
}

// ── Annotated recordings ─────────────────────────────────────────────────────

/// A continuous recording with its decoded markers.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedRecording {
    pub signal: ContinuousSignal,
    pub markers: Vec<EventMarker>,
}

pub fn save_annotated(path: &Path, signal: &ContinuousSignal, markers: &[EventMarker]) -> Result<()> {
    let mut w = StWriter::new();
    w.add_f32_arr2("data", &signal.data);
    w.add_f32("sfreq", &[signal.sfreq], &[1]);
    add_layout(&mut w, &signal.ch_names, signal.montage.as_ref())?;

    let annotations: Vec<Value> = markers
        .iter()
        .map(|m| json!({ "onset": m.onset_s, "duration": m.duration_s, "description": m.label.tag() }))
        .collect();
    w.add_metadata("markers", serde_json::to_string(&annotations)?);
    w.write(path)?;
    info!("wrote {} markers to {}", markers.len(), path.display());
    Ok(())
}

pub fn load_annotated(path: &Path) -> Result<AnnotatedRecording> {
    let st = StFile::open(path)?;
    let data = st.f32_arr2("data")?;
    let sfreq = st.f32_scalar("sfreq")?;
    let (ch_names, montage) = read_layout(&st)?;
    let mut signal = ContinuousSignal::new(data, ch_names, sfreq)?;
    signal.montage = montage;

    let annotations = st.metadata_json("markers")?;
    let markers = annotations
        .as_array()
        .context("markers must be a list")?
        .iter()
        .map(|a| {
            let description = a["description"].as_str().context("marker without description")?;
            let label: EventLabel = description.parse().map_err(anyhow::Error::msg)?;
            Ok(EventMarker {
                onset_s: a["onset"].as_f64().context("marker without onset")?,
                label,
                duration_s: a["duration"].as_f64(),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(AnnotatedRecording { signal, markers })
}

// ── Segmented datasets ───────────────────────────────────────────────────────

/// Write `ds` to `path`, replacing any existing file.
pub fn save_dataset(path: &Path, ds: &SegmentedDataset) -> Result<()> {
    let mut w = StWriter::new();
    let n = ds.len();
    w.add_f32_arr3("data", &ds.to_array3());
    w.add_i32("labels", &ds.codes(), &[n]);
    let ids: Vec<i32> = ds.segments().iter().map(|s| s.index as i32).collect();
    w.add_i32("segment_id", &ids, &[n]);
    w.add_f32("sfreq", &[ds.sfreq], &[1]);
    add_layout(&mut w, &ds.ch_names, ds.montage.as_ref())?;

    let table: Vec<(&str, i32)> = ds.label_codes.iter().map(|&(l, c)| (l.tag(), c)).collect();
    w.add_metadata("label_codes", serde_json::to_string(&table)?);
    w.write(path)?;
    info!("wrote {n} segments to {}", path.display());
    Ok(())
}

pub fn load_dataset(path: &Path) -> Result<SegmentedDataset> {
    let st = StFile::open(path)?;
    let data = st.f32_arr3("data")?;
    let (codes, _) = st.i32("labels")?;
    let sfreq = st.f32_scalar("sfreq")?;
    let (ch_names, montage) = read_layout(&st)?;

    let table: Vec<(String, i32)> =
        serde_json::from_value(st.metadata_json("label_codes")?).context("label_codes must be [tag, code] pairs")?;
    let label_codes = LabelCodes::new(
        table
            .into_iter()
            .map(|(tag, code)| Ok((tag.parse::<EventLabel>().map_err(anyhow::Error::msg)?, code)))
            .collect::<Result<Vec<_>>>()?,
    )?;

    ensure!(codes.len() == data.len_of(Axis(0)), "{} labels for {} segments", codes.len(), data.len_of(Axis(0)));
    let segments = data
        .axis_iter(Axis(0))
        .zip(&codes)
        .map(|(seg, &code)| {
            let label = label_codes.label(code).with_context(|| format!("label code {code} not in table"))?;
            Ok((label, seg.to_owned()))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(SegmentedDataset::new(sfreq, ch_names, montage, label_codes, segments)?)
}
