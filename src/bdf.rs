//! BioSemi BDF reader.
//!
//! # Layout
//! ```text
//! main header   256 bytes, ASCII fields (version, ids, date, counts)
//! signal hdrs   256 bytes per signal, stored field-by-field
//!               label 16 · transducer 80 · dimension 8 · phys min 8 ·
//!               phys max 8 · dig min 8 · dig max 8 · prefilter 80 ·
//!               samples per record 8 · reserved 32
//! data records  for each record, for each signal: n samples × 3 bytes
//! ```
//! Samples are 24-bit little-endian two's complement.  Calibration is
//! `phys = (d − dmin) · (pmax − pmin) / (dmax − dmin) + pmin`, then scaled
//! to volts from the dimension field.  The `Status` channel is returned
//! separately as raw integer codes.
use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use log::{debug, info, warn};
use ndarray::Array2;

use crate::signal::ContinuousSignal;

const MAIN_HEADER_LEN: usize = 256;
const SIGNAL_HEADER_LEN: usize = 256;
const BYTES_PER_SAMPLE: usize = 3;
const STATUS_LABEL: &str = "Status";

/// Per-signal header fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalHeader {
    pub label: String,
    pub transducer: String,
    pub physical_dim: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefilter: String,
    pub samples_per_record: usize,
}

impl SignalHeader {
    /// `(gain, offset)` such that `phys = d · gain + offset`, in volts.
    pub fn calibration(&self) -> (f64, f64) {
        let span = (self.digital_max - self.digital_min) as f64;
        let gain = if span == 0.0 { 1.0 } else { (self.physical_max - self.physical_min) / span };
        let offset = self.physical_min - self.digital_min as f64 * gain;
        let unit = unit_scale(&self.physical_dim);
        (gain * unit, offset * unit)
    }

    pub fn is_status(&self) -> bool {
        self.label.eq_ignore_ascii_case(STATUS_LABEL)
    }
}

/// Volts per unit of `dim`; unknown units are left as-is.
fn unit_scale(dim: &str) -> f64 {
    match dim.trim() {
        "uV" | "µV" | "μV" => 1e-6,
        "mV" => 1e-3,
        "nV" => 1e-9,
        "V" => 1.0,
        "" => 1.0,
        other => {
            debug!("unrecognised physical dimension {other:?}; no scaling");
            1.0
        }
    }
}

/// Parsed BDF header.
#[derive(Debug, Clone, PartialEq)]
pub struct BdfHeader {
    pub patient: String,
    pub recording: String,
    pub start_date: String,
    pub start_time: String,
    pub header_bytes: usize,
    pub n_records: usize,
    pub record_duration_s: f64,
    pub signals: Vec<SignalHeader>,
}

impl BdfHeader {
    /// Common sample rate of every signal.
    pub fn sfreq(&self) -> Result<f64> {
        let spr = self.signals.first().context("recording has no signals")?.samples_per_record;
        ensure!(
            self.signals.iter().all(|s| s.samples_per_record == spr),
            "signals have different sample rates; mixed-rate recordings are not supported"
        );
        ensure!(self.record_duration_s > 0.0, "non-positive record duration {}", self.record_duration_s);
        Ok(spr as f64 / self.record_duration_s)
    }

    fn record_bytes(&self) -> usize {
        self.signals.iter().map(|s| s.samples_per_record * BYTES_PER_SAMPLE).sum()
    }
}

/// A decoded recording: amplifier channels in volts plus the status codes.
#[derive(Debug, Clone)]
pub struct BdfRecording {
    pub header: BdfHeader,
    pub signal: ContinuousSignal,
    /// Raw status words, one per sample; empty when there is no `Status` channel.
    pub status: Vec<i32>,
}

/// Read a BDF file from disk.
pub fn read_bdf(path: &Path) -> Result<BdfRecording> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let rec = parse_bdf(&bytes).with_context(|| format!("decoding {}", path.display()))?;
    info!(
        "{}: {} channels, {:.1} s at {} Hz",
        path.display(),
        rec.signal.n_channels(),
        rec.signal.duration_secs(),
        rec.signal.sfreq
    );
    Ok(rec)
}

/// Decode an in-memory BDF file.
pub fn parse_bdf(bytes: &[u8]) -> Result<BdfRecording> {
    let header = parse_header(bytes)?;
    let sfreq = header.sfreq()?;
    let spr = header.signals[0].samples_per_record;
    let n_times = header.n_records * spr;

    let data_start = header.header_bytes;
    let needed = header.n_records * header.record_bytes();
    ensure!(
        bytes.len() >= data_start + needed,
        "file holds {} data bytes, header promises {needed}",
        bytes.len().saturating_sub(data_start)
    );

    let eeg_idx: Vec<usize> = (0..header.signals.len()).filter(|&i| !header.signals[i].is_status()).collect();
    let status_idx = header.signals.iter().position(SignalHeader::is_status);
    let cals: Vec<(f64, f64)> = header.signals.iter().map(SignalHeader::calibration).collect();

    let mut data = Array2::<f32>::zeros((eeg_idx.len(), n_times));
    let mut status = Vec::with_capacity(if status_idx.is_some() { n_times } else { 0 });

    let record_bytes = header.record_bytes();
    let sig_bytes = spr * BYTES_PER_SAMPLE;
    for r in 0..header.n_records {
        let record = &bytes[data_start + r * record_bytes..][..record_bytes];
        for (sig, chunk) in record.chunks_exact(sig_bytes).enumerate() {
            let samples = chunk.chunks_exact(BYTES_PER_SAMPLE);
            if Some(sig) == status_idx {
                status.extend(samples.map(|b| read_u24(b) as i32));
            } else if let Some(row) = eeg_idx.iter().position(|&i| i == sig) {
                let (gain, offset) = cals[sig];
                for (k, b) in samples.enumerate() {
                    data[[row, r * spr + k]] = (read_i24(b) as f64 * gain + offset) as f32;
                }
            }
        }
    }

    if status_idx.is_none() {
        warn!("no {STATUS_LABEL} channel; recording carries no event codes");
    }
    let ch_names = eeg_idx.iter().map(|&i| header.signals[i].label.clone()).collect();
    let signal = ContinuousSignal::new(data, ch_names, sfreq as f32)?;
    Ok(BdfRecording { header, signal, status })
}

// ── Header ───────────────────────────────────────────────────────────────────

fn parse_header(bytes: &[u8]) -> Result<BdfHeader> {
    ensure!(bytes.len() >= MAIN_HEADER_LEN, "file shorter than a BDF header");
    if bytes[0] != 0xFF || &bytes[1..8] != b"BIOSEMI" {
        bail!("not a BDF file (bad version field)");
    }

    let n_signals: usize = number(field(bytes, 252, 4)?, "signal count")?;
    let header_bytes: usize = number(field(bytes, 184, 8)?, "header size")?;
    ensure!(
        header_bytes == MAIN_HEADER_LEN + n_signals * SIGNAL_HEADER_LEN,
        "header size {header_bytes} does not match {n_signals} signals"
    );
    ensure!(bytes.len() >= header_bytes, "file truncated inside the signal headers");
    let record_duration_s: f64 = number(field(bytes, 244, 8)?, "record duration")?;
    let declared_records: i64 = number(field(bytes, 236, 8)?, "record count")?;

    // Signal fields are laid out column-wise: all labels, then all transducers, ...
    let widths = [16, 80, 8, 8, 8, 8, 8, 80, 8, 32];
    let mut starts = [0usize; 10];
    let mut pos = MAIN_HEADER_LEN;
    for (s, w) in starts.iter_mut().zip(widths) {
        *s = pos;
        pos += w * n_signals;
    }
    let col = |c: usize, i: usize| field(bytes, starts[c] + i * widths[c], widths[c]);

    let signals = (0..n_signals)
        .map(|i| {
            Ok(SignalHeader {
                label: col(0, i)?.to_string(),
                transducer: col(1, i)?.to_string(),
                physical_dim: col(2, i)?.to_string(),
                physical_min: number(col(3, i)?, "physical minimum")?,
                physical_max: number(col(4, i)?, "physical maximum")?,
                digital_min: number(col(5, i)?, "digital minimum")?,
                digital_max: number(col(6, i)?, "digital maximum")?,
                prefilter: col(7, i)?.to_string(),
                samples_per_record: number(col(8, i)?, "samples per record")?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut header = BdfHeader {
        patient: field(bytes, 8, 80)?.to_string(),
        recording: field(bytes, 88, 80)?.to_string(),
        start_date: field(bytes, 168, 8)?.to_string(),
        start_time: field(bytes, 176, 8)?.to_string(),
        header_bytes,
        n_records: 0,
        record_duration_s,
        signals,
    };

    let record_bytes = header.record_bytes();
    ensure!(record_bytes > 0, "data records are empty");
    let available = (bytes.len() - header_bytes) / record_bytes;
    header.n_records = if declared_records < 0 {
        debug!("record count unknown; {available} records from file size");
        available
    } else {
        let declared = declared_records as usize;
        if declared > available {
            warn!("header declares {declared} records but file holds {available}; reading {available}");
        }
        declared.min(available)
    };
    Ok(header)
}

fn field(bytes: &[u8], start: usize, len: usize) -> Result<&str> {
    let raw = bytes.get(start..start + len).context("header field out of range")?;
    Ok(std::str::from_utf8(raw).context("header field is not ASCII")?.trim())
}

fn number<T: std::str::FromStr>(s: &str, what: &str) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    s.parse::<T>().with_context(|| format!("bad {what} {s:?}"))
}

#[inline]
fn read_u24(b: &[u8]) -> u32 {
    u32::from(b[0]) | u32::from(b[1]) << 8 | u32::from(b[2]) << 16
}

#[inline]
fn read_i24(b: &[u8]) -> i32 {
    ((read_u24(b) << 8) as i32) >> 8
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal BDF image: `labels` with one second per record.
    fn bdf(labels: &[&str], spr: usize, records: &[Vec<Vec<i32>>], declared: i64) -> Vec<u8> {
        let n = labels.len();
        let pad = |s: &str, w: usize| format!("{s:<w$}").into_bytes();
        let mut out = vec![0xFF];
        out.extend(pad("BIOSEMI", 7));
        out.extend(pad("patient", 80));
        out.extend(pad("recording", 80));
        out.extend(pad("01.01.24", 8));
        out.extend(pad("10.00.00", 8));
        out.extend(pad(&(256 * (n + 1)).to_string(), 8));
        out.extend(pad("24BIT", 44));
        out.extend(pad(&declared.to_string(), 8));
        out.extend(pad("1", 8));
        out.extend(pad(&n.to_string(), 4));
        let each = |out: &mut Vec<u8>, w: usize, f: &dyn Fn(&str) -> String| {
            for l in labels {
                out.extend(pad(&f(l), w));
            }
        };
        each(&mut out, 16, &|l| l.to_string());
        each(&mut out, 80, &|_| String::new());
        each(&mut out, 8, &|l| if l == "Status" { "Boolean".into() } else { "uV".into() });
        each(&mut out, 8, &|_| "-262144".into());
        each(&mut out, 8, &|_| "262143".into());
        each(&mut out, 8, &|_| "-8388608".into());
        each(&mut out, 8, &|_| "8388607".into());
        each(&mut out, 80, &|_| String::new());
        each(&mut out, 8, &|_| spr.to_string());
        each(&mut out, 32, &|_| String::new());
        for rec in records {
            for sig in rec {
                for &v in sig {
                    out.extend(&v.to_le_bytes()[..3]);
                }
            }
        }
        out
    }

    #[test]
    fn decodes_samples_and_status() {
        let rec = vec![vec![vec![0, 1, -1, 8_388_607], vec![0, 0x0200, 0x0200, 0]]];
        let bytes = bdf(&["A1", "Status"], 4, &rec, 1);
        let r = parse_bdf(&bytes).unwrap();
        assert_eq!(r.signal.ch_names, ["A1"]);
        assert_eq!(r.signal.sfreq, 4.0);
        assert_eq!(r.status, vec![0, 0x0200, 0x0200, 0]);

        let gain = 524_287.0 / 16_777_215.0 * 1e-6;
        let offset = -262_144e-6 + 8_388_608.0 * gain;
        approx::assert_abs_diff_eq!(r.signal.data[[0, 0]] as f64, offset, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(r.signal.data[[0, 2]] as f64, offset - gain, epsilon = 1e-9);
        approx::assert_abs_diff_eq!(r.signal.data[[0, 3]] as f64, 262_143e-6, epsilon = 1e-7);
    }

    #[test]
    fn records_are_concatenated() {
        let recs = vec![vec![vec![1, 2]], vec![vec![3, 4]], vec![vec![5, 6]]];
        let r = parse_bdf(&bdf(&["A1"], 2, &recs, 3)).unwrap();
        assert_eq!(r.signal.n_times(), 6);
        assert!(r.status.is_empty());
        let d = r.signal.data.row(0);
        assert!(d.windows(2).into_iter().all(|w| w[1] > w[0]));
    }

    #[test]
    fn unknown_record_count_uses_file_size() {
        let recs = vec![vec![vec![1, 2]], vec![vec![3, 4]]];
        let r = parse_bdf(&bdf(&["A1"], 2, &recs, -1)).unwrap();
        assert_eq!(r.header.n_records, 2);
    }

    #[test]
    fn rejects_edf_and_truncated_files() {
        let mut bytes = bdf(&["A1"], 2, &[vec![vec![1, 2]]], 1);
        assert!(parse_bdf(&bytes[..100]).is_err());
        bytes[0] = b'0';
        assert!(parse_bdf(&bytes).is_err());
    }

    #[test]
    fn sign_extension() {
        assert_eq!(read_i24(&[0xFF, 0xFF, 0xFF]), -1);
        assert_eq!(read_i24(&[0x00, 0x00, 0x80]), -8_388_608);
        assert_eq!(read_i24(&[0xFF, 0xFF, 0x7F]), 8_388_607);
        assert_eq!(read_u24(&[0x00, 0x02, 0xFF]), 0xFF0200);
    }

    #[test]
    fn unit_scaling() {
        assert_eq!(unit_scale("uV"), 1e-6);
        assert_eq!(unit_scale("mV"), 1e-3);
        assert_eq!(unit_scale("V"), 1.0);
    }
}
