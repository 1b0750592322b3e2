#![allow(dead_code)]

//! Shared builders for synthetic recordings.
use std::f64::consts::PI;
use std::path::Path;

use eegseg::{ContinuousSignal, EventLabel, EventMarker};
use ndarray::Array2;

pub const PHYS_MIN_UV: f64 = -262_144.0;
pub const PHYS_MAX_UV: f64 = 262_143.0;
pub const DIG_MIN: i32 = -8_388_608;
pub const DIG_MAX: i32 = 8_388_607;

/// BioSemi background bits set on every Status sample.
pub const STATUS_BACKGROUND: i32 = 0x3E_0000;

/// Trigger word for `label` as the stimulus PC sends it.
pub fn trigger_code(label: EventLabel) -> i32 {
    let mask = match label {
        EventLabel::Rest => 1,
        EventLabel::LeftHand => 2,
        EventLabel::RightHand => 4,
        EventLabel::BothHands => 8,
        EventLabel::BothFeet => 16,
    };
    mask << 8
}

/// Volts → BDF digital value for the standard ±262 mV range.
pub fn to_digital(volts: f64) -> i32 {
    let gain = (PHYS_MAX_UV - PHYS_MIN_UV) / (DIG_MAX - DIG_MIN) as f64;
    let d = (volts * 1e6 - PHYS_MIN_UV) / gain + DIG_MIN as f64;
    d.round().clamp(DIG_MIN as f64, DIG_MAX as f64) as i32
}

/// Generic amplifier labels `A1..An`.
pub fn generic_names(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("A{i}")).collect()
}

/// Background EEG: a 5 Hz and a 10 Hz sine, ≤ 30 µV peak, phase-shifted per channel.
pub fn background(n_ch: usize, n_times: usize, sfreq: f64) -> Array2<f64> {
    Array2::from_shape_fn((n_ch, n_times), |(c, t)| {
        let t = t as f64 / sfreq;
        let phase = c as f64 * 0.4;
        10e-6 * (2.0 * PI * 10.0 * t + phase).sin() + 20e-6 * (2.0 * PI * 5.0 * t - phase).sin()
    })
}

/// Status channel with a 20-sample pulse per cue.
pub fn status_with_cues(n_times: usize, sfreq: f64, cues: &[(f64, EventLabel)]) -> Vec<i32> {
    let mut status = vec![STATUS_BACKGROUND; n_times];
    for &(onset_s, label) in cues {
        let start = (onset_s * sfreq).round() as usize;
        for s in status.iter_mut().skip(start).take(20) {
            *s = STATUS_BACKGROUND | trigger_code(label);
        }
    }
    status
}

/// Write a BDF file with one-second records.
///
/// `data` holds the amplifier channels in volts; a `Status` channel is
/// appended when `status` is given.
pub fn write_bdf(path: &Path, labels: &[String], data: &Array2<f64>, sfreq: usize, status: Option<&[i32]>) {
    let n_times = data.ncols();
    assert_eq!(n_times % sfreq, 0, "length must be whole seconds");
    let n_records = n_times / sfreq;

    let mut all_labels: Vec<String> = labels.to_vec();
    if status.is_some() {
        all_labels.push("Status".into());
    }
    let n_sig = all_labels.len();

    let pad = |s: &str, w: usize| format!("{s:<w$}").into_bytes();
    let mut out = vec![0xFF];
    out.extend(pad("BIOSEMI", 7));
    out.extend(pad("X X X X", 80));
    out.extend(pad("Startdate 01-JAN-2024 X X BioSemi", 80));
    out.extend(pad("01.01.24", 8));
    out.extend(pad("12.00.00", 8));
    out.extend(pad(&(256 * (n_sig + 1)).to_string(), 8));
    out.extend(pad("24BIT", 44));
    out.extend(pad(&n_records.to_string(), 8));
    out.extend(pad("1", 8));
    out.extend(pad(&n_sig.to_string(), 4));

    const WIDTHS: [usize; 10] = [16, 80, 8, 8, 8, 8, 8, 80, 8, 32];
    for (col, width) in WIDTHS.into_iter().enumerate() {
        for l in &all_labels {
            out.extend(pad(&signal_field(col, l, sfreq), width));
        }
    }

    for r in 0..n_records {
        let span = r * sfreq..(r + 1) * sfreq;
        for row in data.outer_iter() {
            for &v in row.slice(ndarray::s![span.clone()]) {
                out.extend(&to_digital(v).to_le_bytes()[..3]);
            }
        }
        if let Some(st) = status {
            for &v in &st[span.clone()] {
                out.extend(&v.to_le_bytes()[..3]);
            }
        }
    }
    std::fs::write(path, out).unwrap();
}

fn signal_field(col: usize, label: &str, sfreq: usize) -> String {
    let status = label == "Status";
    match col {
        0 => label.to_string(),
        1 if status => "Triggers and Status".into(),
        1 => "Active Electrode".into(),
        2 if status => "Boolean".into(),
        2 => "uV".into(),
        3 => PHYS_MIN_UV.to_string(),
        4 => PHYS_MAX_UV.to_string(),
        5 => DIG_MIN.to_string(),
        6 => DIG_MAX.to_string(),
        7 => "HP:DC; LP:417 Hz".into(),
        8 => sfreq.to_string(),
        _ => String::new(),
    }
}

/// Background EEG as a continuous recording.
pub fn signal(ch_names: Vec<String>, n_times: usize, sfreq: f32) -> ContinuousSignal {
    let data = background(ch_names.len(), n_times, sfreq as f64).mapv(|v| v as f32);
    ContinuousSignal::new(data, ch_names, sfreq).unwrap()
}

pub fn marker(onset_s: f64, label: EventLabel) -> EventMarker {
    EventMarker { onset_s, label, duration_s: None }
}
