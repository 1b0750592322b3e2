//! Continuous multichannel recordings and the preprocessing chain run on
//! them before epoching.
use anyhow::{ensure, Result};
use log::info;
use ndarray::{Array2, Axis};

use crate::channels::{self, Subject};
use crate::config::PreprocessConfig;
use crate::error::{SegResult, SegmentError};
use crate::filter::{apply_fir_zero_phase, design_bandpass, design_notch};
use crate::montage::Montage;
use crate::resample::resample;

/// A decoded recording: `[C, T]` samples in volts plus channel metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousSignal {
    pub sfreq: f32,
    pub ch_names: Vec<String>,
    pub data: Array2<f32>,
    /// Sensor positions, once standard names are assigned.
    pub montage: Option<Montage>,
}

impl ContinuousSignal {
    pub fn new(data: Array2<f32>, ch_names: Vec<String>, sfreq: f32) -> Result<Self> {
        ensure!(
            data.nrows() == ch_names.len(),
            "{} channel names for {} data rows",
            ch_names.len(),
            data.nrows()
        );
        ensure!(sfreq > 0.0 && sfreq.is_finite(), "invalid sample rate {sfreq}");
        Ok(Self { sfreq, ch_names, data, montage: None })
    }

    pub fn n_channels(&self) -> usize {
        self.data.nrows()
    }

    pub fn n_times(&self) -> usize {
        self.data.ncols()
    }

    pub fn duration_secs(&self) -> f64 {
        self.n_times() as f64 / self.sfreq as f64
    }

    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.ch_names.iter().position(|n| n == name)
    }

    /// Keep only `names`, in the order given.
    pub fn pick(&self, names: &[String]) -> SegResult<Self> {
        let idx = names
            .iter()
            .map(|n| self.channel_index(n).ok_or_else(|| SegmentError::UnknownChannel { name: n.clone() }))
            .collect::<SegResult<Vec<_>>>()?;
        let montage = self.montage.as_ref().map(|m| Montage {
            ch_names: names.to_vec(),
            positions: m.positions.select(Axis(0), &idx),
        });
        Ok(Self {
            sfreq: self.sfreq,
            ch_names: names.to_vec(),
            data: self.data.select(Axis(0), &idx),
            montage,
        })
    }

    /// Replace generic input names with `subject`'s standard names.
    ///
    /// Any attached montage no longer matches and is dropped.
    pub fn rename_channels(&mut self, subject: Subject) {
        self.ch_names = channels::rename(&self.ch_names, subject);
        self.montage = None;
    }

    /// Attach idealised 10-10 positions for the current channel names.
    pub fn set_standard_montage(&mut self) -> SegResult<()> {
        self.montage = Some(Montage::standard(&self.ch_names)?);
        Ok(())
    }

    /// Resample, band-pass and notch-filter every channel.
    ///
    /// Steps are skipped when they cannot apply: no resampling at the target
    /// rate, and notches within 1 Hz of Nyquist or above are ignored.
    pub fn preprocess(mut self, cfg: &PreprocessConfig) -> Result<Self> {
        if (self.sfreq - cfg.target_sfreq).abs() > 1e-3 {
            info!("resampling {} Hz → {} Hz", self.sfreq, cfg.target_sfreq);
            self.data = resample(&self.data, self.sfreq, cfg.target_sfreq)?;
            self.sfreq = cfg.target_sfreq;
        }
        ensure!(
            cfg.l_freq > 0.0 && cfg.h_freq > cfg.l_freq && cfg.h_freq < self.sfreq / 2.0,
            "band-pass {}–{} Hz is invalid at {} Hz",
            cfg.l_freq,
            cfg.h_freq,
            self.sfreq
        );

        let h = design_bandpass(cfg.l_freq, cfg.h_freq, self.sfreq);
        apply_fir_zero_phase(&mut self.data, &h)?;

        for &f in cfg.notch_freqs.iter().filter(|&&f| f < self.sfreq / 2.0 - 1.0) {
            let h = design_notch(f, self.sfreq);
            apply_fir_zero_phase(&mut self.data, &h)?;
        }
        Ok(self)
    }
}
