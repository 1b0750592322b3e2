//! FFT resampler following MNE's `resample(..., method='fft', npad='auto')`.
//!
//! Per channel:
//!   1. Pad with reflect-limited samples up to the next power of two.
//!   2. Forward FFT of the padded signal; keep the half spectrum.
//!   3. Nyquist bin of the shorter length: ×2 when downsampling, ×0.5 when
//!      upsampling.
//!   4. Scale by `new_len_padded / old_len_padded`.
//!   5. Inverse FFT at the new padded length (spectrum truncated or
//!      zero-extended, Hermitian-completed).
//!   6. Strip the resampled padding.
use std::sync::Arc;

use anyhow::{ensure, Result};
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::filter::apply::reflect_limited_pad;

/// Padding MNE picks for `npad='auto'`:
///
/// ```text
/// min_add = min(n // 8, 100) * 2
/// total   = 2^ceil(log2(n + min_add)) - n
/// npads   = [total // 2, total - total // 2]
/// ```
pub fn auto_npad(n: usize) -> (usize, usize) {
    let min_add = (n / 8).min(100) * 2;
    let next_pow2 = (n + min_add).next_power_of_two();
    let total = next_pow2 - n;
    (total / 2, total - total / 2)
}

/// Output length for `n` input samples: `round(n · dst / src)`.
pub fn final_length(n: usize, src_sfreq: f32, dst_sfreq: f32) -> usize {
    (n as f64 * dst_sfreq as f64 / src_sfreq as f64).round() as usize
}

/// A planned resampling of `n_in`-sample signals by a fixed ratio.
pub struct Resampler {
    ratio: f64,
    n_in: usize,
    npad: (usize, usize),
    old_len: usize,
    new_len: usize,
    fwd: Arc<dyn Fft<f64>>,
    inv: Arc<dyn Fft<f64>>,
}

impl Resampler {
    pub fn new(n_in: usize, src_sfreq: f32, dst_sfreq: f32) -> Result<Self> {
        ensure!(n_in > 0, "cannot resample an empty signal");
        ensure!(src_sfreq > 0.0 && dst_sfreq > 0.0, "sample rates must be positive");
        let ratio = dst_sfreq as f64 / src_sfreq as f64;
        let npad = auto_npad(n_in);
        let old_len = n_in + npad.0 + npad.1;
        let new_len = (ratio * old_len as f64).round() as usize;
        ensure!(new_len > 0, "resampling {n_in} samples by {ratio} leaves nothing");

        let mut planner = FftPlanner::<f64>::new();
        let fwd = planner.plan_fft_forward(old_len);
        let inv = planner.plan_fft_inverse(new_len);
        Ok(Self { ratio, n_in, npad, old_len, new_len, fwd, inv })
    }

    /// Samples produced per channel.
    pub fn output_len(&self) -> usize {
        (self.ratio * self.n_in as f64).round() as usize
    }

    pub fn process(&self, x: &[f32]) -> Result<Vec<f32>> {
        ensure!(x.len() == self.n_in, "planned for {} samples, got {}", self.n_in, x.len());
        let (old_len, new_len) = (self.old_len, self.new_len);

        let mut spec: Vec<Complex<f64>> = reflect_limited_pad(x, self.npad.0, self.npad.1)
            .into_iter()
            .map(|v| Complex::new(v as f64, 0.0))
            .collect();
        self.fwd.process(&mut spec);
        spec.truncate(old_len / 2 + 1);

        let shorter = new_len < old_len;
        let use_len = if shorter { new_len } else { old_len };
        if use_len % 2 == 0 {
            if let Some(bin) = spec.get_mut(use_len / 2) {
                *bin *= if shorter { 2.0 } else { 0.5 };
            }
        }
        let scale = new_len as f64 / old_len as f64;

        let half = new_len / 2 + 1;
        let mut buf = vec![Complex::<f64>::default(); new_len];
        for (b, s) in buf.iter_mut().zip(spec.iter().take(half)) {
            *b = *s * scale;
        }
        for i in 1..half {
            let mirror = new_len - i;
            if mirror >= half {
                buf[mirror] = buf[i].conj();
            }
        }
        self.inv.process(&mut buf);

        let inv_scale = 1.0 / new_len as f64;
        let out_len = self.output_len();
        let strip_l = (self.ratio * self.npad.0 as f64).round() as usize;
        let mut out: Vec<f32> = buf
            .iter()
            .skip(strip_l)
            .take(out_len)
            .map(|c| (c.re * inv_scale) as f32)
            .collect();
        out.resize(out_len, 0.0);
        Ok(out)
    }
}

/// Resample every channel of `data` ([C, T]) from `src_sfreq` to `dst_sfreq`.
pub fn resample(data: &Array2<f32>, src_sfreq: f32, dst_sfreq: f32) -> Result<Array2<f32>> {
    if (src_sfreq - dst_sfreq).abs() < 1e-6 {
        return Ok(data.clone());
    }
    let plan = Resampler::new(data.ncols(), src_sfreq, dst_sfreq)?;
    let rows: Vec<Vec<f32>> = data.outer_iter().map(|r| r.to_vec()).collect();
    let resampled = rows
        .par_iter()
        .map(|r| plan.process(r))
        .collect::<Result<Vec<_>>>()?;

    let mut out = Array2::<f32>::zeros((data.nrows(), plan.output_len()));
    for (mut row, r) in out.outer_iter_mut().zip(resampled) {
        row.assign(&ArrayView1::from(&r));
    }
    Ok(out)
}
