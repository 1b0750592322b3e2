//! Overlap-add zero-phase FIR convolution.
//!
//! Zero phase comes from shifting the output left by `(N-1)/2` samples, not
//! from forward-backward filtering.  Edges are padded with `N-1`
//! reflect-limited samples on each side to tame the transient.
use std::sync::Arc;

use anyhow::{ensure, Result};
use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};

/// A planned FIR convolution for signals of one fixed length.
///
/// Planning (block size, kernel spectrum, FFT plans) is done once and shared
/// by every channel.
pub struct OverlapAdd {
    n_h: usize,
    n_x: usize,
    n_fft: usize,
    h_fft: Vec<Complex<f32>>,
    fwd: Arc<dyn Fft<f32>>,
    inv: Arc<dyn Fft<f32>>,
}

impl OverlapAdd {
    /// Plan a convolution of `h` (odd length) with signals of `n_x` samples.
    pub fn new(h: &[f32], n_x: usize) -> Result<Self> {
        ensure!(h.len() % 2 == 1, "FIR kernel must have odd length, got {}", h.len());
        let n_h = h.len();
        let n_fft = choose_fft_len(n_h, n_x + 2 * (n_h - 1));

        let mut planner = FftPlanner::<f32>::new();
        let fwd = planner.plan_fft_forward(n_fft);
        let inv = planner.plan_fft_inverse(n_fft);

        let mut h_fft = zero_padded(h, n_fft);
        fwd.process(&mut h_fft);

        Ok(Self { n_h, n_x, n_fft, h_fft, fwd, inv })
    }

    /// Filter one signal; output has the same length.
    pub fn filter(&self, x: &[f32]) -> Result<Vec<f32>> {
        ensure!(x.len() == self.n_x, "planned for {} samples, got {}", self.n_x, x.len());
        if x.is_empty() {
            return Ok(vec![]);
        }

        let shift = (self.n_h - 1) / 2;
        let n_edge = self.n_h - 1;
        let x_ext = reflect_limited_pad(x, n_edge, n_edge);
        let n_ext = x_ext.len();

        let n_seg = self.n_fft - self.n_h + 1;
        let inv_scale = 1.0 / self.n_fft as f32;
        let mut y = vec![0.0_f32; n_ext];

        for start in (0..n_ext).step_by(n_seg) {
            let stop = (start + n_seg).min(n_ext);
            let mut buf = zero_padded(&x_ext[start..stop], self.n_fft);
            self.fwd.process(&mut buf);
            buf.iter_mut().zip(&self.h_fft).for_each(|(b, h)| *b *= *h);
            self.inv.process(&mut buf);

            // Block output starts at `start`; the zero-phase shift moves it left.
            let out_start = start.saturating_sub(shift);
            let skip = shift.saturating_sub(start);
            for (o, b) in y[out_start..].iter_mut().zip(&buf[skip..]) {
                *o += b.re * inv_scale;
            }
        }

        Ok(y[n_edge..n_edge + self.n_x].to_vec())
    }
}

/// Apply a zero-phase FIR filter to every channel of `data` ([C, T]) in place.
pub fn apply_fir_zero_phase(data: &mut Array2<f32>, h: &[f32]) -> Result<()> {
    let plan = OverlapAdd::new(h, data.ncols())?;
    let rows: Vec<Vec<f32>> = data.outer_iter().map(|row| row.to_vec()).collect();
    let filtered = rows
        .par_iter()
        .map(|row| plan.filter(row))
        .collect::<Result<Vec<_>>>()?;
    for (mut row, f) in data.outer_iter_mut().zip(filtered) {
        row.assign(&ArrayView1::from(&f));
    }
    Ok(())
}

/// Filter a single signal with a freshly planned convolution.
pub fn filter_1d(x: &[f32], h: &[f32]) -> Result<Vec<f32>> {
    OverlapAdd::new(h, x.len())?.filter(x)
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn zero_padded(x: &[f32], n: usize) -> Vec<Complex<f32>> {
    let mut buf = vec![Complex::default(); n];
    for (b, &v) in buf.iter_mut().zip(x) {
        b.re = v;
    }
    buf
}

/// Odd reflection about the end samples, zero-filled past `len - 1`.
///
/// Left:  `2·x[0] − x[i]`   for i = n_l..1
/// Right: `2·x[-1] − x[-1-i]` for i = 1..n_r
pub(crate) fn reflect_limited_pad(x: &[f32], n_l: usize, n_r: usize) -> Vec<f32> {
    let n = x.len();
    if n == 0 {
        return vec![0.0; n_l + n_r];
    }
    let (first, last) = (x[0], x[n - 1]);
    let (refl_l, refl_r) = (n_l.min(n - 1), n_r.min(n - 1));

    let mut out = Vec::with_capacity(n_l + n + n_r);
    out.extend(std::iter::repeat(0.0).take(n_l - refl_l));
    out.extend((1..=refl_l).rev().map(|i| 2.0 * first - x[i]));
    out.extend_from_slice(x);
    out.extend((1..=refl_r).map(|i| 2.0 * last - x[n - 1 - i]));
    out.extend(std::iter::repeat(0.0).take(n_r - refl_r));
    out
}

/// Power-of-two block size minimising
/// `ceil(n_x / (N − n_h + 1)) · N · (log2 N + 1) + 4e-5 · N · n_x`.
fn choose_fft_len(n_h: usize, n_x: usize) -> usize {
    let min_pow = ((2 * n_h - 1) as f64).log2().ceil() as u32;
    let max_pow = ((n_x as f64).log2().ceil() as u32 + 1).max(min_pow);

    (min_pow..=max_pow)
        .map(|pow| {
            let n = 1_usize << pow;
            let n_seg = (n - n_h + 1) as f64;
            let cost = (n_x as f64 / n_seg).ceil() * n as f64 * (pow as f64 + 1.0)
                + 4e-5 * n as f64 * n_x as f64;
            (n, cost)
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map_or(1 << max_pow, |(n, _)| n)
}
