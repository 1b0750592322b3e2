//! FIR design: Hamming-windowed sinc band-pass and notch filters.
//!
//! Transition bandwidths follow MNE's `filter_length='auto'` rules:
//!   • low edge   `min(max(0.25·l_freq, 2), l_freq)`
//!   • high edge  `min(max(0.25·h_freq, 2), sfreq/2 − h_freq)`
//!   • length     `ceil(3.3 / min(transition) · sfreq)`, rounded up to odd
//!
//! Cutoffs passed to `firwin` sit at the middle of each transition band.
use std::f64::consts::PI;

/// Width of the band removed around each notch frequency, as a fraction of it.
pub const NOTCH_WIDTH_FRACTION: f32 = 1.0 / 200.0;

/// Transition bandwidth shared by both flanks of a notch (Hz).
pub const NOTCH_TRANS_BANDWIDTH: f32 = 1.0;

/// Transition bandwidth of the low (high-pass) edge.
pub fn low_trans_bandwidth(l_freq: f32) -> f32 {
    (0.25 * l_freq).max(2.0).min(l_freq)
}

/// Transition bandwidth of the high (low-pass) edge.
pub fn high_trans_bandwidth(h_freq: f32, sfreq: f32) -> f32 {
    (0.25 * h_freq).max(2.0).min(sfreq / 2.0 - h_freq)
}

/// Odd tap count for the narrowest transition band.
pub fn auto_filter_length(trans_bw: f32, sfreq: f32) -> usize {
    let n = (3.3 / trans_bw as f64 * sfreq as f64).ceil() as usize;
    n | 1
}

/// Zero-phase band-pass between `l_freq` and `h_freq`.
///
/// Built as the difference of two unit-gain low-pass kernels, so the DC gain
/// is exactly zero and the pass-band gain is one.
pub fn design_bandpass(l_freq: f32, h_freq: f32, sfreq: f32) -> Vec<f32> {
    let l_tb = low_trans_bandwidth(l_freq);
    let h_tb = high_trans_bandwidth(h_freq, sfreq);
    let n = auto_filter_length(l_tb.min(h_tb), sfreq);

    let lo = firwin(n, l_freq - l_tb / 2.0, sfreq);
    let hi = firwin(n, h_freq + h_tb / 2.0, sfreq);
    hi.iter().zip(lo.iter()).map(|(h, l)| (h - l) as f32).collect()
}

/// Zero-phase band-stop centred on `freq`.
///
/// The stop band is `freq ± freq/400`; each flank gets half of
/// [`NOTCH_TRANS_BANDWIDTH`].
pub fn design_notch(freq: f32, sfreq: f32) -> Vec<f32> {
    let half_width = freq * NOTCH_WIDTH_FRACTION / 2.0;
    let flank = NOTCH_TRANS_BANDWIDTH / 2.0;
    let n = auto_filter_length(flank, sfreq);

    let lo = firwin(n, freq - half_width - flank / 2.0, sfreq);
    let hi = firwin(n, freq + half_width + flank / 2.0, sfreq);
    let mut h: Vec<f64> = lo.iter().zip(hi.iter()).map(|(l, h)| l - h).collect();
    h[n / 2] += 1.0;
    h.into_iter().map(|v| v as f32).collect()
}

/// Unit-DC-gain low-pass of `n` taps (odd) with its −6 dB point at `cutoff_hz`.
pub fn firwin(n: usize, cutoff_hz: f32, sfreq: f32) -> Vec<f64> {
    debug_assert!(n % 2 == 1, "firwin needs odd N for a linear-phase filter");
    let alpha = (n - 1) as f64 / 2.0;
    let fc = cutoff_hz as f64 / (sfreq as f64 / 2.0);
    let win = hamming(n);

    let mut h: Vec<f64> = win
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let x = i as f64 - alpha;
            let sinc = if x == 0.0 { fc } else { (PI * fc * x).sin() / (PI * x) };
            sinc * w
        })
        .collect();

    let s: f64 = h.iter().sum();
    h.iter_mut().for_each(|v| *v /= s);
    h
}

/// Hamming window of length `n`.
pub fn hamming(n: usize) -> Vec<f64> {
    if n < 2 {
        return vec![1.0; n];
    }
    (0..n)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f64 / (n - 1) as f64).cos())
        .collect()
}

/// Magnitude of the frequency response of `h` at `freq` (Hz).
pub fn gain_at(h: &[f32], freq: f32, sfreq: f32) -> f32 {
    let w = 2.0 * PI * freq as f64 / sfreq as f64;
    let (re, im) = h.iter().enumerate().fold((0.0_f64, 0.0_f64), |(re, im), (k, &v)| {
        let ph = w * k as f64;
        (re + v as f64 * ph.cos(), im - v as f64 * ph.sin())
    });
    (re * re + im * im).sqrt() as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bandpass_length_at_250hz() {
        // 1 Hz low edge → 1 Hz transition → ceil(3.3 · 250) = 825 taps.
        let h = design_bandpass(1.0, 40.0, 250.0);
        assert_eq!(h.len(), 825);
    }

    #[test]
    fn bandpass_is_symmetric_with_zero_dc() {
        let h = design_bandpass(1.0, 40.0, 250.0);
        let n = h.len();
        for i in 0..n / 2 {
            approx::assert_abs_diff_eq!(h[i], h[n - 1 - i], epsilon = 1e-7_f32);
        }
        let s: f32 = h.iter().sum();
        assert!(s.abs() < 1e-5, "band-pass DC gain = {s}");
    }

    #[test]
    fn bandpass_response() {
        let h = design_bandpass(1.0, 40.0, 250.0);
        approx::assert_abs_diff_eq!(gain_at(&h, 10.0, 250.0), 1.0, epsilon = 1e-2);
        assert!(gain_at(&h, 0.0, 250.0) < 1e-3);
        assert!(gain_at(&h, 70.0, 250.0) < 1e-2);
    }

    #[test]
    fn notch_removes_mains_and_keeps_neighbours() {
        let h = design_notch(50.0, 250.0);
        assert_eq!(h.len() % 2, 1);
        assert!(gain_at(&h, 50.0, 250.0) < 0.05, "50 Hz gain too high");
        approx::assert_abs_diff_eq!(gain_at(&h, 10.0, 250.0), 1.0, epsilon = 1e-2);
        approx::assert_abs_diff_eq!(gain_at(&h, 0.0, 250.0), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn lowpass_dc_gain_unity() {
        let h = firwin(101, 10.0, 256.0);
        let dc: f64 = h.iter().sum();
        approx::assert_abs_diff_eq!(dc, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn transition_rules() {
        approx::assert_abs_diff_eq!(low_trans_bandwidth(1.0), 1.0);
        approx::assert_abs_diff_eq!(low_trans_bandwidth(16.0), 4.0);
        approx::assert_abs_diff_eq!(high_trans_bandwidth(40.0, 250.0), 10.0);
        approx::assert_abs_diff_eq!(high_trans_bandwidth(120.0, 250.0), 5.0);
    }
}
