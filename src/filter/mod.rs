//! FIR filter design and application.
//!
//! - [`design`]: Hamming-windowed sinc band-pass and notch kernels with MNE's
//!   automatic transition bandwidths.
//! - [`apply`]: overlap-add zero-phase convolution, planned once per signal
//!   length and shared across channels.

pub mod apply;
pub mod design;

pub use apply::{apply_fir_zero_phase, filter_1d, OverlapAdd};
pub use design::{
    auto_filter_length, design_bandpass, design_notch, firwin, gain_at, hamming,
    high_trans_bandwidth, low_trans_bandwidth,
};
