//! Spatial layout: channel name → sensor position in head coordinates.
//!
//! Positions come from an idealised spherical 10-10 system (radius 95 mm,
//! `x` right, `y` nose, `z` vertex).  Each row of the 10-10 grid is the great
//! circle from its midline electrode to its electrode on the 10 % ring
//! (inclination 72° from the vertex); odd numbers lie on the left, even on
//! the right, and `n` selects fraction `ceil(n/2)/4` of that arc (the `Fp` and
//! `O` rows sit on the ring already, so `Fp1`/`O2` are their only steps).  `T7`/`T8`,
//! `TP7`/`TP8` and `P7`/`P8` style names are the ring ends of their rows.
use std::f64::consts::PI;

use ndarray::Array2;

use crate::error::{SegResult, SegmentError};

/// Head radius in metres.
pub const HEAD_RADIUS: f64 = 0.095;

/// Inclination of the 10 % ring, degrees from the vertex.
const RING_DEG: f64 = 72.0;

/// Row prefix, midline inclination (negative = posterior), left ring
/// azimuth, steps from midline to ring.
const ROWS: [(&str, f64, f64, u32); 9] = [
    ("Fp", 72.0, 108.0, 1),
    ("AF", 54.0, 126.0, 4),
    ("F", 36.0, 144.0, 4),
    ("FC", 18.0, 162.0, 4),
    ("C", 0.0, 180.0, 4),
    ("CP", -18.0, 198.0, 4),
    ("P", -36.0, 216.0, 4),
    ("PO", -54.0, 234.0, 4),
    ("O", -72.0, 252.0, 1),
];

/// Temporal aliases for the ring ends of the central rows.
const TEMPORAL: [(&str, &str); 3] = [("FT", "FC"), ("T", "C"), ("TP", "CP")];

fn unit(inclination_deg: f64, azimuth_deg: f64) -> [f64; 3] {
    let (t, p) = (inclination_deg * PI / 180.0, azimuth_deg * PI / 180.0);
    [t.sin() * p.cos(), t.sin() * p.sin(), t.cos()]
}

fn slerp(a: [f64; 3], b: [f64; 3], frac: f64) -> [f64; 3] {
    let dot = (a[0] * b[0] + a[1] * b[1] + a[2] * b[2]).clamp(-1.0, 1.0);
    let omega = dot.acos();
    if omega.abs() < 1e-12 {
        return a;
    }
    let (wa, wb) = (((1.0 - frac) * omega).sin() / omega.sin(), (frac * omega).sin() / omega.sin());
    [wa * a[0] + wb * b[0], wa * a[1] + wb * b[1], wa * a[2] + wb * b[2]]
}

/// Split `"FC3"` into `("FC", Some(3))`, `"Cz"` into `("C", None)`.
fn parse_name(name: &str) -> Option<(&str, Option<u32>)> {
    let split = name.find(|c: char| c.is_ascii_digit() || c == 'z' || c == 'Z')?;
    let (prefix, rest) = name.split_at(split);
    if rest.eq_ignore_ascii_case("z") {
        return Some((prefix, None));
    }
    rest.parse().ok().filter(|&n| n > 0).map(|n| (prefix, Some(n)))
}

/// Position of a 10-10 electrode in metres, or `None` if the name is not on the grid.
pub fn standard_position(name: &str) -> Option<[f32; 3]> {
    let (mut prefix, number) = parse_name(name)?;
    let mut temporal = false;
    if let Some(&(_, row)) = TEMPORAL.iter().find(|(alias, _)| alias.eq_ignore_ascii_case(prefix)) {
        prefix = row;
        temporal = true;
    }
    let &(_, midline, left_az, steps) = ROWS.iter().find(|(p, ..)| p.eq_ignore_ascii_case(prefix))?;

    let mid = if midline >= 0.0 { unit(midline, 90.0) } else { unit(-midline, 270.0) };
    let pos = match number {
        None if temporal => return None,
        None => mid,
        Some(n) => {
            let step = n.div_ceil(2);
            // Temporal names exist only on the ring; one step past it (F9/F10) is the limit.
            if (temporal && step != steps) || step > steps + steps / 4 {
                return None;
            }
            let az = if n % 2 == 1 { left_az } else { 180.0 - left_az };
            slerp(mid, unit(RING_DEG, az), step as f64 / steps as f64)
        }
    };
    Some(pos.map(|v| (v * HEAD_RADIUS) as f32))
}

/// Ordered channel → position table attached to a signal or dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Montage {
    pub ch_names: Vec<String>,
    /// `[C, 3]` positions in metres, row order of `ch_names`.
    pub positions: Array2<f32>,
}

impl Montage {
    /// Standard positions for `ch_names`; any name off the grid is an error.
    pub fn standard(ch_names: &[String]) -> SegResult<Self> {
        let mut positions = Array2::<f32>::zeros((ch_names.len(), 3));
        for (i, name) in ch_names.iter().enumerate() {
            let p = standard_position(name)
                .ok_or_else(|| SegmentError::UnknownChannel { name: name.clone() })?;
            positions.row_mut(i).assign(&ndarray::ArrayView1::from(&p));
        }
        Ok(Self { ch_names: ch_names.to_vec(), positions })
    }

    /// Position of one channel.
    pub fn position(&self, name: &str) -> Option<[f32; 3]> {
        let i = self.ch_names.iter().position(|n| n == name)?;
        let r = self.positions.row(i);
        Some([r[0], r[1], r[2]])
    }

    /// Same channels at the same positions, compared per channel name.
    pub fn is_compatible(&self, other: &Montage) -> bool {
        self.ch_names.len() == other.ch_names.len()
            && self.ch_names.iter().all(|n| match (self.position(n), other.position(n)) {
                (Some(a), Some(b)) => a.iter().zip(b.iter()).all(|(x, y)| (x - y).abs() <= 1e-6),
                _ => false,
            })
    }
}
