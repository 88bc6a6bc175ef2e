//! Automatic global thresholds on a 256-bin intensity histogram.

use rayon::prelude::*;

use crate::config::ThresholdMethod;
use crate::volume::{Mask, Volume};

pub const HISTOGRAM_BINS: usize = 256;

/// Relative spread below which data counts as flat (filter round-off).
const FLAT_TOLERANCE: f32 = 1e-4;

/// 256-bin histogram spanning the data range `[min, max]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    pub counts: [u64; HISTOGRAM_BINS],
    pub min: f32,
    pub max: f32,
}

impl Histogram {
    /// `None` when the data has no spread (empty, constant, or round-off only).
    pub fn from_values(values: &[f32]) -> Option<Self> {
        let (min, max) = values
            .iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        let scale = 1.0 + min.abs().max(max.abs());
        if max <= min || max - min <= FLAT_TOLERANCE * scale {
            return None;
        }

        let mut counts = [0u64; HISTOGRAM_BINS];
        for &v in values.iter().filter(|v| v.is_finite()) {
            counts[bin_of(v, min, max)] += 1;
        }
        Some(Self { counts, min, max })
    }

    #[inline]
    pub fn bin(&self, value: f32) -> usize {
        bin_of(value, self.min, self.max)
    }

    /// Lower edge of `bin` in data units.
    pub fn bin_value(&self, bin: usize) -> f32 {
        self.min + (self.max - self.min) * bin as f32 / HISTOGRAM_BINS as f32
    }
}

#[inline]
fn bin_of(value: f32, min: f32, max: f32) -> usize {
    let t = (value - min) / (max - min) * HISTOGRAM_BINS as f32;
    (t.max(0.0) as usize).min(HISTOGRAM_BINS - 1)
}

/// Binarizes `volume`: foreground is every voxel whose bin lies above the
/// computed split bin. A volume without intensity spread has no foreground.
pub fn threshold_volume(volume: &Volume, method: ThresholdMethod) -> Mask {
    let Some(hist) = Histogram::from_values(volume.voxels()) else {
        tracing::debug!("Flat volume, nothing above threshold");
        return volume.map(|_| false);
    };

    let split = match method {
        ThresholdMethod::Triangle => triangle_split(&hist.counts),
        ThresholdMethod::Otsu => otsu_split(&hist.counts),
    };
    tracing::debug!(
        ?method,
        split_bin = split,
        value = hist.bin_value((split + 1).max(0) as usize),
        "Threshold"
    );

    let fg: Vec<bool> = volume
        .voxels()
        .par_iter()
        .map(|&v| v.is_finite() && hist.bin(v) as i64 > split)
        .collect();
    volume.with_voxels(fg)
}

/// Triangle method (Zack et al.).
///
/// A line joins the histogram peak with the end of the longer tail; the split
/// is the bin farthest below that line, moved one bin toward the peak. When
/// the longer tail is on the bright side the histogram is mirrored, searched,
/// and the result mirrored back. Returns a bin index, or -1 when every bin
/// is foreground.
pub fn triangle_split(counts: &[u64; HISTOGRAM_BINS]) -> i64 {
    let len = HISTOGRAM_BINS;
    let mut data: Vec<f64> = counts.iter().map(|&c| c as f64).collect();

    let mut min = data.iter().position(|&c| c > 0.0).unwrap_or(0);
    if min > 0 {
        min -= 1;
    }
    let mut min2 = (1..len).rev().find(|&i| data[i] > 0.0).unwrap_or(0);
    if min2 < len - 1 {
        min2 += 1;
    }
    let mut peak = 0;
    let mut peak_count = 0.0;
    for (i, &c) in data.iter().enumerate() {
        if c > peak_count {
            peak = i;
            peak_count = c;
        }
    }

    let inverted = (peak as i64 - min as i64) < (min2 as i64 - peak as i64);
    if inverted {
        data.reverse();
        min = len - 1 - min2;
        peak = len - 1 - peak;
    }

    if min == peak {
        return min as i64;
    }

    let mut nx = data[peak];
    let mut ny = min as f64 - peak as f64;
    let norm = (nx * nx + ny * ny).sqrt();
    nx /= norm;
    ny /= norm;
    let d = nx * min as f64 + ny * data[min];

    let mut split = min as i64;
    let mut split_distance = 0.0;
    for i in min + 1..=peak {
        let distance = nx * i as f64 + ny * data[i] - d;
        if distance > split_distance {
            split = i as i64;
            split_distance = distance;
        }
    }
    split -= 1;

    if inverted {
        len as i64 - 1 - split
    } else {
        split
    }
}

/// Otsu's method: the split maximizing between-class variance.
pub fn otsu_split(counts: &[u64; HISTOGRAM_BINS]) -> i64 {
    let total: f64 = counts.iter().map(|&c| c as f64).sum();
    if total == 0.0 {
        return 0;
    }
    let sum_all: f64 = counts
        .iter()
        .enumerate()
        .map(|(i, &c)| i as f64 * c as f64)
        .sum();

    let mut weight_bg = 0.0;
    let mut sum_bg = 0.0;
    let mut best = 0i64;
    let mut best_variance = -1.0;

    for (i, &c) in counts.iter().enumerate() {
        weight_bg += c as f64;
        if weight_bg == 0.0 {
            continue;
        }
        let weight_fg = total - weight_bg;
        if weight_fg == 0.0 {
            break;
        }
        sum_bg += i as f64 * c as f64;
        let mean_bg = sum_bg / weight_bg;
        let mean_fg = (sum_all - sum_bg) / weight_fg;
        let variance = weight_bg * weight_fg * (mean_bg - mean_fg).powi(2);
        if variance > best_variance {
            best_variance = variance;
            best = i as i64;
        }
    }
    best
}
