//! Radial intersection (Sholl) profiles around the soma point.
//!
//! Radii start at `start_radius_px` pixel widths and grow by `step_px` pixel
//! widths until the first radius that reaches the maximum radius. Each radius
//! is counted independently on the rayon pool; the output keeps radius order.

use std::f64::consts::TAU;

use hashbrown::HashSet;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{ShollConfig, ShollMode};
use crate::labeling::NEIGHBORS_26;
use crate::roi::PointRoi;
use crate::volume::{Calibration, Dims, Mask};

/// Intersections at one radius.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RadialSample {
    /// Radius in microns.
    pub radius: f64,
    pub intersections: usize,
}

/// Radius-ascending intersection counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadialProfile {
    pub samples: Vec<RadialSample>,
    /// Radius the sampling had to reach, in microns.
    pub max_radius: f64,
}

impl RadialProfile {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn radii(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.radius)
    }

    /// Largest intersection count and the first radius where it occurs.
    pub fn peak(&self) -> Option<RadialSample> {
        self.samples
            .iter()
            .copied()
            .reduce(|best, s| if s.intersections > best.intersections { s } else { best })
    }
}

/// Farthest-corner radius in microns for a center at `(x, y)` on slice `z`.
///
/// Each in-plane axis uses the distance to the far image edge: `x - width`
/// when the center lies in the first half, `x` otherwise.
pub fn max_radius(dims: Dims, calibration: Calibration, x: f64, y: f64, z: usize) -> f64 {
    let (w, h) = (dims.width as i64, dims.height as i64);
    let (xi, yi) = (x.floor() as i64, y.floor() as i64);
    let dx = if xi <= w / 2 { xi - w } else { xi };
    let dy = if yi <= h / 2 { yi - h } else { yi };
    let dz = z as i64;
    ((dx * dx + dy * dy + dz * dz) as f64).sqrt() * calibration.pixel_width
}

/// Radii from `start` in steps of `step` until the first one `>= max`.
pub fn radii(start: f64, step: f64, max: f64) -> Vec<f64> {
    assert!(step > 0.0, "radius step must be positive, got {}", step);
    let mut out = vec![start];
    let mut k = 1usize;
    while out[out.len() - 1] < max {
        out.push(start + k as f64 * step);
        k += 1;
    }
    out
}

#[derive(Debug, Clone, Copy)]
pub struct RadialProfiler {
    config: ShollConfig,
}

impl RadialProfiler {
    pub fn new(config: ShollConfig) -> Self {
        config.validate();
        Self { config }
    }

    /// Profiles `mask` around `center`, given in the mask's pixel coordinates.
    ///
    /// # Panics
    ///
    /// Panics if `center.z` is not a slice of `mask`.
    pub fn profile(&self, mask: &Mask, center: &PointRoi) -> RadialProfile {
        let dims = mask.dims();
        assert!(
            center.z < dims.depth,
            "center slice {} outside volume depth {}",
            center.z,
            dims.depth
        );
        let calibration = mask.calibration();
        let pw = calibration.pixel_width;

        let max = max_radius(dims, calibration, center.x, center.y, center.z);
        let radii = radii(self.config.start_radius_px * pw, self.config.step_px * pw, max);

        let samples: Vec<RadialSample> = radii
            .par_iter()
            .map(|&radius| RadialSample {
                radius,
                intersections: match self.config.mode {
                    ShollMode::Planar => planar_crossings(mask, center, radius / pw),
                    ShollMode::Volumetric => shell_clusters(mask, center, radius),
                },
            })
            .collect();

        tracing::debug!(
            radii = samples.len(),
            max_radius = max,
            mode = ?self.config.mode,
            "Radial profile"
        );

        RadialProfile {
            samples,
            max_radius: max,
        }
    }
}

/// 8-connected clusters of foreground pixels on the digital circle of
/// `radius_px` on the center's slice.
fn planar_crossings(mask: &Mask, center: &PointRoi, radius_px: f64) -> usize {
    let dims = mask.dims();
    let hits: HashSet<(i64, i64)> = digital_circle(center.x, center.y, radius_px)
        .into_iter()
        .filter(|&(x, y)| {
            x >= 0
                && y >= 0
                && (x as usize) < dims.width
                && (y as usize) < dims.height
                && mask[(x as usize, y as usize, center.z)]
        })
        .collect();

    let mut clusters = 0;
    let mut seen: HashSet<(i64, i64)> = HashSet::with_capacity(hits.len());
    let mut stack = Vec::new();
    let mut seeds: Vec<(i64, i64)> = hits.iter().copied().collect();
    seeds.sort_unstable();
    for seed in seeds {
        if !seen.insert(seed) {
            continue;
        }
        clusters += 1;
        stack.push(seed);
        while let Some((x, y)) = stack.pop() {
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let n = (x + dx, y + dy);
                    if hits.contains(&n) && seen.insert(n) {
                        stack.push(n);
                    }
                }
            }
        }
    }
    clusters
}

/// Closed 4-connected pixel ring approximating the circle. An 8-connected
/// curve leaving the disc has to share a pixel with it.
fn digital_circle(cx: f64, cy: f64, radius_px: f64) -> Vec<(i64, i64)> {
    // Arc step below one pixel: consecutive samples differ by at most one per axis.
    let n = ((8.0 * radius_px).ceil() as usize).max(8);
    let mut samples: Vec<(i64, i64)> = Vec::with_capacity(n);
    for k in 0..n {
        let theta = TAU * k as f64 / n as f64;
        let p = (
            (cx + radius_px * theta.cos()).round() as i64,
            (cy + radius_px * theta.sin()).round() as i64,
        );
        if samples.last() != Some(&p) {
            samples.push(p);
        }
    }
    if samples.len() > 1 && samples.first() == samples.last() {
        samples.pop();
    }

    let off_circle =
        |(x, y): (i64, i64)| ((x as f64 - cx).hypot(y as f64 - cy) - radius_px).abs();
    let mut ring = Vec::with_capacity(2 * samples.len());
    for (i, &a) in samples.iter().enumerate() {
        let b = samples[(i + 1) % samples.len()];
        ring.push(a);
        if a.0 != b.0 && a.1 != b.1 {
            let (c1, c2) = ((b.0, a.1), (a.0, b.1));
            ring.push(if off_circle(c1) <= off_circle(c2) { c1 } else { c2 });
        }
    }
    ring
}

/// 26-connected clusters of foreground voxels in the spherical shell of
/// `radius` microns. The shell is one voxel diagonal thick so a 26-connected
/// path cannot step across it.
fn shell_clusters(mask: &Mask, center: &PointRoi, radius: f64) -> usize {
    let dims = mask.dims();
    let cal = mask.calibration();
    let half = 0.5
        * (cal.pixel_width * cal.pixel_width
            + cal.pixel_height * cal.pixel_height
            + cal.pixel_depth * cal.pixel_depth)
            .sqrt();

    let range = |c: f64, spacing: f64, len: usize| {
        let lo = ((c - (radius + half) / spacing).floor().max(0.0)) as usize;
        let hi = ((c + (radius + half) / spacing).ceil().max(0.0) as usize + 1).min(len);
        lo..hi
    };

    let mut shell: HashSet<usize> = HashSet::new();
    for z in range(center.z as f64, cal.pixel_depth, dims.depth) {
        for y in range(center.y, cal.pixel_height, dims.height) {
            for x in range(center.x, cal.pixel_width, dims.width) {
                if !mask[(x, y, z)] {
                    continue;
                }
                let dx = (x as f64 - center.x) * cal.pixel_width;
                let dy = (y as f64 - center.y) * cal.pixel_height;
                let dz = (z as f64 - center.z as f64) * cal.pixel_depth;
                let d = (dx * dx + dy * dy + dz * dz).sqrt();
                if (d - radius).abs() <= half {
                    shell.insert(dims.index(x, y, z));
                }
            }
        }
    }

    let mut clusters = 0;
    let mut seen: HashSet<usize> = HashSet::with_capacity(shell.len());
    let mut stack = Vec::new();
    let mut members: Vec<usize> = shell.iter().copied().collect();
    members.sort_unstable();
    for seed in members {
        if !seen.insert(seed) {
            continue;
        }
        clusters += 1;
        stack.push(seed);
        while let Some(cur) = stack.pop() {
            let p = dims.coords(cur);
            for offset in NEIGHBORS_26 {
                if let Some(n) = dims.offset_index(p, offset) {
                    if shell.contains(&n) && seen.insert(n) {
                        stack.push(n);
                    }
                }
            }
        }
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{draw_cross, draw_line_x, empty_mask};

    fn profiler(mode: ShollMode) -> RadialProfiler {
        RadialProfiler::new(ShollConfig {
            start_radius_px: 3.0,
            step_px: 2.0,
            mode,
        })
    }

    #[test]
    fn test_max_radius_formula() {
        let dims = Dims::new(100, 80, 10);
        let cal = Calibration::new(0.5, 1.0);
        let r = max_radius(dims, cal, 30.0, 50.0, 4);
        let expected = ((70.0f64 * 70.0) + (50.0 * 50.0) + 16.0).sqrt() * 0.5;
        assert!((r - expected).abs() < 1e-12);
    }

    #[test]
    fn test_radii_cover_max() {
        let r = radii(10.0, 5.0, 27.0);
        assert_eq!(r, vec![10.0, 15.0, 20.0, 25.0, 30.0]);
        assert_eq!(radii(10.0, 5.0, 25.0), vec![10.0, 15.0, 20.0, 25.0]);
        assert_eq!(radii(10.0, 5.0, 4.0), vec![10.0], "start alone when max is smaller");
    }

    #[test]
    fn test_radius_sequence_is_strictly_increasing() {
        let dims = Dims::new(40, 30, 5);
        let mask = empty_mask(dims);
        let center = PointRoi::new("soma", 12.0, 20.0, 2);
        let profile = profiler(ShollMode::Planar).profile(&mask, &center);

        let radii: Vec<f64> = profile.radii().collect();
        assert_eq!(radii[0], 3.0);
        assert!(radii.windows(2).all(|w| w[1] > w[0]));
        assert!(*radii.last().unwrap() >= profile.max_radius);
        assert!(radii[radii.len() - 2] < profile.max_radius);
        assert!(profile.samples.iter().all(|s| s.intersections == 0));
    }

    #[test]
    fn test_line_through_center_crosses_twice() {
        let dims = Dims::new(41, 41, 3);
        let mut mask = empty_mask(dims);
        draw_line_x(&mut mask, 0, 40, 20, 1);
        let center = PointRoi::new("soma", 20.0, 20.0, 1);
        let profile = profiler(ShollMode::Planar).profile(&mask, &center);

        for s in profile.samples.iter().filter(|s| s.radius < 20.0) {
            assert_eq!(s.intersections, 2, "radius {}", s.radius);
        }
    }

    #[test]
    fn test_line_ending_at_center_crosses_once() {
        let dims = Dims::new(41, 41, 3);
        let mut mask = empty_mask(dims);
        draw_line_x(&mut mask, 20, 40, 20, 1);
        let center = PointRoi::new("soma", 20.0, 20.0, 1);
        let profile = profiler(ShollMode::Planar).profile(&mask, &center);

        for s in profile.samples.iter().filter(|s| s.radius < 20.0) {
            assert_eq!(s.intersections, 1, "radius {}", s.radius);
        }
    }

    #[test]
    fn test_cross_crosses_four_times() {
        let dims = Dims::new(41, 41, 3);
        let mut mask = empty_mask(dims);
        draw_cross(&mut mask, 20, 20, 1, 15);
        let center = PointRoi::new("soma", 20.0, 20.0, 1);
        let profile = profiler(ShollMode::Planar).profile(&mask, &center);

        let inner: Vec<_> = profile.samples.iter().filter(|s| s.radius <= 13.0).collect();
        assert!(!inner.is_empty());
        assert!(inner.iter().all(|s| s.intersections == 4));
        assert_eq!(profile.peak().map(|s| s.intersections), Some(4));
    }

    #[test]
    fn test_other_slices_are_ignored_in_planar_mode() {
        let dims = Dims::new(41, 41, 3);
        let mut mask = empty_mask(dims);
        draw_line_x(&mut mask, 0, 40, 20, 2);
        let center = PointRoi::new("soma", 20.0, 20.0, 1);
        let profile = profiler(ShollMode::Planar).profile(&mask, &center);
        assert!(profile.samples.iter().all(|s| s.intersections == 0));
    }

    #[test]
    fn test_volumetric_line_through_center() {
        let dims = Dims::new(41, 21, 21);
        let mut mask = empty_mask(dims);
        draw_line_x(&mut mask, 0, 40, 10, 10);
        let center = PointRoi::new("soma", 20.0, 10.0, 10);
        let profile = profiler(ShollMode::Volumetric).profile(&mask, &center);

        for s in profile.samples.iter().filter(|s| s.radius < 19.0) {
            assert_eq!(s.intersections, 2, "radius {}", s.radius);
        }
    }

    #[test]
    fn test_diagonal_line_crosses_twice_at_every_radius() {
        let dims = Dims::new(61, 61, 1);
        let mut mask = empty_mask(dims);
        for x in 1..61 {
            mask[(x, x - 1, 0)] = true;
        }
        let center = PointRoi::new("soma", 30.0, 30.0, 0);
        let profiler = RadialProfiler::new(ShollConfig {
            start_radius_px: 3.0,
            step_px: 1.0,
            mode: ShollMode::Planar,
        });
        let profile = profiler.profile(&mask, &center);

        let missed: Vec<(f64, usize)> = profile
            .samples
            .iter()
            .filter(|s| s.radius < 28.0 && s.intersections != 2)
            .map(|s| (s.radius, s.intersections))
            .collect();
        assert!(missed.is_empty(), "wrong counts: {:?}", missed);
    }

    #[test]
    fn test_digital_circle_is_closed_and_4_connected() {
        for radius in [3.0, 7.5, 10.0, 17.0, 24.3] {
            let ring = digital_circle(30.0, 30.0, radius);
            for (i, &(x, y)) in ring.iter().enumerate() {
                let (nx, ny) = ring[(i + 1) % ring.len()];
                assert!(
                    (x - nx).abs() + (y - ny).abs() <= 1,
                    "gap between ({x}, {y}) and ({nx}, {ny}) at radius {radius}"
                );
            }
        }
    }

    #[test]
    fn test_volumetric_space_diagonal_is_not_skipped() {
        let dims = Dims::new(41, 41, 41);
        let mut mask = empty_mask(dims);
        for i in 0..41 {
            mask[(i, i, i)] = true;
        }
        let center = PointRoi::new("soma", 20.0, 20.0, 20);
        let profiler = RadialProfiler::new(ShollConfig {
            start_radius_px: 4.0,
            step_px: 1.0,
            mode: ShollMode::Volumetric,
        });
        let profile = profiler.profile(&mask, &center);

        for s in profile.samples.iter().filter(|s| s.radius < 30.0) {
            assert_eq!(s.intersections, 2, "radius {}", s.radius);
        }
    }

    #[test]
    fn test_profile_is_deterministic() {
        let dims = Dims::new(41, 41, 3);
        let mut mask = empty_mask(dims);
        draw_cross(&mut mask, 20, 20, 1, 15);
        let center = PointRoi::new("soma", 18.0, 22.0, 1);
        let p = profiler(ShollMode::Planar);
        assert_eq!(p.profile(&mask, &center), p.profile(&mask, &center));
    }
}
