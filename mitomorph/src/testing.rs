//! Synthetic volumes and helpers shared by unit tests.

use crate::backend::{BackendKind, CpuBackend, FilterBackend};
use crate::config::ThresholdMethod;
use crate::labeling::LabelMap;
use crate::volume::{Calibration, Dims, Mask, Volume, VolumeBuffer};

/// Initialize tracing subscriber for tests.
/// Safe to call multiple times - will only initialize once.
/// Respects RUST_LOG env var, defaults to "warn".
pub(crate) fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Background-zero volume with solid spheres of `value`, 1 µm isotropic voxels.
pub(crate) fn spheres_volume(
    dims: Dims,
    centers: &[(usize, usize, usize)],
    radius: f64,
    value: f32,
) -> Volume {
    let mut vol = VolumeBuffer::new_filled(dims, 0.0f32, Calibration::unit());
    let r2 = radius * radius;
    for idx in 0..dims.len() {
        let p = dims.coords(idx);
        let inside = centers.iter().any(|&(cx, cy, cz)| {
            let dx = p.x as f64 - cx as f64;
            let dy = p.y as f64 - cy as f64;
            let dz = p.z as f64 - cz as f64;
            dx * dx + dy * dy + dz * dz <= r2
        });
        if inside {
            vol[idx] = value;
        }
    }
    vol
}

/// Lattice points within `radius` of a voxel center.
pub(crate) fn sphere_voxel_count(radius: f64) -> usize {
    let r = radius.ceil() as i64;
    let r2 = radius * radius;
    let mut count = 0;
    for z in -r..=r {
        for y in -r..=r {
            for x in -r..=r {
                if (x * x + y * y + z * z) as f64 <= r2 {
                    count += 1;
                }
            }
        }
    }
    count
}

pub(crate) fn empty_mask(dims: Dims) -> Mask {
    VolumeBuffer::new_filled(dims, false, Calibration::unit())
}

/// Plus sign in slice `z`: four arms of `arm` voxels around `(cx, cy)`.
pub(crate) fn draw_cross(mask: &mut Mask, cx: usize, cy: usize, z: usize, arm: usize) {
    mask[(cx, cy, z)] = true;
    for d in 1..=arm {
        mask[(cx + d, cy, z)] = true;
        mask[(cx - d, cy, z)] = true;
        mask[(cx, cy + d, z)] = true;
        mask[(cx, cy - d, z)] = true;
    }
}

/// Outline of the square `[x0, x0 + size) x [y0, y0 + size)` in slice `z`.
pub(crate) fn draw_square_ring(mask: &mut Mask, x0: usize, y0: usize, z: usize, size: usize) {
    for i in 0..size {
        mask[(x0 + i, y0, z)] = true;
        mask[(x0 + i, y0 + size - 1, z)] = true;
        mask[(x0, y0 + i, z)] = true;
        mask[(x0 + size - 1, y0 + i, z)] = true;
    }
}

/// Straight line along x from `x0` to `x1` inclusive.
pub(crate) fn draw_line_x(mask: &mut Mask, x0: usize, x1: usize, y: usize, z: usize) {
    for x in x0..=x1 {
        mask[(x, y, z)] = true;
    }
}

/// Passes intensities straight to thresholding; labeling and size filtering
/// are the CPU ones. Lets pipeline tests reason about exact voxel sets.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct IdentityBackend;

impl FilterBackend for IdentityBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn denoise(&self, volume: Volume, _radius_xy: usize, _radius_z: usize) -> Volume {
        volume
    }

    fn bandpass(&self, volume: Volume, _sigma1: f32, _sigma2: f32) -> Volume {
        volume
    }

    fn threshold(&self, volume: Volume, method: ThresholdMethod) -> Mask {
        CpuBackend.threshold(volume, method)
    }

    fn label(&self, mask: Mask) -> LabelMap {
        CpuBackend.label(mask)
    }

    fn size_filter(&self, labels: LabelMap, min_volume: f64, max_volume: Option<f64>) -> LabelMap {
        CpuBackend.size_filter(labels, min_volume, max_volume)
    }
}
