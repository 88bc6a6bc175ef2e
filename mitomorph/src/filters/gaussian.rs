//! Separable 3D Gaussian smoothing and difference-of-Gaussians band-pass.

use rayon::prelude::*;

use crate::volume::{Dims, Volume};

#[derive(Debug, Clone, Copy)]
enum Axis {
    X,
    Y,
    Z,
}

/// Normalized 1D Gaussian kernel with radius `ceil(3 * sigma)`.
pub fn gaussian_kernel(sigma: f32) -> Vec<f32> {
    assert!(sigma > 0.0, "sigma must be positive, got {}", sigma);
    let radius = (3.0 * sigma).ceil() as usize;
    let two_sigma_sq = 2.0 * sigma * sigma;

    let mut kernel: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let x = i as f32 - radius as f32;
            (-x * x / two_sigma_sq).exp()
        })
        .collect();

    let sum: f32 = kernel.iter().sum();
    for k in kernel.iter_mut() {
        *k /= sum;
    }
    kernel
}

/// Isotropic Gaussian blur with `sigma` in voxels, replicate padding at the borders.
pub fn gaussian_blur_3d(volume: &Volume, sigma: f32) -> Volume {
    if volume.is_empty() {
        return volume.clone();
    }
    let kernel = gaussian_kernel(sigma);
    let dims = volume.dims();

    let x = convolve_axis(volume.voxels(), dims, &kernel, Axis::X);
    let xy = convolve_axis(&x, dims, &kernel, Axis::Y);
    let xyz = convolve_axis(&xy, dims, &kernel, Axis::Z);

    volume.with_voxels(xyz)
}

/// `G(sigma1) - G(sigma2)`: keeps structures between the two scales.
pub fn difference_of_gaussians(volume: Volume, sigma1: f32, sigma2: f32) -> Volume {
    let narrow = gaussian_blur_3d(&volume, sigma1);
    let wide = gaussian_blur_3d(&volume, sigma2);
    drop(volume);

    let mut out = narrow;
    out.voxels_mut()
        .par_iter_mut()
        .zip(wide.voxels().par_iter())
        .for_each(|(n, &w)| *n -= w);
    out
}

fn convolve_axis(data: &[f32], dims: Dims, kernel: &[f32], axis: Axis) -> Vec<f32> {
    let radius = (kernel.len() / 2) as isize;
    let clamp = |v: isize, len: usize| v.clamp(0, len as isize - 1) as usize;
    let mut out = vec![0.0f32; dims.len()];

    out.par_chunks_mut(dims.slice_len())
        .enumerate()
        .for_each(|(z, out_slice)| {
            for y in 0..dims.height {
                for x in 0..dims.width {
                    let mut acc = 0.0f64;
                    for (k, &w) in kernel.iter().enumerate() {
                        let offset = k as isize - radius;
                        let idx = match axis {
                            Axis::X => dims.index(clamp(x as isize + offset, dims.width), y, z),
                            Axis::Y => dims.index(x, clamp(y as isize + offset, dims.height), z),
                            Axis::Z => dims.index(x, y, clamp(z as isize + offset, dims.depth)),
                        };
                        acc += w as f64 * data[idx] as f64;
                    }
                    out_slice[y * dims.width + x] = acc as f32;
                }
            }
        });

    out
}
