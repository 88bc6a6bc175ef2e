//! 3D box median filter.

use rayon::prelude::*;

use crate::volume::Volume;

/// Median over a `(2*radius_xy+1)² x (2*radius_z+1)` box around every voxel.
///
/// The box is truncated at the volume borders, so edge voxels take the median
/// of the neighbors that exist. Slices are filtered in parallel.
pub fn median_filter_3d(volume: Volume, radius_xy: usize, radius_z: usize) -> Volume {
    if volume.is_empty() || (radius_xy == 0 && radius_z == 0) {
        return volume;
    }

    let dims = volume.dims();
    let input = volume.voxels();
    let mut output = vec![0.0f32; dims.len()];

    output
        .par_chunks_mut(dims.slice_len())
        .enumerate()
        .for_each(|(z, out_slice)| {
            let z0 = z.saturating_sub(radius_z);
            let z1 = (z + radius_z).min(dims.depth - 1);
            let window_cap = (2 * radius_xy + 1).pow(2) * (2 * radius_z + 1);
            let mut window = Vec::with_capacity(window_cap);

            for y in 0..dims.height {
                let y0 = y.saturating_sub(radius_xy);
                let y1 = (y + radius_xy).min(dims.height - 1);

                for x in 0..dims.width {
                    let x0 = x.saturating_sub(radius_xy);
                    let x1 = (x + radius_xy).min(dims.width - 1);

                    window.clear();
                    for wz in z0..=z1 {
                        for wy in y0..=y1 {
                            let start = dims.index(x0, wy, wz);
                            window.extend_from_slice(&input[start..=start + (x1 - x0)]);
                        }
                    }

                    let mid = window.len() / 2;
                    let (_, median, _) = window.select_nth_unstable_by(mid, f32::total_cmp);
                    out_slice[y * dims.width + x] = *median;
                }
            }
        });

    volume.with_voxels(output)
}
