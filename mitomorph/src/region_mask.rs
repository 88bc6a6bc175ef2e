//! Restricting volumes to a polygon footprint replicated through all slices.

use glam::DVec2;
use rayon::prelude::*;

use crate::roi::PolygonRoi;
use crate::volume::{Plane, VolumeBuffer};

/// In-plane footprint of `polygon` on a `width` x `height` grid.
///
/// The polygon is translated so its bounding box starts at the grid origin,
/// matching a volume cropped to that box. A pixel belongs to the footprint
/// when its center lies inside the polygon.
pub fn polygon_footprint(polygon: &PolygonRoi, width: usize, height: usize) -> Plane<bool> {
    let bounds = polygon.bounds();
    let local = polygon.translated(DVec2::new(bounds.x as f64, bounds.y as f64));

    let mut pixels = vec![false; width * height];
    pixels
        .par_chunks_mut(width.max(1))
        .enumerate()
        .for_each(|(y, row)| {
            for (x, px) in row.iter_mut().enumerate() {
                *px = local.contains(DVec2::new(x as f64 + 0.5, y as f64 + 0.5));
            }
        });
    Plane::new(width, height, pixels)
}

/// Sets every voxel outside `polygon` to background (`T::default()`), on every slice.
///
/// Idempotent: masking twice with the same polygon equals masking once.
pub fn mask_outside<T>(volume: &mut VolumeBuffer<T>, polygon: &PolygonRoi)
where
    T: Copy + Default + Send,
{
    let dims = volume.dims();
    if dims.is_empty() {
        return;
    }
    let footprint = polygon_footprint(polygon, dims.width, dims.height);

    volume
        .voxels_mut()
        .par_chunks_mut(dims.slice_len())
        .for_each(|slice| {
            for (v, &inside) in slice.iter_mut().zip(footprint.pixels()) {
                if !inside {
                    *v = T::default();
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::volume::{Calibration, Dims};

    fn triangle() -> PolygonRoi {
        PolygonRoi::new(
            "tri",
            vec![
                DVec2::new(10.0, 20.0),
                DVec2::new(18.0, 20.0),
                DVec2::new(10.0, 28.0),
            ],
        )
    }

    #[test]
    fn test_footprint_is_anchored_at_bounds_origin() {
        let footprint = polygon_footprint(&triangle(), 8, 8);
        assert!(footprint[(0, 0)], "corner of the right angle");
        assert!(!footprint[(7, 7)], "beyond the hypotenuse");
        let inside = footprint.pixels().iter().filter(|&&b| b).count();
        // Pixel centers strictly below the hypotenuse x + y < 8.
        assert_eq!(inside, 28);
    }

    #[test]
    fn test_mask_outside_clears_every_slice() {
        let dims = Dims::new(8, 8, 3);
        let mut vol = VolumeBuffer::new_filled(dims, 5.0f32, Calibration::unit());
        mask_outside(&mut vol, &triangle());

        for z in 0..3 {
            assert_eq!(vol[(0, 0, z)], 5.0);
            assert_eq!(vol[(7, 7, z)], 0.0);
        }
        let footprint = polygon_footprint(&triangle(), 8, 8);
        for (idx, &v) in vol.voxels().iter().enumerate() {
            let inside = footprint.pixels()[idx % dims.slice_len()];
            assert_eq!(v != 0.0, inside, "foreground must lie inside the footprint");
        }
    }

    #[test]
    fn test_mask_outside_is_idempotent() {
        let dims = Dims::new(8, 8, 2);
        let mut once = VolumeBuffer::new_filled(dims, true, Calibration::unit());
        mask_outside(&mut once, &triangle());
        let mut twice = once.clone();
        mask_outside(&mut twice, &triangle());
        assert_eq!(once, twice);
    }
}
