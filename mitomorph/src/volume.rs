//! Calibrated 3D voxel buffers.

use std::ops::{Index, IndexMut};

use glam::UVec3;
use serde::{Deserialize, Serialize};

/// Physical size of one voxel, in microns.
///
/// Pixels are square in-plane, so `pixel_height` always equals `pixel_width`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Calibration {
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub pixel_depth: f64,
}

impl Calibration {
    pub const UNIT: &'static str = "microns";

    pub fn new(pixel_width: f64, pixel_depth: f64) -> Self {
        assert!(
            pixel_width > 0.0,
            "pixel_width must be positive, got {}",
            pixel_width
        );
        assert!(
            pixel_depth > 0.0,
            "pixel_depth must be positive, got {}",
            pixel_depth
        );
        Self {
            pixel_width,
            pixel_height: pixel_width,
            pixel_depth,
        }
    }

    /// 1 µm isotropic voxels.
    pub fn unit() -> Self {
        Self::new(1.0, 1.0)
    }

    /// Volume of a single voxel in cubic microns.
    #[inline]
    pub fn voxel_volume(&self) -> f64 {
        self.pixel_width * self.pixel_height * self.pixel_depth
    }

    /// Physical distance between two voxel positions.
    #[inline]
    pub fn distance(&self, a: UVec3, b: UVec3) -> f64 {
        let dx = (a.x as f64 - b.x as f64) * self.pixel_width;
        let dy = (a.y as f64 - b.y as f64) * self.pixel_height;
        let dz = (a.z as f64 - b.z as f64) * self.pixel_depth;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::unit()
    }
}

/// Volume dimensions in voxels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dims {
    pub width: usize,
    pub height: usize,
    pub depth: usize,
}

impl Dims {
    pub fn new(width: usize, height: usize, depth: usize) -> Self {
        Self {
            width,
            height,
            depth,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height * self.depth
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[inline]
    pub fn slice_len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        debug_assert!(x < self.width && y < self.height && z < self.depth);
        (z * self.height + y) * self.width + x
    }

    #[inline]
    pub fn coords(&self, idx: usize) -> UVec3 {
        let slice = self.slice_len();
        let z = idx / slice;
        let rem = idx % slice;
        UVec3::new((rem % self.width) as u32, (rem / self.width) as u32, z as u32)
    }

    /// Linear index of the neighbor at `offset`, or `None` if it falls outside.
    #[inline]
    pub fn offset_index(&self, p: UVec3, offset: [i32; 3]) -> Option<usize> {
        let x = p.x as i64 + offset[0] as i64;
        let y = p.y as i64 + offset[1] as i64;
        let z = p.z as i64 + offset[2] as i64;
        if x < 0
            || y < 0
            || z < 0
            || x >= self.width as i64
            || y >= self.height as i64
            || z >= self.depth as i64
        {
            return None;
        }
        Some(self.index(x as usize, y as usize, z as usize))
    }
}

/// Axis-aligned in-plane rectangle in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl Rect {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Intersection with a `width` x `height` image, or `None` if they do not overlap.
    pub fn clamp_to(&self, width: usize, height: usize) -> Option<Rect> {
        let x_end = (self.x + self.width).min(width);
        let y_end = (self.y + self.height).min(height);
        if self.x >= x_end || self.y >= y_end {
            return None;
        }
        Some(Rect::new(self.x, self.y, x_end - self.x, y_end - self.y))
    }
}

/// A 3D grid of voxels with its physical calibration.
///
/// Voxels are stored slice-major: `index = (z * height + y) * width + x`.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeBuffer<T> {
    voxels: Vec<T>,
    dims: Dims,
    calibration: Calibration,
}

/// Intensity volume.
pub type Volume = VolumeBuffer<f32>;
/// Binary foreground mask.
pub type Mask = VolumeBuffer<bool>;

impl<T> VolumeBuffer<T> {
    pub fn new(dims: Dims, voxels: Vec<T>, calibration: Calibration) -> Self {
        assert_eq!(
            voxels.len(),
            dims.len(),
            "voxel count must equal width * height * depth"
        );
        Self {
            voxels,
            dims,
            calibration,
        }
    }

    #[inline]
    pub fn dims(&self) -> Dims {
        self.dims
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.dims.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.dims.height
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.dims.depth
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.voxels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.voxels.is_empty()
    }

    #[inline]
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, z: usize) -> &T {
        &self.voxels[self.dims.index(x, y, z)]
    }

    #[inline]
    pub fn get_mut(&mut self, x: usize, y: usize, z: usize) -> &mut T {
        let idx = self.dims.index(x, y, z);
        &mut self.voxels[idx]
    }

    #[inline]
    pub fn voxels(&self) -> &[T] {
        &self.voxels
    }

    #[inline]
    pub fn voxels_mut(&mut self) -> &mut [T] {
        &mut self.voxels
    }

    #[inline]
    pub fn into_voxels(self) -> Vec<T> {
        self.voxels
    }

    /// All voxels of slice `z`.
    #[inline]
    pub fn slice(&self, z: usize) -> &[T] {
        let len = self.dims.slice_len();
        &self.voxels[z * len..(z + 1) * len]
    }

    /// A new buffer of the same shape and calibration, built voxel by voxel.
    pub fn map<U>(&self, f: impl Fn(&T) -> U) -> VolumeBuffer<U> {
        VolumeBuffer {
            voxels: self.voxels.iter().map(f).collect(),
            dims: self.dims,
            calibration: self.calibration,
        }
    }

    /// Same shape and calibration, different voxel data.
    pub fn with_voxels<U>(&self, voxels: Vec<U>) -> VolumeBuffer<U> {
        VolumeBuffer::new(self.dims, voxels, self.calibration)
    }
}

impl<T: Clone> VolumeBuffer<T> {
    pub fn new_filled(dims: Dims, value: T, calibration: Calibration) -> Self {
        Self {
            voxels: vec![value; dims.len()],
            dims,
            calibration,
        }
    }

    /// Copy of the in-plane region `rect` through all slices.
    ///
    /// `rect` is clamped to the volume; returns `None` when nothing overlaps.
    pub fn crop(&self, rect: Rect) -> Option<VolumeBuffer<T>> {
        let rect = rect.clamp_to(self.width(), self.height())?;
        let dims = Dims::new(rect.width, rect.height, self.depth());
        let mut voxels = Vec::with_capacity(dims.len());
        for z in 0..self.depth() {
            for y in rect.y..rect.y + rect.height {
                let start = self.dims.index(rect.x, y, z);
                voxels.extend_from_slice(&self.voxels[start..start + rect.width]);
            }
        }
        Some(VolumeBuffer::new(dims, voxels, self.calibration))
    }
}

impl<T: Copy + PartialOrd + Default> VolumeBuffer<T> {
    /// Maximum-intensity projection along z.
    pub fn max_projection(&self) -> Plane<T> {
        let mut plane = Plane::new_filled(self.width(), self.height(), T::default());
        for z in 0..self.depth() {
            for (out, &v) in plane.pixels_mut().iter_mut().zip(self.slice(z)) {
                if v > *out {
                    *out = v;
                }
            }
        }
        plane
    }
}

impl Mask {
    /// Number of foreground voxels.
    pub fn count_foreground(&self) -> usize {
        self.voxels.iter().filter(|&&v| v).count()
    }
}

impl<T> Index<(usize, usize, usize)> for VolumeBuffer<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y, z): (usize, usize, usize)) -> &Self::Output {
        self.get(x, y, z)
    }
}

impl<T> IndexMut<(usize, usize, usize)> for VolumeBuffer<T> {
    #[inline]
    fn index_mut(&mut self, (x, y, z): (usize, usize, usize)) -> &mut Self::Output {
        self.get_mut(x, y, z)
    }
}

impl<T> Index<usize> for VolumeBuffer<T> {
    type Output = T;

    #[inline]
    fn index(&self, idx: usize) -> &Self::Output {
        &self.voxels[idx]
    }
}

impl<T> IndexMut<usize> for VolumeBuffer<T> {
    #[inline]
    fn index_mut(&mut self, idx: usize) -> &mut Self::Output {
        &mut self.voxels[idx]
    }
}

/// A single 2D image, used for flattened audit artifacts.
#[derive(Debug, Clone, PartialEq)]
pub struct Plane<T> {
    pixels: Vec<T>,
    width: usize,
    height: usize,
}

impl<T> Plane<T> {
    pub fn new(width: usize, height: usize, pixels: Vec<T>) -> Self {
        assert_eq!(
            pixels.len(),
            width * height,
            "pixels length must equal width * height"
        );
        Self {
            pixels,
            width,
            height,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn pixels(&self) -> &[T] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [T] {
        &mut self.pixels
    }
}

impl<T: Clone> Plane<T> {
    pub fn new_filled(width: usize, height: usize, value: T) -> Self {
        Self {
            pixels: vec![value; width * height],
            width,
            height,
        }
    }
}

impl<T> Index<(usize, usize)> for Plane<T> {
    type Output = T;

    #[inline]
    fn index(&self, (x, y): (usize, usize)) -> &Self::Output {
        &self.pixels[y * self.width + x]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(dims: Dims) -> Volume {
        let voxels = (0..dims.len()).map(|i| i as f32).collect();
        VolumeBuffer::new(dims, voxels, Calibration::unit())
    }

    #[test]
    fn test_index_and_coords_agree() {
        let dims = Dims::new(5, 4, 3);
        for idx in 0..dims.len() {
            let p = dims.coords(idx);
            assert_eq!(dims.index(p.x as usize, p.y as usize, p.z as usize), idx);
        }
    }

    #[test]
    fn test_offset_index_bounds() {
        let dims = Dims::new(3, 3, 3);
        let corner = UVec3::new(0, 0, 0);
        assert_eq!(dims.offset_index(corner, [-1, 0, 0]), None);
        assert_eq!(dims.offset_index(corner, [1, 1, 1]), Some(dims.index(1, 1, 1)));
        assert_eq!(dims.offset_index(UVec3::new(2, 2, 2), [0, 0, 1]), None);
    }

    #[test]
    fn test_crop_copies_region_through_slices() {
        let vol = ramp(Dims::new(6, 5, 2));
        let cropped = vol.crop(Rect::new(2, 1, 3, 2)).expect("overlaps");
        assert_eq!(cropped.dims(), Dims::new(3, 2, 2));
        for z in 0..2 {
            for y in 0..2 {
                for x in 0..3 {
                    assert_eq!(cropped[(x, y, z)], vol[(x + 2, y + 1, z)]);
                }
            }
        }
    }

    #[test]
    fn test_crop_clamps_and_rejects_outside() {
        let vol = ramp(Dims::new(4, 4, 1));
        let clamped = vol.crop(Rect::new(2, 2, 10, 10)).expect("partial overlap");
        assert_eq!(clamped.dims(), Dims::new(2, 2, 1));
        assert!(vol.crop(Rect::new(4, 0, 2, 2)).is_none());
    }

    #[test]
    fn test_max_projection() {
        let dims = Dims::new(2, 1, 3);
        let vol = VolumeBuffer::new(dims, vec![1u32, 7, 5, 2, 3, 9], Calibration::unit());
        let proj = vol.max_projection();
        assert_eq!(proj.pixels(), &[5, 9]);
    }

    #[test]
    fn test_calibration_voxel_volume_and_distance() {
        let cal = Calibration::new(0.5, 2.0);
        assert!((cal.voxel_volume() - 0.5).abs() < 1e-12);
        let d = cal.distance(UVec3::new(0, 0, 0), UVec3::new(2, 0, 1));
        assert!((d - (1.0f64 + 4.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "voxel count must equal")]
    fn test_new_rejects_wrong_length() {
        VolumeBuffer::new(Dims::new(2, 2, 2), vec![0.0f32; 7], Calibration::unit());
    }
}
