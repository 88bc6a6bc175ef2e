//! Mitochondria detection: filter, threshold, label, size-filter.

use crate::backend::FilterBackend;
use crate::config::SegmentationConfig;
use crate::population::ObjectPopulation;
use crate::volume::Volume;

/// Runs the fixed detection pipeline on a [`FilterBackend`].
#[derive(Debug)]
pub struct SegmentationEngine<'a> {
    backend: &'a dyn FilterBackend,
    config: SegmentationConfig,
}

impl<'a> SegmentationEngine<'a> {
    pub fn new(backend: &'a dyn FilterBackend, config: SegmentationConfig) -> Self {
        config.validate();
        Self { backend, config }
    }

    /// Segments `volume` into size-filtered, contiguously labeled objects.
    ///
    /// Median → DoG → automatic threshold → 26-connected labeling → size
    /// filter. The input buffer is consumed. An empty foreground gives an
    /// empty population.
    pub fn segment(&self, volume: Volume) -> ObjectPopulation {
        let c = &self.config;
        let dims = volume.dims();
        let calibration = volume.calibration();

        let denoised = self
            .backend
            .denoise(volume, c.median_radius_xy, c.median_radius_z);
        let filtered = self.backend.bandpass(denoised, c.dog_sigma1, c.dog_sigma2);
        let mask = self.backend.threshold(filtered, c.threshold);
        let foreground = mask.count_foreground();
        tracing::debug!(foreground, total = dims.len(), "Thresholded");

        if foreground == 0 {
            return ObjectPopulation::empty(dims, calibration);
        }

        let labels = self.backend.label(mask);
        let found = labels.num_labels();
        let labels = self
            .backend
            .size_filter(labels, c.min_volume, c.max_volume);
        tracing::debug!(found, kept = labels.num_labels(), "Labeled objects");

        ObjectPopulation::from_label_map(&labels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::CpuBackend;
    use crate::testing::{spheres_volume, IdentityBackend};
    use crate::volume::{Calibration, Dims, VolumeBuffer};

    #[test]
    fn test_volume_below_detection_yields_no_objects() {
        let backend = CpuBackend;
        let engine = SegmentationEngine::new(&backend, SegmentationConfig::default());

        let flat = VolumeBuffer::new_filled(Dims::new(24, 24, 8), 12.0f32, Calibration::unit());
        assert!(engine.segment(flat).is_empty());

        let zero = VolumeBuffer::new_filled(Dims::new(24, 24, 8), 0.0f32, Calibration::unit());
        assert!(engine.segment(zero).is_empty());
    }

    #[test]
    fn test_cpu_pipeline_finds_two_spheres() {
        let backend = CpuBackend;
        let engine = SegmentationEngine::new(&backend, SegmentationConfig::default());
        let volume = spheres_volume(Dims::new(64, 64, 24), &[(16, 32, 12), (48, 32, 12)], 5.0, 100.0);

        let population = engine.segment(volume);
        assert_eq!(population.len(), 2, "one object per sphere");
        for obj in &population {
            assert!(obj.volume() >= 10.0);
        }
    }

    #[test]
    fn test_size_filter_bounds_hold() {
        let backend = IdentityBackend;
        let config = SegmentationConfig {
            min_volume: 30.0,
            max_volume: Some(200.0),
            ..Default::default()
        };
        let engine = SegmentationEngine::new(&backend, config);
        // Radii 1.5, 3 and 5 voxels: ~19, ~123 and ~515 voxels.
        let mut volume = spheres_volume(Dims::new(48, 20, 20), &[(6, 10, 10)], 1.5, 100.0);
        let medium = spheres_volume(Dims::new(48, 20, 20), &[(20, 10, 10)], 3.0, 100.0);
        let large = spheres_volume(Dims::new(48, 20, 20), &[(37, 10, 10)], 5.0, 100.0);
        for ((v, m), l) in volume
            .voxels_mut()
            .iter_mut()
            .zip(medium.voxels())
            .zip(large.voxels())
        {
            *v = v.max(*m).max(*l);
        }

        let population = engine.segment(volume);
        assert_eq!(population.len(), 1, "only the medium sphere fits [30, 200]");
        for obj in &population {
            assert!(obj.volume() >= 30.0 && obj.volume() <= 200.0);
        }
    }
}
