//! Configuration types for ROI analysis.
//!
//! [`AnalysisConfig`] groups the segmentation, radial-profile and backend
//! settings. Every type deserializes with defaults, so a partial JSON file only
//! overrides the fields it names.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::backend::BackendKind;
use crate::error::{Error, Result};

// ============================================================================
// Enums
// ============================================================================

/// Automatic global threshold used to binarize the band-passed volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMethod {
    /// Triangle heuristic: distance from the histogram peak to the line
    /// joining it with the far end of the histogram. Suits sparse, skewed
    /// histograms where the foreground is a thin tail.
    #[default]
    Triangle,
    /// Otsu's method: maximizes between-class variance.
    Otsu,
}

/// How intersections are counted at each radius.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShollMode {
    /// 4-connected digital circle on the point's slice; crossings are
    /// 8-connected clusters of foreground pixels on it.
    #[default]
    Planar,
    /// Sphere shell through the whole stack; crossings are 26-connected
    /// clusters of foreground voxels within half a voxel diagonal of the shell.
    Volumetric,
}

// ============================================================================
// Segmentation
// ============================================================================

/// Parameters of the mitochondria detection pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// In-plane radius of the 3D median box, in pixels.
    pub median_radius_xy: usize,
    /// Depth radius of the 3D median box, in slices.
    pub median_radius_z: usize,
    /// Sigma of the narrow Gaussian, in voxels.
    pub dog_sigma1: f32,
    /// Sigma of the wide Gaussian, in voxels.
    pub dog_sigma2: f32,
    pub threshold: ThresholdMethod,
    /// Smallest accepted object volume, in cubic microns.
    pub min_volume: f64,
    /// Largest accepted object volume, in cubic microns. `None` is unbounded.
    pub max_volume: Option<f64>,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            median_radius_xy: 2,
            median_radius_z: 2,
            dog_sigma1: 2.0,
            dog_sigma2: 3.0,
            threshold: ThresholdMethod::Triangle,
            min_volume: 10.0,
            max_volume: None,
        }
    }
}

impl SegmentationConfig {
    pub fn validate(&self) {
        assert!(
            self.dog_sigma1 > 0.0,
            "dog_sigma1 must be positive, got {}",
            self.dog_sigma1
        );
        assert!(
            self.dog_sigma1 < self.dog_sigma2,
            "dog_sigma1 ({}) must be smaller than dog_sigma2 ({})",
            self.dog_sigma1,
            self.dog_sigma2
        );
        assert!(
            self.min_volume >= 0.0,
            "min_volume must be non-negative, got {}",
            self.min_volume
        );
        if let Some(max) = self.max_volume {
            assert!(
                max >= self.min_volume,
                "max_volume ({}) must not be below min_volume ({})",
                max,
                self.min_volume
            );
        }
    }
}

// ============================================================================
// Radial profile
// ============================================================================

/// Radial sampling around the soma point. Radii are multiples of the pixel width.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShollConfig {
    /// First radius, in pixel widths (soma radius heuristic).
    pub start_radius_px: f64,
    /// Radius increment, in pixel widths.
    pub step_px: f64,
    pub mode: ShollMode,
}

impl Default for ShollConfig {
    fn default() -> Self {
        Self {
            start_radius_px: 10.0,
            step_px: 5.0,
            mode: ShollMode::Planar,
        }
    }
}

impl ShollConfig {
    pub fn validate(&self) {
        assert!(
            self.start_radius_px > 0.0,
            "start_radius_px must be positive, got {}",
            self.start_radius_px
        );
        assert!(
            self.step_px > 0.0,
            "step_px must be positive, got {}",
            self.step_px
        );
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Full configuration of one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub segmentation: SegmentationConfig,
    pub sholl: ShollConfig,
    pub backend: BackendKind,
    /// Persist object masks, skeleton projections and radial profiles.
    pub write_artifacts: bool,
    /// Images analyzed concurrently by the batch runner.
    pub max_parallel_images: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            segmentation: SegmentationConfig::default(),
            sholl: ShollConfig::default(),
            backend: BackendKind::Cpu,
            write_artifacts: true,
            max_parallel_images: 1,
        }
    }
}

impl AnalysisConfig {
    /// Reads a (possibly partial) JSON configuration.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|e| Error::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    pub fn validate(&self) {
        self.segmentation.validate();
        self.sholl.validate();
        assert!(
            self.max_parallel_images > 0,
            "max_parallel_images must be at least 1"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AnalysisConfig::default();
        assert_eq!(config.segmentation.median_radius_xy, 2);
        assert_eq!(config.segmentation.median_radius_z, 2);
        assert_eq!(config.segmentation.dog_sigma1, 2.0);
        assert_eq!(config.segmentation.dog_sigma2, 3.0);
        assert_eq!(config.segmentation.threshold, ThresholdMethod::Triangle);
        assert_eq!(config.segmentation.min_volume, 10.0);
        assert_eq!(config.segmentation.max_volume, None);
        assert_eq!(config.sholl.start_radius_px, 10.0);
        assert_eq!(config.sholl.step_px, 5.0);
        assert_eq!(config.backend, BackendKind::Cpu);
        config.validate();
    }

    #[test]
    fn test_partial_json_overrides_defaults() {
        let json = r#"{"segmentation": {"min_volume": 2.5, "threshold": "otsu"}, "sholl": {"mode": "volumetric"}}"#;
        let config: AnalysisConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.segmentation.min_volume, 2.5);
        assert_eq!(config.segmentation.threshold, ThresholdMethod::Otsu);
        assert_eq!(config.segmentation.dog_sigma2, 3.0, "untouched field keeps default");
        assert_eq!(config.sholl.mode, ShollMode::Volumetric);
        assert!(config.write_artifacts);
    }

    #[test]
    fn test_from_json_file() {
        let path = common::test_utils::test_output_path("mitomorph_config_partial.json");
        std::fs::write(&path, r#"{"backend": "cpu", "write_artifacts": false}"#).unwrap();
        let config = AnalysisConfig::from_json_file(&path).unwrap();
        assert!(!config.write_artifacts);
    }

    #[test]
    fn test_from_json_file_reports_decode_error() {
        let path = common::test_utils::test_output_path("mitomorph_config_broken.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = AnalysisConfig::from_json_file(&path).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    #[should_panic(expected = "must be smaller than dog_sigma2")]
    fn test_validate_rejects_inverted_sigmas() {
        let config = SegmentationConfig {
            dog_sigma1: 3.0,
            dog_sigma2: 2.0,
            ..Default::default()
        };
        config.validate();
    }

    #[test]
    #[should_panic(expected = "must not be below min_volume")]
    fn test_validate_rejects_max_below_min() {
        let config = SegmentationConfig {
            min_volume: 10.0,
            max_volume: Some(5.0),
            ..Default::default()
        };
        config.validate();
    }
}
