//! Filter backends: the capability set the segmentation pipeline runs on.
//!
//! A backend is chosen once at startup with [`create_backend`]; every call
//! consumes its input buffer and returns a new one.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::ThresholdMethod;
use crate::error::{Error, Result};
use crate::filters;
use crate::labeling::{Connectivity, LabelMap};
use crate::volume::{Mask, Volume};

/// Available execution backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Cpu,
    Gpu,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Cpu => write!(f, "cpu"),
            BackendKind::Gpu => write!(f, "gpu"),
        }
    }
}

/// Volume operations of the segmentation pipeline.
pub trait FilterBackend: Send + Sync + fmt::Debug {
    fn kind(&self) -> BackendKind;

    /// 3D median with the given box radii.
    fn denoise(&self, volume: Volume, radius_xy: usize, radius_z: usize) -> Volume;

    /// Difference-of-Gaussians band-pass, sigmas in voxels.
    fn bandpass(&self, volume: Volume, sigma1: f32, sigma2: f32) -> Volume;

    fn threshold(&self, volume: Volume, method: ThresholdMethod) -> Mask;

    /// 26-connected component labeling.
    fn label(&self, mask: Mask) -> LabelMap;

    /// Drops components outside `[min_volume, max_volume]` (cubic microns).
    fn size_filter(&self, labels: LabelMap, min_volume: f64, max_volume: Option<f64>) -> LabelMap;
}

/// Portable reference backend, parallelized with rayon.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuBackend;

impl FilterBackend for CpuBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Cpu
    }

    fn denoise(&self, volume: Volume, radius_xy: usize, radius_z: usize) -> Volume {
        filters::median_filter_3d(volume, radius_xy, radius_z)
    }

    fn bandpass(&self, volume: Volume, sigma1: f32, sigma2: f32) -> Volume {
        filters::difference_of_gaussians(volume, sigma1, sigma2)
    }

    fn threshold(&self, volume: Volume, method: ThresholdMethod) -> Mask {
        filters::threshold_volume(&volume, method)
    }

    fn label(&self, mask: Mask) -> LabelMap {
        LabelMap::from_mask(&mask, Connectivity::TwentySix)
    }

    fn size_filter(&self, labels: LabelMap, min_volume: f64, max_volume: Option<f64>) -> LabelMap {
        labels.filter_by_size(min_volume, max_volume)
    }
}

/// Resolves the backend for a run. Fails before any image is touched when the
/// requested backend cannot be used.
pub fn create_backend(kind: BackendKind) -> Result<Box<dyn FilterBackend>> {
    match kind {
        BackendKind::Cpu => Ok(Box::new(CpuBackend)),
        BackendKind::Gpu => Err(Error::BackendUnavailable {
            backend: kind,
            reason: "this build has no GPU device backend".to_string(),
        }),
    }
}
