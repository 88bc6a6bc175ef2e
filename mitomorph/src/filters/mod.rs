//! CPU volume filters used by the segmentation pipeline.

pub mod gaussian;
pub mod median;
pub mod threshold;

pub use gaussian::{difference_of_gaussians, gaussian_blur_3d};
pub use median::median_filter_3d;
pub use threshold::{threshold_volume, Histogram};
