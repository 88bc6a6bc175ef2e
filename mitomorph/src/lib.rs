//! Mitomorph - 3D morphometry of mitochondrial networks inside astrocyte ROIs.
//!
//! For every hand-drawn cell outline and its soma point, the library:
//! - Segments mitochondria (median, difference of Gaussians, automatic threshold)
//! - Labels 26-connected objects and drops those outside a volume range
//! - Restricts the objects to the outline on every slice
//! - Thins them to a skeleton and tallies branches, end points and junctions
//! - Profiles radial (Sholl) intersections around the soma
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use mitomorph::{AnalysisConfig, RoiAnalyzer, pair_rois};
//!
//! let analyzer = RoiAnalyzer::new(AnalysisConfig::default())?;
//! for pair in pair_rois("astro_01", &rois.polygons, &rois.points)? {
//!     let analysis = analyzer.analyze("astro_01", &volume, &pair)?;
//!     println!("{}", analysis.record.to_tsv_row());
//! }
//! ```

pub mod analysis;
pub mod backend;
pub mod batch;
pub mod config;
pub mod error;
pub mod filters;
pub mod io;
pub mod labeling;
pub mod population;
pub mod region_mask;
pub mod roi;
pub mod segmentation;
pub mod sholl;
pub mod skeleton;
pub mod volume;

#[cfg(test)]
pub(crate) mod testing;

// ============================================================================
// Core data types
// ============================================================================

pub use error::{Error, ErrorScope, Result};
pub use volume::{Calibration, Dims, Mask, Plane, Rect, Volume, VolumeBuffer};

// ============================================================================
// Configuration
// ============================================================================

pub use config::{AnalysisConfig, SegmentationConfig, ShollConfig, ShollMode, ThresholdMethod};

// ============================================================================
// Pipeline
// ============================================================================

pub use analysis::{ResultRecord, RoiAnalysis, RoiAnalyzer};
pub use backend::{create_backend, BackendKind, CpuBackend, FilterBackend};
pub use labeling::{Connectivity, LabelMap};
pub use population::{LabeledObject, ObjectPopulation};
pub use region_mask::mask_outside;
pub use roi::{pair_rois, PointRoi, PolygonRoi, RoiPair, RoiSet};
pub use segmentation::SegmentationEngine;
pub use sholl::{RadialProfile, RadialProfiler, RadialSample};
pub use skeleton::{SkeletonResult, SkeletonStats};

// ============================================================================
// Runs
// ============================================================================

pub use batch::{BatchRunner, BatchSummary};
pub use io::{
    ArtifactWriter, ImageSource, JsonRoiProvider, MemorySink, NoArtifacts, ResultsSink,
    RoiProvider, TiffArtifactWriter, TiffStackSource, TsvResultsSink,
};
