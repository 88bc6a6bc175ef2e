//! Per-ROI analysis: crop, segment, mask, skeletonize, profile.

use serde::{Deserialize, Serialize};

use crate::backend::{create_backend, FilterBackend};
use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::population::ObjectPopulation;
use crate::region_mask::{mask_outside, polygon_footprint};
use crate::roi::RoiPair;
use crate::segmentation::SegmentationEngine;
use crate::sholl::{RadialProfile, RadialProfiler};
use crate::skeleton;
use crate::volume::{Plane, Rect, Volume, VolumeBuffer};

// ============================================================================
// Result record
// ============================================================================

/// One results row for an (image, ROI) pair. Volumes in µm³, lengths in µm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub image_name: String,
    pub roi_name: String,
    pub roi_volume: f64,
    pub mito_count: usize,
    pub mito_volume: f64,
    pub branch_count: usize,
    pub branch_length: f64,
    pub end_points: usize,
    pub junctions: usize,
}

impl ResultRecord {
    pub const TSV_HEADER: &'static str = "ImageName\tRoi\tRoi volume\tMito number\tMito volume\tMito branch number\tMito branch length\tMito end points\tMito junction number";

    /// Tab-separated row matching [`Self::TSV_HEADER`], without line ending.
    pub fn to_tsv_row(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            self.image_name,
            self.roi_name,
            self.roi_volume,
            self.mito_count,
            self.mito_volume,
            self.branch_count,
            self.branch_length,
            self.end_points,
            self.junctions
        )
    }
}

/// Everything one ROI analysis produces: the row plus audit artifacts.
#[derive(Debug, Clone)]
pub struct RoiAnalysis {
    pub record: ResultRecord,
    pub profile: RadialProfile,
    /// Objects inside the ROI, labeled 1..n, in crop coordinates.
    pub objects: VolumeBuffer<u32>,
    /// Skeleton components labeled 1..n, maximum-projected along z.
    pub skeleton_projection: Plane<u32>,
}

// ============================================================================
// Analyzer
// ============================================================================

/// Runs the per-ROI pipeline on one backend chosen up front.
#[derive(Debug)]
pub struct RoiAnalyzer {
    backend: Box<dyn FilterBackend>,
    config: AnalysisConfig,
}

impl RoiAnalyzer {
    /// Validates `config` and resolves its backend.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate();
        let backend = create_backend(config.backend)?;
        tracing::info!(backend = %backend.kind(), "Filter backend ready");
        Ok(Self { backend, config })
    }

    pub fn with_backend(config: AnalysisConfig, backend: Box<dyn FilterBackend>) -> Self {
        config.validate();
        Self { backend, config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn FilterBackend {
        self.backend.as_ref()
    }

    /// Analyzes one ROI pair of a full channel volume.
    ///
    /// The volume is cropped to the polygon's bounding rectangle first; a
    /// polygon that misses the image is an [`Error::EmptyCrop`].
    pub fn analyze(&self, image_name: &str, volume: &Volume, pair: &RoiPair) -> Result<RoiAnalysis> {
        let bounds = pair.polygon.bounds();
        let crop = volume.crop(bounds).ok_or_else(|| Error::EmptyCrop {
            image: image_name.to_string(),
            roi: pair.polygon.name.clone(),
            width: volume.width(),
            height: volume.height(),
        })?;
        self.analyze_cropped(image_name, crop, pair, bounds)
    }

    /// Analyzes a volume already cropped to `origin`, the polygon's bounds.
    pub fn analyze_cropped(
        &self,
        image_name: &str,
        crop: Volume,
        pair: &RoiPair,
        origin: Rect,
    ) -> Result<RoiAnalysis> {
        let roi_name = pair.polygon.name.as_str();
        let dims = crop.dims();
        let calibration = crop.calibration();

        let center = pair.point.relative_to(origin);
        if center.z >= dims.depth {
            return Err(Error::PointOutOfBounds {
                image: image_name.to_string(),
                roi: roi_name.to_string(),
                z: center.z,
                depth: dims.depth,
            });
        }

        let footprint = polygon_footprint(&pair.polygon, dims.width, dims.height);
        let footprint_pixels = footprint.pixels().iter().filter(|&&p| p).count();
        let roi_volume = footprint_pixels as f64
            * calibration.pixel_width
            * calibration.pixel_height
            * dims.depth as f64
            * calibration.pixel_depth;

        let engine = SegmentationEngine::new(self.backend.as_ref(), self.config.segmentation);
        let segmented = engine.segment(crop);

        // Mask the labels rather than the intensities so objects straddling the
        // outline keep their identity inside it.
        let mut labels = segmented.render_labels();
        mask_outside(&mut labels, &pair.polygon);
        let population = ObjectPopulation::from_label_volume(&labels);
        tracing::debug!(
            segmented = segmented.len(),
            inside = population.len(),
            "Objects restricted to ROI"
        );
        drop(segmented);

        let skeleton = skeleton::extract(&population);
        let profile = RadialProfiler::new(self.config.sholl).profile(&skeleton.skeleton, &center);

        let record = ResultRecord {
            image_name: image_name.to_string(),
            roi_name: roi_name.to_string(),
            roi_volume,
            mito_count: population.len(),
            mito_volume: population.total_volume(),
            branch_count: skeleton.stats.branch_count,
            branch_length: skeleton.stats.branch_length,
            end_points: skeleton.stats.end_points,
            junctions: skeleton.stats.junctions,
        };

        tracing::info!(
            image = image_name,
            roi = roi_name,
            roi_volume = record.roi_volume,
            mito_count = record.mito_count,
            mito_volume = record.mito_volume,
            branches = record.branch_count,
            "ROI analyzed"
        );

        Ok(RoiAnalysis {
            record,
            profile,
            objects: population.render_labels(),
            skeleton_projection: skeleton.labeled_projection,
        })
    }
}
