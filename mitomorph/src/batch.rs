//! Whole-folder runs: every image, every ROI, one results table.

use std::path::{Path, PathBuf};

use common::file_utils::file_stem;
use common::parallel::par_map_ordered;

use crate::analysis::{ResultRecord, RoiAnalyzer};
use crate::error::{ErrorScope, Result};
use crate::io::{ArtifactWriter, ImageSource, ResultsSink, RoiProvider};
use crate::roi::pair_rois;

/// Counts reported at the end of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub images_processed: usize,
    pub images_skipped: usize,
    pub rois_analyzed: usize,
    pub rois_failed: usize,
}

/// What one image contributed.
#[derive(Debug, Default)]
struct ImageOutcome {
    records: Vec<ResultRecord>,
    skipped: bool,
    rois_failed: usize,
}

/// Drives the analyzer over a list of images.
///
/// Image- and ROI-scoped failures are logged and skipped; run-scoped ones
/// (unreadable stacks, malformed ROI files) stop the run after the records of
/// earlier images have reached the sink.
pub struct BatchRunner<'a> {
    analyzer: &'a RoiAnalyzer,
    source: &'a dyn ImageSource,
    rois: &'a dyn RoiProvider,
    artifacts: &'a dyn ArtifactWriter,
    channel: usize,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        analyzer: &'a RoiAnalyzer,
        source: &'a dyn ImageSource,
        rois: &'a dyn RoiProvider,
        artifacts: &'a dyn ArtifactWriter,
        channel: usize,
    ) -> Self {
        Self {
            analyzer,
            source,
            rois,
            artifacts,
            channel,
        }
    }

    /// Analyzes `images` in order and appends every record to `sink`.
    ///
    /// Up to `max_parallel_images` images are analyzed at once; records are
    /// still appended in image order.
    pub fn run(&self, images: &[PathBuf], sink: &mut dyn ResultsSink) -> Result<BatchSummary> {
        let parallel = self.analyzer.config().max_parallel_images;
        let mut summary = BatchSummary::default();

        par_map_ordered(
            images,
            parallel,
            |path| self.process_image(path),
            |outcome| -> Result<()> {
                let outcome = outcome?;
                if outcome.skipped {
                    summary.images_skipped += 1;
                    return Ok(());
                }
                summary.images_processed += 1;
                summary.rois_failed += outcome.rois_failed;
                for record in &outcome.records {
                    sink.append(record)?;
                    summary.rois_analyzed += 1;
                }
                Ok(())
            },
        )?;

        tracing::info!(
            images = summary.images_processed,
            skipped = summary.images_skipped,
            rois = summary.rois_analyzed,
            failed = summary.rois_failed,
            "Batch finished"
        );
        Ok(summary)
    }

    fn process_image(&self, path: &Path) -> Result<ImageOutcome> {
        let image_name = file_stem(path);

        let pairs = match self
            .rois
            .rois(path)
            .and_then(|set| pair_rois(&image_name, &set.polygons, &set.points))
        {
            Ok(pairs) => pairs,
            Err(e) if e.scope() == ErrorScope::Image => {
                tracing::warn!(image = %image_name, error = %e, "Skipping image");
                return Ok(ImageOutcome {
                    skipped: true,
                    ..Default::default()
                });
            }
            Err(e) => return Err(e),
        };

        let volume = self.source.load(path, self.channel)?;
        tracing::info!(
            image = %image_name,
            rois = pairs.len(),
            width = volume.width(),
            height = volume.height(),
            depth = volume.depth(),
            "Analyzing image"
        );

        let mut outcome = ImageOutcome::default();
        for pair in &pairs {
            let analysis = match self.analyzer.analyze(&image_name, &volume, pair) {
                Ok(analysis) => analysis,
                Err(e) if e.scope() == ErrorScope::Roi => {
                    tracing::warn!(image = %image_name, roi = %pair.polygon.name, error = %e, "ROI failed");
                    outcome.rois_failed += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            if self.analyzer.config().write_artifacts {
                if let Err(e) = self.artifacts.write(&image_name, &analysis) {
                    tracing::warn!(image = %image_name, roi = %pair.polygon.name, error = %e, "Artifacts not written");
                }
            }
            outcome.records.push(analysis.record);
        }
        Ok(outcome)
    }
}
