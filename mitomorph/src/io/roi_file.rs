//! ROI sets stored as JSON next to their images.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::roi::RoiSet;

/// Supplies the ROIs drawn on an image.
pub trait RoiProvider: Send + Sync {
    fn rois(&self, image: &Path) -> Result<RoiSet>;
}

/// Reads `<image stem>.rois.json`, from the image's own directory or from a
/// dedicated one.
///
/// ```json
/// {"polygons": [{"name": "cell1", "vertices": [[10, 12], [40, 12], [25, 50]]}],
///  "points":   [{"name": "cell1", "x": 25.0, "y": 30.0, "z": 4}]}
/// ```
#[derive(Debug, Clone, Default)]
pub struct JsonRoiProvider {
    dir: Option<PathBuf>,
}

impl JsonRoiProvider {
    pub const SUFFIX: &'static str = ".rois.json";

    /// Looks for ROI files beside each image.
    pub fn beside_images() -> Self {
        Self { dir: None }
    }

    /// Looks for ROI files in `dir`.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: Some(dir.into()),
        }
    }

    pub fn roi_path(&self, image: &Path) -> PathBuf {
        let file_name = format!("{}{}", common::file_utils::file_stem(image), Self::SUFFIX);
        match &self.dir {
            Some(dir) => dir.join(file_name),
            None => image
                .parent()
                .map(|p| p.join(&file_name))
                .unwrap_or_else(|| PathBuf::from(&file_name)),
        }
    }
}

impl RoiProvider for JsonRoiProvider {
    fn rois(&self, image: &Path) -> Result<RoiSet> {
        let path = self.roi_path(image);
        if !path.is_file() {
            return Err(Error::MissingRoiFile {
                image: common::file_utils::file_stem(image),
                path,
            });
        }
        let text = std::fs::read_to_string(&path).map_err(|source| Error::Read {
            path: path.clone(),
            source,
        })?;
        let set: RoiSet = serde_json::from_str(&text).map_err(|e| Error::Decode {
            path: path.clone(),
            message: e.to_string(),
        })?;
        tracing::debug!(
            path = %path.display(),
            polygons = set.polygons.len(),
            points = set.points.len(),
            "ROIs loaded"
        );
        Ok(set)
    }
}
