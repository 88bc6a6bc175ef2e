//! Audit artifacts: object labels, skeleton projection, radial profile.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tiff::encoder::{colortype, TiffEncoder};

use crate::analysis::RoiAnalysis;
use crate::error::{Error, Result};
use crate::sholl::RadialProfile;
use crate::volume::{Plane, VolumeBuffer};

/// Persists the side outputs of one ROI analysis.
pub trait ArtifactWriter: Send + Sync {
    /// Returns the files written.
    fn write(&self, image_name: &str, analysis: &RoiAnalysis) -> Result<Vec<PathBuf>>;
}

/// Writes nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoArtifacts;

impl ArtifactWriter for NoArtifacts {
    fn write(&self, _image_name: &str, _analysis: &RoiAnalysis) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

/// Writes 32-bit grayscale TIFFs and a tab-separated profile into one directory.
#[derive(Debug, Clone)]
pub struct TiffArtifactWriter {
    dir: PathBuf,
}

impl TiffArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn objects_path(&self, image_name: &str, roi_name: &str) -> PathBuf {
        self.dir
            .join(format!("{image_name}_Roi-{roi_name}_Objects.tif"))
    }

    pub fn skeleton_path(&self, image_name: &str, roi_name: &str) -> PathBuf {
        self.dir
            .join(format!("{image_name}_{roi_name}_LabelledSkel.tif"))
    }

    pub fn profile_path(&self, image_name: &str, roi_name: &str) -> PathBuf {
        self.dir.join(format!("{image_name}_{roi_name}_Sholl.tsv"))
    }
}

impl ArtifactWriter for TiffArtifactWriter {
    fn write(&self, image_name: &str, analysis: &RoiAnalysis) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(&self.dir).map_err(|source| Error::Write {
            path: self.dir.clone(),
            source,
        })?;

        let roi = analysis.record.roi_name.as_str();
        let objects = self.objects_path(image_name, roi);
        let skeleton = self.skeleton_path(image_name, roi);
        let profile = self.profile_path(image_name, roi);

        write_label_stack(&objects, &analysis.objects)?;
        write_label_plane(&skeleton, &analysis.skeleton_projection)?;
        write_profile(&profile, &analysis.profile)?;

        tracing::debug!(image = image_name, roi, dir = %self.dir.display(), "Artifacts written");
        Ok(vec![objects, skeleton, profile])
    }
}

fn create(path: &Path) -> Result<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(|source| Error::Write {
            path: path.to_path_buf(),
            source,
        })
}

fn flush(mut file: BufWriter<File>, path: &Path) -> Result<()> {
    file.flush().map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })
}

fn encode_err(path: &Path) -> impl Fn(tiff::TiffError) -> Error + '_ {
    move |e| Error::Encode {
        path: path.to_path_buf(),
        message: e.to_string(),
    }
}

/// Multi-page 32-bit label stack, one page per slice.
pub fn write_label_stack(path: &Path, labels: &VolumeBuffer<u32>) -> Result<()> {
    let mut file = create(path)?;
    {
        let mut encoder = TiffEncoder::new(&mut file).map_err(encode_err(path))?;
        let (w, h) = (labels.width() as u32, labels.height() as u32);
        for z in 0..labels.depth() {
            encoder
                .write_image::<colortype::Gray32>(w, h, labels.slice(z))
                .map_err(encode_err(path))?;
        }
    }
    flush(file, path)
}

/// Single-page 32-bit label image.
pub fn write_label_plane(path: &Path, plane: &Plane<u32>) -> Result<()> {
    let mut file = create(path)?;
    TiffEncoder::new(&mut file)
        .and_then(|mut encoder| {
            encoder.write_image::<colortype::Gray32>(
                plane.width() as u32,
                plane.height() as u32,
                plane.pixels(),
            )
        })
        .map_err(encode_err(path))?;
    flush(file, path)
}

/// `Radius\tIntersections` table, radius in microns.
pub fn write_profile(path: &Path, profile: &RadialProfile) -> Result<()> {
    let mut file = create(path)?;
    let io_err = |source| Error::Write {
        path: path.to_path_buf(),
        source,
    };
    writeln!(file, "Radius\tIntersections").map_err(io_err)?;
    for sample in &profile.samples {
        writeln!(file, "{}\t{}", sample.radius, sample.intersections).map_err(io_err)?;
    }
    file.flush().map_err(io_err)
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;

    use glam::DVec2;
    use tiff::decoder::{Decoder, DecodingResult};

    use super::*;
    use crate::analysis::RoiAnalyzer;
    use crate::config::AnalysisConfig;
    use crate::roi::{PointRoi, PolygonRoi, RoiPair};
    use crate::testing::{spheres_volume, IdentityBackend};
    use crate::volume::Dims;

    fn analysis() -> RoiAnalysis {
        let analyzer = RoiAnalyzer::with_backend(AnalysisConfig::default(), Box::new(IdentityBackend));
        let volume = spheres_volume(Dims::new(40, 30, 6), &[(12, 15, 3), (28, 15, 3)], 2.5, 50.0);
        let pair = RoiPair {
            polygon: PolygonRoi::new(
                "cell1",
                vec![
                    DVec2::new(0.0, 0.0),
                    DVec2::new(40.0, 0.0),
                    DVec2::new(40.0, 30.0),
                    DVec2::new(0.0, 30.0),
                ],
            ),
            point: PointRoi::new("cell1", 20.0, 15.0, 3),
        };
        analyzer.analyze("astro", &volume, &pair).unwrap()
    }

    #[test]
    fn test_writes_all_three_artifacts() {
        let dir = common::test_utils::test_output_dir("mitomorph_artifacts");
        let writer = TiffArtifactWriter::new(&dir);
        let analysis = analysis();

        let written = writer.write("astro", &analysis).unwrap();
        assert_eq!(written.len(), 3);
        assert!(written[0].ends_with("astro_Roi-cell1_Objects.tif"));
        assert!(written[1].ends_with("astro_cell1_LabelledSkel.tif"));
        assert!(written[2].ends_with("astro_cell1_Sholl.tsv"));
        for path in &written {
            assert!(path.is_file(), "{} missing", path.display());
        }

        let table = std::fs::read_to_string(&written[2]).unwrap();
        assert_eq!(table.lines().next(), Some("Radius\tIntersections"));
        assert_eq!(table.lines().count(), analysis.profile.len() + 1);
    }

    #[test]
    fn test_label_stack_has_one_page_per_slice() {
        let analysis = analysis();
        let path = common::test_utils::test_output_path("mitomorph_label_stack.tif");
        write_label_stack(&path, &analysis.objects).unwrap();

        let file = BufReader::new(File::open(&path).unwrap());
        let mut decoder = Decoder::new(file).unwrap();
        let mut pages = 0;
        let mut labels_seen = std::collections::BTreeSet::new();
        loop {
            assert_eq!(decoder.dimensions().unwrap(), (40, 30));
            match decoder.read_image().unwrap() {
                DecodingResult::U32(data) => labels_seen.extend(data),
                _ => panic!("expected 32-bit pages"),
            }
            pages += 1;
            if !decoder.more_images() {
                break;
            }
            decoder.next_image().unwrap();
        }
        assert_eq!(pages, 6);
        assert_eq!(labels_seen.into_iter().collect::<Vec<_>>(), vec![0, 1, 2]);
    }

    #[test]
    fn test_no_artifacts_writes_nothing() {
        assert!(NoArtifacts.write("astro", &analysis()).unwrap().is_empty());
    }
}
