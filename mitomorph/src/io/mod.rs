//! File-backed collaborators: image stacks in, ROI sets in, rows and artifacts out.

pub mod artifacts;
pub mod results;
pub mod roi_file;
pub mod tiff_source;

pub use artifacts::{ArtifactWriter, NoArtifacts, TiffArtifactWriter};
pub use results::{MemorySink, ResultsSink, TsvResultsSink};
pub use roi_file::{JsonRoiProvider, RoiProvider};
pub use tiff_source::{ImageSource, TiffStackSource};
