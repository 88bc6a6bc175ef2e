//! Error types for ROI analysis.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::backend::BackendKind;

/// How far an error reaches: the whole run, one image, or one ROI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    Run,
    Image,
    Roi,
}

/// Errors that can occur while analyzing images.
#[derive(Debug, Error)]
pub enum Error {
    #[error("No point ROI matches polygon ROI '{roi}' in image '{image}'")]
    MissingPointRoi { image: String, roi: String },

    #[error("Polygon ROI '{roi}' in image '{image}' matches several point ROIs: {candidates:?}")]
    AmbiguousPointRoi {
        image: String,
        roi: String,
        candidates: Vec<String>,
    },

    #[error("No ROI file for image '{image}' (expected '{path}')")]
    MissingRoiFile { image: String, path: PathBuf },

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to decode '{path}': {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Channel {channel} is out of range for '{path}' ({channels} channels)")]
    ChannelOutOfRange {
        path: PathBuf,
        channel: usize,
        channels: usize,
    },

    #[error("Filter backend '{backend}' is not available: {reason}")]
    BackendUnavailable { backend: BackendKind, reason: String },

    #[error("ROI '{roi}' does not overlap image '{image}' ({width}x{height})")]
    EmptyCrop {
        image: String,
        roi: String,
        width: usize,
        height: usize,
    },

    #[error("Point ROI '{roi}' lies on slice {z} but image '{image}' has {depth} slices")]
    PointOutOfBounds {
        image: String,
        roi: String,
        z: usize,
        depth: usize,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode '{path}': {message}")]
    Encode { path: PathBuf, message: String },
}

impl Error {
    /// The extent of work this error aborts.
    pub fn scope(&self) -> ErrorScope {
        match self {
            Error::Read { .. }
            | Error::Decode { .. }
            | Error::ChannelOutOfRange { .. }
            | Error::BackendUnavailable { .. } => ErrorScope::Run,
            Error::MissingPointRoi { .. }
            | Error::AmbiguousPointRoi { .. }
            | Error::MissingRoiFile { .. } => ErrorScope::Image,
            Error::EmptyCrop { .. }
            | Error::PointOutOfBounds { .. }
            | Error::Write { .. }
            | Error::Encode { .. } => ErrorScope::Roi,
        }
    }

    /// Whether the error must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        self.scope() == ErrorScope::Run
    }
}

pub type Result<T> = std::result::Result<T, Error>;
