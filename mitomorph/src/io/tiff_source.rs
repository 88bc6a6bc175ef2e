//! Multi-channel TIFF stacks.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use tiff::decoder::{Decoder, DecodingResult, Limits};

use crate::error::{Error, Result};
use crate::volume::{Calibration, Dims, Volume, VolumeBuffer};

/// Supplies one calibrated channel of an acquisition as a volume.
pub trait ImageSource: Send + Sync {
    fn load(&self, path: &Path, channel: usize) -> Result<Volume>;
}

/// Reads stacks whose pages are ordered slice-major with `channels`
/// interleaved pages per slice: page `z * channels + c` holds channel `c` of
/// slice `z`. TIFF files carry no reliable physical calibration, so it is
/// supplied by the caller.
#[derive(Debug, Clone, Copy)]
pub struct TiffStackSource {
    channels: usize,
    calibration: Calibration,
}

impl TiffStackSource {
    pub fn new(channels: usize, calibration: Calibration) -> Self {
        assert!(channels > 0, "a stack needs at least one channel");
        Self {
            channels,
            calibration,
        }
    }

    pub fn channels(&self) -> usize {
        self.channels
    }
}

impl ImageSource for TiffStackSource {
    fn load(&self, path: &Path, channel: usize) -> Result<Volume> {
        if channel >= self.channels {
            return Err(Error::ChannelOutOfRange {
                path: path.to_path_buf(),
                channel,
                channels: self.channels,
            });
        }

        let decode_err = |e: tiff::TiffError| Error::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        };
        let malformed = |message: String| Error::Decode {
            path: path.to_path_buf(),
            message,
        };

        let file = File::open(path).map_err(|source| Error::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut decoder = Decoder::new(BufReader::new(file))
            .map_err(decode_err)?
            .with_limits(Limits::unlimited());

        let (width, height) = decoder.dimensions().map_err(decode_err)?;
        let (width, height) = (width as usize, height as usize);

        let mut voxels: Vec<f32> = Vec::new();
        let mut page = 0usize;
        loop {
            if page % self.channels == channel {
                let dims = decoder.dimensions().map_err(decode_err)?;
                if (dims.0 as usize, dims.1 as usize) != (width, height) {
                    return Err(malformed(format!(
                        "page {page} is {}x{}, expected {width}x{height}",
                        dims.0, dims.1
                    )));
                }
                match decoder.read_image().map_err(decode_err)? {
                    DecodingResult::U8(buf) => voxels.extend(buf.into_iter().map(f32::from)),
                    DecodingResult::U16(buf) => voxels.extend(buf.into_iter().map(f32::from)),
                    DecodingResult::F32(buf) => voxels.extend(buf),
                    _ => {
                        return Err(malformed(format!(
                            "page {page} has an unsupported sample format (expected u8, u16 or f32 grayscale)"
                        )))
                    }
                }
            }
            page += 1;
            if !decoder.more_images() {
                break;
            }
            decoder.next_image().map_err(decode_err)?;
        }

        if page % self.channels != 0 {
            return Err(malformed(format!(
                "{page} pages is not a multiple of {} channels",
                self.channels
            )));
        }

        let slice_len = width * height;
        if voxels.len() != slice_len * (page / self.channels) {
            return Err(malformed("page sizes do not match the first page".to_string()));
        }

        let dims = Dims::new(width, height, page / self.channels);
        tracing::debug!(
            path = %path.display(),
            channel,
            width,
            height,
            depth = dims.depth,
            "Stack loaded"
        );
        Ok(VolumeBuffer::new(dims, voxels, self.calibration))
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufWriter;

    use tiff::encoder::{colortype, TiffEncoder};

    use super::*;

    /// `pages` u16 pages of 4x3; pixel `i` of page `p` holds `p * 100 + i`.
    fn write_stack(name: &str, pages: u16) -> std::path::PathBuf {
        let path = common::test_utils::test_output_path(name);
        let mut file = BufWriter::new(File::create(&path).unwrap());
        let mut encoder = TiffEncoder::new(&mut file).unwrap();
        for p in 0..pages {
            let data: Vec<u16> = (0..12).map(|i| p * 100 + i).collect();
            encoder.write_image::<colortype::Gray16>(4, 3, &data).unwrap();
        }
        drop(encoder);
        path
    }

    #[test]
    fn test_selects_interleaved_channel() {
        let path = write_stack("mitomorph_stack_2ch.tif", 6);
        let source = TiffStackSource::new(2, Calibration::new(0.1, 0.5));
        let volume = source.load(&path, 1).unwrap();

        assert_eq!(volume.dims(), Dims::new(4, 3, 3));
        assert_eq!(volume.calibration(), Calibration::new(0.1, 0.5));
        assert_eq!(volume[(0, 0, 0)], 100.0);
        assert_eq!(volume[(1, 0, 1)], 301.0);
        assert_eq!(volume[(3, 2, 2)], 511.0);
    }

    #[test]
    fn test_channel_out_of_range() {
        let source = TiffStackSource::new(2, Calibration::unit());
        let err = source.load(Path::new("unused.tif"), 2).unwrap_err();
        assert!(matches!(err, Error::ChannelOutOfRange { channel: 2, channels: 2, .. }));
    }

    #[test]
    fn test_incomplete_last_slice_is_rejected() {
        let path = write_stack("mitomorph_stack_odd.tif", 5);
        let source = TiffStackSource::new(2, Calibration::unit());
        let err = source.load(&path, 0).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let source = TiffStackSource::new(1, Calibration::unit());
        let err = source
            .load(Path::new("/definitely/not/here.tif"), 0)
            .unwrap_err();
        assert!(matches!(err, Error::Read { .. }));
        assert!(err.is_fatal());
    }
}
