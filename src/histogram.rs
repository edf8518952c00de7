//! Per-channel color histograms and their extraction from image files.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use image::io::Reader as ImageReader;
use image::RgbImage;

use crate::error::{DecodeError, HistogramError};
use crate::record::ImageRecord;

/// Default number of bins per channel: one per 8-bit intensity level.
pub const DEFAULT_BINS: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    Red,
    Green,
    Blue,
}

impl Channel {
    pub const ALL: [Channel; 3] = [Channel::Red, Channel::Green, Channel::Blue];

    fn index(self) -> usize {
        match self {
            Channel::Red => 0,
            Channel::Green => 1,
            Channel::Blue => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::Red => "red",
            Channel::Green => "green",
            Channel::Blue => "blue",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of bins per channel, always within 1..=256.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BinCount(usize);

impl BinCount {
    pub fn new(bins: usize) -> Result<Self, HistogramError> {
        if (1..=DEFAULT_BINS).contains(&bins) {
            Ok(Self(bins))
        } else {
            Err(HistogramError::InvalidBinCount(bins))
        }
    }

    pub fn get(self) -> usize {
        self.0
    }

    /// Bin that an 8-bit intensity falls into. Bins have uniform width over
    /// the range [0, 256).
    pub fn bin_for(self, value: u8) -> usize {
        value as usize * self.0 / DEFAULT_BINS
    }
}

impl Default for BinCount {
    fn default() -> Self {
        Self(DEFAULT_BINS)
    }
}

/// Red, green and blue intensity counts of one image.
///
/// Every channel has the same number of bins; this is checked when the
/// histogram is built and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    bins: BinCount,
    channels: [Box<[u64]>; 3],
}

impl Histogram {
    pub fn empty(bins: BinCount) -> Self {
        let zeroed = || vec![0u64; bins.get()].into_boxed_slice();
        Self {
            bins,
            channels: [zeroed(), zeroed(), zeroed()],
        }
    }

    /// Build a histogram from raw per-channel counts.
    pub fn from_channels(
        red: Vec<u64>,
        green: Vec<u64>,
        blue: Vec<u64>,
    ) -> Result<Self, HistogramError> {
        let bins = BinCount::new(red.len())?;
        for (channel, counts) in [(Channel::Green, &green), (Channel::Blue, &blue)] {
            if counts.len() != bins.get() {
                return Err(HistogramError::ChannelLength {
                    channel: channel.name(),
                    expected: bins.get(),
                    actual: counts.len(),
                });
            }
        }
        Ok(Self {
            bins,
            channels: [
                red.into_boxed_slice(),
                green.into_boxed_slice(),
                blue.into_boxed_slice(),
            ],
        })
    }

    pub fn from_rgb_image(image: &RgbImage, bins: BinCount) -> Self {
        let mut histogram = Self::empty(bins);
        for pixel in image.pixels() {
            for channel in Channel::ALL {
                let bin = bins.bin_for(pixel.0[channel.index()]);
                histogram.channels[channel.index()][bin] += 1;
            }
        }
        histogram
    }

    pub fn bins(&self) -> BinCount {
        self.bins
    }

    pub fn channel(&self, channel: Channel) -> &[u64] {
        &self.channels[channel.index()]
    }

    /// Number of pixels counted. Every channel sums to the same value.
    pub fn pixel_count(&self) -> u64 {
        self.channel(Channel::Red).iter().sum()
    }
}

/// Decode `path` into an 8-bit RGB pixel grid.
///
/// The format is sniffed from the file contents, falling back to the
/// extension, so a misnamed file still decodes.
pub fn decode_rgb(path: &Path) -> Result<RgbImage, DecodeError> {
    let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
    Ok(image.into_rgb8())
}

/// Decode one image and compute its histogram.
///
/// Never fails: a file that cannot be decoded yields a record carrying the
/// decode error instead of a histogram.
pub fn extract(path: &Path, bins: BinCount) -> ImageRecord {
    match decode_rgb(path) {
        Ok(image) => {
            let histogram = Histogram::from_rgb_image(&image, bins);
            log::trace!(
                "Histogram for {:?}: {} pixels",
                path,
                histogram.pixel_count()
            );
            ImageRecord::with_histogram(path.to_path_buf(), Arc::new(histogram))
        }
        Err(e) => {
            log::warn!("Cannot read image {:?}: {}", path, e);
            ImageRecord::with_error(path.to_path_buf(), e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb};
    use tempfile::tempdir;

    fn gradient(width: u32, height: u32) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, ((x + y) % 256) as u8])
        })
    }

    #[test]
    fn test_bin_count_bounds() {
        assert!(BinCount::new(0).is_err());
        assert!(BinCount::new(257).is_err());
        assert_eq!(BinCount::new(1).unwrap().get(), 1);
        assert_eq!(BinCount::default().get(), 256);
    }

    #[test]
    fn test_bin_for() {
        let full = BinCount::default();
        assert_eq!(full.bin_for(0), 0);
        assert_eq!(full.bin_for(255), 255);

        let coarse = BinCount::new(16).unwrap();
        assert_eq!(coarse.bin_for(0), 0);
        assert_eq!(coarse.bin_for(15), 0);
        assert_eq!(coarse.bin_for(16), 1);
        assert_eq!(coarse.bin_for(255), 15);

        let single = BinCount::new(1).unwrap();
        assert_eq!(single.bin_for(255), 0);
    }

    #[test]
    fn test_channel_sums_equal_pixel_count() {
        let image = gradient(37, 21);
        for bins in [1, 16, 100, 256] {
            let histogram = Histogram::from_rgb_image(&image, BinCount::new(bins).unwrap());
            for channel in Channel::ALL {
                let sum: u64 = histogram.channel(channel).iter().sum();
                assert_eq!(sum, 37 * 21, "{} channel with {} bins", channel, bins);
                assert_eq!(histogram.channel(channel).len(), bins);
            }
            assert_eq!(histogram.pixel_count(), 37 * 21);
        }
    }

    #[test]
    fn test_solid_color_histogram() {
        let image = RgbImage::from_pixel(4, 5, Rgb([10, 200, 255]));
        let histogram = Histogram::from_rgb_image(&image, BinCount::default());
        assert_eq!(histogram.channel(Channel::Red)[10], 20);
        assert_eq!(histogram.channel(Channel::Green)[200], 20);
        assert_eq!(histogram.channel(Channel::Blue)[255], 20);
        assert_eq!(histogram.channel(Channel::Red)[11], 0);
    }

    #[test]
    fn test_from_channels_validates_shape() {
        let ok = Histogram::from_channels(vec![1; 8], vec![2; 8], vec![3; 8]).unwrap();
        assert_eq!(ok.bins().get(), 8);
        assert_eq!(ok.channel(Channel::Blue), &[3; 8]);

        let err = Histogram::from_channels(vec![1; 8], vec![2; 7], vec![3; 8]).unwrap_err();
        assert_eq!(
            err,
            HistogramError::ChannelLength {
                channel: "green",
                expected: 8,
                actual: 7
            }
        );

        assert_eq!(
            Histogram::from_channels(vec![], vec![], vec![]).unwrap_err(),
            HistogramError::InvalidBinCount(0)
        );
    }

    #[test]
    fn test_extract_png_named_jpg() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("actually_png.jpg");
        gradient(8, 8).save_with_format(&path, ImageFormat::Png)?;

        let record = extract(&path, BinCount::default());
        let histogram = record.histogram().expect("png content should decode");
        assert_eq!(histogram.pixel_count(), 64);
        assert!(record.error().is_none());
        Ok(())
    }

    #[test]
    fn test_extract_corrupt_file() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("broken.jpg");
        std::fs::write(&path, b"definitely not a jpeg")?;

        let record = extract(&path, BinCount::default());
        assert!(record.histogram().is_none());
        assert!(matches!(record.error(), Some(DecodeError::Image(_))));
        Ok(())
    }

    #[test]
    fn test_extract_missing_file() {
        let record = extract(Path::new("/nonexistent/imgdups/missing.jpg"), BinCount::default());
        assert!(matches!(record.error(), Some(DecodeError::Io(_))));
    }
}
