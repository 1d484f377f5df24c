use std::path::{Path, PathBuf};

use image::DynamicImage;
use thiserror::Error;
use tracing::debug;

use crate::buffer::GrayscaleBuffer;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("source image not found at {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("decoded image at {} has an inconsistent sample count", .0.display())]
    Corrupt(PathBuf),
}

/// Integer luma weights out of 256, the same as stb_image uses when it
/// collapses colour to one channel.
const LUMA_WEIGHTS: [u32; 3] = [77, 150, 29];

/// Loads `path` as a single 8-bit luma channel, discarding colour and alpha.
pub fn load_grayscale(path: &Path) -> Result<GrayscaleBuffer, DecodeError> {
    if !path.is_file() {
        return Err(DecodeError::Missing(path.to_path_buf()));
    }

    let image = image::open(path).map_err(|source| DecodeError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let (width, height) = (image.width(), image.height());
    let samples = luma_samples(image);
    debug!(path = %path.display(), width, height, "loaded grayscale source");

    GrayscaleBuffer::new(width, height, samples)
        .map_err(|_| DecodeError::Corrupt(path.to_path_buf()))
}

fn luma_samples(image: DynamicImage) -> Vec<u8> {
    match image {
        DynamicImage::ImageLuma8(gray) => gray.into_raw(),
        DynamicImage::ImageLumaA8(gray) => gray.pixels().map(|px| px.0[0]).collect(),
        other => other.into_rgb8().pixels().map(|px| luma(px.0)).collect(),
    }
}

fn luma([r, g, b]: [u8; 3]) -> u8 {
    let [wr, wg, wb] = LUMA_WEIGHTS;
    ((u32::from(r) * wr + u32::from(g) * wg + u32::from(b) * wb) >> 8) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, Rgb, RgbImage};

    #[test]
    fn loads_single_channel_png() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("ao.png");
        GrayImage::from_fn(3, 2, |x, y| Luma([(x * 10 + y) as u8]))
            .save(&path)
            .unwrap();

        let buffer = load_grayscale(&path).expect("load grayscale");
        assert_eq!(buffer.dimensions(), (3, 2));
        assert_eq!(buffer.samples(), &[0, 10, 20, 1, 11, 21]);
    }

    #[test]
    fn collapses_rgb_sources_to_one_channel() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("rough.png");
        RgbImage::from_pixel(2, 2, Rgb([77, 77, 77])).save(&path).unwrap();

        let buffer = load_grayscale(&path).expect("load grayscale");
        assert_eq!(buffer.pixel_count(), 4);
        assert!(buffer.samples().iter().all(|&value| value == 77));
    }

    #[test]
    fn colour_sources_use_integer_luma_weights() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("ao.png");
        let colours = [[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 255]];
        RgbImage::from_fn(4, 1, |x, _| Rgb(colours[x as usize]))
            .save(&path)
            .unwrap();

        let buffer = load_grayscale(&path).expect("load grayscale");
        assert_eq!(buffer.samples(), &[76, 149, 28, 255]);
    }

    #[test]
    fn alpha_is_dropped_from_gray_sources() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("metal.png");
        image::GrayAlphaImage::from_pixel(2, 1, image::LumaA([90, 3]))
            .save(&path)
            .unwrap();

        let buffer = load_grayscale(&path).expect("load grayscale");
        assert_eq!(buffer.samples(), &[90, 90]);
    }

    #[test]
    fn missing_file_is_reported() {
        let temp = tempfile::tempdir().unwrap();
        let err = load_grayscale(&temp.path().join("nope.png")).unwrap_err();
        assert!(matches!(err, DecodeError::Missing(_)));
    }

    #[test]
    fn garbage_file_fails_to_decode() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("metal.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        let err = load_grayscale(&path).unwrap_err();
        assert!(matches!(err, DecodeError::Decode { .. }));
    }
}
