use std::path::{Path, PathBuf};

use image::{ColorType, ImageFormat};
use thiserror::Error;
use tracing::debug;

use crate::buffer::PackedBuffer;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("unsupported output format for {}; use .png, .tga or .bmp", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("failed to encode {}: {source}", .path.display())]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Picks a lossless encoder from the extension of `path`.
pub fn output_format(path: &Path) -> Result<ImageFormat, WriteError> {
    let ext = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match ext.as_deref() {
        Some("png") => Ok(ImageFormat::Png),
        Some("tga") => Ok(ImageFormat::Tga),
        Some("bmp") => Ok(ImageFormat::Bmp),
        _ => Err(WriteError::UnsupportedFormat(path.to_path_buf())),
    }
}

/// Encodes `buffer` to `path`, replacing any existing file.
pub fn write_packed(buffer: &PackedBuffer, path: &Path) -> Result<(), WriteError> {
    let color = match buffer.channel_count() {
        3 => ColorType::Rgb8,
        _ => ColorType::Rgba8,
    };
    encode(
        path,
        buffer.samples(),
        buffer.width(),
        buffer.height(),
        color,
    )?;
    debug!(
        path = %path.display(),
        layout = %buffer.layout(),
        width = buffer.width(),
        height = buffer.height(),
        "wrote packed texture"
    );
    Ok(())
}

/// Encodes a single-channel image, used when exporting isolated channel views.
pub fn write_grayscale(
    samples: &[u8],
    width: u32,
    height: u32,
    path: &Path,
) -> Result<(), WriteError> {
    encode(path, samples, width, height, ColorType::L8)
}

fn encode(
    path: &Path,
    samples: &[u8],
    width: u32,
    height: u32,
    color: ColorType,
) -> Result<(), WriteError> {
    let format = output_format(path)?;
    image::save_buffer_with_format(path, samples, width, height, color, format).map_err(
        |source| WriteError::Encode {
            path: path.to_path_buf(),
            source,
        },
    )
}
