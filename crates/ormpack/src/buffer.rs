//! Pixel buffers that flow through a packing job.
//!
//! `GrayscaleBuffer` holds one intensity sample per pixel and is what the
//! source loader produces. `PackedBuffer` holds interleaved samples laid out
//! according to a `PackLayout`, ready for the writer or the preview store.
use std::fmt;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected {expected} samples for a {width}x{height} buffer, got {actual}")]
pub struct BufferSizeError {
    pub width: u32,
    pub height: u32,
    pub expected: usize,
    pub actual: usize,
}

/// Raised when the three source maps do not share the same resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error(
    "source dimensions differ: ao {}x{}, roughness {}x{}, metallic {}x{}",
    .ao.0, .ao.1, .roughness.0, .roughness.1, .metallic.0, .metallic.1
)]
pub struct DimensionMismatch {
    pub ao: (u32, u32),
    pub roughness: (u32, u32),
    pub metallic: (u32, u32),
}

fn expected_len(width: u32, height: u32, channels: usize) -> usize {
    width as usize * height as usize * channels
}

#[derive(Clone, PartialEq, Eq)]
pub struct GrayscaleBuffer {
    width: u32,
    height: u32,
    samples: Vec<u8>,
}

impl GrayscaleBuffer {
    pub fn new(width: u32, height: u32, samples: Vec<u8>) -> Result<Self, BufferSizeError> {
        let expected = expected_len(width, height, 1);
        if samples.len() != expected {
            return Err(BufferSizeError {
                width,
                height,
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            samples,
        })
    }

    /// Builds a buffer where every pixel has the same intensity.
    pub fn filled(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            samples: vec![value; expected_len(width, height, 1)],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    pub fn pixel_count(&self) -> usize {
        self.samples.len()
    }
}

impl fmt::Debug for GrayscaleBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrayscaleBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("samples", &self.samples.len())
            .finish()
    }
}

/// Engine channel conventions supported by the packer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PackLayout {
    /// RGB = (AO, Roughness, Metallic).
    Unreal,
    /// RGBA = (Metallic, AO, 255, 255 - Roughness).
    Unity,
}

impl PackLayout {
    /// Fixed processing order when several targets are requested.
    pub const ALL: [PackLayout; 2] = [PackLayout::Unreal, PackLayout::Unity];

    pub fn channel_count(self) -> usize {
        match self {
            PackLayout::Unreal => 3,
            PackLayout::Unity => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PackLayout::Unreal => "unreal",
            PackLayout::Unity => "unity",
        }
    }

    /// Encodes one pixel. Only the first `channel_count` entries are meaningful.
    #[inline]
    pub fn texel(self, ao: u8, roughness: u8, metallic: u8) -> [u8; 4] {
        match self {
            PackLayout::Unreal => [ao, roughness, metallic, 0],
            // Unity reads smoothness from alpha and ignores blue.
            PackLayout::Unity => [metallic, ao, u8::MAX, u8::MAX - roughness],
        }
    }
}

impl fmt::Display for PackLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct PackedBuffer {
    width: u32,
    height: u32,
    layout: PackLayout,
    samples: Vec<u8>,
}

impl PackedBuffer {
    pub fn new(
        width: u32,
        height: u32,
        layout: PackLayout,
        samples: Vec<u8>,
    ) -> Result<Self, BufferSizeError> {
        let expected = expected_len(width, height, layout.channel_count());
        if samples.len() != expected {
            return Err(BufferSizeError {
                width,
                height,
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            width,
            height,
            layout,
            samples,
        })
    }

    /// Caller guarantees `samples.len() == width * height * channels`.
    pub(crate) fn from_parts(width: u32, height: u32, layout: PackLayout, samples: Vec<u8>) -> Self {
        debug_assert_eq!(
            samples.len(),
            expected_len(width, height, layout.channel_count())
        );
        Self {
            width,
            height,
            layout,
            samples,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> PackLayout {
        self.layout
    }

    pub fn channel_count(&self) -> usize {
        self.layout.channel_count()
    }

    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Returns the interleaved samples of pixel `index`.
    pub fn pixel(&self, index: usize) -> Option<&[u8]> {
        let channels = self.channel_count();
        let start = index.checked_mul(channels)?;
        self.samples.get(start..start + channels)
    }
}

impl fmt::Debug for PackedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PackedBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .field("samples", &self.samples.len())
            .finish()
    }
}
