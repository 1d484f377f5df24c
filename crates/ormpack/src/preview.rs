//! Preview textures for the three source maps and the packed ORM result.
//!
//! The store never talks to a graphics API directly. Uploads go through a
//! `TextureUploader`, and every uploaded texture is owned by a
//! `TextureHandle` that releases it when dropped, so replacing or clearing a
//! slot frees the previous textures without manual bookkeeping.
//!
//! Each entry carries the full image plus three single-channel textures
//! (red, green, blue) so a viewer can isolate one packed channel at a time.
//! Entries are built completely before they are swapped into the store; a
//! reader never observes a half-uploaded entry.
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info};

use crate::buffer::PackedBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    R8,
    Rgb8,
    Rgba8,
}

impl TextureFormat {
    pub fn channel_count(self) -> usize {
        match self {
            TextureFormat::R8 => 1,
            TextureFormat::Rgb8 => 3,
            TextureFormat::Rgba8 => 4,
        }
    }

    fn from_channel_count(channels: usize) -> Option<Self> {
        match channels {
            1 => Some(TextureFormat::R8),
            3 => Some(TextureFormat::Rgb8),
            4 => Some(TextureFormat::Rgba8),
            _ => None,
        }
    }
}

/// Upload-ready pixel data.
#[derive(Clone, PartialEq, Eq)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub pixels: Vec<u8>,
}

impl fmt::Debug for TextureImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextureImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("pixels", &self.pixels.len())
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("texture upload rejected: {0}")]
    Rejected(String),
}

/// Capability to place pixel data on the GPU (or wherever previews live).
pub trait TextureUploader: Send + Sync {
    fn upload(&self, image: &TextureImage) -> Result<TextureId, UploadError>;
    fn release(&self, id: TextureId);
}

/// Owns one uploaded texture and releases it on drop.
pub struct TextureHandle {
    id: TextureId,
    uploader: Arc<dyn TextureUploader>,
}

impl TextureHandle {
    pub fn upload(
        uploader: &Arc<dyn TextureUploader>,
        image: &TextureImage,
    ) -> Result<Self, UploadError> {
        let id = uploader.upload(image)?;
        Ok(Self {
            id,
            uploader: Arc::clone(uploader),
        })
    }

    pub fn id(&self) -> TextureId {
        self.id
    }
}

impl fmt::Debug for TextureHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TextureHandle").field(&self.id.0).finish()
    }
}

impl Drop for TextureHandle {
    fn drop(&mut self) {
        self.uploader.release(self.id);
    }
}

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("preview source not found at {}", .0.display())]
    Missing(PathBuf),

    #[error("failed to decode preview {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("cannot split a {0}-channel image into colour channels")]
    UnsupportedChannels(usize),

    #[error("pixel data does not match {width}x{height}")]
    SizeMismatch { width: u32, height: u32 },

    #[error(transparent)]
    Upload(#[from] UploadError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PreviewSlot {
    Ao,
    Roughness,
    Metallic,
    Orm,
}

impl PreviewSlot {
    pub const ALL: [PreviewSlot; 4] = [
        PreviewSlot::Ao,
        PreviewSlot::Roughness,
        PreviewSlot::Metallic,
        PreviewSlot::Orm,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PreviewSlot::Ao => "ao",
            PreviewSlot::Roughness => "roughness",
            PreviewSlot::Metallic => "metallic",
            PreviewSlot::Orm => "orm",
        }
    }
}

/// Which texture of an entry a viewer wants to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelView {
    #[default]
    All,
    Red,
    Green,
    Blue,
}

#[derive(Debug)]
pub struct PreviewEntry {
    source: PathBuf,
    width: u32,
    height: u32,
    full: TextureHandle,
    red: TextureHandle,
    green: TextureHandle,
    blue: TextureHandle,
}

impl PreviewEntry {
    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn texture(&self, view: ChannelView) -> TextureId {
        match view {
            ChannelView::All => self.full.id(),
            ChannelView::Red => self.red.id(),
            ChannelView::Green => self.green.id(),
            ChannelView::Blue => self.blue.id(),
        }
    }
}

/// Snapshot of an entry's metadata, safe to hand to another thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewInfo {
    pub source: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Splits interleaved 3- or 4-channel pixels into red, green and blue planes.
pub fn split_channels(pixels: &[u8], channels: usize) -> Result<[Vec<u8>; 3], PreviewError> {
    if !matches!(channels, 3 | 4) {
        return Err(PreviewError::UnsupportedChannels(channels));
    }
    let count = pixels.len() / channels;
    let mut planes = [
        Vec::with_capacity(count),
        Vec::with_capacity(count),
        Vec::with_capacity(count),
    ];
    for texel in pixels.chunks_exact(channels) {
        planes[0].push(texel[0]);
        planes[1].push(texel[1]);
        planes[2].push(texel[2]);
    }
    Ok(planes)
}

pub struct PreviewStore {
    uploader: Arc<dyn TextureUploader>,
    entries: Mutex<HashMap<PreviewSlot, PreviewEntry>>,
}

impl PreviewStore {
    pub fn new(uploader: Arc<dyn TextureUploader>) -> Self {
        Self {
            uploader,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Decodes `path` as RGB and replaces the slot's textures.
    pub fn set_from_file(&self, slot: PreviewSlot, path: &Path) -> Result<(), PreviewError> {
        if !path.is_file() {
            return Err(PreviewError::Missing(path.to_path_buf()));
        }
        let rgb = image::open(path)
            .map_err(|source| PreviewError::Decode {
                path: path.to_path_buf(),
                source,
            })?
            .into_rgb8();
        let (width, height) = rgb.dimensions();
        let entry = self.build_entry(path, width, height, 3, rgb.into_raw())?;
        self.install(slot, entry);
        Ok(())
    }

    /// Replaces the slot's textures with a freshly packed buffer.
    pub fn set_from_buffer(
        &self,
        slot: PreviewSlot,
        buffer: &PackedBuffer,
        source: &Path,
    ) -> Result<(), PreviewError> {
        let entry = self.build_entry(
            source,
            buffer.width(),
            buffer.height(),
            buffer.channel_count(),
            buffer.samples().to_vec(),
        )?;
        self.install(slot, entry);
        Ok(())
    }

    pub fn texture(&self, slot: PreviewSlot, view: ChannelView) -> Option<TextureId> {
        self.lock().get(&slot).map(|entry| entry.texture(view))
    }

    pub fn info(&self, slot: PreviewSlot) -> Option<PreviewInfo> {
        self.lock().get(&slot).map(|entry| PreviewInfo {
            source: entry.source.clone(),
            width: entry.width,
            height: entry.height,
        })
    }

    pub fn contains(&self, slot: PreviewSlot) -> bool {
        self.lock().contains_key(&slot)
    }

    pub fn remove(&self, slot: PreviewSlot) -> bool {
        let removed = self.lock().remove(&slot);
        removed.is_some()
    }

    /// Releases every texture held by the store.
    pub fn clear(&self) {
        let drained: Vec<PreviewEntry> = self.lock().drain().map(|(_, entry)| entry).collect();
        if !drained.is_empty() {
            debug!(entries = drained.len(), "released preview textures");
        }
    }

    fn build_entry(
        &self,
        source: &Path,
        width: u32,
        height: u32,
        channels: usize,
        pixels: Vec<u8>,
    ) -> Result<PreviewEntry, PreviewError> {
        let format = TextureFormat::from_channel_count(channels)
            .ok_or(PreviewError::UnsupportedChannels(channels))?;
        if pixels.len() != width as usize * height as usize * channels {
            return Err(PreviewError::SizeMismatch { width, height });
        }
        let [red, green, blue] = split_channels(&pixels, channels)?;

        let full = TextureHandle::upload(
            &self.uploader,
            &TextureImage {
                width,
                height,
                format,
                pixels,
            },
        )?;
        let upload_plane = |plane: Vec<u8>| {
            TextureHandle::upload(
                &self.uploader,
                &TextureImage {
                    width,
                    height,
                    format: TextureFormat::R8,
                    pixels: plane,
                },
            )
        };

        Ok(PreviewEntry {
            source: source.to_path_buf(),
            width,
            height,
            full,
            red: upload_plane(red)?,
            green: upload_plane(green)?,
            blue: upload_plane(blue)?,
        })
    }

    fn install(&self, slot: PreviewSlot, entry: PreviewEntry) {
        info!(
            slot = slot.label(),
            source = %entry.source.display(),
            width = entry.width,
            height = entry.height,
            "preview updated"
        );
        let previous = self.lock().insert(slot, entry);
        // Released outside the lock.
        drop(previous);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<PreviewSlot, PreviewEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PreviewStore {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Keeps uploaded textures in process memory. Used for headless runs and to
/// read channel views back out of the store.
#[derive(Default)]
pub struct MemoryTextures {
    next_id: AtomicU64,
    textures: Mutex<HashMap<TextureId, TextureImage>>,
}

impl MemoryTextures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn live_count(&self) -> usize {
        self.lock().len()
    }

    pub fn image(&self, id: TextureId) -> Option<TextureImage> {
        self.lock().get(&id).cloned()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TextureId, TextureImage>> {
        self.textures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl TextureUploader for MemoryTextures {
    fn upload(&self, image: &TextureImage) -> Result<TextureId, UploadError> {
        if image.width == 0 || image.height == 0 {
            return Err(UploadError::Rejected("texture has zero area".into()));
        }
        let expected =
            image.width as usize * image.height as usize * image.format.channel_count();
        if image.pixels.len() != expected {
            return Err(UploadError::Rejected(format!(
                "expected {expected} bytes, got {}",
                image.pixels.len()
            )));
        }
        let id = TextureId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        self.lock().insert(id, image.clone());
        Ok(id)
    }

    fn release(&self, id: TextureId) {
        self.lock().remove(&id);
    }
}
