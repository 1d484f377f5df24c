//! ORM texture packing.
//!
//! Three grayscale maps (ambient occlusion, roughness, metallic) are packed
//! into engine-specific textures:
//!
//! ```text
//!   ao.png ─┐                       ┌─▶ pack_unreal ─▶ orm_unreal.png (R=AO, G=Rough, B=Metal)
//!   rough ──┼─▶ load_grayscale ×3 ──┤
//!   metal ──┘    check_dimensions   └─▶ pack_unity  ─▶ orm_unity.png  (R=Metal, G=AO, B=255, A=255-Rough)
//!                                              │
//!                                              └─▶ PreviewStore (ORM slot, per-channel views)
//! ```
//!
//! `PackingJob` runs that pipeline once and reports progress through a
//! callback. `JobController` runs at most one job at a time on a background
//! thread and exposes the latest progress for polling.

mod buffer;
mod controller;
mod job;
mod pack;
mod preview;
mod source;
mod writer;

pub use buffer::{BufferSizeError, DimensionMismatch, GrayscaleBuffer, PackLayout, PackedBuffer};
pub use controller::{JobController, JobOutcome, JobState, StartError};
pub use job::{
    PackedOutputs, PackingError, PackingJob, PackingRequest, WrittenOutput, DEFAULT_UNITY_OUTPUT,
    DEFAULT_UNREAL_OUTPUT,
};
pub use pack::{
    check_dimensions, pack_layout, pack_unity, pack_unity_with_progress, pack_unreal,
    pack_unreal_with_progress, progress_interval, PROGRESS_DIVISIONS,
};
pub use preview::{
    split_channels, ChannelView, MemoryTextures, PreviewEntry, PreviewError, PreviewInfo,
    PreviewSlot, PreviewStore, TextureFormat, TextureHandle, TextureId, TextureImage,
    TextureUploader, UploadError,
};
pub use source::{load_grayscale, DecodeError};
pub use writer::{output_format, write_grayscale, write_packed, WriteError};
