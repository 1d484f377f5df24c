//! Pure channel packing. Each pack is a single pass over pixel index; the
//! progress hook fires roughly once per percent of pixels rather than per
//! pixel so it never dominates the loop.
use crate::buffer::{DimensionMismatch, GrayscaleBuffer, PackLayout, PackedBuffer};

/// Number of progress reports a full pass aims for.
pub const PROGRESS_DIVISIONS: usize = 100;

/// Pixel stride between two progress reports for a buffer of `count` pixels.
pub fn progress_interval(count: usize) -> usize {
    count / PROGRESS_DIVISIONS + 1
}

/// Returns the shared `(width, height)` of the three sources.
pub fn check_dimensions(
    ao: &GrayscaleBuffer,
    roughness: &GrayscaleBuffer,
    metallic: &GrayscaleBuffer,
) -> Result<(u32, u32), DimensionMismatch> {
    let dims = ao.dimensions();
    if roughness.dimensions() != dims || metallic.dimensions() != dims {
        return Err(DimensionMismatch {
            ao: dims,
            roughness: roughness.dimensions(),
            metallic: metallic.dimensions(),
        });
    }
    Ok(dims)
}

pub fn pack_unreal(
    ao: &GrayscaleBuffer,
    roughness: &GrayscaleBuffer,
    metallic: &GrayscaleBuffer,
) -> Result<PackedBuffer, DimensionMismatch> {
    pack_unreal_with_progress(ao, roughness, metallic, |_| {})
}

pub fn pack_unreal_with_progress(
    ao: &GrayscaleBuffer,
    roughness: &GrayscaleBuffer,
    metallic: &GrayscaleBuffer,
    on_fraction: impl FnMut(f32),
) -> Result<PackedBuffer, DimensionMismatch> {
    pack_layout(PackLayout::Unreal, ao, roughness, metallic, on_fraction)
}

pub fn pack_unity(
    ao: &GrayscaleBuffer,
    roughness: &GrayscaleBuffer,
    metallic: &GrayscaleBuffer,
) -> Result<PackedBuffer, DimensionMismatch> {
    pack_unity_with_progress(ao, roughness, metallic, |_| {})
}

pub fn pack_unity_with_progress(
    ao: &GrayscaleBuffer,
    roughness: &GrayscaleBuffer,
    metallic: &GrayscaleBuffer,
    on_fraction: impl FnMut(f32),
) -> Result<PackedBuffer, DimensionMismatch> {
    pack_layout(PackLayout::Unity, ao, roughness, metallic, on_fraction)
}

/// Packs the three sources into `layout`, calling `on_fraction` with the
/// share of pixels already processed (in `[0, 1)`).
pub fn pack_layout(
    layout: PackLayout,
    ao: &GrayscaleBuffer,
    roughness: &GrayscaleBuffer,
    metallic: &GrayscaleBuffer,
    mut on_fraction: impl FnMut(f32),
) -> Result<PackedBuffer, DimensionMismatch> {
    let (width, height) = check_dimensions(ao, roughness, metallic)?;
    let count = ao.pixel_count();
    let channels = layout.channel_count();
    let interval = progress_interval(count);

    let mut samples = Vec::with_capacity(count * channels);
    let sources = ao
        .samples()
        .iter()
        .zip(roughness.samples())
        .zip(metallic.samples());
    for (index, ((&a, &r), &m)) in sources.enumerate() {
        let texel = layout.texel(a, r, m);
        samples.extend_from_slice(&texel[..channels]);

        if index % interval == 0 {
            on_fraction(index as f32 / count as f32);
        }
    }

    Ok(PackedBuffer::from_parts(width, height, layout, samples))
}
