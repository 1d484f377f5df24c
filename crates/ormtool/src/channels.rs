use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use ormpack::{write_grayscale, ChannelView, MemoryTextures, PreviewSlot, PreviewStore};
use tracing::info;

use crate::cli::ChannelsArgs;

const VIEWS: [(ChannelView, &str); 3] = [
    (ChannelView::Red, "r"),
    (ChannelView::Green, "g"),
    (ChannelView::Blue, "b"),
];

/// Writes the isolated red, green and blue views of an image as grayscale PNGs.
pub fn run_channels(args: ChannelsArgs) -> Result<Vec<PathBuf>> {
    let textures = Arc::new(MemoryTextures::new());
    let store = PreviewStore::new(textures.clone());
    store
        .set_from_file(PreviewSlot::Orm, &args.image)
        .with_context(|| format!("failed to load {}", args.image.display()))?;

    let stem = args
        .image
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| anyhow!("{} has no usable file name", args.image.display()))?;
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;

    let mut written = Vec::with_capacity(VIEWS.len());
    for (view, suffix) in VIEWS {
        let image = store
            .texture(PreviewSlot::Orm, view)
            .and_then(|id| textures.image(id))
            .ok_or_else(|| anyhow!("preview texture for {view:?} is missing"))?;
        let path = args.out_dir.join(format!("{stem}_{suffix}.png"));
        write_grayscale(&image.pixels, image.width, image.height, &path)?;
        written.push(path);
    }
    info!(image = %args.image.display(), count = written.len(), "exported channel views");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn splits_rgb_image_into_three_planes() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("orm.png");
        RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]))
            .save(&source)
            .unwrap();

        let written = run_channels(ChannelsArgs {
            image: source,
            out_dir: temp.path().join("views"),
        })
        .unwrap();

        assert_eq!(written.len(), 3);
        for (path, expected) in written.iter().zip([10u8, 20, 30]) {
            let plane = image::open(path).unwrap().to_luma8();
            assert_eq!(plane.dimensions(), (2, 2));
            assert!(plane.pixels().all(|p| p.0[0] == expected));
        }
        assert!(written[0].ends_with("views/orm_r.png"));
    }

    #[test]
    fn grayscale_source_yields_identical_planes() {
        let temp = tempfile::tempdir().unwrap();
        let source = temp.path().join("gray.png");
        image::GrayImage::from_pixel(3, 1, image::Luma([77]))
            .save(&source)
            .unwrap();

        let written = run_channels(ChannelsArgs {
            image: source,
            out_dir: temp.path().to_path_buf(),
        })
        .unwrap();

        for path in &written {
            let plane = image::open(path).unwrap().to_luma8();
            assert!(plane.pixels().all(|p| p.0[0] == 77));
        }
    }

    #[test]
    fn missing_image_is_an_error() {
        let temp = tempfile::tempdir().unwrap();
        let result = run_channels(ChannelsArgs {
            image: temp.path().join("absent.png"),
            out_dir: temp.path().to_path_buf(),
        });
        assert!(result.is_err());
        assert!(!temp.path().join("absent_r.png").exists());
    }
}
