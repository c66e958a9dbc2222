use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use image::RgbImage;
use inference_common::video_meta::VideoMeta;
use tracing::info;

use super::FrameSource;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Replays decoded images as a video, one image per capture, looping.
pub struct StillSource {
    name: String,
    frames: Vec<RgbImage>,
    next: usize,
}

impl StillSource {
    pub fn from_file(path: &Path) -> Result<Self> {
        let frame = load(path)?;
        Ok(Self::from_images(path.display().to_string(), vec![frame]))
    }

    /// Loads every image in `dir`, ordered by file name.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to list {dir:?}"))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .map(str::to_ascii_lowercase)
                    .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
            })
            .collect();
        paths.sort();
        anyhow::ensure!(!paths.is_empty(), "No images found in {dir:?}");

        let frames = paths.iter().map(|p| load(p)).collect::<Result<Vec<_>>>()?;
        info!("Loaded {} frames from {dir:?}", frames.len());
        Ok(Self::from_images(dir.display().to_string(), frames))
    }

    pub fn from_images(name: impl Into<String>, frames: Vec<RgbImage>) -> Self {
        Self {
            name: name.into(),
            frames,
            next: 0,
        }
    }
}

fn load(path: &Path) -> Result<RgbImage> {
    Ok(image::open(path)
        .with_context(|| format!("Failed to open image {path:?}"))?
        .to_rgb8())
}

impl FrameSource for StillSource {
    fn dimensions(&mut self) -> VideoMeta {
        self.frames
            .get(self.next)
            .map(VideoMeta::of)
            .unwrap_or_default()
    }

    fn capture_into(&mut self, raster: &mut RgbImage) -> Result<()> {
        let frame = self.frames.get(self.next).context("Source has no frames")?;
        raster.clone_from(frame);
        self.next = (self.next + 1) % self.frames.len();
        Ok(())
    }

    fn describe(&self) -> String {
        format!("{} ({} frames)", self.name, self.frames.len())
    }
}
