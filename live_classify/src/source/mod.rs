//! Frame sources the sampler captures from.

mod still;
#[cfg(feature = "gst")]
mod gst;

use std::path::Path;

use anyhow::Result;
use image::RgbImage;
use inference_common::video_meta::VideoMeta;

#[cfg(feature = "gst")]
pub use gst::GstSource;
pub use still::StillSource;

/// A live video the sampler can snapshot.
pub trait FrameSource: Send {
    /// Native dimensions of the current frame; zero until the source has
    /// produced one.
    fn dimensions(&mut self) -> VideoMeta;

    /// Copies the current frame into `raster`, which the caller has sized to
    /// [`dimensions`](Self::dimensions).
    fn capture_into(&mut self, raster: &mut RgbImage) -> Result<()>;

    fn describe(&self) -> String;
}

/// Resolves a `--source` argument: `videotest`, a `/dev/video*` device, a
/// directory of images, or a single image.
pub fn open_source(locator: &str) -> Result<Box<dyn FrameSource>> {
    if locator == "videotest" || locator.starts_with("/dev/video") {
        return open_live(locator);
    }

    let path = Path::new(locator);
    anyhow::ensure!(path.exists(), "Frame source {locator:?} does not exist");
    let source = if path.is_dir() {
        StillSource::from_dir(path)?
    } else {
        StillSource::from_file(path)?
    };
    Ok(Box::new(source))
}

#[cfg(feature = "gst")]
fn open_live(locator: &str) -> Result<Box<dyn FrameSource>> {
    let source = if locator == "videotest" {
        GstSource::test_pattern()?
    } else {
        GstSource::webcam(locator)?
    };
    Ok(Box::new(source))
}

#[cfg(not(feature = "gst"))]
fn open_live(locator: &str) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!("{locator:?} needs live capture; rebuild with `--features gst`")
}
