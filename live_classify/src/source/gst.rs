//! Live capture through a gstreamer pipeline ending in an appsink.

use anyhow::{Context, Result};
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use image::RgbImage;
use inference_common::video_meta::VideoMeta;
use tracing::{debug, info};

use super::FrameSource;

const RGB_BYTES_PER_PIXEL: usize = 3;

/// Keeps the most recent decoded frame; older ones are dropped by the appsink.
pub struct GstSource {
    name: String,
    pipeline: gst::Pipeline,
    appsink: gst_app::AppSink,
    latest: Option<(gst_video::VideoInfo, gst::Buffer)>,
}

impl GstSource {
    pub fn webcam(device: &str) -> Result<Self> {
        // The device lands in a pipeline description; keep it a plain path.
        anyhow::ensure!(
            device.starts_with("/dev/video") && !device.contains(['!', ' ', '"']),
            "Invalid capture device {device:?}"
        );
        let description = format!(
            "v4l2src device={device} ! videoconvert ! video/x-raw,format=RGB ! \
             appsink name=sink max-buffers=1 drop=true sync=false"
        );
        Self::launch(device, &description)
    }

    pub fn test_pattern() -> Result<Self> {
        let description = "videotestsrc pattern=ball is-live=true ! \
             video/x-raw,width=640,height=480,framerate=30/1 ! \
             videoconvert ! video/x-raw,format=RGB ! \
             appsink name=sink max-buffers=1 drop=true sync=false";
        Self::launch("videotestsrc", description)
    }

    fn launch(name: &str, description: &str) -> Result<Self> {
        gst::init().context("Failed to initialize gstreamer")?;
        debug!("Pipeline: {description}");

        let pipeline = gst::parse::launch(description)
            .with_context(|| format!("Failed to build pipeline for {name}"))?
            .downcast::<gst::Pipeline>()
            .map_err(|_| anyhow::anyhow!("Pipeline for {name} is not a gst::Pipeline"))?;
        let appsink = pipeline
            .by_name("sink")
            .and_then(|e| e.dynamic_cast::<gst_app::AppSink>().ok())
            .context("Failed to get appsink")?;

        pipeline
            .set_state(gst::State::Playing)
            .with_context(|| format!("Failed to start pipeline for {name}"))?;
        info!("Started gst pipeline for {name}");

        Ok(Self {
            name: name.to_string(),
            pipeline,
            appsink,
            latest: None,
        })
    }

    /// Drains whatever the appsink has buffered, keeping the newest sample.
    fn poll(&mut self) {
        while let Some(sample) = self.appsink.try_pull_sample(gst::ClockTime::ZERO) {
            let info = sample.caps().and_then(|caps| gst_video::VideoInfo::from_caps(caps).ok());
            match (info, sample.buffer_owned()) {
                (Some(info), Some(buffer)) => self.latest = Some((info, buffer)),
                _ => debug!("Skipping sample without caps or buffer"),
            }
        }
    }
}

impl FrameSource for GstSource {
    fn dimensions(&mut self) -> VideoMeta {
        self.poll();
        self.latest
            .as_ref()
            .map(|(info, _)| VideoMeta::new(info.width(), info.height()))
            .unwrap_or_default()
    }

    fn capture_into(&mut self, raster: &mut RgbImage) -> Result<()> {
        let (info, buffer) = self.latest.as_ref().context("No frame decoded yet")?;
        let (width, height) = (info.width(), info.height());
        if raster.dimensions() != (width, height) {
            *raster = RgbImage::new(width, height);
        }

        let map = buffer.map_readable().context("Failed to map frame buffer")?;
        let stride = info.stride()[0] as usize;
        let row_bytes = width as usize * RGB_BYTES_PER_PIXEL;
        for (y, row) in raster.chunks_exact_mut(row_bytes).enumerate() {
            let start = y * stride;
            let src = map
                .get(start..start + row_bytes)
                .context("Frame buffer shorter than its caps")?;
            row.copy_from_slice(src);
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}

impl Drop for GstSource {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}
