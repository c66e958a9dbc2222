use std::io::Cursor;

use anyhow::{Context, Result};
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;
use image::RgbImage;

use crate::video_meta::VideoMeta;

const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// One captured frame, JPEG-encoded and tagged with its submission sequence
/// number. Lives for a single pacing cycle.
#[derive(Debug, Clone)]
pub struct EncodedFrame {
    pub seq: u64,
    pub dims: VideoMeta,
    pub jpeg: Vec<u8>,
}

impl EncodedFrame {
    /// Lossy-encodes `raster` at the given JPEG quality (1-100).
    pub fn encode(seq: u64, raster: &RgbImage, quality: u8) -> Result<Self> {
        let dims = VideoMeta::of(raster);
        anyhow::ensure!(dims.is_valid(), "refusing to encode a zero-sized frame");

        let mut buf = Cursor::new(Vec::new());
        let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
        raster
            .write_with_encoder(encoder)
            .with_context(|| format!("Failed to encode frame #{seq} as jpeg"))?;

        Ok(Self {
            seq,
            dims,
            jpeg: buf.into_inner(),
        })
    }

    /// `data:image/jpeg;base64,...` form carried in the outbound `frame` event.
    pub fn data_url(&self) -> String {
        let mut url = String::with_capacity(DATA_URL_PREFIX.len() + self.jpeg.len() * 4 / 3 + 4);
        url.push_str(DATA_URL_PREFIX);
        base64::engine::general_purpose::STANDARD.encode_string(&self.jpeg, &mut url);
        url
    }
}

/// Decodes the payload of an image data URL. A bare base64 string (no
/// `data:` header) is accepted as well.
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let payload = if url.starts_with("data:image") {
        url.split_once(',')
            .map(|(_, payload)| payload)
            .context("Malformed data url: missing ',' separator")?
    } else {
        url
    };
    base64::engine::general_purpose::STANDARD
        .decode(payload)
        .context("Malformed data url: invalid base64 payload")
}
