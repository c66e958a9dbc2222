//! Frame sampler: a fixed-cadence timer that snapshots the source into an
//! off-screen raster and encodes it, subject to the pacing gate.

use std::time::Duration;

use anyhow::{Context, Result};
use image::RgbImage;
use inference_common::frame_meta::EncodedFrame;
use inference_common::video_meta::VideoMeta;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{info, trace};

use crate::pacing::{PacingGate, PacingState, ResultPairing, TickDecision};
use crate::source::FrameSource;

pub struct FrameSampler {
    gate: PacingGate,
    interval: Duration,
    ticker: Option<Interval>,
    raster: RgbImage,
    jpeg_quality: u8,
}

impl FrameSampler {
    pub fn new(interval: Duration, jpeg_quality: u8, result_timeout: Option<Duration>) -> Self {
        Self {
            gate: PacingGate::new(result_timeout),
            interval,
            ticker: None,
            raster: RgbImage::new(0, 0),
            jpeg_quality,
        }
    }

    /// Begins periodic capture. A running timer is never duplicated.
    pub fn start(&mut self) {
        self.gate.start();
        if self.ticker.is_none() {
            let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
            // a late tick is dropped, never caught up
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            self.ticker = Some(ticker);
            info!("Capture started, every {:?}", self.interval);
        }
    }

    /// Cancels future ticks. An outstanding request still completes.
    pub fn stop(&mut self) {
        self.gate.stop();
        if self.ticker.take().is_some() {
            info!("Capture stopped");
        }
    }

    pub fn is_active(&self) -> bool {
        self.gate.is_active()
    }

    pub fn state(&self) -> PacingState {
        self.gate.state()
    }

    /// The most recently captured raster.
    pub fn raster(&self) -> &RgbImage {
        &self.raster
    }

    /// Resolves on the next capture tick; pending forever while stopped.
    pub async fn tick(&mut self) {
        match self.ticker.as_mut() {
            Some(ticker) => {
                ticker.tick().await;
            }
            None => std::future::pending().await,
        }
    }

    /// Handles one capture tick. Returns the frame to send, or `None` when the
    /// tick is skipped. A failed capture or encode releases the gate.
    pub fn on_tick(
        &mut self,
        source: &mut dyn FrameSource,
        connected: bool,
    ) -> Result<Option<EncodedFrame>> {
        let dims = source.dimensions();
        let seq = match self.gate.tick(connected, dims.is_valid(), Instant::now()) {
            TickDecision::Submit { seq } => seq,
            TickDecision::Skip(reason) => {
                trace!("Tick skipped: {reason:?}");
                return Ok(None);
            }
        };

        match self.capture(source, dims, seq) {
            Ok(frame) => Ok(Some(frame)),
            Err(e) => {
                self.gate.abort_submission(seq);
                Err(e)
            }
        }
    }

    fn capture(
        &mut self,
        source: &mut dyn FrameSource,
        dims: VideoMeta,
        seq: u64,
    ) -> Result<EncodedFrame> {
        if VideoMeta::of(&self.raster) != dims {
            self.raster = RgbImage::new(dims.width, dims.height);
        }
        source
            .capture_into(&mut self.raster)
            .with_context(|| format!("Failed to capture frame {seq} from {}", source.describe()))?;
        EncodedFrame::encode(seq, &self.raster, self.jpeg_quality)
    }

    pub fn on_result(&mut self, seq: Option<u64>) -> ResultPairing {
        self.gate.on_result(seq)
    }

    /// Releases the gate for a frame the connection refused.
    pub fn abort_submission(&mut self, seq: u64) -> bool {
        self.gate.abort_submission(seq)
    }

    /// Drops the outstanding request after the session lost its transport.
    pub fn abandon_in_flight(&mut self) -> Option<u64> {
        self.gate.abandon()
    }
}
