//! The live loop: one task multiplexing capture ticks, session events,
//! operator commands and shutdown.

use std::time::Duration;

use anyhow::Result;
use inference_common::classification::ClassificationResult;
use inference_common::summary::SummaryView;
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::connection::{dispatch, ConnectionManager, SessionObserver};
use crate::pacing::ResultPairing;
use crate::present::Presenter;
use crate::sampler::FrameSampler;
use crate::source::FrameSource;
use crate::tui::Dashboard;

const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    ToggleCapture,
    Start,
    Stop,
    Quit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub frames_sent: u64,
    pub results_received: u64,
    /// Results that did not match the outstanding frame and were dropped.
    pub stale_results: u64,
    pub capture_failures: u64,
}

pub struct LiveSession {
    connection: ConnectionManager,
    sampler: FrameSampler,
    source: Box<dyn FrameSource>,
    presenter: Presenter,
    stats: SessionStats,
    last_view: Option<SummaryView>,
    dashboard: Option<Dashboard>,
}

impl LiveSession {
    pub fn new(config: &ClientConfig, source: Box<dyn FrameSource>, presenter: Presenter) -> Self {
        Self {
            connection: ConnectionManager::new(config.websocket_url(), config.reconnect_delay()),
            sampler: FrameSampler::new(
                config.capture_interval(),
                config.jpeg_quality,
                config.result_timeout(),
            ),
            source,
            presenter,
            stats: SessionStats::default(),
            last_view: None,
            dashboard: None,
        }
    }

    pub fn from_config(config: &ClientConfig, source: Box<dyn FrameSource>) -> Result<Self> {
        let presenter = Presenter::new(
            config.font_path.as_deref(),
            config.overlay_output.clone(),
            config.result_log.as_deref(),
        )?;
        Ok(Self::new(config, source, presenter))
    }

    pub fn with_dashboard(mut self, dashboard: Dashboard) -> Self {
        self.dashboard = Some(dashboard);
        self
    }

    pub fn session_id(&self) -> String {
        self.connection.session_id().to_string()
    }

    pub fn endpoint(&self) -> &str {
        self.connection.endpoint()
    }

    pub fn source_name(&self) -> String {
        self.source.describe()
    }

    /// Connects, starts capture and runs until `Quit` or Ctrl-C.
    pub async fn run(mut self, mut commands: mpsc::Receiver<Command>) -> Result<SessionStats> {
        info!(
            "Session {} streaming {} to {}",
            self.session_id(),
            self.source.describe(),
            self.connection.endpoint()
        );
        self.connection.connect();
        self.sampler.start();

        let mut redraw = time::interval(REDRAW_INTERVAL);
        redraw.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut commands_open = true;

        loop {
            tokio::select! {
                _ = self.sampler.tick() => self.on_capture_tick(),
                event = self.connection.next_event() => dispatch(event, &mut self),
                command = commands.recv(), if commands_open => match command {
                    Some(Command::Quit) => break,
                    Some(command) => self.on_command(command),
                    None => commands_open = false,
                },
                _ = redraw.tick(), if self.dashboard.is_some() => self.redraw(),
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted");
                    break;
                }
            }
        }

        self.sampler.stop();
        self.connection.teardown();
        // restore the terminal before the caller prints anything
        self.dashboard = None;
        info!("Session ended: {:?}", self.stats);
        Ok(self.stats)
    }

    fn on_capture_tick(&mut self) {
        let connected = self.connection.is_connected();
        match self.sampler.on_tick(self.source.as_mut(), connected) {
            Ok(Some(frame)) => {
                if self.connection.send(&frame) {
                    self.stats.frames_sent += 1;
                    debug!("Sent frame {} ({} bytes)", frame.seq, frame.jpeg.len());
                } else {
                    self.sampler.abort_submission(frame.seq);
                }
            }
            Ok(None) => {}
            Err(e) => {
                self.stats.capture_failures += 1;
                warn!("{e:#}");
            }
        }
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::ToggleCapture if self.sampler.is_active() => self.sampler.stop(),
            Command::ToggleCapture | Command::Start => self.sampler.start(),
            Command::Stop => self.sampler.stop(),
            Command::Quit => {}
        }
        self.redraw();
    }

    fn redraw(&mut self) {
        let Some(dashboard) = self.dashboard.as_mut() else {
            return;
        };
        dashboard.state.connectivity = self.connection.connectivity();
        dashboard.state.pacing = self.sampler.state();
        dashboard.state.stats = self.stats;
        if let Err(e) = dashboard.draw() {
            warn!("Failed to draw dashboard: {e}");
        }
    }
}

impl SessionObserver for LiveSession {
    fn on_connected(&mut self) {
        info!("Connected to classification service");
    }

    fn on_disconnected(&mut self) {
        warn!("Disconnected from classification service");
        // the service answers on the socket that carried the frame
        if let Some(seq) = self.sampler.abandon_in_flight() {
            debug!("Frame {seq} lost with the connection");
        }
    }

    fn on_result(&mut self, result: ClassificationResult) {
        self.stats.results_received += 1;
        let result = match self.sampler.on_result(result.seq()) {
            ResultPairing::Completed { seq } => result.with_seq(seq),
            ResultPairing::Unsolicited => result,
            ResultPairing::Stale { expected, got } => {
                self.stats.stale_results += 1;
                debug!("Dropping stale result for frame {got} (expected {expected:?})");
                return;
            }
        };

        let session_id = self.connection.session_id().to_string();
        let view = self
            .presenter
            .present(&session_id, &result, Some(self.sampler.raster()));
        if let Some(dashboard) = self.dashboard.as_mut() {
            dashboard.state.set_summary(view.clone());
        }
        self.last_view = Some(view);
    }
}
