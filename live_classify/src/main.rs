use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use inference_common::class_colors::COLOR_POLICY;
use inference_common::summary::SummaryView;
use live_classify::config::ClientConfig;
use live_classify::present::{self, Presenter};
use live_classify::session::LiveSession;
use live_classify::source::open_source;
use live_classify::tui::{app::DashboardState, spawn_key_reader, Dashboard};
use live_classify::upload::UploadClient;
use tokio::sync::mpsc;
use tracing_subscriber::prelude::*;

const DEFAULT_LOG_FILTER: &str = "warn,live_classify=info,inference_common=info";
const DASHBOARD_LOG_FILE: &str = "live_classify.log";

#[derive(Debug, Parser)]
#[command(name = "live-classify", version, about = "Real-time object classification client")]
pub struct Args {
    /// Configuration file (TOML). `live_classify.toml` is read when present.
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Classification service origin, e.g. `http://localhost:5000`.
    #[arg(long, short)]
    server: Option<String>,
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Subcommand)]
enum Mode {
    /// Stream frames from a live source and render results as they arrive.
    Live {
        /// Image file, directory of images, "videotest", or a device like
        /// "/dev/video0" (the last two need the `gst` feature).
        #[arg(long, default_value = "videotest")]
        source: String,
        /// Show the terminal dashboard.
        #[arg(long, action, default_value = "false")]
        tui: bool,
        /// Capture interval in milliseconds.
        #[arg(long)]
        interval_ms: Option<u64>,
        /// Write the annotated latest frame here after every result.
        #[arg(long)]
        overlay_out: Option<PathBuf>,
        /// Append every result to this JSON-lines file.
        #[arg(long)]
        result_log: Option<PathBuf>,
    },
    /// Classify one stored image over HTTP and write `<image>.out.jpg`.
    Upload { image: PathBuf },
    /// Query the service health endpoint.
    Health,
}

fn init_logging(log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());

    let (stdout_layer, file_layer) = match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {path:?}"))?;
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file));
            (None, Some(layer))
        }
        None => (Some(tracing_subscriber::fmt::layer()), None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = ClientConfig::load(args.config.as_deref())?;
    if let Some(server) = args.server {
        config.server_url = server;
    }
    if let Mode::Live {
        interval_ms,
        overlay_out,
        result_log,
        ..
    } = &args.mode
    {
        if let Some(ms) = interval_ms {
            config.capture_interval_ms = *ms;
        }
        if overlay_out.is_some() {
            config.overlay_output = overlay_out.clone();
        }
        if result_log.is_some() {
            config.result_log = result_log.clone();
        }
    }
    config.validate()?;

    // The dashboard owns the terminal, so logs must go elsewhere.
    let dashboard = matches!(args.mode, Mode::Live { tui: true, .. });
    let log_file = match (&config.log_file, dashboard) {
        (Some(path), _) => Some(path.clone()),
        (None, true) => Some(PathBuf::from(DASHBOARD_LOG_FILE)),
        (None, false) => None,
    };
    init_logging(log_file.as_deref())?;
    tracing::debug!("{config:?}");

    match args.mode {
        Mode::Live { source, tui, .. } => run_live(&config, &source, tui).await,
        Mode::Upload { image } => run_upload(&config, &image).await,
        Mode::Health => {
            let health = UploadClient::new(&config).check_health().await?;
            println!(
                "{}: status={} model_loaded={} device={}",
                config.server_url, health.status, health.model_loaded, health.device
            );
            Ok(())
        }
    }
}

async fn run_live(config: &ClientConfig, source: &str, tui: bool) -> anyhow::Result<()> {
    let source = open_source(source)?;
    let mut session = LiveSession::from_config(config, source)?;

    let (commands, commands_rx) = mpsc::channel(16);
    if tui {
        let state =
            DashboardState::new(session.endpoint(), session.session_id(), session.source_name());
        session = session.with_dashboard(Dashboard::enter(state)?);
        spawn_key_reader(commands);
    } else {
        drop(commands);
    }

    let stats = session.run(commands_rx).await?;
    println!(
        "frames sent: {}, results: {}, stale: {}, capture failures: {}",
        stats.frames_sent, stats.results_received, stats.stale_results, stats.capture_failures
    );
    Ok(())
}

async fn run_upload(config: &ClientConfig, path: &Path) -> anyhow::Result<()> {
    let result = UploadClient::new(config).classify(path).await;
    let view = SummaryView::from_result(&result, &COLOR_POLICY);
    println!("{}", view.to_text());

    let frame = match image::open(path) {
        Ok(frame) => frame.to_rgb8(),
        Err(e) => {
            tracing::warn!("Not writing an annotated copy of {path:?}: {e}");
            return Ok(());
        }
    };
    let mut presenter = Presenter::new(config.font_path.as_deref(), None, None)?;
    let annotated = presenter.annotate(&result, &frame);
    let out = path.with_extension("out.jpg");
    present::save(&annotated, &out)?;
    tracing::info!("Wrote annotated image to {out:?}");
    Ok(())
}
