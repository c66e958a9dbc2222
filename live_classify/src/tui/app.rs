use chrono::{DateTime, Local};
use inference_common::summary::SummaryView;

use crate::connection::Connectivity;
use crate::pacing::PacingState;
use crate::session::SessionStats;

/// Everything the dashboard shows; refreshed by the session loop.
#[derive(Debug, Clone)]
pub struct DashboardState {
    pub endpoint: String,
    pub session_id: String,
    pub source: String,
    pub connectivity: Connectivity,
    pub pacing: PacingState,
    pub stats: SessionStats,
    pub summary: Option<SummaryView>,
    pub last_result_at: Option<DateTime<Local>>,
}

impl DashboardState {
    pub fn new(
        endpoint: impl Into<String>,
        session_id: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            session_id: session_id.into(),
            source: source.into(),
            connectivity: Connectivity::Disconnected,
            pacing: PacingState::Idle,
            stats: SessionStats::default(),
            summary: None,
            last_result_at: None,
        }
    }

    pub fn set_summary(&mut self, view: SummaryView) {
        self.summary = Some(view);
        self.last_result_at = Some(Local::now());
    }

    pub fn is_capturing(&self) -> bool {
        match self.pacing {
            PacingState::Idle => false,
            PacingState::Armed => true,
            PacingState::AwaitingResult { active, .. } => active,
        }
    }

    pub fn pacing_label(&self) -> String {
        match self.pacing {
            PacingState::Idle => "stopped".to_string(),
            PacingState::Armed => "ready".to_string(),
            PacingState::AwaitingResult { seq, active: true, .. } => format!("awaiting #{seq}"),
            PacingState::AwaitingResult { seq, active: false, .. } => {
                format!("stopping, awaiting #{seq}")
            }
        }
    }
}
