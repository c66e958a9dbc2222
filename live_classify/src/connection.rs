//! Connection manager: owns one logical session with the classification
//! service and turns transport activity into session events.

use std::time::Duration;

use inference_common::classification::ClassificationResult;
use inference_common::frame_meta::EncodedFrame;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

use crate::protocol::{ClientEvent, ServerEvent};
use crate::transport::{self, TransportEvent, TransportLink};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Connectivity {
    Connected,
    #[default]
    Disconnected,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    Disconnected,
    /// One inbound result, delivered in arrival order.
    Result(ClassificationResult),
}

/// Receives session events. Connectivity callbacks fire once per transition.
pub trait SessionObserver {
    fn on_connected(&mut self) {}
    fn on_disconnected(&mut self) {}
    fn on_result(&mut self, result: ClassificationResult);
}

pub fn dispatch<O: SessionObserver + ?Sized>(event: SessionEvent, observer: &mut O) {
    match event {
        SessionEvent::Connected => observer.on_connected(),
        SessionEvent::Disconnected => observer.on_disconnected(),
        SessionEvent::Result(result) => observer.on_result(result),
    }
}

/// Collapses repeated transport reports into single transitions.
#[derive(Debug, Default)]
pub struct ConnectivityTracker {
    state: Connectivity,
}

impl ConnectivityTracker {
    pub fn state(&self) -> Connectivity {
        self.state
    }

    /// Returns the new state if `up` changes it.
    pub fn observe(&mut self, up: bool) -> Option<Connectivity> {
        let next = if up {
            Connectivity::Connected
        } else {
            Connectivity::Disconnected
        };
        if next == self.state {
            return None;
        }
        self.state = next;
        Some(next)
    }
}

pub struct ConnectionManager {
    session_id: Uuid,
    endpoint: String,
    reconnect_delay: Duration,
    tracker: ConnectivityTracker,
    link: Option<TransportLink>,
}

impl ConnectionManager {
    pub fn new(endpoint: impl Into<String>, reconnect_delay: Duration) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            endpoint: endpoint.into(),
            reconnect_delay,
            tracker: ConnectivityTracker::default(),
            link: None,
        }
    }

    /// Stable across reconnects.
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Starts the transport. Calling it again before [`teardown`] does nothing.
    ///
    /// [`teardown`]: Self::teardown
    pub fn connect(&mut self) {
        if self.link.is_some() {
            return;
        }
        info!("Session {} connecting to {}", self.session_id, self.endpoint);
        self.link = Some(transport::spawn(self.endpoint.clone(), self.reconnect_delay));
    }

    pub fn connectivity(&self) -> Connectivity {
        self.tracker.state()
    }

    pub fn is_connected(&self) -> bool {
        self.connectivity() == Connectivity::Connected
    }

    /// Queues `frame` for the service. Returns false, without retrying, if
    /// the frame could not be handed to a live transport.
    pub fn send(&mut self, frame: &EncodedFrame) -> bool {
        let Some(link) = self.link.as_ref().filter(|_| self.is_connected()) else {
            trace!("Not connected, dropping frame {}", frame.seq);
            return false;
        };
        let text = match serde_json::to_string(&ClientEvent::Frame(frame.into())) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode frame {}: {e}", frame.seq);
                return false;
            }
        };
        match link.outbound.try_send(text) {
            Ok(()) => true,
            Err(e) => {
                debug!("Dropping frame {}: {e}", frame.seq);
                false
            }
        }
    }

    /// Waits for the next session event. Pending forever while no transport
    /// is running. Messages that are not result envelopes are logged and
    /// skipped; malformed result payloads arrive as failure results.
    pub async fn next_event(&mut self) -> SessionEvent {
        loop {
            let received = match self.link.as_mut() {
                Some(link) => link.inbound.recv().await,
                None => return std::future::pending().await,
            };

            let event = match received {
                Some(event) => event,
                None => {
                    warn!("Transport for session {} stopped", self.session_id);
                    self.link = None;
                    TransportEvent::Down
                }
            };

            match event {
                TransportEvent::Up => {
                    if self.tracker.observe(true).is_some() {
                        return SessionEvent::Connected;
                    }
                }
                TransportEvent::Down => {
                    if self.tracker.observe(false).is_some() {
                        return SessionEvent::Disconnected;
                    }
                }
                TransportEvent::Text(text) => match ServerEvent::decode(&text) {
                    Ok(ServerEvent::ClassificationResult(result)) => {
                        return SessionEvent::Result(result);
                    }
                    Err(e) => warn!("Dropping undecodable message: {e:#}"),
                },
            }
        }
    }

    /// Stops the transport; no further events are delivered.
    pub fn teardown(&mut self) {
        if let Some(link) = self.link.take() {
            link.task.abort();
            info!("Session {} closed", self.session_id);
        }
        self.tracker.observe(false);
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            link.task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inference_common::classification::Classification;

    #[derive(Default)]
    struct Recorder {
        log: Vec<String>,
    }

    impl SessionObserver for Recorder {
        fn on_connected(&mut self) {
            self.log.push("connected".into());
        }

        fn on_disconnected(&mut self) {
            self.log.push("disconnected".into());
        }

        fn on_result(&mut self, result: ClassificationResult) {
            self.log.push(format!("result:{}", result.detections().len()));
        }
    }

    #[test]
    fn test_tracker_reports_each_transition_once() {
        let mut tracker = ConnectivityTracker::default();
        assert_eq!(tracker.observe(false), None);
        assert_eq!(tracker.observe(true), Some(Connectivity::Connected));
        assert_eq!(tracker.observe(true), None);
        assert_eq!(tracker.observe(false), Some(Connectivity::Disconnected));
        assert_eq!(tracker.observe(false), None);
    }

    #[test]
    fn test_dispatch_routes_events() {
        let mut recorder = Recorder::default();
        for event in [
            SessionEvent::Connected,
            SessionEvent::Result(Classification::default().into()),
            SessionEvent::Disconnected,
        ] {
            dispatch(event, &mut recorder);
        }
        assert_eq!(recorder.log, vec!["connected", "result:0", "disconnected"]);
    }

    #[tokio::test]
    async fn test_send_while_disconnected_is_dropped() {
        let mut manager = ConnectionManager::new("ws://127.0.0.1:9/ws", Duration::from_secs(60));
        let raster = image::RgbImage::new(4, 4);
        let frame = EncodedFrame::encode(1, &raster, 80).unwrap();

        assert!(!manager.send(&frame));
        manager.connect();
        // Still not connected: nothing listens on the discard port.
        assert!(!manager.send(&frame));
        manager.teardown();
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let mut manager = ConnectionManager::new("ws://127.0.0.1:9/ws", Duration::from_secs(60));
        let session = manager.session_id();
        manager.connect();
        manager.connect();
        assert!(manager.link.is_some());
        manager.teardown();
        manager.connect();
        assert_eq!(manager.session_id(), session);
        manager.teardown();
    }
}
