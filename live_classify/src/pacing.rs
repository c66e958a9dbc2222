//! Frame pacing: decides on every capture tick whether a frame may be
//! submitted, keeping at most one classification request outstanding.

use std::time::Duration;

use tokio::time::Instant;

/// Lifecycle of the submission gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacingState {
    /// Capture stopped and nothing outstanding.
    Idle,
    /// Capture running; the next eligible tick submits.
    Armed,
    /// One frame is outstanding. `active` records whether capture should
    /// resume once its result arrives.
    AwaitingResult {
        seq: u64,
        since: Instant,
        active: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Stopped,
    InFlight,
    Disconnected,
    VideoNotReady,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickDecision {
    /// Capture and send the frame tagged `seq`.
    Submit { seq: u64 },
    Skip(SkipReason),
}

/// How an inbound result relates to the outstanding request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultPairing {
    /// Result for the outstanding frame; the gate is open again.
    Completed { seq: u64 },
    /// Result tagged with a sequence number other than the outstanding one.
    Stale { expected: Option<u64>, got: u64 },
    /// Untagged result with nothing outstanding.
    Unsolicited,
}

#[derive(Debug)]
pub struct PacingGate {
    state: PacingState,
    next_seq: u64,
    result_timeout: Option<Duration>,
}

impl PacingGate {
    pub fn new(result_timeout: Option<Duration>) -> Self {
        Self {
            state: PacingState::Idle,
            next_seq: 1,
            result_timeout,
        }
    }

    pub fn state(&self) -> PacingState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        match self.state {
            PacingState::Idle => false,
            PacingState::Armed => true,
            PacingState::AwaitingResult { active, .. } => active,
        }
    }

    pub fn in_flight(&self) -> Option<u64> {
        match self.state {
            PacingState::AwaitingResult { seq, .. } => Some(seq),
            _ => None,
        }
    }

    /// Returns false if capture was already running.
    pub fn start(&mut self) -> bool {
        self.state = match self.state {
            PacingState::Idle => PacingState::Armed,
            PacingState::AwaitingResult {
                seq,
                since,
                active: false,
            } => PacingState::AwaitingResult {
                seq,
                since,
                active: true,
            },
            _ => return false,
        };
        true
    }

    /// Halts future submissions. An outstanding request is left to complete.
    pub fn stop(&mut self) -> bool {
        self.state = match self.state {
            PacingState::Armed => PacingState::Idle,
            PacingState::AwaitingResult {
                seq,
                since,
                active: true,
            } => PacingState::AwaitingResult {
                seq,
                since,
                active: false,
            },
            _ => return false,
        };
        true
    }

    pub fn tick(&mut self, connected: bool, video_ready: bool, now: Instant) -> TickDecision {
        if let PacingState::AwaitingResult { seq, since, active } = self.state {
            match self.result_timeout {
                Some(timeout) if now.saturating_duration_since(since) >= timeout => {
                    tracing::warn!("No result for frame {seq} after {timeout:?}, abandoning it");
                    self.state = Self::settled(active);
                }
                _ => return TickDecision::Skip(SkipReason::InFlight),
            }
        }

        match self.state {
            PacingState::Idle => TickDecision::Skip(SkipReason::Stopped),
            PacingState::AwaitingResult { .. } => TickDecision::Skip(SkipReason::InFlight),
            PacingState::Armed if !connected => TickDecision::Skip(SkipReason::Disconnected),
            PacingState::Armed if !video_ready => TickDecision::Skip(SkipReason::VideoNotReady),
            PacingState::Armed => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.state = PacingState::AwaitingResult {
                    seq,
                    since: now,
                    active: true,
                };
                TickDecision::Submit { seq }
            }
        }
    }

    /// Pairs an inbound result with the outstanding frame. Untagged results
    /// pair with whatever is outstanding.
    pub fn on_result(&mut self, seq: Option<u64>) -> ResultPairing {
        match (self.state, seq) {
            (PacingState::AwaitingResult { seq: expected, .. }, Some(got)) if got != expected => {
                ResultPairing::Stale {
                    expected: Some(expected),
                    got,
                }
            }
            (PacingState::AwaitingResult { seq: expected, active, .. }, _) => {
                self.state = Self::settled(active);
                ResultPairing::Completed { seq: expected }
            }
            (_, Some(got)) => ResultPairing::Stale {
                expected: None,
                got,
            },
            (_, None) => ResultPairing::Unsolicited,
        }
    }

    /// Releases the gate for a frame that never reached the service. Returns
    /// false if `seq` is not the outstanding frame.
    pub fn abort_submission(&mut self, seq: u64) -> bool {
        match self.state {
            PacingState::AwaitingResult { seq: expected, active, .. } if expected == seq => {
                self.state = Self::settled(active);
                true
            }
            _ => false,
        }
    }

    /// Drops whatever is outstanding; its result can no longer arrive.
    pub fn abandon(&mut self) -> Option<u64> {
        let seq = self.in_flight()?;
        self.abort_submission(seq);
        Some(seq)
    }

    fn settled(active: bool) -> PacingState {
        if active {
            PacingState::Armed
        } else {
            PacingState::Idle
        }
    }
}
