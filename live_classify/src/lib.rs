//! Real-time classification client: paces frames from a live source to a
//! remote classifier over a persistent session and renders the results.

pub mod config;
pub mod connection;
pub mod pacing;
pub mod present;
pub mod protocol;
pub mod sampler;
pub mod session;
pub mod source;
pub mod tui;
pub mod upload;

mod transport;
