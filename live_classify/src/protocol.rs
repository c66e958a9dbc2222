//! Named events exchanged with the classification service.
//!
//! Each WebSocket text message is one JSON envelope
//! `{"event": "<name>", "data": <payload>}`.

use anyhow::{bail, Context};
use inference_common::classification::ClassificationResult;
use inference_common::frame_meta::EncodedFrame;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

const CLASSIFICATION_RESULT: &str = "classification_result";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    Frame(FramePayload),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FramePayload {
    /// `data:image/jpeg;base64,...`
    pub image: String,
    pub seq: u64,
}

impl From<&EncodedFrame> for FramePayload {
    fn from(frame: &EncodedFrame) -> Self {
        Self {
            image: frame.data_url(),
            seq: frame.seq,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    ClassificationResult(ClassificationResult),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

impl ServerEvent {
    /// Parses one inbound message. A `classification_result` whose payload
    /// does not have the expected shape becomes a failure result, tagged with
    /// the payload's `seq` when it has one, so it still pairs with the
    /// outstanding frame. Only non-envelopes and unknown events are errors.
    pub fn decode(text: &str) -> anyhow::Result<Self> {
        let envelope: Envelope =
            serde_json::from_str(text).context("Message is not a JSON event envelope")?;
        if envelope.event != CLASSIFICATION_RESULT {
            bail!("Unknown event {:?}", envelope.event);
        }

        let result = match ClassificationResult::deserialize(&envelope.data) {
            Ok(result) => result,
            Err(e) => {
                warn!("Malformed classification result: {e}");
                let failure =
                    ClassificationResult::failure(format!("Malformed classification result: {e}"));
                match envelope.data.get("seq").and_then(Value::as_u64) {
                    Some(seq) => failure.with_seq(seq),
                    None => failure,
                }
            }
        };
        Ok(Self::ClassificationResult(result))
    }
}
