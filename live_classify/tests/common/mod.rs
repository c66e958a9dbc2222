//! In-process stand-in for the classification service.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use inference_common::frame_meta::decode_data_url;
use serde_json::{json, Value};

#[derive(Clone, Default)]
pub struct FakeService {
    reply_delay: Duration,
    omit_seq: bool,
    send_garbage: bool,
    malformed: bool,
    /// Drop the socket, unanswered, when this frame (1-based count) arrives.
    close_on_frame: Option<usize>,
    closed_once: Arc<AtomicBool>,
    frames: Arc<Mutex<Vec<u64>>>,
    connections: Arc<AtomicUsize>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

pub fn bottle_result() -> Value {
    json!({
        "total_objects": 2,
        "class_counts": {"bottle": 2},
        "detected_objects": [
            {"bbox": [10, 10, 50, 50], "class": "bottle", "confidence": 0.92},
            {"bbox": [60, 10, 90, 40], "class": "bottle", "confidence": 0.81}
        ]
    })
}

pub fn malformed_result() -> Value {
    json!({
        "total_objects": 1,
        "class_counts": {"bottle": 1},
        "detected_objects": [
            {"bbox": [1, 2, 3], "class": "bottle", "confidence": 0.9}
        ]
    })
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply_delay(mut self, delay: Duration) -> Self {
        self.reply_delay = delay;
        self
    }

    /// Answer like a server that doesn't echo sequence numbers.
    pub fn without_seq(mut self) -> Self {
        self.omit_seq = true;
        self
    }

    pub fn with_garbage(mut self) -> Self {
        self.send_garbage = true;
        self
    }

    /// Answer every frame with a result whose boxes have three coordinates.
    pub fn malformed_results(mut self) -> Self {
        self.malformed = true;
        self
    }

    pub fn close_on_frame(mut self, frame: usize) -> Self {
        self.close_on_frame = Some(frame);
        self
    }

    /// Sequence numbers of every frame received, in arrival order.
    pub fn frames(&self) -> Vec<u64> {
        self.frames.lock().unwrap().clone()
    }

    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Serves on an ephemeral port; returns the `http://` origin.
    pub async fn spawn(&self) -> String {
        let app = Router::new()
            .route("/ws", get(ws_handler))
            .route("/api/classify-upload", post(classify_upload))
            .route("/api/health", get(health))
            .with_state(self.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn answer(&self, text: &str) -> Option<String> {
        let envelope: Value = serde_json::from_str(text).ok()?;
        if envelope["event"] != "frame" {
            return None;
        }
        let seq = envelope["data"]["seq"].as_u64();
        let decoded = envelope["data"]["image"]
            .as_str()
            .and_then(|url| decode_data_url(url).ok())
            .and_then(|bytes| image::load_from_memory(&bytes).ok());

        let mut data = match decoded {
            Some(_) if self.malformed => malformed_result(),
            Some(_) => bottle_result(),
            None => json!({"error": "Could not decode image"}),
        };
        if let (Some(seq), false) = (seq, self.omit_seq) {
            data["seq"] = json!(seq);
        }
        Some(json!({"event": "classification_result", "data": data}).to_string())
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(service): State<FakeService>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, service))
}

async fn handle_socket(socket: WebSocket, service: FakeService) {
    service.connections.fetch_add(1, Ordering::SeqCst);
    let (mut sink, mut stream) = socket.split();
    let (replies, mut outgoing) = tokio::sync::mpsc::unbounded_channel::<String>();
    let writer = tokio::spawn(async move {
        while let Some(text) = outgoing.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        let Message::Text(text) = msg else {
            continue;
        };
        let seq = serde_json::from_str::<Value>(&text)
            .ok()
            .and_then(|v| v["data"]["seq"].as_u64())
            .unwrap_or_default();
        let received = {
            let mut frames = service.frames.lock().unwrap();
            frames.push(seq);
            frames.len()
        };

        if service.close_on_frame == Some(received)
            && !service.closed_once.swap(true, Ordering::SeqCst)
        {
            break;
        }

        let now = service.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        service.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let service = service.clone();
        let replies = replies.clone();
        tokio::spawn(async move {
            if service.send_garbage {
                let _ = replies.send("not json at all".to_string());
            }
            let reply = service.answer(&text);
            tokio::time::sleep(service.reply_delay).await;
            service.in_flight.fetch_sub(1, Ordering::SeqCst);
            if let Some(reply) = reply {
                let _ = replies.send(reply);
            }
        });
    }
    writer.abort();
}

async fn classify_upload(mut multipart: Multipart) -> (StatusCode, Json<Value>) {
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() != Some("file") {
            continue;
        }
        return match field.bytes().await {
            Ok(bytes) if image::load_from_memory(&bytes).is_ok() => {
                (StatusCode::OK, Json(bottle_result()))
            }
            _ => (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Could not read image"})),
            ),
        };
    }
    (StatusCode::BAD_REQUEST, Json(json!({"error": "No file part"})))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "model_loaded": true,
        "device": "cpu",
        "timestamp": 1718000000.5
    }))
}
