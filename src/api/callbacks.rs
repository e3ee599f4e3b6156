//! Callback endpoint

use crate::core::dispatch::DispatchTable;
use crate::core::handler::{Ack, AckStatus};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use di_axum::Inject;
use log::warn;

pub fn router() -> Router {
    Router::new().route("/", post(handle_callback))
}

/// Receives one callback frame from the platform and routes it by topic tag.
/// Unknown topics are logged and acknowledged as handled so the platform
/// never retries them; only a full task queue produces a non-success status.
async fn handle_callback(
    Inject(dispatch): Inject<DispatchTable>,
    Json(frame): Json<schemas::CallbackFrame>,
) -> (StatusCode, Json<Ack>) {
    let ack = match dispatch.resolve(&frame.topic) {
        Some(handler) => handler.on_callback(frame.data).await,
        None => {
            warn!("no handler registered for topic, topic={}", frame.topic);
            Ack::ok()
        }
    };

    let status = match ack.status {
        AckStatus::Success => StatusCode::OK,
        AckStatus::Busy => StatusCode::TOO_MANY_REQUESTS,
    };
    (status, Json(ack))
}

pub mod schemas {
    use serde::Deserialize;

    /// Envelope of one inbound callback: the message-topic tag plus the
    /// serialized chat message it carries.
    #[derive(Deserialize, Debug)]
    pub struct CallbackFrame {
        pub topic: String,
        #[serde(default)]
        pub data: serde_json::Value,
    }
}
