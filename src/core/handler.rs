//! Ingestion-facing message handling: callback normalization and task offload.

use crate::TASK_SENDER;
use crate::core::engine::{ImagePipeline, TextToImage};
use crate::core::traits::{CallbackHandler, ChatClient};
use crate::core::worker;
use crate::infrastructure::config::{EngineConfig, HandlerConfig};
use crate::infrastructure::diffusion::DiffusionClient;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use di::{Ref, inject, injectable};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use uuid::Uuid;

/// Topic tag the chatbot message handler is registered under.
pub const CHATBOT_TOPIC: &str = "chat.bot.message";

/// Wire shape of a chat message callback, as delivered by the platform.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatCallbackEvent {
    pub conversation_id: String,
    #[serde(default)]
    pub sender_nick: Option<String>,
    pub text: TextContent,
}

#[derive(Debug, Deserialize)]
pub struct TextContent {
    pub content: String,
}

/// One accepted generation request. Immutable once created; consumed exactly
/// once by the worker (or the inline path).
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    pub id: Uuid,
    pub conversation_id: String,
    pub sender: Option<String>,
    pub prompt: String,
    pub received_at: DateTime<Utc>,
}

impl From<ChatCallbackEvent> for IncomingRequest {
    fn from(event: ChatCallbackEvent) -> Self {
        IncomingRequest {
            id: Uuid::new_v4(),
            conversation_id: event.conversation_id,
            sender: event.sender_nick,
            prompt: event.text.content,
            received_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AckStatus {
    Success,
    Busy,
}

/// Acknowledgment returned to the platform for every callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ack {
    pub status: AckStatus,
    pub message: String,
}

impl Ack {
    pub fn ok() -> Self {
        Ack {
            status: AckStatus::Success,
            message: "OK".to_owned(),
        }
    }

    pub fn busy() -> Self {
        Ack {
            status: AckStatus::Busy,
            message: "task queue full, retry later".to_owned(),
        }
    }
}

/// Handles chat message callbacks.
///
/// In offload mode the handler only performs a non-blocking enqueue onto the
/// task channel and acks immediately; a full queue is rejected with a busy
/// ack rather than blocking the ingestion path. In inline mode generation and
/// delivery run on the calling context before the ack is returned, and the
/// pipeline is constructed on first use so the engine handle never leaves
/// this context.
/// Builds the engine handle for the inline path. Called at most once, on the
/// first inline request.
pub type EngineFactory = Box<dyn Fn(&EngineConfig) -> Box<dyn TextToImage> + Send + Sync>;

pub struct MessageHandler {
    config: HandlerConfig,
    chat: Ref<dyn ChatClient>,
    engine_factory: EngineFactory,
    inline_pipeline: OnceCell<ImagePipeline>,
}

#[injectable(CallbackHandler)]
impl MessageHandler {
    #[inject]
    pub fn create(chat: Ref<dyn ChatClient>) -> Self {
        MessageHandler::new(HandlerConfig::from_env(), chat)
    }
}

impl MessageHandler {
    pub fn new(config: HandlerConfig, chat: Ref<dyn ChatClient>) -> Self {
        MessageHandler::with_engine_factory(
            config,
            chat,
            Box::new(|engine| Box::new(DiffusionClient::new(engine))),
        )
    }

    pub fn with_engine_factory(
        config: HandlerConfig,
        chat: Ref<dyn ChatClient>,
        engine_factory: EngineFactory,
    ) -> Self {
        MessageHandler {
            config,
            chat,
            engine_factory,
            inline_pipeline: OnceCell::new(),
        }
    }

    fn parse(payload: serde_json::Value) -> Result<IncomingRequest, serde_json::Error> {
        serde_json::from_value::<ChatCallbackEvent>(payload).map(IncomingRequest::from)
    }

    /// Non-blocking enqueue; queue-full is surfaced as a busy ack and a closed
    /// channel (worker gone) is logged and dropped.
    pub(crate) fn enqueue(sender: &mpsc::Sender<IncomingRequest>, request: IncomingRequest) -> Ack {
        match sender.try_send(request) {
            Ok(()) => Ack::ok(),
            Err(TrySendError::Full(request)) => {
                warn!(
                    "task queue full, rejecting request, conversation={}",
                    request.conversation_id
                );
                Ack::busy()
            }
            Err(TrySendError::Closed(request)) => {
                error!(
                    "task channel closed, dropping request, conversation={}",
                    request.conversation_id
                );
                Ack::ok()
            }
        }
    }

    async fn process_inline(&self, request: IncomingRequest) {
        let pipeline = self
            .inline_pipeline
            .get_or_init(|| async {
                ImagePipeline::new(
                    (self.engine_factory)(&self.config.engine),
                    self.config.engine.four_images,
                )
            })
            .await;
        worker::process_request(pipeline, &*self.chat, request).await;
    }
}

#[async_trait]
impl CallbackHandler for MessageHandler {
    fn topic(&self) -> &'static str {
        CHATBOT_TOPIC
    }

    async fn on_callback(&self, payload: serde_json::Value) -> Ack {
        let request = match MessageHandler::parse(payload) {
            Ok(request) => request,
            Err(e) => {
                warn!("dropping malformed callback event, error={e}");
                return Ack::ok();
            }
        };
        info!(
            "received incoming message, id={}, conversation={}, prompt={:?}",
            request.id, request.conversation_id, request.prompt
        );

        if self.config.offload {
            match TASK_SENDER.get() {
                Some(sender) => MessageHandler::enqueue(sender, request),
                None => {
                    error!("task sender not initialized, dropping request");
                    Ack::ok()
                }
            }
        } else {
            self.process_inline(request).await;
            Ack::ok()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_normalizes_chat_event() {
        let payload = json!({
            "conversationId": "cid-1",
            "senderNick": "alice",
            "text": { "content": "  a blue sky  " }
        });

        let request = MessageHandler::parse(payload).unwrap();

        assert_eq!(request.conversation_id, "cid-1");
        assert_eq!(request.sender.as_deref(), Some("alice"));
        // Whitespace is preserved at ingestion; trimming happens at render
        // and reply time.
        assert_eq!(request.prompt, "  a blue sky  ");
    }

    #[test]
    fn test_parse_rejects_event_without_text() {
        let payload = json!({ "conversationId": "cid-1" });
        assert!(MessageHandler::parse(payload).is_err());
    }

    #[test]
    fn test_enqueue_accepts_until_capacity_then_busy() {
        let (sender, mut receiver) = mpsc::channel(1);
        let payload = || {
            MessageHandler::parse(json!({
                "conversationId": "cid-1",
                "text": { "content": "a red cat" }
            }))
            .unwrap()
        };

        assert_eq!(MessageHandler::enqueue(&sender, payload()), Ack::ok());
        assert_eq!(MessageHandler::enqueue(&sender, payload()), Ack::busy());

        // Draining frees capacity again.
        receiver.try_recv().unwrap();
        assert_eq!(MessageHandler::enqueue(&sender, payload()), Ack::ok());
    }

    #[test]
    fn test_enqueue_on_closed_channel_acks_and_drops() {
        let (sender, receiver) = mpsc::channel(1);
        drop(receiver);

        let request = MessageHandler::parse(json!({
            "conversationId": "cid-1",
            "text": { "content": "a red cat" }
        }))
        .unwrap();

        assert_eq!(MessageHandler::enqueue(&sender, request), Ack::ok());
    }

    #[test]
    fn test_ack_wire_format() {
        let ok = serde_json::to_value(Ack::ok()).unwrap();
        assert_eq!(ok["status"], "SUCCESS");

        let busy = serde_json::to_value(Ack::busy()).unwrap();
        assert_eq!(busy["status"], "BUSY");
    }
}
