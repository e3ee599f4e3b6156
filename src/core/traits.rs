//! DI "Interfaces"

use crate::core::handler::Ack;
use async_trait::async_trait;

/// Outbound side of the messaging platform: upload binary media, then post a
/// formatted reply into a conversation. Both calls are single-attempt.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Uploads image bytes and returns an opaque media reference usable in
    /// message bodies.
    async fn upload_media(&self, content: Vec<u8>) -> anyhow::Result<String>;

    /// Posts a markdown-formatted reply to the given conversation.
    async fn reply_markdown(
        &self,
        title: &str,
        text: &str,
        conversation_id: &str,
    ) -> anyhow::Result<()>;
}

/// A callback handler registered for one message-topic tag.
///
/// Handlers acknowledge every event they are given; a malformed payload is
/// logged and acked as handled so the platform never retries it.
#[async_trait]
pub trait CallbackHandler: Send + Sync {
    /// The message-topic tag this handler serves.
    fn topic(&self) -> &'static str;

    /// Handles one inbound callback payload.
    async fn on_callback(&self, payload: serde_json::Value) -> Ack;
}
