//! Reply formatting and delivery.

use crate::core::traits::ChatClient;
use crate::core::worker::CompletedTask;
use anyhow::Context;
use log::info;
use std::time::Duration;

pub const REPLY_TITLE: &str = "Stable Diffusion txt2img";

/// Markdown reply body: trimmed prompt, inline image reference, elapsed
/// generation time with exactly three decimals, fixed attribution.
pub fn format_reply(prompt: &str, media_id: &str, elapsed: Duration) -> String {
    format!(
        "#### Prompts: {}\n\n\
         ![image]({})\n\n\
         > cost {:.3}s\n\
         > \n\
         > Powered by Stable Diffusion\n",
        prompt.trim(),
        media_id,
        elapsed.as_secs_f64(),
    )
}

/// Uploads the rendered image and posts the formatted reply into the
/// originating conversation. Single attempt; failures propagate to the caller
/// for logging, no retry at any stage.
pub async fn reply_image(chat: &dyn ChatClient, task: &CompletedTask) -> anyhow::Result<()> {
    let media_id = chat
        .upload_media(task.image.clone())
        .await
        .context("media upload failed")?;
    info!("media uploaded, media_id={media_id}");

    let text = format_reply(&task.request.prompt, &media_id, task.elapsed);
    chat.reply_markdown(REPLY_TITLE, &text, &task.request.conversation_id)
        .await
        .context("markdown post failed")
}
