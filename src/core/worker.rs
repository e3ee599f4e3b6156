//! Worker loop: owns the generation engine, drains the task channel serially.

use crate::core::engine::ImagePipeline;
use crate::core::handler::IncomingRequest;
use crate::core::reply;
use crate::core::traits::ChatClient;
use crate::infrastructure::chat::HttpChatClient;
use crate::infrastructure::config::{ChatApiConfig, EngineConfig};
use crate::infrastructure::diffusion::DiffusionClient;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// A successfully rendered request, ready for delivery. Consumed exactly
/// once; never persisted.
#[derive(Debug, Clone)]
pub struct CompletedTask {
    pub request: IncomingRequest,
    /// PNG bytes of the reply image.
    pub image: Vec<u8>,
    pub elapsed: Duration,
}

/// Long-lived worker task. The engine handle is constructed here, inside the
/// worker context, so the ingestion context never touches it and startup is
/// not blocked by engine initialization.
pub async fn worker_task(
    tasks: mpsc::Receiver<IncomingRequest>,
    engine: EngineConfig,
    chat: ChatApiConfig,
) {
    info!(
        "worker started, engine={}, four_images={}",
        engine.base_url, engine.four_images
    );
    let pipeline = ImagePipeline::new(Box::new(DiffusionClient::new(&engine)), engine.four_images);
    let chat: Arc<dyn ChatClient> = Arc::new(HttpChatClient::new(chat));
    run_worker(tasks, pipeline, chat).await
}

/// Serial processing loop: one task runs to completion before the next is
/// dequeued. Blocks on an empty channel (the intended idle state) and returns
/// only when every sender is gone.
pub async fn run_worker(
    mut tasks: mpsc::Receiver<IncomingRequest>,
    pipeline: ImagePipeline,
    chat: Arc<dyn ChatClient>,
) {
    loop {
        match tasks.recv().await {
            None => {
                info!("task channel closed, worker exiting");
                return;
            }
            Some(request) => process_request(&pipeline, &*chat, request).await,
        }
    }
}

/// Runs generation and delivery for one request. Every failure is logged and
/// swallowed here: a failed task is dropped without a reply (best-effort,
/// at-most-once) and must never take the worker loop down with it.
pub async fn process_request(
    pipeline: &ImagePipeline,
    chat: &dyn ChatClient,
    request: IncomingRequest,
) {
    info!(
        "picked up task, id={}, prompt={:?}",
        request.id, request.prompt
    );

    let started = Instant::now();
    let image = match pipeline.generate(&request.prompt).await {
        Ok(image) => image,
        Err(e) => {
            error!(
                "generation failed, id={}, prompt={:?}, error={e:#}",
                request.id, request.prompt
            );
            return;
        }
    };
    let elapsed = started.elapsed();

    let task = CompletedTask {
        request,
        image,
        elapsed,
    };
    match reply::reply_image(chat, &task).await {
        Ok(()) => info!(
            "reply delivered, id={}, conversation={}, elapsed={:.3}s",
            task.request.id,
            task.request.conversation_id,
            task.elapsed.as_secs_f64()
        ),
        Err(e) => error!(
            "reply delivery failed, id={}, conversation={}, error={e:#}",
            task.request.id, task.request.conversation_id
        ),
    }
}
