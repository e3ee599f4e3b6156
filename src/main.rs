//! Chat-triggered text-to-image relay

use tokio_txt2img_relay::TASK_SENDER;
use tokio_txt2img_relay::api;
use tokio_txt2img_relay::core;
use tokio_txt2img_relay::core::dispatch::DispatchTable;
use tokio_txt2img_relay::core::handler::MessageHandler;
use tokio_txt2img_relay::infrastructure::chat::HttpChatClient;
use tokio_txt2img_relay::infrastructure::config::RelayConfig;

use axum::Router;
use di::{Injectable, ServiceCollection};
use di_axum::RouterServiceProviderExtensions;
use log::info;
use tokio::runtime::{Builder, Runtime};
use tokio::sync::mpsc;

fn main() -> anyhow::Result<()> {
    // initialize tracing
    tracing_subscriber::fmt::init();

    let config = RelayConfig::from_env();
    let runtime: Runtime = Builder::new_multi_thread().enable_all().build()?;

    // background worker owning the generation engine
    let (task_sender, task_receiver) = mpsc::channel(config.queue_capacity);
    TASK_SENDER
        .set(task_sender)
        .expect("task sender should not be set");

    let worker_join_handle = config.handler.offload.then(|| {
        runtime.spawn(core::worker::worker_task(
            task_receiver,
            config.handler.engine.clone(),
            config.chat.clone(),
        ))
    });

    let callback_task_handle = runtime.spawn(callback_server_task(config.bind_addr.clone()));

    runtime.block_on(async {
        callback_task_handle
            .await
            .expect("failed to join callback_task_handle");
        if let Some(handle) = worker_join_handle {
            handle.await.expect("failed to join worker_join_handle");
        }
    });

    Ok(())
}

async fn callback_server_task(bind_addr: String) {
    let provider = ServiceCollection::new()
        .add(HttpChatClient::singleton())
        .add(MessageHandler::singleton())
        .add(DispatchTable::singleton())
        .build_provider()
        .unwrap();

    let app = Router::new()
        .nest("/callback", api::callbacks::router())
        .with_provider(provider);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await.unwrap();
    info!("listening on {}", listener.local_addr().unwrap());
    axum::serve(listener, app).await.unwrap();
    info!("Shutting down...");
}
