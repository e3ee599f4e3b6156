//! Process configuration, read once from the environment at startup.

use std::env;
use std::str::FromStr;

/// Everything the process needs, resolved before any request is served.
/// Values are immutable for the process lifetime.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub bind_addr: String,
    pub queue_capacity: usize,
    pub handler: HandlerConfig,
    pub chat: ChatApiConfig,
}

/// Configuration the message handler needs: the offload/inline mode flag and
/// the engine settings for the inline path.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub offload: bool,
    pub engine: EngineConfig,
}

/// Settings for the text-to-image sidecar.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub base_url: String,
    /// Compute device hint forwarded to the engine, e.g. `mps` or `cuda`.
    pub device: Option<String>,
    pub four_images: bool,
}

/// Messaging platform API endpoint and bot credentials.
#[derive(Debug, Clone)]
pub struct ChatApiConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl RelayConfig {
    /// Reads the full configuration. Missing credentials are fatal: the
    /// process is unusable without them.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        RelayConfig {
            bind_addr: env::var("BIND_ADDR").unwrap_or("0.0.0.0:3000".to_owned()),
            queue_capacity: env::var("TASK_QUEUE_CAPACITY")
                .ok()
                .and_then(|s| usize::from_str(&s).ok())
                .unwrap_or(128),
            handler: HandlerConfig::from_env(),
            chat: ChatApiConfig::from_env(),
        }
    }
}

impl HandlerConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        HandlerConfig {
            offload: env_flag("OFFLOAD_MODE", true),
            engine: EngineConfig::from_env(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        EngineConfig {
            base_url: env::var("TXT2IMG_API_BASE").unwrap_or("http://127.0.0.1:7860".to_owned()),
            device: env::var("TXT2IMG_DEVICE").ok(),
            four_images: env_flag("FOUR_IMAGES", true),
        }
    }
}

impl ChatApiConfig {
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        ChatApiConfig {
            base_url: env::var("CHAT_API_BASE").expect("CHAT_API_BASE must be set"),
            client_id: env::var("CLIENT_ID").expect("CLIENT_ID must be set"),
            client_secret: env::var("CLIENT_SECRET").expect("CLIENT_SECRET must be set"),
        }
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| match v.to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}
