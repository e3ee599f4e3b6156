//! Text-to-image engine client for a local diffusion sidecar.

use crate::core::engine::{GenerateRequest, TextToImage};
use crate::infrastructure::config::EngineConfig;
use anyhow::Context;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::RgbImage;
use log::debug;
use serde::{Deserialize, Serialize};

pub struct DiffusionClient {
    http: reqwest::Client,
    base_url: String,
    device: Option<String>,
}

impl DiffusionClient {
    pub fn new(config: &EngineConfig) -> Self {
        DiffusionClient {
            http: reqwest::Client::new(),
            base_url: config.base_url.clone(),
            device: config.device.clone(),
        }
    }
}

#[async_trait]
impl TextToImage for DiffusionClient {
    async fn generate(
        &self,
        prompt: &str,
        request: &GenerateRequest,
    ) -> anyhow::Result<Vec<RgbImage>> {
        let url = format!("{}/v1/txt2img", self.base_url);
        debug!(
            "txt2img request, url={url}, count={}, steps={:?}",
            request.count, request.steps
        );

        let response: schemas::Txt2ImgResponse = self
            .http
            .post(&url)
            .json(&schemas::Txt2ImgRequest {
                prompt,
                width: request.width,
                height: request.height,
                num_inference_steps: request.steps,
                num_images: request.count,
                device: self.device.as_deref(),
            })
            .send()
            .await
            .context("txt2img request failed")?
            .error_for_status()
            .context("txt2img rejected")?
            .json()
            .await
            .context("bad txt2img response")?;

        response
            .images
            .iter()
            .map(|encoded| {
                let bytes = STANDARD
                    .decode(encoded)
                    .context("invalid base64 image payload")?;
                let decoded = image::load_from_memory(&bytes).context("undecodable image")?;
                Ok(decoded.to_rgb8())
            })
            .collect()
    }
}

mod schemas {
    use super::{Deserialize, Serialize};

    #[derive(Serialize, Debug)]
    pub struct Txt2ImgRequest<'a> {
        pub prompt: &'a str,
        pub width: u32,
        pub height: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub num_inference_steps: Option<u32>,
        pub num_images: u32,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub device: Option<&'a str>,
    }

    #[derive(Deserialize, Debug)]
    pub struct Txt2ImgResponse {
        pub images: Vec<String>,
    }
}
