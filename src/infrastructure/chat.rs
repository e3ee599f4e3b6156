//! Messaging platform client: media upload and markdown replies over HTTP.

use crate::core::traits::ChatClient;
use crate::infrastructure::config::ChatApiConfig;
use anyhow::Context;
use async_trait::async_trait;
use di::{inject, injectable};
use log::debug;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};

pub struct HttpChatClient {
    http: reqwest::Client,
    config: ChatApiConfig,
}

#[injectable(ChatClient)]
impl HttpChatClient {
    #[inject]
    pub fn create() -> Self {
        HttpChatClient::new(ChatApiConfig::from_env())
    }
}

impl HttpChatClient {
    pub fn new(config: ChatApiConfig) -> Self {
        HttpChatClient {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        // Token negotiation is the platform SDK's concern; the credentials
        // are attached as-is.
        request
            .header("x-client-id", &self.config.client_id)
            .header("x-client-secret", &self.config.client_secret)
    }
}

#[async_trait]
impl ChatClient for HttpChatClient {
    async fn upload_media(&self, content: Vec<u8>) -> anyhow::Result<String> {
        let part = Part::bytes(content)
            .file_name("txt2img.png")
            .mime_str("image/png")
            .context("invalid media mime type")?;
        let form = Form::new().text("type", "image").part("media", part);

        let url = format!("{}/media/upload", self.config.base_url);
        debug!("uploading media, url={url}");
        let response: schemas::UploadResponse = self
            .authorized(self.http.post(&url))
            .multipart(form)
            .send()
            .await
            .context("media upload request failed")?
            .error_for_status()
            .context("media upload rejected")?
            .json()
            .await
            .context("bad media upload response")?;

        Ok(response.media_id)
    }

    async fn reply_markdown(
        &self,
        title: &str,
        text: &str,
        conversation_id: &str,
    ) -> anyhow::Result<()> {
        let url = format!("{}/messages/send", self.config.base_url);
        debug!("posting markdown reply, url={url}, conversation={conversation_id}");
        self.authorized(self.http.post(&url))
            .json(&schemas::MarkdownMessage {
                conversation_id,
                msgtype: "markdown",
                markdown: schemas::Markdown { title, text },
            })
            .send()
            .await
            .context("message post request failed")?
            .error_for_status()
            .context("message post rejected")?;

        Ok(())
    }
}

mod schemas {
    use super::{Deserialize, Serialize};

    #[derive(Deserialize, Debug)]
    pub struct UploadResponse {
        pub media_id: String,
    }

    #[derive(Serialize, Debug)]
    pub struct MarkdownMessage<'a> {
        pub conversation_id: &'a str,
        pub msgtype: &'a str,
        pub markdown: Markdown<'a>,
    }

    #[derive(Serialize, Debug)]
    pub struct Markdown<'a> {
        pub title: &'a str,
        pub text: &'a str,
    }
}
