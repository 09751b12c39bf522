//! Where the terminal shell sends each turn: the in-process pipeline or a
//! running gateway.

use crate::agent::{ResponsePipeline, ResponseResult};
use crate::sessions::Message;
use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Run one turn. `history` excludes `message`.
    async fn send(&self, message: &str, history: &[Message]) -> anyhow::Result<ResponseResult>;

    /// Short label shown in the session banner.
    fn describe(&self) -> String;
}

#[async_trait]
impl ChatBackend for ResponsePipeline {
    async fn send(&self, message: &str, history: &[Message]) -> anyhow::Result<ResponseResult> {
        Ok(self.generate_response(message, history).await?)
    }

    fn describe(&self) -> String {
        format!("{} · {}", self.provider().name(), self.provider().model())
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    message: &'a str,
    history: &'a [Message],
}

/// Client for a gateway's `POST /chat`.
pub struct HttpBackend {
    base_url: String,
    client: Client,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    fn chat_url(&self) -> String {
        format!("{}/chat", self.base_url)
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    async fn send(&self, message: &str, history: &[Message]) -> anyhow::Result<ResponseResult> {
        let response = self
            .client
            .post(self.chat_url())
            .json(&ChatRequest { message, history })
            .send()
            .await
            .with_context(|| format!("Failed to reach gateway at {}", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_string))
                .unwrap_or_else(|| crate::providers::sanitize_api_error(&body));
            anyhow::bail!("Gateway returned {status}: {detail}");
        }

        response
            .json::<ResponseResult>()
            .await
            .context("Gateway returned an unreadable response")
    }

    fn describe(&self) -> String {
        self.base_url.clone()
    }
}
