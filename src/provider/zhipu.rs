use super::{commit_turn, spawn_turn, BoxFuture, ChatBot, Turn, TurnStream, TurnUpdate, UpdateSink};
use crate::context::{ContextStore, Message};
use crate::credentials::CredentialSource;
use crate::error::ChatError;
use anyhow::{anyhow, Context as _};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::Serialize;
use std::sync::Arc;
use tokio_stream::StreamExt;

pub const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4/";
pub const DEFAULT_MODEL: &str = "glm-4";
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Request parameters for the GLM-4 chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ZhipuSettings {
    /// API root; always ends with a slash.
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f64,
}

impl ZhipuSettings {
    /// Point at a different API root (a proxy or a test server).
    pub fn with_base_url(mut self, base: &str) -> Self {
        // Url::join drops the last path segment unless it ends with a slash.
        self.base_url = if base.ends_with('/') {
            base.to_string()
        } else {
            format!("{base}/")
        };
        self
    }

    fn endpoint(&self) -> anyhow::Result<Url> {
        let base = Url::parse(&self.base_url)
            .with_context(|| format!("invalid GLM-4 base URL: {}", self.base_url))?;
        Ok(base.join("chat/completions")?)
    }
}

impl Default for ZhipuSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Zhipu GLM-4 chat bot.
#[derive(Clone)]
pub struct ZhipuBot {
    http: reqwest::Client,
    credentials: Arc<dyn CredentialSource>,
    store: Arc<dyn ContextStore>,
    settings: ZhipuSettings,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

impl ZhipuBot {
    pub fn new(
        http: reqwest::Client,
        credentials: Arc<dyn CredentialSource>,
        store: Arc<dyn ContextStore>,
        settings: ZhipuSettings,
    ) -> Self {
        Self {
            http,
            credentials,
            store,
            settings,
        }
    }

    fn headers(api_key: &str) -> anyhow::Result<HeaderMap> {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let mut v = HeaderValue::from_str(&format!("Bearer {api_key}")).map_err(|e| anyhow!(e))?;
        v.set_sensitive(true);
        h.insert(AUTHORIZATION, v);
        Ok(h)
    }

    fn post(&self, api_key: &str, body: &CompletionRequest<'_>) -> anyhow::Result<reqwest::RequestBuilder> {
        Ok(self
            .http
            .post(self.settings.endpoint()?)
            .headers(Self::headers(api_key)?)
            .json(body))
    }

    async fn probe(&self) -> bool {
        let Some(api_key) = self.credentials.api_key() else {
            tracing::debug!("no GLM-4 API key configured; skipping availability probe");
            return false;
        };

        let messages = [Message::user("test")];
        let body = CompletionRequest {
            model: &self.settings.model,
            messages: &messages,
            stream: false,
            max_tokens: 1,
            temperature: None,
        };

        let req = match self.post(&api_key, &body) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "failed to build GLM-4 availability probe");
                return false;
            }
        };

        let status = match req.send().await {
            Ok(resp) => resp.status(),
            Err(e) => {
                tracing::warn!(error = %e, "GLM-4 availability probe failed");
                return false;
            }
        };

        if status.is_success() {
            return true;
        }
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(%status, "GLM-4 API key is invalid or expired");
        } else {
            tracing::warn!(%status, "GLM-4 availability probe rejected");
        }
        false
    }

    async fn run_turn(self, prompt: String, sink: UpdateSink) -> Result<(), ChatError> {
        let api_key = self.credentials.api_key().ok_or(ChatError::MissingApiKey)?;
        let context = self.store.load().map_err(ChatError::Context)?;
        let messages = context.with_prompt(&prompt);

        let body = CompletionRequest {
            model: &self.settings.model,
            messages: &messages,
            stream: true,
            max_tokens: self.settings.max_tokens,
            temperature: Some(self.settings.temperature),
        };
        tracing::debug!(
            model = %self.settings.model,
            history = context.len(),
            "opening GLM-4 completion stream"
        );

        let resp = self
            .post(&api_key, &body)
            .map_err(|e| ChatError::Transport(format!("{e:#}")))?
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "GLM-4 request failed");
                ChatError::transport(e)
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = match resp.text().await {
                Ok(t) => t,
                Err(e) => {
                    tracing::warn!(%status, error = %e, "failed to read GLM-4 error body");
                    String::new()
                }
            };
            let err = ChatError::from_response(status, &text);
            tracing::error!(%status, error = %err, "GLM-4 rejected the request");
            return Err(err);
        }

        let mut chunks = resp.bytes_stream();
        let mut turn = Turn::new();

        while let Some(item) = chunks.next().await {
            let bytes = item.map_err(|e| {
                tracing::error!(error = %e, "GLM-4 stream error");
                ChatError::transport(e)
            })?;

            if !self.deliver(&sink, &messages, turn.feed(&bytes)).await? {
                return Ok(());
            }
            if turn.is_finished() {
                tracing::debug!(chars = turn.text().len(), "GLM-4 stream terminated by sentinel");
                return Ok(());
            }
        }

        if !self.deliver(&sink, &messages, turn.close()).await? {
            return Ok(());
        }
        tracing::debug!(chars = turn.text().len(), "GLM-4 stream closed by server");
        Ok(())
    }

    /// Forward updates, committing the context just before the final one.
    /// Returns `false` when the consumer has gone away.
    async fn deliver(
        &self,
        sink: &UpdateSink,
        messages: &[Message],
        updates: Vec<TurnUpdate>,
    ) -> Result<bool, ChatError> {
        for update in updates {
            if sink.is_closed() {
                tracing::debug!("turn abandoned by consumer");
                return Ok(false);
            }
            if update.done {
                commit_turn(self.store.as_ref(), messages.to_vec(), &update.text)?;
            }
            if !sink.send(update).await {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

impl ChatBot for ZhipuBot {
    fn name(&self) -> &'static str {
        "zhipu"
    }

    fn check_availability(&self) -> BoxFuture<'_, bool> {
        Box::pin(self.probe())
    }

    fn stream(&self, prompt: String) -> TurnStream {
        let this = self.clone();
        spawn_turn(move |sink| this.run_turn(prompt, sink))
    }
}
