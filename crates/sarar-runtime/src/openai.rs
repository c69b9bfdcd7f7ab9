//! [`OpenAiBackend`] – primary backend over an OpenAI-compatible chat API.
//!
//! Talks to any server exposing `GET {base}/models` and
//! `POST {base}/chat/completions` (OpenAI itself, KoboldCpp, LM Studio,
//! llama.cpp server …).  `base` includes the version segment, e.g.
//! `http://localhost:5001/v1`.
//!
//! # Example
//!
//! ```rust,no_run
//! use sarar_runtime::openai::OpenAiBackend;
//!
//! # async fn demo() {
//! let backend = OpenAiBackend::new("http://localhost:5001/v1", Some("sk-…".into()), "gpt-3.5-turbo", 0.7);
//! backend.autoselect_model().await;
//! # }
//! ```

use std::sync::RwLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{AiBackend, BackendError, build_messages, select_model};
use crate::conversation::Turn;

/// Upper bound on any single request to the remote API.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ─────────────────────────────────────────────────────────────────────────────
// Internal request / response shapes
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    temperature: f32,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAiBackend
// ─────────────────────────────────────────────────────────────────────────────

/// Async client for an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiBackend {
    base_url: String,
    api_key: Option<String>,
    model: RwLock<String>,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiBackend {
    /// Create a backend for `base_url` using `model` until
    /// [`autoselect_model`][Self::autoselect_model] picks another.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!(subsystem = "OPENAI_CLIENT", %base_url, "initializing OpenAI-compatible client");
        Self {
            base_url,
            api_key: api_key.filter(|k| !k.is_empty()),
            model: RwLock::new(model.into()),
            temperature,
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    /// The model name currently sent with each request.
    pub fn model(&self) -> String {
        self.model
            .read()
            .map(|m| m.clone())
            .unwrap_or_default()
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }

    /// Fetch the ids of every model the server offers.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Http`] if the request fails.
    pub async fn list_models(&self) -> Result<Vec<String>, BackendError> {
        let url = format!("{}/models", self.base_url);
        let list: ModelList = self
            .authorized(self.client.get(&url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }

    /// Ask the server for its models once and switch to the best chat model.
    /// Any failure keeps the configured default.
    pub async fn autoselect_model(&self) {
        match self.list_models().await {
            Ok(models) => {
                debug!(subsystem = "OPENAI_CLIENT", ?models, "found models");
                match select_model(&models) {
                    Some(chosen) => {
                        info!(subsystem = "AI_PROCESSOR", model = chosen, "automatically selected model");
                        if let Ok(mut m) = self.model.write() {
                            *m = chosen.to_string();
                        }
                    }
                    None => warn!(
                        subsystem = "AI_PROCESSOR_WARNING",
                        model = %self.model(),
                        "no suitable chat model found; using default"
                    ),
                }
            }
            Err(e) => warn!(
                subsystem = "AI_PROCESSOR_WARNING",
                error = %e,
                model = %self.model(),
                "could not select a model automatically; using default"
            ),
        }
    }
}

#[async_trait]
impl AiBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn is_available(&self) -> bool {
        match self.list_models().await {
            Ok(_) => true,
            Err(e) => {
                warn!(subsystem = "OPENAI_CLIENT_ERROR", error = %e, "API availability check failed");
                false
            }
        }
    }

    async fn send(&self, text: &str, history: &[Turn]) -> Result<String, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        let model = self.model();
        let messages = build_messages(history, text);
        let body = ChatRequest {
            model: &model,
            messages: &messages,
            temperature: self.temperature,
            stream: false,
        };
        debug!(subsystem = "OPENAI_CLIENT", %model, "sending message");

        let response: ChatResponse = self
            .authorized(self.client.post(&url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| BackendError::BadResponse("no response choices received".into()))
    }
}
