//! [`LocalBackend`] – fallback backend on the robot's own Ollama server.
//!
//! Whether the model is "loaded" is decided once by [`LocalBackend::probe`]:
//! the configured model must appear in `/api/tags`.  A reply is requested
//! from `/api/chat` first; if that fails or comes back empty the whole
//! conversation is flattened into `role: content` lines and sent to
//! `/api/generate` instead.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::backend::{AiBackend, BackendError, build_messages};
use crate::conversation::Turn;

/// Reply length cap passed to the engine (`num_predict`).
pub const MAX_REPLY_TOKENS: u32 = 150;

/// Generation on a Raspberry Pi is slow; allow for it.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

// ─────────────────────────────────────────────────────────────────────────────
// Wire shapes
// ─────────────────────────────────────────────────────────────────────────────

/// A model entry from `/api/tags`.
#[derive(Debug, Clone, Deserialize)]
pub struct LocalModel {
    pub name: String,
}

#[derive(Deserialize)]
struct TagsResponse {
    models: Vec<LocalModel>,
}

#[derive(Serialize)]
struct Options {
    num_predict: u32,
    num_ctx: u32,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    stream: bool,
    options: Options,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Option<Turn>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: Options,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// LocalBackend
// ─────────────────────────────────────────────────────────────────────────────

pub struct LocalBackend {
    base_url: String,
    model: String,
    context_length: u32,
    loaded: AtomicBool,
    client: reqwest::Client,
}

impl LocalBackend {
    /// Create an unloaded backend.  Call [`probe`][Self::probe] before use.
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, context_length: u32) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            context_length,
            loaded: AtomicBool::new(false),
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    /// Fetch the models downloaded on the engine.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError::Http`] when the engine is unreachable.
    pub async fn list_models(&self) -> Result<Vec<LocalModel>, BackendError> {
        let url = format!("{}/api/tags", self.base_url);
        let tags: TagsResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(tags.models)
    }

    /// Decide whether the configured model is loaded.  Returns the decision.
    pub async fn probe(&self) -> bool {
        let loaded = match self.list_models().await {
            Ok(models) => {
                let found = models.iter().any(|m| model_matches(&m.name, &self.model));
                if found {
                    info!(subsystem = "LOCAL_LLM", model = %self.model, "local model available");
                } else {
                    warn!(subsystem = "LOCAL_LLM_WARNING", model = %self.model, "local model not found on engine");
                }
                found
            }
            Err(e) => {
                warn!(subsystem = "LOCAL_LLM_WARNING", error = %e, "local engine unreachable");
                false
            }
        };
        self.loaded.store(loaded, Ordering::SeqCst);
        loaded
    }

    fn options(&self) -> Options {
        Options {
            num_predict: MAX_REPLY_TOKENS,
            num_ctx: self.context_length,
        }
    }

    async fn chat(&self, messages: &[Turn]) -> Result<String, BackendError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: self.options(),
        };
        let response: ChatResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        response
            .message
            .map(|m| m.content.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| BackendError::BadResponse("empty response from chat completion".into()))
    }

    async fn generate(&self, messages: &[Turn]) -> Result<String, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            prompt: flatten(messages),
            stream: false,
            options: self.options(),
        };
        let response: GenerateResponse = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let text = response.response.trim().to_string();
        if text.is_empty() {
            return Err(BackendError::BadResponse("simple generation produced no text".into()));
        }
        Ok(text)
    }
}

#[async_trait]
impl AiBackend for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn is_available(&self) -> bool {
        self.is_loaded()
    }

    async fn send(&self, text: &str, history: &[Turn]) -> Result<String, BackendError> {
        if !self.is_loaded() {
            return Err(BackendError::NotLoaded(self.model.clone()));
        }
        let messages = build_messages(history, text);
        match self.chat(&messages).await {
            Ok(reply) => Ok(reply),
            Err(e) => {
                warn!(subsystem = "LOCAL_LLM_WARNING", error = %e, "chat completion failed; falling back to simple generation");
                self.generate(&messages).await
            }
        }
    }
}

/// `"llama3"` matches `"llama3"` and `"llama3:latest"`.
fn model_matches(listed: &str, wanted: &str) -> bool {
    listed == wanted || listed.split(':').next() == Some(wanted)
}

fn flatten(messages: &[Turn]) -> String {
    messages
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), m.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub_http::StubServer;

    const TAGS: &str = r#"{"models":[{"name":"phi3:latest"},{"name":"nomic-embed-text:latest"}]}"#;

    #[test]
    fn model_name_matching() {
        assert!(model_matches("phi3:latest", "phi3"));
        assert!(model_matches("phi3:mini", "phi3:mini"));
        assert!(!model_matches("phi3:latest", "phi"));
    }

    #[test]
    fn flatten_uses_role_prefixes() {
        let msgs = vec![Turn::system("persona"), Turn::user("hi")];
        assert_eq!(flatten(&msgs), "system: persona\nuser: hi");
    }

    #[tokio::test]
    async fn probe_marks_listed_model_loaded() {
        let server = StubServer::start(vec![("/api/tags", 200, TAGS.into())]).await;
        let backend = LocalBackend::new(&server.base_url, "phi3", 4096);
        assert!(!backend.is_available().await);
        assert!(backend.probe().await);
        assert!(backend.is_available().await);
    }

    #[tokio::test]
    async fn probe_missing_model_stays_unloaded() {
        let server = StubServer::start(vec![("/api/tags", 200, TAGS.into())]).await;
        let backend = LocalBackend::new(&server.base_url, "llama3", 4096);
        assert!(!backend.probe().await);
        let err = backend.send("hi", &[]).await.unwrap_err();
        assert!(matches!(err, BackendError::NotLoaded(_)));
    }

    #[tokio::test]
    async fn chat_reply_is_trimmed_and_sends_options() {
        let server = StubServer::start(vec![
            ("/api/tags", 200, TAGS.into()),
            (
                "/api/chat",
                200,
                r#"{"message":{"role":"assistant","content":"  Awaiting command.  "},"done":true}"#.into(),
            ),
        ])
        .await;
        let backend = LocalBackend::new(&server.base_url, "phi3", 2048);
        backend.probe().await;

        let reply = backend.send("hello", &[Turn::system("persona")]).await.unwrap();
        assert_eq!(reply, "Awaiting command.");

        let (_, body) = server.requests().pop().unwrap();
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["options"]["num_predict"], 150);
        assert_eq!(body["options"]["num_ctx"], 2048);
    }

    #[tokio::test]
    async fn empty_chat_falls_back_to_generate() {
        let server = StubServer::start(vec![
            ("/api/tags", 200, TAGS.into()),
            ("/api/chat", 200, r#"{"message":{"role":"assistant","content":""}}"#.into()),
            ("/api/generate", 200, r#"{"response":"Command not recognized.","done":true}"#.into()),
        ])
        .await;
        let backend = LocalBackend::new(&server.base_url, "phi3", 4096);
        backend.probe().await;

        let reply = backend.send("dance", &[Turn::system("persona")]).await.unwrap();
        assert_eq!(reply, "Command not recognized.");

        let (path, body) = server.requests().pop().unwrap();
        assert_eq!(path, "/api/generate");
        let body: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(body["prompt"], "system: persona\nuser: dance");
    }

    #[tokio::test]
    async fn both_paths_failing_is_an_error() {
        let server = StubServer::start(vec![
            ("/api/tags", 200, TAGS.into()),
            ("/api/chat", 500, "{}".into()),
            ("/api/generate", 500, "{}".into()),
        ])
        .await;
        let backend = LocalBackend::new(&server.base_url, "phi3", 4096);
        backend.probe().await;
        assert!(matches!(
            backend.send("hi", &[]).await,
            Err(BackendError::Http(_))
        ));
    }
}
