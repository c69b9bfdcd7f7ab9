//! The AI backend contract shared by the remote and local engines.

use std::time::Duration;

use async_trait::async_trait;
use sarar_types::{AiSource, RobotError};
use thiserror::Error;

use crate::conversation::Turn;

// ─────────────────────────────────────────────────────────────────────────────
// Error type
// ─────────────────────────────────────────────────────────────────────────────

/// Errors that can arise from a backend call.  Never shown to the user.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The HTTP request failed or returned an error status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with something we cannot use.
    #[error("Unexpected response format: {0}")]
    BadResponse(String),
    /// The local model is not present on the engine.
    #[error("Model not loaded: {0}")]
    NotLoaded(String),
}

impl From<BackendError> for RobotError {
    fn from(e: BackendError) -> Self {
        RobotError::Backend(e.to_string())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Trait
// ─────────────────────────────────────────────────────────────────────────────

/// A chat-capable AI response provider.
#[async_trait]
pub trait AiBackend: Send + Sync {
    /// Short name used in logs, e.g. `"openai"`.
    fn name(&self) -> &str;

    /// Liveness check.  May touch the network.
    async fn is_available(&self) -> bool;

    /// Send `text` with `history` (system turn first) as context and return
    /// the reply.  The new user turn is appended to the outgoing messages;
    /// `history` itself is not modified.
    async fn send(&self, text: &str, history: &[Turn]) -> Result<String, BackendError>;
}

/// Outcome of one orchestrated call.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendResult {
    pub text: String,
    pub source: AiSource,
    pub latency: Duration,
}

/// `history` followed by a user turn holding `text`.
pub fn build_messages(history: &[Turn], text: &str) -> Vec<Turn> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.extend_from_slice(history);
    messages.push(Turn::user(text));
    messages
}

// ─────────────────────────────────────────────────────────────────────────────
// Model selection
// ─────────────────────────────────────────────────────────────────────────────

const CHAT_MARKERS: &[&str] = &["chat", "instruct", "gguf"];
const EMBEDDING_MARKER: &str = "embedding";

/// Pick the model to talk to from the ids a server reports.
///
/// Prefers the first id with a chat/instruct marker, then the first id that
/// is not an embedding model, else `None` (keep the configured default).
pub fn select_model(available: &[String]) -> Option<&str> {
    let usable = |m: &&String| !m.to_lowercase().contains(EMBEDDING_MARKER);
    available
        .iter()
        .filter(usable)
        .find(|m| {
            let lower = m.to_lowercase();
            CHAT_MARKERS.iter().any(|k| lower.contains(k))
        })
        .or_else(|| available.iter().find(usable))
        .map(String::as_str)
}
