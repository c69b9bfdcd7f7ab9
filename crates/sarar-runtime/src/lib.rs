//! `sarar-runtime` – Command interpretation and AI response pipeline.
//!
//! Raw text goes in; motion, speech and face changes come out.
//!
//! # Modules
//!
//! - [`intent`] – ordered keyword table and [`classify`][intent::classify].
//! - [`conversation`] – bounded [`ConversationHistory`][conversation::ConversationHistory]
//!   of [`Turn`][conversation::Turn]s.
//! - [`backend`] – the [`AiBackend`][backend::AiBackend] trait,
//!   [`BackendResult`][backend::BackendResult] and model selection.
//! - [`openai`] – primary backend over an OpenAI-compatible chat API.
//! - [`local`] – fallback backend on the robot's Ollama engine.
//! - [`orchestrator`] – [`Orchestrator`][orchestrator::Orchestrator]: ordered
//!   fallback, history update and conversation journaling.
//! - [`interpreter`] – [`CommandInterpreter`][interpreter::CommandInterpreter]:
//!   classification, sensor-gated motion, status reports, speech and face.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: global
//!   `tracing` subscriber with optional OTLP export.

pub mod backend;
pub mod conversation;
pub mod intent;
pub mod interpreter;
pub mod local;
pub mod openai;
pub mod orchestrator;
pub mod telemetry;

#[cfg(test)]
mod stub_http;

pub use backend::{AiBackend, BackendError, BackendResult, select_model};
pub use conversation::{ConversationHistory, DEFAULT_MAX_EXCHANGES, Role, Turn};
pub use intent::{Intent, classify};
pub use interpreter::{CommandInterpreter, CommandOutcome, InterpreterConfig, TROUBLE_RESPONSE};
pub use local::LocalBackend;
pub use openai::OpenAiBackend;
pub use orchestrator::{DEGRADED_RESPONSE, Orchestrator, SYSTEM_PROMPT, UNAVAILABLE_RESPONSE};
pub use telemetry::{TelemetryConfig, TracerProviderGuard, init_tracing};
