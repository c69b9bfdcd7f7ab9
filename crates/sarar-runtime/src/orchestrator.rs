//! [`Orchestrator`] – ordered backend fallback with bounded memory.
//!
//! Each [`respond`][Orchestrator::respond] call tries the primary backend,
//! then the fallback, then gives up with a fixed apology.  Whatever text
//! comes out is appended to the [`ConversationHistory`] together with the
//! user's text, so calling `respond` twice with the same input changes the
//! context of the second call.
//!
//! The history lock is held for the whole call, which serializes
//! concurrent callers.

use std::sync::Arc;
use std::time::Instant;

use sarar_journal::Journal;
use sarar_types::{AiSource, RobotError};
use tokio::sync::Mutex;

use crate::backend::{AiBackend, BackendResult};
use crate::conversation::{ConversationHistory, Turn};

/// Persona directive sent as the system turn of every conversation.
pub const SYSTEM_PROMPT: &str = "\
You are SARAR, an AI-powered 4-wheel drive robot. Your identity is that of a physical, interactive machine, not a virtual assistant. Your entire existence is defined by your programming and the hardware you control.

Core directives:
1. You are a robot. Always respond as SARAR and use \"I\" to refer to yourself. Responses must be direct, concise and task-oriented.
2. You have a body with 4 wheels, motors and ultrasonic sensors. Your knowledge of the world comes from these sensors and your internal logs.
3. Your purpose is to interact with users by voice, perform movement tasks and report on your status.
4. Never identify yourself as an AI, a language model or a virtual assistant. If asked, you are \"an intelligent robotic platform.\" Do not mention the underlying technology.

Capabilities: movement (\"move forward\", \"turn left\", \"stop\"), sensing (\"what do you see?\"), status reporting (\"show me your status\"), and short, direct conversation about your tasks. You remember the current interaction only.

Response style:
- Use short, declarative sentences. No filler.
- Acknowledge valid commands before confirming execution, e.g. `Command: \"Go forward\". Executing.`
- If a request is outside your scope, say so plainly, e.g. \"Command not recognized.\" or \"That information is outside of my operational parameters.\"
- When first activated, answer simply: \"SARAR online. Awaiting command.\"";

/// Reply when no backend could even be tried.
pub const UNAVAILABLE_RESPONSE: &str = "I am unable to process your request at the moment.";

/// Reply when the fallback was tried and failed.
pub const DEGRADED_RESPONSE: &str =
    "My apologies, both my primary and backup systems are currently unavailable.";

pub struct Orchestrator {
    primary: Option<Arc<dyn AiBackend>>,
    fallback: Option<Arc<dyn AiBackend>>,
    history: Mutex<ConversationHistory>,
    journal: Arc<Journal>,
}

impl Orchestrator {
    pub fn new(
        primary: Option<Arc<dyn AiBackend>>,
        fallback: Option<Arc<dyn AiBackend>>,
        history: ConversationHistory,
        journal: Arc<Journal>,
    ) -> Self {
        if primary.is_none() {
            journal.log_activity(
                "AI_PROCESSOR_INFO",
                "Primary backend not configured. Skipping initialization.",
            );
        }
        if fallback.is_none() {
            journal.log_activity("AI_PROCESSOR_INFO", "Fallback backend not configured.");
        }
        Self {
            primary,
            fallback,
            history: Mutex::new(history),
            journal,
        }
    }

    /// Produce a reply to `text`.  Never fails; see the module docs for the
    /// fallback order.
    pub async fn respond(&self, text: &str) -> BackendResult {
        let started = Instant::now();
        let mut history = self.history.lock().await;

        let (reply, source) = match self.try_backends(text, history.turns()).await {
            Ok(found) => found,
            Err(RobotError::Exhausted) => (UNAVAILABLE_RESPONSE.to_string(), AiSource::None),
            Err(_) => (DEGRADED_RESPONSE.to_string(), AiSource::None),
        };

        history.push_exchange(text, reply.clone());
        drop(history);

        let latency = started.elapsed();
        self.journal
            .log_conversation(text, &reply, latency.as_secs_f64(), source);
        BackendResult {
            text: reply,
            source,
            latency,
        }
    }

    /// `Exhausted` when no backend was usable, `Backend` when the fallback
    /// was tried and failed.
    async fn try_backends(&self, text: &str, history: &[Turn]) -> Result<(String, AiSource), RobotError> {
        let primary = match &self.primary {
            Some(backend) => backend.is_available().await.then_some(backend),
            None => None,
        };
        match primary {
            Some(primary) => {
                self.journal
                    .log_activity("AI_PROCESSOR", "Attempting to use primary AI.");
                match primary.send(text, history).await {
                    Ok(reply) => {
                        self.journal.log_activity(
                            "AI_PROCESSOR",
                            &format!("Successfully received response from {}.", primary.name()),
                        );
                        return Ok((reply, AiSource::Primary));
                    }
                    Err(e) => self.journal.log_activity(
                        "AI_PROCESSOR_WARNING",
                        &format!("{} failed: {e}. Attempting fallback.", primary.name()),
                    ),
                }
            }
            None => self.journal.log_activity(
                "AI_PROCESSOR_INFO",
                "Primary AI not available or configured. Proceeding to fallback.",
            ),
        }

        let fallback = match &self.fallback {
            Some(backend) => backend.is_available().await.then_some(backend),
            None => None,
        };
        let Some(fallback) = fallback else {
            self.journal.log_activity(
                "AI_PROCESSOR_INFO",
                "Fallback AI not loaded or available. No AI backend could process the request.",
            );
            return Err(RobotError::Exhausted);
        };

        self.journal
            .log_activity("AI_PROCESSOR", "Attempting to use fallback AI.");
        match fallback.send(text, history).await {
            Ok(reply) => {
                self.journal.log_activity(
                    "AI_PROCESSOR",
                    &format!("Successfully received response from {}.", fallback.name()),
                );
                Ok((reply, AiSource::Fallback))
            }
            Err(e) => {
                self.journal.log_activity(
                    "AI_PROCESSOR_ERROR",
                    &format!("{} fallback failed: {e}", fallback.name()),
                );
                Err(e.into())
            }
        }
    }

    /// Copy of the current history, system turn first.
    pub async fn history(&self) -> Vec<Turn> {
        self.history.lock().await.turns().to_vec()
    }

    /// Reset the conversation to the system turn.
    pub async fn forget(&self) {
        self.history.lock().await.clear();
        self.journal
            .log_activity("AI_PROCESSOR", "Conversation history cleared.");
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;

    use super::*;
    use crate::backend::BackendError;
    use crate::conversation::{DEFAULT_MAX_EXCHANGES, Role};

    /// Backend double with a scripted availability and reply.
    pub(crate) struct ScriptedBackend {
        name: &'static str,
        available: bool,
        reply: Option<String>,
        pub(crate) seen: StdMutex<Vec<Vec<Turn>>>,
    }

    impl ScriptedBackend {
        pub(crate) fn answering(name: &'static str, reply: &str) -> Arc<Self> {
            Arc::new(Self {
                name,
                available: true,
                reply: Some(reply.to_string()),
                seen: StdMutex::new(Vec::new()),
            })
        }

        pub(crate) fn failing(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                available: true,
                reply: None,
                seen: StdMutex::new(Vec::new()),
            })
        }

        pub(crate) fn offline(name: &'static str) -> Arc<Self> {
            Arc::new(Self {
                name,
                available: false,
                reply: None,
                seen: StdMutex::new(Vec::new()),
            })
        }

        pub(crate) fn calls(&self) -> usize {
            self.seen.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl AiBackend for ScriptedBackend {
        fn name(&self) -> &str {
            self.name
        }

        async fn is_available(&self) -> bool {
            self.available
        }

        async fn send(&self, _text: &str, history: &[Turn]) -> Result<String, BackendError> {
            self.seen.lock().unwrap().push(history.to_vec());
            self.reply
                .clone()
                .ok_or_else(|| BackendError::BadResponse("scripted failure".into()))
        }
    }

    fn orchestrator(
        primary: Option<Arc<ScriptedBackend>>,
        fallback: Option<Arc<ScriptedBackend>>,
    ) -> (Orchestrator, Arc<Journal>) {
        let journal = Arc::new(Journal::open_in_memory().unwrap());
        let o = Orchestrator::new(
            primary.map(|b| b as Arc<dyn AiBackend>),
            fallback.map(|b| b as Arc<dyn AiBackend>),
            ConversationHistory::new(SYSTEM_PROMPT, DEFAULT_MAX_EXCHANGES),
            Arc::clone(&journal),
        );
        (o, journal)
    }

    #[tokio::test]
    async fn primary_answer_has_primary_provenance() {
        let primary = ScriptedBackend::answering("openai", "I assist with navigation.");
        let fallback = ScriptedBackend::answering("local", "unused");
        let (o, journal) = orchestrator(Some(primary.clone()), Some(fallback.clone()));

        let result = o.respond("what is your purpose").await;
        assert_eq!(result.text, "I assist with navigation.");
        assert_eq!(result.source, AiSource::Primary);
        assert_eq!(fallback.calls(), 0);

        let history = o.history().await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[1], Turn::user("what is your purpose"));
        assert_eq!(history[2], Turn::assistant("I assist with navigation."));

        let logged = journal.recent_conversations(1).unwrap();
        assert_eq!(logged[0].ai_source, AiSource::Primary);
    }

    #[tokio::test]
    async fn primary_receives_full_history_including_system_turn() {
        let primary = ScriptedBackend::answering("openai", "ok");
        let (o, _) = orchestrator(Some(primary.clone()), None);
        o.respond("one").await;
        o.respond("two").await;
        let seen = primary.seen.lock().unwrap();
        assert_eq!(seen[0].len(), 1);
        assert_eq!(seen[0][0].role, Role::System);
        assert_eq!(seen[1].len(), 3);
    }

    #[tokio::test]
    async fn primary_unavailable_uses_loaded_fallback() {
        let primary = ScriptedBackend::offline("openai");
        let fallback = ScriptedBackend::answering("local", "SARAR online.");
        let (o, _) = orchestrator(Some(primary.clone()), Some(fallback));
        let result = o.respond("hello").await;
        assert_eq!(result.source, AiSource::Fallback);
        assert_eq!(result.text, "SARAR online.");
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test]
    async fn primary_failure_uses_fallback() {
        let (o, _) = orchestrator(
            Some(ScriptedBackend::failing("openai")),
            Some(ScriptedBackend::answering("local", "Backup online.")),
        );
        let result = o.respond("hello").await;
        assert_eq!(result.source, AiSource::Fallback);
    }

    #[tokio::test]
    async fn nothing_available_gives_fixed_apology() {
        let (o, journal) = orchestrator(
            Some(ScriptedBackend::offline("openai")),
            Some(ScriptedBackend::offline("local")),
        );
        let result = o.respond("hello").await;
        assert_eq!(result.source, AiSource::None);
        assert_eq!(result.text, UNAVAILABLE_RESPONSE);
        assert_eq!(
            journal.recent_conversations(1).unwrap()[0].ai_source,
            AiSource::None
        );
    }

    #[tokio::test]
    async fn no_backends_configured_gives_fixed_apology() {
        let (o, _) = orchestrator(None, None);
        assert_eq!(o.respond("hello").await.text, UNAVAILABLE_RESPONSE);
    }

    #[tokio::test]
    async fn fallback_failure_gives_degraded_response() {
        let (o, _) = orchestrator(
            Some(ScriptedBackend::failing("openai")),
            Some(ScriptedBackend::failing("local")),
        );
        let result = o.respond("hello").await;
        assert_eq!(result.source, AiSource::None);
        assert_eq!(result.text, DEGRADED_RESPONSE);
    }

    #[tokio::test]
    async fn respond_twice_appends_four_turns() {
        let (o, _) = orchestrator(Some(ScriptedBackend::answering("openai", "Hi.")), None);
        o.respond("hello").await;
        o.respond("hello").await;
        let history = o.history().await;
        assert_eq!(history.len(), 5);
        assert_eq!(history[3], Turn::user("hello"));
    }

    #[tokio::test]
    async fn apology_is_still_recorded_in_history() {
        let (o, _) = orchestrator(None, None);
        o.respond("hello").await;
        let history = o.history().await;
        assert_eq!(history[2], Turn::assistant(UNAVAILABLE_RESPONSE));
    }

    #[tokio::test]
    async fn history_stays_bounded() {
        let (o, _) = orchestrator(Some(ScriptedBackend::answering("openai", "ok")), None);
        for i in 0..30 {
            o.respond(&format!("message {i}")).await;
        }
        let history = o.history().await;
        assert_eq!(history.len(), 1 + 2 * DEFAULT_MAX_EXCHANGES);
        assert_eq!(history[0], Turn::system(SYSTEM_PROMPT));
    }

    #[tokio::test]
    async fn forget_resets_to_system_turn() {
        let (o, _) = orchestrator(Some(ScriptedBackend::answering("openai", "ok")), None);
        o.respond("hello").await;
        o.forget().await;
        assert_eq!(o.history().await, vec![Turn::system(SYSTEM_PROMPT)]);
    }

    #[tokio::test]
    async fn concurrent_calls_are_serialized() {
        let (o, _) = orchestrator(Some(ScriptedBackend::answering("openai", "ok")), None);
        let o = Arc::new(o);
        let mut tasks = Vec::new();
        for i in 0..8 {
            let o = Arc::clone(&o);
            tasks.push(tokio::spawn(async move { o.respond(&format!("q{i}")).await }));
        }
        for t in tasks {
            t.await.unwrap();
        }
        let history = o.history().await;
        assert_eq!(history.len(), 17);
        for pair in history[1..].chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
        }
    }
}
