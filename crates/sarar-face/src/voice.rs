//! Speech output.
//!
//! An [`UtteranceSink`] speaks one utterance at a time and returns only when
//! playback has finished.  Both voices here hold an async mutex for the
//! whole utterance, so concurrent callers queue rather than talk over each
//! other, and both write one speech record per utterance to the journal.
//!
//! [`CommandVoice`] shells out to an external synthesizer (Piper by
//! default) that writes a WAV file, then to a player program.  Command
//! arguments may contain two placeholders:
//!
//! - `{model}` – the configured voice model path
//! - `{wav}` – a fresh temporary WAV path for this utterance
//!
//! The utterance text is written to the synthesizer's stdin.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use colored::Colorize;
use sarar_journal::Journal;
use sarar_types::RobotError;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// Speaks text aloud.
#[async_trait]
pub trait UtteranceSink: Send + Sync {
    /// Speak `text`, returning once playback has ended.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Gateway`] when synthesis or playback fails.
    /// The failure has already been journaled.
    async fn speak(&self, text: &str) -> Result<(), RobotError>;

    /// Release audio resources.
    async fn cleanup(&self) {}
}

// ────────────────────────────────────────────────────────────────────────────
// Console voice
// ────────────────────────────────────────────────────────────────────────────

/// Prints utterances to stdout instead of synthesizing them.
pub struct ConsoleVoice {
    journal: Arc<Journal>,
    speaking: Mutex<()>,
}

impl ConsoleVoice {
    pub fn new(journal: Arc<Journal>) -> Self {
        Self {
            journal,
            speaking: Mutex::new(()),
        }
    }
}

#[async_trait]
impl UtteranceSink for ConsoleVoice {
    async fn speak(&self, text: &str) -> Result<(), RobotError> {
        let _turn = self.speaking.lock().await;
        println!("  {} {}", "SARAR ›".bold().magenta(), text);
        self.journal.log_speech(text, true);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// External synthesizer voice
// ────────────────────────────────────────────────────────────────────────────

/// A program plus its argument template.
#[derive(Debug, Clone, PartialEq)]
pub struct VoiceCommand {
    pub program: String,
    pub args: Vec<String>,
}

impl VoiceCommand {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    /// `piper --model {model} --output_file {wav}`
    pub fn piper() -> Self {
        Self::new("piper", &["--model", "{model}", "--output_file", "{wav}"])
    }

    /// `aplay -q {wav}`
    pub fn aplay() -> Self {
        Self::new("aplay", &["-q", "{wav}"])
    }

    fn expand(&self, model: &Path, wav: &Path) -> Vec<String> {
        let model = model.to_string_lossy();
        let wav = wav.to_string_lossy();
        self.args
            .iter()
            .map(|a| a.replace("{model}", &model).replace("{wav}", &wav))
            .collect()
    }
}

/// Voice backed by an external text-to-speech program and a WAV player.
pub struct CommandVoice {
    model_path: PathBuf,
    synthesizer: VoiceCommand,
    player: VoiceCommand,
    journal: Arc<Journal>,
    speaking: Mutex<()>,
}

impl CommandVoice {
    /// # Errors
    ///
    /// Returns [`RobotError::Configuration`] when `model_path` does not
    /// exist.
    pub fn new(
        model_path: impl Into<PathBuf>,
        synthesizer: VoiceCommand,
        player: VoiceCommand,
        journal: Arc<Journal>,
    ) -> Result<Self, RobotError> {
        let model_path = model_path.into();
        if !model_path.exists() {
            return Err(RobotError::Configuration(format!(
                "Voice model file not found at: {}",
                model_path.display()
            )));
        }
        journal.log_activity(
            "TTS",
            &format!("Voice ready: {} with model {}", synthesizer.program, model_path.display()),
        );
        Ok(Self {
            model_path,
            synthesizer,
            player,
            journal,
            speaking: Mutex::new(()),
        })
    }

    async fn synthesize_and_play(&self, text: &str, wav: &Path) -> Result<(), RobotError> {
        let args = self.synthesizer.expand(&self.model_path, wav);
        debug!(program = %self.synthesizer.program, ?args, "running synthesizer");
        let mut child = Command::new(&self.synthesizer.program)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| RobotError::gateway("tts", format!("cannot start {}: {e}", self.synthesizer.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A synthesizer that ignores stdin may already have exited.
            let _ = stdin.write_all(text.as_bytes()).await;
            let _ = stdin.write_all(b"\n").await;
        }
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| RobotError::gateway("tts", e.to_string()))?;
        if !output.status.success() {
            return Err(RobotError::gateway(
                "tts",
                format!(
                    "{} failed with {}: {}",
                    self.synthesizer.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            ));
        }

        let status = Command::new(&self.player.program)
            .args(self.player.expand(&self.model_path, wav))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(|e| RobotError::gateway("audio", format!("cannot start {}: {e}", self.player.program)))?;
        if !status.success() {
            return Err(RobotError::gateway(
                "audio",
                format!("{} failed with {status}", self.player.program),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl UtteranceSink for CommandVoice {
    async fn speak(&self, text: &str) -> Result<(), RobotError> {
        let _turn = self.speaking.lock().await;
        let wav = std::env::temp_dir().join(format!("sarar-{}.wav", Uuid::new_v4()));

        let preview: String = text.chars().take(50).collect();
        self.journal.log_activity("TTS", &format!("Speaking: '{preview}'"));
        let result = self.synthesize_and_play(text, &wav).await;

        if tokio::fs::try_exists(&wav).await.unwrap_or(false)
            && let Err(e) = tokio::fs::remove_file(&wav).await
        {
            self.journal
                .log_activity("TTS_WARN", &format!("Could not remove temp file: {e}"));
        }

        match &result {
            Ok(()) => self.journal.log_speech(text, true),
            Err(e) => {
                self.journal.log_speech(text, false);
                self.journal.log_activity("TTS_ERROR", &e.to_string());
            }
        }
        result
    }

    async fn cleanup(&self) {
        let _turn = self.speaking.lock().await;
        self.journal.log_activity("TTS", "Voice shut down.");
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
