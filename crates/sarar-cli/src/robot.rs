//! Boot and shutdown of the assembled robot.
//!
//! [`Robot::boot`] wires every subsystem from a [`Config`] and prints one
//! progress line per stage.  Only the journal is mandatory; a missing voice
//! model or an offline AI backend degrades that subsystem and boot carries on.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use tracing::{info, warn};

use sarar_face::{
    CommandVoice, ConsoleVoice, ExpressionSink, FaceDisplay, FaceRenderer, HeadlessFace,
    TerminalFace, UtteranceSink, VoiceCommand,
};
use sarar_hal::{
    ActuationGateway, DriveConfig, DriveController, Platform, ProximityGateway, SimRangeSensors,
    motors_for_platform,
};
use sarar_journal::Journal;
use sarar_runtime::{
    AiBackend, CommandInterpreter, ConversationHistory, InterpreterConfig, LocalBackend,
    OpenAiBackend, Orchestrator, SYSTEM_PROMPT,
};
use sarar_types::{Expression, RobotError};

use crate::config::{Config, FaceKind, VoiceKind};

const BOOT_STAGES: usize = 7;

/// How long the shutdown face stays up before the display closes.
const FAREWELL_FACE: Duration = Duration::from_millis(500);

/// Every subsystem of a running robot.
pub struct Robot {
    pub journal: Arc<Journal>,
    pub drive: Arc<DriveController>,
    pub face: Arc<FaceDisplay>,
    pub voice: Arc<dyn UtteranceSink>,
    pub interpreter: Arc<CommandInterpreter>,
    pub primary: Option<Arc<OpenAiBackend>>,
    pub local: Option<Arc<LocalBackend>>,
    /// The voice does not print, so the REPL echoes replies itself.
    pub echo_responses: bool,
}

impl Robot {
    /// Bring up every subsystem described by `cfg`.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Configuration`] when the journal cannot be
    /// opened or the face thread cannot start.
    pub async fn boot(cfg: &Config, home: &str) -> Result<Self, RobotError> {
        // ── Journal ───────────────────────────────────────────────────────
        stage(1, "Journal");
        let journal_path = cfg.journal_path(home);
        if let Some(parent) = journal_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RobotError::Configuration(format!(
                    "cannot create journal directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        let journal = Journal::open(&journal_path.to_string_lossy())
            .map_err(|e| RobotError::Configuration(format!("cannot open journal: {e}")))?
            .with_max_entries(cfg.logging.max_log_entries);
        let journal = Arc::new(journal);
        journal.log_activity("SYSTEM", "SARAR booting.");
        ok(&journal_path.display().to_string());

        // ── Drive ─────────────────────────────────────────────────────────
        stage(2, "Motors");
        let drive = Arc::new(DriveController::new(
            motors_for_platform(cfg.hardware.platform),
            journal.clone(),
            DriveConfig {
                move_duration: cfg.hardware.move_duration(),
                turn_angle: cfg.hardware.turn_angle(),
                ..DriveConfig::default()
            },
        ));
        ok(&cfg.hardware.platform.to_string());

        // ── Sensors ───────────────────────────────────────────────────────
        stage(3, "Range sensors");
        if cfg.hardware.platform == Platform::RaspberryPi {
            warn!(
                subsystem = "SENSOR_ERROR",
                "ultrasonic sensors not available in this build; using simulated readings"
            );
        }
        let sensors: Arc<dyn ProximityGateway> = Arc::new(SimRangeSensors::new("sim_ultrasonic"));
        ok(sensors.id());

        // ── Face ──────────────────────────────────────────────────────────
        stage(4, "Face");
        let renderer: Box<dyn FaceRenderer> = match cfg.display.renderer {
            FaceKind::Terminal => Box::new(TerminalFace::new()),
            FaceKind::Headless => Box::new(HeadlessFace::new()),
        };
        let renderer_id = renderer.id().to_string();
        let face = Arc::new(FaceDisplay::start(renderer, journal.clone())?);
        ok(&renderer_id);

        // ── Voice ─────────────────────────────────────────────────────────
        stage(5, "Voice");
        let (voice, echo_responses) = build_voice(cfg, &journal);

        // ── AI backends ───────────────────────────────────────────────────
        stage(6, "AI backends");
        let primary = build_primary(cfg).await;
        let local = build_local(cfg).await;
        match (&primary, &local) {
            (None, None) => println!("{}", "NONE".yellow()),
            _ => println!("{}", "OK".green()),
        }

        // ── Interpreter ───────────────────────────────────────────────────
        stage(7, "Interpreter");
        let orchestrator = Arc::new(Orchestrator::new(
            primary.clone().map(|b| b as Arc<dyn AiBackend>),
            local.clone().map(|b| b as Arc<dyn AiBackend>),
            ConversationHistory::new(SYSTEM_PROMPT, cfg.ai.max_exchanges),
            journal.clone(),
        ));
        let interpreter = Arc::new(CommandInterpreter::new(
            drive.clone() as Arc<dyn ActuationGateway>,
            sensors,
            face.clone() as Arc<dyn ExpressionSink>,
            voice.clone(),
            orchestrator,
            journal.clone(),
            InterpreterConfig::default(),
        ));
        ok("ready");

        journal.log_activity("SYSTEM", "SARAR online.");
        Ok(Self {
            journal,
            drive,
            face,
            voice,
            interpreter,
            primary,
            local,
            echo_responses,
        })
    }

    /// Halt the wheels, show the shutdown face, close the display and the
    /// voice.
    pub async fn shutdown(&self) {
        if let Err(e) = self.drive.stop().await {
            warn!(subsystem = "MOTOR_ERROR", error = %e, "stop on shutdown failed");
        }
        self.face.set_state(Expression::Crashed);
        tokio::time::sleep(FAREWELL_FACE).await;
        self.face.stop();
        self.voice.cleanup().await;
        self.journal.log_activity("SYSTEM", "SARAR shut down.");
        info!(subsystem = "SYSTEM", "shutdown complete");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Subsystem builders
// ─────────────────────────────────────────────────────────────────────────────

fn build_voice(cfg: &Config, journal: &Arc<Journal>) -> (Arc<dyn UtteranceSink>, bool) {
    if cfg.audio.voice == VoiceKind::Piper {
        let player = VoiceCommand {
            program: cfg.audio.player.clone(),
            ..VoiceCommand::aplay()
        };
        match CommandVoice::new(
            cfg.audio.voice_model_path(),
            VoiceCommand::piper(),
            player,
            journal.clone(),
        ) {
            Ok(voice) => {
                ok(&cfg.audio.piper_voice);
                return (Arc::new(voice), true);
            }
            Err(e) => {
                journal.log_activity("TTS_ERROR", &e.to_string());
                println!("{} ({e})", "console fallback".yellow());
                return (Arc::new(ConsoleVoice::new(journal.clone())), false);
            }
        }
    }
    ok("console");
    (Arc::new(ConsoleVoice::new(journal.clone())), false)
}

/// The primary backend exists only when an API key is configured.
async fn build_primary(cfg: &Config) -> Option<Arc<OpenAiBackend>> {
    if cfg.ai.openai_api_key.is_empty() {
        print!("primary {} ", "off".dimmed());
        return None;
    }
    let backend = Arc::new(OpenAiBackend::new(
        cfg.ai.openai_api_base.clone(),
        Some(cfg.ai.openai_api_key.expose().to_string()),
        cfg.ai.openai_model.clone(),
        cfg.ai.temperature,
    ));
    backend.autoselect_model().await;
    print!("primary {} ", backend.model().bold());
    Some(backend)
}

/// The fallback backend exists when a model name is configured; it answers
/// only once the engine has reported that model.
async fn build_local(cfg: &Config) -> Option<Arc<LocalBackend>> {
    if cfg.ai.local_model.trim().is_empty() {
        print!("local {} ", "off".dimmed());
        return None;
    }
    let backend = Arc::new(LocalBackend::new(
        cfg.ai.local_url.clone(),
        cfg.ai.local_model.clone(),
        cfg.ai.max_context_length,
    ));
    if backend.probe().await {
        print!("local {} ", backend.model().bold());
    } else {
        print!("local {} ", "offline".yellow());
    }
    Some(backend)
}

// ─────────────────────────────────────────────────────────────────────────────
// Progress output
// ─────────────────────────────────────────────────────────────────────────────

fn stage(n: usize, label: &str) {
    print!("  [{n}/{BOOT_STAGES}] {} … ", label.bold());
    std::io::stdout().flush().ok();
}

fn ok(detail: &str) {
    println!("{} {}", "OK".green(), detail.dimmed());
}
