//! [`CommandInterpreter`] – the root of the command pipeline.
//!
//! Classifies raw text, gates movement on a fresh proximity reading,
//! answers status queries from the sensors, and hands everything else to
//! the [`Orchestrator`].  The face is driven around every action and always
//! ends on [`Expression::Neutral`]; any spoken reply goes through one
//! speak-and-revert helper.
//!
//! Calls are serialized: a second command waits until the first has
//! finished speaking.  [`ActuationGateway::stop`] can still be reached
//! directly (Ctrl-C) without going through the interpreter.

use std::sync::Arc;
use std::time::Duration;

use sarar_face::{ExpressionSink, UtteranceSink};
use sarar_hal::{ActuationGateway, ProximityGateway};
use sarar_journal::Journal;
use sarar_types::{AiSource, Direction, Expression, ObstacleReading, RobotError};
use tokio::sync::Mutex;

use crate::intent::{Intent, classify, normalize};
use crate::orchestrator::Orchestrator;

/// Spoken in place of an AI reply that signals failure.
pub const TROUBLE_RESPONSE: &str = "I'm sorry, I had trouble with that request.";

const FAILURE_MARKERS: &[&str] = &["unable to process", "my apologies"];

/// Timing knobs for the interpreter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpreterConfig {
    /// How long the thinking (and confused) face stays up around an AI
    /// call.
    pub thinking_pause: Duration,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            thinking_pause: Duration::from_millis(500),
        }
    }
}

/// What one [`interpret`][CommandInterpreter::interpret] call did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandOutcome {
    /// `None` for empty input.
    pub intent: Option<Intent>,
    /// An actuation call was made and succeeded.
    pub actuated: bool,
    /// Text that was spoken, if any.
    pub response: Option<String>,
    /// Provenance of an AI reply.
    pub source: Option<AiSource>,
}

/// `true` when an AI reply is empty or reads as a failure.
pub fn is_failure_response(text: &str) -> bool {
    let lower = text.to_lowercase();
    lower.trim().is_empty() || FAILURE_MARKERS.iter().any(|m| lower.contains(m))
}

/// Sentence spoken when `direction` is blocked.
pub fn refusal(direction: Direction) -> &'static str {
    match direction {
        Direction::Forward => "I can't move forward, there is an obstacle in my way.",
        Direction::Left => "I can't turn left, there is something in the way.",
        Direction::Right => "I can't turn right, there is something in the way.",
        Direction::Backward => "I can't move backward, there is something in the way.",
    }
}

/// Sentence spoken for a status query.
pub fn status_report(r: &ObstacleReading) -> String {
    format!(
        "My sensors detect the following distances: Front {:.1} cm, Left {:.1} cm, and Right {:.1} cm.",
        r.front, r.left, r.right
    )
}

pub struct CommandInterpreter {
    drive: Arc<dyn ActuationGateway>,
    sensors: Arc<dyn ProximityGateway>,
    face: Arc<dyn ExpressionSink>,
    voice: Arc<dyn UtteranceSink>,
    orchestrator: Arc<Orchestrator>,
    journal: Arc<Journal>,
    config: InterpreterConfig,
    serial: Mutex<()>,
}

impl CommandInterpreter {
    pub fn new(
        drive: Arc<dyn ActuationGateway>,
        sensors: Arc<dyn ProximityGateway>,
        face: Arc<dyn ExpressionSink>,
        voice: Arc<dyn UtteranceSink>,
        orchestrator: Arc<Orchestrator>,
        journal: Arc<Journal>,
        config: InterpreterConfig,
    ) -> Self {
        Self {
            drive,
            sensors,
            face,
            voice,
            orchestrator,
            journal,
            config,
            serial: Mutex::new(()),
        }
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Classify and execute one command.
    pub async fn interpret(&self, text: &str) -> CommandOutcome {
        let Some(intent) = classify(text) else {
            return CommandOutcome::default();
        };
        let _turn = self.serial.lock().await;

        let command = normalize(text);
        self.journal.log_activity(
            "COMMAND_PROCESSOR",
            &format!("Processing command: '{command}'"),
        );

        let mut outcome = CommandOutcome {
            intent: Some(intent),
            ..CommandOutcome::default()
        };
        match intent {
            Intent::MoveForward => self.gated_move(Direction::Forward, &mut outcome).await,
            Intent::TurnLeft => self.gated_move(Direction::Left, &mut outcome).await,
            Intent::TurnRight => self.gated_move(Direction::Right, &mut outcome).await,
            Intent::MoveBackward => {
                // No rear sensor: backward is never gated.
                self.face.set_state(Expression::Happy);
                outcome.actuated = self.actuate(Direction::Backward).await;
            }
            Intent::Stop => {
                outcome.actuated = self.report_actuation("stop", self.drive.stop().await);
                self.face.set_state(Expression::Neutral);
            }
            Intent::StatusQuery => {
                self.face.set_state(Expression::Thinking);
                match self.sensors.distances() {
                    Ok(readings) => outcome.response = Some(status_report(&readings)),
                    Err(e) => {
                        self.journal.log_activity(
                            "SENSOR_ERROR",
                            &format!("Status query failed: {e}"),
                        );
                        self.face.set_state(Expression::Confused);
                    }
                }
            }
            Intent::FreeForm => {
                let (reply, source) = self.query_ai(&command).await;
                outcome.response = Some(reply);
                outcome.source = Some(source);
            }
        }

        if let Some(response) = &outcome.response {
            self.speak_and_revert(response).await;
        }
        self.settle();
        outcome
    }

    /// Direct text input: always goes to the AI and the reply is spoken.
    /// Returns `None` for empty input.
    pub async fn process_text_input(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let _turn = self.serial.lock().await;
        let (reply, _) = self.query_ai(text).await;
        self.speak_and_revert(&reply).await;
        self.settle();
        Some(reply)
    }

    /// Speak a fixed sentence (greeting, farewell) with the usual face
    /// changes.
    pub async fn announce(&self, text: &str) {
        let _turn = self.serial.lock().await;
        self.speak_and_revert(text).await;
        self.settle();
    }

    /// Show [`Expression::Hearing`] while an entry point waits for input,
    /// and neutral again once it has a line.  Waits for any command in
    /// flight, so it never cuts into that command's face sequence.
    pub async fn set_listening(&self, listening: bool) {
        let _turn = self.serial.lock().await;
        self.face.set_state(if listening {
            Expression::Hearing
        } else {
            Expression::Neutral
        });
    }

    // ── Internal helpers ─────────────────────────────────────────────────────

    async fn gated_move(&self, direction: Direction, outcome: &mut CommandOutcome) {
        self.face.set_state(Expression::Thinking);
        if self.sensors.is_path_clear(direction) {
            self.face.set_state(Expression::Happy);
            outcome.actuated = self.actuate(direction).await;
        } else {
            self.journal.log_activity(
                "COMMAND_PROCESSOR",
                &format!("Refusing to move {direction}: path blocked."),
            );
            self.face.set_state(Expression::Confused);
            outcome.response = Some(refusal(direction).to_string());
        }
    }

    async fn actuate(&self, direction: Direction) -> bool {
        let result = match direction {
            Direction::Forward => self.drive.move_forward(None).await,
            Direction::Backward => self.drive.move_backward(None).await,
            Direction::Left => self.drive.turn_left(None).await,
            Direction::Right => self.drive.turn_right(None).await,
        };
        self.report_actuation(direction.as_str(), result)
    }

    fn report_actuation(&self, command: &str, result: Result<(), RobotError>) -> bool {
        match result {
            Ok(()) => true,
            Err(e) => {
                self.journal.log_activity(
                    "MOTOR_ERROR",
                    &format!("Command '{command}' failed: {e}"),
                );
                self.face.set_state(Expression::Confused);
                false
            }
        }
    }

    async fn query_ai(&self, text: &str) -> (String, AiSource) {
        self.journal
            .log_activity("COMMAND_PROCESSOR", &format!("Querying AI with: '{text}'"));
        self.face.set_state(Expression::Thinking);
        tokio::time::sleep(self.config.thinking_pause).await;

        let result = self.orchestrator.respond(text).await;
        if is_failure_response(&result.text) {
            self.journal
                .log_activity("COMMAND_PROCESSOR", "AI response indicates failure.");
            self.face.set_state(Expression::Confused);
            tokio::time::sleep(self.config.thinking_pause).await;
            return (TROUBLE_RESPONSE.to_string(), result.source);
        }
        self.journal.log_activity(
            "COMMAND_PROCESSOR",
            &format!("AI responded: '{}'", result.text),
        );
        (result.text, result.source)
    }

    async fn speak_and_revert(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        self.face.set_state(Expression::Speaking);
        if let Err(e) = self.voice.speak(text).await {
            self.journal
                .log_activity("TTS_ERROR", &format!("Utterance failed: {e}"));
        }
        self.face.set_state(Expression::Neutral);
    }

    fn settle(&self) {
        if self.face.current_state() != Expression::Neutral {
            self.face.set_state(Expression::Neutral);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
