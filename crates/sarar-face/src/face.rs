//! Face display worker.
//!
//! [`FaceDisplay`] owns a dedicated render thread.  Callers push
//! [`FaceCommand`]s through an mpsc channel; the thread renders each
//! expression with a [`FaceRenderer`] until it receives
//! [`FaceCommand::Shutdown`].  The current expression is stored on the
//! caller's side at `set_state` time, so [`ExpressionSink::current_state`]
//! never waits on the renderer.

use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};

use colored::Colorize;
use sarar_journal::Journal;
use sarar_types::{Expression, RobotError};
use tracing::debug;

// ────────────────────────────────────────────────────────────────────────────
// Sink trait
// ────────────────────────────────────────────────────────────────────────────

/// Accepts the robot's current expression.  Safe to call from any thread
/// while a renderer is running.
pub trait ExpressionSink: Send + Sync {
    fn set_state(&self, expression: Expression);
    fn current_state(&self) -> Expression;
}

/// Message to the render thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceCommand {
    Show(Expression),
    Shutdown,
}

// ────────────────────────────────────────────────────────────────────────────
// Renderers
// ────────────────────────────────────────────────────────────────────────────

/// Draws one expression.  Runs on the render thread.
pub trait FaceRenderer: Send {
    fn id(&self) -> &str;

    /// # Errors
    ///
    /// Returns [`RobotError::Gateway`] when the output device fails.
    fn render(&mut self, expression: Expression) -> Result<(), RobotError>;
}

/// Prints a small colored ASCII face to stdout on every change.
#[derive(Default)]
pub struct TerminalFace {
    last: Option<Expression>,
}

impl TerminalFace {
    pub fn new() -> Self {
        Self::default()
    }

    fn glyph(expression: Expression) -> &'static str {
        match expression {
            Expression::Neutral => "( •_• )",
            Expression::Thinking => "( •_•)?",
            Expression::Happy => "( ^‿^ )",
            Expression::Confused => "( ºДº )",
            Expression::Speaking => "( •o• )",
            Expression::Hearing => "( •_• )))",
            Expression::Crashed => "( x_x )",
        }
    }
}

impl FaceRenderer for TerminalFace {
    fn id(&self) -> &str {
        "terminal"
    }

    fn render(&mut self, expression: Expression) -> Result<(), RobotError> {
        if self.last == Some(expression) {
            return Ok(());
        }
        self.last = Some(expression);
        let face = Self::glyph(expression);
        let face = match expression {
            Expression::Happy => face.green(),
            Expression::Confused => face.yellow(),
            Expression::Crashed => face.red(),
            Expression::Thinking | Expression::Hearing => face.cyan(),
            Expression::Speaking => face.magenta(),
            Expression::Neutral => face.normal(),
        };
        println!("  {} {}", face.bold(), expression.as_str().dimmed());
        Ok(())
    }
}

/// Renderer for machines without a screen.  Remembers what it was asked to
/// draw.
#[derive(Clone, Default)]
pub struct HeadlessFace {
    rendered: Arc<Mutex<Vec<Expression>>>,
}

impl HeadlessFace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every expression rendered so far, oldest first.
    pub fn rendered(&self) -> Vec<Expression> {
        self.rendered.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl FaceRenderer for HeadlessFace {
    fn id(&self) -> &str {
        "headless"
    }

    fn render(&mut self, expression: Expression) -> Result<(), RobotError> {
        self.rendered
            .lock()
            .map_err(|_| RobotError::gateway("headless_face", "render log poisoned"))?
            .push(expression);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FaceDisplay
// ────────────────────────────────────────────────────────────────────────────

/// Threaded [`ExpressionSink`].
pub struct FaceDisplay {
    current: RwLock<Expression>,
    tx: Sender<FaceCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
    journal: Arc<Journal>,
}

impl FaceDisplay {
    /// Spawn the render thread and draw the neutral face.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Gateway`] if the thread cannot be spawned.
    pub fn start(mut renderer: Box<dyn FaceRenderer>, journal: Arc<Journal>) -> Result<Self, RobotError> {
        let (tx, rx) = mpsc::channel::<FaceCommand>();
        let worker_journal = Arc::clone(&journal);
        let renderer_id = renderer.id().to_string();

        let handle = thread::Builder::new()
            .name("face-display".into())
            .spawn(move || {
                for command in rx {
                    match command {
                        FaceCommand::Show(expression) => {
                            if let Err(e) = renderer.render(expression) {
                                worker_journal.log_activity(
                                    "DISPLAY_ERROR",
                                    &format!("Failed to render '{expression}': {e}"),
                                );
                            }
                        }
                        FaceCommand::Shutdown => break,
                    }
                }
                worker_journal.log_activity("DISPLAY", "Face display shutting down.");
            })
            .map_err(|e| RobotError::gateway("face_display", e.to_string()))?;

        journal.log_activity(
            "DISPLAY",
            &format!("Face display started with '{renderer_id}' renderer."),
        );
        let display = Self {
            current: RwLock::new(Expression::Neutral),
            tx,
            worker: Mutex::new(Some(handle)),
            journal,
        };
        display.set_state(Expression::Neutral);
        Ok(display)
    }

    /// Send the shutdown sentinel and wait for the render thread to exit.
    /// Calling it twice is harmless.
    pub fn stop(&self) {
        let handle = match self.worker.lock() {
            Ok(mut worker) => worker.take(),
            Err(_) => None,
        };
        let Some(handle) = handle else {
            return;
        };
        // The thread may already be gone if the renderer panicked.
        let _ = self.tx.send(FaceCommand::Shutdown);
        if handle.join().is_err() {
            self.journal.log_activity(
                "DISPLAY_WARNING",
                "Display thread did not shut down gracefully.",
            );
        }
    }
}

impl ExpressionSink for FaceDisplay {
    fn set_state(&self, expression: Expression) {
        if let Ok(mut current) = self.current.write() {
            *current = expression;
        }
        if self.tx.send(FaceCommand::Show(expression)).is_err() {
            debug!(%expression, "face worker stopped; expression not rendered");
        }
    }

    fn current_state(&self) -> Expression {
        self.current.read().map(|c| *c).unwrap_or_default()
    }
}

impl Drop for FaceDisplay {
    fn drop(&mut self) {
        self.stop();
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn journal() -> Arc<Journal> {
        Arc::new(Journal::open_in_memory().unwrap())
    }

    #[test]
    fn starts_neutral_and_tracks_state() {
        let face = FaceDisplay::start(Box::new(HeadlessFace::new()), journal()).unwrap();
        assert_eq!(face.current_state(), Expression::Neutral);
        face.set_state(Expression::Thinking);
        assert_eq!(face.current_state(), Expression::Thinking);
        face.stop();
    }

    #[test]
    fn renderer_sees_every_state_in_order() {
        let probe = HeadlessFace::new();
        let face = FaceDisplay::start(Box::new(probe.clone()), journal()).unwrap();
        face.set_state(Expression::Happy);
        face.set_state(Expression::Speaking);
        face.stop();
        assert_eq!(
            probe.rendered(),
            vec![Expression::Neutral, Expression::Happy, Expression::Speaking]
        );
    }

    #[test]
    fn set_state_after_stop_only_updates_current() {
        let probe = HeadlessFace::new();
        let face = FaceDisplay::start(Box::new(probe.clone()), journal()).unwrap();
        face.stop();
        face.stop();
        face.set_state(Expression::Crashed);
        assert_eq!(face.current_state(), Expression::Crashed);
        assert_eq!(probe.rendered(), vec![Expression::Neutral]);
    }

    #[test]
    fn shutdown_is_journaled() {
        let journal = journal();
        let face = FaceDisplay::start(Box::new(HeadlessFace::new()), Arc::clone(&journal)).unwrap();
        face.stop();
        let activity = journal.recent_activity(1).unwrap();
        assert_eq!(activity[0].tag, "DISPLAY");
        assert!(activity[0].details.contains("shutting down"));
    }

    struct FailingFace;

    impl FaceRenderer for FailingFace {
        fn id(&self) -> &str {
            "failing"
        }

        fn render(&mut self, _expression: Expression) -> Result<(), RobotError> {
            Err(RobotError::gateway("screen", "disconnected"))
        }
    }

    #[test]
    fn render_errors_are_journaled_not_fatal() {
        let journal = journal();
        let face = FaceDisplay::start(Box::new(FailingFace), Arc::clone(&journal)).unwrap();
        face.set_state(Expression::Happy);
        assert_eq!(face.current_state(), Expression::Happy);
        face.stop();
        let activity = journal.recent_activity(10).unwrap();
        assert!(activity.iter().any(|a| a.tag == "DISPLAY_ERROR"));
    }

    #[test]
    fn terminal_face_renders_each_expression() {
        let mut face = TerminalFace::new();
        for e in [
            Expression::Neutral,
            Expression::Thinking,
            Expression::Happy,
            Expression::Confused,
            Expression::Speaking,
            Expression::Hearing,
            Expression::Crashed,
        ] {
            face.render(e).unwrap();
        }
    }
}
