//! Keyword-based intent classification.
//!
//! Commands are lower-cased and trimmed, then matched by substring against
//! [`INTENT_TABLE`] in order.  The first row with a matching keyword wins,
//! so the table order is a priority order: movement before stop before
//! status.  Anything unmatched is [`Intent::FreeForm`] and goes to the AI.
//!
//! Substring matching means "stop" anywhere in a sentence is a Stop
//! ("please don't stop talking" halts the motors).

use std::fmt;

/// Classified purpose of a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Intent {
    MoveForward,
    MoveBackward,
    TurnLeft,
    TurnRight,
    Stop,
    StatusQuery,
    FreeForm,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::MoveForward => "move_forward",
            Intent::MoveBackward => "move_backward",
            Intent::TurnLeft => "turn_left",
            Intent::TurnRight => "turn_right",
            Intent::Stop => "stop",
            Intent::StatusQuery => "status",
            Intent::FreeForm => "free_form",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered keyword table.  Earlier rows take priority.
pub const INTENT_TABLE: &[(Intent, &[&str])] = &[
    (Intent::MoveForward, &["go forward", "move forward"]),
    (Intent::MoveBackward, &["go backward", "move backward"]),
    (Intent::TurnLeft, &["turn left"]),
    (Intent::TurnRight, &["turn right"]),
    (Intent::Stop, &["stop"]),
    (Intent::StatusQuery, &["status"]),
];

/// Lower-case and trim a raw command.
pub fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Classify a raw command.  Returns `None` for empty or whitespace-only
/// input.
pub fn classify(text: &str) -> Option<Intent> {
    let command = normalize(text);
    if command.is_empty() {
        return None;
    }
    let intent = INTENT_TABLE
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| command.contains(k)))
        .map(|(intent, _)| *intent)
        .unwrap_or(Intent::FreeForm);
    Some(intent)
}
