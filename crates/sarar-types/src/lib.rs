use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Direction of travel the drive base and the range sensors understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
    Left,
    Right,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One fresh snapshot of the three ultrasonic range sensors, in centimeters.
///
/// Never cached: every gated motion attempt takes a new reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObstacleReading {
    pub front: f32,
    pub left: f32,
    pub right: f32,
}

/// Face shown by the robot.  The robot starts in [`Expression::Neutral`] and
/// returns to it after every action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Expression {
    #[default]
    Neutral,
    Thinking,
    Happy,
    Confused,
    Speaking,
    Hearing,
    Crashed,
}

impl Expression {
    pub fn as_str(&self) -> &'static str {
        match self {
            Expression::Neutral => "neutral",
            Expression::Thinking => "thinking",
            Expression::Happy => "happy",
            Expression::Confused => "confused",
            Expression::Speaking => "speaking",
            Expression::Hearing => "hearing",
            Expression::Crashed => "crashed",
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which AI backend, if any, produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiSource {
    /// The remote OpenAI-compatible chat API.
    Primary,
    /// The on-board inference engine.
    Fallback,
    /// No backend answered; the text is a canned apology.
    None,
}

impl AiSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AiSource::Primary => "primary",
            AiSource::Fallback => "fallback",
            AiSource::None => "none",
        }
    }
}

impl fmt::Display for AiSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shared error taxonomy for the robot's subsystems.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RobotError {
    /// A required model, voice, or setting is missing.  Fatal for the owning
    /// subsystem only.
    #[error("Configuration Error: {0}")]
    Configuration(String),

    /// A remote or local AI call failed.
    #[error("AI Backend Error: {0}")]
    Backend(String),

    /// An actuator, sensor, or speech device failed.
    #[error("Gateway Fault on {component}: {details}")]
    Gateway { component: String, details: String },

    /// Every AI backend was unavailable or failed.
    #[error("No AI backend could process the request")]
    Exhausted,
}

impl RobotError {
    /// Shorthand for a [`RobotError::Gateway`] fault.
    pub fn gateway(component: impl Into<String>, details: impl Into<String>) -> Self {
        RobotError::Gateway {
            component: component.into(),
            details: details.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_defaults_to_neutral() {
        assert_eq!(Expression::default(), Expression::Neutral);
    }

    #[test]
    fn expression_serializes_as_lowercase_label() {
        let json = serde_json::to_string(&Expression::Confused).unwrap();
        assert_eq!(json, "\"confused\"");
        let back: Expression = serde_json::from_str("\"speaking\"").unwrap();
        assert_eq!(back, Expression::Speaking);
    }

    #[test]
    fn ai_source_labels() {
        assert_eq!(AiSource::Primary.to_string(), "primary");
        assert_eq!(AiSource::Fallback.to_string(), "fallback");
        assert_eq!(AiSource::None.to_string(), "none");
    }

    #[test]
    fn direction_display_matches_serde_name() {
        for dir in [
            Direction::Forward,
            Direction::Backward,
            Direction::Left,
            Direction::Right,
        ] {
            let json = serde_json::to_string(&dir).unwrap();
            assert_eq!(json, format!("\"{dir}\""));
        }
    }

    #[test]
    fn robot_error_display() {
        let err = RobotError::gateway("front_sensor", "echo timeout");
        assert!(err.to_string().contains("front_sensor"));
        assert!(err.to_string().contains("echo timeout"));

        let err = RobotError::Configuration("voice model missing".into());
        assert!(err.to_string().contains("Configuration"));
    }
}
