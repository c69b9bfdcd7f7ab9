//! Low-level `MotorDriver` trait for the four-wheel drive.
//!
//! A driver applies one [`Motion`] at a time and holds it until the next
//! call.  Timing (how long a motion lasts) belongs to the
//! [`DriveController`][crate::drive::DriveController], not to the driver.

use std::fmt;
use std::str::FromStr;

use sarar_types::RobotError;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::sim::SimMotors;

/// Wheel pattern applied to all four motors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Motion {
    Forward,
    Backward,
    /// Left side backward, right side forward.
    SpinLeft,
    /// Right side backward, left side forward.
    SpinRight,
    /// All motor pins low.
    Halt,
}

impl Motion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Motion::Forward => "forward",
            Motion::Backward => "backward",
            Motion::SpinLeft => "spin_left",
            Motion::SpinRight => "spin_right",
            Motion::Halt => "halt",
        }
    }
}

impl fmt::Display for Motion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A four-wheel motor driver (GPIO H-bridge, simulator, …).
pub trait MotorDriver: Send + Sync {
    /// Stable identifier for this driver, e.g. `"sim_motors"`.
    fn id(&self) -> &str;

    /// Apply `motion` to every wheel.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Gateway`] if the pattern cannot be applied.
    fn apply(&mut self, motion: Motion) -> Result<(), RobotError>;
}

/// Hardware platform the robot runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    #[default]
    Simulation,
    RaspberryPi,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Simulation => "simulation",
            Platform::RaspberryPi => "raspberry_pi",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = RobotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "simulation" | "sim" | "windows" => Ok(Platform::Simulation),
            "raspberry_pi" | "raspberrypi" | "rpi" => Ok(Platform::RaspberryPi),
            other => Err(RobotError::Configuration(format!(
                "unknown platform '{other}' (expected 'simulation' or 'raspberry_pi')"
            ))),
        }
    }
}

/// Build the motor driver for `platform`.
///
/// GPIO access is not built into this crate, so `raspberry_pi` logs a
/// warning and runs the simulator instead.
pub fn motors_for_platform(platform: Platform) -> Box<dyn MotorDriver> {
    match platform {
        Platform::Simulation => Box::new(SimMotors::new("sim_motors")),
        Platform::RaspberryPi => {
            warn!(
                subsystem = "MOTOR_ERROR",
                "GPIO drive not available in this build; running in simulation mode"
            );
            Box::new(SimMotors::new("sim_motors"))
        }
    }
}
