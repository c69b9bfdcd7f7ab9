//! In-process simulated drivers for running the robot without hardware.
//!
//! [`SimMotors`] records every applied [`Motion`]; [`SimRangeSensors`]
//! returns uniformly random distances like a cluttered room;
//! [`FixedRangeSensors`] returns scripted readings for deterministic tests.
//!
//! # Example
//!
//! ```rust
//! use sarar_hal::sim::{FixedRangeSensors, SimMotors};
//! use sarar_hal::{Motion, MotorDriver, ProximityGateway};
//! use sarar_types::Direction;
//!
//! let mut motors = SimMotors::new("sim_motors");
//! motors.apply(Motion::Forward).unwrap();
//! assert_eq!(motors.history().last(), Some(&Motion::Forward));
//!
//! let sensors = FixedRangeSensors::new(10.0, 80.0, 80.0);
//! assert!(!sensors.is_path_clear(Direction::Forward));
//! ```

use std::sync::{Arc, Mutex};

use rand::Rng;
use sarar_types::{ObstacleReading, RobotError};
use tracing::debug;

use crate::motors::{Motion, MotorDriver};
use crate::proximity::ProximityGateway;

// ────────────────────────────────────────────────────────────────────────────
// Simulated motors
// ────────────────────────────────────────────────────────────────────────────

/// Simulated four-wheel drive.  Always succeeds.
///
/// The motion log is shared, so a clone kept by a test observes every
/// motion applied through the boxed driver handed to a controller.
#[derive(Clone)]
pub struct SimMotors {
    id: String,
    log: Arc<Mutex<Vec<Motion>>>,
}

impl SimMotors {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every motion applied so far, oldest first.
    pub fn history(&self) -> Vec<Motion> {
        self.log.lock().map(|log| log.clone()).unwrap_or_default()
    }

    /// The motion currently held by the wheels.
    pub fn current(&self) -> Motion {
        self.history().last().copied().unwrap_or(Motion::Halt)
    }
}

impl MotorDriver for SimMotors {
    fn id(&self) -> &str {
        &self.id
    }

    fn apply(&mut self, motion: Motion) -> Result<(), RobotError> {
        debug!(driver = %self.id, %motion, "SIMULATOR: applying motion");
        self.log
            .lock()
            .map_err(|_| RobotError::gateway(&self.id, "motion log lock poisoned"))?
            .push(motion);
        Ok(())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated range sensors
// ────────────────────────────────────────────────────────────────────────────

/// Lower bound of simulated distances (cm).
pub const SIM_MIN_DISTANCE_CM: f32 = 10.0;
/// Upper bound (exclusive) of simulated distances (cm).
pub const SIM_MAX_DISTANCE_CM: f32 = 300.0;

/// Ultrasonic sensors that report random distances in
/// [`SIM_MIN_DISTANCE_CM`, `SIM_MAX_DISTANCE_CM`).
pub struct SimRangeSensors {
    id: String,
}

impl SimRangeSensors {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl ProximityGateway for SimRangeSensors {
    fn id(&self) -> &str {
        &self.id
    }

    fn distances(&self) -> Result<ObstacleReading, RobotError> {
        let mut rng = rand::thread_rng();
        Ok(ObstacleReading {
            front: rng.gen_range(SIM_MIN_DISTANCE_CM..SIM_MAX_DISTANCE_CM),
            left: rng.gen_range(SIM_MIN_DISTANCE_CM..SIM_MAX_DISTANCE_CM),
            right: rng.gen_range(SIM_MIN_DISTANCE_CM..SIM_MAX_DISTANCE_CM),
        })
    }
}

/// Sensors that return a scripted reading, changeable at runtime.
pub struct FixedRangeSensors {
    reading: Mutex<ObstacleReading>,
}

impl FixedRangeSensors {
    pub fn new(front: f32, left: f32, right: f32) -> Self {
        Self {
            reading: Mutex::new(ObstacleReading { front, left, right }),
        }
    }

    /// Replace the reading returned by subsequent calls.
    pub fn set(&self, reading: ObstacleReading) {
        if let Ok(mut current) = self.reading.lock() {
            *current = reading;
        }
    }
}

impl ProximityGateway for FixedRangeSensors {
    fn id(&self) -> &str {
        "fixed_ultrasonic"
    }

    fn distances(&self) -> Result<ObstacleReading, RobotError> {
        self.reading
            .lock()
            .map(|r| *r)
            .map_err(|_| RobotError::gateway("fixed_ultrasonic", "reading lock poisoned"))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
