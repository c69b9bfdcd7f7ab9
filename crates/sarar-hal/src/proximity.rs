//! Proximity sensing and the clearance rule used to gate motion.
//!
//! The rule is a pure function over a fresh [`ObstacleReading`]; there is no
//! smoothing or hysteresis, so a noisy sensor can flip between clear and
//! blocked on consecutive reads.

use sarar_types::{Direction, ObstacleReading, RobotError};
use tracing::warn;

/// Anything closer than this in front blocks forward motion (cm).
pub const FRONT_CLEARANCE_CM: f32 = 20.0;

/// Anything closer than this on a side blocks a turn toward it (cm).
pub const SIDE_CLEARANCE_CM: f32 = 15.0;

/// Return `true` when `direction` is free of obstacles in `readings`.
///
/// There is no rear sensor, so [`Direction::Backward`] is always clear.
pub fn is_clear(direction: Direction, readings: &ObstacleReading) -> bool {
    match direction {
        Direction::Forward => readings.front >= FRONT_CLEARANCE_CM,
        Direction::Left => readings.left >= SIDE_CLEARANCE_CM,
        Direction::Right => readings.right >= SIDE_CLEARANCE_CM,
        Direction::Backward => true,
    }
}

/// The three ultrasonic range sensors (front, left, right).
pub trait ProximityGateway: Send + Sync {
    /// Stable identifier, e.g. `"sim_ultrasonic"`.
    fn id(&self) -> &str;

    /// Take one fresh reading of all three sensors, in centimeters.
    ///
    /// # Errors
    ///
    /// Returns [`RobotError::Gateway`] when a sensor does not answer.
    fn distances(&self) -> Result<ObstacleReading, RobotError>;

    /// Read the sensors and apply [`is_clear`].  A failed read counts as
    /// blocked.
    fn is_path_clear(&self, direction: Direction) -> bool {
        match self.distances() {
            Ok(readings) => is_clear(direction, &readings),
            Err(e) => {
                warn!(subsystem = "SENSOR_ERROR", sensor = self.id(), error = %e, "sensor read failed; treating {direction} as blocked");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(front: f32, left: f32, right: f32) -> ObstacleReading {
        ObstacleReading { front, left, right }
    }

    #[test]
    fn front_threshold_is_twenty_cm() {
        assert!(!is_clear(Direction::Forward, &reading(19.9, 100.0, 100.0)));
        assert!(is_clear(Direction::Forward, &reading(20.0, 100.0, 100.0)));
    }

    #[test]
    fn side_thresholds_are_fifteen_cm() {
        let r = reading(100.0, 14.0, 15.0);
        assert!(!is_clear(Direction::Left, &r));
        assert!(is_clear(Direction::Right, &r));
    }

    #[test]
    fn sides_do_not_affect_forward() {
        assert!(is_clear(Direction::Forward, &reading(50.0, 1.0, 1.0)));
    }

    #[test]
    fn backward_is_always_clear() {
        assert!(is_clear(Direction::Backward, &reading(0.0, 0.0, 0.0)));
    }

    struct BrokenSensors;

    impl ProximityGateway for BrokenSensors {
        fn id(&self) -> &str {
            "broken"
        }

        fn distances(&self) -> Result<ObstacleReading, RobotError> {
            Err(RobotError::gateway("front_sensor", "echo timeout"))
        }
    }

    #[test]
    fn failed_read_is_not_clear() {
        let sensors = BrokenSensors;
        assert!(!sensors.is_path_clear(Direction::Forward));
        assert!(!sensors.is_path_clear(Direction::Backward));
    }
}
