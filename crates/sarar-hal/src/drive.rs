//! Timed drive commands over a [`MotorDriver`].
//!
//! [`DriveController`] is the robot's [`ActuationGateway`]: it turns "move
//! forward for two seconds" into apply → sleep → halt, and journals every
//! command.  The motor lock is released while a timed move sleeps, so a
//! [`stop`][ActuationGateway::stop] from another task (Ctrl-C, a second
//! entry point) halts the wheels immediately.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sarar_journal::Journal;
use sarar_types::RobotError;
use tracing::{info, warn};

use crate::motors::{Motion, MotorDriver};

/// Directional motion primitives and stop.
///
/// Every call writes one movement record, and every timed move leaves the
/// wheels halted when it returns.
#[async_trait]
pub trait ActuationGateway: Send + Sync {
    /// Drive forward for `duration` (controller default when `None`).
    async fn move_forward(&self, duration: Option<Duration>) -> Result<(), RobotError>;

    /// Drive backward for `duration` (controller default when `None`).
    async fn move_backward(&self, duration: Option<Duration>) -> Result<(), RobotError>;

    /// Spin left in place by `angle` degrees (controller default when `None`).
    async fn turn_left(&self, angle: Option<f32>) -> Result<(), RobotError>;

    /// Spin right in place by `angle` degrees (controller default when `None`).
    async fn turn_right(&self, angle: Option<f32>) -> Result<(), RobotError>;

    /// Halt all wheels now.
    async fn stop(&self) -> Result<(), RobotError>;
}

/// Default timings for [`DriveController`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveConfig {
    /// Forward/backward duration when the caller gives none.
    pub move_duration: Duration,
    /// Turn angle in degrees when the caller gives none.
    pub turn_angle: f32,
    /// Time the spin takes to cover 90°.
    pub quarter_turn: Duration,
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            move_duration: Duration::from_secs(2),
            turn_angle: 90.0,
            quarter_turn: Duration::from_secs(1),
        }
    }
}

/// [`ActuationGateway`] over a boxed [`MotorDriver`].
pub struct DriveController {
    motors: Mutex<Box<dyn MotorDriver>>,
    journal: Arc<Journal>,
    config: DriveConfig,
}

impl DriveController {
    pub fn new(motors: Box<dyn MotorDriver>, journal: Arc<Journal>, config: DriveConfig) -> Self {
        journal.log_activity(
            "MOTOR",
            &format!("Motor controller initialized with driver '{}'.", motors.id()),
        );
        Self {
            motors: Mutex::new(motors),
            journal,
            config,
        }
    }

    pub fn config(&self) -> &DriveConfig {
        &self.config
    }

    fn apply(&self, motion: Motion) -> Result<(), RobotError> {
        let mut motors = self
            .motors
            .lock()
            .map_err(|_| RobotError::gateway("motors", "driver lock poisoned"))?;
        motors.apply(motion)
    }

    /// `quarter_turn` per 90°.  Non-finite or oversized angles are rejected
    /// before any motion is applied.
    fn turn_duration(&self, angle: f32) -> Result<Duration, RobotError> {
        Duration::try_from_secs_f32(self.config.quarter_turn.as_secs_f32() * angle.abs() / 90.0)
            .map_err(|e| RobotError::gateway("drive", format!("invalid turn angle {angle}: {e}")))
    }

    /// apply → sleep → halt.  The halt is issued even when `motion` failed.
    async fn timed(&self, command: &str, motion: Motion, duration: Duration) -> Result<(), RobotError> {
        let applied = self.apply(motion);
        if let Err(e) = &applied {
            warn!(subsystem = "MOTOR_ERROR", command, error = %e, "motion failed");
        } else {
            tokio::time::sleep(duration).await;
        }
        let halted = self.apply(Motion::Halt);
        if let Err(e) = &halted {
            warn!(subsystem = "MOTOR_ERROR", command, error = %e, "halt after timed move failed");
        }
        let success = applied.is_ok() && halted.is_ok();
        self.journal
            .log_movement(command, duration.as_secs_f32(), success);
        applied.and(halted)
    }
}

#[async_trait]
impl ActuationGateway for DriveController {
    async fn move_forward(&self, duration: Option<Duration>) -> Result<(), RobotError> {
        let duration = duration.unwrap_or(self.config.move_duration);
        self.journal.log_activity(
            "MOTOR_COMMAND",
            &format!("move_forward for {}s", duration.as_secs_f32()),
        );
        self.timed("forward", Motion::Forward, duration).await
    }

    async fn move_backward(&self, duration: Option<Duration>) -> Result<(), RobotError> {
        let duration = duration.unwrap_or(self.config.move_duration);
        self.journal.log_activity(
            "MOTOR_COMMAND",
            &format!("move_backward for {}s", duration.as_secs_f32()),
        );
        self.timed("backward", Motion::Backward, duration).await
    }

    async fn turn_left(&self, angle: Option<f32>) -> Result<(), RobotError> {
        let angle = angle.unwrap_or(self.config.turn_angle);
        let duration = self.turn_duration(angle)?;
        self.journal.log_activity(
            "MOTOR_COMMAND",
            &format!("turn_left for {angle} degrees ({}s)", duration.as_secs_f32()),
        );
        self.timed("left", Motion::SpinLeft, duration).await
    }

    async fn turn_right(&self, angle: Option<f32>) -> Result<(), RobotError> {
        let angle = angle.unwrap_or(self.config.turn_angle);
        let duration = self.turn_duration(angle)?;
        self.journal.log_activity(
            "MOTOR_COMMAND",
            &format!("turn_right for {angle} degrees ({}s)", duration.as_secs_f32()),
        );
        self.timed("right", Motion::SpinRight, duration).await
    }

    async fn stop(&self) -> Result<(), RobotError> {
        self.journal.log_activity("MOTOR_COMMAND", "stop");
        let result = self.apply(Motion::Halt);
        if result.is_ok() {
            info!(subsystem = "MOTOR", "motors halted");
        }
        self.journal.log_movement("stop", 0.0, result.is_ok());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimMotors;

    /// Driver that rejects every non-halt motion.
    struct JammedMotors {
        halts: Arc<Mutex<u32>>,
    }

    impl MotorDriver for JammedMotors {
        fn id(&self) -> &str {
            "jammed"
        }

        fn apply(&mut self, motion: Motion) -> Result<(), RobotError> {
            if motion == Motion::Halt {
                *self.halts.lock().unwrap() += 1;
                Ok(())
            } else {
                Err(RobotError::gateway("jammed", "stalled"))
            }
        }
    }

    fn controller(probe: &SimMotors) -> (Arc<DriveController>, Arc<Journal>) {
        let journal = Arc::new(Journal::open_in_memory().unwrap());
        let drive = DriveController::new(
            Box::new(probe.clone()),
            Arc::clone(&journal),
            DriveConfig::default(),
        );
        (Arc::new(drive), journal)
    }

    #[tokio::test(start_paused = true)]
    async fn forward_runs_for_default_duration_then_halts() {
        let probe = SimMotors::new("sim");
        let (drive, journal) = controller(&probe);

        let start = tokio::time::Instant::now();
        drive.move_forward(None).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(2));

        assert_eq!(probe.history(), vec![Motion::Forward, Motion::Halt]);
        let moves = journal.recent_movements(1).unwrap();
        assert_eq!(moves[0].command, "forward");
        assert!((moves[0].duration - 2.0).abs() < f32::EPSILON);
        assert!(moves[0].success);
    }

    #[tokio::test(start_paused = true)]
    async fn turn_duration_scales_with_angle() {
        let probe = SimMotors::new("sim");
        let (drive, journal) = controller(&probe);

        let start = tokio::time::Instant::now();
        drive.turn_left(Some(180.0)).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(2));

        let start = tokio::time::Instant::now();
        drive.turn_right(None).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(1));

        assert_eq!(
            probe.history(),
            vec![Motion::SpinLeft, Motion::Halt, Motion::SpinRight, Motion::Halt]
        );
        let moves = journal.recent_movements(2).unwrap();
        assert_eq!(moves[0].command, "right");
        assert_eq!(moves[1].command, "left");
    }

    #[tokio::test(start_paused = true)]
    async fn unusable_turn_angle_is_rejected_without_motion() {
        let probe = SimMotors::new("sim");
        let journal = Arc::new(Journal::open_in_memory().unwrap());
        let drive = DriveController::new(
            Box::new(probe.clone()),
            Arc::clone(&journal),
            DriveConfig {
                turn_angle: f32::INFINITY,
                ..DriveConfig::default()
            },
        );

        let err = drive.turn_left(None).await.unwrap_err();
        assert!(matches!(err, RobotError::Gateway { .. }));
        let err = drive.turn_right(Some(f32::NAN)).await.unwrap_err();
        assert!(matches!(err, RobotError::Gateway { .. }));
        let err = drive.turn_right(Some(f32::MAX)).await.unwrap_err();
        assert!(matches!(err, RobotError::Gateway { .. }));

        assert!(probe.history().is_empty());
        assert!(journal.recent_movements(10).unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_preempts_a_sleeping_move() {
        let probe = SimMotors::new("sim");
        let (drive, _journal) = controller(&probe);

        let mover = {
            let drive = Arc::clone(&drive);
            tokio::spawn(async move { drive.move_backward(Some(Duration::from_secs(10))).await })
        };
        tokio::time::sleep(Duration::from_secs(1)).await;
        drive.stop().await.unwrap();
        assert_eq!(probe.current(), Motion::Halt);

        mover.await.unwrap().unwrap();
        assert_eq!(
            probe.history(),
            vec![Motion::Backward, Motion::Halt, Motion::Halt]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_motion_still_halts_and_records_failure() {
        let halts = Arc::new(Mutex::new(0));
        let journal = Arc::new(Journal::open_in_memory().unwrap());
        let drive = DriveController::new(
            Box::new(JammedMotors {
                halts: Arc::clone(&halts),
            }),
            Arc::clone(&journal),
            DriveConfig::default(),
        );

        let err = drive.move_forward(None).await.unwrap_err();
        assert!(matches!(err, RobotError::Gateway { .. }));
        assert_eq!(*halts.lock().unwrap(), 1);
        assert!(!journal.recent_movements(1).unwrap()[0].success);
    }

    #[tokio::test]
    async fn stop_writes_zero_duration_record() {
        let probe = SimMotors::new("sim");
        let (drive, journal) = controller(&probe);
        drive.stop().await.unwrap();
        let moves = journal.recent_movements(1).unwrap();
        assert_eq!(moves[0].command, "stop");
        assert_eq!(moves[0].duration, 0.0);
        let activity = journal.recent_activity(3).unwrap();
        assert!(activity.iter().any(|a| a.tag == "MOTOR_COMMAND" && a.details == "stop"));
    }
}
