//! `sarar-hal` – Hardware Abstraction Layer.
//!
//! Narrow interfaces between the command pipeline and the robot's
//! four-wheel drive and ultrasonic range sensors.  Everything above this
//! crate talks to the traits, so the simulated drivers and real hardware
//! are interchangeable.
//!
//! # Modules
//!
//! - [`motors`] – [`MotorDriver`][motors::MotorDriver] trait, the
//!   [`Motion`][motors::Motion] primitives and [`Platform`][motors::Platform]
//!   selection.
//! - [`drive`] – [`ActuationGateway`][drive::ActuationGateway] and the
//!   timed [`DriveController`][drive::DriveController].
//! - [`proximity`] – [`ProximityGateway`][proximity::ProximityGateway] and
//!   the pure clearance rule [`is_clear`][proximity::is_clear].
//! - [`sim`] – in-process simulated motors and sensors.

pub mod drive;
pub mod motors;
pub mod proximity;
pub mod sim;

pub use drive::{ActuationGateway, DriveConfig, DriveController};
pub use motors::{Motion, MotorDriver, Platform, motors_for_platform};
pub use proximity::{FRONT_CLEARANCE_CM, ProximityGateway, SIDE_CLEARANCE_CM, is_clear};
pub use sim::{FixedRangeSensors, SimMotors, SimRangeSensors};
