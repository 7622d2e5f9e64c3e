//! # Actuator library
//!
//! Configuration and operation of a motor driven actuator in one of three
//! execution contexts, selected by [`backend::RobotMode`]:
//!
//! - `Real` - motor controllers reached through a driver bus,
//! - `Sim` - a DC motor model,
//! - `Replay` - snapshots recorded during a previous session.
//!
//! Motors are described by [`motor_data::MotorData`], grouped under an
//! [`subsystem::ActSubsystem`] and bound to a backend, after which the
//! subsystem is processed once per control cycle.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod backend;
pub mod motor_data;
pub mod params;
pub mod script;
pub mod snapshot;
pub mod subsystem;
pub mod sysid;
pub mod telemetry;
