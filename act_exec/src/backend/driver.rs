//! Motor controller driver interface
//!
//! The vendor driver is not part of this crate. Anything able to open a motor
//! controller by id and exchange the requests below can back a
//! [`RealBackend`](super::RealBackend).

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::motor_data::MotorConfig;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A single motor controller.
pub trait ActuatorDriver {
    /// Apply a full configuration to the controller.
    fn apply_config(&mut self, config: &MotorConfig) -> Result<(), DriverError>;

    /// Issue a control request.
    fn set_control(&mut self, request: ControlRequest) -> Result<(), DriverError>;

    /// Read the position of the mechanism.
    ///
    /// Units: mechanism rotations
    fn position_rot(&mut self) -> Result<f64, DriverError>;

    /// Read the velocity of the mechanism.
    ///
    /// Units: mechanism rotations/second
    fn velocity_rps(&mut self) -> Result<f64, DriverError>;
}

/// Provides access to the motor controllers on a bus.
pub trait DriverBus {
    /// Open the controller with the given id.
    ///
    /// Must return [`DriverError::DeviceNotFound`] if no controller answers
    /// to `id`.
    fn open(&mut self, id: u32) -> Result<Box<dyn ActuatorDriver>, DriverError>;
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Control requests understood by a motor controller.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum ControlRequest {
    /// Profiled motion to a position, using the motion magic limits and slot 0
    /// gains.
    MotionMagicPosition { position_rot: f64 },

    /// Open loop voltage output.
    Voltage { volts: f64 },

    /// Mirror the output of another controller.
    Follower { leader_id: u32, oppose_leader: bool },

    /// No output, the controller applies its neutral mode.
    Neutral,
}

/// Errors reported by a driver.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("No device found with id {0}")]
    DeviceNotFound(u32),

    #[error("Device {0} rejected the configuration: {1}")]
    ConfigRejected(u32, String),

    #[error("Communication with device {0} failed: {1}")]
    CommsError(u32, String),
}
