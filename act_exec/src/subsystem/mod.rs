//! # Actuator subsystem module
//!
//! An [`ActSubsystem`] owns a group of motors (one leader plus any number of
//! followers) and the backend they are bound to. It is stepped once per
//! control cycle through the [`util::module::State`] interface:
//!
//! 1. Demands carried by the [`InputData`] are forwarded to the backend.
//! 2. The backend refreshes the subsystem's [`Snapshot`](crate::snapshot::Snapshot).
//! 3. The snapshot is published to the telemetry sink under the subsystem's
//!    name.
//! 4. The characterization routine is advanced and its label recorded.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;

use crate::backend::{BackendError, Misuse};
use crate::motor_data::MotorData;
use crate::sysid::SysIdError;
use crate::telemetry::TelemetryError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The motors driven together by a subsystem.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MotorGroup {
    /// Motor whose position is reported and which receives the commands.
    pub leading: Option<MotorData>,

    /// Motors mirroring the leader's output, in the order they were added.
    pub following: Vec<MotorData>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during subsystem operation.
#[derive(Debug, thiserror::Error)]
pub enum SubsystemError {
    #[error("Backend error: {0}")]
    Backend(BackendError),

    #[error("Subsystem misuse: {0}")]
    Misuse(Misuse),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("Characterization error: {0}")]
    SysId(#[from] SysIdError),

    #[error("Invalid subsystem parameters: {0}")]
    InvalidParams(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SubsystemError {
    /// Whether the error must stop the subsystem being driven. Only losing a
    /// telemetry record leaves the actuator unaffected.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, SubsystemError::Telemetry(_))
    }
}

impl From<BackendError> for SubsystemError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Misuse(m) => SubsystemError::Misuse(m),
            e => SubsystemError::Backend(e)
        }
    }
}

impl From<Misuse> for SubsystemError {
    fn from(m: Misuse) -> Self {
        SubsystemError::Misuse(m)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
