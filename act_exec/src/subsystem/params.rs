//! Parameters structure for ActSubsystem

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use super::SubsystemError;
use crate::sysid::SysIdConfig;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for an actuator subsystem.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubsystemParams {
    /// Time between two calls to `proc`.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Characterization routine parameters.
    pub sysid: SysIdConfig,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SubsystemParams {
    fn default() -> Self {
        Self {
            cycle_period_s: 0.02,
            sysid: SysIdConfig::default(),
        }
    }
}

impl SubsystemParams {
    /// Check the cycle period is finite and positive, and the
    /// characterization parameters are valid.
    pub fn validate(&self) -> Result<(), SubsystemError> {
        if !(self.cycle_period_s.is_finite() && self.cycle_period_s > 0.0) {
            return Err(SubsystemError::InvalidParams(format!(
                "cycle period must be positive, found {} s", self.cycle_period_s
            )));
        }

        Ok(self.sysid.validate()?)
    }
}
