//! # Snapshot
//!
//! The state captured from the backend each cycle.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Characterization label recorded when no routine is running.
pub const SYSID_STATE_NONE: &str = "None";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Per-cycle state of a subsystem.
///
/// The struct is kept flat so it can be archived as a CSV row and read back
/// by the replay backend.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Subsystem time at which the snapshot was taken.
    ///
    /// Units: seconds
    pub time_s: f64,

    /// Position of the leading motor.
    ///
    /// Units: mechanism rotations
    pub position_rot: f64,

    /// Velocity of the leading motor.
    ///
    /// Units: mechanism rotations/second
    pub velocity_rps: f64,

    /// Goal of the current profiled motion command, if any.
    ///
    /// Units: mechanism rotations
    pub goal_position_rot: Option<f64>,

    /// Current open loop voltage demand, if any.
    ///
    /// Units: volts
    pub voltage_v: Option<f64>,

    /// Label of the characterization routine state.
    pub sysid_state: String,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            time_s: 0.0,
            position_rot: 0.0,
            velocity_rps: 0.0,
            goal_position_rot: None,
            voltage_v: None,
            sysid_state: String::from(SYSID_STATE_NONE),
        }
    }
}
