//! # System identification module
//!
//! [`SysIdRoutine`] drives a mechanism through the voltage profile used to
//! characterise its feedforward gains:
//!
//! - `QuasistaticRamp` - the voltage rises linearly at the ramp rate until it
//!   reaches the step voltage.
//! - `DynamicStep` - the step voltage is held for the step duration.
//!
//! after which the routine returns to `Idle` and commands zero volts. If the
//! whole run takes longer than the timeout the routine enters `Timeout`,
//! commands zero volts, and returns to `Idle` on the next step.
//!
//! Time is advanced by the caller, so a run is reproducible from the sequence
//! of step periods alone.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::fmt;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::snapshot::SYSID_STATE_NONE;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Characterization parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SysIdConfig {
    /// Units: volts/second
    pub ramp_rate_vps: f64,

    /// Units: volts
    pub step_voltage_v: f64,

    /// Maximum duration of a whole run.
    ///
    /// Units: seconds
    pub timeout_s: f64,

    /// Units: seconds
    pub step_duration_s: f64,
}

/// The characterization state machine.
#[derive(Clone, Debug)]
pub struct SysIdRoutine {
    config: SysIdConfig,

    state: SysIdState,

    /// Time since the run started.
    ///
    /// Units: seconds
    run_time_s: f64,

    /// Time since the current phase started.
    ///
    /// Units: seconds
    phase_time_s: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Direction of a characterization run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SysIdTest {
    Forward,
    Reverse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SysIdState {
    Idle,
    QuasistaticRamp(SysIdTest),
    DynamicStep(SysIdTest),
    Timeout,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SysIdError {
    #[error("Invalid characterization configuration: {0}")]
    InvalidConfiguration(String),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SysIdConfig {
    fn default() -> Self {
        Self {
            ramp_rate_vps: 1.0,
            step_voltage_v: 7.0,
            timeout_s: 10.0,
            step_duration_s: 2.0,
        }
    }
}

impl SysIdConfig {
    pub fn validate(&self) -> Result<(), SysIdError> {
        let values = [
            ("ramp rate", self.ramp_rate_vps),
            ("step voltage", self.step_voltage_v),
            ("timeout", self.timeout_s),
            ("step duration", self.step_duration_s),
        ];

        for (name, value) in values.iter() {
            if !(value.is_finite() && *value > 0.0) {
                return Err(SysIdError::InvalidConfiguration(format!(
                    "{} must be positive, found {}", name, value
                )));
            }
        }

        Ok(())
    }
}

impl SysIdTest {
    fn sign(&self) -> f64 {
        match self {
            SysIdTest::Forward => 1.0,
            SysIdTest::Reverse => -1.0,
        }
    }
}

impl fmt::Display for SysIdTest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SysIdTest::Forward => write!(f, "forward"),
            SysIdTest::Reverse => write!(f, "reverse"),
        }
    }
}

impl fmt::Display for SysIdState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SysIdState::Idle => write!(f, "{}", SYSID_STATE_NONE),
            SysIdState::QuasistaticRamp(t) => write!(f, "quasistatic-{}", t),
            SysIdState::DynamicStep(t) => write!(f, "dynamic-{}", t),
            SysIdState::Timeout => write!(f, "timeout"),
        }
    }
}

impl SysIdRoutine {
    /// Create a new idle routine.
    pub fn new(config: SysIdConfig) -> Result<Self, SysIdError> {
        config.validate()?;

        Ok(Self {
            config,
            state: SysIdState::Idle,
            run_time_s: 0.0,
            phase_time_s: 0.0,
        })
    }

    pub fn config(&self) -> &SysIdConfig {
        &self.config
    }

    pub fn state(&self) -> SysIdState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != SysIdState::Idle
    }

    /// Start a run in the given direction, restarting any run in progress.
    pub fn start(&mut self, test: SysIdTest) {
        if self.is_active() {
            warn!("Restarting characterization while in {}", self.state);
        }
        info!("Starting {} characterization", test);

        self.state = SysIdState::QuasistaticRamp(test);
        self.run_time_s = 0.0;
        self.phase_time_s = 0.0;
    }

    /// Abort the run and return to idle.
    pub fn stop(&mut self) {
        if self.is_active() {
            info!("Characterization stopped in {}", self.state);
        }
        self.state = SysIdState::Idle;
    }

    /// Advance the routine by `dt` seconds.
    ///
    /// Returns the voltage to command for this step, or `None` when idle.
    pub fn step(&mut self, dt: f64) -> Option<f64> {
        match self.state {
            SysIdState::Idle => return None,
            SysIdState::Timeout => {
                self.state = SysIdState::Idle;
                return Some(0.0);
            }
            _ => ()
        }

        self.run_time_s += dt;
        self.phase_time_s += dt;

        if self.run_time_s > self.config.timeout_s {
            warn!("Characterization timed out after {:.2} s", self.run_time_s);
            self.state = SysIdState::Timeout;
            return Some(0.0);
        }

        match self.state {
            SysIdState::QuasistaticRamp(test) => {
                let volts = self.config.ramp_rate_vps * self.phase_time_s;

                if volts >= self.config.step_voltage_v {
                    self.state = SysIdState::DynamicStep(test);
                    self.phase_time_s = 0.0;
                    Some(test.sign() * self.config.step_voltage_v)
                }
                else {
                    Some(test.sign() * volts)
                }
            },
            SysIdState::DynamicStep(test) => {
                if self.phase_time_s >= self.config.step_duration_s {
                    info!("Characterization complete after {:.2} s", self.run_time_s);
                    self.state = SysIdState::Idle;
                    Some(0.0)
                }
                else {
                    Some(test.sign() * self.config.step_voltage_v)
                }
            },
            SysIdState::Idle | SysIdState::Timeout => None
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
