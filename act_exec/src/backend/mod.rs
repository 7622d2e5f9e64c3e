//! # Backend module
//!
//! A backend executes actuator commands in one particular context and reports
//! the resulting state:
//!
//! - [`RealBackend`] - motor controllers reached through a [`DriverBus`].
//! - [`SimBackend`] - a DC motor model stepped once per cycle.
//! - [`ReplayBackend`] - snapshots recorded by a previous run.
//!
//! All three implement [`ActBackend`]. The [`Backend`] enum holds whichever
//! one was selected by the subsystem's [`RobotMode`], the variant can't be
//! changed once built.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod driver;
mod real;
mod replay;
mod sim;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use driver::*;
pub use real::RealBackend;
pub use replay::{load_archive, ReplayBackend};
pub use sim::{SimBackend, SimMotor, SimParams};

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use util::archive::ArchiveError;

use crate::motor_data::{ConfigError, MotorData};
use crate::snapshot::Snapshot;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Control surface shared by every backend.
pub trait ActBackend {
    /// The mode this backend executes in.
    fn mode(&self) -> RobotMode;

    /// Bind the configurations to concrete actuators.
    ///
    /// May only be called once, a second call returns
    /// [`Misuse::DoubleInit`].
    fn initialize(
        &mut self,
        leading: &MotorData,
        following: &[MotorData]
    ) -> Result<(), BackendError>;

    /// Refresh the snapshot in place.
    fn update_inputs(&mut self, snapshot: &mut Snapshot) -> Result<(), BackendError>;

    /// Command a profiled motion to the given position.
    ///
    /// Units: mechanism rotations
    fn set_goal_position(&mut self, position_rot: f64) -> Result<(), BackendError>;

    /// Command an open loop output voltage.
    ///
    /// Units: volts
    fn set_voltage(&mut self, volts: f64) -> Result<(), BackendError>;

    /// Current position of the leading motor.
    ///
    /// Units: mechanism rotations
    fn position_rot(&mut self) -> Result<f64, BackendError>;

    /// Number of following motors bound by [`initialize`](Self::initialize).
    fn num_followers(&self) -> usize;
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The context a subsystem executes in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RobotMode {
    Real,
    Sim,
    Replay,
}

/// What a backend is built from, one variant per [`RobotMode`].
pub enum BackendSource {
    /// Controllers on a bus.
    Real(Box<dyn DriverBus>),

    /// Simulation model parameters.
    Sim(SimParams),

    /// Recorded snapshots, oldest first.
    Replay(Vec<Snapshot>),
}

/// The bound backend of a subsystem.
pub enum Backend {
    Real(RealBackend),
    Sim(SimBackend),
    Replay(ReplayBackend),
}

/// Incorrect use of the backend or subsystem API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Misuse {
    /// `initialize` was called on an already bound backend.
    DoubleInit,

    /// The motor group was changed after the backend was bound.
    GroupMutationAfterBind,

    /// A command or cycle was issued before the backend was bound.
    NotBound,

    /// Binding was attempted without a leading motor.
    NoLeadingMotor,

    /// The backend source does not match the declared mode.
    ModeMismatch {
        declared: RobotMode,
        source: RobotMode,
    },
}

/// Errors which can occur in a backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Hardware for motor {id} is unavailable: {source}")]
    HardwareUnavailable {
        id: u32,
        source: DriverError,
    },

    #[error("{0}")]
    InvalidConfiguration(ConfigError),

    #[error("Backend misuse: {0}")]
    Misuse(Misuse),

    #[error("Driver error: {0}")]
    Driver(DriverError),

    #[error("Could not load the replay archive: {0}")]
    ReplayLoad(ArchiveError),

    #[error("Invalid simulation parameters: {0}")]
    InvalidSimParams(String),

    #[error("The replay contains no records")]
    NoReplayData,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl fmt::Display for RobotMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RobotMode::Real => "real",
            RobotMode::Sim => "sim",
            RobotMode::Replay => "replay",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for RobotMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "real" => Ok(RobotMode::Real),
            "sim" | "simulated" => Ok(RobotMode::Sim),
            "replay" | "replayed" => Ok(RobotMode::Replay),
            _ => Err(format!("Unknown robot mode \"{}\", expected real, sim or replay", s))
        }
    }
}

impl fmt::Display for Misuse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Misuse::DoubleInit => write!(f, "the backend has already been initialised"),
            Misuse::GroupMutationAfterBind =>
                write!(f, "the motor group cannot be changed once bound"),
            Misuse::NotBound => write!(f, "the backend has not been bound yet"),
            Misuse::NoLeadingMotor => write!(f, "no leading motor has been set"),
            Misuse::ModeMismatch { declared, source } => write!(
                f, "a {} backend was given to a subsystem declared as {}", source, declared
            ),
        }
    }
}

impl From<DriverError> for BackendError {
    fn from(e: DriverError) -> Self {
        BackendError::Driver(e)
    }
}

impl From<ConfigError> for BackendError {
    fn from(e: ConfigError) -> Self {
        BackendError::InvalidConfiguration(e)
    }
}

impl BackendSource {
    /// The mode of the backend this source builds.
    pub fn mode(&self) -> RobotMode {
        match self {
            BackendSource::Real(_) => RobotMode::Real,
            BackendSource::Sim(_) => RobotMode::Sim,
            BackendSource::Replay(_) => RobotMode::Replay,
        }
    }
}

impl Backend {
    /// Build the backend for a source.
    ///
    /// `cycle_period_s` is the time between calls to `update_inputs`.
    pub fn new(source: BackendSource, cycle_period_s: f64) -> Self {
        match source {
            BackendSource::Real(bus) => Backend::Real(RealBackend::new(bus)),
            BackendSource::Sim(params) => Backend::Sim(SimBackend::new(params, cycle_period_s)),
            BackendSource::Replay(records) => Backend::Replay(ReplayBackend::new(records)),
        }
    }

    fn inner(&self) -> &dyn ActBackend {
        match self {
            Backend::Real(b) => b,
            Backend::Sim(b) => b,
            Backend::Replay(b) => b,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ActBackend {
        match self {
            Backend::Real(b) => b,
            Backend::Sim(b) => b,
            Backend::Replay(b) => b,
        }
    }
}

impl ActBackend for Backend {
    fn mode(&self) -> RobotMode {
        self.inner().mode()
    }

    fn initialize(
        &mut self,
        leading: &MotorData,
        following: &[MotorData]
    ) -> Result<(), BackendError> {
        self.inner_mut().initialize(leading, following)
    }

    fn update_inputs(&mut self, snapshot: &mut Snapshot) -> Result<(), BackendError> {
        self.inner_mut().update_inputs(snapshot)
    }

    fn set_goal_position(&mut self, position_rot: f64) -> Result<(), BackendError> {
        self.inner_mut().set_goal_position(position_rot)
    }

    fn set_voltage(&mut self, volts: f64) -> Result<(), BackendError> {
        self.inner_mut().set_voltage(volts)
    }

    fn position_rot(&mut self) -> Result<f64, BackendError> {
        self.inner_mut().position_rot()
    }

    fn num_followers(&self) -> usize {
        self.inner().num_followers()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_robot_mode_from_str() {
        assert_eq!("Real".parse::<RobotMode>(), Ok(RobotMode::Real));
        assert_eq!("sim".parse::<RobotMode>(), Ok(RobotMode::Sim));
        assert_eq!("REPLAYED".parse::<RobotMode>(), Ok(RobotMode::Replay));
        assert!("hardware".parse::<RobotMode>().is_err());
    }

    #[test]
    fn test_backend_follows_source_mode() {
        let sim = Backend::new(BackendSource::Sim(SimParams::default()), 0.02);
        assert_eq!(sim.mode(), RobotMode::Sim);

        let replay = Backend::new(BackendSource::Replay(vec![]), 0.02);
        assert_eq!(replay.mode(), RobotMode::Replay);
    }
}
