//! # Actuator Executable Parameters
//!
//! This module provides parameters for the actuator executable.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::path::PathBuf;

use serde::Deserialize;
use util::logger::LogParams;

use crate::backend::{RobotMode, SimParams};
use crate::motor_data::{ConfigError, MotorData, MotorParams};
use crate::script::TimedDemand;
use crate::subsystem::SubsystemParams;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActExecParams {
    /// Name of the subsystem, used as the telemetry key.
    pub name: String,

    /// Mode to run in unless overridden on the command line.
    pub mode: RobotMode,

    /// Number of cycles to run for, forever if not given.
    pub num_cycles: Option<u64>,

    /// Number of consecutive cycle overruns after which the executable stops.
    #[serde(default = "default_max_consec_overruns")]
    pub max_consec_overruns: u64,

    #[serde(default)]
    pub log: LogParams,

    #[serde(default)]
    pub subsystem: SubsystemParams,

    pub leading: MotorParams,

    #[serde(default)]
    pub following: Vec<MotorParams>,

    #[serde(default)]
    pub sim: SimParams,

    /// Snapshot archive to play in replay mode.
    pub replay_path: Option<PathBuf>,

    #[serde(default)]
    pub demands: Vec<TimedDemand>,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn default_max_consec_overruns() -> u64 {
    500
}

impl ActExecParams {
    /// Build and validate the leading and following motors.
    pub fn motors(&self) -> Result<(MotorData, Vec<MotorData>), ConfigError> {
        let leading = self.leading.to_motor_data();
        leading.validate()?;

        let following = self.following
            .iter()
            .map(|p| {
                let m = p.to_motor_data();
                m.validate().map(|_| m)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok((leading, following))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::script::Demand;

    const PARAMS: &str = r#"
        name = "elevator"
        mode = "Sim"
        num_cycles = 500

        [log]
        level = "info"

        [subsystem]
        cycle_period_s = 0.01

        [subsystem.sysid]
        step_voltage_v = 4.0

        [leading]
        id = 5
        current_limit_a = 40.0
        inverted = true

        [[following]]
        id = 6
        current_limit_a = 40.0

        [sim]
        inertia_kg_m2 = 0.05

        [[demands]]
        time_s = 1.0
        demand = { type = "Voltage", volts = 2.0 }
    "#;

    #[test]
    fn test_load_exec_params() {
        let params: ActExecParams = util::params::from_str(PARAMS).unwrap();

        assert_eq!(params.mode, RobotMode::Sim);
        assert_eq!(params.num_cycles, Some(500));
        assert_eq!(params.max_consec_overruns, 500);
        assert_eq!(params.log.level, "info");
        assert_eq!(params.subsystem.cycle_period_s, 0.01);
        assert_eq!(params.subsystem.sysid.step_voltage_v, 4.0);
        assert_eq!(params.subsystem.sysid.ramp_rate_vps, 1.0);
        assert_eq!(params.sim.inertia_kg_m2, 0.05);
        assert_eq!(params.sim.supply_voltage_v, 12.0);
        assert_eq!(params.replay_path, None);
        assert_eq!(params.demands[0].demand, Demand::Voltage { volts: 2.0 });

        let (leading, following) = params.motors().unwrap();
        assert_eq!(leading.id(), 5);
        assert_eq!(following.len(), 1);
        assert_eq!(following[0].id(), 6);
    }

    #[test]
    fn test_shipped_params_valid() {
        let params: ActExecParams = util::params::load_path(
            concat!(env!("CARGO_MANIFEST_DIR"), "/params/act_exec.toml")
        ).unwrap();

        let (leading, following) = params.motors().unwrap();
        assert_eq!(leading.id(), 5);
        assert_eq!(following.len(), 1);
        assert_eq!(params.demands.len(), 4);
    }

    #[test]
    fn test_invalid_motor_rejected() {
        let params: ActExecParams = util::params::from_str(r#"
            name = "arm"
            mode = "Real"

            [leading]
            id = 1

            [[following]]
            id = 2
            soft_stops = [-1.0, 1.0]
        "#).unwrap();

        match params.motors() {
            Err(ConfigError::InvalidConfiguration { id, .. }) => assert_eq!(id, 2),
            Ok(_) => panic!("expected the follower to be rejected")
        }
    }
}
