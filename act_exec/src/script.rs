//! # Demand script
//!
//! A list of demands scheduled against subsystem time, used by the executable
//! to drive a subsystem without an operator.
//!
//! ```toml
//! [[demands]]
//! time_s = 1.0
//! demand = { type = "GoalPosition", position_rot = 2.5 }
//!
//! [[demands]]
//! time_s = 6.0
//! demand = { type = "StartSysId", test = "Forward" }
//! ```

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::subsystem::{InputData, SysIdCmd};
use crate::sysid::SysIdTest;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A demand which is scripted to occur at a specific time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimedDemand {
    /// Units: seconds
    pub time_s: f64,

    pub demand: Demand,
}

/// Queue of demands ordered by time.
#[derive(Clone, Debug, Default)]
pub struct DemandScript {
    demands: VecDeque<TimedDemand>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Demand {
    GoalPosition { position_rot: f64 },
    Voltage { volts: f64 },
    StartSysId { test: SysIdTest },
    StopSysId,
}

pub enum PendingDemands {
    None,
    Some(InputData),
    EndOfScript,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DemandScript {
    /// Build a script, demands sharing a time keep their listed order.
    pub fn new(mut demands: Vec<TimedDemand>) -> Self {
        demands.sort_by(|a, b| {
            a.time_s
                .partial_cmp(&b.time_s)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        Self {
            demands: demands.into(),
        }
    }

    /// Collect every demand due at or before `time_s` into one input.
    ///
    /// Later demands of the same kind overwrite earlier ones.
    pub fn pending(&mut self, time_s: f64) -> PendingDemands {
        if self.demands.is_empty() {
            return PendingDemands::EndOfScript;
        }

        let mut input = InputData::default();
        let mut any = false;

        while let Some(next) = self.demands.front() {
            if next.time_s > time_s {
                break;
            }

            match next.demand {
                Demand::GoalPosition { position_rot } => {
                    input.goal_position_rot = Some(position_rot);
                    input.voltage_v = None;
                },
                Demand::Voltage { volts } => {
                    input.voltage_v = Some(volts);
                    input.goal_position_rot = None;
                },
                Demand::StartSysId { test } => input.sysid = Some(SysIdCmd::Start(test)),
                Demand::StopSysId => input.sysid = Some(SysIdCmd::Stop),
            }

            any = true;
            self.demands.pop_front();
        }

        if any {
            PendingDemands::Some(input)
        }
        else {
            PendingDemands::None
        }
    }

    pub fn len(&self) -> usize {
        self.demands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.demands.is_empty()
    }

    /// Time of the last demand.
    pub fn duration_s(&self) -> f64 {
        self.demands.back().map(|d| d.time_s).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Deserialize)]
    struct Script {
        demands: Vec<TimedDemand>,
    }

    #[test]
    fn test_pending() {
        let script: Script = util::params::from_str(r#"
            [[demands]]
            time_s = 1.0
            demand = { type = "StopSysId" }

            [[demands]]
            time_s = 0.5
            demand = { type = "Voltage", volts = 3.0 }

            [[demands]]
            time_s = 0.5
            demand = { type = "GoalPosition", position_rot = 2.0 }

            [[demands]]
            time_s = 0.7
            demand = { type = "StartSysId", test = "Reverse" }
        "#).unwrap();

        let mut script = DemandScript::new(script.demands);
        assert_eq!(script.len(), 4);
        assert_eq!(script.duration_s(), 1.0);

        assert!(matches!(script.pending(0.0), PendingDemands::None));

        match script.pending(0.5) {
            PendingDemands::Some(input) => {
                assert_eq!(input.goal_position_rot, Some(2.0));
                assert_eq!(input.voltage_v, None);
                assert_eq!(input.sysid, None);
            },
            _ => panic!("expected demands at 0.5 s")
        }

        match script.pending(2.0) {
            PendingDemands::Some(input) => {
                assert_eq!(input.sysid, Some(SysIdCmd::Stop));
                assert_eq!(input.goal_position_rot, None);
            },
            _ => panic!("expected demands at 2.0 s")
        }

        assert!(matches!(script.pending(3.0), PendingDemands::EndOfScript));
    }
}
