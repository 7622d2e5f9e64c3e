//! Implementations for the ActSubsystem state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

// Internal
use super::{MotorGroup, SubsystemError, SubsystemParams};
use crate::backend::{ActBackend, Backend, BackendSource, Misuse, RobotMode};
use crate::motor_data::MotorData;
use crate::snapshot::Snapshot;
use crate::sysid::{SysIdConfig, SysIdRoutine, SysIdState, SysIdTest};
use crate::telemetry::{NullSink, TelemetrySink};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Actuator subsystem state
pub struct ActSubsystem {
    name: String,

    mode: RobotMode,

    params: SubsystemParams,

    group: MotorGroup,

    backend: Option<Backend>,

    sink: Box<dyn TelemetrySink>,

    snapshot: Snapshot,

    sysid: SysIdRoutine,

    /// Time of the next cycle, accumulated from the cycle period.
    ///
    /// Units: seconds
    time_s: f64,
}

/// Input data to the subsystem.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InputData {
    /// New profiled position demand, if any.
    ///
    /// Units: mechanism rotations
    pub goal_position_rot: Option<f64>,

    /// New open loop voltage demand, if any.
    ///
    /// Units: volts
    pub voltage_v: Option<f64>,

    /// Characterization command, if any.
    pub sysid: Option<SysIdCmd>,
}

/// Status report for subsystem processing.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct StatusReport {
    /// True if the characterization routine is running.
    pub sysid_active: bool,

    /// Voltage commanded by the characterization routine this cycle.
    ///
    /// Units: volts
    pub sysid_voltage_v: Option<f64>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Commands for the characterization routine.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum SysIdCmd {
    Start(SysIdTest),
    Stop,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ActSubsystem {
    /// Create a new unbound subsystem with an empty motor group.
    pub fn new<S: Into<String>>(
        name: S,
        mode: RobotMode,
        params: SubsystemParams
    ) -> Result<Self, SubsystemError> {
        params.validate()?;
        let sysid = SysIdRoutine::new(params.sysid.clone())?;

        Ok(Self {
            name: name.into(),
            mode,
            params,
            group: MotorGroup::default(),
            backend: None,
            sink: Box::new(NullSink),
            snapshot: Snapshot::default(),
            sysid,
            time_s: 0.0,
        })
    }

    /// Replace the telemetry sink.
    pub fn with_sink(mut self, sink: Box<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replace the characterization parameters.
    pub fn with_sysid(mut self, config: SysIdConfig) -> Result<Self, SubsystemError> {
        self.sysid = SysIdRoutine::new(config.clone())?;
        self.params.sysid = config;
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> RobotMode {
        self.mode
    }

    pub fn params(&self) -> &SubsystemParams {
        &self.params
    }

    pub fn group(&self) -> &MotorGroup {
        &self.group
    }

    /// The snapshot produced by the last cycle.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn sysid_state(&self) -> SysIdState {
        self.sysid.state()
    }

    /// The bound backend, `None` until initialised.
    pub fn backend(&self) -> Option<&Backend> {
        self.backend.as_ref()
    }

    pub fn is_bound(&self) -> bool {
        self.backend.is_some()
    }

    // ---- GROUP ----

    /// Set the leading motor, replacing any previous leader.
    pub fn set_leading_motor(&mut self, data: MotorData) -> Result<(), SubsystemError> {
        self.check_unbound()?;
        self.group.leading = Some(data);
        Ok(())
    }

    /// Add a motor to follow the leader.
    pub fn add_following_motor(&mut self, data: MotorData) -> Result<(), SubsystemError> {
        self.check_unbound()?;
        self.group.following.push(data);
        Ok(())
    }

    // ---- COMMANDS ----

    /// Units: mechanism rotations
    pub fn set_goal_position(&mut self, position_rot: f64) -> Result<(), SubsystemError> {
        Ok(self.backend_mut()?.set_goal_position(position_rot)?)
    }

    /// Units: volts
    pub fn set_voltage(&mut self, volts: f64) -> Result<(), SubsystemError> {
        Ok(self.backend_mut()?.set_voltage(volts)?)
    }

    /// Units: mechanism rotations
    pub fn position_rot(&mut self) -> Result<f64, SubsystemError> {
        Ok(self.backend_mut()?.position_rot()?)
    }

    // ---- CHARACTERIZATION ----

    /// Start a characterization run, which takes over the voltage output.
    pub fn start_sysid(&mut self, test: SysIdTest) -> Result<(), SubsystemError> {
        self.backend_mut()?;
        self.sysid.start(test);
        Ok(())
    }

    /// Stop any characterization run and zero the output.
    pub fn stop_sysid(&mut self) -> Result<(), SubsystemError> {
        let was_active = self.sysid.is_active();
        self.sysid.stop();

        if was_active {
            self.backend_mut()?.set_voltage(0.0)?;
        }
        Ok(())
    }

    fn check_unbound(&self) -> Result<(), Misuse> {
        match self.backend {
            Some(_) => Err(Misuse::GroupMutationAfterBind),
            None => Ok(())
        }
    }

    fn backend_mut(&mut self) -> Result<&mut Backend, Misuse> {
        self.backend.as_mut().ok_or(Misuse::NotBound)
    }
}

impl State for ActSubsystem {
    type InitData = BackendSource;
    type InitError = SubsystemError;

    type InputData = InputData;
    type OutputData = Snapshot;
    type StatusReport = StatusReport;
    type ProcError = SubsystemError;

    /// Bind the motor group to the backend built from the source.
    ///
    /// The group is copied into the backend as it is now, it can no longer be
    /// changed afterwards.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        if self.backend.is_some() {
            return Err(Misuse::DoubleInit.into());
        }

        if init_data.mode() != self.mode {
            return Err(Misuse::ModeMismatch {
                declared: self.mode,
                source: init_data.mode()
            }.into());
        }

        let leading = self.group.leading.as_ref().ok_or(Misuse::NoLeadingMotor)?;

        let mut backend = Backend::new(init_data, self.params.cycle_period_s);
        backend.initialize(leading, &self.group.following)?;

        info!(
            "{} bound in {} mode, leader {} with {} follower(s)",
            self.name,
            self.mode,
            leading.id(),
            backend.num_followers()
        );

        self.backend = Some(backend);

        Ok(())
    }

    /// Perform one control cycle.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let mut report = StatusReport::default();
        let dt = self.params.cycle_period_s;

        self.backend_mut()?;

        // Demands
        if let Some(goal) = input_data.goal_position_rot {
            debug!("{} goal position demand: {} rot", self.name, goal);
            self.set_goal_position(goal)?;
        }
        if let Some(volts) = input_data.voltage_v {
            debug!("{} voltage demand: {} V", self.name, volts);
            self.set_voltage(volts)?;
        }
        match input_data.sysid {
            Some(SysIdCmd::Start(test)) => self.start_sysid(test)?,
            Some(SysIdCmd::Stop) => self.stop_sysid()?,
            None => ()
        }

        // Inputs
        self.snapshot.time_s = self.time_s;
        if let Some(backend) = self.backend.as_mut() {
            backend.update_inputs(&mut self.snapshot)?;
        }

        // Telemetry
        self.sink.publish(&self.name, &self.snapshot)?;

        // Characterization
        if let Some(volts) = self.sysid.step(dt) {
            self.backend_mut()?.set_voltage(volts)?;
            report.sysid_voltage_v = Some(volts);
        }
        report.sysid_active = self.sysid.is_active();
        self.snapshot.sysid_state = self.sysid.state().to_string();

        trace!("{} snapshot: {:?}", self.name, self.snapshot);

        self.time_s += dt;

        Ok((self.snapshot.clone(), report))
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::backend::{BackendError, SimParams};
    use crate::telemetry::TelemetryError;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Published = Rc<RefCell<Vec<(String, Snapshot)>>>;

    /// Sink keeping every published snapshot in memory.
    struct MemorySink(Published);

    impl TelemetrySink for MemorySink {
        fn publish(&mut self, name: &str, snapshot: &Snapshot) -> Result<(), TelemetryError> {
            self.0.borrow_mut().push((name.to_string(), snapshot.clone()));
            Ok(())
        }
    }

    fn elevator(mode: RobotMode) -> (ActSubsystem, Published) {
        let published = Published::default();

        let mut sub = ActSubsystem::new("elevator", mode, SubsystemParams::default())
            .unwrap()
            .with_sink(Box::new(MemorySink(published.clone())));

        let leader = MotorData::new(5)
            .with_current_limit(40.0)
            .with_inverted(true);
        let follower = MotorData::new(6).with_config(leader.config());

        sub.set_leading_motor(leader).unwrap();
        sub.add_following_motor(follower).unwrap();

        (sub, published)
    }

    #[test]
    fn test_sim_end_to_end() {
        let (mut sub, published) = elevator(RobotMode::Sim);
        sub.init(BackendSource::Sim(SimParams::default())).unwrap();

        assert_eq!(sub.backend().map(|b| b.num_followers()), Some(1));

        let (snap, report) = sub.proc(&InputData::default()).unwrap();

        assert!(snap.position_rot.abs() < 1e-9);
        assert_eq!(snap.sysid_state, "None");
        assert!(!report.sysid_active);

        let published = published.borrow();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "elevator");
        assert_eq!(published[0].1.position_rot, snap.position_rot);
    }

    #[test]
    fn test_group_locked_after_bind() {
        let (mut sub, _) = elevator(RobotMode::Sim);
        sub.init(BackendSource::Sim(SimParams::default())).unwrap();

        assert!(matches!(
            sub.add_following_motor(MotorData::new(7)),
            Err(SubsystemError::Misuse(Misuse::GroupMutationAfterBind))
        ));
        assert!(matches!(
            sub.set_leading_motor(MotorData::new(7)),
            Err(SubsystemError::Misuse(Misuse::GroupMutationAfterBind))
        ));
        assert!(matches!(
            sub.init(BackendSource::Sim(SimParams::default())),
            Err(SubsystemError::Misuse(Misuse::DoubleInit))
        ));
    }

    #[test]
    fn test_init_misuse() {
        let (mut sub, _) = elevator(RobotMode::Sim);
        assert!(matches!(
            sub.proc(&InputData::default()),
            Err(SubsystemError::Misuse(Misuse::NotBound))
        ));
        assert!(matches!(
            sub.set_voltage(1.0),
            Err(SubsystemError::Misuse(Misuse::NotBound))
        ));
        assert!(matches!(
            sub.init(BackendSource::Replay(vec![])),
            Err(SubsystemError::Misuse(Misuse::ModeMismatch {
                declared: RobotMode::Sim,
                source: RobotMode::Replay
            }))
        ));

        let mut empty = ActSubsystem::new("empty", RobotMode::Sim, SubsystemParams::default())
            .unwrap();
        assert!(matches!(
            empty.init(BackendSource::Sim(SimParams::default())),
            Err(SubsystemError::Misuse(Misuse::NoLeadingMotor))
        ));
    }

    #[test]
    fn test_demands_forwarded() {
        let (mut sub, _) = elevator(RobotMode::Sim);
        sub.init(BackendSource::Sim(SimParams::default())).unwrap();

        let (snap, _) = sub.proc(&InputData {
            voltage_v: Some(4.0),
            ..InputData::default()
        }).unwrap();
        assert_eq!(snap.voltage_v, Some(4.0));
        assert!(snap.position_rot > 0.0);

        let (snap, _) = sub.proc(&InputData {
            goal_position_rot: Some(0.0),
            ..InputData::default()
        }).unwrap();
        assert_eq!(snap.goal_position_rot, Some(0.0));
        assert_eq!(snap.voltage_v, None);
        assert!((snap.time_s - 0.02).abs() < 1e-12);
    }

    #[test]
    fn test_sysid_label_recorded() {
        let (mut sub, published) = elevator(RobotMode::Sim);
        sub.init(BackendSource::Sim(SimParams::default())).unwrap();

        let (snap, report) = sub.proc(&InputData {
            sysid: Some(SysIdCmd::Start(SysIdTest::Forward)),
            ..InputData::default()
        }).unwrap();
        assert_eq!(snap.sysid_state, "quasistatic-forward");
        assert!(report.sysid_active);
        assert!(report.sysid_voltage_v.unwrap() > 0.0);

        sub.proc(&InputData::default()).unwrap();

        {
            let published = published.borrow();
            assert_eq!(published[0].1.sysid_state, "None");
            assert_eq!(published[1].1.sysid_state, "quasistatic-forward");
            assert!(published[1].1.voltage_v.unwrap() > 0.0);
        }

        let (snap, report) = sub.proc(&InputData {
            sysid: Some(SysIdCmd::Stop),
            ..InputData::default()
        }).unwrap();
        assert_eq!(snap.sysid_state, "None");
        assert_eq!(snap.voltage_v, Some(0.0));
        assert!(!report.sysid_active);
    }

    #[test]
    fn test_replay_subsystem() {
        let records: Vec<Snapshot> = [0.0, 0.1, 0.2]
            .iter()
            .map(|p| Snapshot { position_rot: *p, ..Snapshot::default() })
            .collect();

        let (mut sub, _) = elevator(RobotMode::Replay);
        sub.init(BackendSource::Replay(records)).unwrap();

        sub.set_goal_position(100.0).unwrap();

        let mut positions = Vec::new();
        for _ in 0..4 {
            let (snap, _) = sub.proc(&InputData::default()).unwrap();
            positions.push(snap.position_rot);
        }

        assert_eq!(positions, vec![0.0, 0.1, 0.2, 0.2]);
        assert_eq!(sub.position_rot().unwrap(), 0.2);

        match sub.backend() {
            Some(Backend::Replay(r)) => assert_eq!(r.ignored_commands(), 1),
            _ => panic!("expected a replay backend")
        }
    }

    #[test]
    fn test_invalid_period_rejected() {
        for period in [0.0, -0.02, std::f64::NAN].iter() {
            let params = SubsystemParams {
                cycle_period_s: *period,
                ..SubsystemParams::default()
            };
            assert!(matches!(
                ActSubsystem::new("elevator", RobotMode::Sim, params),
                Err(SubsystemError::InvalidParams(_))
            ));
        }
    }

    #[test]
    fn test_sysid_times_out_in_subsystem() {
        let params = SubsystemParams {
            cycle_period_s: 0.5,
            sysid: SysIdConfig {
                ramp_rate_vps: 0.1,
                timeout_s: 2.0,
                ..SysIdConfig::default()
            },
        };
        let mut sub = ActSubsystem::new("elevator", RobotMode::Sim, params).unwrap();
        sub.set_leading_motor(MotorData::new(5)).unwrap();
        sub.init(BackendSource::Sim(SimParams::default())).unwrap();

        sub.start_sysid(SysIdTest::Forward).unwrap();
        let mut labels = Vec::new();
        for _ in 0..6 {
            let (snap, _) = sub.proc(&InputData::default()).unwrap();
            labels.push(snap.sysid_state);
        }

        assert_eq!(labels[0], "quasistatic-forward");
        assert!(labels.iter().any(|l| l == "timeout"));
        assert_eq!(labels[5], "None");
        assert_eq!(sub.snapshot().voltage_v, Some(0.0));
    }

    #[test]
    fn test_real_hardware_unavailable() {
        use crate::backend::{ActuatorDriver, DriverBus, DriverError};

        struct EmptyBus;

        impl DriverBus for EmptyBus {
            fn open(&mut self, id: u32) -> Result<Box<dyn ActuatorDriver>, DriverError> {
                Err(DriverError::DeviceNotFound(id))
            }
        }

        let (mut sub, _) = elevator(RobotMode::Real);
        assert!(matches!(
            sub.init(BackendSource::Real(Box::new(EmptyBus))),
            Err(SubsystemError::Backend(BackendError::HardwareUnavailable { id: 5, .. }))
        ));
        assert!(!sub.is_bound());
    }
}
