//! Hardware backend

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::{debug, info};

use super::{
    ActBackend, ActuatorDriver, BackendError, ControlRequest, DriverBus, DriverError,
    Misuse, RobotMode,
};
use crate::motor_data::{MotorData, NeutralModeValue};
use crate::snapshot::Snapshot;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Backend driving physical motor controllers.
pub struct RealBackend {
    bus: Box<dyn DriverBus>,

    leader: Option<BoundMotor>,

    followers: Vec<BoundMotor>,

    goal_position_rot: Option<f64>,

    voltage_v: Option<f64>,
}

struct BoundMotor {
    id: u32,
    driver: Box<dyn ActuatorDriver>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl RealBackend {
    pub fn new(bus: Box<dyn DriverBus>) -> Self {
        Self {
            bus,
            leader: None,
            followers: Vec::new(),
            goal_position_rot: None,
            voltage_v: None,
        }
    }

    /// Open and configure a single controller.
    fn bind(&mut self, data: &MotorData) -> Result<BoundMotor, BackendError> {
        let id = data.id();

        let mut driver = self.bus.open(id).map_err(|e| match e {
            DriverError::DeviceNotFound(_) => BackendError::HardwareUnavailable { id, source: e },
            e => BackendError::Driver(e)
        })?;

        driver.apply_config(data.config())?;

        debug!(
            "Motor {} configured ({:?}, {:?})",
            id,
            data.config().motor_output.inverted,
            data.config().motor_output.neutral_mode
        );

        Ok(BoundMotor { id, driver })
    }

    fn leader_mut(&mut self) -> Result<&mut BoundMotor, BackendError> {
        self.leader
            .as_mut()
            .ok_or(BackendError::Misuse(Misuse::NotBound))
    }
}

impl ActBackend for RealBackend {
    fn mode(&self) -> RobotMode {
        RobotMode::Real
    }

    fn initialize(
        &mut self,
        leading: &MotorData,
        following: &[MotorData]
    ) -> Result<(), BackendError> {
        if self.leader.is_some() {
            return Err(BackendError::Misuse(Misuse::DoubleInit));
        }

        // Check everything before touching any hardware
        leading.validate()?;
        for f in following {
            f.validate()?;
        }

        let leader = self.bind(leading)?;
        let leader_id = leader.id;
        let leader_dir = leading.config().motor_output.inverted;

        let mut followers = Vec::with_capacity(following.len());
        for data in following {
            let mut motor = self.bind(data)?;

            let oppose_leader = data.config().motor_output.inverted != leader_dir;
            motor.driver.set_control(ControlRequest::Follower {
                leader_id,
                oppose_leader
            })?;

            followers.push(motor);
        }

        info!(
            "Real backend bound to motor {} with {} follower(s)",
            leader_id,
            followers.len()
        );

        if leading.config().motor_output.neutral_mode == NeutralModeValue::Brake {
            debug!("Leading motor will brake in neutral");
        }

        self.leader = Some(leader);
        self.followers = followers;

        Ok(())
    }

    fn update_inputs(&mut self, snapshot: &mut Snapshot) -> Result<(), BackendError> {
        let goal = self.goal_position_rot;
        let voltage = self.voltage_v;

        let leader = self.leader_mut()?;
        snapshot.position_rot = leader.driver.position_rot()?;
        snapshot.velocity_rps = leader.driver.velocity_rps()?;
        snapshot.goal_position_rot = goal;
        snapshot.voltage_v = voltage;

        Ok(())
    }

    fn set_goal_position(&mut self, position_rot: f64) -> Result<(), BackendError> {
        self.leader_mut()?
            .driver
            .set_control(ControlRequest::MotionMagicPosition { position_rot })?;

        self.goal_position_rot = Some(position_rot);
        self.voltage_v = None;
        Ok(())
    }

    fn set_voltage(&mut self, volts: f64) -> Result<(), BackendError> {
        self.leader_mut()?
            .driver
            .set_control(ControlRequest::Voltage { volts })?;

        self.voltage_v = Some(volts);
        self.goal_position_rot = None;
        Ok(())
    }

    fn position_rot(&mut self) -> Result<f64, BackendError> {
        Ok(self.leader_mut()?.driver.position_rot()?)
    }

    fn num_followers(&self) -> usize {
        self.followers.len()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::motor_data::MotorConfig;
    use std::cell::RefCell;
    use std::rc::Rc;

    type Log = Rc<RefCell<Vec<(u32, ControlRequest)>>>;

    struct MockDriver {
        id: u32,
        log: Log,
        position_rot: f64,
    }

    struct MockBus {
        ids: Vec<u32>,
        log: Log,
    }

    impl ActuatorDriver for MockDriver {
        fn apply_config(&mut self, _config: &MotorConfig) -> Result<(), DriverError> {
            Ok(())
        }

        fn set_control(&mut self, request: ControlRequest) -> Result<(), DriverError> {
            if let ControlRequest::MotionMagicPosition { position_rot } = request {
                self.position_rot = position_rot;
            }
            self.log.borrow_mut().push((self.id, request));
            Ok(())
        }

        fn position_rot(&mut self) -> Result<f64, DriverError> {
            Ok(self.position_rot)
        }

        fn velocity_rps(&mut self) -> Result<f64, DriverError> {
            Ok(0.0)
        }
    }

    impl DriverBus for MockBus {
        fn open(&mut self, id: u32) -> Result<Box<dyn ActuatorDriver>, DriverError> {
            if self.ids.contains(&id) {
                Ok(Box::new(MockDriver {
                    id,
                    log: self.log.clone(),
                    position_rot: 0.0,
                }))
            }
            else {
                Err(DriverError::DeviceNotFound(id))
            }
        }
    }

    fn backend(ids: &[u32]) -> (RealBackend, Log) {
        let log = Log::default();
        let bus = MockBus {
            ids: ids.to_vec(),
            log: log.clone(),
        };
        (RealBackend::new(Box::new(bus)), log)
    }

    #[test]
    fn test_all_followers_bound() {
        let (mut backend, log) = backend(&[5, 6, 7, 8]);

        let leader = MotorData::new(5).with_inverted(true);
        let followers = vec![
            MotorData::new(6).with_inverted(true),
            MotorData::new(7).with_inverted(false),
            MotorData::new(8).with_inverted(true),
        ];

        backend.initialize(&leader, &followers).unwrap();
        assert_eq!(backend.num_followers(), 3);

        let log = log.borrow();
        assert_eq!(log.len(), 3);
        assert_eq!(log[0], (6, ControlRequest::Follower { leader_id: 5, oppose_leader: false }));
        assert_eq!(log[1], (7, ControlRequest::Follower { leader_id: 5, oppose_leader: true }));
        assert_eq!(log[2], (8, ControlRequest::Follower { leader_id: 5, oppose_leader: false }));
    }

    #[test]
    fn test_missing_device() {
        let (mut backend, _) = backend(&[5]);

        match backend.initialize(&MotorData::new(5), &[MotorData::new(9)]) {
            Err(BackendError::HardwareUnavailable { id, .. }) => assert_eq!(id, 9),
            r => panic!("expected HardwareUnavailable, got {:?}", r.err())
        }
    }

    #[test]
    fn test_invalid_config_not_applied() {
        let (mut backend, log) = backend(&[5, 6]);

        let bad_follower = MotorData::new(6).with_current_limit(-5.0);
        let r = backend.initialize(&MotorData::new(5), &[bad_follower]);

        assert!(matches!(r, Err(BackendError::InvalidConfiguration(_))));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_double_init() {
        let (mut backend, _) = backend(&[5]);
        let leader = MotorData::new(5);

        backend.initialize(&leader, &[]).unwrap();
        assert!(matches!(
            backend.initialize(&leader, &[]),
            Err(BackendError::Misuse(Misuse::DoubleInit))
        ));
    }

    #[test]
    fn test_commands() {
        let (mut backend, log) = backend(&[5]);

        assert!(matches!(
            backend.set_voltage(1.0),
            Err(BackendError::Misuse(Misuse::NotBound))
        ));

        backend.initialize(&MotorData::new(5), &[]).unwrap();

        backend.set_goal_position(3.0).unwrap();
        assert_eq!(backend.position_rot().unwrap(), 3.0);

        let mut snap = Snapshot::default();
        backend.update_inputs(&mut snap).unwrap();
        assert_eq!(snap.position_rot, 3.0);
        assert_eq!(snap.goal_position_rot, Some(3.0));
        assert_eq!(snap.voltage_v, None);

        backend.set_voltage(-2.0).unwrap();
        backend.update_inputs(&mut snap).unwrap();
        assert_eq!(snap.goal_position_rot, None);
        assert_eq!(snap.voltage_v, Some(-2.0));

        assert_eq!(
            log.borrow().last(),
            Some(&(5, ControlRequest::Voltage { volts: -2.0 }))
        );
    }
}
