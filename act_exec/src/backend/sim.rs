//! Simulated backend
//!
//! Each bound motor is modelled as a brushed DC motor driving an inertia
//! through the configured gear ratio. The electrical dynamics are taken as
//! purely resistive (inductance neglected):
//!
//! ```text
//! i = (V - Ke * w_rotor) / R          (clamped to the stator current limit)
//! T = G * Kt * i                      (torque at the mechanism)
//! J * dw/dt = T - b * w               (mechanism)
//! ```
//!
//! The mechanical equation is integrated with implicit Euler so that stiff
//! back-EMF damping through high gear ratios stays stable at the control
//! period. Profiled position requests run a trapezoidal profile and the slot 0
//! PID and feedforward gains, in the way a motor controller's onboard loop
//! would.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::f64::consts::PI;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use util::maths::{clamp, sign};

use super::{ActBackend, BackendError, ControlRequest, Misuse, RobotMode};
use crate::motor_data::{MotorConfig, MotorData, NeutralModeValue};
use crate::snapshot::Snapshot;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Physical parameters of the simulated motors.
///
/// Defaults approximate a Falcon 500 driving a light mechanism.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimParams {
    /// Armature resistance.
    ///
    /// Units: ohms
    pub resistance_ohm: f64,

    /// Units: newton metres/amp
    pub torque_constant_nm_per_a: f64,

    /// Units: volts/(radian/second)
    pub back_emf_v_per_rad_s: f64,

    /// Inertia of the mechanism.
    ///
    /// Units: kilogram metres^2
    pub inertia_kg_m2: f64,

    /// Viscous friction of the mechanism.
    ///
    /// Units: newton metres/(radian/second)
    pub damping_nm_per_rad_s: f64,

    /// Units: volts
    pub supply_voltage_v: f64,
}

/// A single simulated motor and its onboard controller.
#[derive(Clone, Debug)]
pub struct SimMotor {
    id: u32,

    config: MotorConfig,

    params: SimParams,

    request: ControlRequest,

    /// Profile setpoint for motion magic requests.
    setpoint: Setpoint,

    /// Integral of the position error.
    ///
    /// Units: rotation seconds
    error_integral: f64,

    /// Units: mechanism rotations
    position_rot: f64,

    /// Units: mechanism rotations/second
    velocity_rps: f64,

    /// Units: amps
    current_a: f64,

    /// Output applied in the last step, `None` when in neutral.
    ///
    /// Units: volts
    applied_v: Option<f64>,
}

#[derive(Clone, Copy, Debug, Default)]
struct Setpoint {
    position_rot: f64,
    velocity_rps: f64,
    acceleration_rps2: f64,
}

/// Backend stepping [`SimMotor`]s once per cycle.
pub struct SimBackend {
    params: SimParams,

    period_s: f64,

    leader: Option<SimMotor>,

    /// Followers and the sign applied to the leader's output.
    followers: Vec<(SimMotor, f64)>,

    goal_position_rot: Option<f64>,

    voltage_v: Option<f64>,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for SimParams {
    fn default() -> Self {
        Self {
            resistance_ohm: 0.0467,
            torque_constant_nm_per_a: 0.01825,
            back_emf_v_per_rad_s: 0.01796,
            inertia_kg_m2: 0.01,
            damping_nm_per_rad_s: 0.001,
            supply_voltage_v: 12.0,
        }
    }
}

impl SimParams {
    /// Check every parameter is finite and positive, damping may be zero.
    pub fn validate(&self) -> Result<(), BackendError> {
        let positive = [
            ("resistance", self.resistance_ohm),
            ("torque constant", self.torque_constant_nm_per_a),
            ("back-EMF constant", self.back_emf_v_per_rad_s),
            ("inertia", self.inertia_kg_m2),
            ("supply voltage", self.supply_voltage_v),
        ];

        for (name, value) in positive.iter() {
            if !(value.is_finite() && *value > 0.0) {
                return Err(BackendError::InvalidSimParams(format!(
                    "{} must be positive, found {}", name, value
                )));
            }
        }

        let damping = self.damping_nm_per_rad_s;
        if !(damping.is_finite() && damping >= 0.0) {
            return Err(BackendError::InvalidSimParams(format!(
                "damping must not be negative, found {}", damping
            )));
        }

        Ok(())
    }
}

impl SimMotor {
    /// Create a motor at rest at position zero, in neutral.
    pub fn new(id: u32, config: &MotorConfig, params: &SimParams) -> Self {
        Self {
            id,
            config: config.clone(),
            params: params.clone(),
            request: ControlRequest::Neutral,
            setpoint: Setpoint::default(),
            error_integral: 0.0,
            position_rot: 0.0,
            velocity_rps: 0.0,
            current_a: 0.0,
            applied_v: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Units: mechanism rotations
    pub fn position_rot(&self) -> f64 {
        self.position_rot
    }

    /// Units: mechanism rotations/second
    pub fn velocity_rps(&self) -> f64 {
        self.velocity_rps
    }

    /// Units: amps
    pub fn current_a(&self) -> f64 {
        self.current_a
    }

    /// Output applied during the last step, `None` when in neutral.
    pub fn applied_v(&self) -> Option<f64> {
        self.applied_v
    }

    /// Position of the shaft in the fixed physical frame, independent of the
    /// motor's inversion.
    pub fn shaft_position_rot(&self) -> f64 {
        self.config.motor_output.inverted.direction() * self.position_rot
    }

    /// Issue a new request to the onboard controller.
    pub fn set_control(&mut self, request: ControlRequest) {
        if let ControlRequest::MotionMagicPosition { .. } = request {
            // A new goal restarts the profile from the present state
            if !matches!(self.request, ControlRequest::MotionMagicPosition { .. }) {
                self.setpoint = Setpoint {
                    position_rot: self.position_rot,
                    velocity_rps: self.velocity_rps,
                    acceleration_rps2: 0.0,
                };
            }
            self.error_integral = 0.0;
        }

        self.request = request;
    }

    /// Output the onboard controller demands for the next `dt` seconds.
    ///
    /// Followers are driven with [`step`](Self::step) directly, their request
    /// produces no output on its own.
    pub fn control_output(&mut self, dt: f64) -> Option<f64> {
        match self.request {
            ControlRequest::Neutral | ControlRequest::Follower { .. } => None,
            ControlRequest::Voltage { volts } => Some(volts),
            ControlRequest::MotionMagicPosition { position_rot } => {
                self.advance_profile(position_rot, dt);
                Some(self.closed_loop(dt))
            }
        }
    }

    /// Integrate the motor over `dt` seconds with the given output.
    pub fn step(&mut self, output_v: Option<f64>, dt: f64) {
        let output_v = output_v.and_then(|v| self.apply_soft_limits(v));
        self.applied_v = output_v;

        let p = &self.params;
        let gear = self.config.feedback.rotor_to_mechanism_ratio();
        let w_mech = self.velocity_rps * 2.0 * PI;
        let w_rotor = w_mech * gear;

        // The motor acts as a voltage source in brake mode and an open circuit
        // in coast.
        let source_v = match (output_v, self.config.motor_output.neutral_mode) {
            (Some(v), _) => Some(clamp(v, -p.supply_voltage_v, p.supply_voltage_v)),
            (None, NeutralModeValue::Brake) => Some(0.0),
            (None, NeutralModeValue::Coast) => None,
        };

        let limits = &self.config.current_limits;
        let limit_a = if limits.stator_current_limit_enable {
            limits.stator_current_limit_a.abs()
        }
        else {
            std::f64::INFINITY
        };

        let w_next = match source_v {
            Some(v) => {
                let current = (v - p.back_emf_v_per_rad_s * w_rotor) / p.resistance_ohm;

                if current.abs() <= limit_a {
                    // Back-EMF damping taken implicitly
                    let drive = gear * p.torque_constant_nm_per_a * v / p.resistance_ohm;
                    let emf_damping = gear * gear
                        * p.torque_constant_nm_per_a * p.back_emf_v_per_rad_s
                        / p.resistance_ohm;

                    let w = (w_mech + dt * drive / p.inertia_kg_m2)
                        / (1.0 + dt * (emf_damping + p.damping_nm_per_rad_s) / p.inertia_kg_m2);

                    self.current_a = (v - p.back_emf_v_per_rad_s * w * gear) / p.resistance_ohm;
                    w
                }
                else {
                    self.current_a = sign(current) * limit_a;
                    let torque = gear * p.torque_constant_nm_per_a * self.current_a;

                    (w_mech + dt * torque / p.inertia_kg_m2)
                        / (1.0 + dt * p.damping_nm_per_rad_s / p.inertia_kg_m2)
                }
            },
            None => {
                self.current_a = 0.0;
                w_mech / (1.0 + dt * p.damping_nm_per_rad_s / p.inertia_kg_m2)
            }
        };

        self.velocity_rps = w_next / (2.0 * PI);
        self.position_rot += self.velocity_rps * dt;
    }

    /// Zero any output which would drive the motor past an enabled soft stop.
    fn apply_soft_limits(&self, output_v: f64) -> Option<f64> {
        let limits = &self.config.soft_limits;

        if limits.forward_enable
            && output_v > 0.0
            && self.position_rot >= limits.forward_threshold_rot
        {
            return None;
        }
        if limits.reverse_enable
            && output_v < 0.0
            && self.position_rot <= limits.reverse_threshold_rot
        {
            return None;
        }

        Some(output_v)
    }

    /// Move the setpoint one step along a trapezoidal profile towards the
    /// goal. Zero limits leave that quantity unconstrained.
    fn advance_profile(&mut self, goal_rot: f64, dt: f64) {
        let mm = &self.config.motion_magic;
        let sp = &mut self.setpoint;

        let error = goal_rot - sp.position_rot;
        let dir = sign(error);

        let mut target_vel = if dt > 0.0 { error / dt } else { 0.0 };
        if mm.acceleration_rps2 > 0.0 {
            let stopping_vel = (2.0 * mm.acceleration_rps2 * error.abs()).sqrt();
            target_vel = dir * target_vel.abs().min(stopping_vel);
        }
        if mm.cruise_velocity_rps > 0.0 {
            target_vel = dir * target_vel.abs().min(mm.cruise_velocity_rps);
        }

        let mut vel = target_vel;
        if mm.acceleration_rps2 > 0.0 {
            let max_dv = mm.acceleration_rps2 * dt;
            vel = sp.velocity_rps + clamp(target_vel - sp.velocity_rps, -max_dv, max_dv);
        }

        let next_pos = sp.position_rot + vel * dt;
        let prev_vel = sp.velocity_rps;

        if sign(goal_rot - next_pos) != dir || dir == 0.0 {
            sp.position_rot = goal_rot;
            sp.velocity_rps = 0.0;
        }
        else {
            sp.position_rot = next_pos;
            sp.velocity_rps = vel;
        }

        sp.acceleration_rps2 = if dt > 0.0 {
            (sp.velocity_rps - prev_vel) / dt
        }
        else {
            0.0
        };
    }

    /// Slot 0 PID on the setpoint plus feedforward.
    fn closed_loop(&mut self, dt: f64) -> f64 {
        let gains = &self.config.slot0;
        let sp = self.setpoint;

        let error = sp.position_rot - self.position_rot;
        self.error_integral += error * dt;

        let feedback = gains.kp * error
            + gains.ki * self.error_integral
            + gains.kd * (sp.velocity_rps - self.velocity_rps);

        let feedforward = gains.kg
            + gains.ks * sign(sp.velocity_rps)
            + gains.kv * sp.velocity_rps
            + gains.ka * sp.acceleration_rps2;

        feedback + feedforward
    }
}

impl SimBackend {
    pub fn new(params: SimParams, period_s: f64) -> Self {
        Self {
            params,
            period_s,
            leader: None,
            followers: Vec::new(),
            goal_position_rot: None,
            voltage_v: None,
        }
    }

    /// The simulated leading motor, if bound.
    pub fn leader(&self) -> Option<&SimMotor> {
        self.leader.as_ref()
    }

    /// The simulated following motors.
    pub fn followers(&self) -> impl Iterator<Item = &SimMotor> {
        self.followers.iter().map(|(m, _)| m)
    }

    fn leader_mut(&mut self) -> Result<&mut SimMotor, BackendError> {
        self.leader
            .as_mut()
            .ok_or(BackendError::Misuse(Misuse::NotBound))
    }
}

impl ActBackend for SimBackend {
    fn mode(&self) -> RobotMode {
        RobotMode::Sim
    }

    fn initialize(
        &mut self,
        leading: &MotorData,
        following: &[MotorData]
    ) -> Result<(), BackendError> {
        if self.leader.is_some() {
            return Err(BackendError::Misuse(Misuse::DoubleInit));
        }

        self.params.validate()?;

        let leader_dir = leading.config().motor_output.inverted;

        self.followers = following
            .iter()
            .map(|data| {
                let mut motor = SimMotor::new(data.id(), data.config(), &self.params);
                let oppose_leader = data.config().motor_output.inverted != leader_dir;

                motor.set_control(ControlRequest::Follower {
                    leader_id: leading.id(),
                    oppose_leader
                });
                debug!("Simulated follower {} (oppose: {})", data.id(), oppose_leader);

                (motor, if oppose_leader { -1.0 } else { 1.0 })
            })
            .collect();

        self.leader = Some(SimMotor::new(leading.id(), leading.config(), &self.params));

        info!(
            "Sim backend bound to motor {} with {} follower(s), period {} s",
            leading.id(),
            self.followers.len(),
            self.period_s
        );

        Ok(())
    }

    fn update_inputs(&mut self, snapshot: &mut Snapshot) -> Result<(), BackendError> {
        let dt = self.period_s;
        let leader = self.leader.as_mut().ok_or(BackendError::Misuse(Misuse::NotBound))?;

        let output = leader.control_output(dt);
        leader.step(output, dt);

        // Followers track what the leader applied, so a leader held at a soft
        // stop puts them in neutral too.
        let applied = leader.applied_v();
        for (follower, mirror) in self.followers.iter_mut() {
            follower.step(applied.map(|v| v * *mirror), dt);
        }

        snapshot.position_rot = leader.position_rot();
        snapshot.velocity_rps = leader.velocity_rps();
        snapshot.goal_position_rot = self.goal_position_rot;
        snapshot.voltage_v = self.voltage_v;

        Ok(())
    }

    fn set_goal_position(&mut self, position_rot: f64) -> Result<(), BackendError> {
        self.leader_mut()?
            .set_control(ControlRequest::MotionMagicPosition { position_rot });

        self.goal_position_rot = Some(position_rot);
        self.voltage_v = None;
        Ok(())
    }

    fn set_voltage(&mut self, volts: f64) -> Result<(), BackendError> {
        self.leader_mut()?.set_control(ControlRequest::Voltage { volts });

        self.voltage_v = Some(volts);
        self.goal_position_rot = None;
        Ok(())
    }

    fn position_rot(&mut self) -> Result<f64, BackendError> {
        Ok(self.leader_mut()?.position_rot())
    }

    fn num_followers(&self) -> usize {
        self.followers.len()
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
