//! # Motor data module
//!
//! [`MotorData`] holds every tunable parameter of one controlled motor,
//! independent of the driver that will eventually apply it. Each parameter
//! group has a plain setter (`set_*`) and a chaining form (`with_*`) which
//! share the same implementation:
//!
//! ```
//! use act_lib::motor_data::MotorData;
//!
//! let leader = MotorData::new(5)
//!     .with_current_limit(40.0)
//!     .with_inverted(true)
//!     .with_internal_encoder_ratios(12.0);
//!
//! let mut follower = MotorData::new(6);
//! follower.copy_config(leader.config());
//!
//! assert_eq!(follower.config(), leader.config());
//! ```
//!
//! Setters never validate, acceptable ranges are checked by
//! [`MotorData::validate`] when the configuration is applied to hardware.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod config;
mod params;

// ---------------------------------------------------------------------------
// EXPORTS
// ---------------------------------------------------------------------------

pub use config::*;
pub use params::*;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Configuration of a single motor, addressed by its id.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MotorData {
    id: u32,

    config: MotorConfig,

    inversion: InversionConvention,
}

/// Mapping from the boolean `inverted` flag to a rotation direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InversionConvention {
    /// Direction used when the motor is marked as inverted.
    pub inverted: InvertedValue,

    /// Direction used when the motor is not inverted.
    pub not_inverted: InvertedValue,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors found when checking a configuration.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("Motor {id} has an invalid configuration: {reason}")]
    InvalidConfiguration {
        id: u32,
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for InversionConvention {
    fn default() -> Self {
        // TODO: confirm the controller's native direction on the real
        // mechanism, clockwise is assumed for the non-inverted case.
        Self {
            inverted: InvertedValue::CounterClockwisePositive,
            not_inverted: InvertedValue::ClockwisePositive,
        }
    }
}

impl InversionConvention {
    /// Get the direction for the given flag.
    pub fn direction(&self, is_inverted: bool) -> InvertedValue {
        if is_inverted {
            self.inverted
        }
        else {
            self.not_inverted
        }
    }
}

impl MotorData {
    /// Create a new set of motor data for the given motor id, with every
    /// other parameter left at its default.
    pub fn new(id: u32) -> Self {
        Self {
            id,
            config: MotorConfig::default(),
            inversion: InversionConvention::default(),
        }
    }

    /// The id of the motor this data targets.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The current motor configuration.
    ///
    /// Useful to supply a configuration for another motor to copy.
    pub fn config(&self) -> &MotorConfig {
        &self.config
    }

    /// The inversion convention used by [`set_inverted`](Self::set_inverted).
    pub fn inversion_convention(&self) -> InversionConvention {
        self.inversion
    }

    // ---- CURRENT LIMIT ----

    /// Set the stator current limit, which also enables the limit.
    ///
    /// Units: amps
    pub fn set_current_limit(&mut self, current_limit_a: f64) {
        self.config.current_limits.stator_current_limit_a = current_limit_a;
        self.config.current_limits.stator_current_limit_enable = true;
    }

    /// Chaining form of [`set_current_limit`](Self::set_current_limit).
    pub fn with_current_limit(mut self, current_limit_a: f64) -> Self {
        self.set_current_limit(current_limit_a);
        self
    }

    // ---- INVERSION ----

    /// Set whether the motor is inverted, mapped through the inversion
    /// convention.
    pub fn set_inverted(&mut self, is_inverted: bool) {
        self.config.motor_output.inverted = self.inversion.direction(is_inverted);
    }

    /// Chaining form of [`set_inverted`](Self::set_inverted).
    pub fn with_inverted(mut self, is_inverted: bool) -> Self {
        self.set_inverted(is_inverted);
        self
    }

    /// Replace the inversion convention.
    ///
    /// Only affects later calls to [`set_inverted`](Self::set_inverted).
    pub fn set_inversion_convention(&mut self, convention: InversionConvention) {
        self.inversion = convention;
    }

    /// Chaining form of
    /// [`set_inversion_convention`](Self::set_inversion_convention).
    pub fn with_inversion_convention(mut self, convention: InversionConvention) -> Self {
        self.set_inversion_convention(convention);
        self
    }

    // ---- GAINS ----

    /// Set the PID gains of slot 0.
    pub fn set_pid(&mut self, kp: f64, ki: f64, kd: f64) {
        self.config.slot0.kp = kp;
        self.config.slot0.ki = ki;
        self.config.slot0.kd = kd;
    }

    /// Chaining form of [`set_pid`](Self::set_pid).
    pub fn with_pid(mut self, kp: f64, ki: f64, kd: f64) -> Self {
        self.set_pid(kp, ki, kd);
        self
    }

    /// Set the feedforward gains of slot 0.
    ///
    /// - `kg`: gravity
    /// - `ks`: static friction
    /// - `kv`: velocity
    /// - `ka`: acceleration
    pub fn set_ff(&mut self, kg: f64, ks: f64, kv: f64, ka: f64) {
        self.config.slot0.kg = kg;
        self.config.slot0.ks = ks;
        self.config.slot0.kv = kv;
        self.config.slot0.ka = ka;
    }

    /// Chaining form of [`set_ff`](Self::set_ff).
    pub fn with_ff(mut self, kg: f64, ks: f64, kv: f64, ka: f64) -> Self {
        self.set_ff(kg, ks, kv, ka);
        self
    }

    // ---- MOTION LIMITS ----

    /// Set the cruise velocity and acceleration used by profiled motion.
    ///
    /// Units: rotations/second and rotations/second^2
    pub fn set_max_speeds(&mut self, max_velocity_rps: f64, max_acceleration_rps2: f64) {
        self.config.motion_magic.cruise_velocity_rps = max_velocity_rps;
        self.config.motion_magic.acceleration_rps2 = max_acceleration_rps2;
    }

    /// Chaining form of [`set_max_speeds`](Self::set_max_speeds).
    pub fn with_max_speeds(mut self, max_velocity_rps: f64, max_acceleration_rps2: f64) -> Self {
        self.set_max_speeds(max_velocity_rps, max_acceleration_rps2);
        self
    }

    /// Enable both software limit switches. The motor output is zeroed when it
    /// attempts to move past either stop.
    ///
    /// Units: rotations
    pub fn set_soft_stops(&mut self, max_position_rot: f64, min_position_rot: f64) {
        let limits = &mut self.config.soft_limits;

        limits.forward_enable = true;
        limits.forward_threshold_rot = max_position_rot;

        limits.reverse_enable = true;
        limits.reverse_threshold_rot = min_position_rot;
    }

    /// Chaining form of [`set_soft_stops`](Self::set_soft_stops).
    pub fn with_soft_stops(mut self, max_position_rot: f64, min_position_rot: f64) -> Self {
        self.set_soft_stops(max_position_rot, min_position_rot);
        self
    }

    // ---- FEEDBACK ----

    /// Set the gear ratio when an external encoder, geared 1:1 with the
    /// mechanism, provides feedback.
    pub fn set_external_encoder_ratios(&mut self, gear_ratio: f64) {
        self.config.feedback.sensor_to_mechanism_ratio = 1.0;
        self.config.feedback.rotor_to_sensor_ratio = gear_ratio;
    }

    /// Chaining form of
    /// [`set_external_encoder_ratios`](Self::set_external_encoder_ratios).
    pub fn with_external_encoder_ratios(mut self, gear_ratio: f64) -> Self {
        self.set_external_encoder_ratios(gear_ratio);
        self
    }

    /// Set the gear ratio when the motor's internal encoder provides feedback.
    pub fn set_internal_encoder_ratios(&mut self, gear_ratio: f64) {
        self.config.feedback.sensor_to_mechanism_ratio = gear_ratio;
        self.config.feedback.rotor_to_sensor_ratio = 1.0;
    }

    /// Chaining form of
    /// [`set_internal_encoder_ratios`](Self::set_internal_encoder_ratios).
    pub fn with_internal_encoder_ratios(mut self, gear_ratio: f64) -> Self {
        self.set_internal_encoder_ratios(gear_ratio);
        self
    }

    // ---- NEUTRAL ----

    /// Set whether the motor brakes (`true`) or coasts (`false`) when no
    /// output is applied.
    pub fn set_brake_mode(&mut self, is_brake_mode: bool) {
        self.config.motor_output.neutral_mode = if is_brake_mode {
            NeutralModeValue::Brake
        }
        else {
            NeutralModeValue::Coast
        };
    }

    /// Chaining form of [`set_brake_mode`](Self::set_brake_mode).
    pub fn with_brake_mode(mut self, is_brake_mode: bool) -> Self {
        self.set_brake_mode(is_brake_mode);
        self
    }

    // ---- BULK ----

    /// Replace the whole configuration with a copy of another.
    ///
    /// The configuration is copied by value, later changes to `other` are not
    /// seen by this motor.
    pub fn copy_config(&mut self, other: &MotorConfig) {
        self.config = other.clone();
    }

    /// Chaining form of [`copy_config`](Self::copy_config).
    pub fn with_config(mut self, other: &MotorConfig) -> Self {
        self.copy_config(other);
        self
    }

    // ---- VALIDATION ----

    /// Check the configuration is physically meaningful.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let cfg = &self.config;

        let gains = [
            cfg.slot0.kp, cfg.slot0.ki, cfg.slot0.kd,
            cfg.slot0.kg, cfg.slot0.ks, cfg.slot0.kv, cfg.slot0.ka,
        ];
        if gains.iter().any(|g| !g.is_finite()) {
            return Err(self.invalid("slot 0 gains must be finite"));
        }

        let limit = cfg.current_limits.stator_current_limit_a;
        if cfg.current_limits.stator_current_limit_enable && !(limit.is_finite() && limit > 0.0) {
            return Err(self.invalid(format!(
                "stator current limit must be positive, found {}", limit
            )));
        }

        for ratio in [
            cfg.feedback.sensor_to_mechanism_ratio,
            cfg.feedback.rotor_to_sensor_ratio
        ].iter() {
            if !(ratio.is_finite() && *ratio > 0.0) {
                return Err(self.invalid(format!(
                    "encoder ratios must be positive, found {}", ratio
                )));
            }
        }

        let mm = &cfg.motion_magic;
        if !(mm.cruise_velocity_rps.is_finite() && mm.cruise_velocity_rps >= 0.0)
            || !(mm.acceleration_rps2.is_finite() && mm.acceleration_rps2 >= 0.0)
        {
            return Err(self.invalid("motion limits must be zero or positive"));
        }

        let sl = &cfg.soft_limits;
        if sl.forward_enable
            && sl.reverse_enable
            && !(sl.forward_threshold_rot > sl.reverse_threshold_rot)
        {
            return Err(self.invalid(format!(
                "forward soft stop ({}) must be above the reverse soft stop ({})",
                sl.forward_threshold_rot, sl.reverse_threshold_rot
            )));
        }

        Ok(())
    }

    fn invalid<S: Into<String>>(&self, reason: S) -> ConfigError {
        ConfigError::InvalidConfiguration {
            id: self.id,
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_setter_matches_chain() {
        let mut set = MotorData::new(3);
        set.set_current_limit(40.0);
        set.set_inverted(true);
        set.set_pid(1.0, 0.1, 0.01);
        set.set_ff(0.3, 0.2, 0.12, 0.01);
        set.set_max_speeds(4.0, 8.0);
        set.set_soft_stops(10.0, -1.0);
        set.set_internal_encoder_ratios(9.0);
        set.set_brake_mode(true);

        let chain = MotorData::new(3)
            .with_current_limit(40.0)
            .with_inverted(true)
            .with_pid(1.0, 0.1, 0.01)
            .with_ff(0.3, 0.2, 0.12, 0.01)
            .with_max_speeds(4.0, 8.0)
            .with_soft_stops(10.0, -1.0)
            .with_internal_encoder_ratios(9.0)
            .with_brake_mode(true);

        assert_eq!(set, chain);
    }

    #[test]
    fn test_setting_twice_last_write_wins() {
        let mut a = MotorData::new(1);
        a.set_pid(1.0, 2.0, 3.0);
        a.set_pid(4.0, 5.0, 6.0);

        let b = MotorData::new(1).with_pid(4.0, 5.0, 6.0);

        assert_eq!(a, b);
        assert_eq!(a.config().slot0.kp, 4.0);
    }

    #[test]
    fn test_current_limit_always_enabled() {
        for limit in [0.0, 40.0, -3.0, 1e9].iter() {
            let m = MotorData::new(1).with_current_limit(*limit);
            assert!(m.config().current_limits.stator_current_limit_enable);
            assert_eq!(m.config().current_limits.stator_current_limit_a, *limit);
        }
    }

    #[test]
    fn test_encoder_modes_last_wins() {
        let int_last = MotorData::new(1)
            .with_external_encoder_ratios(5.0)
            .with_internal_encoder_ratios(12.0);
        assert_eq!(int_last.config().feedback.sensor_to_mechanism_ratio, 12.0);
        assert_eq!(int_last.config().feedback.rotor_to_sensor_ratio, 1.0);

        let ext_last = MotorData::new(1)
            .with_internal_encoder_ratios(12.0)
            .with_external_encoder_ratios(5.0);
        assert_eq!(ext_last.config().feedback.sensor_to_mechanism_ratio, 1.0);
        assert_eq!(ext_last.config().feedback.rotor_to_sensor_ratio, 5.0);

        // Same final mode, different history
        let direct = MotorData::new(1).with_external_encoder_ratios(5.0);
        assert_eq!(ext_last, direct);
    }

    #[test]
    fn test_inversion_and_brake() {
        let m = MotorData::new(1).with_inverted(true).with_brake_mode(true);
        assert_eq!(m.config().motor_output.inverted, InvertedValue::CounterClockwisePositive);
        assert_eq!(m.config().motor_output.neutral_mode, NeutralModeValue::Brake);

        let m = m.with_inverted(false).with_brake_mode(false);
        assert_eq!(m.config().motor_output.inverted, InvertedValue::ClockwisePositive);
        assert_eq!(m.config().motor_output.neutral_mode, NeutralModeValue::Coast);

        // Swapped convention flips the mapping
        let swapped = MotorData::new(1)
            .with_inversion_convention(InversionConvention {
                inverted: InvertedValue::ClockwisePositive,
                not_inverted: InvertedValue::CounterClockwisePositive,
            })
            .with_inverted(true);
        assert_eq!(swapped.config().motor_output.inverted, InvertedValue::ClockwisePositive);
    }

    #[test]
    fn test_copy_config_is_a_value_copy() {
        let mut source = MotorData::new(5).with_current_limit(40.0);
        let copy = MotorData::new(6).with_config(source.config());

        assert_eq!(copy.config(), source.config());
        assert_eq!(copy.id(), 6);

        source.set_current_limit(20.0);
        assert_eq!(copy.config().current_limits.stator_current_limit_a, 40.0);
    }

    #[test]
    fn test_validate() {
        assert!(MotorData::new(1).validate().is_ok());
        assert!(MotorData::new(1)
            .with_current_limit(40.0)
            .with_soft_stops(10.0, 0.0)
            .with_max_speeds(1.0, 2.0)
            .validate()
            .is_ok());

        let bad = [
            MotorData::new(2).with_current_limit(-1.0),
            MotorData::new(2).with_internal_encoder_ratios(0.0),
            MotorData::new(2).with_external_encoder_ratios(-4.0),
            MotorData::new(2).with_max_speeds(-1.0, 1.0),
            MotorData::new(2).with_soft_stops(0.0, 1.0),
            MotorData::new(2).with_pid(std::f64::NAN, 0.0, 0.0),
        ];

        for m in bad.iter() {
            match m.validate() {
                Err(ConfigError::InvalidConfiguration { id, .. }) => assert_eq!(id, 2),
                Ok(()) => panic!("expected {:?} to be invalid", m),
            }
        }
    }
}
