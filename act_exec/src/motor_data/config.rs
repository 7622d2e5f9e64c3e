//! Raw motor controller configuration
//!
//! These structures mirror the configuration groups of a smart motor
//! controller. They carry no behaviour, drivers translate them into their own
//! register writes when the configuration is applied.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Complete configuration of a single motor controller.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorConfig {
    pub current_limits: CurrentLimitsConfig,
    pub motor_output: MotorOutputConfig,
    pub slot0: Slot0Config,
    pub motion_magic: MotionMagicConfig,
    pub soft_limits: SoftLimitConfig,
    pub feedback: FeedbackConfig,
}

/// Stator current limiting.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrentLimitsConfig {
    /// Stator current limit.
    ///
    /// Units: amps
    pub stator_current_limit_a: f64,

    /// Whether the stator current limit is applied.
    pub stator_current_limit_enable: bool,
}

/// Output direction and neutral behaviour.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MotorOutputConfig {
    pub inverted: InvertedValue,
    pub neutral_mode: NeutralModeValue,
}

/// Closed loop gains, PID and feedforward share the one slot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Slot0Config {
    /// Proportional gain.
    ///
    /// Units: volts/rotation
    pub kp: f64,
    /// Integral gain.
    ///
    /// Units: volts/(rotation*second)
    pub ki: f64,
    /// Derivative gain.
    ///
    /// Units: volts/(rotation/second)
    pub kd: f64,
    /// Gravity feedforward.
    ///
    /// Units: volts
    pub kg: f64,
    /// Static friction feedforward.
    ///
    /// Units: volts
    pub ks: f64,
    /// Velocity feedforward.
    ///
    /// Units: volts/(rotation/second)
    pub kv: f64,
    /// Acceleration feedforward.
    ///
    /// Units: volts/(rotation/second^2)
    pub ka: f64,
}

/// Profiled motion limits.
///
/// A value of zero means the profile is unconstrained in that quantity.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionMagicConfig {
    /// Units: mechanism rotations/second
    pub cruise_velocity_rps: f64,

    /// Units: mechanism rotations/second^2
    pub acceleration_rps2: f64,
}

/// Software limit switches.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SoftLimitConfig {
    pub forward_enable: bool,

    /// Units: mechanism rotations
    pub forward_threshold_rot: f64,

    pub reverse_enable: bool,

    /// Units: mechanism rotations
    pub reverse_threshold_rot: f64,
}

/// Sensor to mechanism conversion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Sensor rotations per mechanism rotation.
    pub sensor_to_mechanism_ratio: f64,

    /// Rotor rotations per sensor rotation.
    pub rotor_to_sensor_ratio: f64,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The rotation direction considered positive, viewed from the shaft face.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvertedValue {
    CounterClockwisePositive,
    ClockwisePositive,
}

/// Behaviour of the motor when no output is applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeutralModeValue {
    Coast,
    Brake,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for InvertedValue {
    fn default() -> Self {
        InvertedValue::CounterClockwisePositive
    }
}

impl Default for NeutralModeValue {
    fn default() -> Self {
        NeutralModeValue::Coast
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            sensor_to_mechanism_ratio: 1.0,
            rotor_to_sensor_ratio: 1.0,
        }
    }
}

impl FeedbackConfig {
    /// Total number of rotor rotations per mechanism rotation.
    pub fn rotor_to_mechanism_ratio(&self) -> f64 {
        self.sensor_to_mechanism_ratio * self.rotor_to_sensor_ratio
    }
}

impl InvertedValue {
    /// Sign applied to a positive demand to get the rotor direction, taking
    /// counter-clockwise as the native positive direction.
    pub fn direction(&self) -> f64 {
        match self {
            InvertedValue::CounterClockwisePositive => 1.0,
            InvertedValue::ClockwisePositive => -1.0,
        }
    }
}
