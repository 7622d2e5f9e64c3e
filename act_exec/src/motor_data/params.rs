//! Parameter file representation of [`MotorData`]

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

use super::{InversionConvention, MotorData};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Motor parameters as written in a parameter file.
///
/// Every field except `id` is optional, missing fields keep the default
/// configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MotorParams {
    pub id: u32,

    /// Units: amps
    pub current_limit_a: Option<f64>,

    pub inversion_convention: Option<InversionConvention>,

    pub inverted: Option<bool>,

    /// `[kp, ki, kd]`
    pub pid: Option<[f64; 3]>,

    /// `[kg, ks, kv, ka]`
    pub ff: Option<[f64; 4]>,

    /// `[max_velocity_rps, max_acceleration_rps2]`
    pub max_speeds: Option<[f64; 2]>,

    /// `[max_position_rot, min_position_rot]`
    pub soft_stops: Option<[f64; 2]>,

    pub encoder: Option<EncoderParams>,

    pub brake_mode: Option<bool>,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Which encoder provides feedback, and the gear ratio to the mechanism.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(tag = "mode")]
pub enum EncoderParams {
    Internal { gear_ratio: f64 },
    External { gear_ratio: f64 },
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl MotorParams {
    /// Build the motor data described by these parameters.
    pub fn to_motor_data(&self) -> MotorData {
        let mut data = MotorData::new(self.id);

        if let Some(c) = self.inversion_convention {
            data.set_inversion_convention(c);
        }
        if let Some(a) = self.current_limit_a {
            data.set_current_limit(a);
        }
        if let Some(i) = self.inverted {
            data.set_inverted(i);
        }
        if let Some([kp, ki, kd]) = self.pid {
            data.set_pid(kp, ki, kd);
        }
        if let Some([kg, ks, kv, ka]) = self.ff {
            data.set_ff(kg, ks, kv, ka);
        }
        if let Some([v, a]) = self.max_speeds {
            data.set_max_speeds(v, a);
        }
        if let Some([max, min]) = self.soft_stops {
            data.set_soft_stops(max, min);
        }
        match self.encoder {
            Some(EncoderParams::Internal { gear_ratio }) =>
                data.set_internal_encoder_ratios(gear_ratio),
            Some(EncoderParams::External { gear_ratio }) =>
                data.set_external_encoder_ratios(gear_ratio),
            None => ()
        }
        if let Some(b) = self.brake_mode {
            data.set_brake_mode(b);
        }

        data
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::motor_data::NeutralModeValue;

    #[test]
    fn test_motor_params_to_motor_data() {
        let params: MotorParams = util::params::from_str(r#"
            id = 5
            current_limit_a = 40.0
            inverted = true
            pid = [2.0, 0.0, 0.1]
            soft_stops = [20.0, 0.0]
            encoder = { mode = "Internal", gear_ratio = 9.0 }
            brake_mode = true
        "#).unwrap();

        let expected = MotorData::new(5)
            .with_current_limit(40.0)
            .with_inverted(true)
            .with_pid(2.0, 0.0, 0.1)
            .with_soft_stops(20.0, 0.0)
            .with_internal_encoder_ratios(9.0)
            .with_brake_mode(true);

        let data = params.to_motor_data();
        assert_eq!(data, expected);
        assert_eq!(data.config().motor_output.neutral_mode, NeutralModeValue::Brake);
    }

    #[test]
    fn test_minimal_motor_params() {
        let params: MotorParams = util::params::from_str("id = 6").unwrap();
        assert_eq!(params.to_motor_data(), MotorData::new(6));
    }
}
