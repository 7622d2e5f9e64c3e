//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Clamp a value into the range `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    let mut ret = value;

    if ret > max {
        ret = max
    }
    if ret < min {
        ret = min
    }

    ret
}

/// Sign of a value, returning zero for zero (unlike `Float::signum`).
pub fn sign<T>(value: T) -> T
where
    T: Float
{
    if value > T::zero() {
        T::one()
    }
    else if value < T::zero() {
        -T::one()
    }
    else {
        T::zero()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(5f64, -1f64, 1f64), 1f64);
        assert_eq!(clamp(-5f64, -1f64, 1f64), -1f64);
        assert_eq!(clamp(0.25f64, -1f64, 1f64), 0.25f64);
    }

    #[test]
    fn test_sign() {
        assert_eq!(sign(3f64), 1f64);
        assert_eq!(sign(-0.1f64), -1f64);
        assert_eq!(sign(0f64), 0f64);
    }
}
