//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Limit a value to the closed range `[min, max]`.
///
/// Returns the limited value and whether or not the limit was applied. A `NAN`
/// value is returned unchanged and is not reported as limited.
pub fn clamp<T>(value: T, min: T, max: T) -> (T, bool)
where
    T: Float
{
    if value > max {
        (max, true)
    }
    else if value < min {
        (min, true)
    }
    else {
        (value, false)
    }
}

/// Limit a value to the symmetric range `[-limit, limit]`.
pub fn sat_abs<T>(value: T, limit: T) -> (T, bool)
where
    T: Float
{
    clamp(value, -limit.abs(), limit.abs())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(0.5f64, -1.0, 1.0), (0.5, false));
        assert_eq!(clamp(1.4488f64, -1.0, 1.0), (1.0, true));
        assert_eq!(clamp(-7.0f64, -1.0, 1.0), (-1.0, true));
        assert_eq!(clamp(1.0f64, -1.0, 1.0), (1.0, false));
        assert_eq!(clamp(std::f64::INFINITY, -1.0, 1.0), (1.0, true));

        let (v, limited) = clamp(std::f64::NAN, -1.0, 1.0);
        assert!(v.is_nan());
        assert!(!limited);
    }

    #[test]
    fn test_sat_abs() {
        assert_eq!(sat_abs(2.0f32, 1.0), (1.0, true));
        assert_eq!(sat_abs(-2.0f32, -1.0), (-1.0, true));
    }
}
