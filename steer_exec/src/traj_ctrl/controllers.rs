//! # Trajectory controllers module
//!
//! This module provides the PID controller used for TrajCtrl, and the output shaping which turns
//! the controller's total error into steering and throttle demands.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Limit of the normalised steering demand, the demand lies in `[-MAX_STEER_DEM, MAX_STEER_DEM]`.
pub const MAX_STEER_DEM: f64 = 1.0;

/// Steering demand magnitude above which the vehicle is considered to be turning.
pub const TURNING_STEER_THRESHOLD: f64 = 0.1;

/// Cross track error magnitude above which the vehicle is considered to be off centre.
pub const OFF_CENTRE_CTE_THRESHOLD: f64 = 0.5;

/// Throttle demanded while turning or off centre.
pub const CAUTIOUS_THROTTLE: f64 = 0.2;

/// Throttle demanded when centred and driving straight.
pub const CRUISE_THROTTLE: f64 = 0.9;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller.
///
/// The controller is updated once per sample with no notion of time, so the integral is the plain
/// sum of all samples and the derivative the difference between the last two samples. The
/// integral is unbounded.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PidController {
    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Dervative gain
    k_d: f64,

    /// Proportional error, the latest sample
    p_error: f64,

    /// Integral error, the sum of all samples
    i_error: f64,

    /// Derivative error, the change between the latest two samples
    d_error: f64,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {

    /// Create a new controller with the given gains.
    ///
    /// All error terms start at zero, which means the first sample is differenced against a
    /// previous error of zero. Gains are not validated, zero and negative gains are accepted.
    pub fn new(k_p: f64, k_i: f64, k_d: f64) -> Self {
        Self {
            k_p, k_i, k_d,
            p_error: 0f64,
            i_error: 0f64,
            d_error: 0f64
        }
    }

    /// Update the error terms with a new sample.
    ///
    /// Non-finite samples are not rejected and will propagate into the error terms.
    pub fn update_error(&mut self, error: f64) {
        let prev_error = self.p_error;

        self.p_error = error;
        self.i_error += error;
        self.d_error = error - prev_error;
    }

    /// Get the weighted sum of the error terms.
    pub fn total_error(&self) -> f64 {
        self.k_p * self.p_error
        + self.k_i * self.i_error
        + self.k_d * self.d_error
    }

    /// The gains as `(k_p, k_i, k_d)`.
    pub fn gains(&self) -> (f64, f64, f64) {
        (self.k_p, self.k_i, self.k_d)
    }

    pub fn p_error(&self) -> f64 {
        self.p_error
    }

    pub fn i_error(&self) -> f64 {
        self.i_error
    }

    pub fn d_error(&self) -> f64 {
        self.d_error
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Calculate the steering demand from the controller's total error.
///
/// A positive cross track error must be corrected by steering the other way, so the demand is the
/// negated total error, saturated to the steering range. Returns the demand and whether it was
/// saturated.
pub fn steer_demand(total_error: f64) -> (f64, bool) {
    util::maths::sat_abs(-total_error, MAX_STEER_DEM)
}

/// Calculate the throttle demand.
///
/// If the vehicle is turning (judged on the saturated steering demand) or off centre (judged on
/// the raw cross track error) the cautious throttle is used, otherwise the cruise throttle. Both
/// comparisons are strict and there is no hysteresis.
pub fn throttle_demand(steer_dem: f64, cte: f64) -> f64 {
    if steer_dem.abs() > TURNING_STEER_THRESHOLD || cte.abs() > OFF_CENTRE_CTE_THRESHOLD {
        CAUTIOUS_THROTTLE
    }
    else {
        CRUISE_THROTTLE
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------
