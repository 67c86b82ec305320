//! # Trajectory control module
//!
//! Trajectory control is responsible for keeping the vehicle in the centre of its lane. It does
//! this using a PID controller operating on the cross track error (CTE), the signed lateral
//! distance between the vehicle and the lane centre, as reported by the simulator.
//!
//! Each telemetry sample is passed through the controller, whose negated total error is saturated
//! into a normalised steering demand. The throttle demand is then chosen from two levels: a
//! cautious level while turning or off centre, and a cruise level otherwise.
//!
//! One `TrajCtrl` serves one vehicle. Each simulator session owns its own instance.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod controllers;
pub mod params;
pub mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use controllers::*;
pub use params::Params;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors that can occur during TrajCtrl operation.
#[derive(Debug, thiserror::Error)]
pub enum TrajCtrlError {
    #[error("TrajCtrl has not been initialised")]
    NotInit,

    #[error("TrajCtrl has already been initialised, the gains cannot be changed")]
    AlreadyInit,

    #[error("Recieved a non-finite cross track error ({0})")]
    InvalidSample(f64),

    #[error("The lateral controller's total error is non-finite ({0}), no demand can be made")]
    NonFiniteDemand(f64),
}
