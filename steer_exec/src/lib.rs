//! # Steering library.
//!
//! This library allows other crates in the workspace, the tests, and the benchmarks to access
//! items defined inside the steering crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Parameters for the steering executable
pub mod params;

/// Simulator server - recieves telemetry from the simulator and sends back demands
pub mod sim_server;

/// Trajectory control module - keeps the vehicle in the centre of the lane
pub mod traj_ctrl;
