//! # Steering Executable Parameters
//!
//! This module provide parameters for the steering executable.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;

use comms_if::net::NetParams;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Deserialize, Debug, Clone)]
pub struct SteerExecParams {

    /// Network parameters for the simulator server
    pub net: NetParams,

    /// Name of the trajectory control parameter file, relative to the params directory
    pub traj_ctrl_params_file: String,
}
