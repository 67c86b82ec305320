//! Host platform utility functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::env;
use std::path::PathBuf;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Environment variable pointing at the root of the software checkout, which
/// contains the `params` and `sessions` directories.
pub const SW_ROOT_ENV_VAR: &str = "STEER_SW_ROOT";

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the software root directory from the environment.
pub fn get_sw_root() -> Result<PathBuf, env::VarError> {
    env::var(SW_ROOT_ENV_VAR).map(PathBuf::from)
}

/// Get a short description of the host this executable is running on.
pub fn get_host_desc() -> String {
    format!("{} ({})", env::consts::OS, env::consts::ARCH)
}
