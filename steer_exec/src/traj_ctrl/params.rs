//! Trajectory control parameters

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for trajectory control
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Params {

    /// Lateral controller proportional gain
    pub lat_k_p: f64,

    /// Lateral controller integral gain
    pub lat_k_i: f64,

    /// Lateral controller derivative gain
    pub lat_k_d: f64,

    /// If true telemetry with a non-finite cross track error is rejected before it reaches the
    /// controller. If false it is passed on and will propagate into the demands.
    #[serde(default = "default_reject_non_finite")]
    pub reject_non_finite: bool,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

fn default_reject_non_finite() -> bool {
    true
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_load_params() {
        let params: Params = util::params::from_str(
            "lat_k_p = 0.1\nlat_k_i = 0.0008\nlat_k_d = 3.0"
        ).unwrap();

        assert_eq!(params, Params {
            lat_k_p: 0.1,
            lat_k_i: 0.0008,
            lat_k_d: 3.0,
            reject_non_finite: true
        });
    }

    #[test]
    fn test_params_file() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../params/traj_ctrl.toml");
        let params: Params = util::params::load_path(path).unwrap();

        assert_eq!(params.lat_k_p, 0.1);
        assert_eq!(params.lat_k_i, 0.0008);
        assert_eq!(params.lat_k_d, 3.0);
    }
}
