//! Implementations for the TrajCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, trace};
use serde::Serialize;

// Internal
use super::{
    Params, PidController, TrajCtrlError,
    steer_demand, throttle_demand,
    CAUTIOUS_THROTTLE
};
use util::module::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Trajectory control module state
#[derive(Debug, Default, Clone)]
pub struct TrajCtrl {

    pub(crate) params: Option<Params>,

    /// Lateral error controller, `None` until initialised
    lat_ctrl: Option<PidController>,

    pub(crate) report: StatusReport,

    /// Number of samples processed since initialisation
    num_samples: u64,
}

/// Input data to Trajectory Control, one telemetry sample.
#[derive(Clone, Copy, Default, Debug, PartialEq)]
pub struct InputData {
    /// Cross track error
    pub cte: f64,

    /// Speed of the vehicle. Only logged.
    pub speed: f64,

    /// Current steering angle of the vehicle. Only logged.
    pub angle: f64,
}

/// Output demands from TrajCtrl which must be sent to the vehicle.
#[derive(Clone, Copy, Default, Serialize, Debug, PartialEq)]
pub struct OutputData {
    /// Normalised steering demand, within `[-1, 1]`
    pub steering_angle: f64,

    /// Throttle demand, either the cautious or cruise throttle
    pub throttle: f64,
}

/// Status report for TrajCtrl processing.
#[derive(Clone, Copy, Default, Serialize, Debug, PartialEq)]
pub struct StatusReport {
    /// Total error of the lateral controller before saturation
    pub total_error: f64,

    pub p_error: f64,
    pub i_error: f64,
    pub d_error: f64,

    /// True if the steering demand was saturated
    pub steer_limited: bool,

    /// True if the cautious throttle was demanded
    pub cautious: bool,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl State for TrajCtrl {
    type InitData = Params;
    type InitError = TrajCtrlError;

    type InputData = InputData;
    type OutputData = OutputData;
    type StatusReport = StatusReport;
    type ProcError = TrajCtrlError;

    /// Initialise the TrajCtrl module.
    ///
    /// The gains can only be set once, initialising twice is an error.
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        if self.lat_ctrl.is_some() {
            return Err(TrajCtrlError::AlreadyInit)
        }

        self.lat_ctrl = Some(PidController::new(
            init_data.lat_k_p,
            init_data.lat_k_i,
            init_data.lat_k_d
        ));
        self.params = Some(init_data);

        Ok(())
    }

    /// Perform cyclic processing of Trajectory Control.
    fn proc(&mut self, input_data: &Self::InputData)
        -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError>
    {
        let params = match self.params {
            Some(p) => p,
            None => return Err(TrajCtrlError::NotInit)
        };
        let lat_ctrl = match self.lat_ctrl {
            Some(ref mut c) => c,
            None => return Err(TrajCtrlError::NotInit)
        };

        // Reject the sample before the controller sees it
        if params.reject_non_finite && !input_data.cte.is_finite() {
            return Err(TrajCtrlError::InvalidSample(input_data.cte))
        }

        lat_ctrl.update_error(input_data.cte);
        let total_error = lat_ctrl.total_error();

        // Finite samples can still overflow the integral or derivative terms
        if params.reject_non_finite && !total_error.is_finite() {
            return Err(TrajCtrlError::NonFiniteDemand(total_error))
        }

        let (steering_angle, steer_limited) = steer_demand(total_error);
        let throttle = throttle_demand(steering_angle, input_data.cte);

        self.report = StatusReport {
            total_error,
            p_error: lat_ctrl.p_error(),
            i_error: lat_ctrl.i_error(),
            d_error: lat_ctrl.d_error(),
            steer_limited,
            cautious: throttle == CAUTIOUS_THROTTLE,
        };
        self.num_samples += 1;

        trace!(
            "TrajCtrl input: cte {}, speed {}, angle {}",
            input_data.cte, input_data.speed, input_data.angle
        );
        debug!(
            "CTE: {} PID total error: {} P I D-errors: {}, {}, {} Steering value: {}",
            input_data.cte,
            total_error,
            self.report.p_error,
            self.report.i_error,
            self.report.d_error,
            steering_angle
        );

        Ok((OutputData { steering_angle, throttle }, self.report))
    }
}

impl TrajCtrl {

    /// Create a new, initialised, instance from the parameters.
    pub fn from_params(params: Params) -> Self {
        Self {
            params: Some(params),
            lat_ctrl: Some(PidController::new(
                params.lat_k_p,
                params.lat_k_i,
                params.lat_k_d
            )),
            ..Default::default()
        }
    }

    /// Get the lateral controller, or `None` if not initialised.
    pub fn lat_ctrl(&self) -> Option<&PidController> {
        self.lat_ctrl.as_ref()
    }

    /// Number of samples processed since initialisation.
    pub fn num_samples(&self) -> u64 {
        self.num_samples
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::traj_ctrl::{CRUISE_THROTTLE, MAX_STEER_DEM};
    use proptest::prelude::*;

    fn params() -> Params {
        Params {
            lat_k_p: 0.1,
            lat_k_i: 0.0008,
            lat_k_d: 3.0,
            reject_non_finite: true
        }
    }

    fn sample(cte: f64) -> InputData {
        InputData { cte, speed: 30.0, angle: 0.0 }
    }

    #[test]
    fn test_not_init() {
        let mut traj_ctrl = TrajCtrl::default();

        assert!(matches!(
            traj_ctrl.proc(&sample(0.0)),
            Err(TrajCtrlError::NotInit)
        ));
        assert!(traj_ctrl.lat_ctrl().is_none());
    }

    #[test]
    fn test_init_once() {
        let mut traj_ctrl = TrajCtrl::default();
        traj_ctrl.init(params()).unwrap();

        assert!(matches!(
            traj_ctrl.init(params()),
            Err(TrajCtrlError::AlreadyInit)
        ));
        assert_eq!(
            traj_ctrl.lat_ctrl().map(|c| c.gains()),
            Some((0.1, 0.0008, 3.0))
        );
    }

    #[test]
    fn test_two_sample_scenario() {
        let mut traj_ctrl = TrajCtrl::from_params(params());

        traj_ctrl.proc(&sample(1.0)).unwrap();
        let (output, report) = traj_ctrl.proc(&sample(0.5)).unwrap();

        assert_eq!(report.p_error, 0.5);
        assert_eq!(report.i_error, 1.5);
        assert_eq!(report.d_error, -0.5);
        assert!((report.total_error - (-1.4488)).abs() < 1e-12);
        assert!(report.steer_limited);
        assert!(report.cautious);

        assert_eq!(output, OutputData {
            steering_angle: 1.0,
            throttle: CAUTIOUS_THROTTLE
        });
        assert_eq!(traj_ctrl.num_samples(), 2);
    }

    #[test]
    fn test_zero_cte() {
        let mut traj_ctrl = TrajCtrl::from_params(params());

        for _ in 0..50 {
            let (output, report) = traj_ctrl.proc(&sample(0.0)).unwrap();
            assert_eq!(output.steering_angle, 0.0);
            assert_eq!(output.throttle, CRUISE_THROTTLE);
            assert!(!report.steer_limited);
            assert!(!report.cautious);
        }
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut a = TrajCtrl::from_params(params());
        let mut b = TrajCtrl::from_params(params());

        for _ in 0..10 {
            a.proc(&sample(0.3)).unwrap();
        }
        let (_, report) = b.proc(&sample(0.3)).unwrap();

        assert_eq!(report.i_error, 0.3);
        assert!((a.lat_ctrl().unwrap().i_error() - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_reject_non_finite() {
        let mut traj_ctrl = TrajCtrl::from_params(params());
        traj_ctrl.proc(&sample(0.2)).unwrap();
        let before = traj_ctrl.lat_ctrl().cloned();

        assert!(matches!(
            traj_ctrl.proc(&sample(std::f64::NAN)),
            Err(TrajCtrlError::InvalidSample(_))
        ));
        assert!(matches!(
            traj_ctrl.proc(&sample(std::f64::NEG_INFINITY)),
            Err(TrajCtrlError::InvalidSample(_))
        ));

        // State untouched by the rejected samples
        assert_eq!(traj_ctrl.lat_ctrl().cloned(), before);
        assert_eq!(traj_ctrl.num_samples(), 1);

        // Non-finite speed and angle are only logged
        let input = InputData { cte: 0.0, speed: std::f64::NAN, angle: std::f64::INFINITY };
        assert!(traj_ctrl.proc(&input).is_ok());
    }

    #[test]
    fn test_propagate_non_finite() {
        let mut traj_ctrl = TrajCtrl::from_params(Params {
            reject_non_finite: false,
            ..params()
        });

        let (output, report) = traj_ctrl.proc(&sample(std::f64::INFINITY)).unwrap();
        assert_eq!(report.p_error, std::f64::INFINITY);
        assert_eq!(output.steering_angle, -1.0);
        assert_eq!(output.throttle, CAUTIOUS_THROTTLE);
    }

    #[test]
    fn test_reject_overflowing_total_error() {
        let gains = Params {
            lat_k_p: 1.0,
            lat_k_i: 1.0,
            lat_k_d: 1.0,
            reject_non_finite: true
        };
        let mut traj_ctrl = TrajCtrl::from_params(gains);

        // Every sample is finite, but p + i + d overflows to infinity
        assert!(matches!(
            traj_ctrl.proc(&sample(1e308)),
            Err(TrajCtrlError::NonFiniteDemand(_))
        ));
        assert!(matches!(
            traj_ctrl.proc(&sample(1e308)),
            Err(TrajCtrlError::NonFiniteDemand(_))
        ));
        assert!(matches!(
            traj_ctrl.proc(&sample(-1e308)),
            Err(TrajCtrlError::NonFiniteDemand(_))
        ));
        assert_eq!(traj_ctrl.num_samples(), 0);

        // Without rejection the same sequence ends in a NaN total error
        let mut traj_ctrl = TrajCtrl::from_params(Params {
            reject_non_finite: false,
            ..gains
        });
        traj_ctrl.proc(&sample(1e308)).unwrap();
        traj_ctrl.proc(&sample(1e308)).unwrap();
        let (output, report) = traj_ctrl.proc(&sample(-1e308)).unwrap();
        assert!(report.total_error.is_nan());
        assert!(output.steering_angle.is_nan());
    }

    proptest! {
        /// Any finite telemetry either produces a demand in range or is rejected.
        #[test]
        fn demands_in_range_for_any_finite_cte(
            k_p in -100.0f64..100.0,
            k_i in -10.0f64..10.0,
            k_d in -100.0f64..100.0,
            samples in prop::collection::vec(
                prop::num::f64::NORMAL | prop::num::f64::ZERO,
                1..50
            )
        ) {
            let mut traj_ctrl = TrajCtrl::from_params(Params {
                lat_k_p: k_p,
                lat_k_i: k_i,
                lat_k_d: k_d,
                reject_non_finite: true
            });

            for cte in samples {
                match traj_ctrl.proc(&sample(cte)) {
                    Ok((output, _)) => {
                        prop_assert!(output.steering_angle.abs() <= MAX_STEER_DEM);
                    },
                    Err(TrajCtrlError::NonFiniteDemand(_)) => (),
                    Err(e) => prop_assert!(false, "Unexpected error {}", e)
                }
            }
        }
    }
}
