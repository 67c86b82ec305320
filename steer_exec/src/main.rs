//! Main steering executable entry point.
//!
//! # Architecture
//!
//! The general execution methodology consists of:
//!
//!     - Start the session and logging
//!     - Load parameters
//!     - Bind the simulator server
//!     - Main loop, per connected simulator (each on its own thread):
//!         - Recieve a telemetry frame
//!         - Trajectory control processing
//!         - Send the steering and throttle demands

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::WrapErr};
use log::info;
use structopt::StructOpt;

// Internal
use steer_lib::{
    params::SteerExecParams,
    sim_server::SimServer,
    traj_ctrl
};
use util::{
    host,
    logger::{logger_init, parse_level},
    session::Session
};

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

/// Command line options
#[derive(Debug, StructOpt)]
#[structopt(name = "steer_exec", about = "PID steering controller for the driving simulator")]
struct Opts {
    /// Endpoint to listen on, overriding the parameter file
    #[structopt(short, long)]
    endpoint: Option<String>,

    /// Minimum log level, one of info, debug or trace
    #[structopt(short, long, default_value = "info")]
    log_level: String,
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    color_eyre::install()?;

    let opts = Opts::from_args();

    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new(
        "steer_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    // Initialise logger
    let level = parse_level(&opts.log_level)
        .wrap_err("Invalid log level")?;
    logger_init(level, &session)
        .wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Steering Controller Executable\n");
    info!("Running on: {}", host::get_host_desc());
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let mut exec_params: SteerExecParams = util::params::load(
        "steer_exec.toml"
    ).wrap_err("Could not load exec params")?;

    if let Some(endpoint) = opts.endpoint {
        exec_params.net.sim_endpoint = endpoint;
    }

    let traj_ctrl_params: traj_ctrl::Params = util::params::load(
        &exec_params.traj_ctrl_params_file
    ).wrap_err("Could not load TrajCtrl params")?;

    info!(
        "Parameters loaded, gains: Kp = {}, Ki = {}, Kd = {}",
        traj_ctrl_params.lat_k_p,
        traj_ctrl_params.lat_k_i,
        traj_ctrl_params.lat_k_d
    );

    // ---- INITIALISE NETWORK ----

    let mut server = SimServer::new(&exec_params.net, traj_ctrl_params)
        .wrap_err("Failed to initialise the SimServer")?;

    info!(
        "Listening to {}",
        server.local_addr().wrap_err("Failed to get the server address")?
    );

    // ---- MAIN LOOP ----

    server.run();

    Ok(())
}
