//! # Simulator Server
//!
//! The SimServer accepts connections from the driving simulator. Each connection is a session
//! served on its own thread, with its own trajectory controller built from the shared parameters,
//! so several simulated vehicles can be driven at once without sharing any controller state.
//!
//! The listening thread only accepts TCP connections. The websocket handshake is done on the
//! session's thread, so a peer which never completes it cannot stop other simulators connecting.
//!
//! Within a session frames are handled strictly in the order they are recieved: each telemetry
//! sample is run through TrajCtrl and the demands are sent back before the next frame is read.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{net::SocketAddr, thread::{self, JoinHandle}, time::Duration};
use log::{debug, info, trace, warn};

use comms_if::{
    eqpt::sim::{SimDems, SimEvent, SimResponse, SimTelemetry},
    net::{NetParams, SimConnection, SimListener, SimSocket, SimSocketError, SocketOptions}
};
use util::module::State;

use crate::traj_ctrl::{self, TrajCtrl};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Delay before accepting again after a failed accept, so that a persistent failure (such as
/// running out of file descriptors) doesn't spin the listening thread.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Simulator server
pub struct SimServer {
    listener: SimListener,

    socket_options: SocketOptions,

    traj_ctrl_params: traj_ctrl::Params,

    /// Number of sessions started, used to give each session an ID
    num_sessions: u64,
}

/// One connected simulator and the controller driving it.
pub struct SimSession {
    id: u64,

    traj_ctrl: TrajCtrl,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum SimServerError {
    #[error("Socket error: {0}")]
    SocketError(SimSocketError),

    #[error("Could not initialise TrajCtrl for the session: {0}")]
    TrajCtrlInitError(traj_ctrl::TrajCtrlError),

    #[error("Could not spawn the session thread: {0}")]
    SpawnError(std::io::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimServer {
    /// Create a new instance of the simulator server, binding to the endpoint in the parameters.
    ///
    /// This function will not block until the simulator connects.
    pub fn new(
        net_params: &NetParams,
        traj_ctrl_params: traj_ctrl::Params
    ) -> Result<Self, SimServerError> {
        let listener = SimListener::bind(&net_params.sim_endpoint)
            .map_err(SimServerError::SocketError)?;

        Ok(Self {
            listener,
            socket_options: net_params.socket_options(),
            traj_ctrl_params,
            num_sessions: 0
        })
    }

    /// Address the server is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr, SimServerError> {
        self.listener.local_addr()
            .map_err(SimServerError::SocketError)
    }

    /// Accept a single connection and start a session for it on a new thread.
    ///
    /// The websocket handshake is performed by the session thread.
    pub fn accept(&mut self) -> Result<JoinHandle<()>, SimServerError> {
        let connection = self.listener.accept()
            .map_err(SimServerError::SocketError)?;

        self.num_sessions += 1;
        let session = SimSession::new(self.num_sessions, self.traj_ctrl_params)?;
        let options = self.socket_options;

        debug!("Connection from {}, starting session {}", connection.peer_addr(), session.id());

        thread::Builder::new()
            .name(format!("sim_session_{}", session.id()))
            .spawn(move || session.start(connection, &options))
            .map_err(SimServerError::SpawnError)
    }

    /// Accept connections forever.
    ///
    /// Every error here belongs to a single connection, so it is logged and the server keeps
    /// listening.
    pub fn run(&mut self) {
        loop {
            if let Err(e) = self.accept() {
                warn!("Could not start a session for a new connection: {}", e);
                thread::sleep(ACCEPT_RETRY_DELAY);
            }
        }
    }
}

impl SimSession {
    /// Create a new session with a freshly initialised controller.
    pub fn new(id: u64, params: traj_ctrl::Params) -> Result<Self, SimServerError> {
        let mut traj_ctrl = TrajCtrl::default();
        traj_ctrl.init(params)
            .map_err(SimServerError::TrajCtrlInitError)?;

        Ok(Self { id, traj_ctrl })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The controller driving this session.
    pub fn traj_ctrl(&self) -> &TrajCtrl {
        &self.traj_ctrl
    }

    /// Handle one frame recieved from the simulator, returning the response to send, if any.
    ///
    /// Malformed telemetry is dropped with a warning rather than ending the session.
    pub fn handle_frame(&mut self, frame: &str) -> Option<SimResponse> {
        let event = match SimEvent::from_frame(frame) {
            Ok(Some(e)) => e,
            Ok(None) => {
                trace!("Session {}: ignoring non-event frame {:?}", self.id, frame);
                return None
            },
            Err(e) => {
                warn!("Session {}: could not parse frame from the simulator: {}", self.id, e);
                return None
            }
        };

        match event {
            SimEvent::Telemetry(telem) => {
                let input: traj_ctrl::InputData = telem.into();

                match self.traj_ctrl.proc(&input) {
                    Ok((output, report)) => {
                        trace!("Session {}: TrajCtrl status: {:?}", self.id, report);

                        Some(SimResponse::Steer(SimDems {
                            steering_angle: output.steering_angle,
                            throttle: output.throttle
                        }))
                    },
                    Err(e) => {
                        warn!("Session {}: error during TrajCtrl processing: {}", self.id, e);
                        None
                    }
                }
            },
            SimEvent::NoData => Some(SimResponse::Manual),
            SimEvent::Other(name) => {
                debug!("Session {}: ignoring {:?} event", self.id, name);
                None
            }
        }
    }

    /// Complete the websocket handshake on a new connection, then serve the session.
    pub fn start(self, connection: SimConnection, options: &SocketOptions) {
        let peer_addr = connection.peer_addr();

        match connection.handshake(options) {
            Ok(socket) => {
                info!("Simulator connected from {}, starting session {}", peer_addr, self.id);
                self.run(socket)
            },
            Err(e) => warn!(
                "Session {}: handshake with {} failed, dropping the connection: {}",
                self.id, peer_addr, e
            )
        }
    }

    /// Serve the session until the simulator disconnects.
    pub fn run(mut self, mut socket: SimSocket) {
        loop {
            let frame = match socket.recv_frame() {
                Ok(Some(f)) => f,
                Ok(None) => continue,
                Err(SimSocketError::Closed) => break,
                Err(SimSocketError::Timeout) => {
                    warn!("Session {}: simulator went quiet, closing the connection", self.id);
                    socket.close();
                    break
                },
                Err(e) => {
                    warn!("Session {}: could not recieve from the simulator: {}", self.id, e);
                    socket.close();
                    break
                }
            };

            let response = match self.handle_frame(&frame) {
                Some(r) => r,
                None => continue
            };

            let response_frame = match response.to_frame() {
                Ok(f) => f,
                Err(e) => {
                    warn!("Session {}: could not encode the response: {}", self.id, e);
                    continue
                }
            };

            trace!("Session {}: {}", self.id, response_frame);

            match socket.send_frame(&response_frame) {
                Ok(_) => (),
                Err(SimSocketError::Closed) => break,
                Err(e) => {
                    warn!("Session {}: could not send to the simulator: {}", self.id, e);
                    socket.close();
                    break
                }
            }
        }

        info!(
            "Simulator disconnected, session {} processed {} telemetry samples",
            self.id,
            self.traj_ctrl.num_samples()
        );
    }
}

impl From<SimTelemetry> for traj_ctrl::InputData {
    fn from(telem: SimTelemetry) -> Self {
        Self {
            cte: telem.cte,
            speed: telem.speed,
            angle: telem.steering_angle
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
