//! # Network Module
//!
//! This module provides networking abstractions over websockets, which is how the driving
//! simulator connects to the controller. The server side binds a TCP listener whose accepted
//! [`SimConnection`]s are upgraded into [`SimSocket`]s, which exchange text frames with the
//! simulator. The upgrade is kept separate from the accept so that it can be done off the
//! listening thread.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::{
    io,
    net::{SocketAddr, TcpListener, TcpStream},
    time::Duration
};
use log::debug;
use serde::Deserialize;
use tungstenite::{Message, WebSocket};

// Export tungstenite
pub use tungstenite;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Default time allowed for a new connection to complete the websocket handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT_MS: u64 = 5000;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Network parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct NetParams {
    /// Endpoint the simulator server binds to, such as `"0.0.0.0:4567"`
    pub sim_endpoint: String,

    /// If set, a session which recieves nothing for this many milliseconds is closed.
    #[serde(default)]
    pub read_timeout_ms: Option<u64>,

    /// If set, a session which cannot send a frame within this many milliseconds is closed.
    #[serde(default)]
    pub write_timeout_ms: Option<u64>,

    /// Time a new connection has to complete the websocket handshake.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,
}

/// Represents options which can be set on an accepted socket.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketOptions {
    /// Maximum time a `recv_frame` call blocks for before returning `SimSocketError::Timeout`.
    ///
    /// The default value is `None`, blocking forever.
    pub read_timeout: Option<Duration>,

    /// Maximum time a `send_frame` call blocks for.
    ///
    /// The default value is `None`, blocking forever.
    pub write_timeout: Option<Duration>,

    /// Maximum time the websocket handshake may block for on either read or write.
    ///
    /// The default value is `None`, blocking forever.
    pub handshake_timeout: Option<Duration>,
}

/// Listens for incoming simulator connections.
pub struct SimListener {
    listener: TcpListener
}

/// A TCP connection which has not yet completed the websocket handshake.
pub struct SimConnection {
    stream: TcpStream,

    peer_addr: SocketAddr
}

/// A websocket connected to one simulator instance.
pub struct SimSocket {
    ws: WebSocket<TcpStream>,

    peer_addr: SocketAddr
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum SimSocketError {
    #[error("Could not bind to {0}: {1}")]
    BindError(String, io::Error),

    #[error("Could not accept a connection: {0}")]
    AcceptError(io::Error),

    #[error("Could not set the {0} socket option: {1}")]
    SocketOptionError(&'static str, io::Error),

    #[error("Websocket handshake failed: {0}")]
    HandshakeError(String),

    #[error("The connection has been closed")]
    Closed,

    #[error("Nothing was recieved before the read timeout expired")]
    Timeout,

    #[error("Websocket error: {0}")]
    WsError(tungstenite::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl NetParams {
    /// Build the socket options described by these parameters.
    pub fn socket_options(&self) -> SocketOptions {
        SocketOptions {
            read_timeout: self.read_timeout_ms.map(Duration::from_millis),
            write_timeout: self.write_timeout_ms.map(Duration::from_millis),
            handshake_timeout: Some(Duration::from_millis(self.handshake_timeout_ms)),
        }
    }
}

impl SimListener {
    /// Bind a new listener to the given endpoint.
    pub fn bind(endpoint: &str) -> Result<Self, SimSocketError> {
        let listener = TcpListener::bind(endpoint)
            .map_err(|e| SimSocketError::BindError(endpoint.to_string(), e))?;

        Ok(Self { listener })
    }

    /// Get the address the listener is actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, SimSocketError> {
        self.listener.local_addr()
            .map_err(SimSocketError::AcceptError)
    }

    /// Block until a new TCP connection arrives.
    ///
    /// No data is read from the peer, so a slow or silent peer cannot hold up the listener.
    pub fn accept(&self) -> Result<SimConnection, SimSocketError> {
        let (stream, peer_addr) = self.listener.accept()
            .map_err(SimSocketError::AcceptError)?;

        Ok(SimConnection { stream, peer_addr })
    }
}

impl SimConnection {
    /// Address of the connected peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Perform the websocket handshake, blocking for at most the handshake timeout.
    pub fn handshake(self, options: &SocketOptions) -> Result<SimSocket, SimSocketError> {
        let SimConnection { stream, peer_addr } = self;

        // Nagle's algorithm would hold back the small demand frames
        stream.set_nodelay(true)
            .map_err(|e| SimSocketError::SocketOptionError("nodelay", e))?;
        set_timeouts(&stream, options.handshake_timeout, options.handshake_timeout)?;

        // A handshake interrupted by the timeout is not resumed, the connection is dropped
        let ws = tungstenite::accept(stream)
            .map_err(|e| SimSocketError::HandshakeError(e.to_string()))?;

        set_timeouts(ws.get_ref(), options.read_timeout, options.write_timeout)?;

        debug!("Websocket handshake with {} complete", peer_addr);

        Ok(SimSocket { ws, peer_addr })
    }
}

impl SimSocket {
    /// Address of the connected simulator.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Recieve the next frame from the simulator.
    ///
    /// Returns `Ok(Some(text))` for a text frame and `Ok(None)` for any other frame (binary,
    /// ping, pong), which carry nothing for the controller. Once the simulator closes the
    /// connection `SimSocketError::Closed` is returned.
    pub fn recv_frame(&mut self) -> Result<Option<String>, SimSocketError> {
        match self.ws.read() {
            Ok(Message::Text(text)) => Ok(Some(text)),
            Ok(Message::Close(_)) => Err(SimSocketError::Closed),
            Ok(_) => Ok(None),
            Err(e) => Err(map_ws_error(e))
        }
    }

    /// Send a text frame to the simulator.
    pub fn send_frame(&mut self, frame: &str) -> Result<(), SimSocketError> {
        self.ws.send(Message::Text(frame.to_string()))
            .map_err(map_ws_error)
    }

    /// Close the connection, ignoring any error as the peer may already be gone.
    pub fn close(&mut self) {
        self.ws.close(None).ok();
        self.ws.flush().ok();
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn default_handshake_timeout_ms() -> u64 {
    DEFAULT_HANDSHAKE_TIMEOUT_MS
}

fn set_timeouts(
    stream: &TcpStream,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>
) -> Result<(), SimSocketError> {
    stream.set_read_timeout(read_timeout)
        .map_err(|e| SimSocketError::SocketOptionError("read_timeout", e))?;
    stream.set_write_timeout(write_timeout)
        .map_err(|e| SimSocketError::SocketOptionError("write_timeout", e))
}

fn map_ws_error(e: tungstenite::Error) -> SimSocketError {
    match e {
        tungstenite::Error::ConnectionClosed
        | tungstenite::Error::AlreadyClosed => SimSocketError::Closed,
        tungstenite::Error::Io(ref io_err) if matches!(
            io_err.kind(),
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
        ) => SimSocketError::Timeout,
        tungstenite::Error::Io(ref io_err) if matches!(
            io_err.kind(),
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
        ) => SimSocketError::Closed,
        e => SimSocketError::WsError(e)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_socket_options() {
        let params: NetParams = serde_json::from_str(
            "{\"sim_endpoint\": \"127.0.0.1:4567\", \"read_timeout_ms\": 250, \
            \"write_timeout_ms\": 100, \"handshake_timeout_ms\": 1000}"
        ).unwrap();
        let opts = params.socket_options();
        assert_eq!(opts.read_timeout, Some(Duration::from_millis(250)));
        assert_eq!(opts.write_timeout, Some(Duration::from_millis(100)));
        assert_eq!(opts.handshake_timeout, Some(Duration::from_millis(1000)));

        let params: NetParams = serde_json::from_str(
            "{\"sim_endpoint\": \"127.0.0.1:4567\"}"
        ).unwrap();
        let opts = params.socket_options();
        assert_eq!(opts.read_timeout, None);
        assert_eq!(opts.write_timeout, None);
        assert_eq!(
            opts.handshake_timeout,
            Some(Duration::from_millis(DEFAULT_HANDSHAKE_TIMEOUT_MS))
        );
    }

    #[test]
    fn test_silent_peer_handshake_times_out() {
        let listener = SimListener::bind("127.0.0.1:0").unwrap();

        // Connected but never sends the upgrade request
        let _silent = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let connection = listener.accept().unwrap();

        let options = SocketOptions {
            handshake_timeout: Some(Duration::from_millis(100)),
            ..Default::default()
        };
        assert!(matches!(
            connection.handshake(&options),
            Err(SimSocketError::HandshakeError(_))
        ));
    }

    #[test]
    fn test_map_ws_error() {
        assert!(matches!(
            map_ws_error(tungstenite::Error::ConnectionClosed),
            SimSocketError::Closed
        ));
        assert!(matches!(
            map_ws_error(tungstenite::Error::Io(io::Error::from(io::ErrorKind::WouldBlock))),
            SimSocketError::Timeout
        ));
        assert!(matches!(
            map_ws_error(tungstenite::Error::Io(io::Error::from(io::ErrorKind::BrokenPipe))),
            SimSocketError::Closed
        ));
    }

    #[test]
    fn test_bind_ephemeral() {
        let listener = SimListener::bind("127.0.0.1:0").unwrap();
        assert_ne!(listener.local_addr().unwrap().port(), 0);

        assert!(matches!(
            SimListener::bind("not an address"),
            Err(SimSocketError::BindError(_, _))
        ));
    }
}
