//! # Simulator Interface
//!
//! The driving simulator speaks a socket.io style protocol over a websocket. Every event is a text
//! frame made of the `42` prefix (`4` for a message, `2` for an event) followed by a JSON array
//! holding the event name and its payload:
//!
//! ```text
//! 42["telemetry",{"cte":"0.7598","speed":"0.4380","steering_angle":"0.0000"}]
//! ```
//!
//! The simulator sends telemetry this way, and expects either a `steer` event carrying the
//! demands, or a `manual` event if the frame held no data.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Prefix of every socket.io event frame.
pub const EVENT_PREFIX: &str = "42";

/// Name of the telemetry event sent by the simulator.
pub const TELEMETRY_EVENT: &str = "telemetry";

/// Name of the event carrying steering and throttle demands.
pub const STEER_EVENT: &str = "steer";

/// Frame sent back when the simulator is being driven manually.
pub const MANUAL_FRAME: &str = "42[\"manual\",{}]";

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// One telemetry sample from the simulated vehicle.
///
/// The simulator encodes each value as a string, plain JSON numbers are also accepted.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SimTelemetry {
    /// Cross track error, the signed distance from the lane centre.
    #[serde(deserialize_with = "de_num_or_str")]
    pub cte: f64,

    /// Current speed of the vehicle.
    #[serde(deserialize_with = "de_num_or_str")]
    pub speed: f64,

    /// Current steering angle of the vehicle.
    #[serde(deserialize_with = "de_num_or_str")]
    pub steering_angle: f64,
}

/// Demands sent to the simulated vehicle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimDems {
    /// Normalised steering demand in [-1, 1]
    pub steering_angle: f64,

    /// Normalised throttle demand
    pub throttle: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// An event frame recieved from the simulator.
#[derive(Debug, Clone, PartialEq)]
pub enum SimEvent {
    /// A telemetry sample
    Telemetry(SimTelemetry),

    /// An event frame without any data, the simulator is in manual mode.
    NoData,

    /// Any other named event, which is not acted on.
    Other(String),
}

/// A response sent back to the simulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimResponse {
    /// Steering and throttle demands
    Steer(SimDems),

    /// Let the simulator be driven manually
    Manual,
}

/// Possible parsing errors.
#[derive(Debug, thiserror::Error)]
pub enum SimParseError {
    #[error("Event frame contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Event frame does not start with an event name")]
    MissingEventName,

    #[error("Telemetry event has no payload")]
    MissingTelemetry,

    #[error("Telemetry payload is invalid: {0}")]
    InvalidTelemetry(serde_json::Error),

    #[error("Could not serialize the demands: {0}")]
    SerializationError(serde_json::Error),
}

/// Either a number or a string holding one.
#[derive(Deserialize)]
#[serde(untagged)]
enum NumOrStr {
    Num(f64),
    Str(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimEvent {
    /// Parse a text frame recieved from the simulator.
    ///
    /// Returns `Ok(None)` if the frame is not a socket.io event, such frames shall be ignored.
    pub fn from_frame(frame: &str) -> Result<Option<Self>, SimParseError> {
        // Only event frames are acted on
        if frame.len() <= EVENT_PREFIX.len() || !frame.starts_with(EVENT_PREFIX) {
            return Ok(None)
        }

        let data = match has_data(frame) {
            Some(d) => d,
            None => return Ok(Some(SimEvent::NoData))
        };

        let val: Value = serde_json::from_str(data)
            .map_err(SimParseError::InvalidJson)?;

        let event = match val[0].as_str() {
            Some(e) => e,
            None => return Err(SimParseError::MissingEventName)
        };

        if event != TELEMETRY_EVENT {
            return Ok(Some(SimEvent::Other(event.to_string())))
        }

        let payload = match val.get(1) {
            Some(p) if !p.is_null() => p.clone(),
            _ => return Err(SimParseError::MissingTelemetry)
        };

        serde_json::from_value(payload)
            .map(|t| Some(SimEvent::Telemetry(t)))
            .map_err(SimParseError::InvalidTelemetry)
    }
}

impl SimResponse {
    /// Encode the response as a text frame for the simulator.
    pub fn to_frame(&self) -> Result<String, SimParseError> {
        match self {
            SimResponse::Steer(dems) => {
                let dems_str = serde_json::to_string(dems)
                    .map_err(SimParseError::SerializationError)?;

                Ok(format!("{}[\"{}\",{}]", EVENT_PREFIX, STEER_EVENT, dems_str))
            },
            SimResponse::Manual => Ok(String::from(MANUAL_FRAME))
        }
    }
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Get the JSON data held in an event frame.
///
/// The data is everything between the first `[` and the last `]` inclusive. If the frame contains
/// `null` anywhere, or no such brackets exist, the frame holds no data and `None` is returned.
pub fn has_data(frame: &str) -> Option<&str> {
    if frame.contains("null") {
        return None
    }

    match (frame.find('['), frame.rfind(']')) {
        (Some(b1), Some(b2)) if b1 < b2 => Some(&frame[b1..=b2]),
        _ => None
    }
}

fn de_num_or_str<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>
{
    match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Num(n) => Ok(n),
        NumOrStr::Str(s) => s.trim().parse::<f64>().map_err(serde::de::Error::custom)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
