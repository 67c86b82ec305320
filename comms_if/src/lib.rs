//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the software: the message definitions
//! exchanged with the driving simulator and the network layer that carries them.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Message definitions for equipment (currently only the simulator)
pub mod eqpt;

/// Network module
pub mod net;
