//! Sound gate: adaptive, hysteresis-based sound activity detection.
//!
//! Learns the ambient noise floor from a live input stream and emits ON/OFF
//! presence events when block energy rises above, then falls back below,
//! thresholds derived from that floor. The decision core lives in [`gate`]
//! and does no I/O; [`audio`], [`driver`] and [`ipc`] connect it to a cpal
//! input device and a JSON-line client.

pub mod audio;
pub mod config;
pub mod driver;
pub mod error;
pub mod events;
pub mod gate;
pub mod ipc;
pub mod logging;

pub use error::{GateError, GateResult};
pub use events::{EventHub, GateEvent};
pub use gate::{GateDecision, GateSession, GateState};
