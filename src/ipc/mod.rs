//! JSON-line IPC protocol types.
//!
//! Events use `{"event": "<name>", "data": {...}}` format (stdout).
//! Commands use `{"command": "<name>", ...}` format (stdin).
//! Gate events ([`crate::events::GateEvent`]) share the event format and
//! are written as-is.

pub mod bridge;

use serde::{Deserialize, Serialize};

use crate::audio::InputDeviceInfo;
use crate::gate::GateSnapshot;

// ---------------------------------------------------------------------------
// Events: host -> client (stdout)
// ---------------------------------------------------------------------------

/// Lifecycle and reply events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum HostEvent {
    Starting {},
    Ready {
        device: String,
        channels: u16,
        sample_rate: u32,
        block_size: usize,
    },
    Status(GateSnapshot),
    Pong {},
    AudioDevices { input: Vec<InputDeviceInfo> },
    Error { message: String },
    Stopping {},
}

// ---------------------------------------------------------------------------
// Commands: client -> host (stdin)
// ---------------------------------------------------------------------------

/// Commands read from stdin as JSON lines.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "command")]
#[serde(rename_all = "snake_case")]
pub enum HostCommand {
    Ping {},
    Status {},
    ListAudioDevices {},
    Stop {},
}
