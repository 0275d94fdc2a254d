//! JSON payloads exchanged with the presence consumer.

use serde::{Deserialize, Serialize};

/// IPC protocol version sent in the handshake.
pub const HANDSHAKE_VERSION: u32 = 1;

/// Activity type code for "Listening to ...".
pub const ACTIVITY_TYPE_LISTENING: u8 = 2;

pub mod commands {
    pub const SET_ACTIVITY: &str = "SET_ACTIVITY";
    pub const DISPATCH: &str = "DISPATCH";
}

pub mod events {
    pub const READY: &str = "READY";
    pub const ERROR: &str = "ERROR";
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Opcode 0 body.
#[derive(Debug, Serialize)]
pub struct Handshake<'a> {
    pub v: u32,
    pub client_id: &'a str,
}

impl<'a> Handshake<'a> {
    pub fn new(client_id: &'a str) -> Self {
        Self {
            v: HANDSHAKE_VERSION,
            client_id,
        }
    }
}

/// Opcode 1 `SET_ACTIVITY` body. Omitting `activity` clears the presence.
#[derive(Debug, Serialize)]
pub struct SetActivityCommand<'a> {
    pub cmd: &'static str,
    pub args: SetActivityArgs<'a>,
    pub nonce: String,
}

#[derive(Debug, Serialize)]
pub struct SetActivityArgs<'a> {
    pub pid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<&'a ActivityPayload>,
}

impl<'a> SetActivityCommand<'a> {
    pub fn set(pid: u32, activity: &'a ActivityPayload, nonce: String) -> Self {
        Self {
            cmd: commands::SET_ACTIVITY,
            args: SetActivityArgs {
                pid,
                activity: Some(activity),
            },
            nonce,
        }
    }

    pub fn clear(pid: u32, nonce: String) -> Self {
        Self {
            cmd: commands::SET_ACTIVITY,
            args: SetActivityArgs {
                pid,
                activity: None,
            },
            nonce,
        }
    }
}

/// What the consumer renders for the current track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityPayload {
    pub details: String,
    pub state: String,
    pub assets: ActivityAssets,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<ActivityTimestamps>,
    #[serde(default)]
    pub buttons: Vec<ActivityButton>,
    #[serde(rename = "type")]
    pub activity_type: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityAssets {
    pub large_image: String,
    pub large_text: String,
    pub small_image: String,
    pub small_text: String,
}

/// Epoch milliseconds. The consumer renders a live counter from these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityTimestamps {
    pub start: i64,
    pub end: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityButton {
    pub label: String,
    pub url: String,
}

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// Envelope of every JSON message the consumer sends.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundMessage {
    #[serde(default)]
    pub cmd: Option<String>,
    #[serde(default)]
    pub evt: Option<String>,
    #[serde(default)]
    pub data: Option<serde_json::Value>,
}

impl InboundMessage {
    pub fn is_dispatch(&self, evt: &str) -> bool {
        self.cmd.as_deref() == Some(commands::DISPATCH) && self.evt.as_deref() == Some(evt)
    }

    pub fn is_ready(&self) -> bool {
        self.is_dispatch(events::READY)
    }

    pub fn is_error(&self) -> bool {
        self.evt.as_deref() == Some(events::ERROR)
    }

    /// Human-readable reason carried in `data.message`, if any.
    pub fn message(&self) -> Option<&str> {
        self.data
            .as_ref()
            .and_then(|d| d.get("message"))
            .and_then(|m| m.as_str())
    }
}
