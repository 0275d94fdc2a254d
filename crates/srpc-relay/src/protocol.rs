//! Producer-facing wire protocol. JSON text frames, tagged by `type`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const NOT_AUTHENTICATED: &str = "Not authenticated";

/// Messages a producer sends to the relay.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type")]
pub enum ProducerMessage {
    #[serde(rename = "auth")]
    Auth {
        #[serde(default)]
        token: Value,
    },

    #[serde(rename = "METADATA_UPDATE")]
    MetadataUpdate {
        #[serde(default)]
        data: Value,
    },

    /// Any other `type`, or a JSON value with no usable `type`.
    #[serde(other)]
    Unknown,
}

impl ProducerMessage {
    /// Parse one text frame. Only non-JSON input is an error; well-formed
    /// JSON of an unexpected shape becomes [`ProducerMessage::Unknown`].
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(text)?;
        Ok(serde_json::from_value(value).unwrap_or(ProducerMessage::Unknown))
    }

    /// True if this is an `auth` message carrying exactly `expected`.
    pub fn token_matches(&self, expected: &str) -> bool {
        match self {
            ProducerMessage::Auth { token } => token.as_str() == Some(expected),
            _ => false,
        }
    }
}

/// Messages the relay sends back to producers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum RelayResponse {
    #[serde(rename = "AUTH_SUCCESS")]
    AuthSuccess,

    #[serde(rename = "AUTH_FAILED")]
    AuthFailed,

    #[serde(rename = "ERROR")]
    Error { message: String },
}

impl RelayResponse {
    pub fn not_authenticated() -> Self {
        RelayResponse::Error {
            message: NOT_AUTHENTICATED.to_string(),
        }
    }

    pub fn to_json(&self) -> String {
        // Unit and string-only variants cannot fail to serialize.
        serde_json::to_string(self).unwrap_or_default()
    }
}
