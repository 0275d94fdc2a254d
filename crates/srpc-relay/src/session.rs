//! Per-producer authentication state machine.
//!
//! Pure: each inbound text frame yields a list of [`Action`]s for the
//! connection task to carry out, so the rules can be tested without a
//! socket.

use srpc_common::{ConnectionId, MetadataSnapshot};
use tracing::{debug, info, warn};

use crate::protocol::{ProducerMessage, RelayResponse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    Authenticated,
}

/// What the connection task should do next, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Reply(RelayResponse),
    /// Add this connection to the active set.
    Register,
    Forward(MetadataSnapshot),
    /// Close the socket; nothing further is processed.
    Close,
}

#[derive(Debug)]
pub struct ProducerSession {
    id: ConnectionId,
    state: AuthState,
}

impl ProducerSession {
    pub fn new() -> Self {
        Self {
            id: ConnectionId::new(),
            state: AuthState::Unauthenticated,
        }
    }

    pub fn id(&self) -> &ConnectionId {
        &self.id
    }

    pub fn state(&self) -> AuthState {
        self.state
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == AuthState::Authenticated
    }

    /// Apply one text frame against the shared token.
    pub fn on_text(&mut self, text: &str, token: &str) -> Vec<Action> {
        let message = match ProducerMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(connection = %self.id, error = %e, "Ignoring malformed message");
                return Vec::new();
            }
        };

        if let ProducerMessage::Auth { .. } = message {
            return self.on_auth(message.token_matches(token));
        }

        if !self.is_authenticated() {
            debug!(connection = %self.id, "Rejecting message from unauthenticated producer");
            return vec![Action::Reply(RelayResponse::not_authenticated())];
        }

        match message {
            ProducerMessage::MetadataUpdate { data } => match MetadataSnapshot::from_value(data) {
                Ok(snapshot) => {
                    debug!(
                        connection = %self.id,
                        title = %snapshot.title,
                        artist = %snapshot.artist,
                        state = ?snapshot.playback_state,
                        "Metadata update"
                    );
                    vec![Action::Forward(snapshot)]
                }
                Err(e) => {
                    warn!(connection = %self.id, error = %e, "Dropping metadata update");
                    Vec::new()
                }
            },
            _ => {
                debug!(connection = %self.id, "Ignoring unknown message type");
                Vec::new()
            }
        }
    }

    fn on_auth(&mut self, valid: bool) -> Vec<Action> {
        if !valid {
            warn!(connection = %self.id, "Auth failed - invalid token");
            return vec![Action::Reply(RelayResponse::AuthFailed), Action::Close];
        }

        match self.state {
            AuthState::Unauthenticated => {
                self.state = AuthState::Authenticated;
                info!(connection = %self.id, "Producer authenticated");
                vec![Action::Register, Action::Reply(RelayResponse::AuthSuccess)]
            }
            AuthState::Authenticated => vec![Action::Reply(RelayResponse::AuthSuccess)],
        }
    }
}

impl Default for ProducerSession {
    fn default() -> Self {
        Self::new()
    }
}
