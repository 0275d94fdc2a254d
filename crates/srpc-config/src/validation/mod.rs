//! Full configuration validation.
//!
//! Every check pushes onto a shared error list so the operator sees all
//! problems at once in a single `ConfigError`.

mod helpers;


use crate::schema::{SrpcConfig, PLACEHOLDER_CLIENT_ID};
use srpc_common::ConfigError;

use helpers::{validate_non_empty, validate_range};

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &SrpcConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    validate_relay(&mut errors, config);
    validate_presence(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}

fn validate_relay(errors: &mut Vec<String>, config: &SrpcConfig) {
    if config.relay.port == 0 {
        errors.push("relay.port must be a fixed port, not 0".into());
    }
    validate_non_empty(errors, "relay.bind_address", &config.relay.bind_address);
    validate_non_empty(errors, "relay.token", &config.relay.token);
    validate_range(
        errors,
        "relay.keepalive_interval",
        config.relay.keepalive_interval,
        5,
        300,
    );
}

fn validate_presence(errors: &mut Vec<String>, config: &SrpcConfig) {
    let client_id = config.presence.client_id.trim();
    if client_id.is_empty() || client_id == PLACEHOLDER_CLIENT_ID {
        errors.push("presence.client_id is not configured".into());
    } else if !client_id.chars().all(|c| c.is_ascii_digit()) {
        errors.push(format!(
            "presence.client_id = {client_id:?} must be a numeric application id"
        ));
    }
    validate_range(
        errors,
        "presence.reconnect_delay",
        config.presence.reconnect_delay,
        1,
        300,
    );
    validate_range(errors, "presence.pipe_index", config.presence.pipe_index, 0, 9);
}
