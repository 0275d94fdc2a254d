//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# SRPC Configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[relay]
# port = 8173
# bind_address = "127.0.0.1"
# Shared secret the browser extension must send in its auth message.
token = "secure-token"
# keepalive_interval = 30   # seconds, 5-300

[presence]
# Application client id used in the presence handshake.
client_id = "1106789337726935040"
# reconnect_delay = 5       # seconds, 1-300
# pipe_index = 0            # 0-9

[logging]
# level = "info"            # error, warn, info, debug, trace

[system]
# auto_start = true
"##
    .to_string()
}
