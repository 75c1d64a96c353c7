//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# voxmesh configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[signaling]
# url = "ws://localhost:3001/ws"
# connect_timeout_secs = 15       # 1-120
# rejoin_on_drop = true
# rejoin_attempts = 5             # 0-50
# reconnect_delay_secs = 1        # 1-60
# max_reconnect_delay_secs = 30   # >= reconnect_delay_secs

[session]
# heartbeat_interval_secs = 15    # 1-300
# settle_delay_ms = 500           # 0-10000
# negotiation_timeout_secs = 15   # 1-300
# negotiation_retries = 1         # 0-5

[media]
# input_device = "default"
# echo_cancellation = true
# noise_suppression = true
# auto_gain_control = true

[ice]
servers = [
    { urls = ["stun:stun.l.google.com:19302"] },
    { urls = ["stun:stun1.l.google.com:19302"] },
]

[leave]
# url = "http://localhost:3001/api/voice"
# timeout_ms = 2000               # 100-30000

[relay]
# port = 3001
# member_ttl_secs = 30            # 5-3600
# reap_interval_secs = 10         # 1-600

[logging]
# level = "info"                  # trace, debug, info, warn, error
"##
    .to_string()
}
