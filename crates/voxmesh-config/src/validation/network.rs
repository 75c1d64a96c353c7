//! Validation for signaling, ICE, leave notification, and relay sections.

use crate::schema::VoxConfig;

use super::helpers::{validate_range, validate_scheme};

pub(crate) fn validate_signaling(errors: &mut Vec<String>, config: &VoxConfig) {
    let s = &config.signaling;
    validate_scheme(errors, "signaling.url", &s.url, &["ws://", "wss://"]);
    validate_range(errors, "signaling.connect_timeout_secs", s.connect_timeout_secs, 1, 120);
    validate_range(errors, "signaling.rejoin_attempts", u64::from(s.rejoin_attempts), 0, 50);
    validate_range(errors, "signaling.reconnect_delay_secs", s.reconnect_delay_secs, 1, 60);
    if s.max_reconnect_delay_secs < s.reconnect_delay_secs {
        errors.push(format!(
            "signaling.max_reconnect_delay_secs = {} is below reconnect_delay_secs = {}",
            s.max_reconnect_delay_secs, s.reconnect_delay_secs
        ));
    }
}

pub(crate) fn validate_ice(errors: &mut Vec<String>, config: &VoxConfig) {
    for (i, server) in config.ice.servers.iter().enumerate() {
        if server.urls.is_empty() {
            errors.push(format!("ice.servers[{i}] has no urls"));
        }
        for url in &server.urls {
            validate_scheme(
                errors,
                &format!("ice.servers[{i}].urls"),
                url,
                &["stun:", "stuns:", "turn:", "turns:"],
            );
        }
    }
}

pub(crate) fn validate_leave(errors: &mut Vec<String>, config: &VoxConfig) {
    validate_scheme(errors, "leave.url", &config.leave.url, &["http://", "https://"]);
    validate_range(errors, "leave.timeout_ms", config.leave.timeout_ms, 100, 30_000);
}

pub(crate) fn validate_relay(errors: &mut Vec<String>, config: &VoxConfig) {
    let r = &config.relay;
    validate_range(errors, "relay.port", u64::from(r.port), 1, 65535);
    validate_range(errors, "relay.member_ttl_secs", r.member_ttl_secs, 5, 3600);
    validate_range(errors, "relay.reap_interval_secs", r.reap_interval_secs, 1, 600);
}
