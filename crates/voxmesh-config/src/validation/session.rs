//! Validation for session timing and logging.

use crate::schema::VoxConfig;

use super::helpers::validate_range;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub(crate) fn validate_session(errors: &mut Vec<String>, config: &VoxConfig) {
    let s = &config.session;
    validate_range(errors, "session.heartbeat_interval_secs", s.heartbeat_interval_secs, 1, 300);
    validate_range(errors, "session.settle_delay_ms", s.settle_delay_ms, 0, 10_000);
    validate_range(errors, "session.negotiation_timeout_secs", s.negotiation_timeout_secs, 1, 300);
    validate_range(errors, "session.negotiation_retries", u64::from(s.negotiation_retries), 0, 5);

    // A heartbeat slower than the relay's expiry window gets members reaped mid-call.
    if s.heartbeat_interval_secs >= config.relay.member_ttl_secs {
        errors.push(format!(
            "session.heartbeat_interval_secs = {} must be below relay.member_ttl_secs = {}",
            s.heartbeat_interval_secs, config.relay.member_ttl_secs
        ));
    }
}

pub(crate) fn validate_logging(errors: &mut Vec<String>, config: &VoxConfig) {
    let level = config.logging.level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(format!(
            "logging.level = {:?} must be one of {}",
            config.logging.level,
            LOG_LEVELS.join(", ")
        ));
    }
}
