//! Structured logging configuration.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels come from `RUST_LOG`. Records emitted by the bracket library
/// through `log` are forwarded to the same subscriber.
pub fn init() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::debug!("Structured logging initialized");
}

/// Log a bracket state change with structured data
///
/// # Arguments
///
/// * `event_type` - Kind of change (`generate`, `set_winner`, ...)
/// * `tournament_id` - Tournament affected
/// * `match_id` - Match affected, if any
/// * `message` - Event message
pub fn log_bracket_event(
    event_type: &str,
    tournament_id: i64,
    match_id: Option<i64>,
    message: &str,
) {
    tracing::info!(
        event_type = event_type,
        tournament_id = tournament_id,
        match_id = match_id,
        "BRACKET: {}",
        message
    );
}

/// Log a rejected command
pub fn log_rejected(command: &str, reason: &str) {
    tracing::warn!(command = command, reason = reason, "Command rejected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_bracket_event() {
        // Just ensure it doesn't panic
        log_bracket_event("generate", 1, None, "Generated 3 rounds");
        log_bracket_event("set_winner", 1, Some(7), "Match R1-M1 decided");
    }

    #[test]
    fn test_log_rejected() {
        log_rejected("set-winner", "Team 9 is not playing in match R1-M1");
    }
}
