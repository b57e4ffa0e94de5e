//! Tracing bootstrap for the load tester.

use tracing_subscriber::EnvFilter;

/// Environment variable that overrides the log filter.
pub const LOG_ENV_VAR: &str = "AMQLOAD_LOG";

/// Install the global tracing subscriber.
///
/// `default_filter` applies when [`LOG_ENV_VAR`] is unset. Safe to call
/// more than once; later calls are ignored, which keeps tests that share a
/// process from fighting over the global subscriber.
pub fn init(default_filter: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_does_not_panic() {
        init("info");
        init("debug");
    }
}
