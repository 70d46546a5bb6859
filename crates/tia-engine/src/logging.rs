//! Tracing subscriber setup
//!
//! `RUST_LOG` takes precedence over the filter passed in.

use crate::error::EngineError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber
///
/// `json` switches from compact terminal output to JSON lines.
///
/// # Errors
/// Returns `EngineError::Config` if the filter does not parse or a global
/// subscriber is already installed
pub fn init_tracing(filter: &str, json: bool) -> Result<(), EngineError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(env_filter) => env_filter,
        Err(_) => EnvFilter::try_new(filter)
            .map_err(|e| EngineError::Config(format!("invalid log filter {filter:?}: {e}")))?,
    };

    let json_layer = json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
    });
    let terminal_layer = (!json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(false)
            .compact()
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(terminal_layer)
        .try_init()
        .map_err(|e| EngineError::Config(format!("tracing already initialized: {e}")))
}

/// Test subscriber writing through the test harness; safe to call repeatedly
pub fn init_test_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_test_writer()
                .compact(),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_install_is_an_error() {
        init_test_tracing();
        assert!(matches!(
            init_tracing("info", false),
            Err(EngineError::Config(_))
        ));
    }
}
