//! Log output for the binary
//!
//! The library only emits `tracing` events; installing a subscriber is up to
//! the application. `RUST_LOG` takes precedence over the configured level.

use tracing_subscriber::EnvFilter;

use crate::config::LogLevel;
use crate::error::{ErrorCode, ReasonerError, ReasonerResult};

/// The filter `init` would install for `level`
pub fn filter_for(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.filter_directive()))
}

/// Install a formatting subscriber writing to stderr
pub fn init(level: LogLevel) -> ReasonerResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(filter_for(level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| {
            ReasonerError::new(ErrorCode::UnexpectedState, format!("Failed to initialize logging: {}", e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels_map_to_directives() {
        assert_eq!(LogLevel::Quiet.filter_directive(), "error");
        assert_eq!(LogLevel::Normal.filter_directive(), "warn");
        assert_eq!(LogLevel::Debug.filter_directive(), "debug");
    }

    #[test]
    fn test_second_init_fails() {
        // the first call may already have happened in another test
        let _ = init(LogLevel::Quiet);
        assert!(init(LogLevel::Quiet).is_err());
    }
}
