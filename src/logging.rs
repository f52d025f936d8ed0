//! Tracing subscriber setup for the CLI

use crate::config::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to parse logging.filter '{filter}': {source}")]
    Filter {
        filter: String,
        #[source]
        source: tracing_subscriber::filter::ParseError,
    },

    #[error("failed to initialize tracing subscriber: {0}")]
    Init(String),
}

/// Filter directives in effect: `RUST_LOG` when set, otherwise the config's
pub fn effective_filter(config: &LoggingConfig) -> String {
    std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| config.filter.clone())
}

fn build_env_filter(filter: &str) -> Result<EnvFilter, LoggingError> {
    EnvFilter::try_new(filter).map_err(|source| LoggingError::Filter {
        filter: filter.to_string(),
        source,
    })
}

/// Install the global subscriber, writing to stderr
pub fn init_tracing(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = effective_filter(config);
    let env_filter = build_env_filter(&filter)?;

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true);

    let installed = if config.json {
        builder
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| LoggingError::Init(e.to_string()))?;

    tracing::debug!(filter = %filter, json = config.json, "logging initialized");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_filter_names_the_config_key() {
        let err = build_env_filter("slotwatch=notalevel").unwrap_err();
        assert!(err.to_string().contains("logging.filter"));
    }

    #[test]
    fn valid_filter_parses() {
        assert!(build_env_filter("info,slotwatch::orchestrator=debug").is_ok());
    }
}
