//! Global tracing subscriber.

use std::io::IsTerminal;
use std::sync::OnceLock;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

static INITIALISED: OnceLock<()> = OnceLock::new();

/// Default filter when neither `--log-level` nor `RUST_LOG` is given.
pub const DEFAULT_FILTER: &str = "info";

#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("tracing already initialised")]
    AlreadyInitialised,
    #[error("invalid log filter `{directive}`: {reason}")]
    Filter { directive: String, reason: String },
}

/// Filter from an explicit directive, else `RUST_LOG`, else [`DEFAULT_FILTER`].
pub fn filter(directive: Option<&str>) -> Result<EnvFilter, InitError> {
    match directive {
        Some(d) => EnvFilter::try_new(d)
            .map_err(|e| InitError::Filter { directive: d.to_string(), reason: e.to_string() }),
        None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

/// Install the fmt layer on stderr. Fails if called twice.
pub fn init(directive: Option<&str>) -> Result<(), InitError> {
    let filter = filter(directive)?;
    INITIALISED.set(()).map_err(|_| InitError::AlreadyInitialised)?;
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr);
    Registry::default().with(filter).with(fmt_layer).init();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_directive_is_parsed() {
        assert!(filter(Some("hyperorbit_engine=debug,warn")).is_ok());
    }

    #[test]
    fn bad_directive_is_reported() {
        let err = filter(Some("hyperorbit_engine=loud")).unwrap_err();
        assert!(matches!(err, InitError::Filter { .. }));
    }
}
