//! Runtime-level errors.

use skiff_core::errors::{HostError, NavigationError, RouteConfigError};
use thiserror::Error;

/// Failure handling a host event.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// `AppReady` carried an unparseable route config.
    #[error(transparent)]
    Config(#[from] RouteConfigError),

    /// A navigation triggered by the event failed.
    #[error(transparent)]
    Navigation(#[from] NavigationError),

    /// A direct host call failed.
    #[error(transparent)]
    Host(#[from] HostError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_navigation_errors_transparently() {
        let err: RuntimeError = NavigationError::NoActivePage.into();
        assert_eq!(err.to_string(), "no active page");
    }

    #[test]
    fn wraps_config_errors() {
        let bad = skiff_core::config::AppConfig::from_json("nope").unwrap_err();
        let err = RuntimeError::from(bad);
        assert!(err.to_string().starts_with("invalid app config"));
    }
}
