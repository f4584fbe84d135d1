//! Error types.
//!
//! None of these are retried. A failed navigation leaves the page stack in
//! its last consistent state; callers log and move on.

use thiserror::Error;

/// Failure reported by the host bridge for an imperative call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum HostError {
    /// The host refused the call (bad url, too many pages, ...).
    #[error("host rejected {call}: {reason}")]
    Rejected {
        /// Host call name.
        call: String,
        /// Reason supplied by the host.
        reason: String,
    },

    /// The bridge itself is gone.
    #[error("host bridge unavailable")]
    Unavailable,
}

/// Failure while resolving a relative path against the current page.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PathError {
    /// `..` segments climb above the app root.
    #[error("path escapes the app root: {0}")]
    EscapesRoot(String),

    /// Nothing to resolve.
    #[error("empty path")]
    Empty,
}

/// Failure parsing the route configuration delivered with `AppReady`.
#[derive(Debug, Error)]
pub enum RouteConfigError {
    /// The config string is not valid JSON for [`AppConfig`](crate::config::AppConfig).
    #[error("invalid app config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors from navigation verbs.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NavigationError {
    /// Target path is not declared in pages, sub-packages or page definitions.
    /// The app-level not-found hook has already been invoked.
    #[error("page not found: {path}")]
    RouteNotFound {
        /// Path portion of the requested url.
        path: String,
    },

    /// Relative path could not be resolved.
    #[error("cannot resolve {path}: {source}")]
    Resolution {
        /// Path as supplied by the caller.
        path: String,
        /// Why resolution failed.
        source: PathError,
    },

    /// The host failed to create or reuse a renderer context.
    #[error("context creation failed: {0}")]
    ContextCreation(HostError),

    /// A host call other than context creation failed.
    #[error(transparent)]
    Host(#[from] HostError),

    /// `switch_tab` target is not in the tab bar, or the app has no tab group.
    #[error("not a tab page: {path}")]
    NotATab {
        /// Requested path.
        path: String,
    },

    /// The verb needs a current page but the stack is empty.
    #[error("no active page")]
    NoActivePage,

    /// Navigation attempted before `AppReady` delivered the route config.
    #[error("app config not loaded")]
    NotConfigured,
}

impl NavigationError {
    /// Short category string for structured logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::RouteNotFound { .. } => "route_not_found",
            Self::Resolution { .. } => "resolution",
            Self::ContextCreation(_) => "context_creation",
            Self::Host(_) => "host",
            Self::NotATab { .. } => "not_a_tab",
            Self::NoActivePage => "no_active_page",
            Self::NotConfigured => "not_configured",
        }
    }
}

/// Failure raised by developer-supplied lifecycle code.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{hook} failed: {message}")]
pub struct HookError {
    /// Hook name (`onLoad`, `onShow`, a page method name, ...).
    pub hook: String,
    /// Error description.
    pub message: String,
}

impl HookError {
    /// Build a hook error.
    pub fn new(hook: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            message: message.into(),
        }
    }
}

/// Result type for user hooks.
pub type HookResult = std::result::Result<(), HookError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn route_not_found_display() {
        let err = NavigationError::RouteNotFound {
            path: "pages/missing".into(),
        };
        assert_eq!(err.to_string(), "page not found: pages/missing");
        assert_eq!(err.category(), "route_not_found");
    }

    #[test]
    fn host_error_converts() {
        let err: NavigationError = HostError::Unavailable.into();
        assert!(matches!(err, NavigationError::Host(HostError::Unavailable)));
    }

    #[test]
    fn resolution_display_includes_cause() {
        let err = NavigationError::Resolution {
            path: "../../x".into(),
            source: PathError::EscapesRoot("../../x".into()),
        };
        assert!(err.to_string().contains("escapes the app root"));
    }

    #[test]
    fn hook_error_display() {
        let err = HookError::new("onShow", "boom");
        assert_eq!(err.to_string(), "onShow failed: boom");
    }
}
