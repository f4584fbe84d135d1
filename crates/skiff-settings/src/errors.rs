//! Settings errors.

use std::path::PathBuf;

use thiserror::Error;

/// Why a settings layer could not be loaded.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Read {
        /// File that was read.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
    /// The file is not JSON, or its values have the wrong shape.
    #[error("{} is not a valid settings file: {source}", path.display())]
    Parse {
        /// File that was parsed.
        path: PathBuf,
        /// Underlying serde failure.
        #[source]
        source: serde_json::Error,
    },
    /// A value parsed but the runtime cannot work with it.
    #[error("{key}: {reason}")]
    Invalid {
        /// Dotted camelCase key, e.g. `runtime.showFallbackMs`.
        key: &'static str,
        /// What is wrong with the value.
        reason: String,
    },
}

/// Result alias for settings loading.
pub type Result<T> = std::result::Result<T, SettingsError>;
