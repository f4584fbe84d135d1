//! Settings type definitions.
//!
//! Field names are camelCase on disk. Every section is `#[serde(default)]`,
//! so a settings file only needs the keys it overrides.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SkiffSettings {
    /// Lifecycle timing.
    pub runtime: RuntimeSettings,
    /// Event bus tuning.
    pub bus: BusSettings,
    /// Log output.
    pub logging: LoggingSettings,
    /// Sub-package preloading.
    pub preload: PreloadSettings,
}

/// Lifecycle timing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct RuntimeSettings {
    /// How long a page may wait for its first render before `onShow` is forced.
    pub show_fallback_ms: u64,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            show_fallback_ms: 1000,
        }
    }
}

/// Event bus tuning.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct BusSettings {
    /// Payloads retained per topic for replaying subscribers.
    pub replay_depth: usize,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self { replay_depth: 32 }
    }
}

/// Log output.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default level when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
    /// Warn-and-above records kept in memory for inspection.
    pub recent_capacity: usize,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            recent_capacity: 256,
        }
    }
}

/// Sub-package preloading.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PreloadSettings {
    /// Ask the host to load preload-rule packages after cold start.
    pub enabled: bool,
}

impl Default for PreloadSettings {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Level names accepted by `logging.level`.
pub const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

impl SkiffSettings {
    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.runtime.show_fallback_ms == 0 {
            return Err(SettingsError::Invalid {
                key: "runtime.showFallbackMs",
                reason: "must be greater than 0".into(),
            });
        }
        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(SettingsError::Invalid {
                key: "logging.level",
                reason: format!("{:?} is not one of {}", self.logging.level, LOG_LEVELS.join(", ")),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = SkiffSettings::default();
        assert_eq!(s.runtime.show_fallback_ms, 1000);
        assert_eq!(s.bus.replay_depth, 32);
        assert_eq!(s.logging.level, "info");
        assert!(!s.logging.json);
        assert_eq!(s.logging.recent_capacity, 256);
        assert!(s.preload.enabled);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn serializes_camel_case() {
        let json = serde_json::to_value(SkiffSettings::default()).unwrap();
        assert_eq!(json["runtime"]["showFallbackMs"], 1000);
        assert_eq!(json["bus"]["replayDepth"], 32);
        assert_eq!(json["logging"]["recentCapacity"], 256);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let s: SkiffSettings = serde_json::from_str(r#"{"logging": {"json": true}}"#).unwrap();
        assert!(s.logging.json);
        assert_eq!(s.logging.level, "info");
        assert_eq!(s.runtime.show_fallback_ms, 1000);
    }

    #[test]
    fn zero_fallback_is_invalid() {
        let mut s = SkiffSettings::default();
        s.runtime.show_fallback_ms = 0;
        assert!(matches!(s.validate(), Err(SettingsError::Invalid { key: "runtime.showFallbackMs", .. })));
    }

    #[test]
    fn unknown_level_is_invalid() {
        let mut s = SkiffSettings::default();
        s.logging.level = "loud".into();
        assert!(s.validate().is_err());
        s.logging.level = "WARN".into();
        assert!(s.validate().is_ok());
    }
}
