//! Layered settings: compiled defaults, then `~/.skiff/settings.json`
//! deep-merged on top, then `SKIFF_*` environment variables.
//!
//! In the file layer objects merge per key, arrays and scalars replace, and a
//! `null` keeps whatever the layer below had.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{LOG_LEVELS, SkiffSettings};

/// `~/.skiff/settings.json`, or under `/tmp` when `HOME` is unset.
pub fn settings_path() -> PathBuf {
    std::env::var_os("HOME")
        .map_or_else(|| PathBuf::from("/tmp"), PathBuf::from)
        .join(".skiff")
        .join("settings.json")
}

/// All three layers, reading the file at [`settings_path`].
pub fn load_settings() -> Result<SkiffSettings> {
    load_settings_from_path(&settings_path())
}

/// All three layers, reading the file at `path`.
///
/// A missing file is not an error. A file that does not parse, or whose
/// values fail validation, is.
pub fn load_settings_from_path(path: &Path) -> Result<SkiffSettings> {
    let mut settings = load_file_layer(path)?;
    apply_overrides(&mut settings, |name| std::env::var(name).ok());
    Ok(settings)
}

/// Defaults with the file at `path` merged on top. No environment.
pub fn load_file_layer(path: &Path) -> Result<SkiffSettings> {
    let parse_error = |source| SettingsError::Parse {
        path: path.to_path_buf(),
        source,
    };
    let defaults = serde_json::to_value(SkiffSettings::default()).map_err(parse_error)?;

    let merged = match std::fs::read_to_string(path) {
        Ok(content) => {
            debug!(path = %path.display(), "merging settings file");
            let user: Value = serde_json::from_str(&content).map_err(parse_error)?;
            deep_merge(defaults, user)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file");
            defaults
        }
        Err(source) => {
            return Err(SettingsError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let settings: SkiffSettings = serde_json::from_value(merged).map_err(parse_error)?;
    settings.validate()?;
    Ok(settings)
}

/// Merge `overlay` into `base`.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay.into_iter().filter(|(_, v)| !v.is_null()) {
                let merged = match base.remove(&key) {
                    Some(below) => deep_merge(below, value),
                    None => value,
                };
                let _ = base.insert(key, merged);
            }
            Value::Object(base)
        }
        (_, overlay) => overlay,
    }
}

/// Apply `SKIFF_*` variables looked up through `lookup`.
///
/// Empty variables are unset. A value that does not parse is logged and the
/// lower layer wins.
pub fn apply_overrides<F>(settings: &mut SkiffSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = |name: &str| lookup(name).filter(|v| !v.is_empty());

    override_with(
        env("SKIFF_SHOW_FALLBACK_MS"),
        "SKIFF_SHOW_FALLBACK_MS",
        |raw| parse_in_range(raw, 1..=60_000),
        &mut settings.runtime.show_fallback_ms,
    );
    override_with(
        env("SKIFF_REPLAY_DEPTH"),
        "SKIFF_REPLAY_DEPTH",
        |raw| parse_in_range(raw, 0..=4096),
        &mut settings.bus.replay_depth,
    );
    override_with(
        env("SKIFF_LOG_LEVEL"),
        "SKIFF_LOG_LEVEL",
        |raw| {
            let level = raw.to_lowercase();
            LOG_LEVELS.contains(&level.as_str()).then_some(level)
        },
        &mut settings.logging.level,
    );
    override_with(env("SKIFF_LOG_JSON"), "SKIFF_LOG_JSON", parse_bool, &mut settings.logging.json);
    override_with(
        env("SKIFF_PRELOAD"),
        "SKIFF_PRELOAD",
        parse_bool,
        &mut settings.preload.enabled,
    );
}

fn override_with<T>(raw: Option<String>, key: &str, parse: impl Fn(&str) -> Option<T>, slot: &mut T) {
    let Some(raw) = raw else {
        return;
    };
    match parse(&raw) {
        Some(value) => {
            debug!(key, value = %raw, "settings override from environment");
            *slot = value;
        }
        None => warn!(key, value = %raw, "ignoring unparseable environment override"),
    }
}

/// `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`, any case.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse `raw` and keep it only if it falls in `range`.
pub fn parse_in_range<T>(raw: &str, range: RangeInclusive<T>) -> Option<T>
where
    T: FromStr + PartialOrd,
{
    raw.trim().parse().ok().filter(|n| range.contains(n))
}
