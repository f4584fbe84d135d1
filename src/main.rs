//! # skiff
//!
//! Replays a recorded session against the navigation core and prints the
//! resulting page stack. The host side is simulated; context ids are handed
//! out sequentially starting at 1 (the entry page).

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::{Deserialize, Serialize};
use skiff_core::config::AppConfig;
use skiff_core::events::{AppReadyEvent, HostEvent, RendererMessage, TransitionRequest};
use skiff_runtime::{Orchestrator, SimulatedHost};
use skiff_settings::SkiffSettings;
use skiff_telemetry::{LogQuery, LogRecord, TelemetryConfig, init_telemetry};
use tokio::task::JoinSet;
use tracing::level_filters::LevelFilter;
use tracing::{info, warn};

/// Replay a skiff session transcript.
#[derive(Parser, Debug)]
#[command(name = "skiff", about = "Replay host events and renderer messages against skiff")]
struct Cli {
    /// App route config (`app.json`); when given, the entry page is booted first.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Entry page; defaults to the first declared page.
    #[arg(long)]
    entry: Option<String>,

    /// JSON-lines transcript: `{"host": ...}`, `{"renderer": ...}` or `{"navigate": ...}` per line.
    transcript: PathBuf,

    /// Settings file (defaults to `~/.skiff/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long)]
    json: bool,

    /// Per-module log level, e.g. `skiff_runtime::router=debug`. Repeatable.
    #[arg(long = "log", value_parser = parse_module_level)]
    module_levels: Vec<(String, LevelFilter)>,

    /// How long to wait for parked navigations at the end, in milliseconds.
    #[arg(long, default_value = "5000")]
    drain_ms: u64,
}

/// One transcript line.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Step {
    Host(HostEvent),
    Renderer(RendererMessage),
    Navigate(TransitionRequest),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Report<'a> {
    pages: Vec<skiff_runtime::PageSnapshot>,
    host_calls: Vec<skiff_runtime::HostCall>,
    navigation_errors: &'a [String],
    warnings: Vec<LogRecord>,
}

fn parse_module_level(raw: &str) -> Result<(String, LevelFilter), String> {
    let (module, level) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected module=level, got {raw}"))?;
    let level = level
        .parse::<LevelFilter>()
        .map_err(|err| format!("invalid level {level}: {err}"))?;
    Ok((module.to_string(), level))
}

fn load_settings(path: Option<&Path>) -> Result<SkiffSettings> {
    let settings = match path {
        Some(path) => skiff_settings::load_settings_from_path(path),
        None => skiff_settings::load_settings(),
    };
    settings.context("Failed to load settings")
}

async fn boot(orch: &Orchestrator, host: &SimulatedHost, config_path: &Path, entry: Option<String>) -> Result<()> {
    let raw = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read app config: {}", config_path.display()))?;
    let config = AppConfig::from_json(&raw).context("Invalid app config")?;
    let Some(page_url) = entry.or_else(|| config.pages.first().cloned()) else {
        bail!("App config declares no pages and no --entry was given");
    };
    let app_path = config_path
        .parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    orch.handle_host_event(HostEvent::AppReady(AppReadyEvent {
        app_config: raw,
        app_path,
        page_url,
        context_id: host.reserve_context(),
    }))
    .await
    .context("Cold start failed")?;
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(cli.settings.as_deref())?;
    let mut telemetry = TelemetryConfig::from_settings(&settings.logging);
    telemetry.json |= cli.json;
    telemetry.module_levels.extend(cli.module_levels.iter().cloned());
    let guard = init_telemetry(&telemetry);

    let host = Arc::new(SimulatedHost::new());
    let orch = Arc::new(Orchestrator::new(host.clone(), settings));

    if let Some(config_path) = &cli.config {
        boot(&orch, &host, config_path, cli.entry.clone()).await?;
    }

    let transcript = std::fs::read_to_string(&cli.transcript)
        .with_context(|| format!("Failed to read transcript: {}", cli.transcript.display()))?;

    let mut navigations = JoinSet::new();
    for (lineno, line) in transcript.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let step: Step = serde_json::from_str(line)
            .with_context(|| format!("Invalid transcript line {}", lineno + 1))?;
        match step {
            Step::Host(event) => {
                if let Err(err) = orch.handle_host_event(event).await {
                    warn!(line = lineno + 1, error = %err, "host event failed");
                }
            }
            Step::Renderer(message) => orch.handle_renderer_message(message),
            Step::Navigate(request) => {
                // Navigations may park until a later line acknowledges a render.
                let orch = Arc::clone(&orch);
                let line = lineno + 1;
                let _ = navigations.spawn(async move {
                    let verb = request.verb();
                    orch.dispatch(request)
                        .await
                        .map_err(|err| format!("line {line}: {verb}: {err}"))
                });
            }
        }
        tokio::task::yield_now().await;
    }

    let mut errors = Vec::new();
    let drain = tokio::time::timeout(Duration::from_millis(cli.drain_ms), async {
        while let Some(joined) = navigations.join_next().await {
            match joined {
                Ok(Ok(_)) => {}
                Ok(Err(err)) => errors.push(err),
                Err(err) => errors.push(format!("navigation task failed: {err}")),
            }
        }
    })
    .await;
    if drain.is_err() {
        warn!(parked = navigations.len(), "navigations still parked at end of transcript");
        navigations.abort_all();
    }

    let warnings = guard
        .recent()
        .map(|sink| sink.query(&LogQuery::default()))
        .unwrap_or_default();
    info!(pages = orch.current_pages().len(), errors = errors.len(), "replay finished");
    println!("{}", render_report(&orch, &host, &errors, warnings)?);
    Ok(())
}

fn render_report(
    orch: &Orchestrator,
    host: &SimulatedHost,
    errors: &[String],
    warnings: Vec<LogRecord>,
) -> Result<String> {
    let report = Report {
        pages: orch.current_pages(),
        host_calls: host.calls(),
        navigation_errors: errors,
        warnings,
    };
    serde_json::to_string_pretty(&report).context("Failed to serialize report")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_transcript_steps() {
        let host: Step = serde_json::from_str(r#"{"host": {"type": "accountChange"}}"#).unwrap();
        assert!(matches!(host, Step::Host(HostEvent::AccountChange)));

        let nav: Step =
            serde_json::from_str(r#"{"navigate": {"verb": "navigateBack"}}"#).unwrap();
        assert!(matches!(
            nav,
            Step::Navigate(TransitionRequest::NavigateBack { delta: 1 })
        ));

        let renderer: Step = serde_json::from_str(
            r#"{"renderer": {"type": "abilityMessage", "slaveId": 2, "kind": "rendered"}}"#,
        )
        .unwrap();
        assert!(matches!(renderer, Step::Renderer(m) if m.is_render_ack()));
    }

    #[test]
    fn parses_module_levels() {
        assert_eq!(
            parse_module_level("skiff_runtime=debug").unwrap(),
            ("skiff_runtime".to_string(), LevelFilter::DEBUG)
        );
        assert!(parse_module_level("nolevel").is_err());
        assert!(parse_module_level("a=loud").is_err());
    }

    #[test]
    fn boots_from_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        std::fs::write(&path, r#"{"pages": ["pages/index/index"]}"#).unwrap();

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let host = Arc::new(SimulatedHost::new());
            let orch = Orchestrator::new(host.clone(), SkiffSettings::default());
            boot(&orch, &host, &path, None).await.unwrap();
            let pages = orch.current_pages();
            assert_eq!(pages.len(), 1);
            assert_eq!(pages[0].uri, "pages/index/index");
        });
    }

    #[test]
    fn report_is_one_json_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.json");
        std::fs::write(&path, r#"{"pages": ["pages/index/index"]}"#).unwrap();

        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let host = Arc::new(SimulatedHost::new());
            let orch = Orchestrator::new(host.clone(), SkiffSettings::default());
            boot(&orch, &host, &path, None).await.unwrap();

            let errors = vec!["line 3: navigateTo: route not found".to_string()];
            let rendered = render_report(&orch, &host, &errors, Vec::new()).unwrap();
            let report: serde_json::Value = serde_json::from_str(&rendered).unwrap();
            for key in ["pages", "hostCalls", "navigationErrors", "warnings"] {
                assert!(report.get(key).is_some(), "missing {key}");
            }
            assert_eq!(report["pages"].as_array().unwrap().len(), 1);
            assert_eq!(report["navigationErrors"][0], errors[0].as_str());
        });
    }
}
