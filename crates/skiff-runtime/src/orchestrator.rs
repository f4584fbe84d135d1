//! The orchestrator: single owner of buses, stack, navigator and router.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use skiff_bus::EventBus;
use skiff_core::config::AppConfig;
use skiff_core::errors::{NavigationError, PathError};
use skiff_core::events::{AppReadyEvent, HostEvent, RendererMessage, TransitionRequest};
use skiff_core::ids::ContextId;
use skiff_core::path::resolve_asset_path;
use skiff_settings::SkiffSettings;
use tracing::{debug, info, instrument, trace, warn};

use crate::errors::RuntimeError;
use crate::handle::PageSnapshot;
use crate::hooks::{AppHooks, PageContext, PageHooks, PageRegistry};
use crate::host::HostBridge;
use crate::navigator::Navigator;
use crate::router::LifecycleRouter;
use crate::signals::Signal;
use crate::stack::NavigationStack;

/// Entry point for host events and renderer messages.
pub struct Orchestrator {
    host: Arc<dyn HostBridge>,
    settings: SkiffSettings,
    communicator: EventBus<Signal>,
    lifecycle: EventBus<Signal>,
    signals: EventBus<Signal>,
    // Keeps the telemetry tap alive.
    _telemetry: EventBus<Signal>,
    stack: Arc<NavigationStack>,
    registry: Arc<PageRegistry>,
    navigator: Navigator,
    router: LifecycleRouter,
}

impl Orchestrator {
    /// Wire everything together over `host`.
    pub fn new(host: Arc<dyn HostBridge>, settings: SkiffSettings) -> Self {
        let depth = settings.bus.replay_depth;
        let communicator = EventBus::with_replay_depth(depth);
        let lifecycle = EventBus::with_replay_depth(depth);
        let signals = EventBus::with_replay_depth(depth);

        let telemetry = EventBus::merge(&[communicator.clone(), lifecycle.clone(), signals.clone()]);
        telemetry.observe(|topic, signal: &Signal| {
            trace!(topic, signal = signal.name(), "bus");
        });

        let stack = Arc::new(NavigationStack::new());
        let registry = Arc::new(PageRegistry::new());
        let navigator = Navigator::new(
            Arc::clone(&host),
            Arc::clone(&stack),
            signals.clone(),
            Arc::clone(&registry),
        );
        let router = LifecycleRouter::new(
            Arc::clone(&stack),
            Arc::clone(&registry),
            signals.clone(),
            Duration::from_millis(settings.runtime.show_fallback_ms),
        );
        router.attach(&communicator, &lifecycle);

        Self {
            host,
            settings,
            communicator,
            lifecycle,
            signals,
            _telemetry: telemetry,
            stack,
            registry,
            navigator,
            router,
        }
    }

    /// Register the page definition for `route`.
    pub fn register_page<F>(&self, route: &str, factory: F)
    where
        F: Fn(&PageContext) -> Arc<dyn PageHooks> + Send + Sync + 'static,
    {
        self.registry.register(route, factory);
    }

    /// Install app hooks; fires `on_launch` with `options`.
    pub fn set_app(&self, hooks: Arc<dyn AppHooks>, options: &Value) {
        self.router.set_app(hooks, options);
    }

    /// Navigation verbs.
    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    /// Lifecycle router.
    pub fn router(&self) -> &LifecycleRouter {
        &self.router
    }

    /// Internal signal bus.
    pub fn signals(&self) -> &EventBus<Signal> {
        &self.signals
    }

    /// Settings the orchestrator was built with.
    pub fn settings(&self) -> &SkiffSettings {
        &self.settings
    }

    /// Bottom-up view of the page stack.
    pub fn current_pages(&self) -> Vec<PageSnapshot> {
        self.stack.snapshot()
    }

    /// Context of the active page.
    pub fn current_context_id(&self) -> Option<ContextId> {
        self.stack.current_context_id()
    }

    /// Run one navigation request.
    pub async fn dispatch(&self, request: TransitionRequest) -> Result<Option<ContextId>, NavigationError> {
        self.navigator.dispatch(request).await
    }

    /// Feed a message from a renderer context.
    pub fn handle_renderer_message(&self, message: RendererMessage) {
        let topic = renderer_topic(&message);
        debug!(topic, context_id = %message.context_id(), "renderer message");
        let _ = self.communicator.publish(topic, Signal::Renderer(message));
    }

    /// Feed an event from the host.
    #[instrument(skip(self, event), fields(event = event.name()))]
    pub async fn handle_host_event(&self, event: HostEvent) -> Result<(), RuntimeError> {
        match event {
            HostEvent::AppReady(ready) => self.on_app_ready(ready).await,
            HostEvent::Lifecycle(signal) => {
                let _ = self
                    .lifecycle
                    .publish(signal.kind.as_str(), Signal::HostLifecycle(signal));
                Ok(())
            }
            HostEvent::Route(route) => {
                self.navigator.on_route(&route).await;
                Ok(())
            }
            HostEvent::TabItemTap(tap) => {
                let _ = self
                    .signals
                    .publish(crate::signals::topics::TAB_ITEM_TAP, Signal::TabItemTap(tap));
                Ok(())
            }
            HostEvent::ShareButton { context_id, payload } => {
                self.router.on_share(&context_id, &payload);
                Ok(())
            }
            HostEvent::AccountChange => {
                self.router.on_account_change();
                Ok(())
            }
            HostEvent::Login { payload } => {
                self.router.on_login(&payload);
                Ok(())
            }
            HostEvent::BackToHome { url, from } => {
                let top_uri = self.stack.top().map(|top| top.uri());
                if from != "menu" && top_uri.as_deref() == Some(url.as_str()) {
                    debug!(url, "already home");
                    return Ok(());
                }
                self.navigator.set_back_to_home(true);
                let _ = self.navigator.re_launch(Some(&format!("/{url}")), false).await?;
                Ok(())
            }
            HostEvent::ForceRelaunch { url } => {
                let url = url.map(|u| format!("/{}", u.trim_start_matches('/')));
                let _ = self.navigator.re_launch(url.as_deref(), true).await?;
                Ok(())
            }
        }
    }

    /// Resolve a project-relative resource path against the active page.
    pub fn asset_path(&self, path: &str) -> Result<String, PathError> {
        let root = self
            .navigator
            .config()
            .map(|config| config.app_root_path.clone())
            .unwrap_or_default();
        let front = self.stack.top().map(|top| top.front_uri()).unwrap_or_default();
        resolve_asset_path(&root, &front, path)
    }

    async fn on_app_ready(&self, ready: AppReadyEvent) -> Result<(), RuntimeError> {
        let mut config = AppConfig::from_json(&ready.app_config)?;
        if config.app_root_path.is_empty() {
            config.app_root_path.clone_from(&ready.app_path);
        }
        self.navigator.set_config(config.clone());
        info!(
            pages = config.pages.len(),
            sub_packages = config.sub_packages.len(),
            tabs = config.tabs().len(),
            "app ready"
        );
        self.navigator
            .push_init_handle(&ready.page_url, ready.context_id)
            .await?;

        if self.settings.preload.enabled {
            self.preload(&config).await;
        }
        Ok(())
    }

    async fn preload(&self, config: &AppConfig) {
        if config.preload_rule.is_empty() {
            return;
        }
        let network = match self.host.network_type().await {
            Ok(network) => network,
            Err(err) => {
                warn!(error = %err, "network type unavailable, skipping preload");
                return;
            }
        };
        for root in config.preload_roots(&network) {
            match self.host.load_sub_package(&root).await {
                Ok(()) => debug!(root = %root, network = %network, "sub-package preloaded"),
                Err(err) => warn!(root = %root, error = %err, "sub-package preload failed"),
            }
        }
    }
}

fn renderer_topic(message: &RendererMessage) -> &'static str {
    match message {
        RendererMessage::PageLoad { .. } => "onLoad",
        RendererMessage::Ability { .. } => "abilityMessage",
        RendererMessage::UserEvent { .. } => "event",
        RendererMessage::ComponentLifecycle { .. } => "customComponentLifecycle",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::RENDERER_TOPICS;

    #[test]
    fn renderer_topics_match_router_subscriptions() {
        let ctx = ContextId::from("1");
        let messages = [
            RendererMessage::PageLoad {
                context_id: ctx.clone(),
                uri: String::new(),
                query: Value::Null,
            },
            RendererMessage::Ability {
                context_id: ctx.clone(),
                kind: "rendered".into(),
                params: Value::Null,
            },
            RendererMessage::UserEvent {
                context_id: ctx.clone(),
                method: "tap".into(),
                event: Value::Null,
                component_id: None,
            },
            RendererMessage::ComponentLifecycle {
                context_id: ctx,
                component_id: "c".into(),
                lifetime: "attached".into(),
                params: Value::Null,
            },
        ];
        let topics: Vec<&str> = messages.iter().map(renderer_topic).collect();
        assert_eq!(topics, RENDERER_TOPICS.to_vec());
    }
}
