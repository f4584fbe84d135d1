//! Shared harness: an orchestrator over a simulated host with recording pages.

#![allow(dead_code)]

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Value, json};
use skiff_core::errors::HookResult;
use skiff_core::events::{
    AppReadyEvent, HostEvent, LifecycleKind, LifecycleSignal, RendererMessage, RouteEvent, RouteType,
    TabItemTap,
};
use skiff_core::ids::ContextId;
use skiff_runtime::{AppHooks, ComponentHooks, Orchestrator, PageHooks, PageNotFound, SimulatedHost};
use skiff_settings::SkiffSettings;

/// Every hook call, as `"<context> <hook>"`.
pub type HookLog = Arc<Mutex<Vec<String>>>;

pub struct RecordingPage {
    context_id: ContextId,
    log: HookLog,
    components: Vec<Arc<dyn ComponentHooks>>,
}

impl RecordingPage {
    fn record(&self, hook: &str) -> HookResult {
        self.log.lock().push(format!("{} {hook}", self.context_id));
        Ok(())
    }
}

impl PageHooks for RecordingPage {
    fn on_load(&self, query: &Value) -> HookResult {
        self.record(&format!("onLoad{query}"))
    }

    fn on_ready(&self) -> HookResult {
        self.record("onReady")
    }

    fn on_show(&self, _event: &Value) -> HookResult {
        self.record("onShow")
    }

    fn on_hide(&self, _event: &Value) -> HookResult {
        self.record("onHide")
    }

    fn on_unload(&self) -> HookResult {
        self.record("onUnload")
    }

    fn on_tab_item_tap(&self, tap: &TabItemTap) -> HookResult {
        self.record(&format!("onTabItemTap#{}", tap.index))
    }

    fn on_share(&self, _event: &Value, source: &str) -> HookResult {
        self.record(&format!("onShare:{source}"))
    }

    fn call_method(&self, method: &str, _args: &Value) -> HookResult {
        self.record(&format!("method:{method}"))
    }

    fn components(&self) -> Vec<Arc<dyn ComponentHooks>> {
        self.components.clone()
    }
}

pub struct RecordingComponent {
    id: String,
    context_id: ContextId,
    log: HookLog,
}

impl RecordingComponent {
    fn record(&self, hook: &str) -> HookResult {
        self.log
            .lock()
            .push(format!("{} {}.{hook}", self.context_id, self.id));
        Ok(())
    }
}

impl ComponentHooks for RecordingComponent {
    fn id(&self) -> &str {
        &self.id
    }

    fn lifetime(&self, name: &str, _params: &Value) -> HookResult {
        self.record(name)
    }

    fn page_show(&self, _event: &Value) -> HookResult {
        self.record("pageShow")
    }

    fn page_hide(&self, _event: &Value) -> HookResult {
        self.record("pageHide")
    }

    fn call_method(&self, method: &str, _event: &Value) -> HookResult {
        self.record(&format!("method:{method}"))
    }
}

#[derive(Default)]
pub struct RecordingApp {
    pub events: Mutex<Vec<String>>,
    pub not_found: Mutex<Vec<PageNotFound>>,
}

impl AppHooks for RecordingApp {
    fn on_launch(&self, _options: &Value) -> HookResult {
        self.events.lock().push("onLaunch".into());
        Ok(())
    }

    fn on_show(&self, _event: &Value) -> HookResult {
        self.events.lock().push("onAppShow".into());
        Ok(())
    }

    fn on_hide(&self, _event: &Value) -> HookResult {
        self.events.lock().push("onAppHide".into());
        Ok(())
    }

    fn on_page_not_found(&self, event: &PageNotFound) -> HookResult {
        self.not_found.lock().push(event.clone());
        Ok(())
    }

    fn on_login(&self, _event: &Value) -> HookResult {
        self.events.lock().push("onLogin".into());
        Ok(())
    }
}

pub struct Harness {
    pub orch: Arc<Orchestrator>,
    pub sim: Arc<SimulatedHost>,
    pub app: Arc<RecordingApp>,
    pub log: HookLog,
}

pub const PAGES: [&str; 5] = [
    "pages/index/index",
    "pages/detail/detail",
    "pages/list/list",
    "pages/home/home",
    "pages/me/me",
];

pub fn plain_config() -> Value {
    json!({
        "pages": ["pages/index/index", "pages/detail/detail", "pages/list/list"],
    })
}

pub fn tab_config() -> Value {
    json!({
        "pages": ["pages/home/home", "pages/me/me", "pages/detail/detail"],
        "tabBar": {"list": [
            {"pagePath": "pages/home/home", "text": "Home"},
            {"pagePath": "pages/me/me", "text": "Me"},
        ]},
    })
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(SkiffSettings::default())
    }

    pub fn with_settings(settings: SkiffSettings) -> Self {
        let sim = Arc::new(SimulatedHost::new());
        let orch = Arc::new(Orchestrator::new(sim.clone(), settings));
        let log: HookLog = Arc::new(Mutex::new(Vec::new()));
        for route in PAGES {
            let log = Arc::clone(&log);
            orch.register_page(route, move |ctx| {
                let component: Arc<dyn ComponentHooks> = Arc::new(RecordingComponent {
                    id: "counter".into(),
                    context_id: ctx.context_id.clone(),
                    log: Arc::clone(&log),
                });
                Arc::new(RecordingPage {
                    context_id: ctx.context_id.clone(),
                    log: Arc::clone(&log),
                    components: vec![component],
                })
            });
        }
        let app = Arc::new(RecordingApp::default());
        orch.set_app(app.clone(), &json!({"scene": 1001}));
        Self { orch, sim, app, log }
    }

    /// Deliver `AppReady` for `entry`; returns the entry context.
    pub async fn boot(&self, config: &Value, entry: &str) -> ContextId {
        let context_id = self.sim.reserve_context();
        self.host(HostEvent::AppReady(AppReadyEvent {
            app_config: config.to_string(),
            app_path: "/apps/demo".into(),
            page_url: entry.into(),
            context_id: context_id.clone(),
        }))
        .await;
        context_id
    }

    pub async fn host(&self, event: HostEvent) {
        self.orch.handle_host_event(event).await.unwrap();
    }

    pub fn renderer(&self, message: RendererMessage) {
        self.orch.handle_renderer_message(message);
    }

    pub fn load(&self, context_id: &ContextId) {
        let uri = self
            .orch
            .current_pages()
            .into_iter()
            .find(|p| p.context_id.as_ref() == Some(context_id))
            .map(|p| p.uri)
            .unwrap_or_default();
        self.renderer(RendererMessage::PageLoad {
            context_id: context_id.clone(),
            uri,
            query: Value::Null,
        });
    }

    pub fn render(&self, context_id: &ContextId) {
        self.renderer(RendererMessage::Ability {
            context_id: context_id.clone(),
            kind: "rendered".into(),
            params: Value::Null,
        });
    }

    pub async fn show(&self, context_id: &ContextId) {
        self.lifecycle(LifecycleKind::OnShow, Some(context_id)).await;
    }

    pub async fn hide(&self, context_id: &ContextId) {
        self.lifecycle(LifecycleKind::OnHide, Some(context_id)).await;
    }

    pub async fn lifecycle(&self, kind: LifecycleKind, context_id: Option<&ContextId>) {
        self.host(HostEvent::Lifecycle(LifecycleSignal {
            kind,
            context_id: context_id.cloned(),
            payload: json!({}),
        }))
        .await;
    }

    /// Load, render and show: the full happy path of one page.
    pub async fn settle(&self, context_id: &ContextId) {
        self.load(context_id);
        self.render(context_id);
        self.show(context_id).await;
    }

    pub async fn route(&self, route_type: RouteType, from: &ContextId, to: &ContextId) {
        self.host(HostEvent::Route(RouteEvent {
            route_type,
            from_id: Some(from.clone()),
            to_id: Some(to.clone()),
            to_page: None,
            to_tab_index: None,
        }))
        .await;
    }

    /// Hooks seen by `context_id`, in order.
    pub fn hooks_of(&self, context_id: &ContextId) -> Vec<String> {
        let prefix = format!("{context_id} ");
        self.log
            .lock()
            .iter()
            .filter_map(|line| line.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    /// Hook names only, with the `onLoad` query stripped.
    pub fn hook_names(&self, context_id: &ContextId) -> Vec<String> {
        self.hooks_of(context_id)
            .into_iter()
            .map(|h| if h.starts_with("onLoad") { "onLoad".to_string() } else { h })
            .filter(|h| !h.starts_with("counter."))
            .collect()
    }

    pub fn stack_ids(&self) -> Vec<ContextId> {
        self.orch
            .current_pages()
            .into_iter()
            .filter_map(|p| p.context_id)
            .collect()
    }

    pub fn stack_uris(&self) -> Vec<String> {
        self.orch.current_pages().into_iter().map(|p| p.uri).collect()
    }
}

pub fn ctx(raw: u64) -> ContextId {
    ContextId::from(raw)
}
