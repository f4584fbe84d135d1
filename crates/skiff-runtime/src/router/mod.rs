//! Lifecycle router: the only place user page, component and app hooks run.
//!
//! Renderer messages and host lifecycle events arrive on buses; the router
//! turns them into ordered hook calls on the page that owns the context.
//! Show-after-load is enforced per context by a [`ShowGate`]; tab taps that
//! arrive before their page exists are buffered by `(index, page_path)`.

mod show_gate;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use skiff_bus::{EventBus, SubscribeOptions};
use skiff_core::events::{LifecycleKind, LifecycleSignal, RendererMessage, TabItemTap};
use skiff_core::ids::ContextId;
use skiff_core::path::{front_uri, parse_query, split_uri};
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use self::show_gate::{ShowDecision, ShowGate};
use crate::handle::{SimpleHandle, Target};
use crate::hooks::{AppHooks, NoopApp, PageContext, PageHooks, PageNotFound, PageRegistry, run_hook};
use crate::signals::{Signal, topics};
use crate::stack::NavigationStack;

/// Renderer message types the router listens to on the communicator bus.
pub const RENDERER_TOPICS: [&str; 4] = ["onLoad", "abilityMessage", "event", "customComponentLifecycle"];

const LIFECYCLE_KINDS: [LifecycleKind; 5] = [
    LifecycleKind::OnShow,
    LifecycleKind::OnHide,
    LifecycleKind::OnAppShow,
    LifecycleKind::OnAppHide,
    LifecycleKind::OnAppError,
];

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct TabKey {
    index: usize,
    page_path: String,
}

impl TabKey {
    fn of(tap: &TabItemTap) -> Self {
        Self {
            index: tap.index,
            page_path: front_uri(&tap.page_path).to_string(),
        }
    }
}

/// Routes lifecycle traffic to user hooks.
pub struct LifecycleRouter {
    inner: Arc<RouterInner>,
}

struct RouterInner {
    stack: Arc<NavigationStack>,
    registry: Arc<PageRegistry>,
    signals: EventBus<Signal>,
    app: RwLock<Arc<dyn AppHooks>>,
    gates: Mutex<HashMap<ContextId, ShowGate>>,
    pending_taps: Mutex<HashMap<TabKey, Vec<TabItemTap>>>,
    ready_taps: Mutex<HashMap<ContextId, Vec<TabItemTap>>>,
    show_fallback: Duration,
    generation: AtomicU64,
}

impl LifecycleRouter {
    /// Router over `stack`; call [`attach`](Self::attach) to start routing.
    pub fn new(
        stack: Arc<NavigationStack>,
        registry: Arc<PageRegistry>,
        signals: EventBus<Signal>,
        show_fallback: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(RouterInner {
                stack,
                registry,
                signals,
                app: RwLock::new(Arc::new(NoopApp)),
                gates: Mutex::new(HashMap::new()),
                pending_taps: Mutex::new(HashMap::new()),
                ready_taps: Mutex::new(HashMap::new()),
                show_fallback,
                generation: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribe to the renderer, lifecycle and signal buses.
    pub fn attach(&self, communicator: &EventBus<Signal>, lifecycle: &EventBus<Signal>) {
        for topic in RENDERER_TOPICS {
            self.route(communicator, topic, |inner, signal| {
                if let Signal::Renderer(message) = signal {
                    inner.on_renderer(message);
                }
            });
        }
        for kind in LIFECYCLE_KINDS {
            self.route(lifecycle, kind.as_str(), |inner, signal| {
                if let Signal::HostLifecycle(event) = signal {
                    inner.on_lifecycle(event);
                }
            });
        }

        let signals = self.inner.signals.clone();
        self.route(&signals, topics::PAGE_UNLOADED, |inner, signal| {
            if let Signal::PageUnloaded { context_id, uri, page } = signal {
                inner.on_page_unloaded(context_id, uri, page.as_ref());
            }
        });
        self.route(&signals, topics::REGISTERED, |inner, signal| {
            if let Signal::Registered {
                context_id,
                uri,
                tab_index: Some(index),
            } = signal
            {
                inner.on_registered(context_id, uri, *index);
            }
        });
        self.route(&signals, topics::TAB_ITEM_TAP, |inner, signal| {
            if let Signal::TabItemTap(tap) = signal {
                inner.on_tab_item_tap(tap.clone());
            }
        });
        self.route(&signals, topics::PAGE_NOT_FOUND, |inner, signal| {
            if let Signal::PageNotFound(event) = signal {
                inner.on_page_not_found(event);
            }
        });
    }

    fn route<F>(&self, bus: &EventBus<Signal>, topic: &str, f: F)
    where
        F: Fn(&Arc<RouterInner>, &Signal) + Send + Sync + 'static,
    {
        let weak: Weak<RouterInner> = Arc::downgrade(&self.inner);
        let _ = bus.subscribe(topic, SubscribeOptions::live(), move |signal| {
            if let Some(inner) = weak.upgrade() {
                f(&inner, signal);
            }
        });
    }

    /// Install the app hooks and fire `on_launch`.
    pub fn set_app(&self, hooks: Arc<dyn AppHooks>, options: &Value) {
        *self.inner.app.write() = Arc::clone(&hooks);
        let _ = run_hook("onLaunch", None, || hooks.on_launch(options));
    }

    /// Share button of the page menu.
    pub fn on_share(&self, context_id: &ContextId, payload: &Value) {
        let Some(page) = self.inner.page_of(context_id) else {
            warn!(context_id = %context_id, "share for unknown page");
            return;
        };
        let _ = run_hook("onShareAppMessage", Some(context_id), || page.on_share(payload, "menu"));
    }

    /// Broadcast an account change to every loaded page.
    pub fn on_account_change(&self) {
        let mut pages: Vec<(Option<ContextId>, Arc<dyn PageHooks>)> = Vec::new();
        self.inner.stack.each(true, |handle| {
            let leaf = handle.leaf();
            if let Some(page) = leaf.page() {
                pages.push((leaf.context_id(), page));
            }
        });
        for (context_id, page) in pages {
            let _ = run_hook("accountChange", context_id.as_ref(), || {
                page.call_method("accountChange", &Value::Null)
            });
        }
    }

    /// Login state reported by the host.
    pub fn on_login(&self, payload: &Value) {
        let app = self.inner.app();
        let _ = run_hook("onLogin", None, || app.on_login(payload));
    }

    /// Contexts with a live show gate, for diagnostics.
    pub fn gated_contexts(&self) -> usize {
        self.inner.gates.lock().len()
    }
}

impl RouterInner {
    fn app(&self) -> Arc<dyn AppHooks> {
        Arc::clone(&self.app.read())
    }

    fn leaf_of(&self, context_id: &ContextId) -> Option<Arc<SimpleHandle>> {
        self.stack
            .seek(&Target::Context(context_id.clone()), false)
            .map(|handle| handle.leaf())
    }

    fn page_of(&self, context_id: &ContextId) -> Option<Arc<dyn PageHooks>> {
        self.leaf_of(context_id).and_then(|leaf| leaf.page())
    }

    fn on_renderer(self: &Arc<Self>, message: &RendererMessage) {
        match message {
            RendererMessage::PageLoad { context_id, uri, query } => self.on_page_load(context_id, uri, query),
            RendererMessage::Ability { context_id, .. } if message.is_render_ack() => self.on_rendered(context_id),
            RendererMessage::Ability {
                context_id,
                kind,
                params,
            } => {
                let Some(page) = self.page_of(context_id) else {
                    warn!(context_id = %context_id, kind, "ability message for unknown page");
                    return;
                };
                let _ = run_hook(kind, Some(context_id), || page.call_method(kind, params));
            }
            RendererMessage::UserEvent {
                context_id,
                method,
                event,
                component_id,
            } => {
                let Some(page) = self.page_of(context_id) else {
                    warn!(context_id = %context_id, method, "event for unknown page");
                    return;
                };
                match component_id {
                    Some(id) => match page.components().into_iter().find(|c| c.id() == id) {
                        Some(component) => {
                            let _ = run_hook(method, Some(context_id), || component.call_method(method, event));
                        }
                        None => warn!(context_id = %context_id, component_id = %id, "event for unknown component"),
                    },
                    None => {
                        let _ = run_hook(method, Some(context_id), || page.call_method(method, event));
                    }
                }
            }
            RendererMessage::ComponentLifecycle {
                context_id,
                component_id,
                lifetime,
                params,
            } => {
                let component = self
                    .page_of(context_id)
                    .and_then(|page| page.components().into_iter().find(|c| c.id() == component_id));
                match component {
                    Some(component) => {
                        let _ = run_hook(lifetime, Some(context_id), || component.lifetime(lifetime, params));
                    }
                    None => debug!(context_id = %context_id, component_id, lifetime, "component not found"),
                }
            }
        }
    }

    fn on_page_load(self: &Arc<Self>, context_id: &ContextId, uri: &str, query: &Value) {
        let Some(leaf) = self.leaf_of(context_id) else {
            warn!(context_id = %context_id, uri, "onLoad for a context not on the stack");
            return;
        };
        let uri = if uri.is_empty() { leaf.uri() } else { uri.to_string() };
        let page = self.registry.instantiate(&PageContext {
            context_id: context_id.clone(),
            uri: uri.clone(),
        });
        leaf.attach_page(Arc::clone(&page));
        leaf.wrap_on_load_to_show();

        let query = if query.is_null() { query_of(&uri) } else { query.clone() };
        let _ = run_hook("onLoad", Some(context_id), || page.on_load(&query));

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let timer = self.start_fallback(context_id.clone(), generation);
        let previous = {
            let mut gates = self.gates.lock();
            let buffered = gates.get_mut(context_id).and_then(ShowGate::take_buffered);
            gates.insert(context_id.clone(), ShowGate::loaded(generation, timer, buffered))
        };
        drop(previous);
        debug!(context_id = %context_id, uri = %uri, generation, "page loaded");

        let taps = self.ready_taps.lock().remove(context_id).unwrap_or_default();
        for tap in taps {
            let _ = run_hook("onTabItemTap", Some(context_id), || page.on_tab_item_tap(&tap));
        }
    }

    fn start_fallback(self: &Arc<Self>, context_id: ContextId, generation: u64) -> Option<JoinHandle<()>> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(context_id = %context_id, "no async runtime, show fallback disabled");
            return None;
        };
        let weak = Arc::downgrade(self);
        let delay = self.show_fallback;
        Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(inner) = weak.upgrade() {
                inner.on_show_timeout(&context_id, generation);
            }
        }))
    }

    fn on_rendered(&self, context_id: &ContextId) {
        let buffered = self
            .gates
            .lock()
            .get_mut(context_id)
            .and_then(ShowGate::on_render_ack);
        let Some(leaf) = self.leaf_of(context_id) else {
            debug!(context_id = %context_id, "render ack for a context not on the stack");
            return;
        };
        if leaf.status().ready_suppressed {
            debug!(context_id = %context_id, "onReady suppressed");
        } else if let Some(page) = leaf.page() {
            let _ = run_hook("onReady", Some(context_id), || page.on_ready());
        }
        leaf.set_load_to_ready(false);
        let _ = self.signals.publish(
            &topics::rendered(context_id),
            Signal::Rendered {
                context_id: context_id.clone(),
            },
        );
        if let Some(event) = buffered {
            self.deliver_show(&leaf, context_id, &event);
        }
    }

    fn on_show_timeout(&self, context_id: &ContextId, generation: u64) {
        let forced = self
            .gates
            .lock()
            .get_mut(context_id)
            .and_then(|gate| gate.on_timeout(generation));
        let Some(event) = forced else {
            return;
        };
        let Some(leaf) = self.leaf_of(context_id) else {
            return;
        };
        warn!(context_id = %context_id, fallback = ?self.show_fallback, "render ack late, forcing onShow");
        self.deliver_show(&leaf, context_id, &event);
    }

    fn on_lifecycle(&self, event: &LifecycleSignal) {
        if event.kind.is_app_event() {
            let app = self.app();
            let _ = match event.kind {
                LifecycleKind::OnAppShow => run_hook("onAppShow", None, || app.on_show(&event.payload)),
                LifecycleKind::OnAppHide => run_hook("onAppHide", None, || app.on_hide(&event.payload)),
                _ => run_hook("onAppError", None, || app.on_error(&event.payload)),
            };
            return;
        }

        let Some(context_id) = event.context_id.clone().or_else(|| self.stack.current_context_id()) else {
            debug!(kind = event.kind.as_str(), "page lifecycle before any page exists");
            return;
        };
        match event.kind {
            LifecycleKind::OnShow => self.on_host_show(&context_id, event.payload.clone()),
            _ => self.on_host_hide(&context_id, &event.payload),
        }
    }

    fn on_host_show(&self, context_id: &ContextId, event: Value) {
        let decision = self
            .gates
            .lock()
            .entry(context_id.clone())
            .or_insert_with(ShowGate::awaiting_load)
            .on_host_show(event);
        match decision {
            ShowDecision::Deliver(event) => match self.leaf_of(context_id) {
                Some(leaf) => self.deliver_show(&leaf, context_id, &event),
                None => debug!(context_id = %context_id, "onShow for a context not on the stack"),
            },
            ShowDecision::Buffer => debug!(context_id = %context_id, "onShow buffered until render"),
            ShowDecision::Absorb => debug!(context_id = %context_id, "duplicate onShow absorbed"),
        }
    }

    fn deliver_show(&self, leaf: &SimpleHandle, context_id: &ContextId, event: &Value) {
        if let Some(gate) = self.gates.lock().get_mut(context_id) {
            gate.shown();
            trace!(context_id = %context_id, state = ?gate.state(), "show gate open");
        }
        if let Some(page) = leaf.page() {
            let _ = run_hook("onShow", Some(context_id), || page.on_show(event));
            for component in page.components() {
                let _ = run_hook("pageShow", Some(context_id), || component.page_show(event));
            }
        }
        leaf.unwrap_on_load_to_show();
        let _ = self.signals.publish(
            &topics::showed(context_id),
            Signal::Showed {
                context_id: context_id.clone(),
            },
        );
    }

    fn on_host_hide(&self, context_id: &ContextId, event: &Value) {
        if let Some(gate) = self.gates.lock().get_mut(context_id) {
            gate.on_hide();
        }
        let Some(page) = self.page_of(context_id) else {
            return;
        };
        let _ = run_hook("onHide", Some(context_id), || page.on_hide(event));
        for component in page.components() {
            let _ = run_hook("pageHide", Some(context_id), || component.page_hide(event));
        }
    }

    fn on_page_unloaded(&self, context_id: &ContextId, uri: &str, page: Option<&Arc<dyn PageHooks>>) {
        if let Some(page) = page {
            let _ = run_hook("onUnload", Some(context_id), || page.on_unload());
        }
        let gate = self.gates.lock().remove(context_id);
        drop(gate);
        let _ = self.ready_taps.lock().remove(context_id);
        self.signals.forget(&topics::rendered(context_id));
        self.signals.forget(&topics::showed(context_id));
        debug!(context_id = %context_id, uri, "page unloaded");
    }

    fn on_registered(&self, context_id: &ContextId, uri: &str, index: usize) {
        let key = TabKey {
            index,
            page_path: front_uri(uri).to_string(),
        };
        let taps = self.pending_taps.lock().remove(&key).unwrap_or_default();
        if !taps.is_empty() {
            debug!(context_id = %context_id, index, replayed = taps.len(), "replaying buffered tab taps");
        }
        for tap in taps {
            self.deliver_tap(context_id, tap);
        }
    }

    fn on_tab_item_tap(&self, tap: TabItemTap) {
        let target = tap
            .context_id
            .clone()
            .filter(|id| self.leaf_of(id).is_some())
            .or_else(|| self.tab_context(&tap));
        match target {
            Some(context_id) => self.deliver_tap(&context_id, tap),
            None => {
                debug!(index = tap.index, page_path = %tap.page_path, "tab tap buffered until its page registers");
                self.pending_taps.lock().entry(TabKey::of(&tap)).or_default().push(tap);
            }
        }
    }

    /// Context of the tab page matching `tap`, if it has one.
    fn tab_context(&self, tap: &TabItemTap) -> Option<ContextId> {
        let path = front_uri(&tap.page_path);
        let mut found = None;
        self.stack.each(true, |handle| {
            let leaf = handle.leaf();
            if found.is_none() && leaf.tab_index() == Some(tap.index) && leaf.front_uri() == path {
                found = leaf.context_id();
            }
        });
        found
    }

    fn deliver_tap(&self, context_id: &ContextId, tap: TabItemTap) {
        match self.page_of(context_id) {
            Some(page) => {
                let _ = run_hook("onTabItemTap", Some(context_id), || page.on_tab_item_tap(&tap));
            }
            None => self.ready_taps.lock().entry(context_id.clone()).or_default().push(tap),
        }
    }

    fn on_page_not_found(&self, event: &PageNotFound) {
        let app = self.app();
        let _ = run_hook("onPageNotFound", None, || app.on_page_not_found(event));
    }
}

fn query_of(uri: &str) -> Value {
    let query = split_uri(uri).1.map(parse_query).unwrap_or_default();
    Value::Object(query.into_iter().map(|(k, v)| (k, Value::String(v))).collect::<Map<String, Value>>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_is_parsed_from_uri() {
        assert_eq!(query_of("pages/a/a?id=3&x"), json!({"id": "3", "x": ""}));
        assert_eq!(query_of("pages/a/a"), json!({}));
    }

    #[test]
    fn tab_key_ignores_query() {
        let tap = TabItemTap {
            context_id: None,
            index: 1,
            page_path: "pages/home?x=1".into(),
            text: String::new(),
            from: None,
        };
        assert_eq!(
            TabKey::of(&tap),
            TabKey {
                index: 1,
                page_path: "pages/home".into()
            }
        );
    }
}
