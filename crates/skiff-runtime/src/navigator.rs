//! Transition controller.
//!
//! Stack-mutating steps run under one async gate. A transition that has to
//! wait for a completion signal of the current top (`rendered` or `onShowed`)
//! subscribes first, checks the flag second, and parks without holding the
//! gate. A waiter whose sender is dropped (context unloaded) proceeds.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock};
use skiff_bus::EventBus;
use skiff_core::config::AppConfig;
use skiff_core::errors::NavigationError;
use skiff_core::events::{RouteEvent, RouteType, TransitionRequest};
use skiff_core::ids::{ContextId, TransitionId};
use skiff_core::path::{resolve_relative, split_uri};
use tokio::sync::MutexGuard;
use tracing::{debug, info, instrument, warn};

use crate::handle::{RendererHandle, SimpleHandle, TabGroupHandle, Target};
use crate::hooks::{PageNotFound, PageRegistry};
use crate::host::{HostBridge, OpenVerb};
use crate::signals::{Signal, topics};
use crate::stack::NavigationStack;

/// Implements the navigation verbs on top of a [`NavigationStack`].
pub struct Navigator {
    host: Arc<dyn HostBridge>,
    stack: Arc<NavigationStack>,
    signals: EventBus<Signal>,
    registry: Arc<PageRegistry>,
    config: RwLock<Option<Arc<AppConfig>>>,
    init_handle: Mutex<Option<RendererHandle>>,
    gate: tokio::sync::Mutex<()>,
    back_to_home: AtomicBool,
}

impl Navigator {
    /// Navigator with no route config yet.
    pub fn new(
        host: Arc<dyn HostBridge>,
        stack: Arc<NavigationStack>,
        signals: EventBus<Signal>,
        registry: Arc<PageRegistry>,
    ) -> Self {
        Self {
            host,
            stack,
            signals,
            registry,
            config: RwLock::new(None),
            init_handle: Mutex::new(None),
            gate: tokio::sync::Mutex::new(()),
            back_to_home: AtomicBool::new(false),
        }
    }

    /// Install the route config delivered by `AppReady`.
    pub fn set_config(&self, config: AppConfig) {
        *self.config.write() = Some(Arc::new(config));
    }

    /// Route config, once loaded.
    pub fn config(&self) -> Option<Arc<AppConfig>> {
        self.config.read().clone()
    }

    /// Stack this navigator mutates.
    pub fn stack(&self) -> &Arc<NavigationStack> {
        &self.stack
    }

    /// Bottom handle created at cold start or by the last relaunch.
    pub fn init_handle(&self) -> Option<RendererHandle> {
        self.init_handle.lock().clone()
    }

    /// Whether the last relaunch came from the back-to-home button.
    pub fn back_to_home(&self) -> bool {
        self.back_to_home.load(Ordering::Relaxed)
    }

    /// Set the back-to-home marker.
    pub fn set_back_to_home(&self, value: bool) {
        self.back_to_home.store(value, Ordering::Relaxed);
    }

    /// Run one request.
    pub async fn dispatch(&self, request: TransitionRequest) -> Result<Option<ContextId>, NavigationError> {
        match request {
            TransitionRequest::NavigateTo { url } => self.navigate_to(&url).await.map(Some),
            TransitionRequest::RedirectTo { url } => self.redirect_to(&url).await.map(Some),
            TransitionRequest::SwitchTab { url } => self.switch_tab(&url).await.map(Some),
            TransitionRequest::ReLaunch { url, forced } => {
                self.re_launch(url.as_deref(), forced).await.map(Some)
            }
            TransitionRequest::NavigateBack { delta } => self.navigate_back(delta).await.map(|()| None),
        }
    }

    /// Create the entry page for a context the host already opened.
    #[instrument(skip(self), fields(transition = %TransitionId::new()))]
    pub async fn push_init_handle(&self, page_url: &str, context_id: ContextId) -> Result<(), NavigationError> {
        let config = self.require_config()?;
        let url = page_url.trim_start_matches('/');
        if !self.exists(&config, url) {
            self.report_not_found(url, true);
        }

        let _gate = self.gate.lock().await;
        let handle = self.create_initial_handle(&config, url);
        handle.init(context_id);
        self.stack.push(handle.clone());
        *self.init_handle.lock() = Some(handle.clone());
        handle.on_enqueue();
        info!(uri = url, tab_group = handle.is_composite(), "entry page created");
        Ok(())
    }

    /// Push a new page.
    #[instrument(skip(self), fields(verb = "navigateTo", transition = %TransitionId::new()))]
    pub async fn navigate_to(&self, url: &str) -> Result<ContextId, NavigationError> {
        let config = self.require_config()?;
        let resolved = self.resolve(url)?;
        self.ensure_exists(&config, &resolved)?;

        let _gate = self.gate_after_render().await;
        let handle = RendererHandle::Simple(Arc::new(SimpleHandle::new(
            resolved.clone(),
            None,
            Arc::clone(&self.host),
            self.signals.clone(),
        )));
        let context_id = handle
            .open(OpenVerb::NavigateTo)
            .await
            .map_err(NavigationError::ContextCreation)?;
        if let Some(top) = self.stack.top() {
            top.hide();
        }
        self.stack.push(handle.clone());
        handle.on_enqueue();
        info!(uri = %resolved, context_id = %context_id, "page pushed");
        Ok(context_id)
    }

    /// Replace the active page in place.
    #[instrument(skip(self), fields(verb = "redirectTo", transition = %TransitionId::new()))]
    pub async fn redirect_to(&self, url: &str) -> Result<ContextId, NavigationError> {
        let config = self.require_config()?;
        let resolved = self.resolve(url)?;
        self.ensure_exists(&config, &resolved)?;

        let _gate = self.gate_after_show().await;
        let top = self.stack.top_non_closing().ok_or(NavigationError::NoActivePage)?;
        let context_id = match &top {
            RendererHandle::Simple(handle) => handle
                .redirect(&resolved)
                .await
                .map_err(NavigationError::ContextCreation)?,
            RendererHandle::Composite(group) => {
                let replacement = SimpleHandle::new(
                    resolved.clone(),
                    None,
                    Arc::clone(&self.host),
                    self.signals.clone(),
                );
                if let Some(context_id) = group.current().context_id() {
                    replacement.seed_context(context_id);
                }
                let replacement = RendererHandle::Simple(Arc::new(replacement));
                let context_id = replacement
                    .open(OpenVerb::RedirectTo)
                    .await
                    .map_err(NavigationError::ContextCreation)?;
                let _ = self.stack.replace_top(replacement.clone());
                if self.is_init(&top) {
                    *self.init_handle.lock() = Some(replacement.clone());
                }
                replacement.on_enqueue();
                context_id
            }
        };
        info!(uri = %resolved, context_id = %context_id, "page redirected");
        Ok(context_id)
    }

    /// Show a tab of the tab group, popping everything above it.
    #[instrument(skip(self), fields(verb = "switchTab", transition = %TransitionId::new()))]
    pub async fn switch_tab(&self, url: &str) -> Result<ContextId, NavigationError> {
        let config = self.require_config()?;
        let resolved = self.resolve(url)?;
        let index = config
            .tab_index_of(&resolved)
            .ok_or_else(|| NavigationError::NotATab { path: resolved.clone() })?;

        let group = match self.init_handle() {
            Some(RendererHandle::Composite(group)) if self.stack.has(&Target::Handle(group.id().clone())) => group,
            _ if config.opens_tab_group(&resolved) => {
                debug!(uri = %resolved, "no tab group on the stack, relaunching into one");
                return self.re_launch(Some(&format!("/{resolved}")), true).await;
            }
            _ => return Err(NavigationError::NotATab { path: resolved }),
        };

        let _gate = self.gate.lock().await;
        let context_id = group.switch_to_index(index).await?;
        let popped = self.stack.pop_until(&Target::Handle(group.id().clone()), |h| {
            debug!(uri = %h.uri(), "popped by switchTab");
        });
        info!(index, popped, context_id = %context_id, "tab switched");
        Ok(context_id)
    }

    /// Reset the stack to one page; `url` defaults to the active page.
    #[instrument(skip(self), fields(verb = "reLaunch", transition = %TransitionId::new()))]
    pub async fn re_launch(&self, url: Option<&str>, forced: bool) -> Result<ContextId, NavigationError> {
        let config = self.require_config()?;
        let resolved = match url {
            Some(url) => self.resolve(url)?,
            None => self
                .stack
                .top()
                .map(|top| top.front_uri())
                .ok_or(NavigationError::NoActivePage)?,
        };
        self.ensure_exists(&config, &resolved)?;

        let _gate = if forced {
            self.gate.lock().await
        } else {
            self.gate_after_show().await
        };

        let context_id = match self.stack.seek(&Target::Uri(resolved.clone()), true) {
            Some(found) => {
                let context_id = found
                    .relaunch(&resolved)
                    .await
                    .map_err(NavigationError::ContextCreation)?;
                if let Some(top) = self.stack.top().filter(|top| !top.same_as(&found)) {
                    top.hide();
                }
                let _ = self.stack.clear_except(&found);
                self.adopt_root(found);
                context_id
            }
            None => {
                let fresh = self.create_initial_handle(&config, &resolved);
                let context_id = fresh
                    .open(OpenVerb::ReLaunch)
                    .await
                    .map_err(NavigationError::ContextCreation)?;
                if let Some(top) = self.stack.top() {
                    top.hide();
                }
                self.stack.clear();
                self.install_root(fresh);
                context_id
            }
        };
        info!(uri = %resolved, context_id = %context_id, forced, "relaunched");
        Ok(context_id)
    }

    /// Ask the host to pop `delta` pages.
    ///
    /// The stack itself is updated when the host reports the route change.
    #[instrument(skip(self), fields(verb = "navigateBack"))]
    pub async fn navigate_back(&self, delta: usize) -> Result<(), NavigationError> {
        let top = self.stack.top().ok_or(NavigationError::NoActivePage)?;
        let landing = self
            .stack
            .top_n(delta.min(self.stack.len().saturating_sub(1)))
            .map(|h| h.uri());
        debug!(delta, landing = ?landing, "asking host to pop");
        let leaf = top.leaf();
        leaf.set_closing(true);
        let result = self.host.navigate_back(delta).await;
        leaf.set_closing(false);
        result.map_err(|err| {
            warn!(delta, error = %err, "navigateBack rejected");
            NavigationError::Host(err)
        })
    }

    /// Reconcile the stack with a route change the host performed.
    #[instrument(skip(self, route), fields(route_type = ?route.route_type))]
    pub async fn on_route(&self, route: &RouteEvent) {
        match route.route_type {
            RouteType::NavigateBack => {
                let Some(to_id) = route.to_id.clone() else {
                    warn!("navigateBack route without target context");
                    return;
                };
                let _gate = self.gate.lock().await;
                if !self.stack.has(&Target::Context(to_id.clone())) {
                    warn!(to_id = %to_id, "navigateBack target not on the stack");
                    return;
                }
                if let Some(top) = self.stack.top() {
                    top.hide();
                }
                let popped = self.stack.pop_until(&Target::Context(to_id.clone()), |h| {
                    debug!(uri = %h.uri(), "popped by navigateBack");
                });
                if let Some(top) = self.stack.top() {
                    top.show();
                }
                debug!(to_id = %to_id, popped, "back navigation reconciled");
            }
            RouteType::SwitchTab => {
                let _gate = self.gate.lock().await;
                let Some(RendererHandle::Composite(group)) = self.init_handle() else {
                    warn!("switchTab route without a tab group");
                    return;
                };
                if let Some(tap) = group.on_switch_tab(route) {
                    let _ = self.signals.publish(topics::TAB_ITEM_TAP, Signal::TabItemTap(tap));
                }
            }
            RouteType::Init | RouteType::NavigateTo | RouteType::RedirectTo | RouteType::ReLaunch => {
                debug!("route bookkeeping only");
            }
        }
    }

    fn require_config(&self) -> Result<Arc<AppConfig>, NavigationError> {
        self.config().ok_or(NavigationError::NotConfigured)
    }

    fn resolve(&self, url: &str) -> Result<String, NavigationError> {
        let base = self.stack.top().map(|top| top.uri()).unwrap_or_default();
        resolve_relative(&base, url).map_err(|source| {
            warn!(url, error = %source, "path resolution failed");
            NavigationError::Resolution {
                path: url.to_string(),
                source,
            }
        })
    }

    fn exists(&self, config: &AppConfig, url: &str) -> bool {
        config.declares(url) || self.registry.contains(url)
    }

    fn ensure_exists(&self, config: &AppConfig, url: &str) -> Result<(), NavigationError> {
        if self.exists(config, url) {
            return Ok(());
        }
        self.report_not_found(url, false);
        Err(NavigationError::RouteNotFound {
            path: split_uri(url).0.to_string(),
        })
    }

    fn report_not_found(&self, url: &str, is_entry_page: bool) {
        let (page, query) = split_uri(url);
        warn!(page, is_entry_page, "page not found");
        let _ = self.signals.publish(
            topics::PAGE_NOT_FOUND,
            Signal::PageNotFound(PageNotFound {
                page: page.to_string(),
                query: query.unwrap_or_default().to_string(),
                is_entry_page,
            }),
        );
    }

    fn create_initial_handle(&self, config: &AppConfig, url: &str) -> RendererHandle {
        if config.opens_tab_group(url) {
            RendererHandle::Composite(Arc::new(TabGroupHandle::new(
                config.tabs().to_vec(),
                url,
                &self.host,
                &self.signals,
            )))
        } else {
            RendererHandle::Simple(Arc::new(SimpleHandle::new(
                url,
                None,
                Arc::clone(&self.host),
                self.signals.clone(),
            )))
        }
    }

    fn install_root(&self, handle: RendererHandle) {
        self.stack.push(handle.clone());
        self.adopt_root(handle);
    }

    fn adopt_root(&self, handle: RendererHandle) {
        *self.init_handle.lock() = Some(handle.clone());
        handle.on_enqueue();
    }

    fn is_init(&self, handle: &RendererHandle) -> bool {
        self.init_handle
            .lock()
            .as_ref()
            .is_some_and(|init| init.same_as(handle))
    }

    /// Take the gate once the active page has rendered.
    async fn gate_after_render(&self) -> MutexGuard<'_, ()> {
        loop {
            let guard = self.gate.lock().await;
            let Some(leaf) = self.stack.top().map(|top| top.leaf()) else {
                return guard;
            };
            let Some(context_id) = leaf.context_id() else {
                return guard;
            };
            let topic = topics::rendered(&context_id);
            let (subscription, rendered) = self.signals.next(&topic, false);
            if !leaf.status().load_to_ready_in_flight {
                let _ = self.signals.unsubscribe(&topic, subscription);
                return guard;
            }
            drop(guard);
            debug!(context_id = %context_id, "parked until rendered");
            if rendered.await.is_err() {
                debug!(context_id = %context_id, "render wait dropped");
            }
        }
    }

    /// Take the gate once a deferred show of the active page was delivered.
    async fn gate_after_show(&self) -> MutexGuard<'_, ()> {
        loop {
            let guard = self.gate.lock().await;
            let Some(leaf) = self.stack.top_non_closing().map(|top| top.leaf()) else {
                return guard;
            };
            let Some(context_id) = leaf.context_id() else {
                return guard;
            };
            let topic = topics::showed(&context_id);
            let (subscription, showed) = self.signals.next(&topic, false);
            if !leaf.status().on_load_to_show_wrapped {
                let _ = self.signals.unsubscribe(&topic, subscription);
                return guard;
            }
            leaf.jump_on_ready();
            drop(guard);
            debug!(context_id = %context_id, "parked until shown");
            if showed.await.is_err() {
                debug!(context_id = %context_id, "show wait dropped");
            }
            leaf.unwrap_on_load_to_show();
            leaf.restore_on_ready();
        }
    }
}
