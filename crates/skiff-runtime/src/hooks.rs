//! Developer-facing page, component and app hooks.
//!
//! Only the lifecycle router calls into these, always through [`run_hook`],
//! so a failing or panicking hook is logged and never unwinds into the
//! runtime.

use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use skiff_core::errors::HookResult;
use skiff_core::events::TabItemTap;
use skiff_core::ids::ContextId;
use skiff_core::path::front_uri;
use tracing::{debug, error};

/// A page instance living in the orchestrator.
///
/// All methods default to no-ops.
pub trait PageHooks: Send + Sync {
    /// First lifecycle call, with the parsed query.
    fn on_load(&self, _query: &Value) -> HookResult {
        Ok(())
    }

    /// First render finished.
    fn on_ready(&self) -> HookResult {
        Ok(())
    }

    /// Page became visible.
    fn on_show(&self, _event: &Value) -> HookResult {
        Ok(())
    }

    /// Page was covered or backgrounded.
    fn on_hide(&self, _event: &Value) -> HookResult {
        Ok(())
    }

    /// Page left the stack.
    fn on_unload(&self) -> HookResult {
        Ok(())
    }

    /// The tab showing this page was tapped.
    fn on_tab_item_tap(&self, _tap: &TabItemTap) -> HookResult {
        Ok(())
    }

    /// Share requested from `source` (`"menu"` for the page menu).
    fn on_share(&self, _event: &Value, _source: &str) -> HookResult {
        Ok(())
    }

    /// Named method: framework-private messages and developer UI events.
    fn call_method(&self, _method: &str, _args: &Value) -> HookResult {
        Ok(())
    }

    /// Custom components mounted in this page.
    fn components(&self) -> Vec<Arc<dyn ComponentHooks>> {
        Vec::new()
    }
}

impl fmt::Debug for dyn PageHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PageHooks")
    }
}

/// A custom component inside a page.
pub trait ComponentHooks: Send + Sync {
    /// Node id the renderer uses for this component.
    fn id(&self) -> &str;

    /// Own lifetime (`attached`, `ready`, `detached`, ...).
    fn lifetime(&self, _name: &str, _params: &Value) -> HookResult {
        Ok(())
    }

    /// The hosting page became visible.
    fn page_show(&self, _event: &Value) -> HookResult {
        Ok(())
    }

    /// The hosting page was hidden.
    fn page_hide(&self, _event: &Value) -> HookResult {
        Ok(())
    }

    /// Developer event handler.
    fn call_method(&self, _method: &str, _event: &Value) -> HookResult {
        Ok(())
    }
}

/// Argument of [`AppHooks::on_page_not_found`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageNotFound {
    /// Path portion of the requested url.
    pub page: String,
    /// Raw query string.
    pub query: String,
    /// Whether the missing page was the entry page.
    pub is_entry_page: bool,
}

/// App-level hooks. All default to no-ops.
pub trait AppHooks: Send + Sync {
    /// App installed, with launch options.
    fn on_launch(&self, _options: &Value) -> HookResult {
        Ok(())
    }

    /// App came to the foreground.
    fn on_show(&self, _event: &Value) -> HookResult {
        Ok(())
    }

    /// App went to the background.
    fn on_hide(&self, _event: &Value) -> HookResult {
        Ok(())
    }

    /// Host-reported error.
    fn on_error(&self, _event: &Value) -> HookResult {
        Ok(())
    }

    /// A navigation targeted an undeclared page.
    fn on_page_not_found(&self, _event: &PageNotFound) -> HookResult {
        Ok(())
    }

    /// Login state reported by the host.
    fn on_login(&self, _event: &Value) -> HookResult {
        Ok(())
    }
}

/// App without hooks.
pub struct NoopApp;

impl AppHooks for NoopApp {}

/// Page without hooks, used for routes that have no registered definition.
pub struct BlankPage;

impl PageHooks for BlankPage {}

/// What a page factory learns about the page it builds.
#[derive(Clone, Debug)]
pub struct PageContext {
    /// Renderer context of the page.
    pub context_id: ContextId,
    /// Page uri with query.
    pub uri: String,
}

/// Builds a page instance when its renderer asks for `onLoad`.
pub type PageFactory = Arc<dyn Fn(&PageContext) -> Arc<dyn PageHooks> + Send + Sync>;

/// Route → page factory table.
///
/// A registered route counts as existing for navigation even when it is not
/// declared in the app config.
#[derive(Default)]
pub struct PageRegistry {
    factories: RwLock<HashMap<String, PageFactory>>,
}

impl PageRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the factory for `route`.
    pub fn register<F>(&self, route: &str, factory: F)
    where
        F: Fn(&PageContext) -> Arc<dyn PageHooks> + Send + Sync + 'static,
    {
        let route = route.trim_start_matches('/').to_string();
        debug!(route = %route, "page definition registered");
        let _ = self.factories.write().insert(route, Arc::new(factory));
    }

    /// Whether `url`'s path has a definition.
    pub fn contains(&self, url: &str) -> bool {
        self.factories.read().contains_key(front_uri(url))
    }

    /// Build the page for `ctx`, or [`BlankPage`] when the route has no definition.
    pub fn instantiate(&self, ctx: &PageContext) -> Arc<dyn PageHooks> {
        let factory = self.factories.read().get(front_uri(&ctx.uri)).cloned();
        match factory {
            Some(factory) => factory(ctx),
            None => Arc::new(BlankPage),
        }
    }

    /// Registered routes, sorted.
    pub fn routes(&self) -> Vec<String> {
        let mut routes: Vec<String> = self.factories.read().keys().cloned().collect();
        routes.sort();
        routes
    }
}

/// Run one user hook, containing errors and panics.
///
/// Returns whether the hook completed successfully.
pub fn run_hook<F>(hook: &str, context_id: Option<&ContextId>, f: F) -> bool
where
    F: FnOnce() -> HookResult,
{
    let context_id = context_id.map(ContextId::as_str);
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            error!(hook, context_id, error = %err, "hook failed");
            false
        }
        Err(_) => {
            error!(hook, context_id, "hook panicked");
            false
        }
    }
}
