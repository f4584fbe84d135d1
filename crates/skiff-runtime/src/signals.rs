//! Payload and topic names carried on the orchestrator's buses.
//!
//! Three buses exist: the renderer communicator (topic = renderer message
//! type), host lifecycle events (topic = lifecycle kind) and internal signals
//! (topics below). Per-context completion topics embed the context id.

use std::sync::Arc;

use skiff_core::events::{LifecycleSignal, RendererMessage, TabItemTap};
use skiff_core::ids::ContextId;

use crate::hooks::{PageHooks, PageNotFound};

/// Everything that travels on a skiff bus.
#[derive(Clone, Debug)]
pub enum Signal {
    /// A message from a renderer context.
    Renderer(RendererMessage),
    /// A host lifecycle event.
    HostLifecycle(LifecycleSignal),
    /// First render of a context acknowledged and `on_ready` delivered.
    Rendered {
        /// Context that rendered.
        context_id: ContextId,
    },
    /// `on_show` delivered to the page in a context.
    Showed {
        /// Context that was shown.
        context_id: ContextId,
    },
    /// A handle was torn down; its page must receive `on_unload`.
    PageUnloaded {
        /// Context the page lived in.
        context_id: ContextId,
        /// Page uri.
        uri: String,
        /// Page instance, if `onLoad` ever ran.
        page: Option<Arc<dyn PageHooks>>,
    },
    /// A handle entered the stack (or a tab got its first context).
    Registered {
        /// Context now registered.
        context_id: ContextId,
        /// Page uri.
        uri: String,
        /// Tab index for tab pages.
        tab_index: Option<usize>,
    },
    /// A navigation targeted an undeclared page.
    PageNotFound(PageNotFound),
    /// A tab tap to route to its page.
    TabItemTap(TabItemTap),
}

impl Signal {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Renderer(_) => "renderer",
            Self::HostLifecycle(_) => "lifecycle",
            Self::Rendered { .. } => "rendered",
            Self::Showed { .. } => "showed",
            Self::PageUnloaded { .. } => "pageUnloaded",
            Self::Registered { .. } => "registered",
            Self::PageNotFound(_) => "pageNotFound",
            Self::TabItemTap(_) => "tabItemTap",
        }
    }
}

/// Signal topic names.
pub mod topics {
    use skiff_core::ids::ContextId;

    /// [`Signal::PageUnloaded`](super::Signal::PageUnloaded).
    pub const PAGE_UNLOADED: &str = "pageUnloaded";
    /// [`Signal::Registered`](super::Signal::Registered).
    pub const REGISTERED: &str = "registered";
    /// [`Signal::PageNotFound`](super::Signal::PageNotFound).
    pub const PAGE_NOT_FOUND: &str = "pageNotFound";
    /// [`Signal::TabItemTap`](super::Signal::TabItemTap).
    pub const TAB_ITEM_TAP: &str = "onTabItemTap";

    /// First-render completion of one context.
    pub fn rendered(context_id: &ContextId) -> String {
        format!("rendered:{context_id}")
    }

    /// Show completion of one context.
    pub fn showed(context_id: &ContextId) -> String {
        format!("onShowed:{context_id}")
    }
}
