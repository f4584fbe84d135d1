//! Orchestrator-side proxies for renderer contexts.
//!
//! A [`RendererHandle`] is either one page ([`SimpleHandle`]) or a tab-bar
//! group of pages ([`TabGroupHandle`]). Both expose the same capability
//! surface; status flags of a group are those of its visible child.

mod group;
mod simple;

pub use group::TabGroupHandle;
pub use simple::SimpleHandle;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use skiff_core::errors::HostError;
use skiff_core::ids::{ContextId, HandleId};

use crate::host::OpenVerb;

/// Lifecycle phase of a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HandlePhase {
    /// Constructed, nothing requested yet.
    Created,
    /// Context requested, id not yet known.
    Opening,
    /// Context assigned.
    Open,
    /// Top of stack during a back round trip.
    Closing,
    /// Torn down.
    Closed,
}

/// Independent status flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandleStatus {
    /// A back navigation is popping this handle.
    pub is_closing: bool,
    /// Between "load requested" and "first render acknowledged".
    pub load_to_ready_in_flight: bool,
    /// An onLoad is waiting for its onShow.
    pub on_load_to_show_wrapped: bool,
    /// The next `on_ready` is skipped.
    pub ready_suppressed: bool,
}

/// What to look a handle up by.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Host context id.
    Context(ContextId),
    /// Uri; only the path portion is compared.
    Uri(String),
    /// Local handle id.
    Handle(HandleId),
}

/// A page or tab group in the navigation stack. Cloning shares the handle.
#[derive(Clone)]
pub enum RendererHandle {
    /// One page.
    Simple(Arc<SimpleHandle>),
    /// A tab-bar group.
    Composite(Arc<TabGroupHandle>),
}

impl RendererHandle {
    /// Local identity.
    pub fn id(&self) -> HandleId {
        match self {
            Self::Simple(h) => h.id().clone(),
            Self::Composite(g) => g.id().clone(),
        }
    }

    /// Whether both values are the same handle.
    pub fn same_as(&self, other: &RendererHandle) -> bool {
        self.id() == other.id()
    }

    /// The page currently represented: itself, or the visible child.
    pub fn leaf(&self) -> Arc<SimpleHandle> {
        match self {
            Self::Simple(h) => Arc::clone(h),
            Self::Composite(g) => g.current(),
        }
    }

    /// Every page: itself, or all children.
    pub fn leaves(&self) -> Vec<Arc<SimpleHandle>> {
        match self {
            Self::Simple(h) => vec![Arc::clone(h)],
            Self::Composite(g) => g.children().to_vec(),
        }
    }

    /// Whether this is a tab group.
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Composite(_))
    }

    /// Context of the visible page.
    pub fn context_id(&self) -> Option<ContextId> {
        self.leaf().context_id()
    }

    /// Uri of the visible page.
    pub fn uri(&self) -> String {
        self.leaf().uri()
    }

    /// Path portion of [`uri`](Self::uri).
    pub fn front_uri(&self) -> String {
        self.leaf().front_uri()
    }

    /// Phase of the handle (the group's own phase for composites).
    pub fn phase(&self) -> HandlePhase {
        match self {
            Self::Simple(h) => h.phase(),
            Self::Composite(g) => g.phase(),
        }
    }

    /// Status flags of the visible page.
    pub fn status(&self) -> HandleStatus {
        self.leaf().status()
    }

    /// Adopt a host-created context for the visible page.
    pub fn init(&self, context_id: ContextId) {
        match self {
            Self::Simple(h) => h.init(context_id),
            Self::Composite(g) => g.init(context_id),
        }
    }

    /// Request a context for the visible page.
    pub async fn open(&self, verb: OpenVerb) -> Result<ContextId, HostError> {
        match self {
            Self::Simple(h) => h.open(verb).await,
            Self::Composite(g) => g.open(verb).await,
        }
    }

    /// Reopen after a stack clear.
    pub async fn relaunch(&self, uri: &str) -> Result<ContextId, HostError> {
        match self {
            Self::Simple(h) => h.relaunch(uri).await,
            Self::Composite(g) => g.relaunch(uri).await,
        }
    }

    /// Tear down. Idempotent.
    pub fn close(&self) {
        match self {
            Self::Simple(h) => h.close(),
            Self::Composite(g) => g.close(),
        }
    }

    /// Whether `target` names this handle (or, for groups, any child).
    pub fn is_the_slave(&self, target: &Target) -> bool {
        match self {
            Self::Simple(h) => h.is_the_slave(target),
            Self::Composite(g) => g.is_the_slave(target),
        }
    }

    /// The page matching `target`.
    pub fn find_child(&self, target: &Target) -> Option<Arc<SimpleHandle>> {
        match self {
            Self::Simple(h) => h.is_the_slave(target).then(|| Arc::clone(h)),
            Self::Composite(g) => g.find_child(target),
        }
    }

    /// Visibility bookkeeping for the outgoing top.
    pub fn hide(&self) {
        self.leaf().hide();
    }

    /// Visibility bookkeeping for the incoming top.
    pub fn show(&self) {
        self.leaf().show();
    }

    /// Called right after push.
    pub fn on_enqueue(&self) {
        self.leaf().on_enqueue();
    }

    /// Read-only view for `current_pages()`.
    pub fn snapshot(&self) -> PageSnapshot {
        let leaf = self.leaf();
        PageSnapshot {
            handle_id: self.id(),
            context_id: leaf.context_id(),
            uri: leaf.uri(),
            tab_index: leaf.tab_index(),
            is_tab_group: self.is_composite(),
            phase: self.phase(),
            status: leaf.status(),
        }
    }
}

/// A handle as seen from outside the runtime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageSnapshot {
    /// Local identity.
    pub handle_id: HandleId,
    /// Context of the visible page.
    pub context_id: Option<ContextId>,
    /// Uri of the visible page.
    pub uri: String,
    /// Visible tab index for groups.
    pub tab_index: Option<usize>,
    /// Whether the entry is a tab group.
    pub is_tab_group: bool,
    /// Handle phase.
    pub phase: HandlePhase,
    /// Status flags of the visible page.
    pub status: HandleStatus,
}
