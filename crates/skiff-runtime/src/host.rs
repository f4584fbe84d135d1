//! Imperative calls into the host process.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use skiff_core::errors::HostError;
use skiff_core::ids::ContextId;

/// Why a renderer context is being opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OpenVerb {
    /// Entry page at cold start.
    Init,
    /// Push a fresh context.
    NavigateTo,
    /// Replace the top page, reusing its context where possible.
    RedirectTo,
    /// Reset the stack, reusing the target's context where possible.
    ReLaunch,
    /// Show a tab, creating its context on first visit.
    SwitchTab,
}

impl OpenVerb {
    /// Host API name.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::NavigateTo => "navigateTo",
            Self::RedirectTo => "redirectTo",
            Self::ReLaunch => "reLaunch",
            Self::SwitchTab => "switchTab",
        }
    }
}

/// Arguments of [`HostBridge::open`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenRequest {
    /// Page uri with query.
    pub uri: String,
    /// Context to reuse, if any.
    pub context_id: Option<ContextId>,
    /// Tab index when opening a tab page.
    pub tab_index: Option<usize>,
}

/// Reply of [`HostBridge::open`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenReply {
    /// Context now showing the page.
    #[serde(rename = "wvID")]
    pub context_id: ContextId,
}

/// The host side of the runtime.
///
/// Every call may suspend; none is retried by the caller.
#[async_trait]
pub trait HostBridge: Send + Sync {
    /// Create (or reuse) a renderer context for `request.uri`.
    async fn open(&self, verb: OpenVerb, request: OpenRequest) -> Result<OpenReply, HostError>;

    /// Pop `delta` pages. The stack is reconciled later from `onRoute`.
    async fn navigate_back(&self, delta: usize) -> Result<(), HostError>;

    /// Fetch a sub-package ahead of navigation.
    async fn load_sub_package(&self, root: &str) -> Result<(), HostError>;

    /// Current network type (`wifi`, `4g`, `none`, ...).
    async fn network_type(&self) -> Result<String, HostError>;
}
