//! Typed protocol events.
//!
//! Three streams reach the orchestrator:
//!
//! - [`HostEvent`]: protocol events pushed by the host process
//! - [`RendererMessage`]: messages posted by renderer contexts
//! - [`TransitionRequest`]: navigation verbs issued by app code
//!
//! All three are serde-tagged so a recorded session can be replayed from
//! JSON lines.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ids::ContextId;

/// Event pushed by the host bridge.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum HostEvent {
    /// The app package is loaded; carries the route config.
    AppReady(AppReadyEvent),
    /// Page or app lifecycle transition observed by the host.
    #[serde(rename = "lifecycle")]
    Lifecycle(LifecycleSignal),
    /// The host finished a route change.
    #[serde(rename = "onRoute")]
    Route(RouteEvent),
    /// A tab in the tab bar was tapped.
    #[serde(rename = "onTabItemTap")]
    TabItemTap(TabItemTap),
    /// The share entry of the page menu was pressed.
    #[serde(rename = "sharebtn")]
    ShareButton {
        /// Page the menu belongs to.
        #[serde(rename = "wvID")]
        context_id: ContextId,
        /// Raw host payload.
        #[serde(default)]
        payload: Value,
    },
    /// The signed-in account changed.
    #[serde(rename = "accountChange")]
    AccountChange,
    /// The user asked to go back to the app's home page.
    #[serde(rename = "backtohome")]
    BackToHome {
        /// Home route, without leading slash.
        url: String,
        /// Origin of the request, `"menu"` when from the page menu.
        #[serde(default)]
        from: String,
    },
    /// The host demands a relaunch that must not wait for pending shows.
    #[serde(rename = "onForceReLaunch")]
    ForceRelaunch {
        /// Target route; the current top when absent.
        #[serde(default)]
        url: Option<String>,
    },
    /// Login state reported by the host.
    #[serde(rename = "onLogin")]
    Login {
        /// Raw host payload.
        #[serde(default)]
        payload: Value,
    },
}

impl HostEvent {
    /// Stable name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::AppReady(_) => "AppReady",
            Self::Lifecycle(_) => "lifecycle",
            Self::Route(_) => "onRoute",
            Self::TabItemTap(_) => "onTabItemTap",
            Self::ShareButton { .. } => "sharebtn",
            Self::AccountChange => "accountChange",
            Self::BackToHome { .. } => "backtohome",
            Self::ForceRelaunch { .. } => "onForceReLaunch",
            Self::Login { .. } => "onLogin",
        }
    }
}

/// Payload of `AppReady`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AppReadyEvent {
    /// Serialized [`AppConfig`](crate::config::AppConfig).
    pub app_config: String,
    /// On-disk root of the app package.
    #[serde(default)]
    pub app_path: String,
    /// Entry page uri.
    pub page_url: String,
    /// Context the host created for the entry page.
    #[serde(rename = "wvID")]
    pub context_id: ContextId,
}

/// Lifecycle kinds delivered through the `lifecycle` host event.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum LifecycleKind {
    /// A page became visible.
    OnShow,
    /// A page was covered or backgrounded.
    OnHide,
    /// The app came to the foreground.
    OnAppShow,
    /// The app went to the background.
    OnAppHide,
    /// The host reported an app-level error.
    OnAppError,
}

impl LifecycleKind {
    /// Wire name, also used as bus topic prefix.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OnShow => "onShow",
            Self::OnHide => "onHide",
            Self::OnAppShow => "onAppShow",
            Self::OnAppHide => "onAppHide",
            Self::OnAppError => "onAppError",
        }
    }

    /// Whether this is an app-level (not page-level) event.
    pub fn is_app_event(self) -> bool {
        matches!(self, Self::OnAppShow | Self::OnAppHide | Self::OnAppError)
    }
}

/// A lifecycle event from the host.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct LifecycleSignal {
    /// What happened.
    #[serde(rename = "lEvent")]
    pub kind: LifecycleKind,
    /// Page the event targets; absent for app events.
    #[serde(rename = "wvID", default)]
    pub context_id: Option<ContextId>,
    /// Raw host payload.
    #[serde(default)]
    pub payload: Value,
}

/// Route verbs as reported back by the host in `onRoute`.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum RouteType {
    /// Entry page opened.
    Init,
    /// A page was pushed.
    NavigateTo,
    /// The top page was replaced.
    RedirectTo,
    /// The stack was reset.
    ReLaunch,
    /// Pages were popped.
    NavigateBack,
    /// The visible tab changed.
    SwitchTab,
}

/// Payload of `onRoute`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RouteEvent {
    /// Which verb completed.
    pub route_type: RouteType,
    /// Page that was on top before the route.
    #[serde(default)]
    pub from_id: Option<ContextId>,
    /// Page that is on top after the route.
    #[serde(default)]
    pub to_id: Option<ContextId>,
    /// Uri of the destination page.
    #[serde(default)]
    pub to_page: Option<String>,
    /// Tab index for `switchTab`.
    #[serde(default)]
    pub to_tab_index: Option<usize>,
}

/// Payload of `onTabItemTap`, and the argument passed to the page hook.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TabItemTap {
    /// Page context showing the tab, when known.
    #[serde(rename = "wvID", default)]
    pub context_id: Option<ContextId>,
    /// Tab index.
    pub index: usize,
    /// Tab page path.
    pub page_path: String,
    /// Tab label.
    #[serde(default)]
    pub text: String,
    /// Origin, `"switchTab"` when synthesized by route reconciliation.
    #[serde(default)]
    pub from: Option<String>,
}

/// Message posted by a renderer context.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum RendererMessage {
    /// The renderer created its page and asks for `onLoad`.
    #[serde(rename = "onLoad")]
    PageLoad {
        /// Renderer context.
        #[serde(rename = "slaveId")]
        context_id: ContextId,
        /// Page uri with query.
        uri: String,
        /// Parsed query, forwarded to `on_load`.
        #[serde(default)]
        query: Value,
    },
    /// Framework-private message; `kind == "rendered"` is the render ack.
    #[serde(rename = "abilityMessage")]
    Ability {
        /// Renderer context.
        #[serde(rename = "slaveId")]
        context_id: ContextId,
        /// Message kind, or a page private method name.
        kind: String,
        /// Method argument.
        #[serde(default)]
        params: Value,
    },
    /// A developer-bound UI event (`bindtap` and friends).
    #[serde(rename = "event")]
    UserEvent {
        /// Renderer context.
        #[serde(rename = "slaveId")]
        context_id: ContextId,
        /// Handler method name on the page or component.
        method: String,
        /// Event object.
        #[serde(default)]
        event: Value,
        /// Set when the handler lives on a custom component.
        #[serde(default)]
        component_id: Option<String>,
    },
    /// Lifecycle of a custom component instance inside a page.
    #[serde(rename = "customComponentLifecycle")]
    ComponentLifecycle {
        /// Renderer context.
        #[serde(rename = "slaveId")]
        context_id: ContextId,
        /// Component node id.
        component_id: String,
        /// `attached`, `ready`, `detached`, ...
        lifetime: String,
        /// Extra data.
        #[serde(default)]
        params: Value,
    },
}

/// Ability message kind that acknowledges the first render.
pub const RENDERED: &str = "rendered";

impl RendererMessage {
    /// Context the message came from.
    pub fn context_id(&self) -> &ContextId {
        match self {
            Self::PageLoad { context_id, .. }
            | Self::Ability { context_id, .. }
            | Self::UserEvent { context_id, .. }
            | Self::ComponentLifecycle { context_id, .. } => context_id,
        }
    }

    /// Whether this is the first-render acknowledgement.
    pub fn is_render_ack(&self) -> bool {
        matches!(self, Self::Ability { kind, .. } if kind == RENDERED)
    }
}

fn default_delta() -> usize {
    1
}

/// A navigation verb with its arguments.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "verb", rename_all = "camelCase")]
pub enum TransitionRequest {
    /// Push a page.
    NavigateTo {
        /// Absolute or relative target.
        url: String,
    },
    /// Replace the top page.
    RedirectTo {
        /// Absolute or relative target.
        url: String,
    },
    /// Show a tab of the tab group.
    SwitchTab {
        /// Tab page path.
        url: String,
    },
    /// Reset the stack to one page.
    ReLaunch {
        /// Target; the current top when absent.
        #[serde(default)]
        url: Option<String>,
        /// Skip waiting for a pending show.
        #[serde(default)]
        forced: bool,
    },
    /// Pop pages.
    NavigateBack {
        /// How many pages to pop.
        #[serde(default = "default_delta")]
        delta: usize,
    },
}

impl TransitionRequest {
    /// Verb name for logging.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::NavigateTo { .. } => "navigateTo",
            Self::RedirectTo { .. } => "redirectTo",
            Self::SwitchTab { .. } => "switchTab",
            Self::ReLaunch { .. } => "reLaunch",
            Self::NavigateBack { .. } => "navigateBack",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn host_event_app_ready_from_json() {
        let event: HostEvent = serde_json::from_str(
            r#"{"type":"AppReady","appConfig":"{}","appPath":"/app","pageUrl":"pages/index/index","wvID":1}"#,
        )
        .unwrap();
        assert_matches!(event, HostEvent::AppReady(ref ready) if ready.context_id.as_str() == "1");
        assert_eq!(event.name(), "AppReady");
    }

    #[test]
    fn lifecycle_event_from_json() {
        let event: HostEvent =
            serde_json::from_str(r#"{"type":"lifecycle","lEvent":"onShow","wvID":"3"}"#).unwrap();
        assert_matches!(
            event,
            HostEvent::Lifecycle(LifecycleSignal { kind: LifecycleKind::OnShow, context_id: Some(_), .. })
        );
    }

    #[test]
    fn route_event_from_json() {
        let event: HostEvent = serde_json::from_str(
            r#"{"type":"onRoute","routeType":"navigateBack","fromId":"5","toId":"2"}"#,
        )
        .unwrap();
        let HostEvent::Route(route) = event else {
            panic!("expected route");
        };
        assert_eq!(route.route_type, RouteType::NavigateBack);
        assert_eq!(route.to_id, Some(ContextId::from("2")));
    }

    #[test]
    fn unit_and_defaulted_variants() {
        let event: HostEvent = serde_json::from_str(r#"{"type":"accountChange"}"#).unwrap();
        assert_eq!(event, HostEvent::AccountChange);
        let event: HostEvent =
            serde_json::from_str(r#"{"type":"backtohome","url":"pages/index/index"}"#).unwrap();
        assert_matches!(event, HostEvent::BackToHome { ref from, .. } if from.is_empty());
    }

    #[test]
    fn render_ack_detection() {
        let msg: RendererMessage =
            serde_json::from_str(r#"{"type":"abilityMessage","slaveId":"4","kind":"rendered"}"#).unwrap();
        assert!(msg.is_render_ack());
        assert_eq!(msg.context_id().as_str(), "4");

        let other = RendererMessage::Ability {
            context_id: ContextId::from("4"),
            kind: "refresh".into(),
            params: Value::Null,
        };
        assert!(!other.is_render_ack());
    }

    #[test]
    fn transition_request_defaults() {
        let req: TransitionRequest = serde_json::from_str(r#"{"verb":"navigateBack"}"#).unwrap();
        assert_eq!(req, TransitionRequest::NavigateBack { delta: 1 });
        let req: TransitionRequest = serde_json::from_str(r#"{"verb":"reLaunch"}"#).unwrap();
        assert_eq!(req, TransitionRequest::ReLaunch { url: None, forced: false });
        assert_eq!(req.verb(), "reLaunch");
    }
}
