use std::sync::Arc;

use parking_lot::Mutex;
use skiff_bus::EventBus;
use skiff_core::errors::HostError;
use skiff_core::ids::{ContextId, HandleId};
use skiff_core::path::front_uri;
use tracing::{debug, warn};

use super::{HandlePhase, HandleStatus, Target};
use crate::hooks::PageHooks;
use crate::host::{HostBridge, OpenRequest, OpenVerb};
use crate::signals::{Signal, topics};

struct SimpleState {
    context_id: Option<ContextId>,
    uri: String,
    phase: HandlePhase,
    status: HandleStatus,
    visible: bool,
    page: Option<Arc<dyn PageHooks>>,
}

/// Proxy for one page in one renderer context.
pub struct SimpleHandle {
    id: HandleId,
    tab_index: Option<usize>,
    host: Arc<dyn HostBridge>,
    signals: EventBus<Signal>,
    state: Mutex<SimpleState>,
}

impl SimpleHandle {
    /// A handle for `uri` with no context yet.
    pub fn new(
        uri: impl Into<String>,
        tab_index: Option<usize>,
        host: Arc<dyn HostBridge>,
        signals: EventBus<Signal>,
    ) -> Self {
        Self {
            id: HandleId::new(),
            tab_index,
            host,
            signals,
            state: Mutex::new(SimpleState {
                context_id: None,
                uri: uri.into(),
                phase: HandlePhase::Created,
                status: HandleStatus::default(),
                visible: false,
                page: None,
            }),
        }
    }

    /// Local identity.
    pub fn id(&self) -> &HandleId {
        &self.id
    }

    /// Host context, once assigned.
    pub fn context_id(&self) -> Option<ContextId> {
        self.state.lock().context_id.clone()
    }

    /// Uri with query.
    pub fn uri(&self) -> String {
        self.state.lock().uri.clone()
    }

    /// Path portion of the uri.
    pub fn front_uri(&self) -> String {
        front_uri(&self.state.lock().uri).to_string()
    }

    /// Tab index when this handle is a tab group child.
    pub fn tab_index(&self) -> Option<usize> {
        self.tab_index
    }

    /// Current phase.
    pub fn phase(&self) -> HandlePhase {
        self.state.lock().phase
    }

    /// Copy of the status flags.
    pub fn status(&self) -> HandleStatus {
        self.state.lock().status
    }

    /// Whether the page is the visible one.
    pub fn is_visible(&self) -> bool {
        self.state.lock().visible
    }

    /// Page instance, once `onLoad` ran.
    pub fn page(&self) -> Option<Arc<dyn PageHooks>> {
        self.state.lock().page.clone()
    }

    /// Attach the page instance built for this context.
    pub fn attach_page(&self, page: Arc<dyn PageHooks>) {
        self.state.lock().page = Some(page);
    }

    /// Adopt a context the host already created (entry page, host-driven tab switch).
    pub fn init(&self, context_id: ContextId) {
        let mut st = self.state.lock();
        debug!(context_id = %context_id, uri = %st.uri, "context adopted");
        st.context_id = Some(context_id);
        st.phase = HandlePhase::Open;
        st.status = HandleStatus {
            load_to_ready_in_flight: true,
            ..HandleStatus::default()
        };
        st.visible = true;
    }

    /// Ask the host for a context for the current uri.
    pub async fn open(&self, verb: OpenVerb) -> Result<ContextId, HostError> {
        let request = {
            let mut st = self.state.lock();
            st.phase = HandlePhase::Opening;
            OpenRequest {
                uri: st.uri.clone(),
                context_id: st.context_id.clone(),
                tab_index: self.tab_index,
            }
        };
        match self.host.open(verb, request).await {
            Ok(reply) => {
                self.init(reply.context_id.clone());
                Ok(reply.context_id)
            }
            Err(err) => {
                let mut st = self.state.lock();
                st.phase = if st.context_id.is_some() {
                    HandlePhase::Open
                } else {
                    HandlePhase::Created
                };
                warn!(verb = verb.as_str(), uri = %st.uri, error = %err, "context creation failed");
                Err(err)
            }
        }
    }

    /// Bring an already-open context to the front without resetting its status.
    pub async fn revisit(&self, verb: OpenVerb) -> Result<ContextId, HostError> {
        let request = {
            let st = self.state.lock();
            OpenRequest {
                uri: st.uri.clone(),
                context_id: st.context_id.clone(),
                tab_index: self.tab_index,
            }
        };
        let reply = self.host.open(verb, request).await.inspect_err(|err| {
            warn!(verb = verb.as_str(), error = %err, "revisit failed");
        })?;
        let mut st = self.state.lock();
        st.context_id = Some(reply.context_id.clone());
        st.visible = true;
        Ok(reply.context_id)
    }

    /// Replace the page in place, reusing the context when the host allows.
    pub async fn redirect(&self, uri: &str) -> Result<ContextId, HostError> {
        self.reopen(OpenVerb::RedirectTo, uri).await
    }

    /// Reopen after the stack was cleared.
    pub async fn relaunch(&self, uri: &str) -> Result<ContextId, HostError> {
        self.reopen(OpenVerb::ReLaunch, uri).await
    }

    async fn reopen(&self, verb: OpenVerb, uri: &str) -> Result<ContextId, HostError> {
        let request = OpenRequest {
            uri: uri.to_string(),
            context_id: self.context_id(),
            tab_index: self.tab_index,
        };
        let reply = self.host.open(verb, request).await.inspect_err(|err| {
            warn!(verb = verb.as_str(), uri, error = %err, "reopen failed");
        })?;

        let previous = {
            let mut st = self.state.lock();
            let was_closed = st.phase == HandlePhase::Closed;
            let old_context = st.context_id.replace(reply.context_id.clone());
            let old_uri = std::mem::replace(&mut st.uri, uri.to_string());
            let old_page = st.page.take();
            st.phase = HandlePhase::Open;
            st.status = HandleStatus {
                load_to_ready_in_flight: true,
                ..HandleStatus::default()
            };
            st.visible = true;
            // A closed handle already announced its unload.
            (!was_closed).then_some((old_context, old_uri, old_page))
        };

        if let Some((Some(context_id), uri, page)) = previous {
            let _ = self.signals.publish(
                topics::PAGE_UNLOADED,
                Signal::PageUnloaded {
                    context_id,
                    uri,
                    page,
                },
            );
        }
        Ok(reply.context_id)
    }

    /// Forget the context so the next visit creates a fresh one.
    pub(crate) fn reset(&self, uri: &str) {
        let mut st = self.state.lock();
        st.context_id = None;
        st.uri = uri.to_string();
        st.phase = HandlePhase::Created;
        st.status = HandleStatus::default();
        st.visible = false;
        st.page = None;
    }

    /// Ask the next `open` to reuse `context_id`.
    pub(crate) fn seed_context(&self, context_id: ContextId) {
        self.state.lock().context_id = Some(context_id);
    }

    /// Tear down. Idempotent; publishes `PageUnloaded` once.
    pub fn close(&self) {
        let unloaded = {
            let mut st = self.state.lock();
            if st.phase == HandlePhase::Closed {
                return;
            }
            st.phase = HandlePhase::Closed;
            st.visible = false;
            st.status.is_closing = false;
            st.context_id
                .clone()
                .map(|context_id| (context_id, st.uri.clone(), st.page.take()))
        };
        if let Some((context_id, uri, page)) = unloaded {
            debug!(context_id = %context_id, uri = %uri, "handle closed");
            let _ = self.signals.publish(
                topics::PAGE_UNLOADED,
                Signal::PageUnloaded {
                    context_id,
                    uri,
                    page,
                },
            );
        }
    }

    /// Matches on context id, uri path or handle id.
    pub fn is_the_slave(&self, target: &Target) -> bool {
        match target {
            Target::Context(id) => self.state.lock().context_id.as_ref() == Some(id),
            Target::Uri(uri) => front_uri(&self.state.lock().uri) == front_uri(uri),
            Target::Handle(id) => &self.id == id,
        }
    }

    /// Mark as covered by another page.
    pub fn hide(&self) {
        self.state.lock().visible = false;
    }

    /// Mark as the visible page.
    pub fn show(&self) {
        self.state.lock().visible = true;
    }

    /// Announce the handle's registration so buffered tab taps can be replayed.
    pub fn on_enqueue(&self) {
        let registered = {
            let st = self.state.lock();
            st.context_id
                .clone()
                .map(|context_id| (context_id, st.uri.clone()))
        };
        if let Some((context_id, uri)) = registered {
            let _ = self.signals.publish(
                topics::REGISTERED,
                Signal::Registered {
                    context_id,
                    uri,
                    tab_index: self.tab_index,
                },
            );
        }
    }

    /// Set or clear the back-navigation marker.
    pub fn set_closing(&self, closing: bool) {
        self.state.lock().status.is_closing = closing;
    }

    /// Set or clear the load→ready marker.
    pub fn set_load_to_ready(&self, in_flight: bool) {
        self.state.lock().status.load_to_ready_in_flight = in_flight;
    }

    /// Mark that an onLoad is waiting for its onShow.
    pub fn wrap_on_load_to_show(&self) {
        self.state.lock().status.on_load_to_show_wrapped = true;
    }

    /// The pending onShow was delivered.
    pub fn unwrap_on_load_to_show(&self) {
        self.state.lock().status.on_load_to_show_wrapped = false;
    }

    /// Suppress the next `on_ready`.
    pub fn jump_on_ready(&self) {
        self.state.lock().status.ready_suppressed = true;
    }

    /// Stop suppressing `on_ready`.
    pub fn restore_on_ready(&self) {
        self.state.lock().status.ready_suppressed = false;
    }
}
