use std::sync::Arc;

use parking_lot::Mutex;
use skiff_bus::EventBus;
use skiff_core::config::TabItem;
use skiff_core::errors::{HostError, NavigationError};
use skiff_core::events::{RouteEvent, TabItemTap};
use skiff_core::ids::{ContextId, HandleId};
use skiff_core::path::front_uri;
use tracing::{debug, warn};

use super::{HandlePhase, SimpleHandle, Target};
use crate::host::{HostBridge, OpenVerb};
use crate::signals::Signal;

struct GroupState {
    current_index: usize,
    phase: HandlePhase,
}

/// Tab-bar group: one child handle per tab, created up front.
///
/// A child gets its context on first visit and keeps it until the group is
/// closed, so switching tabs preserves page state.
pub struct TabGroupHandle {
    id: HandleId,
    tabs: Vec<TabItem>,
    children: Vec<Arc<SimpleHandle>>,
    state: Mutex<GroupState>,
}

impl TabGroupHandle {
    /// Build a group whose visible tab shows `initial_uri`.
    ///
    /// Falls back to the first tab when `initial_uri` is not a tab page.
    pub fn new(
        tabs: Vec<TabItem>,
        initial_uri: &str,
        host: &Arc<dyn HostBridge>,
        signals: &EventBus<Signal>,
    ) -> Self {
        let initial_path = front_uri(initial_uri);
        let current_index = tabs
            .iter()
            .position(|t| t.page_path == initial_path)
            .unwrap_or(0);
        let children = tabs
            .iter()
            .enumerate()
            .map(|(i, tab)| {
                let uri = if i == current_index {
                    initial_uri.to_string()
                } else {
                    tab.page_path.clone()
                };
                Arc::new(SimpleHandle::new(
                    uri,
                    Some(i),
                    Arc::clone(host),
                    signals.clone(),
                ))
            })
            .collect();
        Self {
            id: HandleId::new(),
            tabs,
            children,
            state: Mutex::new(GroupState {
                current_index,
                phase: HandlePhase::Created,
            }),
        }
    }

    /// Local identity.
    pub fn id(&self) -> &HandleId {
        &self.id
    }

    /// Tab definitions.
    pub fn tabs(&self) -> &[TabItem] {
        &self.tabs
    }

    /// All children, in tab order.
    pub fn children(&self) -> &[Arc<SimpleHandle>] {
        &self.children
    }

    /// Index of the visible tab.
    pub fn current_index(&self) -> usize {
        self.state.lock().current_index
    }

    /// The visible child.
    pub fn current(&self) -> Arc<SimpleHandle> {
        Arc::clone(&self.children[self.current_index()])
    }

    /// Group phase.
    pub fn phase(&self) -> HandlePhase {
        self.state.lock().phase
    }

    /// Adopt the entry context for the visible tab.
    pub fn init(&self, context_id: ContextId) {
        self.current().init(context_id);
        self.state.lock().phase = HandlePhase::Open;
    }

    /// Open a context for the visible tab.
    pub async fn open(&self, verb: OpenVerb) -> Result<ContextId, HostError> {
        let context_id = self.current().open(verb).await?;
        self.state.lock().phase = HandlePhase::Open;
        Ok(context_id)
    }

    /// Show tab `index`, creating its context on first visit.
    pub async fn switch_to_index(&self, index: usize) -> Result<ContextId, NavigationError> {
        let Some(child) = self.children.get(index).cloned() else {
            return Err(NavigationError::NotATab {
                path: format!("#{index}"),
            });
        };

        let first_visit = child.context_id().is_none() || child.phase() == HandlePhase::Closed;
        let context_id = if first_visit {
            let context_id = child
                .open(OpenVerb::SwitchTab)
                .await
                .map_err(NavigationError::ContextCreation)?;
            child.on_enqueue();
            context_id
        } else {
            child.revisit(OpenVerb::SwitchTab).await?
        };

        let previous = {
            let mut st = self.state.lock();
            std::mem::replace(&mut st.current_index, index)
        };
        if previous != index {
            self.children[previous].hide();
        }
        child.show();
        debug!(index, first_visit, context_id = %context_id, "tab switched");
        Ok(context_id)
    }

    /// Reconcile a tab switch the host already performed.
    ///
    /// Returns the tap event to deliver to the newly visible tab page.
    pub fn on_switch_tab(&self, route: &RouteEvent) -> Option<TabItemTap> {
        let index = route.to_tab_index.or_else(|| {
            let page = route.to_page.as_deref().map(front_uri)?;
            self.tabs.iter().position(|t| t.page_path == page)
        });
        let Some(index) = index.filter(|i| *i < self.children.len()) else {
            warn!(?route, "switchTab route does not match any tab");
            return None;
        };

        let child = &self.children[index];
        if let Some(to_id) = &route.to_id {
            if child.context_id().as_ref() != Some(to_id) || child.phase() == HandlePhase::Closed {
                child.init(to_id.clone());
                child.on_enqueue();
            }
        }

        let previous = {
            let mut st = self.state.lock();
            std::mem::replace(&mut st.current_index, index)
        };
        if previous != index {
            self.children[previous].hide();
        }
        child.show();

        let tab = &self.tabs[index];
        Some(TabItemTap {
            context_id: child.context_id(),
            index,
            page_path: tab.page_path.clone(),
            text: tab.text.clone(),
            from: Some("switchTab".to_string()),
        })
    }

    /// Reopen as the only page, showing `uri`'s tab.
    ///
    /// The other tabs are unloaded and start fresh on their next visit. Nothing
    /// changes when the host rejects the reopen.
    pub async fn relaunch(&self, uri: &str) -> Result<ContextId, HostError> {
        let path = front_uri(uri);
        let index = self
            .tabs
            .iter()
            .position(|t| t.page_path == path)
            .unwrap_or_else(|| self.current_index());
        let context_id = self.children[index].relaunch(uri).await?;
        for (i, child) in self.children.iter().enumerate() {
            if i != index {
                child.close();
                child.reset(&self.tabs[i].page_path);
            }
        }
        let mut st = self.state.lock();
        st.current_index = index;
        st.phase = HandlePhase::Open;
        Ok(context_id)
    }

    /// Close every child. Idempotent.
    pub fn close(&self) {
        {
            let mut st = self.state.lock();
            if st.phase == HandlePhase::Closed {
                return;
            }
            st.phase = HandlePhase::Closed;
        }
        for child in &self.children {
            child.close();
        }
    }

    /// Matches the group itself or any child.
    pub fn is_the_slave(&self, target: &Target) -> bool {
        matches!(target, Target::Handle(id) if id == &self.id)
            || self.children.iter().any(|c| c.is_the_slave(target))
    }

    /// Child matching `target`; the visible child when `target` names the group.
    pub fn find_child(&self, target: &Target) -> Option<Arc<SimpleHandle>> {
        if matches!(target, Target::Handle(id) if id == &self.id) {
            return Some(self.current());
        }
        self.children.iter().find(|c| c.is_the_slave(target)).cloned()
    }
}
