//! In-process host used by tests and the replay CLI.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use skiff_core::errors::HostError;
use skiff_core::ids::ContextId;
use tracing::debug;

use crate::host::{HostBridge, OpenReply, OpenRequest, OpenVerb};

/// One recorded host call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "call", rename_all = "camelCase")]
pub enum HostCall {
    /// [`HostBridge::open`].
    Open {
        /// Verb requested.
        verb: OpenVerb,
        /// Request as sent.
        request: OpenRequest,
        /// Context replied, absent on failure.
        reply: Option<ContextId>,
    },
    /// [`HostBridge::navigate_back`].
    NavigateBack {
        /// Pages to pop.
        delta: usize,
    },
    /// [`HostBridge::load_sub_package`].
    LoadSubPackage {
        /// Package root.
        root: String,
    },
    /// [`HostBridge::network_type`].
    NetworkType,
}

/// A [`HostBridge`] that assigns sequential context ids and records every call.
///
/// `redirectTo`, `reLaunch` and `switchTab` reuse the requested context when
/// one is given, like a real host reusing a webview.
pub struct SimulatedHost {
    next_id: AtomicU64,
    calls: Mutex<Vec<HostCall>>,
    failures: Mutex<HashMap<String, String>>,
    network: Mutex<String>,
}

impl Default for SimulatedHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedHost {
    /// Host on wifi whose first context id is `1`.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            network: Mutex::new("wifi".to_string()),
        }
    }

    /// Allocate a context id the way the host does for the entry page.
    pub fn reserve_context(&self) -> ContextId {
        ContextId::from(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Make the next call named `call` (`navigateTo`, `navigateBack`, ...) fail.
    pub fn fail_next(&self, call: &str, reason: &str) {
        let _ = self
            .failures
            .lock()
            .insert(call.to_string(), reason.to_string());
    }

    /// Network type reported from now on.
    pub fn set_network_type(&self, network: &str) {
        *self.network.lock() = network.to_string();
    }

    /// Every call so far, oldest first.
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().clone()
    }

    /// Number of successful `open` calls.
    pub fn open_count(&self) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| matches!(c, HostCall::Open { reply: Some(_), .. }))
            .count()
    }

    fn check(&self, call: &str) -> Result<(), HostError> {
        match self.failures.lock().remove(call) {
            Some(reason) => Err(HostError::Rejected {
                call: call.to_string(),
                reason,
            }),
            None => Ok(()),
        }
    }

    fn record(&self, call: HostCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl HostBridge for SimulatedHost {
    async fn open(&self, verb: OpenVerb, request: OpenRequest) -> Result<OpenReply, HostError> {
        if let Err(err) = self.check(verb.as_str()) {
            self.record(HostCall::Open {
                verb,
                request,
                reply: None,
            });
            return Err(err);
        }
        let reuse = matches!(
            verb,
            OpenVerb::RedirectTo | OpenVerb::ReLaunch | OpenVerb::SwitchTab
        );
        let context_id = match (&request.context_id, reuse) {
            (Some(id), true) => id.clone(),
            _ => self.reserve_context(),
        };
        debug!(verb = verb.as_str(), uri = %request.uri, context_id = %context_id, "simulated open");
        self.record(HostCall::Open {
            verb,
            request,
            reply: Some(context_id.clone()),
        });
        Ok(OpenReply { context_id })
    }

    async fn navigate_back(&self, delta: usize) -> Result<(), HostError> {
        self.record(HostCall::NavigateBack { delta });
        self.check("navigateBack")
    }

    async fn load_sub_package(&self, root: &str) -> Result<(), HostError> {
        self.record(HostCall::LoadSubPackage {
            root: root.to_string(),
        });
        self.check("loadSubPackage")
    }

    async fn network_type(&self) -> Result<String, HostError> {
        self.record(HostCall::NetworkType);
        self.check("getNetworkType")?;
        Ok(self.network.lock().clone())
    }
}
