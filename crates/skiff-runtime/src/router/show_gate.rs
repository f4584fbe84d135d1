//! Per-context show-after-load state machine.

use serde_json::{Value, json};
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum GateState {
    /// `on_load` ran (or is still expected); shows are buffered.
    LoadPending,
    /// First render acknowledged.
    RenderAcked,
    /// `on_show` delivered in this cycle.
    ShowAllowed,
}

/// What to do with a host `onShow`.
#[derive(Debug, PartialEq)]
pub(crate) enum ShowDecision {
    Deliver(Value),
    Buffer,
    Absorb,
}

pub(crate) struct ShowGate {
    state: GateState,
    buffered_show: Option<Value>,
    timer: Option<JoinHandle<()>>,
    generation: u64,
    absorb_next_show: bool,
}

impl ShowGate {
    /// A show arrived before the renderer asked for `onLoad`.
    pub(crate) fn awaiting_load() -> Self {
        Self {
            state: GateState::LoadPending,
            buffered_show: None,
            timer: None,
            generation: 0,
            absorb_next_show: false,
        }
    }

    /// `on_load` ran; `timer` forces the show after the fallback delay.
    pub(crate) fn loaded(generation: u64, timer: Option<JoinHandle<()>>, buffered_show: Option<Value>) -> Self {
        Self {
            state: GateState::LoadPending,
            buffered_show,
            timer,
            generation,
            absorb_next_show: false,
        }
    }

    pub(crate) fn state(&self) -> GateState {
        self.state
    }

    /// Hand over a show buffered before the page loaded.
    pub(crate) fn take_buffered(&mut self) -> Option<Value> {
        self.buffered_show.take()
    }

    /// Render acknowledged; returns the buffered show to deliver now.
    pub(crate) fn on_render_ack(&mut self) -> Option<Value> {
        self.cancel_timer();
        if self.state == GateState::LoadPending {
            self.state = GateState::RenderAcked;
        }
        self.buffered_show.take()
    }

    pub(crate) fn on_host_show(&mut self, event: Value) -> ShowDecision {
        if self.state == GateState::LoadPending {
            self.buffered_show = Some(event);
            return ShowDecision::Buffer;
        }
        if std::mem::take(&mut self.absorb_next_show) {
            return ShowDecision::Absorb;
        }
        ShowDecision::Deliver(event)
    }

    /// Fallback timer fired; returns the show to force, at most once per load.
    pub(crate) fn on_timeout(&mut self, generation: u64) -> Option<Value> {
        if generation != self.generation || self.state != GateState::LoadPending {
            return None;
        }
        self.timer = None;
        let buffered = self.buffered_show.take();
        // Only a show the host has not sent yet can arrive as a duplicate.
        self.absorb_next_show = buffered.is_none();
        Some(buffered.unwrap_or_else(|| json!({})))
    }

    pub(crate) fn shown(&mut self) {
        self.state = GateState::ShowAllowed;
    }

    pub(crate) fn on_hide(&mut self) {
        self.absorb_next_show = false;
        self.buffered_show = None;
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for ShowGate {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}
