//! The navigation stack.
//!
//! Bottom is the entry page, top is the active page. Every method snapshots
//! what it needs under the lock and calls `close()` or callbacks after
//! releasing it. A panicking `close()` is logged and does not stop the rest
//! of a bulk teardown.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use skiff_core::ids::ContextId;
use tracing::{debug, error};

use crate::handle::{PageSnapshot, RendererHandle, Target};

/// Ordered collection of live handles.
#[derive(Default)]
pub struct NavigationStack {
    handles: Mutex<Vec<RendererHandle>>,
}

impl NavigationStack {
    /// Empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Put `handle` on top.
    pub fn push(&self, handle: RendererHandle) {
        debug!(handle_id = %handle.id(), uri = %handle.uri(), "push");
        self.handles.lock().push(handle);
    }

    /// Pop and close up to `delta` handles, top first.
    pub fn pop(&self, delta: usize) -> Vec<RendererHandle> {
        let popped: Vec<RendererHandle> = {
            let mut handles = self.handles.lock();
            let keep = handles.len().saturating_sub(delta);
            handles.drain(keep..).rev().collect()
        };
        for handle in &popped {
            close_logged(handle);
        }
        popped
    }

    /// Swap the top for `handle`, closing the old top. Pushes when empty.
    pub fn replace_top(&self, handle: RendererHandle) -> Option<RendererHandle> {
        let old = {
            let mut handles = self.handles.lock();
            match handles.last_mut() {
                Some(top) => Some(std::mem::replace(top, handle)),
                None => {
                    handles.push(handle);
                    None
                }
            }
        };
        if let Some(old) = &old {
            close_logged(old);
        }
        old
    }

    /// Pop until the top matches `target`, closing and reporting each popped handle.
    ///
    /// No-op when nothing matches.
    pub fn pop_until<F>(&self, target: &Target, mut on_each: F) -> usize
    where
        F: FnMut(&RendererHandle),
    {
        let popped: Vec<RendererHandle> = {
            let mut handles = self.handles.lock();
            let Some(pos) = handles.iter().rposition(|h| h.is_the_slave(target)) else {
                return 0;
            };
            handles.drain(pos + 1..).rev().collect()
        };
        for handle in &popped {
            close_logged(handle);
            on_each(handle);
        }
        popped.len()
    }

    /// Whether any handle matches `target`.
    pub fn has(&self, target: &Target) -> bool {
        self.handles.lock().iter().any(|h| h.is_the_slave(target))
    }

    /// First handle (bottom up) matching `target`.
    ///
    /// A match inside a tab group yields the group with `want_group`, and the
    /// matching child page otherwise.
    pub fn seek(&self, target: &Target, want_group: bool) -> Option<RendererHandle> {
        let found = self
            .handles
            .lock()
            .iter()
            .find(|h| h.is_the_slave(target))
            .cloned()?;
        if want_group {
            return Some(found);
        }
        found.find_child(target).map(RendererHandle::Simple)
    }

    /// Close everything top first, then empty the stack.
    pub fn clear(&self) {
        let drained: Vec<RendererHandle> = {
            let mut handles = self.handles.lock();
            handles.drain(..).rev().collect()
        };
        for handle in &drained {
            close_logged(handle);
        }
        debug!(closed = drained.len(), "stack cleared");
    }

    /// Close everything except `keep`, top first, leaving `keep` as the only handle.
    ///
    /// `keep` is pushed when it was not on the stack. Returns how many handles were closed.
    pub fn clear_except(&self, keep: &RendererHandle) -> usize {
        let drained: Vec<RendererHandle> = {
            let mut handles = self.handles.lock();
            let drained: Vec<RendererHandle> = handles.drain(..).rev().filter(|h| !h.same_as(keep)).collect();
            handles.push(keep.clone());
            drained
        };
        for handle in &drained {
            close_logged(handle);
        }
        debug!(closed = drained.len(), kept = %keep.uri(), "stack cleared down to one");
        drained.len()
    }

    /// Visit every handle bottom up; `recursive` visits tab group children instead of groups.
    pub fn each<F>(&self, recursive: bool, mut f: F)
    where
        F: FnMut(&RendererHandle),
    {
        let handles: Vec<RendererHandle> = self.handles.lock().clone();
        for handle in &handles {
            match handle {
                RendererHandle::Composite(group) if recursive => {
                    for child in group.children() {
                        f(&RendererHandle::Simple(Arc::clone(child)));
                    }
                }
                _ => f(handle),
            }
        }
    }

    /// Active handle.
    pub fn top(&self) -> Option<RendererHandle> {
        self.handles.lock().last().cloned()
    }

    /// The `n`th handle from the top (0 = top).
    pub fn top_n(&self, n: usize) -> Option<RendererHandle> {
        let handles = self.handles.lock();
        handles.len().checked_sub(n + 1).map(|i| handles[i].clone())
    }

    /// Topmost handle not being popped by a back navigation.
    pub fn top_non_closing(&self) -> Option<RendererHandle> {
        self.handles
            .lock()
            .iter()
            .rev()
            .find(|h| !h.status().is_closing)
            .cloned()
    }

    /// Number of handles.
    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    /// Whether the stack is empty (before cold start).
    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }

    /// Bottom-up view of the stack.
    pub fn snapshot(&self) -> Vec<PageSnapshot> {
        let handles: Vec<RendererHandle> = self.handles.lock().clone();
        handles.iter().map(RendererHandle::snapshot).collect()
    }

    /// Context of the active page.
    pub fn current_context_id(&self) -> Option<ContextId> {
        self.top().and_then(|h| h.context_id())
    }
}

fn close_logged(handle: &RendererHandle) {
    if catch_unwind(AssertUnwindSafe(|| handle.close())).is_err() {
        error!(handle_id = %handle.id(), uri = %handle.uri(), "teardown panicked");
    }
}
