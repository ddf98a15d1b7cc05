use std::sync::Arc;

use tokio::sync::watch;

/// In-progress indicator for a panel whose submit borrows it mutably.
/// Renderers hold a [`watch`](Self::watch) receiver to follow it while the
/// submit is outstanding.
#[derive(Clone)]
pub struct BusyFlag {
    state: Arc<watch::Sender<bool>>,
}

impl BusyFlag {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn is_busy(&self) -> bool {
        *self.state.borrow()
    }

    pub fn watch(&self) -> watch::Receiver<bool> {
        self.state.subscribe()
    }

    /// Marks the flag busy until the returned guard is dropped.
    pub(crate) fn enter(&self) -> BusyGuard {
        self.state.send_replace(true);
        BusyGuard {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for BusyFlag {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct BusyGuard {
    state: Arc<watch::Sender<bool>>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.state.send_replace(false);
    }
}
