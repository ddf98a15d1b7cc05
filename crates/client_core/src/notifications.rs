//! Transient user-facing messages (toasts) with per-message expiry timers.

use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use tokio::{
    sync::{broadcast, Mutex},
    task::JoinHandle,
    time::{sleep_until, Instant},
};
use tracing::debug;

pub const DEFAULT_DISPLAY_DURATION: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotificationVariant {
    #[default]
    Info,
    Success,
    Error,
    Warning,
}

impl NotificationVariant {
    pub fn label(self) -> &'static str {
        match self {
            NotificationVariant::Info => "info",
            NotificationVariant::Success => "success",
            NotificationVariant::Error => "error",
            NotificationVariant::Warning => "warning",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
    pub title: String,
    pub description: Option<String>,
    pub variant: NotificationVariant,
}

impl NewNotification {
    pub fn new(variant: NotificationVariant, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            variant,
        }
    }

    pub fn info(title: impl Into<String>) -> Self {
        Self::new(NotificationVariant::Info, title)
    }

    pub fn success(title: impl Into<String>) -> Self {
        Self::new(NotificationVariant::Success, title)
    }

    pub fn error(title: impl Into<String>) -> Self {
        Self::new(NotificationVariant::Error, title)
    }

    pub fn warning(title: impl Into<String>) -> Self {
        Self::new(NotificationVariant::Warning, title)
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: NotificationId,
    pub title: String,
    pub description: Option<String>,
    pub variant: NotificationVariant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemovalReason {
    Dismissed,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Added(Notification),
    Removed {
        id: NotificationId,
        reason: RemovalReason,
    },
}

struct ActiveNotification {
    notification: Notification,
    expiry: JoinHandle<()>,
}

struct NotificationState {
    display_for: Duration,
    next_id: AtomicU64,
    active: Mutex<Vec<ActiveNotification>>,
    events: broadcast::Sender<NotificationEvent>,
}

/// Ordered set of visible notifications. Each one is removed by whichever
/// comes first: its expiry timer or an explicit [`NotificationManager::remove`].
///
/// Cloning yields another handle onto the same set.
#[derive(Clone)]
pub struct NotificationManager {
    inner: Arc<NotificationState>,
}

impl Default for NotificationManager {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::with_display_duration(DEFAULT_DISPLAY_DURATION)
    }

    pub fn with_display_duration(display_for: Duration) -> Self {
        let (events, _) = broadcast::channel(128);
        Self {
            inner: Arc::new(NotificationState {
                display_for,
                next_id: AtomicU64::new(0),
                active: Mutex::new(Vec::new()),
                events,
            }),
        }
    }

    pub fn display_duration(&self) -> Duration {
        self.inner.display_for
    }

    /// Must be called from within a tokio runtime; the expiry timer is a spawned task.
    pub async fn add(&self, new: NewNotification) -> NotificationId {
        let id = NotificationId(self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let notification = Notification {
            id,
            title: new.title,
            description: new.description,
            variant: new.variant,
        };

        let deadline = Instant::now() + self.inner.display_for;
        let state = Arc::downgrade(&self.inner);
        let mut active = self.inner.active.lock().await;
        let expiry = tokio::spawn(expire_at(state, id, deadline));
        active.push(ActiveNotification {
            notification: notification.clone(),
            expiry,
        });
        drop(active);

        debug!(id = %id, variant = notification.variant.label(), title = %notification.title, "notification added");
        let _ = self.inner.events.send(NotificationEvent::Added(notification));
        id
    }

    /// Removing an unknown or already expired id is a no-op that returns `false`.
    pub async fn remove(&self, id: NotificationId) -> bool {
        take(&self.inner, id, RemovalReason::Dismissed).await
    }

    pub async fn active(&self) -> Vec<Notification> {
        self.inner
            .active
            .lock()
            .await
            .iter()
            .map(|entry| entry.notification.clone())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.active.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NotificationEvent> {
        self.inner.events.subscribe()
    }
}

async fn expire_at(state: Weak<NotificationState>, id: NotificationId, deadline: Instant) {
    sleep_until(deadline).await;
    if let Some(state) = state.upgrade() {
        take(&state, id, RemovalReason::Expired).await;
    }
}

async fn take(state: &NotificationState, id: NotificationId, reason: RemovalReason) -> bool {
    let removed = {
        let mut active = state.active.lock().await;
        active
            .iter()
            .position(|entry| entry.notification.id == id)
            .map(|index| active.remove(index))
    };

    let Some(entry) = removed else {
        return false;
    };
    if reason == RemovalReason::Dismissed {
        entry.expiry.abort();
    }
    debug!(id = %id, ?reason, "notification removed");
    let _ = state.events.send(NotificationEvent::Removed { id, reason });
    true
}

impl Drop for NotificationState {
    fn drop(&mut self) {
        for entry in self.active.get_mut().iter() {
            entry.expiry.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/notifications_tests.rs"]
mod tests;
