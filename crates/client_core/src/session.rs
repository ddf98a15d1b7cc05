use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use shared::{
    domain::{AuthenticatedUser, UserId},
    error::GatewayError,
    protocol::AuthChange,
};
use thiserror::Error;
use tokio::{
    sync::{broadcast, watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{AuthGateway, GatewayResult};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session controller already initialized")]
    AlreadyInitialized,
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// Cancellation handle for an auth-change listener. Dropping it cancels too.
pub struct AuthSubscription {
    listener: JoinHandle<()>,
}

impl AuthSubscription {
    pub fn cancel(self) {
        self.listener.abort();
    }

    pub fn is_active(&self) -> bool {
        !self.listener.is_finished()
    }
}

impl Drop for AuthSubscription {
    fn drop(&mut self) {
        self.listener.abort();
    }
}

/// The local session as published to readers.
///
/// `epoch` advances whenever the signed-in identity changes, including
/// sign-out and sign-in of the same user, so a reader that missed the
/// intermediate values still sees that a new session began. Token refreshes
/// and profile updates of the same user keep the epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    user: Option<AuthenticatedUser>,
    epoch: u64,
}

impl SessionState {
    pub fn user(&self) -> Option<&AuthenticatedUser> {
        self.user.as_ref()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user.as_ref().map(|user| user.id)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    /// Installs `user` and returns the previous one.
    pub fn replace(&mut self, user: Option<AuthenticatedUser>) -> Option<AuthenticatedUser> {
        if self.user_id() != user.as_ref().map(|user| user.id) {
            self.epoch += 1;
        }
        std::mem::replace(&mut self.user, user)
    }
}

/// Sole owner of the local session value.
///
/// The value changes only through [`initialize`](Self::initialize),
/// [`refresh`](Self::refresh), events pushed by the gateway after
/// [`subscribe`](Self::subscribe), and the optimistic clear in
/// [`logout`](Self::logout). Everyone else reads through [`current`](Self::current)
/// or a [`watch`](Self::watch) receiver.
pub struct SessionController {
    gateway: Arc<dyn AuthGateway>,
    session: Arc<watch::Sender<SessionState>>,
    initialized: AtomicBool,
    subscription: Mutex<Option<AuthSubscription>>,
}

impl SessionController {
    pub fn new(gateway: Arc<dyn AuthGateway>) -> Self {
        let (session, _) = watch::channel(SessionState::default());
        Self {
            gateway,
            session: Arc::new(session),
            initialized: AtomicBool::new(false),
            subscription: Mutex::new(None),
        }
    }

    pub fn current(&self) -> Option<AuthenticatedUser> {
        self.session.borrow().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.session.borrow().is_authenticated()
    }

    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.session.subscribe()
    }

    /// One-shot startup fetch. A second call is rejected without touching the gateway.
    pub async fn initialize(&self) -> Result<Option<AuthenticatedUser>, SessionError> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            return Err(SessionError::AlreadyInitialized);
        }
        let user = self.gateway.current_user().await?;
        info!(
            authenticated = user.is_some(),
            "session initialized from gateway"
        );
        replace_session(&self.session, user.clone());
        Ok(user)
    }

    /// Starts following gateway-pushed session changes until
    /// [`teardown`](Self::teardown). Subscribing again replaces the earlier listener.
    pub async fn subscribe(&self) {
        let mut changes = self.gateway.subscribe_auth_changes();
        let session = Arc::clone(&self.session);
        let listener = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => apply_change(&session, change),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "auth change listener lagged behind gateway");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("auth change stream closed");
                        break;
                    }
                }
            }
        });

        let previous = self
            .subscription
            .lock()
            .await
            .replace(AuthSubscription { listener });
        if previous.is_some() {
            debug!("replaced existing auth subscription");
        }
    }

    pub async fn is_subscribed(&self) -> bool {
        self.subscription
            .lock()
            .await
            .as_ref()
            .is_some_and(AuthSubscription::is_active)
    }

    pub async fn teardown(&self) {
        if let Some(subscription) = self.subscription.lock().await.take() {
            subscription.cancel();
            debug!("auth subscription cancelled");
        }
    }

    /// Submits credentials. The local session is left to the subscription;
    /// call [`refresh`](Self::refresh) afterwards to close the race with it.
    pub async fn login(&self, email: &str, password: &str) -> GatewayResult<AuthenticatedUser> {
        let user = self.gateway.sign_in_with_password(email, password).await?;
        info!(user_id = %user.id, "credentials accepted");
        Ok(user)
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> GatewayResult<Option<AuthenticatedUser>> {
        self.gateway.sign_up(email, password).await
    }

    pub async fn refresh(&self) -> GatewayResult<Option<AuthenticatedUser>> {
        let user = self.gateway.current_user().await?;
        replace_session(&self.session, user.clone());
        Ok(user)
    }

    /// Clears the local session before the gateway acknowledges sign-out.
    pub async fn logout(&self) -> GatewayResult<()> {
        if let Some(previous) = replace_session(&self.session, None) {
            info!(user_id = %previous.id, "session cleared locally");
        }
        self.gateway.sign_out().await
    }
}

fn apply_change(session: &watch::Sender<SessionState>, change: AuthChange) {
    debug!(
        event = ?change.event,
        authenticated = change.user.is_some(),
        "applying auth change"
    );
    replace_session(session, change.user);
}

fn replace_session(
    session: &watch::Sender<SessionState>,
    user: Option<AuthenticatedUser>,
) -> Option<AuthenticatedUser> {
    let mut previous = None;
    session.send_modify(|state| previous = state.replace(user));
    previous
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
