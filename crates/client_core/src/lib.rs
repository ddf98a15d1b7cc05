use async_trait::async_trait;
use shared::{
    domain::{AuthenticatedUser, Lead, NewLead, Profile, SortSpec},
    error::GatewayError,
    protocol::AuthChange,
};
use tokio::sync::broadcast;

pub mod app;
pub mod backend;
pub mod busy;
pub mod config;
pub mod lead_form;
pub mod login;
pub mod notifications;
pub mod router;
pub mod session;
pub mod table;

#[cfg(test)]
pub(crate) mod testing;

pub use app::LeadflowApp;
pub use backend::RemoteBackend;
pub use notifications::{
    NewNotification, Notification, NotificationEvent, NotificationId, NotificationManager,
    NotificationVariant,
};
pub use router::{ActiveView, View, ViewRouter};
pub use session::{SessionController, SessionError, SessionState};
pub use table::{LeadTable, TableDisplay, TableSnapshot};

pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Hosted identity service: credential checks and session issuance.
#[async_trait]
pub trait AuthGateway: Send + Sync {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> GatewayResult<AuthenticatedUser>;
    async fn sign_up(&self, email: &str, password: &str)
        -> GatewayResult<Option<AuthenticatedUser>>;
    async fn sign_out(&self) -> GatewayResult<()>;
    async fn current_user(&self) -> GatewayResult<Option<AuthenticatedUser>>;
    /// Every session change the gateway observes, for as long as the receiver lives.
    fn subscribe_auth_changes(&self) -> broadcast::Receiver<AuthChange>;
}

/// Hosted row store holding leads and profiles.
#[async_trait]
pub trait DataService: Send + Sync {
    async fn query_leads(&self, sort: SortSpec) -> GatewayResult<Vec<Lead>>;
    async fn insert_lead(&self, lead: &NewLead) -> GatewayResult<Lead>;
    async fn upsert_profile(&self, profile: &Profile) -> GatewayResult<()>;
}
