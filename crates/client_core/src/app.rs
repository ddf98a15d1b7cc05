use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    backend::RemoteBackend,
    config::Settings,
    lead_form::LeadForm,
    login::LoginPanel,
    notifications::{NewNotification, NotificationManager},
    router::{View, ViewRouter},
    session::SessionController,
    table::LeadTable,
    AuthGateway, DataService,
};

/// Everything the front end needs, wired once at startup.
pub struct LeadflowApp {
    session: Arc<SessionController>,
    data: Arc<dyn DataService>,
    notifications: NotificationManager,
    router: ViewRouter,
}

impl LeadflowApp {
    /// Never fails: an unreachable or unconfigured backend shows up as
    /// notifications, not as a startup error.
    pub async fn start(settings: &Settings) -> Self {
        if !settings.is_configured() {
            warn!(url = %settings.supabase_url, "starting against placeholder backend");
        }
        let backend = Arc::new(RemoteBackend::from_settings(settings));
        let notifications = NotificationManager::with_display_duration(settings.notification_duration());
        Self::start_with(backend.clone(), backend, notifications).await
    }

    pub async fn start_with(
        auth: Arc<dyn AuthGateway>,
        data: Arc<dyn DataService>,
        notifications: NotificationManager,
    ) -> Self {
        let session = Arc::new(SessionController::new(auth));
        session.subscribe().await;
        match session.initialize().await {
            Ok(user) => info!(restored = user.is_some(), "application started"),
            Err(err) => {
                warn!(error = %err, "could not restore session at startup");
                notifications
                    .add(
                        NewNotification::error("Could not restore session")
                            .with_description(err.to_string()),
                    )
                    .await;
            }
        }

        let table = LeadTable::new(Arc::clone(&data), notifications.clone());
        let router = ViewRouter::mount(session.watch(), table);
        Self {
            session,
            data,
            notifications,
            router,
        }
    }

    pub fn session(&self) -> &Arc<SessionController> {
        &self.session
    }

    pub fn notifications(&self) -> &NotificationManager {
        &self.notifications
    }

    pub fn router(&self) -> &ViewRouter {
        &self.router
    }

    pub async fn view(&self) -> View {
        self.router.view().await
    }

    pub fn login_panel(&self) -> LoginPanel {
        LoginPanel::new(
            Arc::clone(&self.session),
            Arc::clone(&self.data),
            self.notifications.clone(),
        )
    }

    pub fn lead_form(&self) -> LeadForm {
        LeadForm::new(Arc::clone(&self.data), self.notifications.clone())
    }

    pub async fn logout(&self) {
        if let Err(err) = self.session.logout().await {
            warn!(error = %err, "sign-out was not acknowledged");
            self.notifications
                .add(NewNotification::error("Logout failed").with_description(err.message()))
                .await;
        }
    }

    pub async fn shutdown(&self) {
        self.session.teardown().await;
        info!("application shut down");
    }
}

#[cfg(test)]
#[path = "tests/app_tests.rs"]
mod tests;
