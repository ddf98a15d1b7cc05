//! Sign-in / sign-up surface shown while no session exists.

use std::sync::Arc;

use shared::domain::{AuthenticatedUser, Profile};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    busy::BusyFlag,
    notifications::{NewNotification, NotificationManager},
    session::SessionController,
    DataService,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    SignIn,
    SignUp,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    SignedIn(AuthenticatedUser),
    SignedUp(Option<AuthenticatedUser>),
    Rejected,
    MissingFields,
}

pub struct LoginPanel {
    session: Arc<SessionController>,
    data: Arc<dyn DataService>,
    notifications: NotificationManager,
    mode: AuthMode,
    pub email: String,
    pub password: String,
    pub full_name: String,
    loading: BusyFlag,
    show_resend: bool,
}

impl LoginPanel {
    pub fn new(
        session: Arc<SessionController>,
        data: Arc<dyn DataService>,
        notifications: NotificationManager,
    ) -> Self {
        Self {
            session,
            data,
            notifications,
            mode: AuthMode::default(),
            email: String::new(),
            password: String::new(),
            full_name: String::new(),
            loading: BusyFlag::new(),
            show_resend: false,
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_busy()
    }

    /// Follows [`is_loading`](Self::is_loading) while a submit is outstanding.
    pub fn watch_loading(&self) -> watch::Receiver<bool> {
        self.loading.watch()
    }

    /// The "resend confirmation email" affordance, only offered in sign-in mode.
    pub fn shows_resend(&self) -> bool {
        self.show_resend && self.mode == AuthMode::SignIn
    }

    pub fn toggle_mode(&mut self) -> AuthMode {
        self.mode = match self.mode {
            AuthMode::SignIn => AuthMode::SignUp,
            AuthMode::SignUp => AuthMode::SignIn,
        };
        self.reset_fields();
        self.show_resend = false;
        self.mode
    }

    pub async fn submit(&mut self) -> AuthOutcome {
        match self.mode {
            AuthMode::SignIn => self.sign_in().await,
            AuthMode::SignUp => self.sign_up().await,
        }
    }

    async fn sign_in(&mut self) -> AuthOutcome {
        if !self.require_fields().await {
            return AuthOutcome::MissingFields;
        }

        let result = {
            let _busy = self.loading.enter();
            self.session.login(self.email.trim(), &self.password).await
        };

        let user = match result {
            Ok(user) => user,
            Err(err) if err.is_email_not_confirmed() => {
                info!("sign-in blocked until email is confirmed");
                self.notify(
                    NewNotification::warning("Email not confirmed").with_description(
                        "Please check your inbox and confirm your email before logging in.",
                    ),
                )
                .await;
                self.show_resend = true;
                return AuthOutcome::Rejected;
            }
            Err(err) => {
                warn!(error = %err, "sign-in failed");
                self.notify(NewNotification::error("Login failed").with_description(err.message()))
                    .await;
                self.show_resend = false;
                return AuthOutcome::Rejected;
            }
        };

        self.show_resend = false;
        self.notify(NewNotification::success("Login successful"))
            .await;
        if let Err(err) = self.session.refresh().await {
            warn!(error = %err, "session refresh after sign-in failed");
            self.notify(
                NewNotification::error("Could not refresh session").with_description(err.message()),
            )
            .await;
        }
        self.reset_fields();
        AuthOutcome::SignedIn(user)
    }

    async fn sign_up(&mut self) -> AuthOutcome {
        if !self.require_fields().await {
            return AuthOutcome::MissingFields;
        }

        let _busy = self.loading.enter();
        let result = self.session.sign_up(self.email.trim(), &self.password).await;
        let user = match result {
            Ok(user) => user,
            Err(err) => {
                warn!(error = %err, "sign-up failed");
                self.notify(
                    NewNotification::error("Sign up failed").with_description(err.message()),
                )
                .await;
                return AuthOutcome::Rejected;
            }
        };

        if let Some(user) = &user {
            let profile = Profile {
                id: user.id,
                full_name: self.full_name.trim().to_string(),
            };
            if let Err(err) = self.data.upsert_profile(&profile).await {
                warn!(user_id = %user.id, error = %err, "profile upsert after sign-up failed");
                self.notify(
                    NewNotification::warning("Profile could not be saved")
                        .with_description(err.message()),
                )
                .await;
            }
            self.notify(NewNotification::success(
                "Sign up successful! Please check your email to confirm.",
            ))
            .await;
            self.mode = AuthMode::SignIn;
            self.reset_fields();
        }
        AuthOutcome::SignedUp(user)
    }

    /// The backend offers no resend call, so this only points the user at
    /// their inbox.
    pub async fn resend_confirmation(&mut self) {
        let _busy = self.loading.enter();
        self.notify(NewNotification::info(
            "Please check your email for the confirmation link.",
        ))
        .await;
    }

    async fn require_fields(&self) -> bool {
        let mut missing = Vec::new();
        if self.mode == AuthMode::SignUp && self.full_name.trim().is_empty() {
            missing.push("full name");
        }
        if self.email.trim().is_empty() {
            missing.push("email");
        }
        if self.password.is_empty() {
            missing.push("password");
        }
        if missing.is_empty() {
            return true;
        }
        self.notify(
            NewNotification::warning("Missing required fields")
                .with_description(format!("Please fill in: {}", missing.join(", "))),
        )
        .await;
        false
    }

    fn reset_fields(&mut self) {
        self.email.clear();
        self.password.clear();
        self.full_name.clear();
    }

    async fn notify(&self, notification: NewNotification) {
        self.notifications.add(notification).await;
    }
}

#[cfg(test)]
#[path = "tests/login_tests.rs"]
mod tests;
