use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{AuthenticatedUser, Lead, NewLead, Profile, SortSpec},
    error::GatewayError,
    protocol::{
        AuthChange, AuthChangeEvent, AuthErrorBody, PasswordCredentials, RefreshTokenRequest,
        RestErrorBody, SignUpResponse, TokenResponse, UserResponse,
    },
};
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use crate::{config::Settings, AuthGateway, DataService, GatewayResult};

const LEADS_TABLE: &str = "leads";
const PROFILES_TABLE: &str = "profiles";
const API_KEY_HEADER: &str = "apikey";
const PREFER_HEADER: &str = "Prefer";

struct StoredSession {
    access_token: String,
    refresh_token: Option<String>,
    user: AuthenticatedUser,
}

impl From<TokenResponse> for StoredSession {
    fn from(value: TokenResponse) -> Self {
        Self {
            access_token: value.access_token,
            refresh_token: value.refresh_token,
            user: value.user.into(),
        }
    }
}

/// HTTP client for a Supabase-style backend: GoTrue under `/auth/v1`,
/// PostgREST under `/rest/v1`.
///
/// The backend keeps the issued tokens in memory and broadcasts an
/// [`AuthChange`] every time they change.
pub struct RemoteBackend {
    http: Client,
    base_url: String,
    anon_key: String,
    session: RwLock<Option<StoredSession>>,
    events: broadcast::Sender<AuthChange>,
}

impl RemoteBackend {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            http: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            session: RwLock::new(None),
            events,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(&settings.supabase_url, &settings.supabase_anon_key)
    }

    pub async fn has_session(&self) -> bool {
        self.session.read().await.is_some()
    }

    fn request(&self, method: Method, path: &str, bearer: Option<&str>) -> RequestBuilder {
        self.http
            .request(method, format!("{}/{path}", self.base_url))
            .header(API_KEY_HEADER, &self.anon_key)
            .bearer_auth(bearer.unwrap_or(&self.anon_key))
    }

    async fn access_token(&self) -> Option<String> {
        self.session
            .read()
            .await
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    fn emit(&self, change: AuthChange) {
        debug!(event = ?change.event, "auth state change");
        let _ = self.events.send(change);
    }

    async fn store_session(&self, tokens: TokenResponse, event: AuthChangeEvent) -> AuthenticatedUser {
        let stored = StoredSession::from(tokens);
        let user = stored.user.clone();
        *self.session.write().await = Some(stored);
        self.emit(AuthChange {
            event,
            user: Some(user.clone()),
        });
        user
    }

    async fn clear_session(&self) -> bool {
        let had_session = self.session.write().await.take().is_some();
        if had_session {
            self.emit(AuthChange::signed_out());
        }
        had_session
    }

    async fn refresh_session(&self, refresh_token: String) -> GatewayResult<AuthenticatedUser> {
        let response = self
            .request(
                Method::POST,
                "auth/v1/token?grant_type=refresh_token",
                None,
            )
            .json(&RefreshTokenRequest { refresh_token })
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let tokens: TokenResponse = decode(check_auth(response).await?).await?;
        info!("access token refreshed");
        Ok(self
            .store_session(tokens, AuthChangeEvent::TokenRefreshed)
            .await)
    }

    async fn fetch_user(&self, access_token: &str) -> GatewayResult<AuthenticatedUser> {
        let response = self
            .request(Method::GET, "auth/v1/user", Some(access_token))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let user: UserResponse = decode(check_auth(response).await?).await?;
        Ok(user.into())
    }
}

#[async_trait]
impl AuthGateway for RemoteBackend {
    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> GatewayResult<AuthenticatedUser> {
        let response = self
            .request(Method::POST, "auth/v1/token?grant_type=password", None)
            .json(&PasswordCredentials {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let tokens: TokenResponse = decode(check_auth(response).await?).await?;
        let user = self.store_session(tokens, AuthChangeEvent::SignedIn).await;
        info!(user_id = %user.id, "signed in");
        Ok(user)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
    ) -> GatewayResult<Option<AuthenticatedUser>> {
        let response = self
            .request(Method::POST, "auth/v1/signup", None)
            .json(&PasswordCredentials {
                email: email.to_string(),
                password: password.to_string(),
            })
            .send()
            .await
            .map_err(map_reqwest_error)?;
        match decode::<SignUpResponse>(check_auth(response).await?).await? {
            SignUpResponse::Session(tokens) => {
                let user = self.store_session(tokens, AuthChangeEvent::SignedIn).await;
                info!(user_id = %user.id, "signed up with immediate session");
                Ok(Some(user))
            }
            SignUpResponse::User(user) => {
                info!(user_id = %user.id, "signed up, awaiting email confirmation");
                Ok(Some(user.into()))
            }
        }
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        let Some(session) = self.session.write().await.take() else {
            return Ok(());
        };
        self.emit(AuthChange::signed_out());

        let response = self
            .request(Method::POST, "auth/v1/logout", Some(session.access_token.as_str()))
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_auth(response).await?;
        info!(user_id = %session.user.id, "signed out");
        Ok(())
    }

    async fn current_user(&self) -> GatewayResult<Option<AuthenticatedUser>> {
        let Some(access_token) = self.access_token().await else {
            return Ok(None);
        };

        let user = match self.fetch_user(&access_token).await {
            Ok(user) => user,
            Err(err) if err.status() == Some(StatusCode::UNAUTHORIZED.as_u16()) => {
                let refresh_token = self
                    .session
                    .read()
                    .await
                    .as_ref()
                    .and_then(|session| session.refresh_token.clone());
                let Some(refresh_token) = refresh_token else {
                    self.clear_session().await;
                    return Err(err);
                };
                match self.refresh_session(refresh_token).await {
                    Ok(user) => return Ok(Some(user)),
                    Err(refresh_err) => {
                        warn!(error = %refresh_err, "token refresh failed, dropping session");
                        self.clear_session().await;
                        return Err(refresh_err);
                    }
                }
            }
            Err(err) => return Err(err),
        };

        let changed = {
            let mut guard = self.session.write().await;
            match guard.as_mut() {
                Some(session) if session.user != user => {
                    session.user = user.clone();
                    true
                }
                _ => false,
            }
        };
        if changed {
            self.emit(AuthChange {
                event: AuthChangeEvent::UserUpdated,
                user: Some(user.clone()),
            });
        }
        Ok(Some(user))
    }

    fn subscribe_auth_changes(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }
}

#[async_trait]
impl DataService for RemoteBackend {
    async fn query_leads(&self, sort: SortSpec) -> GatewayResult<Vec<Lead>> {
        let token = self.access_token().await;
        let response = self
            .request(
                Method::GET,
                &format!("rest/v1/{LEADS_TABLE}"),
                token.as_deref(),
            )
            .query(&[("select", "*".to_string()), ("order", sort.order_param())])
            .send()
            .await
            .map_err(map_reqwest_error)?;
        decode(check_rest(response).await?).await
    }

    async fn insert_lead(&self, lead: &NewLead) -> GatewayResult<Lead> {
        let token = self.access_token().await;
        let response = self
            .request(
                Method::POST,
                &format!("rest/v1/{LEADS_TABLE}"),
                token.as_deref(),
            )
            .header(PREFER_HEADER, "return=representation")
            .json(lead)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let mut rows: Vec<Lead> = decode(check_rest(response).await?).await?;
        if rows.is_empty() {
            return Err(GatewayError::Decode(
                "insert returned no lead representation".into(),
            ));
        }
        Ok(rows.swap_remove(0))
    }

    async fn upsert_profile(&self, profile: &Profile) -> GatewayResult<()> {
        let token = self.access_token().await;
        let response = self
            .request(
                Method::POST,
                &format!("rest/v1/{PROFILES_TABLE}"),
                token.as_deref(),
            )
            .header(PREFER_HEADER, "resolution=merge-duplicates,return=minimal")
            .json(profile)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        check_rest(response).await?;
        Ok(())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> GatewayError {
    if err.is_decode() {
        GatewayError::Decode(err.to_string())
    } else {
        GatewayError::Transport(err.to_string())
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> GatewayResult<T> {
    response.json::<T>().await.map_err(map_reqwest_error)
}

async fn check_auth(response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let raw = response.text().await.unwrap_or_default();
    let body: AuthErrorBody = serde_json::from_str(&raw).unwrap_or_default();
    let message = body
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| fallback_message(status, &raw));
    Err(GatewayError::Auth {
        status: Some(status.as_u16()),
        code: body.error_code,
        message,
    })
}

async fn check_rest(response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let raw = response.text().await.unwrap_or_default();
    let body: RestErrorBody = serde_json::from_str(&raw).unwrap_or_default();
    let message = body
        .message
        .or(body.details)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| fallback_message(status, &raw));
    Err(GatewayError::Service {
        status: status.as_u16(),
        message,
    })
}

fn fallback_message(status: StatusCode, raw: &str) -> String {
    let raw = raw.trim();
    if raw.is_empty() {
        format!(
            "request failed with status {}",
            status.canonical_reason().unwrap_or(status.as_str())
        )
    } else {
        raw.to_string()
    }
}

#[cfg(test)]
#[path = "tests/backend_tests.rs"]
mod tests;
