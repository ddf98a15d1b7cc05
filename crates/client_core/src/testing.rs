//! In-memory gateways for unit tests.

use std::{collections::VecDeque, sync::Arc};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use shared::{
    domain::{AuthenticatedUser, Lead, LeadId, LeadSource, NewLead, Profile, SortSpec, UserId},
    error::GatewayError,
    protocol::AuthChange,
};
use tokio::sync::{broadcast, oneshot, Mutex, Notify};
use uuid::Uuid;

use crate::{AuthGateway, DataService, GatewayResult};

pub fn user(email: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        id: UserId(Uuid::new_v4()),
        email: Some(email.to_string()),
    }
}

pub fn lead(id: i64, name: &str) -> Lead {
    Lead {
        id: LeadId(id),
        name: name.to_string(),
        email: format!("{}@example.com", name.to_ascii_lowercase()),
        phone: None,
        source: LeadSource::Google,
        interest: None,
        note: None,
        created_at: Utc
            .with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp"),
    }
}

pub struct FakeAuthGateway {
    pub sign_in_result: Mutex<GatewayResult<AuthenticatedUser>>,
    pub sign_up_result: Mutex<GatewayResult<Option<AuthenticatedUser>>>,
    pub sign_out_result: Mutex<GatewayResult<()>>,
    pub current: Mutex<GatewayResult<Option<AuthenticatedUser>>>,
    pub current_user_calls: Mutex<u32>,
    pub sign_out_calls: Mutex<u32>,
    /// When set, `sign_out` waits for a notification before acknowledging.
    pub sign_out_gate: Option<Arc<Notify>>,
    pub sign_in_gate: Option<Arc<Notify>>,
    pub emit_on_sign_in: bool,
    events: broadcast::Sender<AuthChange>,
}

impl FakeAuthGateway {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            sign_in_result: Mutex::new(Err(GatewayError::auth("sign in not scripted"))),
            sign_up_result: Mutex::new(Ok(None)),
            sign_out_result: Mutex::new(Ok(())),
            current: Mutex::new(Ok(None)),
            current_user_calls: Mutex::new(0),
            sign_out_calls: Mutex::new(0),
            sign_out_gate: None,
            sign_in_gate: None,
            emit_on_sign_in: true,
            events,
        }
    }

    pub fn with_current(self, user: Option<AuthenticatedUser>) -> Self {
        *self.current.try_lock().expect("fresh fake") = Ok(user);
        self
    }

    pub fn with_sign_in(self, result: GatewayResult<AuthenticatedUser>) -> Self {
        *self.sign_in_result.try_lock().expect("fresh fake") = result;
        self
    }

    pub fn with_sign_up(self, result: GatewayResult<Option<AuthenticatedUser>>) -> Self {
        *self.sign_up_result.try_lock().expect("fresh fake") = result;
        self
    }

    pub fn with_sign_out_gate(mut self, gate: Arc<Notify>) -> Self {
        self.sign_out_gate = Some(gate);
        self
    }

    pub fn with_sign_in_gate(mut self, gate: Arc<Notify>) -> Self {
        self.sign_in_gate = Some(gate);
        self
    }

    pub fn push(&self, change: AuthChange) {
        let _ = self.events.send(change);
    }
}

#[async_trait]
impl AuthGateway for FakeAuthGateway {
    async fn sign_in_with_password(
        &self,
        _email: &str,
        _password: &str,
    ) -> GatewayResult<AuthenticatedUser> {
        if let Some(gate) = &self.sign_in_gate {
            gate.notified().await;
        }
        let result = self.sign_in_result.lock().await.clone();
        if let Ok(user) = &result {
            *self.current.lock().await = Ok(Some(user.clone()));
            if self.emit_on_sign_in {
                self.push(AuthChange::signed_in(user.clone()));
            }
        }
        result
    }

    async fn sign_up(
        &self,
        _email: &str,
        _password: &str,
    ) -> GatewayResult<Option<AuthenticatedUser>> {
        self.sign_up_result.lock().await.clone()
    }

    async fn sign_out(&self) -> GatewayResult<()> {
        *self.sign_out_calls.lock().await += 1;
        if let Some(gate) = &self.sign_out_gate {
            gate.notified().await;
        }
        *self.current.lock().await = Ok(None);
        self.push(AuthChange::signed_out());
        self.sign_out_result.lock().await.clone()
    }

    async fn current_user(&self) -> GatewayResult<Option<AuthenticatedUser>> {
        *self.current_user_calls.lock().await += 1;
        self.current.lock().await.clone()
    }

    fn subscribe_auth_changes(&self) -> broadcast::Receiver<AuthChange> {
        self.events.subscribe()
    }
}

type PendingQuery = (SortSpec, oneshot::Sender<GatewayResult<Vec<Lead>>>);

/// Data service whose lead queries are answered by the test, one at a time,
/// in whatever order the test chooses.
pub struct FakeDataService {
    pending: Mutex<VecDeque<PendingQuery>>,
    issued: Notify,
    pub auto_reply: Mutex<Option<GatewayResult<Vec<Lead>>>>,
    pub inserted: Mutex<Vec<NewLead>>,
    pub insert_gate: Mutex<Option<Arc<Notify>>>,
    pub insert_error: Mutex<Option<GatewayError>>,
    pub profiles: Mutex<Vec<Profile>>,
    pub profile_error: Mutex<Option<GatewayError>>,
}

impl FakeDataService {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            issued: Notify::new(),
            auto_reply: Mutex::new(None),
            inserted: Mutex::new(Vec::new()),
            insert_gate: Mutex::new(None),
            insert_error: Mutex::new(None),
            profiles: Mutex::new(Vec::new()),
            profile_error: Mutex::new(None),
        }
    }

    pub fn replying(result: GatewayResult<Vec<Lead>>) -> Self {
        let service = Self::new();
        *service.auto_reply.try_lock().expect("fresh fake") = Some(result);
        service
    }

    /// Waits for the next unanswered query and returns its sort plus the
    /// channel that completes it.
    pub async fn next_query(&self) -> PendingQuery {
        loop {
            let notified = self.issued.notified();
            if let Some(query) = self.pending.lock().await.pop_front() {
                return query;
            }
            notified.await;
        }
    }
}

#[async_trait]
impl DataService for FakeDataService {
    async fn query_leads(&self, sort: SortSpec) -> GatewayResult<Vec<Lead>> {
        if let Some(result) = self.auto_reply.lock().await.clone() {
            return result;
        }
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.push_back((sort, tx));
        self.issued.notify_waiters();
        rx.await
            .unwrap_or_else(|_| Err(GatewayError::transport("query abandoned")))
    }

    async fn insert_lead(&self, new_lead: &NewLead) -> GatewayResult<Lead> {
        let gate = self.insert_gate.lock().await.clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(err) = self.insert_error.lock().await.clone() {
            return Err(err);
        }
        let mut inserted = self.inserted.lock().await;
        inserted.push(new_lead.clone());
        let mut stored = lead(inserted.len() as i64, &new_lead.name);
        stored.email = new_lead.email.clone();
        stored.source = new_lead.source;
        Ok(stored)
    }

    async fn upsert_profile(&self, profile: &Profile) -> GatewayResult<()> {
        if let Some(err) = self.profile_error.lock().await.clone() {
            return Err(err);
        }
        self.profiles.lock().await.push(profile.clone());
        Ok(())
    }
}
