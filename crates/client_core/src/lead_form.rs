use std::sync::Arc;

use shared::domain::{Lead, NewLead};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::{
    busy::BusyFlag,
    notifications::{NewNotification, NotificationManager},
    DataService,
};

/// Lead capture form. `draft` is edited in place by the front end.
pub struct LeadForm {
    data: Arc<dyn DataService>,
    notifications: NotificationManager,
    pub draft: NewLead,
    submitting: BusyFlag,
}

impl LeadForm {
    pub fn new(data: Arc<dyn DataService>, notifications: NotificationManager) -> Self {
        Self {
            data,
            notifications,
            draft: NewLead::default(),
            submitting: BusyFlag::new(),
        }
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.is_busy()
    }

    pub fn watch_submitting(&self) -> watch::Receiver<bool> {
        self.submitting.watch()
    }

    pub async fn submit(&mut self) -> Option<Lead> {
        let lead = normalized(&self.draft);
        let mut missing = Vec::new();
        if lead.name.is_empty() {
            missing.push("name");
        }
        if lead.email.is_empty() {
            missing.push("email");
        }
        if !missing.is_empty() {
            self.notifications
                .add(
                    NewNotification::warning("Missing required fields")
                        .with_description(format!("Please fill in: {}", missing.join(", "))),
                )
                .await;
            return None;
        }

        let result = {
            let _busy = self.submitting.enter();
            self.data.insert_lead(&lead).await
        };

        match result {
            Ok(stored) => {
                info!(lead_id = stored.id.0, source = %stored.source, "lead submitted");
                self.notifications
                    .add(NewNotification::success("Lead submitted"))
                    .await;
                self.draft = NewLead::default();
                Some(stored)
            }
            Err(err) => {
                warn!(error = %err, "lead submission failed");
                self.notifications
                    .add(
                        NewNotification::error("Failed to submit lead")
                            .with_description(err.message()),
                    )
                    .await;
                None
            }
        }
    }
}

fn normalized(draft: &NewLead) -> NewLead {
    NewLead {
        name: draft.name.trim().to_string(),
        email: draft.email.trim().to_string(),
        phone: optional(&draft.phone),
        source: draft.source,
        interest: optional(&draft.interest),
        note: optional(&draft.note),
    }
}

fn optional(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
