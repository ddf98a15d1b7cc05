use std::sync::Arc;

use shared::domain::{Lead, SortKey, SortSpec};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    notifications::{NewNotification, NotificationManager},
    DataService,
};

/// What the lead table shows. Exactly one state applies at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableDisplay {
    Loading,
    Error(String),
    Empty,
    Rows(Vec<Lead>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    pub sort: SortSpec,
    pub display: TableDisplay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Applied,
    Failed,
    /// A newer query was issued while this one was in flight.
    Stale,
}

struct TableState {
    sort: SortSpec,
    issued: u64,
    loading: bool,
    error: Option<String>,
    records: Vec<Lead>,
}

/// Sorted lead listing. Every query carries a ticket; only the response to
/// the most recently issued ticket may replace the displayed records.
pub struct LeadTable {
    data: Arc<dyn DataService>,
    notifications: NotificationManager,
    state: Mutex<TableState>,
}

impl LeadTable {
    pub fn new(data: Arc<dyn DataService>, notifications: NotificationManager) -> Self {
        Self {
            data,
            notifications,
            state: Mutex::new(TableState {
                sort: SortSpec::default(),
                issued: 0,
                loading: false,
                error: None,
                records: Vec::new(),
            }),
        }
    }

    pub async fn sort(&self) -> SortSpec {
        self.state.lock().await.sort
    }

    /// Applies the header-click rule and returns the new sort. Does not query.
    pub async fn toggle_sort(&self, key: SortKey) -> SortSpec {
        let mut state = self.state.lock().await;
        state.sort = state.sort.toggled(key);
        debug!(order = %state.sort.order_param(), "lead sort changed");
        state.sort
    }

    pub async fn reload(&self) -> LoadOutcome {
        let (ticket, sort) = {
            let mut state = self.state.lock().await;
            state.issued += 1;
            state.loading = true;
            state.error = None;
            (state.issued, state.sort)
        };
        debug!(ticket, order = %sort.order_param(), "querying leads");

        let result = self.data.query_leads(sort).await;

        let failure = {
            let mut state = self.state.lock().await;
            if ticket != state.issued {
                debug!(
                    ticket,
                    latest = state.issued,
                    "discarding out-of-order lead query response"
                );
                return LoadOutcome::Stale;
            }
            state.loading = false;
            match result {
                Ok(records) => {
                    debug!(ticket, count = records.len(), "lead query applied");
                    state.records = records;
                    None
                }
                Err(err) => {
                    let message = err.message().to_string();
                    state.error = Some(message.clone());
                    Some(message)
                }
            }
        };

        let Some(message) = failure else {
            return LoadOutcome::Applied;
        };
        warn!(error = %message, "failed to load leads");
        self.notifications
            .add(NewNotification::error("Failed to load leads").with_description(message))
            .await;
        LoadOutcome::Failed
    }

    pub async fn snapshot(&self) -> TableSnapshot {
        let state = self.state.lock().await;
        let display = if state.loading || state.issued == 0 {
            TableDisplay::Loading
        } else if let Some(message) = &state.error {
            TableDisplay::Error(message.clone())
        } else if state.records.is_empty() {
            TableDisplay::Empty
        } else {
            TableDisplay::Rows(state.records.clone())
        };
        TableSnapshot {
            sort: state.sort,
            display,
        }
    }
}

#[cfg(test)]
#[path = "tests/table_tests.rs"]
mod tests;
