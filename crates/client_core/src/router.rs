use shared::domain::{SortKey, SortSpec};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::{
    session::SessionState,
    table::{LeadTable, LoadOutcome, TableSnapshot},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Unauthenticated,
    Form,
    Table,
}

/// The authenticated views a user can switch between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveView {
    Form,
    Table,
}

impl From<ActiveView> for View {
    fn from(value: ActiveView) -> Self {
        match value {
            ActiveView::Form => View::Form,
            ActiveView::Table => View::Table,
        }
    }
}

struct RouterState {
    selected: ActiveView,
    seen_epoch: u64,
}

/// Session-gated view switch. The session is read from the controller's
/// watch channel on every call, so a cleared session shows as
/// [`View::Unauthenticated`] immediately. Session boundaries are detected by
/// [`SessionState::epoch`], so a sign-out followed by a sign-in that happened
/// between two reads still starts the new session on the form.
pub struct ViewRouter {
    session: watch::Receiver<SessionState>,
    state: Mutex<RouterState>,
    table: LeadTable,
}

impl ViewRouter {
    pub fn mount(session: watch::Receiver<SessionState>, table: LeadTable) -> Self {
        let seen_epoch = session.borrow().epoch();
        Self {
            session,
            state: Mutex::new(RouterState {
                selected: ActiveView::Form,
                seen_epoch,
            }),
            table,
        }
    }

    pub fn table(&self) -> &LeadTable {
        &self.table
    }

    pub async fn view(&self) -> View {
        let current = self.session.borrow().clone();
        let mut state = self.state.lock().await;
        observe(&mut state, &current)
    }

    /// Switches between form and table. Entering the table loads it; the
    /// call is ignored while signed out.
    pub async fn select(&self, target: ActiveView) -> View {
        let entering_table = {
            let current = self.session.borrow().clone();
            let mut state = self.state.lock().await;
            if observe(&mut state, &current) == View::Unauthenticated {
                debug!(?target, "view selection ignored while signed out");
                return View::Unauthenticated;
            }
            let entering = target == ActiveView::Table && state.selected != ActiveView::Table;
            state.selected = target;
            entering
        };

        if entering_table {
            self.table.reload().await;
        }
        self.view().await
    }

    /// Header click on the lead table. Re-queries only while the table is shown.
    pub async fn sort_by(&self, key: SortKey) -> (SortSpec, Option<LoadOutcome>) {
        let sort = self.table.toggle_sort(key).await;
        if self.view().await != View::Table {
            return (sort, None);
        }
        (sort, Some(self.table.reload().await))
    }

    pub async fn table_snapshot(&self) -> TableSnapshot {
        self.table.snapshot().await
    }
}

fn observe(state: &mut RouterState, current: &SessionState) -> View {
    if current.epoch() != state.seen_epoch {
        match current.user_id() {
            Some(user_id) => info!(%user_id, "session established, showing lead form"),
            None => info!("session cleared, showing login"),
        }
        state.selected = ActiveView::Form;
        state.seen_epoch = current.epoch();
    }

    if current.is_authenticated() {
        state.selected.into()
    } else {
        View::Unauthenticated
    }
}

#[cfg(test)]
#[path = "tests/router_tests.rs"]
mod tests;
