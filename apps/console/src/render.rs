use std::fmt::Write as _;

use client_core::{
    login::{AuthMode, LoginPanel},
    Notification, NotificationEvent, TableDisplay, TableSnapshot, View,
};
use shared::domain::{AuthenticatedUser, Lead, NewLead};

pub fn notification_event(event: &NotificationEvent) -> String {
    match event {
        NotificationEvent::Added(notification) => format!("+ {}", notification_line(notification)),
        NotificationEvent::Removed { id, reason } => format!("- #{id} ({reason:?})"),
    }
}

pub fn notification_line(notification: &Notification) -> String {
    let mut line = format!(
        "#{} [{}] {}",
        notification.id,
        notification.variant.label(),
        notification.title
    );
    if let Some(description) = &notification.description {
        let _ = write!(line, ": {description}");
    }
    line
}

pub fn login_panel(panel: &LoginPanel) -> String {
    let mode = match panel.mode() {
        AuthMode::SignIn => "sign in",
        AuthMode::SignUp => "sign up",
    };
    let mut out = format!("== {mode} ==\n  email:    {}\n", panel.email);
    let _ = writeln!(out, "  password: {}", "*".repeat(panel.password.chars().count()));
    if panel.mode() == AuthMode::SignUp {
        let _ = writeln!(out, "  name:     {}", panel.full_name);
    }
    if panel.shows_resend() {
        out.push_str("  (type 'resend' to resend the confirmation email)\n");
    }
    out
}

pub fn lead_form(user: Option<&AuthenticatedUser>, draft: &NewLead) -> String {
    let who = user
        .and_then(|user| user.email.as_deref())
        .unwrap_or("unknown user");
    let optional = |value: &Option<String>| value.clone().unwrap_or_default();
    format!(
        "== new lead ({who}) ==\n  name:     {}\n  email:    {}\n  phone:    {}\n  source:   {}\n  interest: {}\n  note:     {}\n",
        draft.name,
        draft.email,
        optional(&draft.phone),
        draft.source,
        optional(&draft.interest),
        optional(&draft.note),
    )
}

pub fn lead_table(snapshot: &TableSnapshot) -> String {
    let arrow = if snapshot.sort.order.is_ascending() { "asc" } else { "desc" };
    let mut out = format!(
        "== leads (sorted by {} {arrow}) ==\n",
        snapshot.sort.key.column()
    );
    match &snapshot.display {
        TableDisplay::Loading => out.push_str("  loading...\n"),
        TableDisplay::Error(message) => {
            let _ = writeln!(out, "  could not load leads: {message}");
        }
        TableDisplay::Empty => out.push_str("  no leads yet\n"),
        TableDisplay::Rows(rows) => {
            for lead in rows {
                out.push_str(&lead_row(lead));
            }
        }
    }
    out
}

fn lead_row(lead: &Lead) -> String {
    format!(
        "  {:<20} {:<28} {:<14} {:<9} {:<16} {}\n",
        lead.name,
        lead.email,
        lead.phone.as_deref().unwrap_or("-"),
        lead.source,
        lead.interest.as_deref().unwrap_or("-"),
        lead.created_at.format("%Y-%m-%d %H:%M"),
    )
}

pub fn view_header(view: View) -> &'static str {
    match view {
        View::Unauthenticated => "[signed out]",
        View::Form => "[form] | table",
        View::Table => "form | [table]",
    }
}
