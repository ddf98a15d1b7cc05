//! Line commands typed at the console prompt.

use anyhow::{anyhow, bail, Context, Result};
use client_core::{ActiveView, NotificationId};
use shared::domain::{LeadSource, SortKey};

pub const HELP: &str = "\
commands:
  show                          render the current view
  auth email|password|name <v>  fill the login panel
  mode                          switch between sign in and sign up
  login                         submit the login panel
  resend                        resend the confirmation email
  lead <field> <value>          fill the lead form (name, email, phone, source, interest, note)
  submit                        submit the lead form
  view form|table               switch the active view
  sort <column>                 sort the table (name, email, phone, source, interest, created_at)
  reload                        query the table again
  dismiss <id>                  dismiss a notification
  logout                        sign out
  quit                          exit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthField {
    Email,
    Password,
    FullName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadField {
    Name,
    Email,
    Phone,
    Interest,
    Note,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Show,
    Auth(AuthField, String),
    ToggleMode,
    Login,
    Resend,
    Lead(LeadField, String),
    LeadSource(LeadSource),
    SubmitLead,
    Select(ActiveView),
    Sort(SortKey),
    Reload,
    Dismiss(NotificationId),
    Logout,
    Quit,
}

pub fn parse(line: &str) -> Result<Command> {
    let line = line.trim();
    let (word, rest) = line
        .split_once(char::is_whitespace)
        .map(|(word, rest)| (word, rest.trim()))
        .unwrap_or((line, ""));

    let command = match word.to_ascii_lowercase().as_str() {
        "" | "help" | "?" => Command::Help,
        "show" => Command::Show,
        "mode" => Command::ToggleMode,
        "login" => Command::Login,
        "resend" => Command::Resend,
        "submit" => Command::SubmitLead,
        "reload" => Command::Reload,
        "logout" => Command::Logout,
        "quit" | "exit" => Command::Quit,
        "auth" => {
            let (field, value) = field_and_value(rest)?;
            let field = match field.as_str() {
                "email" => AuthField::Email,
                "password" => AuthField::Password,
                "name" | "full_name" => AuthField::FullName,
                other => bail!("unknown login field '{other}'"),
            };
            Command::Auth(field, value)
        }
        "lead" => {
            let (field, value) = field_and_value(rest)?;
            match field.as_str() {
                "name" => Command::Lead(LeadField::Name, value),
                "email" => Command::Lead(LeadField::Email, value),
                "phone" => Command::Lead(LeadField::Phone, value),
                "interest" => Command::Lead(LeadField::Interest, value),
                "note" => Command::Lead(LeadField::Note, value),
                "source" => Command::LeadSource(value.parse()?),
                other => bail!("unknown lead field '{other}'"),
            }
        }
        "view" => match rest.to_ascii_lowercase().as_str() {
            "form" => Command::Select(ActiveView::Form),
            "table" => Command::Select(ActiveView::Table),
            other => bail!("unknown view '{other}' (expected form or table)"),
        },
        "sort" => Command::Sort(rest.parse()?),
        "dismiss" => {
            let id = rest
                .parse::<u64>()
                .with_context(|| format!("invalid notification id '{rest}'"))?;
            Command::Dismiss(NotificationId(id))
        }
        other => bail!("unknown command '{other}', type 'help'"),
    };
    Ok(command)
}

fn field_and_value(rest: &str) -> Result<(String, String)> {
    let (field, value) = rest
        .split_once(char::is_whitespace)
        .map(|(field, value)| (field, value.trim()))
        .unwrap_or((rest, ""));
    if field.is_empty() {
        return Err(anyhow!("missing field name"));
    }
    Ok((field.to_ascii_lowercase(), value.to_string()))
}
