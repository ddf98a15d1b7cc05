mod commands;
mod render;

use anyhow::Result;
use client_core::{
    config::load_settings, lead_form::LeadForm, login::LoginPanel, LeadflowApp, View,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing_subscriber::EnvFilter;

use crate::commands::{AuthField, Command, LeadField};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = load_settings();
    let app = LeadflowApp::start(&settings).await;
    let printer = spawn_notification_printer(&app);

    let mut panel = app.login_panel();
    let mut form = app.lead_form();
    println!("{}", commands::HELP);
    show(&app, &panel, &form).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match commands::parse(&line) {
            Ok(command) => command,
            Err(err) => {
                println!("error: {err:#}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        run(&app, &mut panel, &mut form, command).await;
    }

    app.shutdown().await;
    printer.abort();
    Ok(())
}

async fn run(app: &LeadflowApp, panel: &mut LoginPanel, form: &mut LeadForm, command: Command) {
    match command {
        Command::Help => println!("{}", commands::HELP),
        Command::Show => {}
        Command::Auth(field, value) => match field {
            AuthField::Email => panel.email = value,
            AuthField::Password => panel.password = value,
            AuthField::FullName => panel.full_name = value,
        },
        Command::ToggleMode => {
            panel.toggle_mode();
        }
        Command::Login => {
            panel.submit().await;
        }
        Command::Resend => panel.resend_confirmation().await,
        Command::Lead(field, value) => {
            let optional = (!value.is_empty()).then(|| value.clone());
            match field {
                LeadField::Name => form.draft.name = value,
                LeadField::Email => form.draft.email = value,
                LeadField::Phone => form.draft.phone = optional,
                LeadField::Interest => form.draft.interest = optional,
                LeadField::Note => form.draft.note = optional,
            }
        }
        Command::LeadSource(source) => form.draft.source = source,
        Command::SubmitLead => {
            form.submit().await;
        }
        Command::Select(target) => {
            app.router().select(target).await;
        }
        Command::Sort(key) => {
            app.router().sort_by(key).await;
        }
        Command::Reload => {
            app.router().table().reload().await;
        }
        Command::Dismiss(id) => {
            if !app.notifications().remove(id).await {
                println!("no notification #{id}");
            }
        }
        Command::Logout => app.logout().await,
        Command::Quit => return,
    }
    show(app, panel, form).await;
}

async fn show(app: &LeadflowApp, panel: &LoginPanel, form: &LeadForm) {
    let view = app.view().await;
    println!("{}", render::view_header(view));
    match view {
        View::Unauthenticated => print!("{}", render::login_panel(panel)),
        View::Form => print!(
            "{}",
            render::lead_form(app.session().current().as_ref(), &form.draft)
        ),
        View::Table => print!("{}", render::lead_table(&app.router().table_snapshot().await)),
    }
    for notification in app.notifications().active().await {
        println!("  {}", render::notification_line(&notification));
    }
}

fn spawn_notification_printer(app: &LeadflowApp) -> tokio::task::JoinHandle<()> {
    let mut events = app.notifications().subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("{}", render::notification_event(&event)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "notification printer lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
