//! `mailpager`: one paginated mailbox search per invocation.
//!
//! The response envelope goes to stdout as pretty JSON; logs go to stderr
//! and are tuned with `RUST_LOG`.

mod cli;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use mailpager_core::{ApiResponse, ImapConnector, QueryService, Settings};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::Args;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailpager=info,mailpager_core=info,mailpager_imap=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let settings = match &args.config {
        Some(path) => Settings::load_from(path).await,
        None => Settings::load().await,
    }
    .context("Failed to load settings")?;
    info!(server = %settings.server, user = %settings.email_user, "Loaded settings");

    let connector = ImapConnector::new(settings.imap_config(), settings.credentials());
    let service = QueryService::new(connector, &settings).context("Invalid settings")?;
    let request = args.to_request(&settings.mailbox);

    let (json, code) = match service.get_paginated(&request).await {
        Ok(reply) => {
            let response = reply.into_response();
            (serde_json::to_string_pretty(&response)?, ExitCode::SUCCESS)
        }
        Err(e) => {
            error!(error = %e, "Query failed");
            let response: ApiResponse<()> = ApiResponse::from_error(&e);
            (serde_json::to_string_pretty(&response)?, ExitCode::FAILURE)
        }
    };

    println!("{json}");
    Ok(code)
}
