//! Taskboard CLI
//!
//! Signs in against a Taskboard server, manages boards, tasks, teams and
//! users, and streams live notifications.

mod cli;
mod commands;
mod logging;
mod output;
mod paths;

use std::process::ExitCode;

use clap::Parser;
use console::style;
use taskboard_client::{ClientConfig, ClientError, Taskboard};
use tracing::{error, info};

use crate::cli::Cli;
use crate::commands::Context;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {}", style("error:").red().bold(), describe(&err));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = paths::init_data_dir(cli.data_dir.as_deref())?;
    paths::ensure_dirs()?;
    let _logging = logging::init_logging()?;

    let config = ClientConfig::load(&paths::config_path()?)?.with_base_url(cli.base_url.clone());
    info!(
        component = "cli",
        event = "cli.started",
        version = VERSION,
        data_dir = %data_dir.display(),
        base_url = %config.api_base(),
    );

    let client = Taskboard::open(&config, &paths::session_db_path()?)?;
    let ctx = Context {
        client,
        json: cli.json,
    };
    let result = commands::dispatch(&ctx, cli.command).await;
    if let Err(err) = &result {
        error!(
            component = "cli",
            event = "cli.command_failed",
            error = %format!("{err:#}"),
        );
    }
    result
}

fn describe(err: &anyhow::Error) -> String {
    match err.downcast_ref::<ClientError>() {
        Some(ClientError::SessionExpired) => {
            "Your session has expired. Sign in again with `taskboard login`.".to_string()
        }
        Some(ClientError::ChannelUnavailable) => {
            "Live notifications are unavailable right now. Try again later.".to_string()
        }
        _ => format!("{err:#}"),
    }
}
