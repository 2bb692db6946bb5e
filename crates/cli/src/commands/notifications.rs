use console::style;
use futures::StreamExt;
use taskboard_client::{ChannelState, ClientError};
use taskboard_protocol::Notification;
use tracing::info;

use super::Context;
use crate::cli::NotificationCommands;

pub async fn run(ctx: &Context, cmd: NotificationCommands) -> anyhow::Result<()> {
    match cmd {
        NotificationCommands::Watch { dismiss } => watch(ctx, dismiss).await,
    }
}

async fn watch(ctx: &Context, dismiss: bool) -> anyhow::Result<()> {
    ctx.require_user()?;
    let channel = &ctx.client.notifications;
    let sessions = &ctx.client.sessions;

    let mut events = Box::pin(channel.events());
    let mut states = channel.watch_state();
    let follower = channel.follow_session(sessions.clone());
    eprintln!("{}", style("Watching for notifications (Ctrl-C to stop)").dim());

    let outcome = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            Some(notification) = events.next() => {
                print_notification(&notification);
                if dismiss {
                    channel.dismiss(notification.id);
                }
            }
            changed = states.changed() => {
                if changed.is_err() {
                    break Ok(());
                }
                let state = *states.borrow_and_update();
                match state {
                    ChannelState::Open => eprintln!("{}", style("connected").green()),
                    ChannelState::Scheduled { attempt, delay } => {
                        let message =
                            format!("disconnected, retry {attempt} in {}s", delay.as_secs());
                        eprintln!("{}", style(message).yellow());
                    }
                    ChannelState::GaveUp => break Err(ClientError::ChannelUnavailable.into()),
                    ChannelState::Idle if !sessions.is_signed_in() => {
                        break Err(ClientError::SessionExpired.into());
                    }
                    _ => {}
                }
            }
        }
    };

    follower.abort();
    channel.teardown();
    info!(
        component = "cli",
        event = "cli.watch_stopped",
        ok = outcome.is_ok(),
    );
    outcome
}

fn print_notification(notification: &Notification) {
    match notification.task_id() {
        Some(task_id) => println!(
            "{} {}  {}",
            style(format!("[{}]", notification.id)).dim(),
            notification.message,
            style(format!("(taskboard tasks show {task_id})")).cyan()
        ),
        None => println!(
            "{} {}",
            style(format!("[{}]", notification.id)).dim(),
            notification.message
        ),
    }
}
