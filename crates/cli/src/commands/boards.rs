use console::style;
use taskboard_protocol::BoardParams;

use super::Context;
use crate::cli::BoardCommands;
use crate::output;

pub async fn run(ctx: &Context, cmd: BoardCommands) -> anyhow::Result<()> {
    ctx.require_user()?;
    let api = &ctx.client.api;

    match cmd {
        BoardCommands::List => {
            let boards = api.list_boards().await?;
            if ctx.json {
                return output::print_json(&boards);
            }
            if boards.is_empty() {
                println!("No boards yet.");
            } else {
                println!("{}", output::boards_table(&boards));
            }
        }
        BoardCommands::Show { id } => {
            let (detail, tasks) = tokio::try_join!(api.board(id), api.list_tasks(Some(id)))?;
            if ctx.json {
                return output::print_json(&serde_json::json!({
                    "board": detail.board,
                    "users": detail.users,
                    "tasks": tasks.tasks,
                }));
            }

            println!("{}", style(&detail.board.name).bold());
            if let Some(description) = detail.board.description.as_deref() {
                println!("{description}");
            }
            println!();
            println!("{}", style("Members").underlined());
            println!("{}", output::users_table(&detail.users));
            println!("{}", style("Tasks").underlined());
            println!("{}", output::tasks_table(&tasks.tasks));
        }
        BoardCommands::Create {
            name,
            team,
            description,
        } => {
            ctx.require_manager()?;
            let board = api
                .create_board(&BoardParams {
                    name,
                    description,
                    team_id: team,
                })
                .await?;
            if ctx.json {
                return output::print_json(&board);
            }
            println!("{} Created board #{} {}", style("✓").green(), board.id, board.name);
        }
        BoardCommands::Delete { id } => {
            ctx.require_admin()?;
            api.delete_board(id).await?;
            println!("{} Deleted board #{id}", style("✓").green());
        }
    }
    Ok(())
}
