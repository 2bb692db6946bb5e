use anyhow::bail;
use console::style;
use taskboard_protocol::TaskParams;

use super::Context;
use crate::cli::{TaskCommands, TaskFields};
use crate::output;

pub async fn run(ctx: &Context, cmd: TaskCommands) -> anyhow::Result<()> {
    ctx.require_user()?;
    let api = &ctx.client.api;

    match cmd {
        TaskCommands::List { board } => {
            let list = api.list_tasks(board).await?;
            if ctx.json {
                return output::print_json(&list);
            }
            if list.tasks.is_empty() {
                println!("No tasks.");
            } else {
                println!("{}", output::tasks_table(&list.tasks));
            }
        }
        TaskCommands::Show { id } => {
            let detail = api.task(id).await?;
            if ctx.json {
                return output::print_json(&detail);
            }
            output::print_task(&detail.task);
            if !detail.status_options.is_empty() {
                println!();
                println!(
                    "  {} {}",
                    style("Statuses:").dim(),
                    output::option_names(&detail.status_options)
                );
                println!(
                    "  {} {}",
                    style("Priorities:").dim(),
                    output::option_names(&detail.priority_options)
                );
            }
        }
        TaskCommands::Create {
            title,
            board,
            fields,
        } => {
            ctx.require_manager()?;
            let params = task_params(Some(title), Some(board), fields);
            let task = api.create_task(&params).await?;
            if ctx.json {
                return output::print_json(&task);
            }
            println!("{} Created task #{} {}", style("✓").green(), task.id, task.title);
        }
        TaskCommands::Update {
            id,
            title,
            board,
            fields,
        } => {
            let params = task_params(title, board, fields);
            if params == TaskParams::default() {
                bail!("Nothing to update; pass at least one field flag.");
            }
            let task = api.update_task(id, &params).await?;
            if ctx.json {
                return output::print_json(&task);
            }
            println!("{} Updated task #{}", style("✓").green(), task.id);
            output::print_task(&task);
        }
        TaskCommands::Delete { id } => {
            api.delete_task(id).await?;
            println!("{} Deleted task #{id}", style("✓").green());
        }
    }
    Ok(())
}

fn task_params(title: Option<String>, board_id: Option<u64>, fields: TaskFields) -> TaskParams {
    TaskParams {
        title,
        description: fields.description,
        due_date: fields.due,
        status: fields.status,
        priority: fields.priority,
        board_id,
    }
}
