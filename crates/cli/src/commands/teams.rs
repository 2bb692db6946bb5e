use console::style;
use taskboard_protocol::TeamParams;

use super::Context;
use crate::cli::{TeamArgs, TeamCommands};
use crate::output;

pub async fn run(ctx: &Context, cmd: TeamCommands) -> anyhow::Result<()> {
    ctx.require_user()?;
    let api = &ctx.client.api;

    match cmd {
        TeamCommands::List => {
            let teams = api.list_teams().await?;
            if ctx.json {
                return output::print_json(&teams);
            }
            println!("{}", output::teams_table(&teams));
        }
        TeamCommands::Show { id } => {
            let team = api.team(id).await?;
            if ctx.json {
                return output::print_json(&team);
            }
            println!("{}", style(&team.name).bold());
            if let Some(description) = team.description.as_deref() {
                println!("{description}");
            }
            println!();
            println!("{}", style("Members").underlined());
            println!("{}", output::users_table(&team.users));
            println!("{}", style("Boards").underlined());
            println!("{}", output::boards_table(&team.boards));
        }
        TeamCommands::Create(args) => {
            ctx.require_manager()?;
            let team = api.create_team(&team_params(args)).await?;
            if ctx.json {
                return output::print_json(&team);
            }
            println!("{} Created team #{} {}", style("✓").green(), team.id, team.name);
        }
        TeamCommands::Update { id, team } => {
            ctx.require_manager()?;
            let team = api.update_team(id, &team_params(team)).await?;
            if ctx.json {
                return output::print_json(&team);
            }
            println!("{} Updated team #{} {}", style("✓").green(), team.id, team.name);
        }
        TeamCommands::Delete { id } => {
            ctx.require_admin()?;
            api.delete_team(id).await?;
            println!("{} Deleted team #{id}", style("✓").green());
        }
    }
    Ok(())
}

fn team_params(args: TeamArgs) -> TeamParams {
    TeamParams {
        name: args.name,
        description: args.description,
        user_ids: args.users,
        board_ids: args.boards,
    }
}
