use anyhow::bail;
use console::style;
use taskboard_protocol::{NewUser, Role, UserUpdate};

use super::{prompt_new_password, prompt_password, Context};
use crate::cli::UserCommands;
use crate::output;

pub async fn run(ctx: &Context, cmd: UserCommands) -> anyhow::Result<()> {
    let me = ctx.require_user()?;
    let api = &ctx.client.api;
    let sessions = &ctx.client.sessions;

    match cmd {
        UserCommands::List => {
            ctx.require_admin()?;
            let list = api.list_users().await?;
            if ctx.json {
                return output::print_json(&list);
            }
            println!("{}", output::users_table(&list.users));
        }
        UserCommands::Show { id } => {
            if !sessions.can_edit_user(id) {
                bail!("You can only view your own account.");
            }
            let user = api.user(id).await?;
            if ctx.json {
                return output::print_json(&user);
            }
            println!("{}", output::users_table(std::slice::from_ref(&user)));
        }
        UserCommands::Create { account, role } => {
            ctx.require_admin()?;
            let password = match account.password {
                Some(p) => p,
                None => prompt_new_password()?,
            };
            let user = api
                .create_user(&NewUser {
                    first_name: account.first_name,
                    last_name: account.last_name,
                    email: account.email,
                    password_confirmation: password.clone(),
                    password,
                    role,
                })
                .await?;
            if ctx.json {
                return output::print_json(&user);
            }
            println!("{} Created user #{} {}", style("✓").green(), user.id, user.email);
        }
        UserCommands::Update {
            id,
            first_name,
            last_name,
            email,
            role,
            change_password,
        } => {
            if !sessions.can_edit_user(id) {
                bail!("You can only edit your own account.");
            }
            let is_admin = sessions.has_role(Role::Admin);
            if role.is_some() && !is_admin {
                bail!("Only admins can change roles.");
            }

            let mut update = UserUpdate {
                first_name,
                last_name,
                email,
                role,
                ..Default::default()
            };
            if change_password {
                // Admins reset other people's passwords without knowing them.
                if !is_admin || id == me.id {
                    update.current_password = Some(prompt_password("Current password")?);
                }
                let password = prompt_new_password()?;
                update.password_confirmation = Some(password.clone());
                update.password = Some(password);
            }

            let user = api.update_user(id, &update).await?;
            if ctx.json {
                return output::print_json(&user);
            }
            println!("{} Updated user #{}", style("✓").green(), user.id);
        }
        UserCommands::Delete { id } => {
            ctx.require_admin()?;
            if id == me.id {
                bail!("You cannot delete your own account while signed in.");
            }
            api.delete_user(id).await?;
            println!("{} Deleted user #{id}", style("✓").green());
        }
    }
    Ok(())
}
