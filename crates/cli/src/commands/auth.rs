use console::style;
use taskboard_protocol::NewUser;
use tracing::info;

use super::{prompt_new_password, prompt_password, Context};
use crate::cli::SignupArgs;
use crate::output;

pub async fn login(ctx: &Context, email: &str, password: Option<String>) -> anyhow::Result<()> {
    let password = match password {
        Some(p) => p,
        None => prompt_password("Password")?,
    };

    let session = ctx.client.sessions.sign_in(email, &password).await?;
    info!(
        component = "cli",
        event = "cli.login",
        user_id = session.user.id,
        "Signed in"
    );
    println!(
        "{} Signed in as {}",
        style("✓").green(),
        style(session.user.display_name()).bold()
    );
    Ok(())
}

pub async fn signup(ctx: &Context, args: SignupArgs) -> anyhow::Result<()> {
    let password = match args.password {
        Some(p) => p,
        None => prompt_new_password()?,
    };

    let user = NewUser {
        first_name: args.first_name,
        last_name: args.last_name,
        email: args.email,
        password_confirmation: password.clone(),
        password,
        role: None,
    };
    let session = ctx.client.sessions.sign_up(&user).await?;
    println!(
        "{} Account created. Signed in as {}",
        style("✓").green(),
        style(session.user.display_name()).bold()
    );
    Ok(())
}

pub async fn logout(ctx: &Context) -> anyhow::Result<()> {
    if !ctx.client.sessions.is_signed_in() {
        println!("Not signed in.");
        return Ok(());
    }
    ctx.client.sessions.sign_out().await;
    println!("Signed out.");
    Ok(())
}

pub fn whoami(ctx: &Context) -> anyhow::Result<()> {
    let user = ctx.require_user()?;
    if ctx.json {
        return output::print_json(&user);
    }
    output::print_identity(&user);
    Ok(())
}
