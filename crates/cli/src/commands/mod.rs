//! Subcommand handlers.

mod auth;
mod boards;
mod notifications;
mod tasks;
mod teams;
mod users;

use anyhow::bail;
use taskboard_client::Taskboard;
use taskboard_protocol::{Role, UserIdentity};

use crate::cli::Commands;

pub struct Context {
    pub client: Taskboard,
    pub json: bool,
}

impl Context {
    /// Signed-in identity, or a hint to log in.
    fn require_user(&self) -> anyhow::Result<UserIdentity> {
        match self.client.sessions.current_user() {
            Some(user) => Ok(user),
            None => bail!("Not signed in. Run `taskboard login --email <email>` first."),
        }
    }

    fn require_admin(&self) -> anyhow::Result<()> {
        self.require_user()?;
        if !self.client.sessions.has_role(Role::Admin) {
            bail!("Only admins can do that.");
        }
        Ok(())
    }

    fn require_manager(&self) -> anyhow::Result<()> {
        self.require_user()?;
        let sessions = &self.client.sessions;
        if !(sessions.has_role(Role::Admin) || sessions.has_role(Role::Manager)) {
            bail!("Only managers and admins can do that.");
        }
        Ok(())
    }
}

pub async fn dispatch(ctx: &Context, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Login { email, password } => auth::login(ctx, &email, password).await,
        Commands::Signup(args) => auth::signup(ctx, args).await,
        Commands::Logout => auth::logout(ctx).await,
        Commands::Whoami => auth::whoami(ctx),
        Commands::Boards(cmd) => boards::run(ctx, cmd).await,
        Commands::Tasks(cmd) => tasks::run(ctx, cmd).await,
        Commands::Teams(cmd) => teams::run(ctx, cmd).await,
        Commands::Users(cmd) => users::run(ctx, cmd).await,
        Commands::Notifications(cmd) => notifications::run(ctx, cmd).await,
    }
}

/// Read a password from the terminal without echo.
fn prompt_password(label: &str) -> anyhow::Result<String> {
    let term = console::Term::stderr();
    term.write_str(&format!("{label}: "))?;
    let password = term.read_secure_line()?;
    if password.is_empty() {
        bail!("{label} cannot be empty");
    }
    Ok(password)
}

/// Prompt twice and require both entries to match.
fn prompt_new_password() -> anyhow::Result<String> {
    let password = prompt_password("Password")?;
    let confirmation = prompt_password("Confirm password")?;
    if password != confirmation {
        bail!("Passwords do not match");
    }
    Ok(password)
}
