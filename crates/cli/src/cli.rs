//! Command-line surface.
//!
//! - `login` / `signup` / `logout` / `whoami` - session lifecycle
//! - `boards`, `tasks`, `teams`, `users` - resource management
//! - `notifications watch` - stream live notifications until Ctrl-C

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use taskboard_protocol::Role;

#[derive(Parser, Debug)]
#[command(name = "taskboard")]
#[command(author, version, about = "Boards, tasks and live notifications from the terminal", long_about = None)]
pub struct Cli {
    /// Data directory (default: $TASKBOARD_DATA_DIR or ~/.taskboard)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// API base URL (overrides config.toml)
    #[arg(long, env = "TASKBOARD_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Print raw JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in with email and password
    Login {
        #[arg(short, long)]
        email: String,
        /// Prompted for when omitted
        #[arg(long)]
        password: Option<String>,
    },

    /// Create an account and sign in
    Signup(SignupArgs),

    /// Sign out and forget the stored session
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Board management
    #[command(subcommand)]
    Boards(BoardCommands),

    /// Task management
    #[command(subcommand)]
    Tasks(TaskCommands),

    /// Team management
    #[command(subcommand)]
    Teams(TeamCommands),

    /// User administration
    #[command(subcommand)]
    Users(UserCommands),

    /// Live notifications
    #[command(subcommand)]
    Notifications(NotificationCommands),
}

#[derive(Args, Debug)]
pub struct SignupArgs {
    #[arg(long)]
    pub first_name: String,
    #[arg(long)]
    pub last_name: String,
    #[arg(short, long)]
    pub email: String,
    /// Prompted for when omitted
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum BoardCommands {
    /// List boards visible to you
    List,
    /// Show a board, its members and its tasks
    Show { id: u64 },
    /// Create a board (managers and admins)
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        team: u64,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a board (admins)
    Delete { id: u64 },
}

#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// List tasks, optionally for one board
    List {
        #[arg(long)]
        board: Option<u64>,
    },
    /// Show one task
    Show { id: u64 },
    /// Create a task (managers and admins)
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        board: u64,
        #[command(flatten)]
        fields: TaskFields,
    },
    /// Change fields on a task; unset flags are left alone
    Update {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        board: Option<u64>,
        #[command(flatten)]
        fields: TaskFields,
    },
    /// Delete a task
    Delete { id: u64 },
}

#[derive(Args, Debug, Default)]
pub struct TaskFields {
    #[arg(long)]
    pub description: Option<String>,
    /// YYYY-MM-DD
    #[arg(long)]
    pub due: Option<String>,
    /// e.g. not_started, in_progress, completed
    #[arg(long)]
    pub status: Option<String>,
    /// e.g. low, medium, high
    #[arg(long)]
    pub priority: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum TeamCommands {
    List,
    Show { id: u64 },
    Create(TeamArgs),
    /// Replace a team's name, members and boards
    Update {
        id: u64,
        #[command(flatten)]
        team: TeamArgs,
    },
    Delete { id: u64 },
}

#[derive(Args, Debug)]
pub struct TeamArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub description: Option<String>,
    /// Member user id (repeatable)
    #[arg(long = "user")]
    pub users: Vec<u64>,
    /// Board id (repeatable)
    #[arg(long = "board")]
    pub boards: Vec<u64>,
}

#[derive(Subcommand, Debug)]
pub enum UserCommands {
    /// List all users (admins)
    List,
    Show { id: u64 },
    /// Create an account without signing in as it (admins)
    Create {
        #[command(flatten)]
        account: SignupArgs,
        #[arg(long, value_parser = parse_role)]
        role: Option<Role>,
    },
    /// Edit an account (yourself, or anyone as an admin)
    Update {
        id: u64,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Admins only
        #[arg(long, value_parser = parse_role)]
        role: Option<Role>,
        /// Prompt for a new password
        #[arg(long)]
        change_password: bool,
    },
    /// Delete an account (admins)
    Delete { id: u64 },
}

#[derive(Subcommand, Debug)]
pub enum NotificationCommands {
    /// Print notifications as they arrive until Ctrl-C
    Watch {
        /// Mark each notification read once printed
        #[arg(long)]
        dismiss: bool,
    },
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse()
}
