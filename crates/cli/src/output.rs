//! Terminal rendering: tables for humans, JSON for scripts.

use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{ContentArrangement, Table};
use console::style;
use serde::Serialize;
use taskboard_protocol::{Board, OptionMap, Task, Team, User, UserIdentity};

pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

fn or_dash(value: Option<&str>) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or("-")
        .to_string()
}

pub fn boards_table(boards: &[Board]) -> Table {
    let mut t = table(&["ID", "Name", "Team", "Description"]);
    for board in boards {
        t.add_row(vec![
            board.id.to_string(),
            board.name.clone(),
            board
                .team_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "-".into()),
            or_dash(board.description.as_deref()),
        ]);
    }
    t
}

pub fn tasks_table(tasks: &[Task]) -> Table {
    let mut t = table(&["ID", "Title", "Status", "Priority", "Due", "Board"]);
    for task in tasks {
        let board = task
            .board
            .as_ref()
            .map(|b| b.name.clone())
            .or_else(|| task.board_id.map(|id| format!("#{id}")));
        t.add_row(vec![
            task.id.to_string(),
            task.title.clone(),
            humanize(&task.status),
            humanize(&task.priority),
            or_dash(task.due_date.as_deref()),
            or_dash(board.as_deref()),
        ]);
    }
    t
}

pub fn teams_table(teams: &[Team]) -> Table {
    let mut t = table(&["ID", "Name", "Members", "Boards"]);
    for team in teams {
        t.add_row(vec![
            team.id.to_string(),
            team.name.clone(),
            team.users.len().to_string(),
            team.boards.len().to_string(),
        ]);
    }
    t
}

pub fn users_table(users: &[User]) -> Table {
    let mut t = table(&["ID", "Name", "Email", "Role"]);
    for user in users {
        t.add_row(vec![
            user.id.to_string(),
            format!("{} {}", user.first_name, user.last_name)
                .trim()
                .to_string(),
            user.email.clone(),
            user.role.to_string(),
        ]);
    }
    t
}

pub fn print_task(task: &Task) {
    println!("{} {}", style(format!("#{}", task.id)).dim(), style(&task.title).bold());
    println!("  Status:   {}", humanize(&task.status));
    println!("  Priority: {}", humanize(&task.priority));
    println!("  Due:      {}", or_dash(task.due_date.as_deref()));
    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        println!();
        println!("  {description}");
    }
}

pub fn print_identity(user: &UserIdentity) {
    println!(
        "{} <{}> ({})",
        style(user.display_name()).bold(),
        user.email,
        user.role
    );
}

/// Comma-separated option names in server order.
pub fn option_names(options: &OptionMap) -> String {
    let mut names: Vec<(&String, &i64)> = options.iter().collect();
    names.sort_by_key(|(_, code)| **code);
    names
        .into_iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// `not_started` -> `Not started`
pub fn humanize(value: &str) -> String {
    let spaced = value.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn humanize_enum_values() {
        assert_eq!(humanize("not_started"), "Not started");
        assert_eq!(humanize("high"), "High");
        assert_eq!(humanize(""), "");
    }

    #[test]
    fn option_names_follow_codes() {
        let options: OptionMap = [
            ("completed".to_string(), 2),
            ("not_started".to_string(), 0),
            ("in_progress".to_string(), 1),
        ]
        .into_iter()
        .collect();
        assert_eq!(option_names(&options), "not_started, in_progress, completed");
    }

    #[test]
    fn task_table_prefers_board_name() {
        let task: Task = serde_json::from_value(serde_json::json!({
            "id": 3, "title": "Ship", "status": "in_progress", "priority": "high",
            "board_id": 8
        }))
        .unwrap();
        let rendered = tasks_table(&[task]).to_string();
        assert!(rendered.contains("#8"));
        assert!(rendered.contains("In progress"));
    }
}
