//! Core types shared across the protocol

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Agent,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Agent => "agent",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "agent" => Ok(Role::Agent),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Identity of the signed-in principal, as persisted under `currentUser`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserIdentity {
    pub id: u64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

impl UserIdentity {
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.email.clone()
        } else {
            full.to_string()
        }
    }

    /// Merge a partial update into this identity. Fields left as `None` are kept.
    pub fn apply(&mut self, patch: &UserPatch) {
        if let Some(first_name) = &patch.first_name {
            self.first_name = first_name.clone();
        }
        if let Some(last_name) = &patch.last_name {
            self.last_name = last_name.clone();
        }
        if let Some(email) = &patch.email {
            self.email = email.clone();
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
    }
}

/// Partial identity update (self-edit or admin edit)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.first_name.is_none()
            && self.last_name.is_none()
            && self.email.is_none()
            && self.role.is_none()
    }
}

/// A user account as returned by `/api/users`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
}

impl From<User> for UserIdentity {
    fn from(user: User) -> Self {
        UserIdentity {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            email: user.email,
            role: user.role,
        }
    }
}

/// A board groups tasks and belongs to a team
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub team_id: Option<u64>,
}

/// Board reference embedded in task payloads
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardRef {
    #[serde(default)]
    pub id: Option<u64>,
    pub name: String,
}

/// A task on a board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    pub status: String,
    pub priority: String,
    #[serde(default)]
    pub board_id: Option<u64>,
    #[serde(default)]
    pub board: Option<BoardRef>,
}

/// A team of users sharing boards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub boards: Vec<Board>,
}

/// Enum options published by the API (value -> numeric code)
pub type OptionMap = BTreeMap<String, i64>;

/// A server-pushed notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: u64,
    pub message: String,
}

impl Notification {
    /// Task referenced by the message via a `task_id=<digits>` token, if any.
    pub fn task_id(&self) -> Option<u64> {
        extract_task_id(&self.message)
    }
}

/// Find the first `task_id=<digits>` token in `message`.
pub fn extract_task_id(message: &str) -> Option<u64> {
    const MARKER: &str = "task_id=";
    let mut rest = message;
    while let Some(pos) = rest.find(MARKER) {
        let after = &rest[pos + MARKER.len()..];
        let digits: &str = {
            let end = after
                .find(|c: char| !c.is_ascii_digit())
                .unwrap_or(after.len());
            &after[..end]
        };
        if let Ok(id) = digits.parse() {
            return Some(id);
        }
        rest = after;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_task_id_from_message() {
        assert_eq!(extract_task_id("task_id=42 assigned"), Some(42));
        assert_eq!(
            extract_task_id("<a href=\"/home?task_id=7\">Task</a> updated"),
            Some(7)
        );
    }

    #[test]
    fn skips_marker_without_digits() {
        assert_eq!(extract_task_id("task_id= pending, task_id=9"), Some(9));
        assert_eq!(extract_task_id("no reference here"), None);
        assert_eq!(extract_task_id("task_id=abc"), None);
    }

    #[test]
    fn role_parses_case_insensitively() {
        assert_eq!("Admin".parse::<Role>(), Ok(Role::Admin));
        assert_eq!(" manager ".parse::<Role>(), Ok(Role::Manager));
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn identity_patch_keeps_unset_fields() {
        let mut user = UserIdentity {
            id: 1,
            first_name: "Ada".into(),
            last_name: "Lovelace".into(),
            email: "ada@example.com".into(),
            role: Role::Agent,
        };
        user.apply(&UserPatch {
            last_name: Some("King".into()),
            ..Default::default()
        });
        assert_eq!(user.first_name, "Ada");
        assert_eq!(user.last_name, "King");
        assert_eq!(user.display_name(), "Ada King");
    }

    #[test]
    fn identity_tolerates_missing_names_and_role() {
        let json = r#"{"id":3,"email":"x@y.z"}"#;
        let user: UserIdentity = serde_json::from_str(json).expect("parse identity");
        assert_eq!(user.role, Role::Agent);
        assert_eq!(user.display_name(), "x@y.z");
    }
}
