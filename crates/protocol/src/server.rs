//! Server → Client response bodies

use serde::{Deserialize, Serialize};

use crate::types::{Board, OptionMap, Role, Task, User, UserIdentity};

/// Owner record embedded in token responses
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceOwner {
    pub id: u64,
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Response to sign-in and sign-up
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds
    pub expires_in: u64,
    pub resource_owner: ResourceOwner,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

impl TokenResponse {
    /// Build the identity record, preferring top-level fields over the owner's.
    pub fn identity(&self) -> UserIdentity {
        let owner = &self.resource_owner;
        UserIdentity {
            id: owner.id,
            first_name: self
                .first_name
                .clone()
                .or_else(|| owner.first_name.clone())
                .unwrap_or_default(),
            last_name: self
                .last_name
                .clone()
                .or_else(|| owner.last_name.clone())
                .unwrap_or_default(),
            email: owner.email.clone(),
            role: self.role.or(owner.role).unwrap_or_default(),
        }
    }
}

/// Response to `POST /api/users/tokens/refresh`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub token: String,
    pub expires_in: u64,
    /// Present when the server rotates refresh tokens
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Error body returned on 4xx responses
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    /// Human-readable message, joining multiple errors with newlines.
    pub fn message(&self) -> Option<String> {
        if !self.errors.is_empty() {
            Some(self.errors.join("\n"))
        } else {
            self.error.clone().filter(|e| !e.trim().is_empty())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardList {
    #[serde(default)]
    pub boards: Vec<Board>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardDetail {
    pub board: Board,
    #[serde(default)]
    pub users: Vec<User>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskList {
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub status_options: OptionMap,
    #[serde(default)]
    pub priority_options: OptionMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDetail {
    pub task: Task,
    #[serde(default)]
    pub status_options: OptionMap,
    #[serde(default)]
    pub priority_options: OptionMap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserList {
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_in_response_builds_identity() {
        let json = r#"{
          "token":"access-1",
          "refresh_token":"refresh-1",
          "expires_in":3600,
          "resource_owner":{"id":5,"email":"a@b.com","first_name":"Ann"},
          "role":"manager",
          "last_name":"Bell"
        }"#;

        let parsed: TokenResponse = serde_json::from_str(json).expect("parse token response");
        let identity = parsed.identity();
        assert_eq!(identity.id, 5);
        assert_eq!(identity.first_name, "Ann");
        assert_eq!(identity.last_name, "Bell");
        assert_eq!(identity.role, Role::Manager);
    }

    #[test]
    fn owner_role_used_when_top_level_missing() {
        let json = r#"{
          "token":"t","refresh_token":"r","expires_in":60,
          "resource_owner":{"id":1,"email":"x@y.z","role":"admin"}
        }"#;
        let parsed: TokenResponse = serde_json::from_str(json).expect("parse");
        assert_eq!(parsed.identity().role, Role::Admin);
    }

    #[test]
    fn error_body_joins_messages() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"errors":["Email is taken","Password too short"]}"#)
                .expect("parse errors");
        assert_eq!(
            body.message().as_deref(),
            Some("Email is taken\nPassword too short")
        );

        let single: ErrorBody =
            serde_json::from_str(r#"{"error":"Not allowed"}"#).expect("parse error");
        assert_eq!(single.message().as_deref(), Some("Not allowed"));

        assert_eq!(ErrorBody::default().message(), None);
    }

    #[test]
    fn task_list_tolerates_missing_options() {
        let json = r#"{"tasks":[{"id":1,"title":"Ship","status":"not_started","priority":"low","board":{"name":"Ops"}}]}"#;
        let parsed: TaskList = serde_json::from_str(json).expect("parse task list");
        assert_eq!(parsed.tasks.len(), 1);
        assert_eq!(parsed.tasks[0].board.as_ref().map(|b| b.name.as_str()), Some("Ops"));
        assert!(parsed.status_options.is_empty());
    }
}
