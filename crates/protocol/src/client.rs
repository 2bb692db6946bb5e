//! Client → Server request bodies

use serde::{Deserialize, Serialize};

use crate::types::Role;

/// `POST /api/users/tokens/sign_in`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignInRequest {
    pub email: String,
    pub password: String,
}

/// Account fields submitted on sign-up or user creation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewUser {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub password_confirmation: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Account fields submitted on edit. Password changes require the current password.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_confirmation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_password: Option<String>,
}

/// `{ "user": {...} }` envelope used by sign-up and the users resource
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserEnvelope<T> {
    pub user: T,
}

/// `POST /api/users/tokens/refresh`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Board fields for create
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BoardParams {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub team_id: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardEnvelope<T> {
    pub board: T,
}

/// Task fields for create and update. Unset fields are left untouched on update.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub board_id: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope<T> {
    pub task: T,
}

/// Team fields for create and update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamParams {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub user_ids: Vec<u64>,
    #[serde(default)]
    pub board_ids: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamEnvelope<T> {
    pub team: T,
}
