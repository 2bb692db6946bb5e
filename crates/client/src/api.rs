//! Typed REST access to boards, tasks, teams and users.
//!
//! Every request carries `Authorization: Bearer <token>` from
//! [`SessionManager::access_token`], so an expired token is refreshed before
//! the call goes out. A 401 from the server ends the session that sent the
//! rejected token.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use taskboard_protocol::{
    Board, BoardDetail, BoardEnvelope, BoardList, BoardParams, NewUser, Task, TaskDetail,
    TaskEnvelope, TaskList, TaskParams, Team, TeamEnvelope, TeamParams, User, UserEnvelope,
    UserList, UserPatch, UserUpdate,
};
use tracing::{debug, warn};

use crate::error::ClientError;
use crate::http::{check, from_envelope, join_url};
use crate::notifications::ReadReceipts;
use crate::session::SessionManager;

pub struct ApiClient {
    http: Client,
    base_url: String,
    sessions: Arc<SessionManager>,
}

impl ApiClient {
    pub fn new(http: Client, base_url: impl Into<String>, sessions: Arc<SessionManager>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            sessions,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Response, ClientError> {
        let token = self.sessions.access_token().await?;
        let url = join_url(&self.base_url, path);
        debug!(
            component = "api",
            event = "api.request",
            method = %method,
            path = %path,
        );

        let mut request = self.http.request(method.clone(), url).bearer_auth(&token);
        if let Some(body) = body {
            request = request.json(&body);
        }
        let resp = request.send().await?;

        if resp.status() == StatusCode::UNAUTHORIZED {
            let ended = self.sessions.expire_token(&token).await;
            warn!(
                component = "api",
                event = "api.unauthorized",
                method = %method,
                path = %path,
                session_ended = ended,
            );
            return Err(ClientError::SessionExpired);
        }
        check(resp).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self.send(Method::GET, path, None).await?;
        Ok(resp.json().await?)
    }

    /// Send `body` and decode the `key` record from the reply, enveloped or not.
    async fn write<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
        key: &str,
    ) -> Result<T, ClientError> {
        let body = serde_json::to_value(body)?;
        let resp = self.send(method, path, Some(body)).await?;
        let value: Value = resp.json().await?;
        from_envelope(value, key)
    }

    async fn delete(&self, path: &str) -> Result<(), ClientError> {
        self.send(Method::DELETE, path, None).await?;
        Ok(())
    }

    // Boards

    pub async fn list_boards(&self) -> Result<Vec<Board>, ClientError> {
        let list: BoardList = self.get("/api/boards").await?;
        Ok(list.boards)
    }

    pub async fn board(&self, id: u64) -> Result<BoardDetail, ClientError> {
        self.get(&format!("/api/boards/{id}")).await
    }

    pub async fn create_board(&self, params: &BoardParams) -> Result<Board, ClientError> {
        let body = BoardEnvelope { board: params };
        self.write(Method::POST, "/api/boards", &body, "board").await
    }

    pub async fn delete_board(&self, id: u64) -> Result<(), ClientError> {
        self.delete(&format!("/api/boards/{id}")).await
    }

    // Tasks

    pub async fn list_tasks(&self, board_id: Option<u64>) -> Result<TaskList, ClientError> {
        self.get(&tasks_path(board_id)).await
    }

    pub async fn task(&self, id: u64) -> Result<TaskDetail, ClientError> {
        self.get(&format!("/api/tasks/{id}")).await
    }

    pub async fn create_task(&self, params: &TaskParams) -> Result<Task, ClientError> {
        let body = TaskEnvelope { task: params };
        self.write(Method::POST, "/api/tasks", &body, "task").await
    }

    /// Partial update; unset fields are left out of the body.
    pub async fn update_task(&self, id: u64, params: &TaskParams) -> Result<Task, ClientError> {
        let body = TaskEnvelope { task: params };
        self.write(Method::PUT, &format!("/api/tasks/{id}"), &body, "task")
            .await
    }

    pub async fn delete_task(&self, id: u64) -> Result<(), ClientError> {
        self.delete(&format!("/api/tasks/{id}")).await
    }

    // Teams

    pub async fn list_teams(&self) -> Result<Vec<Team>, ClientError> {
        let value: Value = self.get("/api/teams").await?;
        from_envelope(value, "teams")
    }

    pub async fn team(&self, id: u64) -> Result<Team, ClientError> {
        let value: Value = self.get(&format!("/api/teams/{id}")).await?;
        from_envelope(value, "team")
    }

    pub async fn create_team(&self, params: &TeamParams) -> Result<Team, ClientError> {
        let body = TeamEnvelope { team: params };
        self.write(Method::POST, "/api/teams", &body, "team").await
    }

    pub async fn update_team(&self, id: u64, params: &TeamParams) -> Result<Team, ClientError> {
        let body = TeamEnvelope { team: params };
        self.write(Method::PUT, &format!("/api/teams/{id}"), &body, "team")
            .await
    }

    pub async fn delete_team(&self, id: u64) -> Result<(), ClientError> {
        self.delete(&format!("/api/teams/{id}")).await
    }

    // Users

    pub async fn list_users(&self) -> Result<UserList, ClientError> {
        self.get("/api/users").await
    }

    pub async fn user(&self, id: u64) -> Result<User, ClientError> {
        let value: Value = self.get(&format!("/api/users/{id}")).await?;
        from_envelope(value, "user")
    }

    /// Admin account creation. Unlike sign-up this does not touch the session.
    pub async fn create_user(&self, user: &NewUser) -> Result<User, ClientError> {
        let body = UserEnvelope { user };
        self.write(Method::POST, "/api/users", &body, "user").await
    }

    /// Update an account. Editing yourself also patches the cached identity.
    pub async fn update_user(&self, id: u64, update: &UserUpdate) -> Result<User, ClientError> {
        let body = UserEnvelope { user: update };
        let user: User = self
            .write(Method::PUT, &format!("/api/users/{id}"), &body, "user")
            .await?;

        let is_self = self
            .sessions
            .current_user()
            .is_some_and(|current| current.id == id);
        if is_self {
            let patch = identity_patch(update);
            if !patch.is_empty() {
                self.sessions.update_current_user(&patch).await;
            }
        }
        Ok(user)
    }

    pub async fn delete_user(&self, id: u64) -> Result<(), ClientError> {
        self.delete(&format!("/api/users/{id}")).await
    }

    // Notifications

    pub async fn mark_notification_read(&self, id: u64) -> Result<(), ClientError> {
        self.send(Method::PUT, &format!("/api/notifications/{id}"), None)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ReadReceipts for ApiClient {
    async fn mark_read(&self, notification_id: u64) -> Result<(), ClientError> {
        self.mark_notification_read(notification_id).await
    }
}

fn tasks_path(board_id: Option<u64>) -> String {
    match board_id {
        Some(id) => format!("/api/tasks?board_id={id}"),
        None => "/api/tasks".to_string(),
    }
}

/// Identity fields carried by an account update. Passwords never reach the cache.
fn identity_patch(update: &UserUpdate) -> UserPatch {
    UserPatch {
        first_name: update.first_name.clone(),
        last_name: update.last_name.clone(),
        email: update.email.clone(),
        role: update.role,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskboard_protocol::Role;

    use crate::clock::ManualClock;
    use crate::session::{
        ACCESS_TOKEN_KEY, CURRENT_USER_KEY, EXPIRATION_TIME_KEY, REFRESH_TOKEN_KEY,
    };
    use crate::store::{MemoryStore, SessionStore};
    use crate::testing::{local_http, FakeAuth, ReplayServer, START};

    struct Fixture {
        api: ApiClient,
        sessions: Arc<SessionManager>,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        server: ReplayServer,
    }

    async fn signed_in(replies: Vec<(u16, &'static str)>) -> Fixture {
        let server = ReplayServer::start(replies).await;
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new(START));
        let sessions = Arc::new(SessionManager::with_clock(
            Arc::new(FakeAuth::default()),
            store.clone(),
            clock.clone(),
        ));
        sessions.sign_in("a@b.com", "secret123").await.unwrap();
        let api = ApiClient::new(local_http(), server.base_url.clone(), sessions.clone());
        Fixture {
            api,
            sessions,
            store,
            clock,
            server,
        }
    }

    #[tokio::test]
    async fn requests_carry_session_bearer() {
        let f = signed_in(vec![
            (200, r#"{"boards":[{"id":1,"name":"Ops"}]}"#),
            (200, r#"{"boards":[]}"#),
        ])
        .await;

        let boards = f.api.list_boards().await.unwrap();
        assert_eq!(boards.len(), 1);
        assert_eq!(boards[0].name, "Ops");

        f.clock.set(START + 3_700_000);
        f.api.list_boards().await.unwrap();

        let seen = f.server.requests();
        assert_eq!(seen[0].method, "GET");
        assert_eq!(seen[0].path, "/api/boards");
        assert_eq!(seen[0].authorization.as_deref(), Some("Bearer access-0"));
        assert_eq!(seen[1].authorization.as_deref(), Some("Bearer access-1"));
    }

    #[tokio::test]
    async fn unauthorized_reply_ends_session() {
        let f = signed_in(vec![(401, r#"{"error":"Not authorized"}"#)]).await;

        let err = f.api.list_boards().await.unwrap_err();

        assert_eq!(err, ClientError::SessionExpired);
        assert!(!f.sessions.is_signed_in());
        for key in [
            ACCESS_TOKEN_KEY,
            REFRESH_TOKEN_KEY,
            CURRENT_USER_KEY,
            EXPIRATION_TIME_KEY,
        ] {
            assert_eq!(f.store.get(key).unwrap(), None);
        }
        assert_eq!(
            f.server.requests()[0].authorization.as_deref(),
            Some("Bearer access-0")
        );
    }

    #[tokio::test]
    async fn signed_out_client_never_calls_server() {
        let f = signed_in(vec![(200, r#"{"boards":[]}"#)]).await;
        f.sessions.sign_out().await;

        assert_eq!(f.api.list_boards().await.unwrap_err(), ClientError::SessionExpired);
        assert!(f.server.requests().is_empty());
    }

    #[tokio::test]
    async fn error_statuses_map_to_client_errors() {
        let f = signed_in(vec![
            (422, r#"{"errors":["Name can't be blank"]}"#),
            (403, r#"{"error":"Admins only"}"#),
        ])
        .await;

        let params = BoardParams {
            name: String::new(),
            description: None,
            team_id: 2,
        };
        assert_eq!(
            f.api.create_board(&params).await.unwrap_err(),
            ClientError::Validation("Name can't be blank".into())
        );
        assert_eq!(
            f.api.delete_board(4).await.unwrap_err(),
            ClientError::Api {
                status: 403,
                message: "Admins only".into()
            }
        );
        assert!(f.sessions.is_signed_in());

        let seen = f.server.requests();
        let body: Value = serde_json::from_str(&seen[0].body).unwrap();
        assert_eq!(body["board"]["team_id"], 2);
        assert_eq!(seen[1].method, "DELETE");
        assert_eq!(seen[1].path, "/api/boards/4");
    }

    #[tokio::test]
    async fn created_board_decodes_with_or_without_wrapper() {
        let f = signed_in(vec![
            (201, r#"{"board":{"id":7,"name":"Ops","team_id":2}}"#),
            (201, r#"{"id":8,"name":"Infra","team_id":2}"#),
        ])
        .await;

        let params = BoardParams {
            name: "Ops".into(),
            description: None,
            team_id: 2,
        };
        let wrapped = f.api.create_board(&params).await.unwrap();
        let bare = f.api.create_board(&params).await.unwrap();

        assert_eq!((wrapped.id, wrapped.name.as_str()), (7, "Ops"));
        assert_eq!((bare.id, bare.name.as_str()), (8, "Infra"));
        assert_eq!(f.server.requests()[0].path, "/api/boards");
    }

    #[tokio::test]
    async fn status_only_task_update_sends_one_field() {
        let f = signed_in(vec![(
            200,
            r#"{"task":{"id":9,"title":"Ship","status":"completed","priority":"low"}}"#,
        )])
        .await;

        let params = TaskParams {
            status: Some("completed".into()),
            ..Default::default()
        };
        let task = f.api.update_task(9, &params).await.unwrap();
        assert_eq!(task.status, "completed");

        let seen = f.server.requests();
        assert_eq!(seen[0].method, "PUT");
        assert_eq!(seen[0].path, "/api/tasks/9");
        let body: Value = serde_json::from_str(&seen[0].body).unwrap();
        assert_eq!(body, serde_json::json!({"task": {"status": "completed"}}));
    }

    #[tokio::test]
    async fn self_update_patches_cached_identity() {
        let f = signed_in(vec![
            (200, r#"{"id":7,"first_name":"Anna","last_name":"Bell","email":"a@b.com"}"#),
            (200, r#"{"user":{"id":8,"first_name":"Zed","email":"z@b.com"}}"#),
        ])
        .await;

        let rename = UserUpdate {
            first_name: Some("Anna".into()),
            ..Default::default()
        };
        f.api.update_user(7, &rename).await.unwrap();
        assert_eq!(f.sessions.current_user().unwrap().first_name, "Anna");

        let other = UserUpdate {
            first_name: Some("Zed".into()),
            ..Default::default()
        };
        let user = f.api.update_user(8, &other).await.unwrap();
        assert_eq!(user.id, 8);
        assert_eq!(f.sessions.current_user().unwrap().first_name, "Anna");
        assert_eq!(f.server.requests()[1].path, "/api/users/8");
    }

    #[tokio::test]
    async fn mark_read_puts_without_body() {
        let f = signed_in(vec![(200, "{}")]).await;

        f.api.mark_read(5).await.unwrap();

        let seen = f.server.requests();
        assert_eq!(seen[0].method, "PUT");
        assert_eq!(seen[0].path, "/api/notifications/5");
        assert!(seen[0].body.is_empty());
    }

    #[test]
    fn tasks_path_filters_by_board() {
        assert_eq!(tasks_path(None), "/api/tasks");
        assert_eq!(tasks_path(Some(12)), "/api/tasks?board_id=12");
    }

    #[test]
    fn identity_patch_drops_password_fields() {
        let update = UserUpdate {
            first_name: Some("Grace".into()),
            role: Some(Role::Manager),
            password: Some("hunter22".into()),
            password_confirmation: Some("hunter22".into()),
            current_password: Some("secret123".into()),
            ..Default::default()
        };

        let patch = identity_patch(&update);
        assert_eq!(patch.first_name.as_deref(), Some("Grace"));
        assert_eq!(patch.role, Some(Role::Manager));
        assert!(patch.email.is_none());
    }

    #[test]
    fn password_only_update_is_empty_patch() {
        let update = UserUpdate {
            password: Some("hunter22".into()),
            ..Default::default()
        };
        assert!(identity_patch(&update).is_empty());
    }
}
