//! Token endpoints (`/api/users/tokens/*`).

use async_trait::async_trait;
use reqwest::Client;
use taskboard_protocol::{
    NewUser, RefreshRequest, RefreshResponse, SignInRequest, TokenResponse, UserEnvelope,
};

use crate::error::ClientError;
use crate::http::{check, join_url};

/// Credential exchange with the server. `SessionManager` is the only caller.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn sign_in(&self, request: &SignInRequest) -> Result<TokenResponse, ClientError>;

    async fn sign_up(&self, user: &NewUser) -> Result<TokenResponse, ClientError>;

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ClientError>;

    /// Revoke the access token server-side.
    async fn revoke(&self, access_token: &str) -> Result<(), ClientError>;
}

pub struct HttpAuthApi {
    http: Client,
    base_url: String,
}

impl HttpAuthApi {
    pub fn new(http: Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    fn url(&self, endpoint: &str) -> String {
        join_url(&self.base_url, &format!("/api/users/tokens/{endpoint}"))
    }
}

#[async_trait]
impl AuthApi for HttpAuthApi {
    async fn sign_in(&self, request: &SignInRequest) -> Result<TokenResponse, ClientError> {
        let resp = self.http.post(self.url("sign_in")).json(request).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn sign_up(&self, user: &NewUser) -> Result<TokenResponse, ClientError> {
        let body = UserEnvelope { user };
        let resp = self.http.post(self.url("sign_up")).json(&body).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ClientError> {
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        let resp = self.http.post(self.url("refresh")).json(&body).send().await?;
        Ok(check(resp).await?.json().await?)
    }

    async fn revoke(&self, access_token: &str) -> Result<(), ClientError> {
        let resp = self
            .http
            .post(self.url("revoke"))
            .bearer_auth(access_token)
            .send()
            .await?;
        check(resp).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use taskboard_protocol::Role;

    use crate::testing::{local_http, ReplayServer};

    const TOKENS: &str = r#"{
        "token":"access-1","refresh_token":"refresh-1","expires_in":7200,
        "resource_owner":{"id":3,"email":"a@b.com"},
        "role":"manager","first_name":"Ann","last_name":"Bell"
    }"#;

    #[tokio::test]
    async fn sign_in_posts_credentials_and_decodes_tokens() {
        let server = ReplayServer::start(vec![(200, TOKENS)]).await;
        let api = HttpAuthApi::new(local_http(), server.base_url.clone());

        let response = api
            .sign_in(&SignInRequest {
                email: "a@b.com".into(),
                password: "secret123".into(),
            })
            .await
            .unwrap();

        assert_eq!(response.token, "access-1");
        assert_eq!(response.expires_in, 7200);
        assert_eq!(response.identity().role, Role::Manager);

        let seen = server.requests();
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].path, "/api/users/tokens/sign_in");
        assert!(seen[0].authorization.is_none());
        let body: Value = serde_json::from_str(&seen[0].body).unwrap();
        assert_eq!(body["email"], "a@b.com");
        assert_eq!(body["password"], "secret123");
    }

    #[tokio::test]
    async fn sign_up_wraps_user_and_maps_validation() {
        let server = ReplayServer::start(vec![(
            422,
            r#"{"errors":["Email has already been taken"]}"#,
        )])
        .await;
        let api = HttpAuthApi::new(local_http(), server.base_url.clone());

        let err = api
            .sign_up(&NewUser {
                first_name: "Ann".into(),
                last_name: "Bell".into(),
                email: "a@b.com".into(),
                password: "secret123".into(),
                password_confirmation: "secret123".into(),
                role: None,
            })
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ClientError::Validation("Email has already been taken".into())
        );
        let body: Value = serde_json::from_str(&server.requests()[0].body).unwrap();
        assert_eq!(body["user"]["email"], "a@b.com");
    }

    #[tokio::test]
    async fn refresh_rejection_keeps_status() {
        let server =
            ReplayServer::start(vec![(401, r#"{"error":"Invalid refresh token"}"#)]).await;
        let api = HttpAuthApi::new(local_http(), server.base_url.clone());

        let err = api.refresh("refresh-0").await.unwrap_err();

        assert_eq!(
            err,
            ClientError::Api {
                status: 401,
                message: "Invalid refresh token".into()
            }
        );
        let seen = server.requests();
        assert_eq!(seen[0].path, "/api/users/tokens/refresh");
        let body: Value = serde_json::from_str(&seen[0].body).unwrap();
        assert_eq!(body["refresh_token"], "refresh-0");
    }

    #[tokio::test]
    async fn revoke_sends_bearer() {
        let server = ReplayServer::start(vec![(200, "{}")]).await;
        let api = HttpAuthApi::new(local_http(), server.base_url.clone());

        api.revoke("access-9").await.unwrap();

        let seen = server.requests();
        assert_eq!(seen[0].path, "/api/users/tokens/revoke");
        assert_eq!(seen[0].authorization.as_deref(), Some("Bearer access-9"));
    }
}
