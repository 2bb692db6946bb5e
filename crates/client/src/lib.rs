//! Taskboard client library
//!
//! Session management with transparent token refresh, a live notification
//! channel with bounded reconnects, and typed access to the REST API.

pub mod api;
pub mod auth_api;
pub mod clock;
pub mod config;
pub mod error;
pub(crate) mod http;
pub mod notifications;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

use std::path::Path;
use std::sync::Arc;

pub use api::ApiClient;
pub use auth_api::{AuthApi, HttpAuthApi};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ClientConfig, ReconnectConfig};
pub use error::ClientError;
pub use notifications::{
    Backoff, ChannelState, Connector, NotificationChannel, ReadReceipts, WsConnector,
};
pub use session::{AuthState, Session, SessionManager};
pub use store::{MemoryStore, SessionStore, SqliteStore};

/// Everything a front end needs, wired against one server and one session file.
pub struct Taskboard {
    pub sessions: Arc<SessionManager>,
    pub api: Arc<ApiClient>,
    pub notifications: Arc<NotificationChannel>,
}

impl Taskboard {
    pub fn open(config: &ClientConfig, session_db: &Path) -> Result<Self, ClientError> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::Config(e.to_string()))?;

        let store = Arc::new(SqliteStore::open(session_db)?);
        let auth = Arc::new(HttpAuthApi::new(http.clone(), config.api_base()));
        let sessions = Arc::new(SessionManager::new(auth, store));
        let api = Arc::new(ApiClient::new(http, config.api_base(), sessions.clone()));
        let connector = Arc::new(WsConnector::new(&config.ws_base()));
        let notifications = Arc::new(NotificationChannel::new(
            connector,
            api.clone(),
            config.reconnect.backoff(),
        ));

        Ok(Self {
            sessions,
            api,
            notifications,
        })
    }
}
