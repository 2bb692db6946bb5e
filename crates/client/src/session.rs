//! Session manager: credential exchange, persistence, lazy expiry, refresh.
//!
//! The in-memory session lives in an `ArcSwapOption` so `current_user()` is a
//! lock-free read. Every write that replaces the session (sign-in, sign-out,
//! refresh, identity update) runs under `refresh_lock`, which also makes
//! refresh single-flight: callers that find the token expired queue on the
//! lock and re-check expiry once they hold it, so a burst of concurrent
//! callers issues one refresh.

use std::fmt;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use taskboard_protocol::{NewUser, Role, SignInRequest, TokenResponse, UserIdentity, UserPatch};
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::auth_api::AuthApi;
use crate::clock::{Clock, SystemClock};
use crate::error::ClientError;
use crate::store::SessionStore;

pub(crate) const ACCESS_TOKEN_KEY: &str = "access_token";
pub(crate) const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub(crate) const CURRENT_USER_KEY: &str = "currentUser";
pub(crate) const EXPIRATION_TIME_KEY: &str = "expiration_time";

const SESSION_KEYS: [&str; 4] = [
    ACCESS_TOKEN_KEY,
    REFRESH_TOKEN_KEY,
    CURRENT_USER_KEY,
    EXPIRATION_TIME_KEY,
];

const SIGN_UP_FAILED: &str = "Failed to create user.";

/// The authenticated principal and its bearer credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    /// Epoch millis after which `access_token` must not be used
    pub expires_at: u64,
    pub user: UserIdentity,
}

impl Session {
    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        now_millis >= self.expires_at
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// Coarse session state published to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    SignedOut,
    SignedIn { user_id: u64 },
}

pub struct SessionManager {
    auth: Arc<dyn AuthApi>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    session: ArcSwapOption<Session>,
    refresh_lock: Mutex<()>,
    state_tx: watch::Sender<AuthState>,
}

impl SessionManager {
    pub fn new(auth: Arc<dyn AuthApi>, store: Arc<dyn SessionStore>) -> Self {
        Self::with_clock(auth, store, Arc::new(SystemClock))
    }

    /// Build a manager, restoring any session persisted by a previous run.
    pub fn with_clock(
        auth: Arc<dyn AuthApi>,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let restored = restore(store.as_ref());
        let state = match &restored {
            Some(session) => AuthState::SignedIn {
                user_id: session.user.id,
            },
            None => AuthState::SignedOut,
        };
        let (state_tx, _) = watch::channel(state);

        Self {
            auth,
            store,
            clock,
            session: ArcSwapOption::new(restored.map(Arc::new)),
            refresh_lock: Mutex::new(()),
            state_tx,
        }
    }

    /// Exchange email/password for a session.
    ///
    /// Any failure is reported as `InvalidCredentials`; an existing session is
    /// left untouched.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, ClientError> {
        let request = SignInRequest {
            email: email.to_string(),
            password: password.to_string(),
        };

        let response = match self.auth.sign_in(&request).await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    component = "session",
                    event = "session.sign_in_failed",
                    error = %err,
                    "Sign-in failed"
                );
                return Err(ClientError::InvalidCredentials);
            }
        };

        self.establish(response).await.map_err(|err| match err {
            ClientError::Decode(_) => ClientError::InvalidCredentials,
            other => other,
        })
    }

    /// Create an account and start a session for it.
    pub async fn sign_up(&self, user: &NewUser) -> Result<Session, ClientError> {
        let response = match self.auth.sign_up(user).await {
            Ok(response) => response,
            Err(err) => {
                warn!(
                    component = "session",
                    event = "session.sign_up_failed",
                    error = %err,
                    "Sign-up failed"
                );
                return Err(match err {
                    ClientError::Validation(message) => ClientError::Validation(message),
                    ClientError::Api { message, status } if status < 500 => {
                        ClientError::Validation(message)
                    }
                    _ => ClientError::Validation(SIGN_UP_FAILED.to_string()),
                });
            }
        };

        self.establish(response).await.map_err(|err| match err {
            ClientError::Decode(_) => ClientError::Validation(SIGN_UP_FAILED.to_string()),
            other => other,
        })
    }

    /// Clear the session locally, then ask the server to revoke the token.
    ///
    /// Local state is always cleared; a failed revoke is only logged.
    pub async fn sign_out(&self) {
        let previous = {
            let _guard = self.refresh_lock.lock().await;
            self.clear("sign_out")
        };

        if let Some(previous) = previous {
            if let Err(err) = self.auth.revoke(&previous.access_token).await {
                debug!(
                    component = "session",
                    event = "session.revoke_failed",
                    error = %err,
                    "Server-side revoke failed"
                );
            }
        }
    }

    /// End the session because the server rejected `access_token`.
    ///
    /// A session that has since moved on to a different token (new sign-in or
    /// refresh) is kept. Returns whether anything was cleared.
    pub async fn expire_token(&self, access_token: &str) -> bool {
        let _guard = self.refresh_lock.lock().await;
        let current = self
            .session
            .load()
            .as_ref()
            .is_some_and(|s| s.access_token == access_token);
        if current {
            self.clear("unauthorized");
        }
        current
    }

    /// Bearer token for the next API call, refreshing first when expired.
    pub async fn access_token(&self) -> Result<String, ClientError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }
        self.refresh_locked().await
    }

    /// Force a refresh using the stored refresh token.
    ///
    /// On failure the session is signed out and `SessionExpired` returned.
    pub async fn refresh(&self) -> Result<String, ClientError> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Cached identity. No I/O and no expiry check.
    pub fn current_user(&self) -> Option<UserIdentity> {
        self.session.load().as_ref().map(|s| s.user.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.load().is_some()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.session
            .load()
            .as_ref()
            .is_some_and(|s| s.user.role == role)
    }

    /// Admins may edit anyone; everyone else only themselves.
    pub fn can_edit_user(&self, user_id: u64) -> bool {
        self.session
            .load()
            .as_ref()
            .is_some_and(|s| s.user.id == user_id || s.user.role == Role::Admin)
    }

    /// Merge `patch` into the identity without touching tokens.
    ///
    /// Does nothing once signed out; a racing sign-out wins.
    pub async fn update_current_user(&self, patch: &UserPatch) {
        if patch.is_empty() {
            return;
        }

        let _guard = self.refresh_lock.lock().await;
        let Some(current) = self.session.load_full() else {
            debug!(
                component = "session",
                event = "session.update_user_skipped",
                "No active session to update"
            );
            return;
        };

        let mut next = Session::clone(&current);
        next.user.apply(patch);
        let persisted = serde_json::to_string(&next.user)
            .map_err(ClientError::from)
            .and_then(|json| self.store.set(CURRENT_USER_KEY, &json));
        if let Err(err) = persisted {
            warn!(
                component = "session",
                event = "session.persist_user_failed",
                error = %err,
                "Failed to persist updated user"
            );
        }
        self.session.store(Some(Arc::new(next)));
    }

    pub fn auth_state(&self) -> AuthState {
        *self.state_tx.borrow()
    }

    /// Observe sign-in / sign-out transitions.
    pub fn subscribe(&self) -> watch::Receiver<AuthState> {
        self.state_tx.subscribe()
    }

    fn cached_token(&self) -> Option<String> {
        let now = self.clock.now_millis();
        self.session
            .load()
            .as_ref()
            .filter(|s| !s.is_expired_at(now))
            .map(|s| s.access_token.clone())
    }

    async fn establish(&self, response: TokenResponse) -> Result<Session, ClientError> {
        if response.token.is_empty() || response.refresh_token.is_empty() {
            return Err(ClientError::Decode(
                "token response is missing credentials".into(),
            ));
        }

        let session = Session {
            expires_at: self
                .clock
                .now_millis()
                .saturating_add(response.expires_in.saturating_mul(1000)),
            user: response.identity(),
            access_token: response.token,
            refresh_token: response.refresh_token,
        };

        let _guard = self.refresh_lock.lock().await;
        self.persist(&session)?;
        self.session.store(Some(Arc::new(session.clone())));
        self.state_tx.send_replace(AuthState::SignedIn {
            user_id: session.user.id,
        });

        info!(
            component = "session",
            event = "session.signed_in",
            user_id = session.user.id,
            role = %session.user.role,
            expires_at = session.expires_at,
            "Session established"
        );
        Ok(session)
    }

    async fn refresh_locked(&self) -> Result<String, ClientError> {
        let current = match self.session.load_full() {
            Some(session) if !session.refresh_token.is_empty() => session,
            _ => {
                warn!(
                    component = "session",
                    event = "session.refresh_unavailable",
                    "No refresh token available"
                );
                self.clear("missing_refresh_token");
                return Err(ClientError::SessionExpired);
            }
        };

        let response = match self.auth.refresh(&current.refresh_token).await {
            Ok(response) if !response.token.is_empty() => response,
            Ok(_) => {
                warn!(
                    component = "session",
                    event = "session.refresh_failed",
                    "Refresh response carried no token"
                );
                self.clear("refresh_rejected");
                return Err(ClientError::SessionExpired);
            }
            Err(err) => {
                warn!(
                    component = "session",
                    event = "session.refresh_failed",
                    error = %err,
                    "Token refresh failed"
                );
                self.clear("refresh_rejected");
                return Err(ClientError::SessionExpired);
            }
        };

        let expires_at = self
            .clock
            .now_millis()
            .saturating_add(response.expires_in.saturating_mul(1000));
        let access_token = response.token;
        let rotated = response.refresh_token.filter(|t| !t.is_empty());

        let mut session = Session::clone(&current);
        session.access_token = access_token;
        session.expires_at = expires_at;
        if let Some(token) = rotated {
            session.refresh_token = token;
        }
        self.session.store(Some(Arc::new(session.clone())));

        let expiration = session.expires_at.to_string();
        if let Err(err) = self.store.set_many(&[
            (ACCESS_TOKEN_KEY, session.access_token.as_str()),
            (REFRESH_TOKEN_KEY, session.refresh_token.as_str()),
            (EXPIRATION_TIME_KEY, expiration.as_str()),
        ]) {
            warn!(
                component = "session",
                event = "session.persist_failed",
                error = %err,
                "Failed to persist refreshed token"
            );
        }

        info!(
            component = "session",
            event = "session.refreshed",
            user_id = session.user.id,
            expires_at = session.expires_at,
            "Access token refreshed"
        );
        Ok(session.access_token)
    }

    fn persist(&self, session: &Session) -> Result<(), ClientError> {
        let user = serde_json::to_string(&session.user)?;
        let expiration = session.expires_at.to_string();
        self.store.set_many(&[
            (ACCESS_TOKEN_KEY, session.access_token.as_str()),
            (REFRESH_TOKEN_KEY, session.refresh_token.as_str()),
            (CURRENT_USER_KEY, user.as_str()),
            (EXPIRATION_TIME_KEY, expiration.as_str()),
        ])
    }

    /// Drop the session from memory and storage. Caller holds `refresh_lock`.
    fn clear(&self, reason: &'static str) -> Option<Arc<Session>> {
        if let Err(err) = self.store.remove_many(&SESSION_KEYS) {
            error!(
                component = "session",
                event = "session.clear_failed",
                error = %err,
                "Failed to clear persisted session"
            );
        }

        let previous = self.session.swap(None);
        self.state_tx.send_if_modified(|state| {
            if *state == AuthState::SignedOut {
                false
            } else {
                *state = AuthState::SignedOut;
                true
            }
        });

        if previous.is_some() {
            info!(
                component = "session",
                event = "session.signed_out",
                reason,
                "Session cleared"
            );
        }
        previous
    }
}

fn restore(store: &dyn SessionStore) -> Option<Session> {
    match load_persisted(store) {
        Ok(Some(session)) => {
            info!(
                component = "session",
                event = "session.restored",
                user_id = session.user.id,
                expires_at = session.expires_at,
                "Restored persisted session"
            );
            Some(session)
        }
        Ok(None) => None,
        Err(err) => {
            warn!(
                component = "session",
                event = "session.restore_failed",
                error = %err,
                "Discarding unreadable persisted session"
            );
            if let Err(err) = store.remove_many(&SESSION_KEYS) {
                error!(
                    component = "session",
                    event = "session.clear_failed",
                    error = %err,
                    "Failed to clear persisted session"
                );
            }
            None
        }
    }
}

fn load_persisted(store: &dyn SessionStore) -> Result<Option<Session>, ClientError> {
    let fields = (
        store.get(ACCESS_TOKEN_KEY)?,
        store.get(REFRESH_TOKEN_KEY)?,
        store.get(CURRENT_USER_KEY)?,
        store.get(EXPIRATION_TIME_KEY)?,
    );

    match fields {
        (None, None, None, None) => Ok(None),
        (Some(access_token), Some(refresh_token), Some(user), Some(expiration)) => {
            let user: UserIdentity = serde_json::from_str(&user)?;
            let expires_at = expiration
                .trim()
                .parse::<u64>()
                .map_err(|err| ClientError::Decode(format!("expiration_time: {err}")))?;
            Ok(Some(Session {
                access_token,
                refresh_token,
                expires_at,
                user,
            }))
        }
        _ => Err(ClientError::Decode("incomplete persisted session".into())),
    }
}
