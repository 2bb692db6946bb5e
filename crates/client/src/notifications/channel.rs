//! Reconnecting notification channel.
//!
//! One driver task per channel walks the state machine
//! `Idle -> Connecting -> Open -> Closed -> Scheduled -> Connecting ...`,
//! ending in `GaveUp` once the backoff budget is spent. `connect` replaces the
//! driver; `teardown` stops it. Each driver carries a generation number and
//! only the current generation may publish state or deliver frames, so a
//! superseded driver that is still winding down cannot leak into the new one.
//!
//! Delivery is at-most-once: frames sent while disconnected are not replayed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::{Stream, StreamExt};
use taskboard_protocol::Notification;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::backoff::Backoff;
use super::transport::Connector;
use super::ReadReceipts;
use crate::error::ClientError;
use crate::session::{AuthState, SessionManager};

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    Closed,
    Scheduled { attempt: u32, delay: Duration },
    GaveUp,
}

enum Credential {
    Token(String),
    Session(Arc<SessionManager>),
}

impl Credential {
    async fn token(&self) -> Result<String, ClientError> {
        match self {
            Credential::Token(token) => Ok(token.clone()),
            Credential::Session(sessions) => sessions.access_token().await,
        }
    }
}

struct Shared {
    generation: AtomicU64,
    held: Mutex<VecDeque<Notification>>,
    state: watch::Sender<ChannelState>,
    events: broadcast::Sender<Notification>,
}

impl Shared {
    fn held(&self) -> MutexGuard<'_, VecDeque<Notification>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn set_state(&self, generation: u64, state: ChannelState) {
        if self.is_current(generation) {
            self.state.send_replace(state);
        }
    }

    fn receive(&self, generation: u64, frame: &str) {
        let notification: Notification = match serde_json::from_str(frame) {
            Ok(notification) => notification,
            Err(err) => {
                warn!(
                    component = "notifications",
                    event = "notifications.frame_invalid",
                    error = %err,
                    "Skipping malformed notification frame"
                );
                return;
            }
        };

        // Checked under the lock: teardown bumps the generation before clearing.
        let mut held = self.held();
        if !self.is_current(generation) {
            return;
        }
        debug!(
            component = "notifications",
            event = "notifications.received",
            notification_id = notification.id,
            "Notification received"
        );
        held.push_front(notification.clone());
        // No subscribers is fine; the held list still has it.
        let _ = self.events.send(notification);
    }

    fn remove(&self, id: u64) -> Option<Notification> {
        let mut held = self.held();
        let index = held.iter().position(|n| n.id == id)?;
        held.remove(index)
    }
}

pub struct NotificationChannel {
    connector: Arc<dyn Connector>,
    receipts: Arc<dyn ReadReceipts>,
    backoff: Backoff,
    shared: Arc<Shared>,
    driver: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationChannel {
    pub fn new(
        connector: Arc<dyn Connector>,
        receipts: Arc<dyn ReadReceipts>,
        backoff: Backoff,
    ) -> Self {
        let (state, _) = watch::channel(ChannelState::Idle);
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            connector,
            receipts,
            backoff,
            shared: Arc::new(Shared {
                generation: AtomicU64::new(0),
                held: Mutex::new(VecDeque::new()),
                state,
                events,
            }),
            driver: Mutex::new(None),
        }
    }

    /// Open the channel with a fixed access token, replacing any previous connection.
    pub fn connect(&self, token: impl Into<String>) {
        self.start(Credential::Token(token.into()));
    }

    /// Like `connect`, but every (re)connect asks `sessions` for a current token.
    pub fn connect_session(&self, sessions: Arc<SessionManager>) {
        self.start(Credential::Session(sessions));
    }

    /// Close the connection, cancel any pending reconnect and drop held notifications.
    pub fn teardown(&self) {
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(driver) = self.driver().take() {
            driver.abort();
            info!(
                component = "notifications",
                event = "notifications.teardown",
                "Notification channel closed"
            );
        }
        self.shared.held().clear();
        self.shared.set_state(generation, ChannelState::Idle);
    }

    /// Connect while `sessions` reports a signed-in user; tear down on sign-out.
    pub fn follow_session(self: &Arc<Self>, sessions: Arc<SessionManager>) -> JoinHandle<()> {
        let channel = Arc::clone(self);
        let mut auth_rx = sessions.subscribe();
        tokio::spawn(async move {
            loop {
                let auth = *auth_rx.borrow_and_update();
                match auth {
                    AuthState::SignedIn { .. } => channel.connect_session(sessions.clone()),
                    AuthState::SignedOut => channel.teardown(),
                }
                if auth_rx.changed().await.is_err() {
                    break;
                }
            }
        })
    }

    pub fn state(&self) -> ChannelState {
        *self.shared.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.shared.state.subscribe()
    }

    /// Lazy, unbounded sequence of inbound notifications.
    ///
    /// Only notifications received after the call are yielded. A subscriber
    /// that falls more than the buffer behind skips the overflow.
    pub fn events(&self) -> impl Stream<Item = Notification> + Send + 'static {
        let rx = self.shared.events.subscribe();
        futures::stream::unfold(rx, |mut rx| async move {
            loop {
                match rx.recv().await {
                    Ok(notification) => return Some((notification, rx)),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            component = "notifications",
                            event = "notifications.subscriber_lagged",
                            skipped,
                            "Notification subscriber fell behind"
                        );
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        })
    }

    /// Held notifications, most recent first.
    pub fn notifications(&self) -> Vec<Notification> {
        self.shared.held().iter().cloned().collect()
    }

    /// Mark read on the server (fire-and-forget) and drop it locally right away.
    pub fn dismiss(&self, id: u64) -> Option<Notification> {
        let receipts = Arc::clone(&self.receipts);
        tokio::spawn(async move {
            if let Err(err) = receipts.mark_read(id).await {
                warn!(
                    component = "notifications",
                    event = "notifications.mark_read_failed",
                    notification_id = id,
                    error = %err,
                    "Failed to mark notification as read"
                );
            }
        });
        self.shared.remove(id)
    }

    /// Open a notification: returns the referenced task and dismisses it.
    ///
    /// Notifications without a task reference are left in place.
    pub fn follow(&self, id: u64) -> Option<u64> {
        let task_id = self
            .shared
            .held()
            .iter()
            .find(|n| n.id == id)
            .and_then(Notification::task_id)?;
        self.dismiss(id);
        Some(task_id)
    }

    fn driver(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn start(&self, credential: Credential) {
        let mut driver = self.driver();
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = driver.take() {
            previous.abort();
        }
        self.shared.set_state(generation, ChannelState::Connecting);
        *driver = Some(tokio::spawn(drive(
            Arc::clone(&self.shared),
            generation,
            Arc::clone(&self.connector),
            credential,
            self.backoff,
        )));
    }
}

impl Drop for NotificationChannel {
    fn drop(&mut self) {
        if let Some(driver) = self.driver().take() {
            driver.abort();
        }
    }
}

async fn drive(
    shared: Arc<Shared>,
    generation: u64,
    connector: Arc<dyn Connector>,
    credential: Credential,
    mut backoff: Backoff,
) {
    loop {
        shared.set_state(generation, ChannelState::Connecting);

        let token = match credential.token().await {
            Ok(token) => token,
            Err(err) => {
                info!(
                    component = "notifications",
                    event = "notifications.no_session",
                    error = %err,
                    "No access token, notification channel idle"
                );
                shared.set_state(generation, ChannelState::Idle);
                return;
            }
        };

        match connector.open(&token).await {
            Ok(mut frames) => {
                backoff.reset();
                shared.set_state(generation, ChannelState::Open);
                info!(
                    component = "notifications",
                    event = "notifications.connected",
                    "Connected to notification stream"
                );

                while let Some(frame) = frames.next().await {
                    match frame {
                        Ok(text) => shared.receive(generation, &text),
                        Err(err) => {
                            warn!(
                                component = "notifications",
                                event = "notifications.stream_error",
                                error = %err,
                                "Notification stream failed"
                            );
                            break;
                        }
                    }
                }

                info!(
                    component = "notifications",
                    event = "notifications.disconnected",
                    "Notification stream closed"
                );
            }
            Err(err) => {
                warn!(
                    component = "notifications",
                    event = "notifications.connect_failed",
                    attempt = backoff.attempt(),
                    error = %err,
                    "Failed to open notification stream"
                );
            }
        }

        shared.set_state(generation, ChannelState::Closed);

        let attempt = backoff.attempt();
        let Some(delay) = backoff.next_delay() else {
            warn!(
                component = "notifications",
                event = "notifications.gave_up",
                max_attempts = backoff.max_attempts(),
                error = %ClientError::ChannelUnavailable,
                "Reconnect budget exhausted, live notifications stopped"
            );
            shared.set_state(generation, ChannelState::GaveUp);
            return;
        };

        debug!(
            component = "notifications",
            event = "notifications.reconnect_scheduled",
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Scheduling reconnect"
        );
        shared.set_state(generation, ChannelState::Scheduled { attempt, delay });
        tokio::time::sleep(delay).await;
    }
}
