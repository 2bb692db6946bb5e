//! In-memory fakes shared by unit tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use taskboard_protocol::{
    NewUser, RefreshResponse, ResourceOwner, Role, SignInRequest, TokenResponse,
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use crate::auth_api::AuthApi;
use crate::error::ClientError;
use crate::notifications::{Connector, FrameStream, ReadReceipts};

pub(crate) const START: u64 = 1_700_000_000_000;

/// Accepts password `secret123`; emails starting with `admin` get the admin role.
#[derive(Default)]
pub(crate) struct FakeAuth {
    pub refresh_rejects: AtomicBool,
    pub refresh_delay: Option<Duration>,
    pub refresh_calls: AtomicUsize,
    pub revoke_calls: AtomicUsize,
}

pub(crate) fn token_response(email: &str, role: Role) -> TokenResponse {
    TokenResponse {
        token: "access-0".into(),
        refresh_token: "refresh-0".into(),
        expires_in: 3600,
        resource_owner: ResourceOwner {
            id: 7,
            email: email.into(),
            first_name: Some("Ann".into()),
            last_name: Some("Bell".into()),
            role: None,
        },
        role: Some(role),
        first_name: None,
        last_name: None,
    }
}

#[async_trait]
impl AuthApi for FakeAuth {
    async fn sign_in(&self, request: &SignInRequest) -> Result<TokenResponse, ClientError> {
        if request.password != "secret123" {
            return Err(ClientError::Api {
                status: 401,
                message: "Invalid Email or password.".into(),
            });
        }
        let role = if request.email.starts_with("admin") {
            Role::Admin
        } else {
            Role::Agent
        };
        Ok(token_response(&request.email, role))
    }

    async fn sign_up(&self, user: &NewUser) -> Result<TokenResponse, ClientError> {
        if user.email.contains("taken") {
            return Err(ClientError::Validation(
                "Email has already been taken".into(),
            ));
        }
        Ok(token_response(&user.email, Role::Agent))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse, ClientError> {
        let n = self.refresh_calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.refresh_delay {
            tokio::time::sleep(delay).await;
        }
        if self.refresh_rejects.load(Ordering::SeqCst) || refresh_token.is_empty() {
            return Err(ClientError::Api {
                status: 401,
                message: "Invalid refresh token".into(),
            });
        }
        Ok(RefreshResponse {
            token: format!("access-{n}"),
            expires_in: 3600,
            refresh_token: None,
        })
    }

    async fn revoke(&self, _access_token: &str) -> Result<(), ClientError> {
        self.revoke_calls.fetch_add(1, Ordering::SeqCst);
        Err(ClientError::Network("connection refused".into()))
    }
}

/// Records mark-read calls on a channel; optionally fails every call.
pub(crate) struct RecordingReceipts {
    tx: mpsc::UnboundedSender<u64>,
    fail: bool,
}

impl RecordingReceipts {
    pub fn new(fail: bool) -> (Self, mpsc::UnboundedReceiver<u64>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, fail }, rx)
    }
}

#[async_trait]
impl ReadReceipts for RecordingReceipts {
    async fn mark_read(&self, notification_id: u64) -> Result<(), ClientError> {
        let _ = self.tx.send(notification_id);
        if self.fail {
            Err(ClientError::Api {
                status: 500,
                message: "Internal Server Error".into(),
            })
        } else {
            Ok(())
        }
    }
}

/// What the next `open` call does.
pub(crate) enum Script {
    Fail,
    /// Deliver frames, then close.
    Frames(Vec<String>),
    /// Deliver frames and stay open.
    Hold(Vec<String>),
}

/// Plays back scripted outcomes; fails once the script runs out.
#[derive(Default)]
pub(crate) struct ScriptedConnector {
    script: Mutex<VecDeque<Script>>,
    tokens: Mutex<Vec<String>>,
}

impl ScriptedConnector {
    pub fn new(script: Vec<Script>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            tokens: Mutex::new(Vec::new()),
        }
    }

    pub fn opens(&self) -> usize {
        self.tokens.lock().unwrap().len()
    }

    pub fn tokens(&self) -> Vec<String> {
        self.tokens.lock().unwrap().clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn open(&self, token: &str) -> Result<FrameStream, ClientError> {
        self.tokens.lock().unwrap().push(token.to_string());
        let next = self.script.lock().unwrap().pop_front().unwrap_or(Script::Fail);
        match next {
            Script::Fail => Err(ClientError::Network("connection refused".into())),
            Script::Frames(frames) => Ok(futures::stream::iter(frames.into_iter().map(Ok)).boxed()),
            Script::Hold(frames) => Ok(futures::stream::iter(frames.into_iter().map(Ok))
                .chain(futures::stream::pending())
                .boxed()),
        }
    }
}

/// One HTTP request as seen by [`ReplayServer`].
#[derive(Debug, Clone)]
pub(crate) struct Exchange {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: String,
}

/// Loopback HTTP/1.1 server answering each connection with the next scripted
/// `(status, json body)` and recording what it received.
pub(crate) struct ReplayServer {
    pub base_url: String,
    seen: Arc<Mutex<Vec<Exchange>>>,
}

impl ReplayServer {
    pub async fn start(replies: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&seen);
        tokio::spawn(async move {
            for (status, body) in replies {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let mut reader = BufReader::new(stream);

                let mut request_line = String::new();
                reader.read_line(&mut request_line).await.unwrap();
                let mut parts = request_line.split_whitespace();
                let method = parts.next().unwrap_or_default().to_string();
                let path = parts.next().unwrap_or_default().to_string();

                let mut authorization = None;
                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).await.unwrap();
                    let line = line.trim_end();
                    if line.is_empty() {
                        break;
                    }
                    if let Some((name, value)) = line.split_once(':') {
                        match name.trim().to_ascii_lowercase().as_str() {
                            "authorization" => authorization = Some(value.trim().to_string()),
                            "content-length" => content_length = value.trim().parse().unwrap(),
                            _ => {}
                        }
                    }
                }
                let mut raw = vec![0; content_length];
                reader.read_exact(&mut raw).await.unwrap();

                log.lock().unwrap().push(Exchange {
                    method,
                    path,
                    authorization,
                    body: String::from_utf8(raw).unwrap(),
                });

                let reply = format!(
                    "HTTP/1.1 {status} Reply\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let mut stream = reader.into_inner();
                stream.write_all(reply.as_bytes()).await.unwrap();
                let _ = stream.shutdown().await;
            }
        });

        Self { base_url, seen }
    }

    pub fn requests(&self) -> Vec<Exchange> {
        self.seen.lock().unwrap().clone()
    }
}

/// reqwest client that ignores proxy env vars so loopback calls stay local.
pub(crate) fn local_http() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
