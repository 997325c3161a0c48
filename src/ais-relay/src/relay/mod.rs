use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use axum::{
    Router,
    extract::{
        Query, State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, instrument, warn};

use crate::settings::RelaySettings;
use session::{Command, Registry, RelayConfig, Session, SessionHandle};

mod session;
mod upstream;

pub use upstream::Frame;

/// Websocket relay between downstream clients and the upstream AIS feed.
///
/// Every client gets a session that owns its upstream sockets. A resubscription opens a
/// new upstream socket and the previous one is only closed once the new one is open, so
/// the client never observes a gap. When a client goes away its session lingers for a
/// grace period, a client reconnecting with the same session key in that window takes
/// the session over.
#[derive(Debug, Clone)]
pub struct Relay {
    config: Arc<RelayConfig>,
    sessions: Registry,
    ids: Arc<AtomicU64>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    /// Resumption key. Clients without one get a session nobody else can attach to.
    pub session: Option<String>,
}

impl Relay {
    pub fn new(settings: &RelaySettings) -> Self {
        Self {
            config: Arc::new(RelayConfig {
                upstream_url: settings.upstream_url.clone(),
                api_key: settings.api_key.clone(),
                grace_period: settings.grace_period,
            }),
            sessions: Registry::default(),
            ids: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/", get(connect))
            .with_state(self.clone())
    }

    /// Number of keyed sessions that can currently be resumed.
    pub async fn resumable_sessions(&self) -> usize {
        self.sessions
            .lock()
            .await
            .values()
            .filter(|s| !s.is_closed())
            .count()
    }

    async fn serve(self, socket: WebSocket, key: Option<String>) {
        let connection = self.ids.fetch_add(1, Ordering::Relaxed);
        info!(connection, session = ?key, "client connected");

        let (mut sink, mut source) = socket.split();
        let (downstream, mut frames) = mpsc::unbounded_channel();
        let session = self.attach(key, connection, downstream).await;

        let writer = tokio::spawn(async move {
            while let Some(frame) = frames.recv().await {
                let message = match frame {
                    Frame::Text(text) => Message::Text(text.into()),
                    Frame::Binary(bytes) => Message::Binary(bytes),
                };
                if sink.send(message).await.is_err() {
                    break;
                }
            }
        });

        while let Some(message) = source.next().await {
            match message {
                Ok(Message::Text(text)) => {
                    session.send(Command::Subscribe(text.as_str().to_owned()))
                }
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => session.send(Command::Subscribe(text)),
                    Err(e) => warn!(connection, "dropping non utf-8 subscription: {e}"),
                },
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!(connection, "downstream error: {e:?}");
                    break;
                }
            }
        }

        info!(connection, "client disconnected");
        session.send(Command::Detach { connection });
        writer.abort();
    }

    /// Attaches a connection to its session, creating the session when needed. Keyed
    /// sessions are looked up and attached under the registry lock, so a session whose
    /// grace period runs out concurrently either sees the attach or is already gone.
    async fn attach(
        &self,
        key: Option<String>,
        connection: u64,
        downstream: UnboundedSender<Frame>,
    ) -> SessionHandle {
        let attach = Command::Attach {
            connection,
            downstream,
        };

        let Some(key) = key else {
            let handle = self.spawn_session(None);
            handle.send(attach);
            return handle;
        };

        let mut sessions = self.sessions.lock().await;
        let handle = match sessions.get(&key) {
            Some(existing) if !existing.is_closed() => {
                debug!(connection, session = %key, "resuming session");
                existing.clone()
            }
            _ => {
                let handle = self.spawn_session(Some(key.clone()));
                sessions.insert(key, handle.clone());
                handle
            }
        };
        handle.send(attach);
        handle
    }

    fn spawn_session(&self, key: Option<String>) -> SessionHandle {
        Session::spawn(
            self.ids.fetch_add(1, Ordering::Relaxed),
            key,
            self.config.clone(),
            self.sessions.clone(),
        )
    }
}

#[instrument(skip_all)]
async fn connect(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(relay): State<Relay>,
) -> Response {
    ws.on_upgrade(move |socket| relay.serve(socket, params.session))
}
