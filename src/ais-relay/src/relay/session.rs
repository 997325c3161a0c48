use std::{
    collections::{BTreeMap, HashMap},
    pin::Pin,
    sync::Arc,
    time::Duration,
};

use tokio::{
    sync::{
        Mutex,
        mpsc::{self, UnboundedReceiver, UnboundedSender},
    },
    time::{Sleep, sleep},
};
use tracing::{Instrument, debug, error, info, info_span, trace, warn};

use super::upstream::{Frame, UpstreamEvent, UpstreamLink};
use crate::{
    models::{ClientSubscription, SubscriptionRequest},
    settings::UpstreamUrl,
};

/// Sessions that can be resumed by key.
pub(crate) type Registry = Arc<Mutex<HashMap<String, SessionHandle>>>;

#[derive(Debug)]
pub(crate) struct RelayConfig {
    pub upstream_url: UpstreamUrl,
    pub api_key: Option<String>,
    pub grace_period: Duration,
}

#[derive(Debug)]
pub(crate) enum Command {
    /// A raw subscription message from the attached client.
    Subscribe(String),
    Attach {
        connection: u64,
        downstream: UnboundedSender<Frame>,
    },
    Detach {
        connection: u64,
    },
}

#[derive(Debug, Clone)]
pub(crate) struct SessionHandle {
    id: u64,
    commands: UnboundedSender<Command>,
}

/// Upstream state of one downstream client. Owns every upstream socket opened on the
/// client's behalf and decides when each of them is closed.
#[derive(Debug)]
pub(crate) struct Session {
    id: u64,
    key: Option<String>,
    config: Arc<RelayConfig>,
    registry: Registry,
    downstream: Option<(u64, UnboundedSender<Frame>)>,
    links: BTreeMap<u64, UpstreamLink>,
    current: Option<u64>,
    next_generation: u64,
    events: UnboundedSender<UpstreamEvent>,
}

type Teardown = Option<Pin<Box<Sleep>>>;

impl SessionHandle {
    pub(crate) fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    pub(crate) fn send(&self, command: Command) {
        if self.commands.send(command).is_err() {
            debug!(session = self.id, "session already closed");
        }
    }
}

impl Session {
    pub(crate) fn spawn(
        id: u64,
        key: Option<String>,
        config: Arc<RelayConfig>,
        registry: Registry,
    ) -> SessionHandle {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (events, upstream_events) = mpsc::unbounded_channel();

        let span = info_span!("session", id, key = ?key);
        let session = Session {
            id,
            key,
            config,
            registry,
            downstream: None,
            links: BTreeMap::new(),
            current: None,
            next_generation: 0,
            events,
        };
        tokio::spawn(session.run(commands, upstream_events).instrument(span));

        SessionHandle {
            id,
            commands: commands_tx,
        }
    }

    async fn run(
        mut self,
        mut commands: UnboundedReceiver<Command>,
        mut upstream_events: UnboundedReceiver<UpstreamEvent>,
    ) {
        let mut teardown: Teardown = None;
        let mut commands_open = true;

        loop {
            tokio::select! {
                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle(command, &mut teardown),
                    None => commands_open = false,
                },
                Some(event) = upstream_events.recv() => self.on_upstream(event),
                _ = elapsed(&mut teardown) => {
                    teardown = None;
                    match self.retire(&mut commands).await {
                        Some(command) => {
                            debug!("session resumed as the grace period elapsed");
                            self.handle(command, &mut teardown);
                            if self.downstream.is_none() && teardown.is_none() {
                                teardown = Some(Box::pin(sleep(self.config.grace_period)));
                            }
                        }
                        None => break,
                    }
                }
            }

            if !commands_open && teardown.is_none() {
                break;
            }
        }

        info!(links = self.links.len(), "closing session");
        self.links.clear();
    }

    fn handle(&mut self, command: Command, teardown: &mut Teardown) {
        match command {
            Command::Subscribe(text) => {
                *teardown = None;
                self.subscribe(&text);
            }
            Command::Attach {
                connection,
                downstream,
            } => {
                *teardown = None;
                if let Some((previous, _)) = self.downstream.replace((connection, downstream)) {
                    debug!(previous, connection, "downstream replaced");
                }
            }
            Command::Detach { connection } => {
                if self
                    .downstream
                    .as_ref()
                    .is_some_and(|(current, _)| *current == connection)
                {
                    self.downstream = None;
                    *teardown = Some(Box::pin(sleep(self.config.grace_period)));
                    debug!(connection, grace_period = ?self.config.grace_period, "teardown scheduled");
                } else {
                    debug!(connection, "ignoring detach from superseded connection");
                }
            }
        }
    }

    fn subscribe(&mut self, text: &str) {
        let subscription: ClientSubscription = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                warn!("dropping malformed subscription: {e}");
                return;
            }
        };

        let Some(api_key) = self.config.api_key.as_deref() else {
            error!("upstream api key missing, dropping subscription");
            return;
        };

        let payload = match serde_json::to_string(&SubscriptionRequest::new(api_key, &subscription))
        {
            Ok(v) => v,
            Err(e) => {
                error!("failed to serialize upstream subscription: {e:?}");
                return;
            }
        };

        let generation = self.next_generation;
        self.next_generation += 1;

        info!(
            generation,
            bounding_boxes = subscription.bounding_boxes.len(),
            "opening upstream"
        );
        self.links.insert(
            generation,
            UpstreamLink::open(
                self.config.upstream_url.clone(),
                payload,
                generation,
                self.events.clone(),
            ),
        );
        self.current = Some(generation);
    }

    fn on_upstream(&mut self, event: UpstreamEvent) {
        match event {
            UpstreamEvent::Opened { generation } => {
                if self.current == Some(generation) {
                    let newer = self.links.split_off(&generation);
                    let retired = std::mem::replace(&mut self.links, newer);
                    if !retired.is_empty() {
                        debug!(generation, retired = retired.len(), "retiring previous upstream");
                    }
                } else {
                    debug!(generation, "closing superseded upstream");
                    self.links.remove(&generation);
                }
            }
            UpstreamEvent::Frame { generation, frame } => match &self.downstream {
                Some((_, downstream)) => {
                    let _ = downstream.send(frame);
                }
                None => trace!(generation, "no downstream attached, dropping frame"),
            },
            UpstreamEvent::Closed { generation } => {
                self.links.remove(&generation);
            }
        }
    }

    /// Removes a keyed session from the registry, unless a command raced the grace timer.
    async fn retire(&mut self, commands: &mut UnboundedReceiver<Command>) -> Option<Command> {
        let key = self.key.as_ref()?;
        let mut sessions = self.registry.lock().await;

        if let Ok(command) = commands.try_recv() {
            return Some(command);
        }
        if sessions.get(key).is_some_and(|h| h.id == self.id) {
            sessions.remove(key);
        }
        None
    }
}

async fn elapsed(teardown: &mut Teardown) {
    match teardown {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
