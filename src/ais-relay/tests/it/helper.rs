use std::{
    collections::VecDeque,
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};

use ais_relay::{
    relay::Relay,
    settings::{Settings, UpstreamUrl},
};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::{
    net::{TcpListener, TcpStream},
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, accept_async, connect_async, tungstenite::Message,
};
use tracker_core::{SharedStore, VesselStore};

static TIMEOUT: Duration = Duration::from_secs(5);

pub static TEST_API_KEY: &str = "test-key";

#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    Subscribed { connection: usize, payload: Value },
    Closed { connection: usize },
}

/// Stands in for the AIS feed, and for the relay when testing the feed client. Connections
/// are numbered in accept order.
pub struct FakeUpstream {
    port: u16,
    events: UnboundedReceiver<UpstreamEvent>,
    connections: Arc<Mutex<Vec<UnboundedSender<Message>>>>,
    delays: Arc<Mutex<VecDeque<Duration>>>,
}

pub struct Client {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

pub struct TestHelper {
    pub upstream: FakeUpstream,
    pub relay: Relay,
    relay_port: u16,
}

impl FakeUpstream {
    async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let (events_tx, events) = mpsc::unbounded_channel();
        let connections: Arc<Mutex<Vec<UnboundedSender<Message>>>> = Arc::default();
        let delays: Arc<Mutex<VecDeque<Duration>>> = Arc::default();

        let accepted = connections.clone();
        let handshake_delays = delays.clone();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let (outbound_tx, outbound) = mpsc::unbounded_channel();
                let connection = {
                    let mut accepted = accepted.lock().unwrap();
                    accepted.push(outbound_tx);
                    accepted.len() - 1
                };
                let delay = handshake_delays
                    .lock()
                    .unwrap()
                    .pop_front()
                    .unwrap_or_default();
                tokio::spawn(serve_connection(
                    connection,
                    stream,
                    delay,
                    outbound,
                    events_tx.clone(),
                ));
            }
        });

        Self {
            port,
            events,
            connections,
            delays,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://127.0.0.1:{}/", self.port)
    }

    /// Delays the websocket handshake of the next accepted connections, in order.
    pub fn delay_next(&self, delays: &[Duration]) {
        self.delays.lock().unwrap().extend(delays);
    }

    pub async fn next_event(&mut self) -> UpstreamEvent {
        tokio::time::timeout(TIMEOUT, self.events.recv())
            .await
            .unwrap()
            .unwrap()
    }

    pub async fn assert_no_event(&mut self, within: Duration) {
        if let Ok(event) = tokio::time::timeout(within, self.events.recv()).await {
            panic!("unexpected upstream event: {event:?}");
        }
    }

    pub fn send_text(&self, connection: usize, text: &str) {
        self.send(connection, Message::Text(text.to_owned().into()));
    }

    pub fn send_binary(&self, connection: usize, bytes: Vec<u8>) {
        self.send(connection, Message::Binary(bytes.into()));
    }

    pub fn close(&self, connection: usize) {
        self.send(connection, Message::Close(None));
    }

    fn send(&self, connection: usize, message: Message) {
        self.connections.lock().unwrap()[connection]
            .send(message)
            .unwrap();
    }
}

async fn serve_connection(
    connection: usize,
    stream: TcpStream,
    delay: Duration,
    mut outbound: UnboundedReceiver<Message>,
    events: UnboundedSender<UpstreamEvent>,
) {
    tokio::time::sleep(delay).await;

    if let Ok(socket) = accept_async(stream).await {
        let (mut sink, mut source) = socket.split();
        loop {
            tokio::select! {
                message = source.next() => match message {
                    Some(Ok(Message::Text(text))) => {
                        let payload = serde_json::from_str(text.as_str()).unwrap();
                        let _ = events.send(UpstreamEvent::Subscribed { connection, payload });
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
                Some(message) = outbound.recv() => {
                    if sink.send(message).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    let _ = events.send(UpstreamEvent::Closed { connection });
}

impl Client {
    pub async fn send_text(&mut self, text: &str) {
        self.socket
            .send(Message::Text(text.to_owned().into()))
            .await
            .unwrap();
    }

    /// The next text or binary frame.
    pub async fn next_message(&mut self) -> Message {
        loop {
            let message = tokio::time::timeout(TIMEOUT, self.socket.next())
                .await
                .unwrap()
                .unwrap()
                .unwrap();
            if matches!(message, Message::Text(_) | Message::Binary(_)) {
                return message;
            }
        }
    }

    pub async fn close(mut self) {
        self.socket.close(None).await.unwrap();
    }
}

impl TestHelper {
    pub async fn connect(&self, session: Option<&str>) -> Client {
        let url = match session {
            Some(key) => format!("ws://127.0.0.1:{}/?session={key}", self.relay_port),
            None => format!("ws://127.0.0.1:{}/", self.relay_port),
        };
        let (socket, _) = connect_async(url).await.unwrap();
        Client { socket }
    }

    /// App settings pointing at the fake upstream.
    pub fn settings(&self) -> Settings {
        Settings::test_new(
            UpstreamUrl::test_new(self.upstream.url()),
            Some(TEST_API_KEY.into()),
        )
    }

    pub fn store(&self) -> SharedStore {
        VesselStore::seeded(self.settings().tracker.region, 1).into_shared()
    }
}

pub fn position_report(mmsi: u64, ship_name: &str, lat: f64, lng: f64) -> String {
    serde_json::json!({
        "MessageType": "PositionReport",
        "MetaData": { "MMSI": mmsi, "ShipName": ship_name },
        "Message": {
            "PositionReport": {
                "Latitude": lat,
                "Longitude": lng,
                "Sog": 8.5,
                "Cog": 120.0,
                "TrueHeading": 118,
            }
        }
    })
    .to_string()
}

pub async fn wait_until<F>(store: &SharedStore, condition: F)
where
    F: Fn(&VesselStore) -> bool,
{
    tokio::time::timeout(TIMEOUT, async {
        while !condition(&*store.read().await) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

pub async fn test<T, Fut>(test_closure: T)
where
    T: FnOnce(TestHelper) -> Fut,
    Fut: Future<Output = ()>,
{
    run(Some(TEST_API_KEY), test_closure).await;
}

pub async fn test_without_api_key<T, Fut>(test_closure: T)
where
    T: FnOnce(TestHelper) -> Fut,
    Fut: Future<Output = ()>,
{
    run(None, test_closure).await;
}

async fn run<T, Fut>(api_key: Option<&str>, test_closure: T)
where
    T: FnOnce(TestHelper) -> Fut,
    Fut: Future<Output = ()>,
{
    let upstream = FakeUpstream::start().await;

    let settings = Settings::test_new(
        UpstreamUrl::test_new(upstream.url()),
        api_key.map(ToString::to_string),
    );
    let relay = Relay::new(&settings.relay);

    let listener = TcpListener::bind(settings.relay.listener_address())
        .await
        .unwrap();
    let relay_port = listener.local_addr().unwrap().port();

    let router = relay.router();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });

    test_closure(TestHelper {
        upstream,
        relay,
        relay_port,
    })
    .await;
}
