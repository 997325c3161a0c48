use futures_util::{SinkExt, StreamExt};
use snafu::ResultExt;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use tracker_core::{SharedStore, UpdateOptions};

use crate::{
    error::{
        Result,
        error::{ConnectSnafu, JsonSnafu, TransportSnafu},
    },
    models::{AisStreamMessage, BoundingBox, ClientSubscription},
};

/// Writes the live feed into the vessel store.
///
/// Connects to the relay, subscribes with the bounding box of the active region and
/// applies every position report it receives. There is no reconnect, once the socket
/// closes the store is marked disconnected and the simulation takes over.
#[derive(Debug)]
pub struct FeedClient {
    url: String,
    store: SharedStore,
    active: Option<CancellationToken>,
}

impl FeedClient {
    pub fn new(url: impl Into<String>, store: SharedStore) -> Self {
        Self {
            url: url.into(),
            store,
            active: None,
        }
    }

    /// Stops the running stream, if any, and starts a new one for `bounds`.
    pub fn start(&mut self, bounds: BoundingBox) {
        if let Some(previous) = self.active.take() {
            previous.cancel();
        }

        let cancellation = CancellationToken::new();
        tokio::spawn(stream(
            self.url.clone(),
            bounds,
            self.store.clone(),
            cancellation.clone(),
        ));
        self.active = Some(cancellation);
    }

    /// A stream that is still connecting is closed as soon as its socket opens.
    pub async fn stop(&mut self) {
        if let Some(active) = self.active.take() {
            active.cancel();
        }
        self.store.write().await.set_connected(false);
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub async fn run_continuous(mut self, bounds: BoundingBox, cancellation: CancellationToken) {
        self.start(bounds);
        cancellation.cancelled().await;
        self.stop().await;
        debug!("feed client stopped");
    }
}

#[instrument(skip_all, fields(url = %url))]
async fn stream(
    url: String,
    bounds: BoundingBox,
    store: SharedStore,
    cancellation: CancellationToken,
) {
    if let Err(e) = run(&url, bounds, &store, &cancellation).await {
        warn!("feed stream failed: {e:?}");
    }

    let mut store = store.write().await;
    if !cancellation.is_cancelled() {
        store.set_connected(false);
        info!("feed disconnected");
    }
}

async fn run(
    url: &str,
    bounds: BoundingBox,
    store: &SharedStore,
    cancellation: &CancellationToken,
) -> Result<()> {
    let (socket, _) = connect_async(url).await.context(ConnectSnafu { url })?;
    let (mut sink, mut source) = socket.split();

    {
        let mut store = store.write().await;
        if cancellation.is_cancelled() {
            drop(store);
            debug!("feed stopped while connecting");
            return sink.close().await.context(TransportSnafu);
        }
        store.set_connected(true);
        store.clear_vessels();
    }
    info!("feed connected");

    let subscription =
        serde_json::to_string(&ClientSubscription::new(bounds)).context(JsonSnafu)?;
    sink.send(Message::Text(subscription.into()))
        .await
        .context(TransportSnafu)?;

    loop {
        let message = tokio::select! {
            _ = cancellation.cancelled() => {
                return sink.close().await.context(TransportSnafu);
            }
            message = source.next() => message,
        };

        match message {
            Some(Ok(Message::Text(text))) => apply(store, cancellation, text.as_str()).await,
            Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                Ok(text) => apply(store, cancellation, text).await,
                Err(e) => warn!("dropping non utf-8 feed frame: {e}"),
            },
            Some(Ok(Message::Close(frame))) => {
                debug!(?frame, "feed closed by relay");
                return Ok(());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e).context(TransportSnafu),
            None => return Ok(()),
        }
    }
}

async fn apply(store: &SharedStore, cancellation: &CancellationToken, text: &str) {
    let (id, update) = match AisStreamMessage::parse_position_update(text) {
        Ok(Some(v)) => v,
        Ok(None) => return,
        Err(e) => {
            warn!("dropping malformed feed message: {e:?}");
            return;
        }
    };

    let mut store = store.write().await;
    if !cancellation.is_cancelled() {
        store.update(id, update, UpdateOptions::default());
        store.set_streaming(true);
    }
}
