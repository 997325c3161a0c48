use axum::body::Bytes;
use futures_util::{SinkExt, StreamExt};
use snafu::ResultExt;
use tokio::sync::{mpsc::UnboundedSender, oneshot};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{Message, protocol::CloseFrame},
};
use tracing::{debug, info, warn};

use crate::{
    error::{
        Result,
        error::{ConnectSnafu, TransportSnafu},
    },
    settings::UpstreamUrl,
};

/// A frame received from the upstream feed, relayed verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Bytes),
}

#[derive(Debug)]
pub(crate) enum UpstreamEvent {
    /// The socket is open and the subscription payload has been sent on it.
    Opened { generation: u64 },
    Frame { generation: u64, frame: Frame },
    Closed { generation: u64 },
}

/// Owning side of one upstream socket. Dropping it closes the socket, also while it is
/// still connecting.
#[derive(Debug)]
pub(crate) struct UpstreamLink {
    _close: oneshot::Sender<()>,
}

impl UpstreamLink {
    pub(crate) fn open(
        url: UpstreamUrl,
        payload: String,
        generation: u64,
        events: UnboundedSender<UpstreamEvent>,
    ) -> Self {
        let (close, closed) = oneshot::channel();
        tokio::spawn(run(url, payload, generation, events, closed));
        Self { _close: close }
    }
}

async fn run(
    url: UpstreamUrl,
    payload: String,
    generation: u64,
    events: UnboundedSender<UpstreamEvent>,
    closed: oneshot::Receiver<()>,
) {
    let (code, reason) = match stream(&url, payload, generation, &events, closed).await {
        Ok(Some(frame)) => (Some(u16::from(frame.code)), frame.reason.to_string()),
        Ok(None) => (None, String::new()),
        Err(e) => {
            warn!(generation, "upstream error: {e:?}");
            (None, e.to_string())
        }
    };

    info!(generation, code = ?code, reason = %reason, "upstream closed");
    let _ = events.send(UpstreamEvent::Closed { generation });
}

async fn stream(
    url: &UpstreamUrl,
    payload: String,
    generation: u64,
    events: &UnboundedSender<UpstreamEvent>,
    mut closed: oneshot::Receiver<()>,
) -> Result<Option<CloseFrame>> {
    debug!(generation, %url, "connecting upstream");

    let socket = tokio::select! {
        _ = &mut closed => return Ok(None),
        socket = connect_async(url.as_str()) => {
            socket.context(ConnectSnafu { url: url.as_str() })?.0
        }
    };
    let (mut sink, mut source) = socket.split();

    sink.send(Message::Text(payload.into()))
        .await
        .context(TransportSnafu)?;
    let _ = events.send(UpstreamEvent::Opened { generation });

    loop {
        tokio::select! {
            _ = &mut closed => {
                sink.close().await.context(TransportSnafu)?;
                return Ok(None);
            }
            message = source.next() => {
                let frame = match message {
                    Some(Ok(Message::Text(text))) => Frame::Text(text.to_string()),
                    Some(Ok(Message::Binary(bytes))) => Frame::Binary(bytes),
                    Some(Ok(Message::Close(frame))) => return Ok(frame),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e).context(TransportSnafu),
                    None => return Ok(None),
                };
                let _ = events.send(UpstreamEvent::Frame { generation, frame });
            }
        }
    }
}
