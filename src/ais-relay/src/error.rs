use snafu::{Location, Snafu};
use tokio_tungstenite::tungstenite;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Snafu, Debug)]
#[snafu(module, visibility(pub))]
pub enum Error {
    #[snafu(display("Upstream url '{url}' does not use the wss:// scheme"))]
    InsecureUpstream {
        #[snafu(implicit)]
        location: Location,
        url: String,
    },
    #[snafu(display("Region catalog is invalid"))]
    Region {
        #[snafu(implicit)]
        location: Location,
        source: tracker_core::Error,
    },
    #[snafu(display("Failed to bind listener to '{address}'"))]
    Bind {
        #[snafu(implicit)]
        location: Location,
        address: String,
        source: std::io::Error,
    },
    #[snafu(display("Failed to serve downstream connections"))]
    Serve {
        #[snafu(implicit)]
        location: Location,
        source: std::io::Error,
    },
    #[snafu(display("Failed to connect to '{url}'"))]
    Connect {
        #[snafu(implicit)]
        location: Location,
        url: String,
        source: tungstenite::Error,
    },
    #[snafu(display("Websocket transport failed"))]
    Transport {
        #[snafu(implicit)]
        location: Location,
        source: tungstenite::Error,
    },
    #[snafu(display("Failed to (de)serialize a feed message"))]
    Json {
        #[snafu(implicit)]
        location: Location,
        source: serde_json::Error,
    },
    #[snafu(display("Shutdown did not complete within {timeout:?}"))]
    ShutdownTimeout {
        #[snafu(implicit)]
        location: Location,
        timeout: std::time::Duration,
    },
}
