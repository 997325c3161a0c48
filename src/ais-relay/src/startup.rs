use std::{
    net::{Ipv4Addr, SocketAddr},
    time::Duration,
};

use processors::{RiskEngine, RiskProcessor, SimulationProcessor, Simulator};
use snafu::ResultExt;
use tokio::{net::TcpListener, signal, task::JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracker_core::{SharedStore, VesselStore, validate_regions};

use crate::{
    error::{
        Error, Result,
        error::{BindSnafu, RegionSnafu, ServeSnafu, ShutdownTimeoutSnafu},
    },
    feed::FeedClient,
    relay::Relay,
    settings::{Settings, TrackerSettings},
};

pub struct App {
    listener: TcpListener,
    port: u16,
    relay: Relay,
    store: SharedStore,
    tracker: TrackerSettings,
    feed_url: String,
    shutdown_timeout: Duration,
    cancellation: CancellationToken,
}

impl App {
    pub async fn build(settings: &Settings) -> Result<Self> {
        validate_regions().context(RegionSnafu)?;

        info!(
            environment = ?settings.environment,
            upstream = %settings.relay.upstream_url,
            api_key = %settings.relay.api_key_summary(),
            "starting ais relay"
        );

        let address = settings.relay.listener_address();
        let listener = TcpListener::bind(&address)
            .await
            .context(BindSnafu { address: &address })?;
        let local = listener
            .local_addr()
            .context(BindSnafu { address: &address })?;
        info!("listening on {local}");

        let feed_address = if local.ip().is_unspecified() {
            SocketAddr::from((Ipv4Addr::LOCALHOST, local.port()))
        } else {
            local
        };

        let tracker = settings.tracker.clone();
        let store = match tracker.simulation_seed {
            Some(seed) => VesselStore::seeded(tracker.region, seed),
            None => VesselStore::new(tracker.region),
        };

        Ok(Self {
            listener,
            port: local.port(),
            relay: Relay::new(&settings.relay),
            store: store.into_shared(),
            tracker,
            feed_url: format!("ws://{feed_address}/"),
            shutdown_timeout: settings.relay.shutdown_timeout,
            cancellation: CancellationToken::new(),
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn relay(&self) -> Relay {
        self.relay.clone()
    }

    /// Cancelling this token starts a graceful shutdown.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Runs until a shutdown signal arrives. Exits the process when shutdown does not
    /// finish within the configured timeout.
    pub async fn run(self) -> Result<()> {
        let cancellation = self.cancellation.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            cancellation.cancel();
        });

        match self.run_until_cancelled().await {
            Err(e @ Error::ShutdownTimeout { .. }) => {
                error!("{e}, forcing exit");
                std::process::exit(1);
            }
            result => result,
        }
    }

    pub async fn run_until_cancelled(self) -> Result<()> {
        let Self {
            listener,
            port: _,
            relay,
            store,
            tracker,
            feed_url,
            shutdown_timeout,
            cancellation,
        } = self;

        let mut set = JoinSet::new();

        let shutdown = cancellation.clone();
        set.spawn(async move {
            axum::serve(listener, relay.router())
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
                .context(ServeSnafu)
        });

        let risk = RiskProcessor::new(
            store.clone(),
            RiskEngine::new(tracker.risk_thresholds.unwrap_or_default()),
            tracker.risk_interval,
        );
        let token = cancellation.clone();
        set.spawn(async move {
            risk.run_continuous(token).await;
            Ok(())
        });

        if tracker.simulation {
            let simulator = match tracker.simulation_seed {
                Some(seed) => Simulator::seeded(seed),
                None => Simulator::new(),
            };
            let simulation =
                SimulationProcessor::new(store.clone(), simulator, tracker.simulation_interval);
            let token = cancellation.clone();
            set.spawn(async move {
                simulation.run_continuous(token).await;
                Ok(())
            });
        }

        if tracker.feed {
            let bounds = store.read().await.region().bounding_box();
            let feed = FeedClient::new(feed_url, store.clone());
            let token = cancellation.clone();
            set.spawn(async move {
                feed.run_continuous(bounds, token).await;
                Ok(())
            });
        }

        let mut outcome = Ok(());
        tokio::select! {
            _ = cancellation.cancelled() => {}
            Some(result) = set.join_next() => {
                error!("task exited before shutdown was requested");
                outcome = flatten(result);
                cancellation.cancel();
            }
        }

        info!(timeout = ?shutdown_timeout, "shutting down");
        let drain = async {
            while let Some(result) = set.join_next().await {
                if let Err(e) = flatten(result) {
                    error!("task failed during shutdown: {e:?}");
                }
            }
        };

        match tokio::time::timeout(shutdown_timeout, drain).await {
            Ok(()) => outcome,
            Err(_) => ShutdownTimeoutSnafu {
                timeout: shutdown_timeout,
            }
            .fail(),
        }
    }
}

fn flatten(result: std::result::Result<Result<()>, tokio::task::JoinError>) -> Result<()> {
    match result {
        Ok(result) => result,
        Err(e) => {
            error!("task panicked: {e:?}");
            Ok(())
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to listen for ctrl-c: {e:?}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(e) => {
                error!("failed to listen for SIGTERM: {e:?}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received ctrl-c"),
        _ = terminate => info!("received SIGTERM"),
    }
}
