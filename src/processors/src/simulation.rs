use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use tracker_core::{
    HistorySample, LatLng, SharedStore, UpdateOptions, VesselId, VesselRecord, VesselStore,
    VesselUpdate,
};

/// Degrees moved per knot of speed on each tick.
pub static STEP_DEGREES_PER_KNOT: f64 = 0.000_005;
/// Fuel percentage burned per knot on each tick.
pub static FUEL_BURN_PER_KNOT: f64 = 0.01 / 20.;
/// Probability that a tick appends a history sample.
pub static HISTORY_SAMPLE_PROBABILITY: f64 = 0.2;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimulationTick {
    pub seeded: bool,
    pub moved: usize,
    pub bounced: usize,
}

/// Advances the synthetic fleet. Vessels without the synthetic id prefix are never touched.
#[derive(Debug)]
pub struct Simulator {
    rng: StdRng,
}

impl Default for Simulator {
    fn default() -> Self {
        Self::new()
    }
}

impl Simulator {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn run_single(&mut self, store: &mut VesselStore) -> SimulationTick {
        self.run_single_at(store, Utc::now())
    }

    pub fn run_single_at(
        &mut self,
        store: &mut VesselStore,
        now: DateTime<Utc>,
    ) -> SimulationTick {
        let mut tick = SimulationTick::default();

        if !store.connectivity().connected {
            tick.seeded = store.seed_synthetic();
            if tick.seeded {
                info!(region = %store.region().id, "seeded synthetic fleet");
            }
        }

        let region = store.region();
        let updates: Vec<(VesselId, VesselUpdate, bool)> = store
            .live_vessels()
            .values()
            .filter(|v| v.id.is_synthetic())
            .map(|v| {
                let next = next_position(v);
                if region.in_sea(next) {
                    (v.id.clone(), self.advance(v, next, now), true)
                } else {
                    (v.id.clone(), reverse(v), false)
                }
            })
            .collect();

        for (id, update, moved) in updates {
            if moved {
                tick.moved += 1;
                store.update(id, update, UpdateOptions::default());
            } else {
                tick.bounced += 1;
                store.update(
                    id,
                    update,
                    UpdateOptions {
                        skip_path_record: true,
                    },
                );
            }
        }

        tick
    }

    fn advance(
        &mut self,
        vessel: &VesselRecord,
        next: LatLng,
        now: DateTime<Utc>,
    ) -> VesselUpdate {
        let fuel = (vessel.fuel - vessel.speed * FUEL_BURN_PER_KNOT).max(0.);

        let history_sample = self
            .rng
            .random_bool(HISTORY_SAMPLE_PROBABILITY)
            .then(|| HistorySample {
                timestamp: now,
                fuel,
                efficiency: 0.8 + self.rng.random_range(-0.1..0.1),
            });

        VesselUpdate {
            position: Some(next),
            fuel: Some(fuel),
            history_sample,
            ..Default::default()
        }
    }
}

/// Dead reckoning on the compass: heading 0 is north, 90 is east.
fn next_position(vessel: &VesselRecord) -> LatLng {
    let distance = vessel.speed * STEP_DEGREES_PER_KNOT;
    let heading = vessel.heading.to_radians();
    LatLng::new(
        vessel.position.lat + heading.cos() * distance,
        vessel.position.lng + heading.sin() * distance,
    )
}

fn reverse(vessel: &VesselRecord) -> VesselUpdate {
    VesselUpdate {
        heading: Some((vessel.heading + 180.) % 360.),
        ..Default::default()
    }
}

/// Runs the [Simulator] against a shared store on a fixed interval.
#[derive(Debug)]
pub struct SimulationProcessor {
    store: SharedStore,
    simulator: Simulator,
    interval: Duration,
}

impl SimulationProcessor {
    pub fn new(store: SharedStore, simulator: Simulator, interval: Duration) -> Self {
        Self {
            store,
            simulator,
            interval,
        }
    }

    pub async fn run_continuous(mut self, cancellation: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = interval.tick() => self.run_cycle().await,
            }
        }
        debug!("simulation processor stopped");
    }

    #[instrument(skip_all)]
    async fn run_cycle(&mut self) {
        let mut store = self.store.write().await;
        let tick = self.simulator.run_single(&mut store);
        debug!(
            moved = tick.moved,
            bounced = tick.bounced,
            "simulation tick done"
        );
    }

    pub async fn run_single(&mut self) -> SimulationTick {
        let mut store = self.store.write().await;
        self.simulator.run_single(&mut store)
    }
}
