use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};
use tracker_core::{
    Alert, RiskThresholds, SharedStore, UpdateOptions, VesselId, VesselStore, VesselUpdate, cpa,
    to_plane, velocity_from_course_speed,
};

static DERIVED_WRITE: UpdateOptions = UpdateOptions {
    skip_path_record: true,
};

/// What a single pass changed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RiskPass {
    pub assessed: usize,
    pub alerts_raised: usize,
}

/// Computes the derived `in_restricted_zone`, `risk` and geofencing alert fields.
///
/// This is the only writer of those fields.
#[derive(Debug, Default, Clone)]
pub struct RiskEngine {
    thresholds: RiskThresholds,
}

impl RiskEngine {
    pub fn new(thresholds: RiskThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &RiskThresholds {
        &self.thresholds
    }

    pub fn run_single(&self, store: &mut VesselStore) -> RiskPass {
        self.run_single_at(store, Utc::now())
    }

    pub fn run_single_at(&self, store: &mut VesselStore, now: DateTime<Utc>) -> RiskPass {
        self.mark_restricted_zone(store);
        self.assess_selected(store, now)
    }

    /// Runs for every vessel regardless of selection.
    fn mark_restricted_zone(&self, store: &mut VesselStore) {
        let region = store.region();
        let changes: Vec<(VesselId, bool)> = store
            .live_vessels()
            .values()
            .filter_map(|v| {
                let inside = region.in_restricted_zone(v.position);
                (v.in_restricted_zone != Some(inside)).then(|| (v.id.clone(), inside))
            })
            .collect();

        for (id, inside) in changes {
            store.update(
                id,
                VesselUpdate {
                    in_restricted_zone: Some(inside),
                    ..Default::default()
                },
                DERIVED_WRITE,
            );
        }
    }

    /// Writes the risk relative to the selected vessel onto every other vessel, and raises
    /// a geofencing alert on those of them inside the restricted zone.
    fn assess_selected(&self, store: &mut VesselStore, now: DateTime<Utc>) -> RiskPass {
        let Some(own) = store.selected().and_then(|id| store.vessel(id)) else {
            return RiskPass::default();
        };

        let region = store.region();
        let ref_lat = own.position.lat;
        let own_position = to_plane(own.position.lat, own.position.lng, ref_lat);
        let own_velocity = velocity_from_course_speed(own.heading, own.speed);

        let mut pass = RiskPass::default();
        let changes: Vec<(VesselId, VesselUpdate)> = store
            .live_vessels()
            .values()
            .filter(|v| v.id != own.id)
            .filter_map(|v| {
                pass.assessed += 1;

                let position = to_plane(v.position.lat, v.position.lng, ref_lat);
                let velocity = velocity_from_course_speed(v.heading, v.speed);
                let risk = self
                    .thresholds
                    .assess(cpa(own_position, own_velocity, position, velocity));
                let alert = (region.in_restricted_zone(v.position) && !v.has_geofence_alert())
                    .then(|| Alert::geofence(now));

                if v.risk == Some(risk) && alert.is_none() {
                    return None;
                }
                Some((
                    v.id.clone(),
                    VesselUpdate {
                        risk: Some(risk),
                        alert,
                        ..Default::default()
                    },
                ))
            })
            .collect();

        for (id, update) in changes {
            if update.alert.is_some() {
                info!(vessel = %id, "vessel entered restricted zone");
                pass.alerts_raised += 1;
            }
            store.update(id, update, DERIVED_WRITE);
        }
        pass
    }
}

/// Runs the [RiskEngine] against a shared store on a fixed interval.
#[derive(Debug, Clone)]
pub struct RiskProcessor {
    store: SharedStore,
    engine: RiskEngine,
    interval: Duration,
}

impl RiskProcessor {
    pub fn new(store: SharedStore, engine: RiskEngine, interval: Duration) -> Self {
        Self {
            store,
            engine,
            interval,
        }
    }

    pub async fn run_continuous(self, cancellation: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = cancellation.cancelled() => break,
                _ = interval.tick() => self.run_cycle().await,
            }
        }
        debug!("risk processor stopped");
    }

    #[instrument(skip_all)]
    async fn run_cycle(&self) {
        let mut store = self.store.write().await;
        let pass = self.engine.run_single(&mut store);
        debug!(
            assessed = pass.assessed,
            alerts_raised = pass.alerts_raised,
            "risk pass done"
        );
    }

    pub async fn run_single(&self) -> RiskPass {
        let mut store = self.store.write().await;
        self.engine.run_single(&mut store)
    }
}
