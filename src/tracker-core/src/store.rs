use std::sync::Arc;

use rand::{SeedableRng, rngs::StdRng};
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    DemoCache, LatLng, Region, RegionId, UpdateOptions, VesselDefaults, VesselId, VesselMap,
    VesselRecord, VesselUpdate,
};

pub type SharedStore = Arc<RwLock<VesselStore>>;

/// Feed connectivity as observed by the writer of live positions.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Connectivity {
    /// The feed socket is open.
    pub connected: bool,
    /// At least one position report was applied since the socket opened.
    pub streaming: bool,
}

/// Authoritative in-memory vessel state for the active region.
///
/// Every mutation replaces whole records. The vessel map itself is copy-on-write, so a
/// snapshot handed out earlier is never observed changing.
#[derive(Debug)]
pub struct VesselStore {
    vessels: Arc<VesselMap>,
    selected: Option<VesselId>,
    region: Region,
    fleet: Vec<VesselId>,
    fleet_only: bool,
    marina_mode: bool,
    search_query: String,
    map_center_override: Option<LatLng>,
    connectivity: Connectivity,
    defaults: VesselDefaults,
    rng: StdRng,
    demo: DemoCache,
}

impl VesselStore {
    pub fn new(region: RegionId) -> Self {
        Self::with_rng(region, StdRng::from_os_rng())
    }

    /// A store whose synthetic fleets are reproducible.
    pub fn seeded(region: RegionId, seed: u64) -> Self {
        Self::with_rng(region, StdRng::seed_from_u64(seed))
    }

    fn with_rng(region: RegionId, mut rng: StdRng) -> Self {
        let demo = DemoCache::new(region, &mut rng);
        Self {
            vessels: Arc::default(),
            selected: None,
            region: region.region(),
            fleet: Vec::new(),
            fleet_only: false,
            marina_mode: false,
            search_query: String::new(),
            map_center_override: None,
            connectivity: Connectivity::default(),
            defaults: VesselDefaults::default(),
            rng,
            demo,
        }
    }

    pub fn with_defaults(mut self, defaults: VesselDefaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Upserts a vessel. Unknown ids get a complete record built from the defaults table.
    pub fn update(
        &mut self,
        id: impl Into<VesselId>,
        update: VesselUpdate,
        options: UpdateOptions,
    ) {
        let id = id.into();
        let vessels = Arc::make_mut(&mut self.vessels);

        let next = match vessels.get(&id) {
            Some(existing) => existing.merged(update, options),
            None => VesselRecord::from_update(id.clone(), update, &self.defaults),
        };
        vessels.insert(id, next);
    }

    /// Selecting an id that has not been seen yet is allowed.
    pub fn select(&mut self, id: Option<VesselId>) {
        self.selected = id;
    }

    /// Hard reset: live vessels are dropped and a new synthetic fleet is generated.
    pub fn set_region(&mut self, region: RegionId) {
        debug!(from = %self.region.id, to = %region, "switching region");
        self.region = region.region();
        self.vessels = Arc::default();
        self.demo = DemoCache::new(region, &mut self.rng);
    }

    pub fn add_to_fleet(&mut self, id: impl Into<VesselId>) {
        let id = id.into();
        if !self.fleet.contains(&id) {
            self.fleet.push(id);
        }
    }

    pub fn remove_from_fleet(&mut self, id: &VesselId) {
        self.fleet.retain(|v| v != id);
    }

    /// Removes exactly one alert, no-op when the vessel or the alert is unknown.
    pub fn ack_alert(&mut self, id: &VesselId, alert_id: &str) {
        let Some(existing) = self.vessels.get(id) else {
            return;
        };
        if !existing.alerts().iter().any(|a| a.id == alert_id) {
            return;
        }

        let mut next = existing.clone();
        next.remove_alert(alert_id);
        Arc::make_mut(&mut self.vessels).insert(id.clone(), next);
    }

    pub fn set_fleet_mode(&mut self, active: bool) {
        self.fleet_only = active;
    }

    pub fn set_marina_mode(&mut self, active: bool) {
        self.marina_mode = active;
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    pub fn set_map_center_override(&mut self, lat: f64, lng: f64) {
        self.map_center_override = Some(LatLng::new(lat, lng));
    }

    pub fn clear_map_center_override(&mut self) {
        self.map_center_override = None;
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connectivity.connected = connected;
        if !connected {
            self.connectivity.streaming = false;
        }
    }

    pub fn set_streaming(&mut self, streaming: bool) {
        self.connectivity.streaming = streaming;
    }

    /// Drops every live vessel, keeping region and selection.
    pub fn clear_vessels(&mut self) {
        self.vessels = Arc::default();
    }

    /// Copies the synthetic fleet into the live map when nothing live is known.
    ///
    /// Returns whether the live map was seeded.
    pub fn seed_synthetic(&mut self) -> bool {
        if !self.vessels.is_empty() {
            return false;
        }
        self.vessels = self.demo.vessels().clone();
        true
    }

    /// The live vessel map, or the cached synthetic fleet of the current region when the
    /// live map is empty. Repeated reads without an intervening write return the same `Arc`.
    pub fn snapshot(&self) -> Arc<VesselMap> {
        if self.vessels.is_empty() {
            self.demo.vessels().clone()
        } else {
            self.vessels.clone()
        }
    }

    /// Only feed or simulation populated vessels, never the synthetic fallback.
    pub fn live_vessels(&self) -> &VesselMap {
        &self.vessels
    }

    pub fn vessel(&self, id: &VesselId) -> Option<&VesselRecord> {
        self.vessels.get(id)
    }

    pub fn selected(&self) -> Option<&VesselId> {
        self.selected.as_ref()
    }

    pub fn region(&self) -> &Region {
        &self.region
    }

    pub fn fleet(&self) -> &[VesselId] {
        &self.fleet
    }

    pub fn fleet_only(&self) -> bool {
        self.fleet_only
    }

    pub fn marina_mode(&self) -> bool {
        self.marina_mode
    }

    pub fn search_query(&self) -> &str {
        &self.search_query
    }

    /// Where consumers should center the map: the override if set, else the region center.
    pub fn map_center(&self) -> LatLng {
        self.map_center_override.unwrap_or(self.region.center)
    }

    pub fn map_center_override(&self) -> Option<LatLng> {
        self.map_center_override
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    pub fn into_shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }
}
