use tracker_core::{RegionId, UpdateOptions, VesselId, VesselRecord, VesselStore, VesselUpdate};

pub static INSIDE_RESTRICTED_ZONE: (f64, f64) = (35.09, 129.02);

pub struct TestHelper {
    pub store: VesselStore,
}

impl TestHelper {
    pub fn new(region: RegionId) -> Self {
        Self {
            store: VesselStore::seeded(region, 1),
        }
    }

    pub fn busan() -> Self {
        Self::new(RegionId::Busan)
    }

    pub fn add_vessel(&mut self, id: &str, lat: f64, lng: f64, heading: f64, speed: f64) {
        self.store.update(
            id,
            VesselUpdate::test_kinematics(lat, lng, heading, speed),
            UpdateOptions::default(),
        );
    }

    pub fn move_vessel(&mut self, id: &str, lat: f64, lng: f64) {
        self.store.update(
            id,
            VesselUpdate::test_position(lat, lng),
            UpdateOptions::default(),
        );
    }

    pub fn vessel(&self, id: &str) -> &VesselRecord {
        self.store.vessel(&VesselId::from(id)).unwrap()
    }

    pub fn select(&mut self, id: &str) {
        self.store.select(Some(id.into()));
    }
}
