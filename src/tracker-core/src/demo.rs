use std::{collections::VecDeque, sync::Arc};

use chrono::Utc;
use rand::Rng;

use crate::{
    HistorySample, LatLng, Motion, RegionId, SYNTHETIC_ID_PREFIX, VesselId, VesselMap,
    VesselRecord, Wind,
};

static DESTINATIONS: [&str; 10] = [
    "BUSAN (KR)",
    "INCHEON (KR)",
    "SINGAPORE (SG)",
    "YOKOHAMA (JP)",
    "SHANGHAI (CN)",
    "KAOHSIUNG (TW)",
    "QINGDAO (CN)",
    "OSAKA (JP)",
    "HONG KONG (HK)",
    "NINGBO (CN)",
];

static VESSEL_TYPES: [&str; 3] = ["Cargo", "Tanker", "Tug"];

pub fn demo_fleet_size(region: RegionId) -> usize {
    match region {
        RegionId::Busan => 10,
        RegionId::Incheon | RegionId::Singapore => 6,
    }
}

/// Builds the synthetic fleet shown for `region` while no live vessel is known.
///
/// Vessel `i` starts somewhere inside sea zone `i % zones`.
pub fn generate_demo_fleet<R: Rng + ?Sized>(region: RegionId, rng: &mut R) -> VesselMap {
    let catalog = region.region();
    let now = Utc::now();

    (0..demo_fleet_size(region))
        .filter_map(|i| {
            let zone = catalog.sea_zones.get(i % catalog.sea_zones.len().max(1))?;
            let position = LatLng::new(
                rng.random_range(zone.min_lat..zone.max_lat),
                rng.random_range(zone.min_lng..zone.max_lng),
            );
            let fuel = 70. + f64::from(rng.random_range(0..30_u32));
            let id = VesselId::from(format!("{SYNTHETIC_ID_PREFIX}{}{i}", region.initial()));

            let record = VesselRecord {
                id: id.clone(),
                name: format!("DEMO_{}_0{}", region.as_ref().to_uppercase(), i + 1),
                vessel_type: VESSEL_TYPES[i % VESSEL_TYPES.len()].into(),
                imo: Some(format!("IMO{}", 1_000_000 + i)),
                destination: Some(DESTINATIONS[i % DESTINATIONS.len()].into()),
                position,
                heading: rng.random_range(0.0..360.0_f64).floor(),
                speed: rng.random_range(3.0..15.0),
                fuel,
                motion: Motion::default(),
                wind: Wind::default(),
                risk: None,
                in_restricted_zone: None,
                path: VecDeque::from([position]),
                alerts: Vec::new(),
                historical_data: VecDeque::from([HistorySample {
                    timestamp: now,
                    fuel,
                    efficiency: rng.random_range(0.8..1.0),
                }]),
            };
            Some((id, record))
        })
        .collect()
}

/// The synthetic fleet of one region, shared by reference until the region changes.
#[derive(Debug, Clone)]
pub struct DemoCache {
    region: RegionId,
    vessels: Arc<VesselMap>,
}

impl DemoCache {
    pub fn new<R: Rng + ?Sized>(region: RegionId, rng: &mut R) -> Self {
        Self {
            region,
            vessels: Arc::new(generate_demo_fleet(region, rng)),
        }
    }

    pub fn region(&self) -> RegionId {
        self.region
    }

    pub fn vessels(&self) -> &Arc<VesselMap> {
        &self.vessels
    }
}
