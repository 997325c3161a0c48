use std::{
    collections::{BTreeMap, VecDeque},
    fmt::Display,
};

use chrono::{DateTime, Utc};
use geo::Coord;
use serde::{Deserialize, Serialize};

use crate::{Alert, Risk};

/// Maximum number of positions retained in a vessel's path.
pub const PATH_CAPACITY: usize = 50;
/// Maximum number of fuel/efficiency samples retained per vessel.
pub const HISTORY_CAPACITY: usize = 30;
/// Ids starting with this prefix belong to the synthetic demo fleet.
pub const SYNTHETIC_ID_PREFIX: &str = "999";

pub type VesselMap = BTreeMap<VesselId, VesselRecord>;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
#[serde(transparent)]
pub struct VesselId(String);

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Motion {
    pub pitch: f64,
    pub roll: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Wind {
    pub speed: f64,
    pub direction: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct HistorySample {
    pub timestamp: DateTime<Utc>,
    pub fuel: f64,
    pub efficiency: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VesselRecord {
    pub id: VesselId,
    pub name: String,
    #[serde(rename = "type")]
    pub vessel_type: String,
    pub imo: Option<String>,
    pub destination: Option<String>,
    pub position: LatLng,
    /// True heading in degrees, clockwise from north.
    pub heading: f64,
    /// Speed over ground in knots.
    pub speed: f64,
    pub fuel: f64,
    pub motion: Motion,
    pub wind: Wind,
    pub risk: Option<Risk>,
    pub in_restricted_zone: Option<bool>,
    pub(crate) path: VecDeque<LatLng>,
    pub(crate) alerts: Vec<Alert>,
    pub(crate) historical_data: VecDeque<HistorySample>,
}

/// A partial vessel record. Every field left as `None` keeps its current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VesselUpdate {
    pub name: Option<String>,
    pub vessel_type: Option<String>,
    pub imo: Option<String>,
    pub destination: Option<String>,
    pub position: Option<LatLng>,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
    pub fuel: Option<f64>,
    pub motion: Option<Motion>,
    pub wind: Option<Wind>,
    pub history_sample: Option<HistorySample>,
    pub risk: Option<Risk>,
    pub in_restricted_zone: Option<bool>,
    pub alert: Option<Alert>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Do not append `position` to the path. Used by derived-field writers and replay.
    pub skip_path_record: bool,
}

/// Values used for every field an update leaves out when a vessel is seen for the first time.
#[derive(Debug, Clone, PartialEq)]
pub struct VesselDefaults {
    pub name: String,
    pub vessel_type: String,
    pub position: LatLng,
    pub heading: f64,
    pub speed: f64,
    pub fuel: f64,
    pub motion: Motion,
    pub wind: Wind,
}

impl Default for VesselDefaults {
    fn default() -> Self {
        Self {
            name: "Unknown".into(),
            vessel_type: "Commercial".into(),
            position: LatLng::default(),
            heading: 0.,
            speed: 0.,
            fuel: 85.,
            motion: Motion::default(),
            wind: Wind::default(),
        }
    }
}

impl Default for Motion {
    fn default() -> Self {
        Self {
            pitch: 0.5,
            roll: 1.2,
        }
    }
}

impl Default for Wind {
    fn default() -> Self {
        Self {
            speed: 12.,
            direction: 45.,
        }
    }
}

impl VesselId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_synthetic(&self) -> bool {
        self.0.starts_with(SYNTHETIC_ID_PREFIX)
    }
}

impl From<String> for VesselId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for VesselId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for VesselId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for VesselId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<LatLng> for Coord<f64> {
    fn from(value: LatLng) -> Self {
        Coord {
            x: value.lng,
            y: value.lat,
        }
    }
}

impl VesselRecord {
    /// Builds a complete record for a vessel seen for the first time.
    pub fn from_update(id: VesselId, update: VesselUpdate, defaults: &VesselDefaults) -> Self {
        let mut record = VesselRecord {
            id,
            name: defaults.name.clone(),
            vessel_type: defaults.vessel_type.clone(),
            imo: None,
            destination: None,
            position: defaults.position,
            heading: defaults.heading,
            speed: defaults.speed,
            fuel: defaults.fuel,
            motion: defaults.motion,
            wind: defaults.wind,
            risk: None,
            in_restricted_zone: None,
            path: VecDeque::with_capacity(PATH_CAPACITY),
            alerts: Vec::new(),
            historical_data: VecDeque::new(),
        };

        if let Some(position) = update.position {
            record.path.push_back(position);
        }
        record.apply(update);
        record
    }

    /// Returns the record that results from shallow-merging `update` into `self`.
    ///
    /// `self` is left untouched, callers replace the whole record with the returned value.
    pub fn merged(&self, update: VesselUpdate, options: UpdateOptions) -> Self {
        let mut next = self.clone();
        if !options.skip_path_record {
            if let Some(position) = update.position {
                next.record_path_point(position);
            }
        }
        next.apply(update);
        next
    }

    pub fn path(&self) -> &VecDeque<LatLng> {
        &self.path
    }

    pub fn alerts(&self) -> &[Alert] {
        &self.alerts
    }

    pub fn historical_data(&self) -> &VecDeque<HistorySample> {
        &self.historical_data
    }

    pub fn has_geofence_alert(&self) -> bool {
        self.alerts.iter().any(Alert::is_geofence)
    }

    /// Removes the alert with `alert_id`, returns whether anything was removed.
    pub fn remove_alert(&mut self, alert_id: &str) -> bool {
        let before = self.alerts.len();
        self.alerts.retain(|a| a.id != alert_id);
        before != self.alerts.len()
    }

    fn record_path_point(&mut self, position: LatLng) {
        if self.path.back() == Some(&position) {
            return;
        }
        self.path.push_back(position);
        while self.path.len() > PATH_CAPACITY {
            self.path.pop_front();
        }
    }

    fn push_history_sample(&mut self, sample: HistorySample) {
        if self.historical_data.back() == Some(&sample) {
            return;
        }
        self.historical_data.push_back(sample);
        while self.historical_data.len() > HISTORY_CAPACITY {
            self.historical_data.pop_front();
        }
    }

    fn apply(&mut self, update: VesselUpdate) {
        let VesselUpdate {
            name,
            vessel_type,
            imo,
            destination,
            position,
            heading,
            speed,
            fuel,
            motion,
            wind,
            history_sample,
            risk,
            in_restricted_zone,
            alert,
        } = update;

        if let Some(v) = name {
            self.name = v;
        }
        if let Some(v) = vessel_type {
            self.vessel_type = v;
        }
        if imo.is_some() {
            self.imo = imo;
        }
        if destination.is_some() {
            self.destination = destination;
        }
        if let Some(v) = position {
            self.position = v;
        }
        if let Some(v) = heading {
            self.heading = v;
        }
        if let Some(v) = speed {
            self.speed = v;
        }
        if let Some(v) = fuel {
            self.fuel = v;
        }
        if let Some(v) = motion {
            self.motion = v;
        }
        if let Some(v) = wind {
            self.wind = v;
        }
        if let Some(v) = history_sample {
            self.push_history_sample(v);
        }
        if risk.is_some() {
            self.risk = risk;
        }
        if in_restricted_zone.is_some() {
            self.in_restricted_zone = in_restricted_zone;
        }
        if let Some(v) = alert {
            if !self.alerts.iter().any(|a| a.id == v.id) {
                self.alerts.push(v);
            }
        }
    }
}

#[cfg(any(test, feature = "test"))]
mod test {
    use super::*;

    impl VesselUpdate {
        pub fn test_position(lat: f64, lng: f64) -> VesselUpdate {
            VesselUpdate {
                position: Some(LatLng::new(lat, lng)),
                ..Default::default()
            }
        }

        pub fn test_kinematics(lat: f64, lng: f64, heading: f64, speed: f64) -> VesselUpdate {
            VesselUpdate {
                position: Some(LatLng::new(lat, lng)),
                heading: Some(heading),
                speed: Some(speed),
                ..Default::default()
            }
        }
    }
}
