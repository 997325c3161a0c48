use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Alert ids starting with this prefix were raised by the geofencing pass.
pub const GEOFENCE_ALERT_PREFIX: &str = "geo_";

static GEOFENCE_ALERT_MESSAGE: &str = "Entered Restricted Fishery Zone!";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Alert {
    pub id: String,
    pub message: String,
    pub severity: AlertSeverity,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn geofence(now: DateTime<Utc>) -> Alert {
        Alert {
            id: format!("{GEOFENCE_ALERT_PREFIX}{}", now.timestamp_millis()),
            message: GEOFENCE_ALERT_MESSAGE.to_string(),
            severity: AlertSeverity::Medium,
            timestamp: now,
        }
    }

    pub fn is_geofence(&self) -> bool {
        self.id.starts_with(GEOFENCE_ALERT_PREFIX)
    }
}
