use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use snafu::ResultExt;
use tracker_core::{LatLng, VesselId, VesselUpdate};

use crate::error::{Result, error::JsonSnafu};

/// `[[min_lng, min_lat], [max_lng, max_lat]]`, longitude first.
pub type BoundingBox = [[f64; 2]; 2];

/// AIS "heading not available".
static HEADING_NOT_AVAILABLE: f64 = 511.;
static POSITION_REPORT: &str = "PositionReport";

/// Sent by downstream clients to (re)subscribe.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ClientSubscription {
    #[serde(rename = "BoundingBoxes", default)]
    pub bounding_boxes: Vec<BoundingBox>,
}

/// Sent by the relay to the upstream feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionRequest<'a> {
    #[serde(rename = "APIkey")]
    pub api_key: &'a str,
    #[serde(rename = "BoundingBoxes")]
    pub bounding_boxes: &'a [BoundingBox],
}

/// An inbound feed message. Only frames tagged as position reports are applied, every
/// other frame is parsed leniently and ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct AisStreamMessage {
    #[serde(rename = "MessageType")]
    pub message_type: Option<String>,
    #[serde(rename = "MetaData")]
    pub metadata: Option<MetaData>,
    #[serde(rename = "Message")]
    pub message: Option<MessageBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetaData {
    #[serde(rename = "MMSI")]
    pub mmsi: Option<Value>,
    #[serde(rename = "ShipName")]
    pub ship_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageBody {
    #[serde(rename = "PositionReport")]
    pub position_report: Option<PositionReport>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PositionReport {
    #[serde(rename = "Latitude", default, deserialize_with = "numeric")]
    pub latitude: Option<f64>,
    #[serde(rename = "Longitude", default, deserialize_with = "numeric")]
    pub longitude: Option<f64>,
    #[serde(rename = "Sog", default, deserialize_with = "numeric")]
    pub sog: Option<f64>,
    #[serde(rename = "Cog", default, deserialize_with = "numeric")]
    pub cog: Option<f64>,
    #[serde(rename = "TrueHeading", default, deserialize_with = "numeric")]
    pub true_heading: Option<f64>,
}

impl ClientSubscription {
    pub fn new(bounding_box: BoundingBox) -> Self {
        Self {
            bounding_boxes: vec![bounding_box],
        }
    }
}

impl<'a> SubscriptionRequest<'a> {
    pub fn new(api_key: &'a str, subscription: &'a ClientSubscription) -> Self {
        Self {
            api_key,
            bounding_boxes: &subscription.bounding_boxes,
        }
    }
}

impl AisStreamMessage {
    /// Parses a raw feed frame. `Ok(None)` means the frame is valid but carries nothing
    /// to apply.
    pub fn parse_position_update(text: &str) -> Result<Option<(VesselId, VesselUpdate)>> {
        let message: AisStreamMessage = serde_json::from_str(text).context(JsonSnafu)?;
        Ok(message.into_position_update())
    }

    pub fn into_position_update(self) -> Option<(VesselId, VesselUpdate)> {
        if self.message_type.as_deref() != Some(POSITION_REPORT) {
            return None;
        }

        let metadata = self.metadata?;
        let report = self.message?.position_report?;

        let mmsi = metadata.mmsi.as_ref().and_then(mmsi_string)?;
        let position = LatLng::new(report.latitude?, report.longitude?);

        let name = metadata
            .ship_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(ToString::to_string)
            .unwrap_or_else(|| format!("Ship {mmsi}"));

        let heading = report
            .true_heading
            .filter(|h| *h != HEADING_NOT_AVAILABLE)
            .or(report.cog)
            .unwrap_or(0.);

        let update = VesselUpdate {
            name: Some(name),
            position: Some(position),
            heading: Some(heading),
            speed: Some(report.sog.unwrap_or(0.)),
            ..Default::default()
        };

        Some((mmsi.into(), update))
    }
}

fn mmsi_string(value: &Value) -> Option<String> {
    let mmsi = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return None,
    };
    (!mmsi.is_empty()).then_some(mmsi)
}

/// Any non-numeric value is treated as absent.
fn numeric<'de, D>(deserializer: D) -> std::result::Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_f64())
}
