//! Read-only views derived from a vessel snapshot.

use serde::Serialize;

use crate::{RiskSeverity, VesselId, VesselMap, VesselRecord, VesselStore};

/// Marina mode shows vessels moving slower than this many knots.
pub static MARINA_MAX_SPEED: f64 = 7.;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ViewFilter {
    pub query: String,
    pub marina_mode: bool,
    pub fleet_only: bool,
    pub fleet: Vec<VesselId>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskSummary {
    pub safe: usize,
    pub warning: usize,
    pub danger: usize,
    pub unassessed: usize,
    pub in_restricted_zone: usize,
    pub with_alerts: usize,
}

impl ViewFilter {
    pub fn from_store(store: &VesselStore) -> Self {
        Self {
            query: store.search_query().to_string(),
            marina_mode: store.marina_mode(),
            fleet_only: store.fleet_only(),
            fleet: store.fleet().to_vec(),
        }
    }
}

/// Case-insensitive substring match on name, id or type. An empty query matches everything.
pub fn matches_query(vessel: &VesselRecord, query: &str) -> bool {
    if query.is_empty() {
        return true;
    }
    let query = query.to_lowercase();
    [vessel.name.as_str(), vessel.id.as_str(), vessel.vessel_type.as_str()]
        .iter()
        .any(|v| v.to_lowercase().contains(&query))
}

pub fn visible_vessels<'a>(snapshot: &'a VesselMap, filter: &ViewFilter) -> Vec<&'a VesselRecord> {
    snapshot
        .values()
        .filter(|v| matches_query(v, &filter.query))
        .filter(|v| !filter.marina_mode || (v.speed > 0. && v.speed < MARINA_MAX_SPEED))
        .filter(|v| !filter.fleet_only || filter.fleet.contains(&v.id))
        .collect()
}

/// Fleet members present in the snapshot, in the order they were added.
pub fn fleet_vessels<'a>(
    snapshot: &'a VesselMap,
    fleet: &[VesselId],
    query: &str,
) -> Vec<&'a VesselRecord> {
    fleet
        .iter()
        .filter_map(|id| snapshot.get(id))
        .filter(|v| matches_query(v, query))
        .collect()
}

/// The id of the only vessel matching a non-blank query.
pub fn single_search_match<'a>(snapshot: &'a VesselMap, query: &str) -> Option<&'a VesselId> {
    if query.trim().is_empty() {
        return None;
    }

    let mut matches = snapshot.values().filter(|v| matches_query(v, query));
    match (matches.next(), matches.next()) {
        (Some(only), None) => Some(&only.id),
        _ => None,
    }
}

pub fn risk_summary(snapshot: &VesselMap) -> RiskSummary {
    snapshot
        .values()
        .fold(RiskSummary::default(), |mut summary, vessel| {
            match vessel.risk.map(|r| r.severity) {
                Some(RiskSeverity::Safe) => summary.safe += 1,
                Some(RiskSeverity::Warning) => summary.warning += 1,
                Some(RiskSeverity::Danger) => summary.danger += 1,
                None => summary.unassessed += 1,
            }
            if vessel.in_restricted_zone == Some(true) {
                summary.in_restricted_zone += 1;
            }
            if !vessel.alerts().is_empty() {
                summary.with_alerts += 1;
            }
            summary
        })
}
