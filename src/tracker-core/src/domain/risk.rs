use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

use crate::Cpa;

/// Severity rank of a vessel pair. Variants are declared in increasing order of danger.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Deserialize,
    Serialize,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RiskSeverity {
    Safe,
    Warning,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Risk {
    /// Meters.
    pub cpa_distance: f64,
    /// Seconds.
    pub tcpa: f64,
    pub severity: RiskSeverity,
}

/// Distance (meters) and time (seconds) limits below which a pair is flagged.
///
/// The limits are empirically chosen and can be overridden through configuration.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub danger_distance: f64,
    pub danger_tcpa: f64,
    pub warning_distance: f64,
    pub warning_tcpa: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            danger_distance: 500.,
            danger_tcpa: 360.,
            warning_distance: 1500.,
            warning_tcpa: 720.,
        }
    }
}

impl RiskThresholds {
    pub fn classify(&self, cpa: &Cpa) -> RiskSeverity {
        let Cpa { cpa_distance, tcpa } = *cpa;

        if cpa_distance < self.danger_distance && tcpa > 0. && tcpa < self.danger_tcpa {
            RiskSeverity::Danger
        } else if cpa_distance < self.warning_distance && tcpa > 0. && tcpa < self.warning_tcpa {
            RiskSeverity::Warning
        } else {
            RiskSeverity::Safe
        }
    }

    pub fn assess(&self, cpa: Cpa) -> Risk {
        Risk {
            cpa_distance: cpa.cpa_distance,
            tcpa: cpa.tcpa,
            severity: self.classify(&cpa),
        }
    }
}
