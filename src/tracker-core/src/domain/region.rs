use geo::{Contains, Coord, Intersects, Rect};
use serde::{Deserialize, Serialize};
use snafu::{ResultExt, ensure};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};

use crate::{
    LatLng,
    error::{
        Result,
        error::{InvalidRegionSnafu, UnknownRegionSnafu},
    },
};

#[derive(
    Debug,
    Default,
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
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RegionId {
    #[default]
    Busan,
    Incheon,
    Singapore,
}

/// A tracked area: where the map is centered, what the feed subscribes to, where the
/// synthetic fleet may sail and which rectangle (if any) is off limits.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    pub id: RegionId,
    pub name: &'static str,
    pub center: LatLng,
    pub bounds: Zone,
    /// Rectangles approximating navigable water, only used by the simulation driver.
    pub sea_zones: Vec<Zone>,
    pub restricted_zone: Option<Zone>,
}

/// A latitude/longitude rectangle, kept as written so that validation sees swapped corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl RegionId {
    pub fn region(self) -> Region {
        match self {
            RegionId::Busan => Region {
                id: self,
                name: "Busan Port",
                center: LatLng::new(35.1028, 129.0403),
                bounds: rect(35.0, 128.9, 35.2, 129.2),
                sea_zones: vec![
                    rect(34.96, 129.0, 35.03, 129.12),
                    rect(34.97, 129.08, 35.04, 129.16),
                ],
                restricted_zone: Some(rect(35.08, 129.0, 35.1, 129.05)),
            },
            RegionId::Incheon => Region {
                id: self,
                name: "Incheon Port",
                center: LatLng::new(37.4563, 126.5841),
                bounds: rect(37.3, 126.4, 37.6, 126.8),
                sea_zones: vec![rect(37.35, 126.45, 37.45, 126.65)],
                restricted_zone: None,
            },
            RegionId::Singapore => Region {
                id: self,
                name: "Singapore Port",
                center: LatLng::new(1.2901, 103.8519),
                bounds: rect(1.1, 103.6, 1.4, 104.0),
                sea_zones: vec![rect(1.15, 103.65, 1.25, 103.95)],
                restricted_zone: None,
            },
        }
    }

    /// Single character used when building synthetic vessel ids.
    pub fn initial(self) -> char {
        match self {
            RegionId::Busan => 'b',
            RegionId::Incheon => 'i',
            RegionId::Singapore => 's',
        }
    }

    pub fn parse(value: &str) -> Result<RegionId> {
        value
            .to_lowercase()
            .parse()
            .context(UnknownRegionSnafu { value })
    }
}

impl Region {
    /// Sea zones include their boundary.
    pub fn in_sea(&self, position: LatLng) -> bool {
        let coord = Coord::from(position);
        self.sea_zones.iter().any(|z| z.rect().intersects(&coord))
    }

    /// The restricted zone excludes its boundary.
    pub fn in_restricted_zone(&self, position: LatLng) -> bool {
        self.restricted_zone
            .is_some_and(|z| z.rect().contains(&Coord::from(position)))
    }

    /// The region bounds as a feed bounding box, `[[min_lng, min_lat], [max_lng, max_lat]]`.
    pub fn bounding_box(&self) -> [[f64; 2]; 2] {
        let b = &self.bounds;
        [[b.min_lng, b.min_lat], [b.max_lng, b.max_lat]]
    }

    pub fn validate(&self) -> Result<()> {
        self.bounds.validate(self.id, "bounds")?;

        ensure!(
            !self.sea_zones.is_empty(),
            InvalidRegionSnafu {
                region: self.id,
                zone: "sea zone list",
                reason: "at least one sea zone is required",
            }
        );
        for zone in &self.sea_zones {
            zone.validate(self.id, "sea zone")?;
        }

        if let Some(zone) = &self.restricted_zone {
            zone.validate(self.id, "restricted zone")?;
        }

        Ok(())
    }
}

/// Checks every built-in region, used at startup to refuse serving with a broken catalog.
pub fn validate_regions() -> Result<()> {
    RegionId::iter().try_for_each(|id| id.region().validate())
}

const fn rect(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Zone {
    Zone {
        min_lat,
        min_lng,
        max_lat,
        max_lng,
    }
}

impl Zone {
    pub fn rect(&self) -> Rect<f64> {
        Rect::new(
            Coord {
                x: self.min_lng,
                y: self.min_lat,
            },
            Coord {
                x: self.max_lng,
                y: self.max_lat,
            },
        )
    }

    fn validate(&self, region: RegionId, zone: &'static str) -> Result<()> {
        let Self {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
        } = *self;

        let reason = if ![min_lat, min_lng, max_lat, max_lng]
            .iter()
            .all(|v| v.is_finite())
        {
            Some("coordinates must be finite")
        } else if min_lat < -90. || max_lat > 90. || min_lng < -180. || max_lng > 180. {
            Some("coordinates are out of range")
        } else if min_lat > max_lat || min_lng > max_lng {
            Some("minimum corner lies past the maximum corner")
        } else if min_lat == max_lat || min_lng == max_lng {
            Some("rectangle has no area")
        } else {
            None
        };

        match reason {
            Some(reason) => InvalidRegionSnafu {
                region,
                zone,
                reason,
            }
            .fail(),
            None => Ok(()),
        }
    }
}
