//! Short-range planar kinematics used by the risk engine.
//!
//! The projection is only meaningful for relative geometry over tens of kilometers.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

pub static METERS_PER_DEGREE: f64 = 111_319.9;
pub static METERS_PER_SECOND_PER_KNOT: f64 = 0.514_444;

static RELATIVE_SPEED_EPSILON: f64 = 1e-6;

#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct Vector2 {
    pub x: f64,
    pub y: f64,
}

/// Closest point of approach between two tracks.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cpa {
    /// Meters.
    pub cpa_distance: f64,
    /// Seconds from now, never negative.
    pub tcpa: f64,
}

impl Vector2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn dot(self, other: Vector2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }
}

impl Add for Vector2 {
    type Output = Vector2;

    fn add(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector2 {
    type Output = Vector2;

    fn sub(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector2 {
    type Output = Vector2;

    fn mul(self, rhs: f64) -> Vector2 {
        Vector2::new(self.x * rhs, self.y * rhs)
    }
}

/// Equirectangular projection in meters, longitude scaled by `cos(ref_lat)`.
pub fn to_plane(lat: f64, lng: f64, ref_lat: f64) -> Vector2 {
    let lng_scale = METERS_PER_DEGREE * ref_lat.to_radians().cos();
    Vector2::new(lng * lng_scale, lat * METERS_PER_DEGREE)
}

/// Heading is clockwise from north, the result is in m/s on an x-east/y-north plane.
pub fn velocity_from_course_speed(heading: f64, knots: f64) -> Vector2 {
    let speed = knots * METERS_PER_SECOND_PER_KNOT;
    let angle = (90. - heading).to_radians();
    Vector2::new(speed * angle.cos(), speed * angle.sin())
}

pub fn cpa(p1: Vector2, v1: Vector2, p2: Vector2, v2: Vector2) -> Cpa {
    let dp = p2 - p1;
    let dv = v2 - v1;
    let dv_sq = dv.dot(dv);

    let current = Cpa {
        cpa_distance: dp.length(),
        tcpa: 0.,
    };

    if dv_sq < RELATIVE_SPEED_EPSILON {
        return current;
    }

    let t = -dp.dot(dv) / dv_sq;
    if t <= 0. {
        return current;
    }

    let at_cpa = (p2 + v2 * t) - (p1 + v1 * t);
    Cpa {
        cpa_distance: at_cpa.length(),
        tcpa: t,
    }
}
