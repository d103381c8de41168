//! Orbital Mechanics Library
//!
//! Position providers for link analysis: where every endpoint is at a given
//! time step (plus a sub-step offset), and where the Sun is. Two providers
//! ship with the crate:
//!
//! - [`ephemeris::TabulatedEphemeris`] - precomputed inertial positions per
//!   time step, linearly interpolated inside a step
//! - [`ephemeris::Sgp4Ephemeris`] - SGP4 propagation from TLEs, fixed ground
//!   sites rotated with the Earth, and a low-precision analytic Sun
//!
//! All positions are inertial, in kilometres.

use chrono::{DateTime, Utc};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod ephemeris;

pub use ephemeris::{Sgp4Ephemeris, TabulatedEphemeris};

/// Mean equatorial radius (WGS84), km
pub const EARTH_RADIUS_KM: f64 = 6378.137;

/// Astronomical unit, km
pub const AU_KM: f64 = 149_597_870.7;

#[derive(Error, Debug)]
pub enum OrbitalError {
    #[error("Invalid TLE format: {0}")]
    InvalidTle(String),
    #[error("Propagation failed: {0}")]
    PropagationFailed(String),
    #[error("Invalid coordinates: {0}")]
    InvalidCoordinates(String),
    #[error("No ephemeris for endpoint {0}")]
    UnknownEndpoint(String),
    #[error("Time step {time_step} (offset {offset_seconds}s) outside ephemeris for {endpoint}")]
    OutOfRange {
        endpoint: String,
        time_step: usize,
        offset_seconds: f64,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, OrbitalError>;

/// Source of endpoint and Sun positions over the discretized timeline.
///
/// Implementations must be pure: the same `(designator, time_step, offset)`
/// always yields the same vector. A non-zero offset lies between `time_step`
/// and `time_step + 1`.
pub trait PositionProvider {
    fn position(
        &self,
        designator: &str,
        time_step: usize,
        offset_seconds: f64,
    ) -> Result<Vector3<f64>>;

    fn sun_position(&self, time_step: usize) -> Result<Vector3<f64>>;
}

impl<P: PositionProvider + ?Sized> PositionProvider for Box<P> {
    fn position(
        &self,
        designator: &str,
        time_step: usize,
        offset_seconds: f64,
    ) -> Result<Vector3<f64>> {
        (**self).position(designator, time_step, offset_seconds)
    }

    fn sun_position(&self, time_step: usize) -> Result<Vector3<f64>> {
        (**self).sun_position(time_step)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeodeticPosition {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude_km: f64,
}

pub mod vectors {
    use nalgebra::Vector3;

    const DEGENERATE_NORM: f64 = 1e-12;

    /// Angle between two vectors in degrees. `None` when either is zero-length.
    pub fn angle_between_deg(a: &Vector3<f64>, b: &Vector3<f64>) -> Option<f64> {
        let denom = a.norm() * b.norm();
        if denom < DEGENERATE_NORM {
            return None;
        }
        let cos = (a.dot(b) / denom).clamp(-1.0, 1.0);
        Some(cos.acos().to_degrees())
    }

    pub fn lerp(a: &Vector3<f64>, b: &Vector3<f64>, fraction: f64) -> Vector3<f64> {
        a + (b - a) * fraction
    }

    pub fn is_degenerate(v: &Vector3<f64>) -> bool {
        v.norm() < DEGENERATE_NORM
    }
}

pub mod propagation {
    use super::*;

    /// Parsed TLE ready for repeated propagation.
    pub struct Sgp4Track {
        constants: sgp4::Constants,
        epoch: DateTime<Utc>,
    }

    impl Sgp4Track {
        pub fn from_tle(tle_line1: &str, tle_line2: &str) -> Result<Self> {
            let elements = sgp4::Elements::from_tle(
                None,
                tle_line1.as_bytes(),
                tle_line2.as_bytes(),
            ).map_err(|e| OrbitalError::InvalidTle(format!("{:?}", e)))?;

            let constants = sgp4::Constants::from_elements(&elements)
                .map_err(|e| OrbitalError::PropagationFailed(format!("{:?}", e)))?;

            let epoch = DateTime::<Utc>::from_naive_utc_and_offset(elements.datetime, Utc);

            Ok(Self { constants, epoch })
        }

        pub fn epoch(&self) -> DateTime<Utc> {
            self.epoch
        }

        /// TEME position in km, treated as inertial.
        pub fn position_at(&self, time: DateTime<Utc>) -> Result<Vector3<f64>> {
            let duration = time.signed_duration_since(self.epoch);
            let minutes_since_epoch = duration.num_milliseconds() as f64 / 60_000.0;

            let prediction = self.constants.propagate(minutes_since_epoch)
                .map_err(|e| OrbitalError::PropagationFailed(format!("{:?}", e)))?;

            Ok(Vector3::new(
                prediction.position[0],
                prediction.position[1],
                prediction.position[2],
            ))
        }
    }
}

pub mod transforms {
    use super::*;

    const EARTH_FLATTENING: f64 = 1.0 / 298.257223563;
    const J2000_JD: f64 = 2_451_545.0;
    const UNIX_EPOCH_JD: f64 = 2_440_587.5;

    pub fn julian_date(time: DateTime<Utc>) -> f64 {
        time.timestamp_millis() as f64 / 86_400_000.0 + UNIX_EPOCH_JD
    }

    /// Greenwich mean sidereal time in radians.
    pub fn gmst_rad(time: DateTime<Utc>) -> f64 {
        let d = julian_date(time) - J2000_JD;
        (280.46061837 + 360.98564736629 * d).rem_euclid(360.0).to_radians()
    }

    pub fn geodetic_to_ecef(pos: &GeodeticPosition) -> Result<Vector3<f64>> {
        if !(-90.0..=90.0).contains(&pos.latitude) || !pos.latitude.is_finite() {
            return Err(OrbitalError::InvalidCoordinates(format!(
                "latitude {} out of range",
                pos.latitude
            )));
        }
        if !pos.longitude.is_finite() || !pos.altitude_km.is_finite() {
            return Err(OrbitalError::InvalidCoordinates(format!(
                "non-finite longitude/altitude ({}, {})",
                pos.longitude, pos.altitude_km
            )));
        }

        let lat_rad = pos.latitude.to_radians();
        let lon_rad = pos.longitude.to_radians();
        let e2 = 2.0 * EARTH_FLATTENING - EARTH_FLATTENING * EARTH_FLATTENING;

        let n = EARTH_RADIUS_KM / (1.0 - e2 * lat_rad.sin().powi(2)).sqrt();

        Ok(Vector3::new(
            (n + pos.altitude_km) * lat_rad.cos() * lon_rad.cos(),
            (n + pos.altitude_km) * lat_rad.cos() * lon_rad.sin(),
            (n * (1.0 - e2) + pos.altitude_km) * lat_rad.sin(),
        ))
    }

    /// Rotate an Earth-fixed vector into the inertial frame.
    pub fn ecef_to_eci(ecef: &Vector3<f64>, gmst_rad: f64) -> Vector3<f64> {
        let (sin, cos) = gmst_rad.sin_cos();
        Vector3::new(
            cos * ecef.x - sin * ecef.y,
            sin * ecef.x + cos * ecef.y,
            ecef.z,
        )
    }

    /// Low-precision solar position (Astronomical Almanac), inertial km.
    /// Good to ~0.01 deg.
    pub fn sun_position(time: DateTime<Utc>) -> Vector3<f64> {
        let n = julian_date(time) - J2000_JD;
        let mean_longitude = (280.460 + 0.9856474 * n).to_radians();
        let g = (357.528 + 0.9856003 * n).to_radians();
        let ecliptic_longitude =
            mean_longitude + (1.915_f64.to_radians()) * g.sin() + (0.020_f64.to_radians()) * (2.0 * g).sin();
        let obliquity = (23.439 - 0.000_000_4 * n).to_radians();
        let distance_au = 1.00014 - 0.01671 * g.cos() - 0.00014 * (2.0 * g).cos();

        let r = distance_au * AU_KM;
        Vector3::new(
            r * ecliptic_longitude.cos(),
            r * obliquity.cos() * ecliptic_longitude.sin(),
            r * obliquity.sin() * ecliptic_longitude.sin(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_angle_between() {
        let x = Vector3::new(1.0, 0.0, 0.0);
        let y = Vector3::new(0.0, 2.0, 0.0);
        assert!((vectors::angle_between_deg(&x, &y).unwrap() - 90.0).abs() < 1e-9);
        assert!((vectors::angle_between_deg(&x, &-x).unwrap() - 180.0).abs() < 1e-9);
        assert!(vectors::angle_between_deg(&x, &Vector3::zeros()).is_none());
    }

    #[test]
    fn test_geodetic_equator() {
        let ecef = transforms::geodetic_to_ecef(&GeodeticPosition {
            latitude: 0.0,
            longitude: 90.0,
            altitude_km: 0.0,
        })
        .unwrap();
        assert!(ecef.x.abs() < 1e-6);
        assert!((ecef.y - EARTH_RADIUS_KM).abs() < 1e-6);
        assert!(ecef.z.abs() < 1e-6);
    }

    #[test]
    fn test_geodetic_rejects_bad_latitude() {
        let result = transforms::geodetic_to_ecef(&GeodeticPosition {
            latitude: 91.0,
            longitude: 0.0,
            altitude_km: 0.0,
        });
        assert!(matches!(result, Err(OrbitalError::InvalidCoordinates(_))));
    }

    #[test]
    fn test_sun_distance_about_one_au() {
        let time = Utc.with_ymd_and_hms(2024, 3, 20, 0, 0, 0).unwrap();
        let sun = transforms::sun_position(time);
        let au = sun.norm() / AU_KM;
        assert!((au - 1.0).abs() < 0.02, "sun at {} AU", au);
        // Near the March equinox the Sun sits close to the equatorial plane
        assert!(sun.z.abs() / sun.norm() < 0.05);
    }

    #[test]
    fn test_tle_epoch() {
        let track = propagation::Sgp4Track::from_tle(
            "1 25544U 98067A   08264.51782528 -.00002182  00000-0 -11606-4 0  2927",
            "2 25544  51.6416 247.4627 0006703 130.5360 325.0288 15.72125391563537",
        )
        .unwrap();
        // Day 264.51782528 of 2008
        let expected = Utc.with_ymd_and_hms(2008, 9, 20, 12, 25, 40).unwrap();
        assert!(track.epoch().signed_duration_since(expected).num_seconds().abs() <= 1);
    }

    #[test]
    fn test_ecef_to_eci_rotation() {
        let v = Vector3::new(1.0, 0.0, 0.0);
        let rotated = transforms::ecef_to_eci(&v, std::f64::consts::FRAC_PI_2);
        assert!(rotated.x.abs() < 1e-12);
        assert!((rotated.y - 1.0).abs() < 1e-12);
    }
}
