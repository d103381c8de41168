//! Concrete position providers

use crate::propagation::Sgp4Track;
use crate::{transforms, vectors, GeodeticPosition, OrbitalError, PositionProvider, Result};
use chrono::{DateTime, Duration, Utc};
use nalgebra::Vector3;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::{debug, info};

/// Precomputed positions, one sample per time step.
///
/// A series with a single sample is treated as stationary. Offsets inside a
/// step interpolate linearly toward the next sample.
#[derive(Debug, Clone)]
pub struct TabulatedEphemeris {
    seconds_per_time_step: f64,
    positions: HashMap<String, Vec<Vector3<f64>>>,
    sun: Vec<Vector3<f64>>,
}

/// On-disk layout: `{"seconds_per_time_step": 60, "sun": [[x,y,z], ...],
/// "positions": {"SAT-1": [[x,y,z], ...]}}`
#[derive(Debug, Deserialize)]
struct RawTabulated {
    seconds_per_time_step: f64,
    sun: Vec<[f64; 3]>,
    positions: HashMap<String, Vec<[f64; 3]>>,
}

impl TabulatedEphemeris {
    pub fn new(seconds_per_time_step: f64) -> Self {
        Self {
            seconds_per_time_step,
            positions: HashMap::new(),
            sun: Vec::new(),
        }
    }

    pub fn with_series(mut self, designator: impl Into<String>, series: Vec<Vector3<f64>>) -> Self {
        self.insert(designator, series);
        self
    }

    pub fn with_sun(mut self, sun: Vec<Vector3<f64>>) -> Self {
        self.sun = sun;
        self
    }

    pub fn insert(&mut self, designator: impl Into<String>, series: Vec<Vector3<f64>>) {
        self.positions.insert(designator.into(), series);
    }

    pub fn seconds_per_time_step(&self) -> f64 {
        self.seconds_per_time_step
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading tabulated ephemeris from {:?}", path);

        let reader = BufReader::new(File::open(path)?);
        let raw: RawTabulated = serde_json::from_reader(reader)?;

        if raw.seconds_per_time_step <= 0.0 || !raw.seconds_per_time_step.is_finite() {
            return Err(OrbitalError::InvalidCoordinates(format!(
                "seconds_per_time_step must be positive, got {}",
                raw.seconds_per_time_step
            )));
        }

        let to_vec = |v: &[f64; 3]| Vector3::new(v[0], v[1], v[2]);
        let ephemeris = Self {
            seconds_per_time_step: raw.seconds_per_time_step,
            sun: raw.sun.iter().map(to_vec).collect(),
            positions: raw
                .positions
                .iter()
                .map(|(k, series)| (k.clone(), series.iter().map(to_vec).collect()))
                .collect(),
        };

        info!(
            "Loaded ephemeris for {} endpoints ({} sun samples)",
            ephemeris.positions.len(),
            ephemeris.sun.len()
        );
        Ok(ephemeris)
    }

    fn sample(
        &self,
        label: &str,
        series: &[Vector3<f64>],
        time_step: usize,
        offset_seconds: f64,
    ) -> Result<Vector3<f64>> {
        let out_of_range = || OrbitalError::OutOfRange {
            endpoint: label.to_string(),
            time_step,
            offset_seconds,
        };

        if series.len() == 1 {
            return Ok(series[0]);
        }
        let current = series.get(time_step).ok_or_else(out_of_range)?;
        if offset_seconds == 0.0 {
            return Ok(*current);
        }
        let next = series.get(time_step + 1).ok_or_else(out_of_range)?;
        Ok(vectors::lerp(current, next, offset_seconds / self.seconds_per_time_step))
    }
}

impl PositionProvider for TabulatedEphemeris {
    fn position(
        &self,
        designator: &str,
        time_step: usize,
        offset_seconds: f64,
    ) -> Result<Vector3<f64>> {
        let series = self
            .positions
            .get(designator)
            .ok_or_else(|| OrbitalError::UnknownEndpoint(designator.to_string()))?;
        self.sample(designator, series, time_step, offset_seconds)
    }

    fn sun_position(&self, time_step: usize) -> Result<Vector3<f64>> {
        self.sample("sun", &self.sun, time_step, 0.0)
    }
}

/// SGP4-propagated satellites plus Earth-fixed ground sites.
pub struct Sgp4Ephemeris {
    epoch: DateTime<Utc>,
    seconds_per_time_step: f64,
    tracks: HashMap<String, Sgp4Track>,
    sites: HashMap<String, Vector3<f64>>,
}

impl Sgp4Ephemeris {
    pub fn new(epoch: DateTime<Utc>, seconds_per_time_step: f64) -> Self {
        Self {
            epoch,
            seconds_per_time_step,
            tracks: HashMap::new(),
            sites: HashMap::new(),
        }
    }

    pub fn add_satellite(&mut self, designator: impl Into<String>, line1: &str, line2: &str) -> Result<()> {
        let designator = designator.into();
        let track = Sgp4Track::from_tle(line1, line2)?;
        let age = self.epoch.signed_duration_since(track.epoch());
        debug!(
            "{}: TLE epoch {}, {:.1} days before analysis start",
            designator,
            track.epoch(),
            age.num_seconds() as f64 / 86_400.0
        );
        self.tracks.insert(designator, track);
        Ok(())
    }

    pub fn add_site(&mut self, designator: impl Into<String>, site: &GeodeticPosition) -> Result<()> {
        let ecef = transforms::geodetic_to_ecef(site)?;
        self.sites.insert(designator.into(), ecef);
        Ok(())
    }

    fn time_of(&self, time_step: usize, offset_seconds: f64) -> DateTime<Utc> {
        let seconds = time_step as f64 * self.seconds_per_time_step + offset_seconds;
        self.epoch + Duration::milliseconds((seconds * 1000.0).round() as i64)
    }
}

impl PositionProvider for Sgp4Ephemeris {
    fn position(
        &self,
        designator: &str,
        time_step: usize,
        offset_seconds: f64,
    ) -> Result<Vector3<f64>> {
        let time = self.time_of(time_step, offset_seconds);
        if let Some(track) = self.tracks.get(designator) {
            return track.position_at(time);
        }
        if let Some(ecef) = self.sites.get(designator) {
            return Ok(transforms::ecef_to_eci(ecef, transforms::gmst_rad(time)));
        }
        Err(OrbitalError::UnknownEndpoint(designator.to_string()))
    }

    fn sun_position(&self, time_step: usize) -> Result<Vector3<f64>> {
        Ok(transforms::sun_position(self.time_of(time_step, 0.0)))
    }
}
