//! Antenna constraint model
//!
//! Each antenna carries a [`ConstraintTable`]: thresholds keyed by the
//! partner's designator, with a `DEFAULT` entry as fallback. A `None`
//! threshold is unconstrained. For a directed pair the two antennas' entries
//! are merged into [`PairConstraints`].

use crate::{LinkError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Partner key used when no partner-specific entry exists
pub const DEFAULT_PARTNER: &str = "DEFAULT";

/// Scalar thresholds one antenna applies toward one partner
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Thresholds {
    pub min_elevation_deg: Option<f64>,
    pub max_elevation_deg: Option<f64>,
    pub min_grazing_altitude_km: Option<f64>,
    pub min_range_km: Option<f64>,
    pub max_range_km: Option<f64>,
    pub min_sun_separation_deg: Option<f64>,
    pub max_sun_separation_deg: Option<f64>,
    pub min_solar_intrusion_deg: Option<f64>,
}

impl Thresholds {
    pub fn validate(&self) -> Result<()> {
        let all = [
            ("min_elevation_deg", self.min_elevation_deg),
            ("max_elevation_deg", self.max_elevation_deg),
            ("min_grazing_altitude_km", self.min_grazing_altitude_km),
            ("min_range_km", self.min_range_km),
            ("max_range_km", self.max_range_km),
            ("min_sun_separation_deg", self.min_sun_separation_deg),
            ("max_sun_separation_deg", self.max_sun_separation_deg),
            ("min_solar_intrusion_deg", self.min_solar_intrusion_deg),
        ];
        for (name, value) in all {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(LinkError::config(format!("{} is not finite", name)));
                }
            }
        }

        check_order("elevation", self.min_elevation_deg, self.max_elevation_deg)?;
        check_order("range", self.min_range_km, self.max_range_km)?;
        check_order(
            "sun separation",
            self.min_sun_separation_deg,
            self.max_sun_separation_deg,
        )?;

        if self.min_range_km.is_some_and(|v| v < 0.0) || self.max_range_km.is_some_and(|v| v < 0.0) {
            return Err(LinkError::config("range thresholds must be non-negative"));
        }
        Ok(())
    }
}

fn check_order(name: &str, min: Option<f64>, max: Option<f64>) -> Result<()> {
    if let (Some(lo), Some(hi)) = (min, max) {
        if lo > hi {
            return Err(LinkError::config(format!(
                "minimum {} {} exceeds maximum {}",
                name, lo, hi
            )));
        }
    }
    Ok(())
}

/// Elevation limits that apply inside an azimuth sector.
///
/// Sectors run clockwise from `start_azimuth_deg` (inclusive) to
/// `end_azimuth_deg` (exclusive) and may wrap through north.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AzimuthSector {
    pub start_azimuth_deg: f64,
    pub end_azimuth_deg: f64,
    #[serde(default)]
    pub min_elevation_deg: Option<f64>,
    #[serde(default)]
    pub max_elevation_deg: Option<f64>,
}

impl AzimuthSector {
    pub fn contains(&self, azimuth_deg: f64) -> bool {
        let az = azimuth_deg.rem_euclid(360.0);
        if self.start_azimuth_deg <= self.end_azimuth_deg {
            az >= self.start_azimuth_deg && az < self.end_azimuth_deg
        } else {
            az >= self.start_azimuth_deg || az < self.end_azimuth_deg
        }
    }

    pub fn bounds(&self) -> ElevationBounds {
        ElevationBounds {
            min: self.min_elevation_deg,
            max: self.max_elevation_deg,
        }
    }

    pub fn validate(&self) -> Result<()> {
        for az in [self.start_azimuth_deg, self.end_azimuth_deg] {
            if !(0.0..=360.0).contains(&az) {
                return Err(LinkError::config(format!(
                    "azimuth sector bound {} outside [0, 360]",
                    az
                )));
            }
        }
        check_order("sector elevation", self.min_elevation_deg, self.max_elevation_deg)
    }
}

/// Thresholds keyed by partner designator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintTable {
    entries: HashMap<String, Thresholds>,
}

impl ConstraintTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, partner: impl Into<String>, thresholds: Thresholds) -> Self {
        self.entries.insert(partner.into(), thresholds);
        self
    }

    pub fn with_default(self, thresholds: Thresholds) -> Self {
        self.with(DEFAULT_PARTNER, thresholds)
    }

    /// Partner keys, `DEFAULT` included
    pub fn partners(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Partner-specific entry, else `DEFAULT`, else unconstrained.
    pub fn for_partner(&self, designator: &str) -> Thresholds {
        self.entries
            .get(designator)
            .or_else(|| self.entries.get(DEFAULT_PARTNER))
            .copied()
            .unwrap_or_default()
    }

    pub fn validate(&self) -> Result<()> {
        for (partner, thresholds) in &self.entries {
            thresholds
                .validate()
                .with_context(|| format!("constraints toward {}", partner))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ElevationBounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

/// Per-side limits of a directed pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SideConstraints {
    pub elevation: ElevationBounds,
    pub min_sun_separation_deg: Option<f64>,
    pub max_sun_separation_deg: Option<f64>,
}

impl SideConstraints {
    fn from_thresholds(t: &Thresholds) -> Self {
        Self {
            elevation: ElevationBounds {
                min: t.min_elevation_deg,
                max: t.max_elevation_deg,
            },
            min_sun_separation_deg: t.min_sun_separation_deg,
            max_sun_separation_deg: t.max_sun_separation_deg,
        }
    }
}

/// Merged constraints for one transmitter→receiver antenna pair
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PairConstraints {
    pub min_grazing_altitude_km: Option<f64>,
    pub min_range_km: Option<f64>,
    pub max_range_km: Option<f64>,
    pub transmit: SideConstraints,
    pub receive: SideConstraints,
    pub min_solar_intrusion_deg: Option<f64>,
}

impl PairConstraints {
    /// Shared limits (range, grazing altitude) take the tighter of both
    /// entries; per-side limits stay with their antenna.
    pub fn merge(transmit: &Thresholds, receive: &Thresholds) -> Self {
        Self {
            min_grazing_altitude_km: tighter_min(
                transmit.min_grazing_altitude_km,
                receive.min_grazing_altitude_km,
            ),
            min_range_km: tighter_min(transmit.min_range_km, receive.min_range_km),
            max_range_km: tighter_max(transmit.max_range_km, receive.max_range_km),
            transmit: SideConstraints::from_thresholds(transmit),
            receive: SideConstraints::from_thresholds(receive),
            min_solar_intrusion_deg: transmit.min_solar_intrusion_deg,
        }
    }
}

fn tighter_min(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.max(y)),
        (x, None) => x,
        (None, y) => y,
    }
}

fn tighter_max(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(x.min(y)),
        (x, None) => x,
        (None, y) => y,
    }
}
