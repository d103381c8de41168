//! Antennas mounted on endpoints

use crate::constraint::{AzimuthSector, ConstraintTable, ElevationBounds, Thresholds};
use crate::geometry::{self, LookAngles};
use crate::link::LinkId;
use crate::timeline::{any_contains, TimeStep, TimeWindow};
use crate::{LinkError, Result, ResultExt};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Orientation of the antenna's boresight axis
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AntennaFrame {
    /// Along the local vertical (ground stations, space-facing terminals)
    #[default]
    Zenith,
    /// Toward Earth centre (Earth-facing satellite terminals)
    Nadir,
}

/// Windows during which the antenna serves one partner exclusively
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dedication {
    pub partner: String,
    pub windows: Vec<TimeWindow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Antenna {
    pub id: String,
    #[serde(default)]
    pub frame: AntennaFrame,
    pub bands: Vec<String>,
    #[serde(default)]
    pub constraints: ConstraintTable,
    #[serde(default)]
    pub azimuth_sectors: Vec<AzimuthSector>,
    #[serde(default)]
    pub outages: Vec<TimeWindow>,
    #[serde(default)]
    pub dedications: Vec<Dedication>,
    #[serde(default)]
    pub acquisition_seconds: f64,
    #[serde(skip)]
    pub(crate) transmit_links: Vec<LinkId>,
    #[serde(skip)]
    pub(crate) receive_links: Vec<LinkId>,
}

impl Antenna {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            frame: AntennaFrame::default(),
            bands: Vec::new(),
            constraints: ConstraintTable::default(),
            azimuth_sectors: Vec::new(),
            outages: Vec::new(),
            dedications: Vec::new(),
            acquisition_seconds: 0.0,
            transmit_links: Vec::new(),
            receive_links: Vec::new(),
        }
    }

    pub fn with_band(mut self, band: impl Into<String>) -> Self {
        self.bands.push(band.into());
        self
    }

    pub fn with_constraints(mut self, partner: impl Into<String>, thresholds: Thresholds) -> Self {
        self.constraints = std::mem::take(&mut self.constraints).with(partner, thresholds);
        self
    }

    pub fn with_sector(mut self, sector: AzimuthSector) -> Self {
        self.azimuth_sectors.push(sector);
        self
    }

    pub fn with_outage(mut self, window: TimeWindow) -> Self {
        self.outages.push(window);
        self
    }

    pub fn with_dedication(mut self, partner: impl Into<String>, windows: Vec<TimeWindow>) -> Self {
        self.dedications.push(Dedication {
            partner: partner.into(),
            windows,
        });
        self
    }

    /// Direction toward a partner in this antenna's frame.
    pub fn look_angles(&self, own_position: &Vector3<f64>, line_of_sight: &Vector3<f64>) -> Option<LookAngles> {
        geometry::look_angles(self.frame, own_position, line_of_sight)
    }

    /// Elevation limits for the current azimuth.
    ///
    /// Sector limits only apply on platforms that do not tilt to track; an
    /// azimuth outside every sector keeps the pair's fixed limits.
    pub fn elevation_bounds(
        &self,
        azimuth_deg: Option<f64>,
        fixed: ElevationBounds,
        platform_tilts: bool,
    ) -> ElevationBounds {
        if platform_tilts || self.azimuth_sectors.is_empty() {
            return fixed;
        }
        azimuth_deg
            .and_then(|az| self.azimuth_sectors.iter().find(|s| s.contains(az)))
            .map(AzimuthSector::bounds)
            .unwrap_or(fixed)
    }

    /// First band this antenna shares with `other`
    pub fn matching_band(&self, other: &Antenna) -> Option<&str> {
        self.bands
            .iter()
            .find(|b| other.bands.contains(b))
            .map(String::as_str)
    }

    pub fn in_outage(&self, time_step: TimeStep) -> bool {
        any_contains(&self.outages, time_step)
    }

    /// True when the antenna is reserved for a partner other than `partner`.
    pub fn dedicated_elsewhere(&self, time_step: TimeStep, partner: &str) -> bool {
        self.dedications
            .iter()
            .any(|d| d.partner != partner && any_contains(&d.windows, time_step))
    }

    pub fn transmit_links(&self) -> &[LinkId] {
        &self.transmit_links
    }

    pub fn receive_links(&self) -> &[LinkId] {
        &self.receive_links
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.is_empty() || self.id.contains(char::is_whitespace) {
            return Err(LinkError::config(format!(
                "antenna id {:?} must be non-empty without whitespace",
                self.id
            )));
        }
        if self.bands.is_empty() {
            return Err(LinkError::config(format!("antenna {} has no frequency bands", self.id)));
        }
        if !(self.acquisition_seconds.is_finite() && self.acquisition_seconds >= 0.0) {
            return Err(LinkError::config(format!(
                "antenna {}: acquisition_seconds must be non-negative",
                self.id
            )));
        }
        self.constraints.validate().with_context(|| format!("antenna {}", self.id))?;
        for sector in &self.azimuth_sectors {
            sector.validate().with_context(|| format!("antenna {}", self.id))?;
        }
        for window in self.outages.iter().chain(self.dedications.iter().flat_map(|d| &d.windows)) {
            window.validate().with_context(|| format!("antenna {}", self.id))?;
        }
        Ok(())
    }
}
