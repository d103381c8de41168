//! Scenario configuration

use crate::endpoint::{validate_endpoints, Endpoint};
use crate::timeline::Timeline;
use crate::{LinkError, Result, ResultExt};
use chrono::{DateTime, Utc};
use orbital_mechanics::ephemeris::{Sgp4Ephemeris, TabulatedEphemeris};
use orbital_mechanics::{GeodeticPosition, PositionProvider, EARTH_RADIUS_KM};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

fn default_earth_radius() -> f64 {
    EARTH_RADIUS_KM
}

/// Read-only settings shared by the evaluator, detector and builder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub timeline: Timeline,
    #[serde(default = "default_earth_radius")]
    pub earth_radius_km: f64,
}

impl AnalysisConfig {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            timeline,
            earth_radius_km: EARTH_RADIUS_KM,
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.timeline.validate()?;
        if !(self.earth_radius_km.is_finite() && self.earth_radius_km > 0.0) {
            return Err(LinkError::config(format!(
                "earth_radius_km must be positive, got {}",
                self.earth_radius_km
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TleEntry {
    pub designator: String,
    pub line1: String,
    pub line2: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteEntry {
    pub designator: String,
    #[serde(flatten)]
    pub position: GeodeticPosition,
}

/// Where endpoint positions come from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EphemerisSource {
    /// JSON table with one position per endpoint per time step
    Tabulated { path: PathBuf },
    /// TLE-propagated satellites and Earth-fixed sites from a UTC epoch
    Sgp4 {
        epoch: DateTime<Utc>,
        #[serde(default)]
        satellites: Vec<TleEntry>,
        #[serde(default)]
        sites: Vec<SiteEntry>,
    },
}

impl EphemerisSource {
    pub fn build(&self, timeline: &Timeline) -> Result<Box<dyn PositionProvider>> {
        match self {
            Self::Tabulated { path } => {
                let ephemeris = TabulatedEphemeris::load(path)
                    .with_context(|| format!("loading ephemeris {}", path.display()))?;
                if (ephemeris.seconds_per_time_step() - timeline.seconds_per_time_step).abs() > 1e-9 {
                    return Err(LinkError::config(format!(
                        "ephemeris step {}s does not match timeline step {}s",
                        ephemeris.seconds_per_time_step(),
                        timeline.seconds_per_time_step
                    )));
                }
                Ok(Box::new(ephemeris))
            }
            Self::Sgp4 {
                epoch,
                satellites,
                sites,
            } => {
                let mut ephemeris = Sgp4Ephemeris::new(*epoch, timeline.seconds_per_time_step);
                for sat in satellites {
                    ephemeris
                        .add_satellite(sat.designator.as_str(), &sat.line1, &sat.line2)
                        .with_context(|| format!("TLE for {}", sat.designator))?;
                }
                for site in sites {
                    ephemeris
                        .add_site(site.designator.as_str(), &site.position)
                        .with_context(|| format!("site {}", site.designator))?;
                }
                info!(
                    "SGP4 ephemeris from {}: {} satellites, {} sites",
                    epoch,
                    satellites.len(),
                    sites.len()
                );
                Ok(Box::new(ephemeris))
            }
        }
    }

    /// Designators this source can position, when known up front
    fn designators(&self) -> Option<HashSet<&str>> {
        match self {
            Self::Tabulated { .. } => None,
            Self::Sgp4 {
                satellites, sites, ..
            } => Some(
                satellites
                    .iter()
                    .map(|s| s.designator.as_str())
                    .chain(sites.iter().map(|s| s.designator.as_str()))
                    .collect(),
            ),
        }
    }

    fn resolve_paths(&mut self, base: &Path) {
        if let Self::Tabulated { path } = self {
            *path = resolve(base, path);
        }
    }
}

fn resolve(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

/// A complete analysis input
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub analysis: AnalysisConfig,
    pub ephemeris: EphemerisSource,
    pub endpoints: Vec<Endpoint>,
}

impl Scenario {
    /// Parse a JSON scenario. Relative file paths are resolved against the
    /// scenario's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading scenario from {:?}", path);

        let file = File::open(path).with_context(|| format!("opening scenario {}", path.display()))?;
        let mut scenario: Scenario = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("parsing scenario {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        scenario.resolve_paths(base);

        info!(
            "Loaded scenario with {} endpoints over {} time steps",
            scenario.endpoints.len(),
            scenario.analysis.timeline.time_steps
        );
        Ok(scenario)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        self.ephemeris.resolve_paths(base);
        for endpoint in &mut self.endpoints {
            if let Some(file) = &endpoint.replay_file {
                endpoint.replay_file = Some(resolve(base, file));
            }
            if let Some(conj) = &mut endpoint.conjunction {
                if let Some(file) = &conj.replay_file {
                    conj.replay_file = Some(resolve(base, file));
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.analysis.validate().context("analysis")?;
        validate_endpoints(&self.endpoints)?;

        if let Some(known) = self.ephemeris.designators() {
            for endpoint in &self.endpoints {
                if !known.contains(endpoint.designator.as_str()) {
                    return Err(LinkError::config(format!(
                        "endpoint {} has no TLE or site entry",
                        endpoint.designator
                    )));
                }
            }
        }

        if !self.endpoints.iter().any(|e| e.is_relay()) {
            warn!("Scenario has no relays; conjunction detection will be skipped");
        }
        Ok(())
    }

    pub fn provider(&self) -> Result<Box<dyn PositionProvider>> {
        self.ephemeris.build(&self.analysis.timeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    const SCENARIO: &str = r#"{
        "analysis": {
            "timeline": {"time_steps": 4, "seconds_per_time_step": 60.0, "additional_check_seconds": 20.0}
        },
        "ephemeris": {"kind": "tabulated", "path": "ephemeris.json"},
        "endpoints": [
            {
                "designator": "SAT-1",
                "role": "user",
                "replay_file": "links.txt",
                "antennas": [{"id": "KA-1", "frame": "zenith", "bands": ["Ka"]}]
            },
            {
                "designator": "RLY-1",
                "role": "relay",
                "required_downlink_overhead": [{"start": 0, "end": 1}],
                "conjunction": {
                    "max_simultaneous_senders": 3,
                    "narrowband": {"DEFAULT": {"2": 1.0, "3": 2.0}}
                },
                "antennas": [{"id": "KA-2", "bands": ["Ka"]}]
            }
        ]
    }"#;

    #[test]
    fn test_parse_and_resolve() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scenario.json");
        std::fs::write(&path, SCENARIO).unwrap();

        let scenario = Scenario::load(&path).unwrap();
        assert_eq!(scenario.analysis.earth_radius_km, EARTH_RADIUS_KM);
        assert_eq!(scenario.analysis.timeline.time_steps, 4);
        assert_eq!(scenario.endpoints[0].replay_file, Some(dir.path().join("links.txt")));
        match &scenario.ephemeris {
            EphemerisSource::Tabulated { path } => assert_eq!(path, &dir.path().join("ephemeris.json")),
            other => panic!("unexpected source {:?}", other),
        }
        let conj = scenario.endpoints[1].conjunction.as_ref().unwrap();
        assert_eq!(conj.narrowband.for_sender("SAT-1").unwrap()[&3], 2.0);
        scenario.validate().unwrap();
    }

    #[test]
    fn test_sgp4_source_requires_every_endpoint() {
        let mut scenario: Scenario = serde_json::from_str(SCENARIO).unwrap();
        scenario.ephemeris = serde_json::from_str(
            r#"{"kind": "sgp4", "epoch": "2024-01-01T00:00:00Z",
                "sites": [{"designator": "SAT-1", "latitude": 0.0, "longitude": 0.0, "altitude_km": 0.0}]}"#,
        )
        .unwrap();
        let err = scenario.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("RLY-1"));
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let mut scenario: Scenario = serde_json::from_str(SCENARIO).unwrap();
        scenario.endpoints[1].conjunction.as_mut().unwrap().max_simultaneous_senders = 1;
        assert_eq!(scenario.validate().unwrap_err().kind(), ErrorKind::Config);

        let mut scenario: Scenario = serde_json::from_str(SCENARIO).unwrap();
        scenario.analysis.timeline.seconds_per_time_step = 0.0;
        assert!(scenario.validate().is_err());
    }

    #[test]
    fn test_missing_file_is_io() {
        let err = Scenario::load("/nonexistent/scenario.json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
    }

    #[test]
    fn test_tabulated_step_must_match_timeline() {
        let dir = tempfile::tempdir().unwrap();
        let eph = dir.path().join("eph.json");
        std::fs::write(
            &eph,
            r#"{"seconds_per_time_step": 30.0, "sun": [[0, 1, 0]], "positions": {}}"#,
        )
        .unwrap();
        let source = EphemerisSource::Tabulated { path: eph };
        let err = source.build(&Timeline::new(2, 60.0, 0.0)).err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }
}
