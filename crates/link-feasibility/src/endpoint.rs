//! Satellites, relays and ground stations

use crate::antenna::Antenna;
use crate::conjunction::{Band, ConjunctionReceiver};
use crate::constraint::DEFAULT_PARTNER;
use crate::timeline::{any_contains, TimeStep, TimeWindow};
use crate::{LinkError, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointRole {
    /// Mission satellite that originates traffic
    User,
    /// Relay satellite forwarding user traffic to the ground
    Relay,
    Ground,
}

/// Answer to "can this receiver offload what it receives at this step?"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownlinkSupport {
    /// The endpoint does not forward traffic; nothing to check
    NotApplicable,
    Supported,
    Unsupported,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub designator: String,
    pub role: EndpointRole,
    /// Platform slews to track its partner; azimuth-sector limits do not apply
    #[serde(default)]
    pub tilts_to_track: bool,
    /// User satellite may downlink straight to ground stations
    #[serde(default)]
    pub direct_downlink: bool,
    /// User satellite may link to other self-relay users
    #[serde(default)]
    pub self_relay: bool,
    /// Formation partner whose direction must stay clear of the Sun
    #[serde(default)]
    pub cluster_partner: Option<String>,
    /// Persisted link statuses for links this endpoint transmits
    #[serde(default)]
    pub replay_file: Option<PathBuf>,
    /// Relay downlink windows reserved for required overhead traffic
    #[serde(default)]
    pub required_downlink_overhead: Vec<TimeWindow>,
    #[serde(default)]
    pub conjunction: Option<ConjunctionReceiver>,
    pub antennas: Vec<Antenna>,
    #[serde(skip)]
    downlink_support: Option<Vec<bool>>,
}

impl Endpoint {
    pub fn new(designator: impl Into<String>, role: EndpointRole) -> Self {
        Self {
            designator: designator.into(),
            role,
            tilts_to_track: false,
            direct_downlink: false,
            self_relay: false,
            cluster_partner: None,
            replay_file: None,
            required_downlink_overhead: Vec::new(),
            conjunction: None,
            antennas: Vec::new(),
            downlink_support: None,
        }
    }

    pub fn user(designator: impl Into<String>) -> Self {
        Self::new(designator, EndpointRole::User)
    }

    pub fn relay(designator: impl Into<String>) -> Self {
        Self::new(designator, EndpointRole::Relay)
    }

    pub fn ground(designator: impl Into<String>) -> Self {
        Self::new(designator, EndpointRole::Ground)
    }

    pub fn with_antenna(mut self, antenna: Antenna) -> Self {
        self.antennas.push(antenna);
        self
    }

    pub fn is_user(&self) -> bool {
        self.role == EndpointRole::User
    }

    pub fn is_relay(&self) -> bool {
        self.role == EndpointRole::Relay
    }

    pub fn is_ground(&self) -> bool {
        self.role == EndpointRole::Ground
    }

    /// Relays must be able to offload what they receive.
    pub fn requires_downlink_support(&self) -> bool {
        self.is_relay()
    }

    pub fn has_supporting_downlink(&self, time_step: TimeStep) -> DownlinkSupport {
        if !self.requires_downlink_support() {
            return DownlinkSupport::NotApplicable;
        }
        let supported = self
            .downlink_support
            .as_ref()
            .and_then(|steps| steps.get(time_step).copied())
            .unwrap_or(false);
        if supported {
            DownlinkSupport::Supported
        } else {
            DownlinkSupport::Unsupported
        }
    }

    pub(crate) fn set_downlink_support(&mut self, steps: Vec<bool>) {
        self.downlink_support = Some(steps);
    }

    pub fn in_required_overhead(&self, time_step: TimeStep) -> bool {
        any_contains(&self.required_downlink_overhead, time_step)
    }

    pub fn validate(&self) -> Result<()> {
        if self.designator.is_empty() || self.designator.contains(char::is_whitespace) {
            return Err(LinkError::config(format!(
                "endpoint designator {:?} must be non-empty without whitespace",
                self.designator
            )));
        }

        let mut ids = HashSet::new();
        for antenna in &self.antennas {
            if !ids.insert(antenna.id.as_str()) {
                return Err(LinkError::config(format!(
                    "endpoint {} has duplicate antenna {}",
                    self.designator, antenna.id
                )));
            }
            antenna.validate().with_context(|| format!("endpoint {}", self.designator))?;
        }

        for window in &self.required_downlink_overhead {
            window.validate().with_context(|| format!("endpoint {}", self.designator))?;
        }
        if !self.required_downlink_overhead.is_empty() && !self.is_relay() {
            return Err(LinkError::config(format!(
                "endpoint {}: required downlink overhead only applies to relays",
                self.designator
            )));
        }
        if let Some(conjunction) = &self.conjunction {
            conjunction.validate().with_context(|| format!("endpoint {}", self.designator))?;
        }
        Ok(())
    }
}

/// Validate a full endpoint set: each endpoint, unique designators, and
/// references between endpoints.
pub fn validate_endpoints(endpoints: &[Endpoint]) -> Result<()> {
    let mut designators = HashSet::new();
    for endpoint in endpoints {
        endpoint.validate()?;
        if !designators.insert(endpoint.designator.as_str()) {
            return Err(LinkError::config(format!(
                "duplicate endpoint designator {}",
                endpoint.designator
            )));
        }
    }
    for endpoint in endpoints {
        for antenna in &endpoint.antennas {
            if let Some(unknown) = antenna
                .constraints
                .partners()
                .find(|p| *p != DEFAULT_PARTNER && !designators.contains(p))
            {
                return Err(LinkError::config(format!(
                    "endpoint {} antenna {}: constraints name unknown partner {}",
                    endpoint.designator, antenna.id, unknown
                )));
            }
        }
        if let Some(conjunction) = &endpoint.conjunction {
            if let Some(unknown) = Band::ALL
                .iter()
                .flat_map(|band| conjunction.thresholds(*band).senders())
                .find(|s| *s != DEFAULT_PARTNER && !designators.contains(s))
            {
                return Err(LinkError::config(format!(
                    "endpoint {}: conjunction thresholds name unknown sender {}",
                    endpoint.designator, unknown
                )));
            }
        }
        if let Some(partner) = &endpoint.cluster_partner {
            if !designators.contains(partner.as_str()) || partner == &endpoint.designator {
                return Err(LinkError::config(format!(
                    "endpoint {}: cluster partner {} is not another known endpoint",
                    endpoint.designator, partner
                )));
            }
        }
    }
    Ok(())
}
