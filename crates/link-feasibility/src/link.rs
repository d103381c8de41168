//! Materialized links

use crate::status::LinkStatus;
use crate::timeline::TimeStep;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index into [`crate::LinkGraph::links`]
pub type LinkId = usize;

/// Link category, in build order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    /// Relay satellite to ground station
    RelayDownlink,
    /// Relay satellite to relay satellite
    Multihop,
    /// User satellite to relay satellite
    Crosslink,
    /// User satellite straight to ground station
    DirectDownlink,
    /// User satellite to user satellite, no relay in between
    SelfRelay,
}

impl LinkKind {
    pub const BUILD_ORDER: [LinkKind; 5] = [
        Self::RelayDownlink,
        Self::Multihop,
        Self::Crosslink,
        Self::DirectDownlink,
        Self::SelfRelay,
    ];
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::RelayDownlink => "relay downlink",
            Self::Multihop => "multihop",
            Self::Crosslink => "crosslink",
            Self::DirectDownlink => "direct downlink",
            Self::SelfRelay => "self-relay",
        };
        f.write_str(name)
    }
}

/// Position of an antenna in the graph's endpoint list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AntennaRef {
    pub endpoint: usize,
    pub antenna: usize,
}

/// Scheduling overhead carried alongside the status array
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkOverhead {
    /// Time the receiving antenna needs to acquire this transmitter
    pub acquisition_seconds: f64,
    /// Steps forced to `RequiredDownlinkOverhead`
    pub required_downlink_steps: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub kind: LinkKind,
    pub transmitter: AntennaRef,
    pub receiver: AntennaRef,
    pub transmitter_designator: String,
    pub transmitter_antenna: String,
    pub receiver_designator: String,
    pub receiver_antenna: String,
    pub band: String,
    pub statuses: Vec<LinkStatus>,
    pub overhead: LinkOverhead,
}

impl Link {
    pub fn status(&self, time_step: TimeStep) -> LinkStatus {
        self.statuses
            .get(time_step)
            .copied()
            .unwrap_or(LinkStatus::Unknown)
    }

    pub fn is_link_at(&self, time_step: TimeStep) -> bool {
        self.status(time_step).is_link()
    }

    pub fn link_steps(&self) -> usize {
        self.statuses.iter().filter(|s| s.is_link()).count()
    }

    pub fn first_unknown(&self) -> Option<TimeStep> {
        self.statuses.iter().position(|s| *s == LinkStatus::Unknown)
    }

    /// `SAT-1/KA-1 -> RLY-1/KA-2`
    pub fn label(&self) -> String {
        format!(
            "{}/{} -> {}/{}",
            self.transmitter_designator,
            self.transmitter_antenna,
            self.receiver_designator,
            self.receiver_antenna
        )
    }
}
