//! Link Feasibility Library
//!
//! Decides, for every time step of a mission timeline, whether a directed
//! link between two antennas is usable, and detects RF conjunctions where two
//! transmitters crowd a shared receiver's angular exclusion zone.
//!
//! # Pipeline
//!
//! ```text
//! Scenario ──► LinkGraphBuilder ──┬─► LinkEvaluator ─────┐
//!                                 │   (or link replay)   ├─► LinkGraph
//!                                 └─► ConjunctionDetector┘
//!                                     (or conjunction replay)
//! ```
//!
//! Link categories are built in a fixed order: relay downlinks, relay
//! multihop, satellite crosslinks, satellite direct downlinks, satellite
//! self-relay. Relay downlinks come first because crosslink and multihop
//! feasibility depends on whether the receiving relay can offload.
//!
//! Positions come from any [`orbital_mechanics::PositionProvider`].

use orbital_mechanics::OrbitalError;
use thiserror::Error;

pub mod antenna;
pub mod builder;
pub mod config;
pub mod conjunction;
pub mod constraint;
pub mod debug;
pub mod endpoint;
pub mod evaluator;
pub mod geometry;
pub mod link;
pub mod persist;
pub mod replay;
pub mod status;
pub mod timeline;

pub use antenna::{Antenna, AntennaFrame, Dedication};
pub use builder::{BuildSummary, LinkGraph, LinkGraphBuilder};
pub use config::{AnalysisConfig, EphemerisSource, Scenario};
pub use conjunction::{
    Band, ConjunctionDetector, ConjunctionPeriod, ConjunctionReceiver, ConjunctionThresholds,
};
pub use constraint::{AzimuthSector, ConstraintTable, PairConstraints, Thresholds, DEFAULT_PARTNER};
pub use debug::DebugSink;
pub use endpoint::{DownlinkSupport, Endpoint, EndpointRole};
pub use evaluator::{LinkEnd, LinkEvaluator};
pub use link::{AntennaRef, Link, LinkId, LinkKind, LinkOverhead};
pub use status::LinkStatus;
pub use timeline::{TimeStep, TimeWindow, Timeline};

/// Machine-readable error category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    Replay,
    IncompleteReplay,
    Position,
    Io,
}

#[derive(Error, Debug)]
pub enum LinkError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Malformed replay row {source_name}:{line}: {message}")]
    Replay {
        source_name: String,
        line: usize,
        message: String,
    },
    #[error("Incomplete replay for {link}: time step {time_step} has no status")]
    IncompleteReplay { link: String, time_step: TimeStep },
    #[error("Position lookup failed: {0}")]
    Position(#[from] OrbitalError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<LinkError>,
    },
}

impl LinkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) | Self::Json(_) => ErrorKind::Config,
            Self::Replay { .. } => ErrorKind::Replay,
            Self::IncompleteReplay { .. } => ErrorKind::IncompleteReplay,
            Self::Position(_) => ErrorKind::Position,
            Self::Io(_) => ErrorKind::Io,
            Self::Context { source, .. } => source.kind(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;

/// Attach caller context to a failure while keeping its kind.
pub trait ResultExt<T> {
    fn context(self, context: impl Into<String>) -> Result<T>;

    fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T>;
}

impl<T, E: Into<LinkError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| LinkError::Context {
            context: context.into(),
            source: Box::new(e.into()),
        })
    }

    fn with_context<C: Into<String>>(self, f: impl FnOnce() -> C) -> Result<T> {
        self.map_err(|e| LinkError::Context {
            context: f().into(),
            source: Box::new(e.into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_keeps_kind() {
        let err: Result<()> = Err(LinkError::IncompleteReplay {
            link: "SAT-1/A -> RLY-1/B".to_string(),
            time_step: 4,
        });
        let wrapped = err.context("replaying crosslinks").unwrap_err();
        assert_eq!(wrapped.kind(), ErrorKind::IncompleteReplay);
        let message = wrapped.to_string();
        assert!(message.starts_with("replaying crosslinks: "));
        assert!(message.contains("time step 4"));
    }

    #[test]
    fn test_position_errors_convert() {
        let err: Result<()> = Err(OrbitalError::UnknownEndpoint("GS-9".to_string()))
            .with_context(|| "evaluating GS-9");
        assert_eq!(err.unwrap_err().kind(), ErrorKind::Position);
    }
}
