//! Per-time-step link verdicts

use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of evaluating one link at one time step.
///
/// Everything except [`LinkStatus::Link`] names the first constraint that
/// failed. [`LinkStatus::Unknown`] only exists while a status array is being
/// filled; a finished link never contains it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkStatus {
    Link,
    MinGrazingAltitude,
    MaxRangeTransmit,
    MinRangeTransmit,
    MaxSunSeparationTransmit,
    MinSunSeparationTransmit,
    MaxSunSeparationReceive,
    MinSunSeparationReceive,
    MaxElevationReceive,
    MinElevationReceive,
    MaxElevationTransmit,
    MinElevationTransmit,
    MinSolarIntrusion,
    OutageTimeStep,
    FullyDedicatedTimeStep,
    NoSupportingDownlink,
    RequiredDownlinkOverhead,
    Unknown,
}

impl LinkStatus {
    pub const ALL: [LinkStatus; 18] = [
        Self::Link,
        Self::MinGrazingAltitude,
        Self::MaxRangeTransmit,
        Self::MinRangeTransmit,
        Self::MaxSunSeparationTransmit,
        Self::MinSunSeparationTransmit,
        Self::MaxSunSeparationReceive,
        Self::MinSunSeparationReceive,
        Self::MaxElevationReceive,
        Self::MinElevationReceive,
        Self::MaxElevationTransmit,
        Self::MinElevationTransmit,
        Self::MinSolarIntrusion,
        Self::OutageTimeStep,
        Self::FullyDedicatedTimeStep,
        Self::NoSupportingDownlink,
        Self::RequiredDownlinkOverhead,
        Self::Unknown,
    ];

    /// Integer encoding used by replay files
    pub fn code(self) -> i32 {
        match self {
            Self::Link => 0,
            Self::MinGrazingAltitude => 1,
            Self::MaxRangeTransmit => 2,
            Self::MinRangeTransmit => 3,
            Self::MaxSunSeparationTransmit => 4,
            Self::MinSunSeparationTransmit => 5,
            Self::MaxSunSeparationReceive => 6,
            Self::MinSunSeparationReceive => 7,
            Self::MaxElevationReceive => 8,
            Self::MinElevationReceive => 9,
            Self::MaxElevationTransmit => 10,
            Self::MinElevationTransmit => 11,
            Self::MinSolarIntrusion => 12,
            Self::OutageTimeStep => 13,
            Self::FullyDedicatedTimeStep => 14,
            Self::NoSupportingDownlink => 15,
            Self::RequiredDownlinkOverhead => 16,
            Self::Unknown => -1,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|s| s.code() == code)
    }

    pub fn is_link(self) -> bool {
        self == Self::Link
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Link => "LINK",
            Self::MinGrazingAltitude => "MIN_GRAZING_ALTITUDE",
            Self::MaxRangeTransmit => "MAX_RANGE_TRANSMIT",
            Self::MinRangeTransmit => "MIN_RANGE_TRANSMIT",
            Self::MaxSunSeparationTransmit => "MAX_SUN_SEPARATION_TRANSMIT",
            Self::MinSunSeparationTransmit => "MIN_SUN_SEPARATION_TRANSMIT",
            Self::MaxSunSeparationReceive => "MAX_SUN_SEPARATION_RECEIVE",
            Self::MinSunSeparationReceive => "MIN_SUN_SEPARATION_RECEIVE",
            Self::MaxElevationReceive => "MAX_ELEVATION_RECEIVE",
            Self::MinElevationReceive => "MIN_ELEVATION_RECEIVE",
            Self::MaxElevationTransmit => "MAX_ELEVATION_TRANSMIT",
            Self::MinElevationTransmit => "MIN_ELEVATION_TRANSMIT",
            Self::MinSolarIntrusion => "MIN_SOLAR_INTRUSION",
            Self::OutageTimeStep => "OUTAGE_TIME_STEP",
            Self::FullyDedicatedTimeStep => "FULLY_DEDICATED_TIME_STEP",
            Self::NoSupportingDownlink => "NO_SUPPORTING_DOWNLINK",
            Self::RequiredDownlinkOverhead => "REQUIRED_DOWNLINK_OVERHEAD",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
