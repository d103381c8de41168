//! RF conjunction detection
//!
//! Two senders are in conjunction at a receiver when their angular
//! separation, seen from the receiver, falls inside the exclusion band for a
//! given number of simultaneous senders. Band `N` covers
//! `(threshold[N-1], threshold[N]]`, so the bands for successive counts are
//! concentric and never overlap. Narrowband and wideband tables are
//! evaluated independently.

use crate::constraint::DEFAULT_PARTNER;
use crate::debug::DebugSink;
use crate::timeline::{any_contains, TimeStep, TimeWindow, Timeline};
use crate::{LinkError, Result, ResultExt};
use orbital_mechanics::PositionProvider;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    #[serde(rename = "NB")]
    Narrowband,
    #[serde(rename = "WB")]
    Wideband,
}

impl Band {
    pub const ALL: [Band; 2] = [Band::Narrowband, Band::Wideband];

    pub fn tag(self) -> &'static str {
        match self {
            Self::Narrowband => "NB",
            Self::Wideband => "WB",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "NB" => Some(Self::Narrowband),
            "WB" => Some(Self::Wideband),
            _ => None,
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One value per band
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PerBand<T> {
    pub narrowband: T,
    pub wideband: T,
}

impl<T> PerBand<T> {
    pub fn get(&self, band: Band) -> &T {
        match band {
            Band::Narrowband => &self.narrowband,
            Band::Wideband => &self.wideband,
        }
    }

    pub fn get_mut(&mut self, band: Band) -> &mut T {
        match band {
            Band::Narrowband => &mut self.narrowband,
            Band::Wideband => &mut self.wideband,
        }
    }
}

/// Exclusion angles (deg) keyed by sender designator or `DEFAULT`, then by
/// simultaneous-sender count.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConjunctionThresholds {
    entries: HashMap<String, BTreeMap<usize, f64>>,
}

impl ConjunctionThresholds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sender: impl Into<String>, table: BTreeMap<usize, f64>) -> Self {
        self.entries.insert(sender.into(), table);
        self
    }

    pub fn senders(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn for_sender(&self, designator: &str) -> Option<&BTreeMap<usize, f64>> {
        self.entries
            .get(designator)
            .or_else(|| self.entries.get(DEFAULT_PARTNER))
    }

    pub fn validate(&self) -> Result<()> {
        for (sender, table) in &self.entries {
            validate_table(table).with_context(|| format!("conjunction thresholds for {}", sender))?;
        }
        Ok(())
    }
}

fn validate_table(table: &BTreeMap<usize, f64>) -> Result<()> {
    let mut previous: Option<f64> = None;
    for (&count, &angle) in table {
        if count < 2 {
            return Err(LinkError::config(format!(
                "simultaneous sender count {} must be at least 2",
                count
            )));
        }
        if !(angle.is_finite() && (0.0..=180.0).contains(&angle)) {
            return Err(LinkError::config(format!(
                "exclusion angle {} for {} senders outside [0, 180]",
                angle, count
            )));
        }
        if previous.is_some_and(|p| angle <= p) {
            return Err(LinkError::config(format!(
                "exclusion angle {} for {} senders does not increase",
                angle, count
            )));
        }
        previous = Some(angle);
    }
    Ok(())
}

/// Conjunction settings of one receiving endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConjunctionReceiver {
    pub max_simultaneous_senders: usize,
    /// Link frequency bands checked for conjunction; empty means all
    #[serde(default)]
    pub eligible_bands: Vec<String>,
    #[serde(default)]
    pub narrowband: ConjunctionThresholds,
    #[serde(default)]
    pub wideband: ConjunctionThresholds,
    /// Steps the receiver wants checked; `None` checks the whole timeline
    #[serde(default)]
    pub check_windows: Option<Vec<TimeWindow>>,
    /// Persisted periods to use instead of detection
    #[serde(default)]
    pub replay_file: Option<PathBuf>,
}

impl ConjunctionReceiver {
    pub fn new(max_simultaneous_senders: usize) -> Self {
        Self {
            max_simultaneous_senders,
            eligible_bands: Vec::new(),
            narrowband: ConjunctionThresholds::default(),
            wideband: ConjunctionThresholds::default(),
            check_windows: None,
            replay_file: None,
        }
    }

    pub fn thresholds(&self, band: Band) -> &ConjunctionThresholds {
        match band {
            Band::Narrowband => &self.narrowband,
            Band::Wideband => &self.wideband,
        }
    }

    pub fn is_eligible(&self, frequency_band: &str) -> bool {
        self.eligible_bands.is_empty() || self.eligible_bands.iter().any(|b| b == frequency_band)
    }

    pub fn is_checkable(&self, time_step: TimeStep) -> bool {
        self.check_windows
            .as_ref()
            .map_or(true, |windows| any_contains(windows, time_step))
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_simultaneous_senders < 2 {
            return Err(LinkError::config(format!(
                "max_simultaneous_senders must be at least 2, got {}",
                self.max_simultaneous_senders
            )));
        }
        for band in Band::ALL {
            self.thresholds(band)
                .validate()
                .with_context(|| format!("{} conjunction", band))?;
        }
        for window in self.check_windows.iter().flatten() {
            window.validate().context("conjunction check window")?;
        }
        Ok(())
    }
}

/// Contiguous run of steps where two senders conflict at a receiver
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConjunctionPeriod {
    pub start: TimeStep,
    pub end: TimeStep,
    pub receiver: String,
    pub sender1: String,
    pub sender2: String,
    pub simultaneous_senders: usize,
    pub band: Band,
}

/// Whether `separation` lies in `(previous, exclusion]`. No lower bound
/// when `previous` is `None`; never inside when `exclusion` is `None`.
pub fn in_exclusion_band(separation: Option<f64>, previous: Option<f64>, exclusion: Option<f64>) -> bool {
    match (separation, exclusion) {
        (Some(sep), Some(limit)) => previous.map_or(true, |p| sep > p) && sep <= limit,
        _ => false,
    }
}

/// Lower bound for the next count: the largest threshold recorded so far
/// across both senders' tables.
pub fn carry_previous(
    previous: Option<f64>,
    count: usize,
    table1: Option<&BTreeMap<usize, f64>>,
    table2: Option<&BTreeMap<usize, f64>>,
) -> Option<f64> {
    [table1, table2]
        .into_iter()
        .flatten()
        .filter_map(|table| table.get(&count).copied())
        .chain(previous)
        .reduce(f64::max)
}

/// Inclusive `[start, end]` runs of `true`
pub fn spans(marks: &[bool]) -> Vec<(TimeStep, TimeStep)> {
    let mut result = Vec::new();
    let mut start = None;
    for (t, &marked) in marks.iter().enumerate() {
        match (marked, start) {
            (true, None) => start = Some(t),
            (false, Some(s)) => {
                result.push((s, t - 1));
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        result.push((s, marks.len() - 1));
    }
    result
}

/// Angular exclusion checks for sender pairs at one receiver.
pub struct ConjunctionDetector<'a, P: PositionProvider + ?Sized> {
    timeline: &'a Timeline,
    provider: &'a P,
}

impl<'a, P: PositionProvider + ?Sized> ConjunctionDetector<'a, P> {
    pub fn new(timeline: &'a Timeline, provider: &'a P) -> Self {
        Self { timeline, provider }
    }

    /// Steps where the pair falls inside band `count`, per band.
    ///
    /// `checkable` limits which steps are examined; `previous` is each
    /// band's lower bound carried from lower counts.
    #[allow(clippy::too_many_arguments)]
    pub fn mark_steps(
        &self,
        receiver: &str,
        settings: &ConjunctionReceiver,
        sender1: &str,
        sender2: &str,
        count: usize,
        previous: PerBand<Option<f64>>,
        checkable: &[bool],
        mut sink: Option<&mut DebugSink>,
    ) -> Result<PerBand<Vec<bool>>> {
        let steps = self.timeline.time_steps;
        let mut marks = PerBand {
            narrowband: vec![false; steps],
            wideband: vec![false; steps],
        };

        for t in self.timeline.steps() {
            if !checkable.get(t).copied().unwrap_or(false) {
                continue;
            }
            for offset in self.timeline.sample_offsets(t) {
                if Band::ALL.iter().all(|&band| marks.get(band)[t]) {
                    break;
                }

                let rx = self.provider.position(receiver, t, offset)?;
                let s1 = self.provider.position(sender1, t, offset)?;
                let s2 = self.provider.position(sender2, t, offset)?;
                let separation = crate::geometry::separation_deg(&rx, &s1, &s2);
                let farther = if s1.norm() >= s2.norm() { sender1 } else { sender2 };

                for band in Band::ALL {
                    if marks.get(band)[t] {
                        continue;
                    }
                    let exclusion = settings
                        .thresholds(band)
                        .for_sender(farther)
                        .and_then(|table| table.get(&count).copied());
                    if in_exclusion_band(separation, *previous.get(band), exclusion) {
                        marks.get_mut(band)[t] = true;
                        if let Some(sink) = sink.as_deref_mut() {
                            sink.line(&format!(
                                "CONJUNCTION {} {} {} {} {:.1} {} {} {:.4}",
                                receiver,
                                sender1,
                                sender2,
                                t,
                                offset,
                                count,
                                band,
                                separation.unwrap_or(f64::NAN)
                            ))?;
                        }
                    }
                }
            }
        }
        Ok(marks)
    }

    /// Conjunction periods for one sender pair across every count from 2 up
    /// to the receiver's maximum.
    pub fn detect(
        &self,
        receiver: &str,
        settings: &ConjunctionReceiver,
        sender1: &str,
        sender2: &str,
        checkable: &[bool],
        mut sink: Option<&mut DebugSink>,
    ) -> Result<Vec<ConjunctionPeriod>> {
        let mut periods = Vec::new();
        let mut previous: PerBand<Option<f64>> = PerBand::default();

        for count in 2..=settings.max_simultaneous_senders {
            let marks = self.mark_steps(
                receiver,
                settings,
                sender1,
                sender2,
                count,
                previous,
                checkable,
                sink.as_deref_mut(),
            )?;

            for band in Band::ALL {
                for (start, end) in spans(marks.get(band)) {
                    periods.push(ConjunctionPeriod {
                        start,
                        end,
                        receiver: receiver.to_string(),
                        sender1: sender1.to_string(),
                        sender2: sender2.to_string(),
                        simultaneous_senders: count,
                        band,
                    });
                }

                let thresholds = settings.thresholds(band);
                *previous.get_mut(band) = carry_previous(
                    *previous.get(band),
                    count,
                    thresholds.for_sender(sender1),
                    thresholds.for_sender(sender2),
                );
            }
        }
        Ok(periods)
    }
}
