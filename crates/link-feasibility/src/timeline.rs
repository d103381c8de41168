//! Discretized mission timeline

use crate::{LinkError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Index into the fixed-resolution timeline
pub type TimeStep = usize;

/// Fixed-resolution timeline with an optional finer sub-sampling interval.
///
/// `additional_check_seconds` is only used for geometric refinement inside a
/// step; zero disables sub-sampling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub time_steps: usize,
    pub seconds_per_time_step: f64,
    #[serde(default)]
    pub additional_check_seconds: f64,
}

impl Timeline {
    pub fn new(time_steps: usize, seconds_per_time_step: f64, additional_check_seconds: f64) -> Self {
        Self {
            time_steps,
            seconds_per_time_step,
            additional_check_seconds,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.time_steps == 0 {
            return Err(LinkError::config("timeline has no time steps"));
        }
        if !(self.seconds_per_time_step.is_finite() && self.seconds_per_time_step > 0.0) {
            return Err(LinkError::config(format!(
                "seconds_per_time_step must be positive, got {}",
                self.seconds_per_time_step
            )));
        }
        if !(self.additional_check_seconds.is_finite() && self.additional_check_seconds >= 0.0) {
            return Err(LinkError::config(format!(
                "additional_check_seconds must be non-negative, got {}",
                self.additional_check_seconds
            )));
        }
        Ok(())
    }

    pub fn steps(&self) -> Range<TimeStep> {
        0..self.time_steps
    }

    pub fn is_last(&self, time_step: TimeStep) -> bool {
        time_step + 1 >= self.time_steps
    }

    /// Sub-sample offsets (seconds) inside `time_step`: 0, then every
    /// `additional_check_seconds` while strictly inside the step. The final
    /// step has nothing to interpolate toward and is sampled at 0 only.
    pub fn sample_offsets(&self, time_step: TimeStep) -> SampleOffsets {
        let interval = if self.is_last(time_step) {
            0.0
        } else {
            self.additional_check_seconds
        };
        SampleOffsets {
            index: 0,
            interval,
            limit: self.seconds_per_time_step,
        }
    }

    /// Seconds since scenario start
    pub fn time_value(&self, time_step: TimeStep) -> f64 {
        time_step as f64 * self.seconds_per_time_step
    }

    /// Inverse of [`Timeline::time_value`], rounded to the nearest step.
    pub fn time_step_of(&self, value: f64) -> Option<TimeStep> {
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        let step = (value / self.seconds_per_time_step).round() as usize;
        (step < self.time_steps).then_some(step)
    }
}

/// Iterator over sub-sample offsets within one step
#[derive(Debug, Clone)]
pub struct SampleOffsets {
    index: usize,
    interval: f64,
    limit: f64,
}

impl Iterator for SampleOffsets {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.index > 0 && self.interval <= 0.0 {
            return None;
        }
        let offset = self.index as f64 * self.interval;
        if self.index > 0 && offset >= self.limit {
            return None;
        }
        self.index += 1;
        Some(offset)
    }
}

/// Closed interval of time steps `[start, end]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: TimeStep,
    pub end: TimeStep,
}

impl TimeWindow {
    pub fn new(start: TimeStep, end: TimeStep) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time_step: TimeStep) -> bool {
        (self.start..=self.end).contains(&time_step)
    }

    pub fn validate(&self) -> Result<()> {
        if self.start > self.end {
            return Err(LinkError::config(format!(
                "window start {} after end {}",
                self.start, self.end
            )));
        }
        Ok(())
    }
}

pub(crate) fn any_contains(windows: &[TimeWindow], time_step: TimeStep) -> bool {
    windows.iter().any(|w| w.contains(time_step))
}
