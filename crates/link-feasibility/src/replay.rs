//! Replay of persisted link statuses and conjunction periods
//!
//! Replayed results must be indistinguishable from computed ones. A replayed
//! `LINK` is re-checked against the live outage and dedication schedule, and
//! `REQUIRED_DOWNLINK_OVERHEAD` is read back as `LINK` so the builder's
//! overhead pass can re-derive it.

use crate::conjunction::{Band, ConjunctionPeriod};
use crate::evaluator::{schedule_status, LinkEnd};
use crate::status::LinkStatus;
use crate::timeline::{TimeStep, Timeline};
use crate::{LinkError, Result, ResultExt};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LinkKey {
    transmitter: String,
    transmitter_antenna: String,
    receiver: String,
    receiver_antenna: String,
}

/// Iterate `(line_number, fields)` for every data row, skipping the header
/// line and blank lines.
fn data_rows<R: BufRead>(reader: R) -> impl Iterator<Item = std::io::Result<(usize, String)>> {
    reader
        .lines()
        .enumerate()
        .map(|(i, line)| line.map(|l| (i + 1, l)))
        .filter(|row| !matches!(row, Ok((_, l)) if l.trim().is_empty()))
        .skip(1)
}

fn malformed(source_name: &str, line: usize, message: impl Into<String>) -> LinkError {
    LinkError::Replay {
        source_name: source_name.to_string(),
        line,
        message: message.into(),
    }
}

fn parse_time(source_name: &str, line: usize, field: &str, timeline: &Timeline) -> Result<TimeStep> {
    let value: f64 = field
        .parse()
        .map_err(|_| malformed(source_name, line, format!("time {:?} is not a number", field)))?;
    timeline
        .time_step_of(value)
        .ok_or_else(|| malformed(source_name, line, format!("time {} outside the timeline", value)))
}

/// Persisted link statuses keyed by directed antenna pair
#[derive(Debug, Clone, Default)]
pub struct LinkReplayTable {
    source_name: String,
    rows: HashMap<LinkKey, Vec<(TimeStep, LinkStatus)>>,
}

impl LinkReplayTable {
    pub fn parse<R: BufRead>(source_name: &str, reader: R, timeline: &Timeline) -> Result<Self> {
        let mut rows: HashMap<LinkKey, Vec<(TimeStep, LinkStatus)>> = HashMap::new();
        let mut seen: HashMap<(LinkKey, TimeStep), LinkStatus> = HashMap::new();

        for row in data_rows(reader) {
            let (line, text) = row?;
            let fields: Vec<&str> = text.split_whitespace().collect();
            if fields.len() != 6 {
                return Err(malformed(
                    source_name,
                    line,
                    format!("expected 6 fields, found {}", fields.len()),
                ));
            }

            let time_step = parse_time(source_name, line, fields[4], timeline)?;
            let status = fields[5]
                .parse::<i32>()
                .ok()
                .and_then(LinkStatus::from_code)
                .filter(|s| *s != LinkStatus::Unknown)
                .ok_or_else(|| malformed(source_name, line, format!("unknown status code {:?}", fields[5])))?;

            let key = LinkKey {
                transmitter: fields[0].to_string(),
                transmitter_antenna: fields[1].to_string(),
                receiver: fields[2].to_string(),
                receiver_antenna: fields[3].to_string(),
            };
            match seen.insert((key.clone(), time_step), status) {
                Some(previous) if previous != status => {
                    return Err(malformed(
                        source_name,
                        line,
                        format!("conflicting statuses {} and {} for time step {}", previous, status, time_step),
                    ));
                }
                Some(_) => continue,
                None => {}
            }
            rows.entry(key).or_default().push((time_step, status));
        }

        Ok(Self {
            source_name: source_name.to_string(),
            rows,
        })
    }

    pub fn load(path: impl AsRef<Path>, timeline: &Timeline) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening link replay {}", path.display()))?;
        let table = Self::parse(&path.display().to_string(), BufReader::new(file), timeline)?;
        info!("Loaded link replay {:?} ({} antenna pairs)", path, table.rows.len());
        Ok(table)
    }

    pub fn pair_count(&self) -> usize {
        self.rows.len()
    }

    /// Status array for one directed pair, or `None` when the file has no
    /// rows for it (the pair never linked).
    pub fn statuses(&self, tx: LinkEnd<'_>, rx: LinkEnd<'_>, timeline: &Timeline) -> Result<Option<Vec<LinkStatus>>> {
        let key = LinkKey {
            transmitter: tx.endpoint.designator.clone(),
            transmitter_antenna: tx.antenna.id.clone(),
            receiver: rx.endpoint.designator.clone(),
            receiver_antenna: rx.antenna.id.clone(),
        };
        let Some(rows) = self.rows.get(&key) else {
            debug!(
                "No replay rows for {}/{} -> {}/{} in {}",
                key.transmitter, key.transmitter_antenna, key.receiver, key.receiver_antenna, self.source_name
            );
            return Ok(None);
        };

        let mut statuses = vec![LinkStatus::Unknown; timeline.time_steps];
        for &(t, status) in rows {
            statuses[t] = match status {
                LinkStatus::Link | LinkStatus::RequiredDownlinkOverhead => {
                    schedule_status(tx, rx, t).unwrap_or(LinkStatus::Link)
                }
                other => other,
            };
        }

        if let Some(t) = statuses.iter().position(|s| *s == LinkStatus::Unknown) {
            return Err(LinkError::IncompleteReplay {
                link: format!(
                    "{}/{} -> {}/{}",
                    key.transmitter, key.transmitter_antenna, key.receiver, key.receiver_antenna
                ),
                time_step: t,
            });
        }
        Ok(Some(statuses))
    }
}

/// Persisted conjunction periods keyed by receiver
#[derive(Debug, Clone, Default)]
pub struct ConjunctionReplayTable {
    periods: HashMap<String, Vec<ConjunctionPeriod>>,
}

impl ConjunctionReplayTable {
    pub fn parse<R: BufRead>(source_name: &str, reader: R, timeline: &Timeline) -> Result<Self> {
        let mut periods: HashMap<String, Vec<ConjunctionPeriod>> = HashMap::new();

        for row in data_rows(reader) {
            let (line, text) = row?;
            let fields: Vec<&str> = text.split_whitespace().collect();
            if fields.len() != 7 {
                return Err(malformed(
                    source_name,
                    line,
                    format!("expected 7 fields, found {}", fields.len()),
                ));
            }

            let start = parse_time(source_name, line, fields[3], timeline)?;
            let end = parse_time(source_name, line, fields[4], timeline)?;
            if start > end {
                return Err(malformed(source_name, line, format!("start {} after end {}", start, end)));
            }
            let simultaneous_senders = fields[5]
                .parse::<usize>()
                .ok()
                .filter(|n| *n >= 2)
                .ok_or_else(|| malformed(source_name, line, format!("bad sender count {:?}", fields[5])))?;
            let band = Band::from_tag(fields[6])
                .ok_or_else(|| malformed(source_name, line, format!("bad band tag {:?}", fields[6])))?;

            periods.entry(fields[0].to_string()).or_default().push(ConjunctionPeriod {
                start,
                end,
                receiver: fields[0].to_string(),
                sender1: fields[1].to_string(),
                sender2: fields[2].to_string(),
                simultaneous_senders,
                band,
            });
        }
        Ok(Self { periods })
    }

    pub fn load(path: impl AsRef<Path>, timeline: &Timeline) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| format!("opening conjunction replay {}", path.display()))?;
        let table = Self::parse(&path.display().to_string(), BufReader::new(file), timeline)?;
        info!("Loaded conjunction replay {:?} ({} receivers)", path, table.periods.len());
        Ok(table)
    }

    pub fn periods_for(&self, receiver: &str) -> Vec<ConjunctionPeriod> {
        self.periods.get(receiver).cloned().unwrap_or_default()
    }
}

/// Parsed replay files, reused for every pair that names the same path
#[derive(Debug, Default)]
pub struct ReplayCache {
    links: HashMap<PathBuf, LinkReplayTable>,
    conjunctions: HashMap<PathBuf, ConjunctionReplayTable>,
}

impl ReplayCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn links(&mut self, path: &Path, timeline: &Timeline) -> Result<&LinkReplayTable> {
        if !self.links.contains_key(path) {
            let table = LinkReplayTable::load(path, timeline)?;
            self.links.insert(path.to_path_buf(), table);
        }
        Ok(&self.links[path])
    }

    pub fn conjunctions(&mut self, path: &Path, timeline: &Timeline) -> Result<&ConjunctionReplayTable> {
        if !self.conjunctions.contains_key(path) {
            let table = ConjunctionReplayTable::load(path, timeline)?;
            self.conjunctions.insert(path.to_path_buf(), table);
        }
        Ok(&self.conjunctions[path])
    }
}
