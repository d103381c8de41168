//! Writers for the replay formats
//!
//! Link rows: `SENDER SENDER_ANTENNA RECEIVER RECEIVER_ANTENNA TIME STATUS`
//! with one row per materialized link per time step. Conjunction rows:
//! `RECEIVER SENDER1 SENDER2 START END SIMULTANEOUS_SENDERS BAND`. Times are
//! seconds since scenario start; statuses use [`LinkStatus::code`].
//!
//! [`LinkStatus::code`]: crate::LinkStatus::code

use crate::builder::LinkGraph;
use crate::conjunction::ConjunctionPeriod;
use crate::link::Link;
use crate::timeline::Timeline;
use crate::{Result, ResultExt};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

pub const LINK_HEADER: &str = "SENDER SENDER_ANTENNA RECEIVER RECEIVER_ANTENNA TIME STATUS";
pub const CONJUNCTION_HEADER: &str = "RECEIVER SENDER1 SENDER2 START END SIMULTANEOUS_SENDERS BAND";

pub fn write_links<'l, W: Write>(
    mut writer: W,
    timeline: &Timeline,
    links: impl IntoIterator<Item = &'l Link>,
) -> Result<()> {
    writeln!(writer, "{}", LINK_HEADER)?;
    for link in links {
        for (t, status) in link.statuses.iter().enumerate() {
            writeln!(
                writer,
                "{} {} {} {} {} {}",
                link.transmitter_designator,
                link.transmitter_antenna,
                link.receiver_designator,
                link.receiver_antenna,
                timeline.time_value(t),
                status.code()
            )?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_conjunctions<'p, W: Write>(
    mut writer: W,
    timeline: &Timeline,
    periods: impl IntoIterator<Item = &'p ConjunctionPeriod>,
) -> Result<()> {
    writeln!(writer, "{}", CONJUNCTION_HEADER)?;
    for period in periods {
        writeln!(
            writer,
            "{} {} {} {} {} {} {}",
            period.receiver,
            period.sender1,
            period.sender2,
            timeline.time_value(period.start),
            timeline.time_value(period.end),
            period.simultaneous_senders,
            period.band
        )?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_links(path: impl AsRef<Path>, graph: &LinkGraph) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_links(BufWriter::new(file), graph.timeline(), graph.links())?;
    info!("Saved {} links to {:?}", graph.links().len(), path);
    Ok(())
}

pub fn save_conjunctions(path: impl AsRef<Path>, graph: &LinkGraph) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    write_conjunctions(BufWriter::new(file), graph.timeline(), graph.conjunctions())?;
    info!("Saved {} conjunction periods to {:?}", graph.conjunctions().count(), path);
    Ok(())
}
