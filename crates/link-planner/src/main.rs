//! Link Planning CLI
//!
//! Builds the link graph for a scenario and writes link statuses and
//! conjunction periods in the replay formats.
//!
//! Usage:
//!   plan-links --scenario scenarios/relay-net.json \
//!              --links-out out/links.txt \
//!              --conjunctions-out out/conjunctions.txt

use anyhow::{Context, Result};
use clap::Parser;
use link_feasibility::{persist, DebugSink, LinkGraphBuilder, Scenario};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "plan-links",
    about = "Compute link feasibility and RF conjunctions for SX9-Orbital relay networks"
)]
struct Args {
    /// Scenario JSON file
    #[arg(short, long)]
    scenario: PathBuf,

    /// Link status output (replay format)
    #[arg(short, long, default_value = "links.txt")]
    links_out: PathBuf,

    /// Conjunction period output (replay format)
    #[arg(short, long, default_value = "conjunctions.txt")]
    conjunctions_out: PathBuf,

    /// Per-sample diagnostic output
    #[arg(long)]
    debug_out: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("{}", "=".repeat(60));
    info!("SX9-Orbital Link Planner");
    info!("{}", "=".repeat(60));

    let scenario = Scenario::load(&args.scenario)?;
    scenario
        .validate()
        .with_context(|| format!("invalid scenario {:?}", args.scenario))?;
    let provider = scenario.provider()?;

    let mut builder = LinkGraphBuilder::new(&scenario.analysis, &*provider);
    if let Some(path) = &args.debug_out {
        builder = builder.with_debug_sink(DebugSink::create(path)?);
    }
    let graph = builder.build(scenario.endpoints.clone())?;

    persist::save_links(&args.links_out, &graph)?;
    persist::save_conjunctions(&args.conjunctions_out, &graph)?;

    // Summary
    let summary = graph.summary();
    info!("{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!("Total links: {}", summary.total_links());
    for (kind, count) in &summary.links_by_kind {
        info!("  {}: {} links", kind, count);
    }
    info!("Link-steps by status:");
    for (status, count) in &summary.status_counts {
        info!("  {:28} {}", status.label(), count);
    }
    info!("Conjunction periods: {}", summary.conjunction_periods);

    Ok(())
}
