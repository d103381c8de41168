//! Link graph assembly
//!
//! Enumerates every candidate antenna pair per link category, evaluates or
//! replays it, and collects the links that are usable at least once. Relay
//! downlinks are built first: their statuses, after the required-overhead
//! pass, decide whether each relay can offload traffic at a given step, and
//! multihop and crosslink evaluation depends on that. Conjunctions are
//! detected last, over the finished links.

use crate::conjunction::{ConjunctionDetector, ConjunctionPeriod};
use crate::config::AnalysisConfig;
use crate::constraint::PairConstraints;
use crate::debug::DebugSink;
use crate::endpoint::{validate_endpoints, Endpoint};
use crate::evaluator::{LinkEnd, LinkEvaluator};
use crate::link::{AntennaRef, Link, LinkId, LinkKind, LinkOverhead};
use crate::replay::ReplayCache;
use crate::status::LinkStatus;
use crate::timeline::Timeline;
use crate::{LinkError, Result, ResultExt};
use orbital_mechanics::PositionProvider;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Finished links and conjunction periods, read-only
#[derive(Debug, Clone)]
pub struct LinkGraph {
    timeline: Timeline,
    endpoints: Vec<Endpoint>,
    links: Vec<Link>,
    conjunctions: Vec<Vec<ConjunctionPeriod>>,
}

impl LinkGraph {
    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn endpoint(&self, designator: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.designator == designator)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id)
    }

    pub fn links_of_kind(&self, kind: LinkKind) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(move |l| l.kind == kind)
    }

    pub fn find_link(&self, label: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.label() == label)
    }

    /// Every conjunction period, grouped by receiver in endpoint order
    pub fn conjunctions(&self) -> impl Iterator<Item = &ConjunctionPeriod> {
        self.conjunctions.iter().flatten()
    }

    pub fn conjunctions_for(&self, designator: &str) -> &[ConjunctionPeriod] {
        self.endpoints
            .iter()
            .position(|e| e.designator == designator)
            .map(|i| self.conjunctions[i].as_slice())
            .unwrap_or(&[])
    }

    pub fn summary(&self) -> BuildSummary {
        let mut summary = BuildSummary {
            conjunction_periods: self.conjunctions().count(),
            ..Default::default()
        };
        for link in &self.links {
            *summary.links_by_kind.entry(link.kind).or_default() += 1;
            for status in &link.statuses {
                *summary.status_counts.entry(*status).or_default() += 1;
            }
        }
        summary
    }
}

/// Counts reported after a build
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildSummary {
    pub links_by_kind: BTreeMap<LinkKind, usize>,
    pub status_counts: BTreeMap<LinkStatus, usize>,
    pub conjunction_periods: usize,
}

impl BuildSummary {
    pub fn total_links(&self) -> usize {
        self.links_by_kind.values().sum()
    }
}

/// Directed endpoint pairs that may carry a link of `kind`
fn candidate_pairs(kind: LinkKind, endpoints: &[Endpoint]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for (i, tx) in endpoints.iter().enumerate() {
        for (j, rx) in endpoints.iter().enumerate() {
            if i == j {
                continue;
            }
            let eligible = match kind {
                LinkKind::RelayDownlink => tx.is_relay() && rx.is_ground(),
                LinkKind::Multihop => tx.is_relay() && rx.is_relay(),
                LinkKind::Crosslink => tx.is_user() && rx.is_relay(),
                LinkKind::DirectDownlink => tx.is_user() && tx.direct_downlink && rx.is_ground(),
                LinkKind::SelfRelay => tx.is_user() && rx.is_user() && tx.self_relay && rx.self_relay,
            };
            if eligible {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

/// Link kinds whose transmitters compete at a receiver of this role
fn conjunction_kinds(receiver: &Endpoint) -> &'static [LinkKind] {
    if receiver.is_relay() {
        &[LinkKind::Crosslink]
    } else if receiver.is_ground() {
        &[LinkKind::RelayDownlink, LinkKind::DirectDownlink]
    } else {
        &[]
    }
}

pub struct LinkGraphBuilder<'a, P: PositionProvider + ?Sized> {
    config: &'a AnalysisConfig,
    provider: &'a P,
    sink: Option<DebugSink>,
    cache: ReplayCache,
}

impl<'a, P: PositionProvider + ?Sized> LinkGraphBuilder<'a, P> {
    pub fn new(config: &'a AnalysisConfig, provider: &'a P) -> Self {
        Self {
            config,
            provider,
            sink: None,
            cache: ReplayCache::new(),
        }
    }

    pub fn with_debug_sink(mut self, sink: DebugSink) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(mut self, mut endpoints: Vec<Endpoint>) -> Result<LinkGraph> {
        self.config.validate()?;
        validate_endpoints(&endpoints)?;

        let mut links: Vec<Link> = Vec::new();
        for kind in LinkKind::BUILD_ORDER {
            let before = links.len();
            for (i, j) in candidate_pairs(kind, &endpoints) {
                for a in 0..endpoints[i].antennas.len() {
                    for b in 0..endpoints[j].antennas.len() {
                        let tx = AntennaRef { endpoint: i, antenna: a };
                        let rx = AntennaRef { endpoint: j, antenna: b };
                        if let Some(mut link) = self.build_pair(kind, &endpoints, tx, rx)? {
                            link.id = links.len();
                            links.push(link);
                        }
                    }
                }
            }
            info!("Built {} {} links", links.len() - before, kind);

            if kind == LinkKind::RelayDownlink {
                apply_required_overhead(&mut links, &endpoints);
                resolve_downlink_support(&mut endpoints, &links, &self.config.timeline);
            }
        }

        let conjunctions = if endpoints.iter().any(Endpoint::is_relay) {
            self.build_conjunctions(&endpoints, &links)?
        } else {
            info!("No relays in scenario, skipping conjunction detection");
            vec![Vec::new(); endpoints.len()]
        };

        for link in &links {
            endpoints[link.transmitter.endpoint].antennas[link.transmitter.antenna]
                .transmit_links
                .push(link.id);
            endpoints[link.receiver.endpoint].antennas[link.receiver.antenna]
                .receive_links
                .push(link.id);
        }

        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }

        Ok(LinkGraph {
            timeline: self.config.timeline,
            endpoints,
            links,
            conjunctions,
        })
    }

    fn build_pair(
        &mut self,
        kind: LinkKind,
        endpoints: &[Endpoint],
        tx_ref: AntennaRef,
        rx_ref: AntennaRef,
    ) -> Result<Option<Link>> {
        let timeline = &self.config.timeline;
        let tx_endpoint = &endpoints[tx_ref.endpoint];
        let rx_endpoint = &endpoints[rx_ref.endpoint];
        let tx = LinkEnd::new(tx_endpoint, &tx_endpoint.antennas[tx_ref.antenna]);
        let rx = LinkEnd::new(rx_endpoint, &rx_endpoint.antennas[rx_ref.antenna]);
        let label = format!(
            "{}/{} -> {}/{}",
            tx_endpoint.designator, tx.antenna.id, rx_endpoint.designator, rx.antenna.id
        );

        let Some(band) = tx.antenna.matching_band(rx.antenna) else {
            debug!("Skipping {} {}: no common frequency band", kind, label);
            return Ok(None);
        };

        let statuses = match &tx_endpoint.replay_file {
            Some(path) => {
                let replayed = self
                    .cache
                    .links(path, timeline)?
                    .statuses(tx, rx, timeline)
                    .with_context(|| format!("replaying {} {}", kind, label))?;
                match replayed {
                    Some(statuses) => statuses,
                    None => return Ok(None),
                }
            }
            None => {
                let constraints = PairConstraints::merge(
                    &tx.antenna.constraints.for_partner(&rx_endpoint.designator),
                    &rx.antenna.constraints.for_partner(&tx_endpoint.designator),
                );
                LinkEvaluator::new(self.config, self.provider)
                    .evaluate(tx, rx, &constraints, self.sink.as_mut())
                    .with_context(|| format!("evaluating {} {}", kind, label))?
            }
        };

        let link = Link {
            id: 0,
            kind,
            transmitter: tx_ref,
            receiver: rx_ref,
            transmitter_designator: tx_endpoint.designator.clone(),
            transmitter_antenna: tx.antenna.id.clone(),
            receiver_designator: rx_endpoint.designator.clone(),
            receiver_antenna: rx.antenna.id.clone(),
            band: band.to_string(),
            statuses,
            overhead: LinkOverhead {
                acquisition_seconds: rx.antenna.acquisition_seconds,
                required_downlink_steps: 0,
            },
        };
        if let Some(time_step) = link.first_unknown() {
            return Err(LinkError::IncompleteReplay { link: label, time_step });
        }

        let usable = link.link_steps();
        if usable == 0 {
            debug!("{} {} never links", kind, label);
            return Ok(None);
        }
        debug!("{} {}: {} of {} steps link", kind, label, usable, link.statuses.len());
        Ok(Some(link))
    }

    fn build_conjunctions(
        &mut self,
        endpoints: &[Endpoint],
        links: &[Link],
    ) -> Result<Vec<Vec<ConjunctionPeriod>>> {
        let timeline = &self.config.timeline;
        let detector = ConjunctionDetector::new(timeline, self.provider);
        let mut all = vec![Vec::new(); endpoints.len()];

        for (r, receiver) in endpoints.iter().enumerate() {
            let Some(settings) = &receiver.conjunction else {
                continue;
            };

            let mut periods = if let Some(path) = &settings.replay_file {
                self.cache
                    .conjunctions(path, timeline)
                    .with_context(|| format!("replaying conjunctions for {}", receiver.designator))?
                    .periods_for(&receiver.designator)
            } else {
                let kinds = conjunction_kinds(receiver);
                if kinds.is_empty() {
                    warn!(
                        "Conjunction settings on {} ignored: users do not receive competing traffic",
                        receiver.designator
                    );
                    continue;
                }
                let incoming: Vec<&Link> = links
                    .iter()
                    .filter(|l| l.receiver.endpoint == r && kinds.contains(&l.kind) && settings.is_eligible(&l.band))
                    .collect();
                let senders: BTreeSet<usize> = incoming.iter().map(|l| l.transmitter.endpoint).collect();
                let senders: Vec<usize> = senders.into_iter().collect();

                let mut periods = Vec::new();
                for (x, &s1) in senders.iter().enumerate() {
                    for &s2 in &senders[x + 1..] {
                        let checkable: Vec<bool> = timeline
                            .steps()
                            .map(|t| {
                                settings.is_checkable(t)
                                    && incoming.iter().filter(|l| l.transmitter.endpoint == s1).any(|l1| {
                                        incoming.iter().filter(|l| l.transmitter.endpoint == s2).any(|l2| {
                                            l1.band == l2.band && l1.is_link_at(t) && l2.is_link_at(t)
                                        })
                                    })
                            })
                            .collect();
                        if !checkable.contains(&true) {
                            debug!(
                                "No checkable steps for {} / {} at {}",
                                endpoints[s1].designator, endpoints[s2].designator, receiver.designator
                            );
                            continue;
                        }
                        periods.extend(detector.detect(
                            &receiver.designator,
                            settings,
                            &endpoints[s1].designator,
                            &endpoints[s2].designator,
                            &checkable,
                            self.sink.as_mut(),
                        )?);
                    }
                }
                periods
            };

            periods.sort();
            info!(
                "{} conjunction periods at {}",
                periods.len(),
                receiver.designator
            );
            all[r] = periods;
        }
        Ok(all)
    }
}

/// Relay downlink steps inside the relay's overhead windows are reserved.
fn apply_required_overhead(links: &mut [Link], endpoints: &[Endpoint]) {
    for link in links.iter_mut().filter(|l| l.kind == LinkKind::RelayDownlink) {
        let relay = &endpoints[link.transmitter.endpoint];
        let mut forced = 0;
        for (t, status) in link.statuses.iter_mut().enumerate() {
            if status.is_link() && relay.in_required_overhead(t) {
                *status = LinkStatus::RequiredDownlinkOverhead;
                forced += 1;
            }
        }
        link.overhead.required_downlink_steps = forced;
    }
}

/// A relay can offload at step `t` when any of its downlinks links at `t`.
fn resolve_downlink_support(endpoints: &mut [Endpoint], links: &[Link], timeline: &Timeline) {
    for (r, endpoint) in endpoints.iter_mut().enumerate() {
        if !endpoint.requires_downlink_support() {
            continue;
        }
        let downlinks: Vec<&Link> = links
            .iter()
            .filter(|l| l.kind == LinkKind::RelayDownlink && l.transmitter.endpoint == r)
            .collect();
        if downlinks.is_empty() {
            warn!("Relay {} has no downlink to any ground station", endpoint.designator);
        }
        let support = timeline
            .steps()
            .map(|t| downlinks.iter().any(|l| l.is_link_at(t)))
            .collect();
        endpoint.set_downlink_support(support);
    }
}
