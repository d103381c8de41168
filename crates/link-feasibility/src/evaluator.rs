//! Per-time-step link feasibility
//!
//! For each step the evaluator samples the geometry at offset 0 and then
//! every `additional_check_seconds` inside the step. The first violated
//! constraint decides the step's status and stops sampling. Checks run in a
//! fixed order:
//!
//! 1. grazing altitude below minimum
//! 2. range above maximum, then below minimum
//! 3. transmit-side Sun separation above maximum, then below minimum
//! 4. receive-side Sun separation above maximum, then below minimum
//! 5. receive elevation above maximum, then below minimum
//! 6. transmit elevation above maximum, then below minimum
//! 7. solar intrusion toward the transmitter's cluster partner
//!
//! At offset 0 a geometrically clear step is also checked against antenna
//! outages, receive-antenna dedication and the receiver's downlink support.

use crate::antenna::Antenna;
use crate::config::AnalysisConfig;
use crate::constraint::{ElevationBounds, PairConstraints};
use crate::debug::DebugSink;
use crate::endpoint::{DownlinkSupport, Endpoint};
use crate::geometry::{self, LookAngles};
use crate::status::LinkStatus;
use crate::timeline::TimeStep;
use crate::Result;
use nalgebra::Vector3;
use orbital_mechanics::vectors::{angle_between_deg, is_degenerate, lerp};
use orbital_mechanics::PositionProvider;

/// One side of a directed link
#[derive(Debug, Clone, Copy)]
pub struct LinkEnd<'e> {
    pub endpoint: &'e Endpoint,
    pub antenna: &'e Antenna,
}

impl<'e> LinkEnd<'e> {
    pub fn new(endpoint: &'e Endpoint, antenna: &'e Antenna) -> Self {
        Self { endpoint, antenna }
    }
}

/// Outage and dedication checks shared by computed and replayed links.
pub(crate) fn schedule_status(tx: LinkEnd<'_>, rx: LinkEnd<'_>, time_step: TimeStep) -> Option<LinkStatus> {
    if tx.antenna.in_outage(time_step) || rx.antenna.in_outage(time_step) {
        return Some(LinkStatus::OutageTimeStep);
    }
    if rx.antenna.dedicated_elsewhere(time_step, &tx.endpoint.designator) {
        return Some(LinkStatus::FullyDedicatedTimeStep);
    }
    None
}

fn downlink_status(rx: LinkEnd<'_>, time_step: TimeStep) -> Option<LinkStatus> {
    match rx.endpoint.has_supporting_downlink(time_step) {
        DownlinkSupport::Unsupported => Some(LinkStatus::NoSupportingDownlink),
        DownlinkSupport::Supported | DownlinkSupport::NotApplicable => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Bound {
    Within,
    AboveMax,
    BelowMin,
}

/// An undefined value fails any configured bound on the minimum side.
fn check_bounds(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> Bound {
    match value {
        None if min.is_some() || max.is_some() => Bound::BelowMin,
        None => Bound::Within,
        Some(v) if max.is_some_and(|m| v > m) => Bound::AboveMax,
        Some(v) if min.is_some_and(|m| v < m) => Bound::BelowMin,
        Some(_) => Bound::Within,
    }
}

/// Geometry captured at one sub-sample
#[derive(Debug, Clone, Copy)]
struct Sample {
    range_km: f64,
    grazing_altitude_km: f64,
    transmit_angles: Option<LookAngles>,
    receive_angles: Option<LookAngles>,
    transmit_sun_deg: Option<f64>,
    receive_sun_deg: Option<f64>,
    solar_intrusion_deg: Option<f64>,
    /// Only set when the transmitter has a cluster partner
    min_solar_intrusion_deg: Option<f64>,
    transmit_bounds: ElevationBounds,
    receive_bounds: ElevationBounds,
}

impl Sample {
    fn status(&self, c: &PairConstraints) -> LinkStatus {
        if c
            .min_grazing_altitude_km
            .is_some_and(|min| self.grazing_altitude_km < min)
        {
            return LinkStatus::MinGrazingAltitude;
        }
        if c.max_range_km.is_some_and(|max| self.range_km > max) {
            return LinkStatus::MaxRangeTransmit;
        }
        if c.min_range_km.is_some_and(|min| self.range_km < min) {
            return LinkStatus::MinRangeTransmit;
        }

        match check_bounds(
            self.transmit_sun_deg,
            c.transmit.min_sun_separation_deg,
            c.transmit.max_sun_separation_deg,
        ) {
            Bound::AboveMax => return LinkStatus::MaxSunSeparationTransmit,
            Bound::BelowMin => return LinkStatus::MinSunSeparationTransmit,
            Bound::Within => {}
        }
        match check_bounds(
            self.receive_sun_deg,
            c.receive.min_sun_separation_deg,
            c.receive.max_sun_separation_deg,
        ) {
            Bound::AboveMax => return LinkStatus::MaxSunSeparationReceive,
            Bound::BelowMin => return LinkStatus::MinSunSeparationReceive,
            Bound::Within => {}
        }

        let rx_el = self.receive_angles.map(|a| a.elevation_deg);
        match check_bounds(rx_el, self.receive_bounds.min, self.receive_bounds.max) {
            Bound::AboveMax => return LinkStatus::MaxElevationReceive,
            Bound::BelowMin => return LinkStatus::MinElevationReceive,
            Bound::Within => {}
        }
        let tx_el = self.transmit_angles.map(|a| a.elevation_deg);
        match check_bounds(tx_el, self.transmit_bounds.min, self.transmit_bounds.max) {
            Bound::AboveMax => return LinkStatus::MaxElevationTransmit,
            Bound::BelowMin => return LinkStatus::MinElevationTransmit,
            Bound::Within => {}
        }

        if check_bounds(self.solar_intrusion_deg, self.min_solar_intrusion_deg, None) == Bound::BelowMin {
            return LinkStatus::MinSolarIntrusion;
        }
        LinkStatus::Link
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v))
}

/// Computes status arrays for directed antenna pairs.
pub struct LinkEvaluator<'a, P: PositionProvider + ?Sized> {
    config: &'a AnalysisConfig,
    provider: &'a P,
}

impl<'a, P: PositionProvider + ?Sized> LinkEvaluator<'a, P> {
    pub fn new(config: &'a AnalysisConfig, provider: &'a P) -> Self {
        Self { config, provider }
    }

    /// Status for every time step of the timeline.
    pub fn evaluate(
        &self,
        tx: LinkEnd<'_>,
        rx: LinkEnd<'_>,
        constraints: &PairConstraints,
        mut sink: Option<&mut DebugSink>,
    ) -> Result<Vec<LinkStatus>> {
        let timeline = &self.config.timeline;
        let mut statuses = Vec::with_capacity(timeline.time_steps);
        for t in timeline.steps() {
            let status = self.evaluate_step(tx, rx, constraints, t, sink.as_deref_mut())?;
            statuses.push(status);
        }
        Ok(statuses)
    }

    fn evaluate_step(
        &self,
        tx: LinkEnd<'_>,
        rx: LinkEnd<'_>,
        constraints: &PairConstraints,
        t: TimeStep,
        mut sink: Option<&mut DebugSink>,
    ) -> Result<LinkStatus> {
        let timeline = &self.config.timeline;
        let sun_now = self.provider.sun_position(t)?;
        let mut sun_next: Option<Vector3<f64>> = None;

        for offset in timeline.sample_offsets(t) {
            let sun = if offset == 0.0 {
                sun_now
            } else {
                let next = match sun_next {
                    Some(v) => v,
                    None => {
                        let v = self.provider.sun_position(t + 1)?;
                        sun_next = Some(v);
                        v
                    }
                };
                lerp(&sun_now, &next, offset / timeline.seconds_per_time_step)
            };

            let (mut status, sample) = self.sample(tx, rx, constraints, t, offset, &sun)?;
            if status.is_link() && offset == 0.0 {
                if let Some(admin) = schedule_status(tx, rx, t).or_else(|| downlink_status(rx, t)) {
                    status = admin;
                }
            }

            if let Some(sink) = sink.as_deref_mut() {
                let line = self.debug_line(tx, rx, t, offset, sample.as_ref(), status);
                sink.line(&line)?;
            }
            if !status.is_link() {
                return Ok(status);
            }
        }
        Ok(LinkStatus::Link)
    }

    fn sample(
        &self,
        tx: LinkEnd<'_>,
        rx: LinkEnd<'_>,
        constraints: &PairConstraints,
        t: TimeStep,
        offset: f64,
        sun: &Vector3<f64>,
    ) -> Result<(LinkStatus, Option<Sample>)> {
        let tx_pos = self.provider.position(&tx.endpoint.designator, t, offset)?;
        let rx_pos = self.provider.position(&rx.endpoint.designator, t, offset)?;

        let los = rx_pos - tx_pos;
        if is_degenerate(&los) {
            return Ok((LinkStatus::MinRangeTransmit, None));
        }

        let transmit_angles = tx.antenna.look_angles(&tx_pos, &los);
        let receive_angles = rx.antenna.look_angles(&rx_pos, &(-los));

        let transmit_bounds = tx.antenna.elevation_bounds(
            transmit_angles.map(|a| a.azimuth_deg),
            constraints.transmit.elevation,
            tx.endpoint.tilts_to_track,
        );
        let receive_bounds = rx.antenna.elevation_bounds(
            receive_angles.map(|a| a.azimuth_deg),
            constraints.receive.elevation,
            rx.endpoint.tilts_to_track,
        );

        let (solar_intrusion_deg, min_solar_intrusion_deg) =
            match (&tx.endpoint.cluster_partner, constraints.min_solar_intrusion_deg) {
                (Some(partner), Some(min)) => {
                    let partner_pos = self.provider.position(partner, t, offset)?;
                    (
                        angle_between_deg(&(sun - tx_pos), &(partner_pos - tx_pos)),
                        Some(min),
                    )
                }
                _ => (None, None),
            };

        let sample = Sample {
            range_km: los.norm(),
            grazing_altitude_km: geometry::grazing_altitude_km(
                &tx_pos,
                &rx_pos,
                self.config.earth_radius_km,
            ),
            transmit_angles,
            receive_angles,
            transmit_sun_deg: geometry::sun_separation_deg(&tx_pos, &rx_pos, sun),
            receive_sun_deg: geometry::sun_separation_deg(&rx_pos, &tx_pos, sun),
            solar_intrusion_deg,
            min_solar_intrusion_deg,
            transmit_bounds,
            receive_bounds,
        };
        Ok((sample.status(constraints), Some(sample)))
    }

    fn debug_line(
        &self,
        tx: LinkEnd<'_>,
        rx: LinkEnd<'_>,
        t: TimeStep,
        offset: f64,
        sample: Option<&Sample>,
        status: LinkStatus,
    ) -> String {
        let clock = self.config.timeline.time_value(t) + offset;
        let head = format!(
            "{} {} {} {} {} {:.1} {:.1}",
            tx.endpoint.designator, tx.antenna.id, rx.endpoint.designator, rx.antenna.id, t, offset, clock
        );
        match sample {
            Some(s) => format!(
                "{} {} {} {} {} {:.3} {:.3} {} {} {} {}",
                head,
                fmt_opt(s.transmit_angles.map(|a| a.azimuth_deg)),
                fmt_opt(s.transmit_angles.map(|a| a.elevation_deg)),
                fmt_opt(s.receive_angles.map(|a| a.azimuth_deg)),
                fmt_opt(s.receive_angles.map(|a| a.elevation_deg)),
                s.grazing_altitude_km,
                s.range_km,
                fmt_opt(s.transmit_sun_deg),
                fmt_opt(s.receive_sun_deg),
                fmt_opt(s.solar_intrusion_deg),
                status
            ),
            None => format!("{} - - - - - 0.000 - - - {}", head, status),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{AzimuthSector, Thresholds};
    use crate::timeline::{TimeWindow, Timeline};
    use orbital_mechanics::ephemeris::TabulatedEphemeris;
    use orbital_mechanics::EARTH_RADIUS_KM;
    use proptest::prelude::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    const SUN: [f64; 3] = [0.0, 1.5e8, 0.0];

    fn config(steps: usize, check: f64) -> AnalysisConfig {
        AnalysisConfig::new(Timeline::new(steps, 60.0, check))
    }

    fn sun() -> Vector3<f64> {
        Vector3::new(SUN[0], SUN[1], SUN[2])
    }

    /// Two satellites 5000 km apart on the +X side of the Earth.
    fn pair_ephemeris() -> TabulatedEphemeris {
        TabulatedEphemeris::new(60.0)
            .with_series("SAT-1", vec![Vector3::new(8000.0, 0.0, 0.0)])
            .with_series("SAT-2", vec![Vector3::new(8000.0, 0.0, 5000.0)])
            .with_sun(vec![sun()])
    }

    fn endpoints() -> (Endpoint, Endpoint) {
        let sat1 = Endpoint::user("SAT-1").with_antenna(Antenna::new("A1").with_band("Ka"));
        let sat2 = Endpoint::user("SAT-2").with_antenna(Antenna::new("A2").with_band("Ka"));
        (sat1, sat2)
    }

    fn run(
        eph: &TabulatedEphemeris,
        cfg: &AnalysisConfig,
        tx: &Endpoint,
        rx: &Endpoint,
        constraints: PairConstraints,
    ) -> Vec<LinkStatus> {
        let evaluator = LinkEvaluator::new(cfg, eph);
        evaluator
            .evaluate(
                LinkEnd::new(tx, &tx.antennas[0]),
                LinkEnd::new(rx, &rx.antennas[0]),
                &constraints,
                None,
            )
            .unwrap()
    }

    #[test]
    fn test_all_clear_is_link() {
        let (tx, rx) = endpoints();
        let statuses = run(&pair_ephemeris(), &config(3, 0.0), &tx, &rx, PairConstraints::default());
        assert_eq!(statuses, vec![LinkStatus::Link; 3]);
    }

    #[test]
    fn test_range_beyond_maximum() {
        let (tx, rx) = endpoints();
        let c = PairConstraints::merge(
            &Thresholds {
                max_range_km: Some(4_000.0),
                ..Default::default()
            },
            &Thresholds::default(),
        );
        let statuses = run(&pair_ephemeris(), &config(2, 0.0), &tx, &rx, c);
        assert_eq!(statuses, vec![LinkStatus::MaxRangeTransmit; 2]);
    }

    #[test]
    fn test_priority_grazing_before_range() {
        let (tx, rx) = endpoints();
        let c = PairConstraints::merge(
            &Thresholds {
                max_range_km: Some(4_000.0),
                min_grazing_altitude_km: Some(5_000.0),
                ..Default::default()
            },
            &Thresholds::default(),
        );
        let statuses = run(&pair_ephemeris(), &config(1, 0.0), &tx, &rx, c);
        assert_eq!(statuses, vec![LinkStatus::MinGrazingAltitude]);
    }

    #[test]
    fn test_priority_receive_elevation_before_transmit() {
        let (tx, rx) = endpoints();
        // Horizontal at the transmitter, below the horizon at the receiver
        let limits = Thresholds {
            min_elevation_deg: Some(10.0),
            ..Default::default()
        };
        let statuses = run(&pair_ephemeris(), &config(1, 0.0), &tx, &rx, PairConstraints::merge(&limits, &limits));
        assert_eq!(statuses, vec![LinkStatus::MinElevationReceive]);

        let tx_only = PairConstraints::merge(&limits, &Thresholds::default());
        let statuses = run(&pair_ephemeris(), &config(1, 0.0), &tx, &rx, tx_only);
        assert_eq!(statuses, vec![LinkStatus::MinElevationTransmit]);
    }

    #[test]
    fn test_sun_separation_transmit_before_receive() {
        let (tx, rx) = endpoints();
        // Sun lies along +Y, roughly 90 deg from the line of sight at both ends
        let limits = Thresholds {
            max_sun_separation_deg: Some(45.0),
            ..Default::default()
        };
        let statuses = run(&pair_ephemeris(), &config(1, 0.0), &tx, &rx, PairConstraints::merge(&limits, &limits));
        assert_eq!(statuses, vec![LinkStatus::MaxSunSeparationTransmit]);

        let rx_only = PairConstraints::merge(&Thresholds::default(), &limits);
        let statuses = run(&pair_ephemeris(), &config(1, 0.0), &tx, &rx, rx_only);
        assert_eq!(statuses, vec![LinkStatus::MaxSunSeparationReceive]);
    }

    /// Geometric statuses in the order they are checked.
    const PRIORITY: [LinkStatus; 12] = [
        LinkStatus::MinGrazingAltitude,
        LinkStatus::MaxRangeTransmit,
        LinkStatus::MinRangeTransmit,
        LinkStatus::MaxSunSeparationTransmit,
        LinkStatus::MinSunSeparationTransmit,
        LinkStatus::MaxSunSeparationReceive,
        LinkStatus::MinSunSeparationReceive,
        LinkStatus::MaxElevationReceive,
        LinkStatus::MinElevationReceive,
        LinkStatus::MaxElevationTransmit,
        LinkStatus::MinElevationTransmit,
        LinkStatus::MinSolarIntrusion,
    ];

    /// Set one threshold that the pair fixture breaks. The fixture has range
    /// 5000 km, grazing altitude ~1622 km, Sun ~90 deg from the line of sight
    /// at both ends, elevation 0 deg at the transmitter and ~-32 deg at the
    /// receiver, and a cluster partner lying toward the Sun.
    fn violate(status: LinkStatus, tx: &mut Thresholds, rx: &mut Thresholds) {
        match status {
            LinkStatus::MinGrazingAltitude => tx.min_grazing_altitude_km = Some(5_000.0),
            LinkStatus::MaxRangeTransmit => tx.max_range_km = Some(4_000.0),
            LinkStatus::MinRangeTransmit => tx.min_range_km = Some(6_000.0),
            LinkStatus::MaxSunSeparationTransmit => tx.max_sun_separation_deg = Some(45.0),
            LinkStatus::MinSunSeparationTransmit => tx.min_sun_separation_deg = Some(120.0),
            LinkStatus::MaxSunSeparationReceive => rx.max_sun_separation_deg = Some(45.0),
            LinkStatus::MinSunSeparationReceive => rx.min_sun_separation_deg = Some(120.0),
            LinkStatus::MaxElevationReceive => rx.max_elevation_deg = Some(-40.0),
            LinkStatus::MinElevationReceive => rx.min_elevation_deg = Some(10.0),
            LinkStatus::MaxElevationTransmit => tx.max_elevation_deg = Some(-10.0),
            LinkStatus::MinElevationTransmit => tx.min_elevation_deg = Some(10.0),
            LinkStatus::MinSolarIntrusion => tx.min_solar_intrusion_deg = Some(5.0),
            other => panic!("no threshold produces {:?}", other),
        }
    }

    fn first_violation(violated: &[LinkStatus]) -> LinkStatus {
        let mut tx_limits = Thresholds::default();
        let mut rx_limits = Thresholds::default();
        for &status in violated {
            violate(status, &mut tx_limits, &mut rx_limits);
        }
        let eph = pair_ephemeris().with_series("SAT-3", vec![Vector3::new(8000.0, 1000.0, 0.0)]);
        let (mut tx, rx) = endpoints();
        tx.cluster_partner = Some("SAT-3".to_string());
        let c = PairConstraints::merge(&tx_limits, &rx_limits);
        run(&eph, &config(1, 0.0), &tx, &rx, c)[0]
    }

    #[test]
    fn test_each_threshold_reports_its_status() {
        assert_eq!(first_violation(&[]), LinkStatus::Link);
        for status in PRIORITY {
            assert_eq!(first_violation(&[status]), status);
        }
    }

    #[test]
    fn test_pairwise_priority() {
        for (i, &earlier) in PRIORITY.iter().enumerate() {
            for &later in &PRIORITY[i + 1..] {
                assert_eq!(
                    first_violation(&[earlier, later]),
                    earlier,
                    "{:?} should win over {:?}",
                    earlier,
                    later
                );
            }
        }
    }

    proptest! {
        #[test]
        fn prop_first_violation_wins(
            violated in proptest::sample::subsequence(PRIORITY.to_vec(), 1..=PRIORITY.len())
        ) {
            prop_assert_eq!(first_violation(&violated), violated[0]);
        }
    }

    #[test]
    fn test_sub_samples_use_interpolated_sun() {
        // Sun swings from +Y onto the line of sight (+Z) over step 0
        let eph = TabulatedEphemeris::new(60.0)
            .with_series("SAT-1", vec![Vector3::new(8000.0, 0.0, 0.0)])
            .with_series("SAT-2", vec![Vector3::new(8000.0, 0.0, 5000.0)])
            .with_sun(vec![Vector3::new(0.0, 1.5e8, 0.0), Vector3::new(0.0, 0.0, 1.5e8)]);
        let (tx, rx) = endpoints();
        let c = PairConstraints::merge(
            &Thresholds {
                min_sun_separation_deg: Some(60.0),
                ..Default::default()
            },
            &Thresholds::default(),
        );

        // Offset 0 sees ~90 deg, the step-1 Sun is on the line of sight
        let coarse = run(&eph, &config(2, 0.0), &tx, &rx, c);
        assert_eq!(coarse, vec![LinkStatus::Link, LinkStatus::MinSunSeparationTransmit]);

        // Halfway through step 0 the Sun is ~45 deg off the line of sight
        let fine = run(&eph, &config(2, 30.0), &tx, &rx, c);
        assert_eq!(fine, vec![LinkStatus::MinSunSeparationTransmit; 2]);
    }

    #[test]
    fn test_sub_sample_violation_fails_step() {
        // SAT-2 moves away; the midpoint of step 0 is beyond range
        let eph = TabulatedEphemeris::new(60.0)
            .with_series("SAT-1", vec![Vector3::new(8000.0, 0.0, 0.0); 3])
            .with_series(
                "SAT-2",
                vec![
                    Vector3::new(8000.0, 0.0, 1000.0),
                    Vector3::new(8000.0, 0.0, 1000.0),
                    Vector3::new(8000.0, 0.0, 1000.0),
                ],
            )
            .with_sun(vec![sun()]);
        let mut moving = eph.clone();
        moving.insert(
            "SAT-2",
            vec![
                Vector3::new(8000.0, 0.0, 1000.0),
                Vector3::new(8000.0, 0.0, 9000.0),
                Vector3::new(8000.0, 0.0, 1000.0),
            ],
        );
        let c = PairConstraints::merge(
            &Thresholds {
                max_range_km: Some(4_000.0),
                ..Default::default()
            },
            &Thresholds::default(),
        );
        let (tx, rx) = endpoints();

        // Without sub-sampling step 0 only sees offset 0
        let coarse = run(&moving, &config(3, 0.0), &tx, &rx, c);
        assert_eq!(coarse[0], LinkStatus::Link);

        let fine = run(&moving, &config(3, 30.0), &tx, &rx, c);
        assert_eq!(fine[0], LinkStatus::MaxRangeTransmit);
        assert_eq!(fine[1], LinkStatus::MaxRangeTransmit);
        // Final step sampled at offset 0 only
        assert_eq!(fine[2], LinkStatus::Link);

        assert_eq!(run(&eph, &config(3, 30.0), &tx, &rx, c), vec![LinkStatus::Link; 3]);
    }

    #[test]
    fn test_coincident_positions_fail_min_range() {
        let eph = TabulatedEphemeris::new(60.0)
            .with_series("SAT-1", vec![Vector3::new(8000.0, 0.0, 0.0)])
            .with_series("SAT-2", vec![Vector3::new(8000.0, 0.0, 0.0)])
            .with_sun(vec![sun()]);
        let (tx, rx) = endpoints();
        let statuses = run(&eph, &config(1, 0.0), &tx, &rx, PairConstraints::default());
        assert_eq!(statuses, vec![LinkStatus::MinRangeTransmit]);
    }

    #[test]
    fn test_undefined_sun_angle_violates_configured_bound() {
        // Sun coincides with the transmitter
        let eph = TabulatedEphemeris::new(60.0)
            .with_series("SAT-1", vec![Vector3::new(8000.0, 0.0, 0.0)])
            .with_series("SAT-2", vec![Vector3::new(8000.0, 0.0, 5000.0)])
            .with_sun(vec![Vector3::new(8000.0, 0.0, 0.0)]);
        let (tx, rx) = endpoints();
        let limits = Thresholds {
            max_sun_separation_deg: Some(170.0),
            ..Default::default()
        };
        let c = PairConstraints::merge(&limits, &Thresholds::default());
        assert_eq!(run(&eph, &config(1, 0.0), &tx, &rx, c), vec![LinkStatus::MinSunSeparationTransmit]);
        assert_eq!(
            run(&eph, &config(1, 0.0), &tx, &rx, PairConstraints::default()),
            vec![LinkStatus::Link]
        );
    }

    #[test]
    fn test_solar_intrusion_toward_cluster_partner() {
        let eph = pair_ephemeris()
            .with_series("SAT-3", vec![Vector3::new(8000.0, 1000.0, 0.0)]);
        let (mut tx, rx) = endpoints();
        tx.cluster_partner = Some("SAT-3".to_string());
        // Partner direction is +Y, same as the Sun
        let c = PairConstraints::merge(
            &Thresholds {
                min_solar_intrusion_deg: Some(5.0),
                ..Default::default()
            },
            &Thresholds::default(),
        );
        assert_eq!(run(&eph, &config(1, 0.0), &tx, &rx, c), vec![LinkStatus::MinSolarIntrusion]);

        tx.cluster_partner = None;
        assert_eq!(run(&eph, &config(1, 0.0), &tx, &rx, c), vec![LinkStatus::Link]);
    }

    #[test]
    fn test_schedule_checks_after_geometry() {
        let eph = pair_ephemeris();
        let (mut tx, mut rx) = endpoints();
        tx.antennas[0] = Antenna::new("A1").with_band("Ka").with_outage(TimeWindow::new(1, 1));
        rx.antennas[0] = Antenna::new("A2")
            .with_band("Ka")
            .with_dedication("SAT-9", vec![TimeWindow::new(2, 2)]);
        let statuses = run(&eph, &config(4, 0.0), &tx, &rx, PairConstraints::default());
        assert_eq!(
            statuses,
            vec![
                LinkStatus::Link,
                LinkStatus::OutageTimeStep,
                LinkStatus::FullyDedicatedTimeStep,
                LinkStatus::Link
            ]
        );

        // Geometry failures take precedence over the schedule
        let c = PairConstraints::merge(
            &Thresholds {
                max_range_km: Some(10.0),
                ..Default::default()
            },
            &Thresholds::default(),
        );
        let statuses = run(&eph, &config(4, 0.0), &tx, &rx, c);
        assert_eq!(statuses[1], LinkStatus::MaxRangeTransmit);
    }

    #[test]
    fn test_relay_without_downlink() {
        let eph = pair_ephemeris();
        let (tx, _) = endpoints();
        let mut relay = Endpoint::relay("SAT-2").with_antenna(Antenna::new("A2").with_band("Ka"));
        relay.set_downlink_support(vec![true, false]);
        let statuses = run(&eph, &config(2, 0.0), &tx, &relay, PairConstraints::default());
        assert_eq!(statuses, vec![LinkStatus::Link, LinkStatus::NoSupportingDownlink]);
    }

    #[test]
    fn test_azimuth_sector_limits() {
        let eph = pair_ephemeris();
        let (mut tx, rx) = endpoints();
        // Receiver lies due north (+Z) of the transmitter at elevation 0
        tx.antennas[0] = Antenna::new("A1").with_band("Ka").with_sector(AzimuthSector {
            start_azimuth_deg: 330.0,
            end_azimuth_deg: 30.0,
            min_elevation_deg: Some(5.0),
            max_elevation_deg: None,
        });
        assert_eq!(
            run(&eph, &config(1, 0.0), &tx, &rx, PairConstraints::default()),
            vec![LinkStatus::MinElevationTransmit]
        );

        tx.tilts_to_track = true;
        assert_eq!(
            run(&eph, &config(1, 0.0), &tx, &rx, PairConstraints::default()),
            vec![LinkStatus::Link]
        );
    }

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_debug_lines_do_not_change_results() {
        let eph = pair_ephemeris();
        let (tx, rx) = endpoints();
        let cfg = config(3, 20.0);
        let buffer = SharedBuffer::default();
        let mut sink = DebugSink::new(buffer.clone());

        let evaluator = LinkEvaluator::new(&cfg, &eph);
        let with_sink = evaluator
            .evaluate(
                LinkEnd::new(&tx, &tx.antennas[0]),
                LinkEnd::new(&rx, &rx.antennas[0]),
                &PairConstraints::default(),
                Some(&mut sink),
            )
            .unwrap();
        let without = run(&eph, &cfg, &tx, &rx, PairConstraints::default());
        assert_eq!(with_sink, without);

        // Steps 0 and 1 sample 0/20/40, step 2 samples 0 only
        assert_eq!(sink.lines_written(), 7);
        let text = String::from_utf8(buffer.0.lock().unwrap().clone()).unwrap();
        let first = text.lines().next().unwrap();
        assert!(first.starts_with("SAT-1 A1 SAT-2 A2 0 0.0 0.0"));
        assert!(first.ends_with("LINK"));
        assert!(text.contains(&format!("{:.3}", 8000.0 - EARTH_RADIUS_KM)));
    }

    #[test]
    fn test_check_bounds() {
        assert_eq!(check_bounds(Some(5.0), Some(1.0), Some(10.0)), Bound::Within);
        assert_eq!(check_bounds(Some(11.0), Some(1.0), Some(10.0)), Bound::AboveMax);
        assert_eq!(check_bounds(Some(0.5), Some(1.0), Some(10.0)), Bound::BelowMin);
        assert_eq!(check_bounds(None, None, Some(10.0)), Bound::BelowMin);
        assert_eq!(check_bounds(None, None, None), Bound::Within);
    }
}
