//! Line-of-sight geometry
//!
//! Pure functions over inertial position vectors (km). Degenerate inputs
//! (zero-length vectors) return `None` instead of NaN so callers can turn
//! them into constraint failures.

use crate::antenna::AntennaFrame;
use nalgebra::Vector3;
use orbital_mechanics::vectors::{angle_between_deg, is_degenerate};
use serde::Serialize;

/// Direction to a partner in an antenna's own frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LookAngles {
    /// 0-360 deg, clockwise from the frame's north reference
    pub azimuth_deg: f64,
    /// -90..90 deg above the plane normal to the boresight axis
    pub elevation_deg: f64,
}

/// Azimuth/elevation of `line_of_sight` seen from an antenna at `position`.
///
/// The boresight axis is the local vertical (`Zenith`) or its opposite
/// (`Nadir`). Azimuth is measured from the projection of inertial +Z onto the
/// plane normal to the boresight, toward east; +X stands in when the
/// boresight is parallel to +Z.
pub fn look_angles(
    frame: AntennaFrame,
    position: &Vector3<f64>,
    line_of_sight: &Vector3<f64>,
) -> Option<LookAngles> {
    if is_degenerate(position) || is_degenerate(line_of_sight) {
        return None;
    }

    let up = match frame {
        AntennaFrame::Zenith => position.normalize(),
        AntennaFrame::Nadir => -position.normalize(),
    };

    let reference = {
        let z = Vector3::<f64>::z();
        let north = z - up * z.dot(&up);
        if north.norm() < 1e-9 {
            let x = Vector3::<f64>::x();
            x - up * x.dot(&up)
        } else {
            north
        }
    };
    let north = reference.normalize();
    let east = north.cross(&up);

    let los = line_of_sight.normalize();
    let elevation_deg = los.dot(&up).clamp(-1.0, 1.0).asin().to_degrees();
    let azimuth_deg = los
        .dot(&east)
        .atan2(los.dot(&north))
        .to_degrees()
        .rem_euclid(360.0);

    Some(LookAngles {
        azimuth_deg,
        elevation_deg,
    })
}

/// Height above `earth_radius_km` of the closest approach of the segment
/// between two endpoints, seen from the endpoint nearer Earth centre.
///
/// If the line of sight leaves the nearer endpoint heading away from the
/// Earth (angle to the anti-position vector of 90 deg or more), the nearer
/// endpoint itself is the closest point.
pub fn grazing_altitude_km(a: &Vector3<f64>, b: &Vector3<f64>, earth_radius_km: f64) -> f64 {
    let (near, far) = if a.norm() <= b.norm() { (a, b) } else { (b, a) };
    let radius = near.norm();
    let los = far - near;

    let grazing_radius = match angle_between_deg(&los, &(-near)) {
        Some(angle) if angle < 90.0 => (radius * angle.to_radians().sin()).abs(),
        _ => radius,
    };
    grazing_radius - earth_radius_km
}

/// Angle at `vertex` between the directions to `toward` and to `sun`.
pub fn sun_separation_deg(
    vertex: &Vector3<f64>,
    toward: &Vector3<f64>,
    sun: &Vector3<f64>,
) -> Option<f64> {
    angle_between_deg(&(toward - vertex), &(sun - vertex))
}

/// Angular separation of two senders as seen from a receiver.
pub fn separation_deg(
    receiver: &Vector3<f64>,
    sender1: &Vector3<f64>,
    sender2: &Vector3<f64>,
) -> Option<f64> {
    angle_between_deg(&(sender1 - receiver), &(sender2 - receiver))
}

#[cfg(test)]
mod tests {
    use super::*;
    use orbital_mechanics::EARTH_RADIUS_KM;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_zenith_look_angles() {
        let site = Vector3::new(EARTH_RADIUS_KM, 0.0, 0.0);

        let overhead = look_angles(AntennaFrame::Zenith, &site, &Vector3::new(1000.0, 0.0, 0.0)).unwrap();
        assert!(close(overhead.elevation_deg, 90.0, 1e-9));

        let east = look_angles(AntennaFrame::Zenith, &site, &Vector3::new(0.0, 1000.0, 0.0)).unwrap();
        assert!(close(east.elevation_deg, 0.0, 1e-9));
        assert!(close(east.azimuth_deg, 90.0, 1e-9));

        let north = look_angles(AntennaFrame::Zenith, &site, &Vector3::new(0.0, 0.0, 1000.0)).unwrap();
        assert!(close(north.azimuth_deg, 0.0, 1e-9));

        let below = look_angles(AntennaFrame::Zenith, &site, &Vector3::new(-1.0, 1.0, 0.0)).unwrap();
        assert!(close(below.elevation_deg, -45.0, 1e-9));
    }

    #[test]
    fn test_nadir_frame_sees_earth_up() {
        let sat = Vector3::new(7000.0, 0.0, 0.0);
        let down = look_angles(AntennaFrame::Nadir, &sat, &Vector3::new(-500.0, 0.0, 0.0)).unwrap();
        assert!(close(down.elevation_deg, 90.0, 1e-9));
    }

    #[test]
    fn test_polar_position_uses_fallback_reference() {
        let pole = Vector3::new(0.0, 0.0, 7000.0);
        let angles = look_angles(AntennaFrame::Zenith, &pole, &Vector3::new(1.0, 0.0, 0.0)).unwrap();
        assert!(close(angles.elevation_deg, 0.0, 1e-9));
        assert!(angles.azimuth_deg.is_finite());
    }

    #[test]
    fn test_degenerate_look_angles() {
        let sat = Vector3::new(7000.0, 0.0, 0.0);
        assert!(look_angles(AntennaFrame::Zenith, &sat, &Vector3::zeros()).is_none());
        assert!(look_angles(AntennaFrame::Zenith, &Vector3::zeros(), &sat).is_none());
    }

    #[test]
    fn test_grazing_altitude_through_earth() {
        // Opposite sides of the Earth: the segment passes the centre
        let a = Vector3::new(7000.0, 0.0, 0.0);
        let b = Vector3::new(-7000.0, 0.0, 0.0);
        let grazing = grazing_altitude_km(&a, &b, EARTH_RADIUS_KM);
        assert!(close(grazing, -EARTH_RADIUS_KM, 1e-6));
    }

    #[test]
    fn test_grazing_altitude_tangent() {
        // Two satellites at x=7000 separated along y: closest point is (7000, 0, 0)
        let a = Vector3::new(7000.0, -3000.0, 0.0);
        let b = Vector3::new(7000.0, 3000.0, 0.0);
        let grazing = grazing_altitude_km(&a, &b, EARTH_RADIUS_KM);
        assert!(close(grazing, 7000.0 - EARTH_RADIUS_KM, 1e-6));
    }

    #[test]
    fn test_grazing_altitude_looking_outward() {
        let ground = Vector3::new(EARTH_RADIUS_KM, 0.0, 0.0);
        let sat = Vector3::new(EARTH_RADIUS_KM + 500.0, 100.0, 0.0);
        let grazing = grazing_altitude_km(&ground, &sat, EARTH_RADIUS_KM);
        assert!(close(grazing, 0.0, 1e-9));
    }

    #[test]
    fn test_sun_separation() {
        let vertex = Vector3::new(0.0, 0.0, 0.0);
        let toward = Vector3::new(1.0, 0.0, 0.0);
        let sun = Vector3::new(0.0, 5.0, 0.0);
        assert!(close(sun_separation_deg(&vertex, &toward, &sun).unwrap(), 90.0, 1e-9));
        assert!(sun_separation_deg(&vertex, &vertex, &sun).is_none());
    }

    #[test]
    fn test_separation() {
        let rx = Vector3::new(0.0, 0.0, 0.0);
        let s1 = Vector3::new(1000.0, 0.0, 0.0);
        let s2 = Vector3::new(1000.0, 1000.0, 0.0);
        assert!(close(separation_deg(&rx, &s1, &s2).unwrap(), 45.0, 1e-9));
    }
}
