//! Realize route measures as station points with a local bearing

use crate::{AngleMode, Error, Result, Route, RouteId};
use geo::{Line, Point};

/// A station event located on its route
#[derive(Clone, Debug, PartialEq)]
pub struct StationPoint {
    pub route_id: RouteId,
    pub measure: f64,
    pub point: Point<f64>,
    /// Direction of travel at the station, degrees in `[0, 360)`, 0° = +X, counter-clockwise
    pub bearing: f64,
}

impl StationPoint {
    /// Left-hand normal of the bearing, degrees in `[0, 360)`
    #[inline]
    pub fn normal(&self) -> f64 {
        normalize_degrees(self.bearing + 90.0)
    }

    /// The station angle reported for the given mode
    #[inline]
    pub fn angle(&self, mode: AngleMode) -> f64 {
        match mode {
            AngleMode::Tangent => self.bearing,
            AngleMode::Normal => self.normal(),
        }
    }
}

/// Wrap an angle in degrees into `[0, 360)`
#[inline]
pub fn normalize_degrees(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negative inputs up to exactly 360
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

/// Interpolate the position and bearing of `route` at `measure`
///
/// The position is linearly interpolated between the two vertices that bracket
/// the measure; the bearing is the direction of that segment. A measure that
/// falls exactly on an interior vertex uses the segment starting there, while
/// the last measure uses the final segment. Zero-length segments are skipped.
///
/// # Errors
/// - [`Error::MeasureOutOfRange`] when `measure` is outside the route's range
/// - [`Error::InvalidGeometry`] when the route has no extent to take a direction from
pub fn locate(route: &Route, measure: f64) -> Result<StationPoint> {
    let first = route.first_measure();
    let last = route.last_measure();
    if !(first..=last).contains(&measure) {
        return Err(Error::MeasureOutOfRange {
            route_id: route.id().clone(),
            measure,
            first,
            last,
        });
    }

    let coords = &route.line().0;
    let measures = route.measures();

    let mut bracket = None;
    for i in 0..measures.len() - 1 {
        let (m0, m1) = (measures[i], measures[i + 1]);
        if m1 <= m0 {
            continue;
        }
        bracket = Some(i);
        if measure < m1 {
            break;
        }
    }

    let Some(i) = bracket else {
        return Err(Error::InvalidGeometry {
            route_id: route.id().clone(),
            reason: "zero-length route has no direction".to_string(),
        });
    };

    let segment = Line::new(coords[i], coords[i + 1]);
    let (m0, m1) = (measures[i], measures[i + 1]);
    let t = ((measure - m0) / (m1 - m0)).clamp(0.0, 1.0);
    let position = segment.start + segment.delta() * t;
    let bearing = normalize_degrees(segment.dy().atan2(segment.dx()).to_degrees());

    Ok(StationPoint {
        route_id: route.id().clone(),
        measure,
        point: Point::from(position),
        bearing,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate_events;
    use approx::assert_relative_eq;
    use geo::{LineString, line_string};

    fn route(line: LineString<f64>) -> Route {
        Route::by_length("A".into(), line).unwrap()
    }

    #[test]
    fn test_horizontal_line_stations() {
        let route = route(line_string![(x: 0.0, y: 0.0), (x: 100.0, y: 0.0)]);
        let stations: Vec<StationPoint> = generate_events(&route, 25.0)
            .unwrap()
            .map(|event| locate(&route, event.measure).unwrap())
            .collect();

        let xy: Vec<(f64, f64)> = stations.iter().map(|s| (s.point.x(), s.point.y())).collect();
        assert_eq!(xy, vec![(0.0, 0.0), (25.0, 0.0), (50.0, 0.0), (75.0, 0.0)]);
        assert!(stations.iter().all(|s| s.bearing == 0.0));
    }

    #[test]
    fn test_interpolates_across_segments() {
        let route = route(line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 10.0), (x: -10.0, y: 10.0)]);

        let up = locate(&route, 4.0).unwrap();
        assert_relative_eq!(up.point.x(), 0.0);
        assert_relative_eq!(up.point.y(), 4.0);
        assert_relative_eq!(up.bearing, 90.0);

        let left = locate(&route, 15.0).unwrap();
        assert_relative_eq!(left.point.x(), -5.0);
        assert_relative_eq!(left.point.y(), 10.0);
        assert_relative_eq!(left.bearing, 180.0);
    }

    #[test]
    fn test_vertex_measure_uses_outgoing_segment() {
        let route = route(line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: -10.0)]);

        let corner = locate(&route, 10.0).unwrap();
        assert_relative_eq!(corner.point.x(), 10.0);
        assert_relative_eq!(corner.bearing, 270.0);

        let end = locate(&route, 20.0).unwrap();
        assert_relative_eq!(end.point.y(), -10.0);
        assert_relative_eq!(end.bearing, 270.0);
    }

    #[test]
    fn test_skips_zero_length_segments() {
        let route = route(line_string![
            (x: 0.0, y: 0.0),
            (x: 0.0, y: 0.0),
            (x: 5.0, y: 5.0)
        ]);
        let start = locate(&route, 0.0).unwrap();
        assert_relative_eq!(start.bearing, 45.0);
    }

    #[test]
    fn test_out_of_range_measure() {
        let route = route(line_string![(x: 0.0, y: 0.0), (x: 10.0, y: 0.0)]);
        for measure in [-0.1, 10.5, f64::NAN] {
            assert!(matches!(
                locate(&route, measure),
                Err(Error::MeasureOutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_zero_length_route_has_no_direction() {
        let route = route(line_string![(x: 3.0, y: 3.0), (x: 3.0, y: 3.0)]);
        assert!(matches!(
            locate(&route, 0.0),
            Err(Error::InvalidGeometry { .. })
        ));
    }

    #[test]
    fn test_bearing_is_translation_invariant() {
        let base = line_string![
            (x: 0.0, y: 0.0),
            (x: 7.0, y: 3.0),
            (x: 4.0, y: 11.0),
            (x: -6.0, y: 2.0)
        ];
        let shifted: LineString<f64> = base
            .coords()
            .map(|c| geo::coord! { x: c.x + 1234.5, y: c.y - 987.25 })
            .collect();
        let a = route(base);
        let b = route(shifted);

        for event in generate_events(&a, 0.75).unwrap() {
            let pa = locate(&a, event.measure).unwrap();
            let pb = locate(&b, event.measure).unwrap();
            assert_relative_eq!(pa.bearing, pb.bearing, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_normal_and_angle_modes() {
        let station = StationPoint {
            route_id: "A".into(),
            measure: 0.0,
            point: Point::new(0.0, 0.0),
            bearing: 300.0,
        };
        assert_relative_eq!(station.normal(), 30.0);
        assert_relative_eq!(station.angle(AngleMode::Tangent), 300.0);
        assert_relative_eq!(station.angle(AngleMode::Normal), 30.0);
    }

    #[test]
    fn test_normalize_degrees() {
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
        assert_eq!(normalize_degrees(725.0), 5.0);
        assert!(normalize_degrees(-1e-20) < 360.0);
    }
}
