//! Perpendicular cross-section lines through station points

use crate::config::validate_width;
use crate::{Result, RouteId, StationPoint};
use geo::{Coord, LineString, Point};

/// A cross-section line centered on a station
#[derive(Clone, Debug, PartialEq)]
pub struct CrossSection {
    pub route_id: RouteId,
    pub measure: f64,
    /// Three vertices: left end, station, right end
    pub geometry: LineString<f64>,
}

impl CrossSection {
    /// The station the section is centered on
    pub fn station(&self) -> Point<f64> {
        Point::from(self.geometry.0[1])
    }
}

/// Build the cross-section of full `width` through `station`
///
/// The section runs along the station's left normal, from the left end through
/// the station to the right end.
///
/// # Errors
/// [`crate::ConfigError::InvalidWidth`] if `width` is not a positive finite number.
pub fn build_cross_section(station: &StationPoint, width: f64) -> Result<CrossSection> {
    cross_section_from_normal(
        station.route_id.clone(),
        station.measure,
        station.point,
        station.normal(),
        width,
    )
}

/// Build a cross-section from a station location and its normal angle in degrees
///
/// Used when the angle comes from a stored `LOC_ANGLE` normal. The first vertex
/// is offset by `width / 2` along the normal, the last one by the same distance
/// against it, and the station itself is kept as the middle vertex.
pub fn cross_section_from_normal(
    route_id: RouteId,
    measure: f64,
    mid: Point<f64>,
    normal_degrees: f64,
    width: f64,
) -> Result<CrossSection> {
    validate_width(width)?;

    let distance = width / 2.0;
    let (sin, cos) = normal_degrees.to_radians().sin_cos();
    let offset = Coord {
        x: distance * cos,
        y: distance * sin,
    };
    let mid = mid.0;

    Ok(CrossSection {
        route_id,
        measure,
        geometry: LineString::new(vec![mid + offset, mid, mid - offset]),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConfigError, Error, Route, generate_events, locate};
    use approx::assert_relative_eq;
    use geo::line_string;

    fn station(x: f64, y: f64, bearing: f64) -> StationPoint {
        StationPoint {
            route_id: "A".into(),
            measure: 50.0,
            point: Point::new(x, y),
            bearing,
        }
    }

    fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
        (a.x - b.x).hypot(a.y - b.y)
    }

    #[test]
    fn test_horizontal_route_section() {
        let section = build_cross_section(&station(50.0, 0.0, 0.0), 10.0).unwrap();
        let coords = &section.geometry.0;

        assert_eq!(coords.len(), 3);
        assert_relative_eq!(coords[0].x, 50.0, epsilon = 1e-12);
        assert_relative_eq!(coords[0].y, 5.0, epsilon = 1e-12);
        assert_eq!(coords[1], Coord { x: 50.0, y: 0.0 });
        assert_relative_eq!(coords[2].x, 50.0, epsilon = 1e-12);
        assert_relative_eq!(coords[2].y, -5.0, epsilon = 1e-12);
        assert_eq!(section.station(), Point::new(50.0, 0.0));
    }

    #[test]
    fn test_section_is_symmetric_and_perpendicular() {
        for bearing in [0.0, 17.5, 90.0, 133.0, 241.25, 359.0] {
            let station = station(12.0, -3.5, bearing);
            let section = build_cross_section(&station, 7.0).unwrap();
            let [left, mid, right] = [
                section.geometry.0[0],
                section.geometry.0[1],
                section.geometry.0[2],
            ];

            assert_relative_eq!(distance(left, mid), 3.5, epsilon = 1e-9);
            assert_relative_eq!(distance(mid, right), 3.5, epsilon = 1e-9);

            // Colinear: the cross product of both halves vanishes
            let (a, b) = (mid - left, right - mid);
            assert_relative_eq!(a.x * b.y - a.y * b.x, 0.0, epsilon = 1e-9);

            // Perpendicular to the bearing direction
            let (sin, cos) = bearing.to_radians().sin_cos();
            assert_relative_eq!(a.x * cos + a.y * sin, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_left_end_is_left_of_travel() {
        let route = Route::by_length(
            "A".into(),
            line_string![(x: 0.0, y: 0.0), (x: 0.0, y: 40.0)],
        )
        .unwrap();
        for event in generate_events(&route, 10.0).unwrap() {
            let station = locate(&route, event.measure).unwrap();
            let section = build_cross_section(&station, 4.0).unwrap();
            // Heading north, left is west
            assert!(section.geometry.0[0].x < 0.0);
            assert!(section.geometry.0[2].x > 0.0);
        }
    }

    #[test]
    fn test_invalid_width() {
        for width in [0.0, -2.0, f64::INFINITY] {
            assert!(matches!(
                build_cross_section(&station(0.0, 0.0, 0.0), width),
                Err(Error::Config(ConfigError::InvalidWidth(_)))
            ));
        }
    }

    #[test]
    fn test_from_normal_matches_station_builder() {
        let station = station(1.0, 2.0, 200.0);
        let a = build_cross_section(&station, 6.0).unwrap();
        let b = cross_section_from_normal(
            station.route_id.clone(),
            station.measure,
            station.point,
            station.normal(),
            6.0,
        )
        .unwrap();
        assert_eq!(a, b);
    }
}
