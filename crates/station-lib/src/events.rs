//! Point and line events along measured routes

use crate::{ConfigError, Result, Route, RouteId, step_range};

/// A single measure along a route, before it is realized as a point
#[derive(Clone, Debug, PartialEq)]
pub struct StationEvent {
    pub route_id: RouteId,
    pub measure: f64,
}

/// A linear event spanning a measure interval of a route
#[derive(Clone, Debug, PartialEq)]
pub struct LineEvent {
    pub route_id: RouteId,
    pub from_measure: f64,
    pub to_measure: f64,
}

/// Station events every `interval` measure units along `route`
///
/// Events start at the route's first measure and stop short of its last
/// measure (see [`step_range`]), in increasing measure order.
///
/// # Errors
/// [`ConfigError::InvalidInterval`] if `interval` is not a positive finite number.
pub fn generate_events(
    route: &Route,
    interval: f64,
) -> Result<impl Iterator<Item = StationEvent> + '_> {
    if !(interval.is_finite() && interval > 0.0) {
        return Err(ConfigError::InvalidInterval(interval).into());
    }
    let measures = step_range(route.first_measure(), route.last_measure(), interval)?;
    Ok(measures.map(move |measure| StationEvent {
        route_id: route.id().clone(),
        measure,
    }))
}

/// A line event covering the whole measure range of `route`
pub fn line_event(route: &Route) -> LineEvent {
    LineEvent {
        route_id: route.id().clone(),
        from_measure: route.first_measure(),
        to_measure: route.last_measure(),
    }
}
