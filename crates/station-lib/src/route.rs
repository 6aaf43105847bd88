//! Measured routes built from simple polylines
//!
//! A [`Route`] is a polyline that carries a linear measure at every vertex. Routes
//! built here are always measured by length: `0` at the first vertex, the
//! cumulative 2D distance at each following vertex, and the total length at the
//! last one.

use crate::{Error, Result};
use geo::{Coord, LineString, MultiLineString};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Route identifier, taken from the identifier field of the input lines
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RouteId {
    Int(i64),
    Text(String),
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouteId::Int(value) => write!(f, "{value}"),
            RouteId::Text(value) => f.write_str(value),
        }
    }
}

impl From<i64> for RouteId {
    fn from(value: i64) -> Self {
        RouteId::Int(value)
    }
}

impl From<&str> for RouteId {
    fn from(value: &str) -> Self {
        RouteId::Text(value.to_string())
    }
}

impl From<String> for RouteId {
    fn from(value: String) -> Self {
        RouteId::Text(value)
    }
}

/// Measure bounds of one route
#[derive(Clone, Debug, PartialEq)]
pub struct MeasureRange {
    pub route_id: RouteId,
    pub first_measure: f64,
    pub last_measure: f64,
}

/// A polyline with a non-decreasing measure at every vertex
#[derive(Clone, Debug, PartialEq)]
pub struct Route {
    id: RouteId,
    line: LineString<f64>,
    /// One measure per vertex of `line`
    measures: Vec<f64>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl Route {
    /// Measure a single-part line by its cumulative 2D length
    ///
    /// # Errors
    /// [`Error::InvalidGeometry`] if the line has fewer than two vertices or a
    /// non-finite coordinate.
    pub fn by_length(id: RouteId, line: LineString<f64>) -> Result<Self> {
        validate_vertices(&id, &line)?;

        let mut measures = Vec::with_capacity(line.0.len());
        let mut total = 0.0;
        measures.push(total);
        for segment in line.lines() {
            total += segment.dx().hypot(segment.dy());
            measures.push(total);
        }

        Ok(Route { id, line, measures })
    }

    /// Rebuild a route from a stored measured polyline
    ///
    /// # Errors
    /// [`Error::InvalidGeometry`] if the vertex and measure counts differ, or the
    /// measures are not finite and non-decreasing.
    pub fn from_measured(id: RouteId, line: LineString<f64>, measures: Vec<f64>) -> Result<Self> {
        validate_vertices(&id, &line)?;
        if measures.len() != line.0.len() {
            return Err(Error::InvalidGeometry {
                route_id: id,
                reason: format!(
                    "{} measures for {} vertices",
                    measures.len(),
                    line.0.len()
                ),
            });
        }
        if measures.iter().any(|m| !m.is_finite()) || measures.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::InvalidGeometry {
                route_id: id,
                reason: "measures must be finite and non-decreasing".to_string(),
            });
        }
        Ok(Route { id, line, measures })
    }

    /// Route identifier
    #[inline]
    pub fn id(&self) -> &RouteId {
        &self.id
    }

    /// Vertex geometry
    #[inline]
    pub fn line(&self) -> &LineString<f64> {
        &self.line
    }

    /// Per-vertex measures, parallel to [`Route::line`]
    #[inline]
    pub fn measures(&self) -> &[f64] {
        &self.measures
    }

    /// Measure at the first vertex
    #[inline]
    pub fn first_measure(&self) -> f64 {
        self.measures[0]
    }

    /// Measure at the last vertex
    #[inline]
    pub fn last_measure(&self) -> f64 {
        self.measures[self.measures.len() - 1]
    }

    /// Measure span covered by this route
    #[inline]
    pub fn length(&self) -> f64 {
        self.last_measure() - self.first_measure()
    }

    pub fn measure_range(&self) -> MeasureRange {
        MeasureRange {
            route_id: self.id.clone(),
            first_measure: self.first_measure(),
            last_measure: self.last_measure(),
        }
    }

    /// Vertices paired with their measures
    pub fn measured_coords(&self) -> impl Iterator<Item = (Coord<f64>, f64)> + '_ {
        self.line.0.iter().copied().zip(self.measures.iter().copied())
    }
}

fn validate_vertices(id: &RouteId, line: &LineString<f64>) -> Result<()> {
    if line.0.len() < 2 {
        return Err(Error::InvalidGeometry {
            route_id: id.clone(),
            reason: format!("a route needs at least 2 vertices, got {}", line.0.len()),
        });
    }
    if line.0.iter().any(|c| !c.x.is_finite() || !c.y.is_finite()) {
        return Err(Error::InvalidGeometry {
            route_id: id.clone(),
            reason: "non-finite coordinate".to_string(),
        });
    }
    Ok(())
}

/// Build measured routes from identified line features
///
/// Lines that share an identifier are merged, in input order, into one route.
/// Each piece after the first must start where the previous one ended; the
/// shared vertex is kept once. Pieces are assumed to be digitized in the same
/// direction. Routes are returned in the order their identifier first appears.
///
/// # Errors
/// - [`Error::MultiPartGeometry`] when a feature has more than one part, or
///   when pieces sharing an identifier do not connect end to start
/// - [`Error::InvalidGeometry`] when a feature is empty or a merged route has
///   fewer than two vertices
pub fn build_routes<I, G>(lines: I) -> Result<Vec<Route>>
where
    I: IntoIterator<Item = (RouteId, G)>,
    G: Into<MultiLineString<f64>>,
{
    #[cfg(feature = "profiling")]
    profiling::scope!("route::build_routes");

    // Identifier, merged vertices and number of pieces merged so far
    let mut order: Vec<(RouteId, Vec<Coord<f64>>, usize)> = Vec::new();
    let mut index: HashMap<RouteId, usize> = HashMap::new();

    for (id, geometry) in lines {
        let geometry: MultiLineString<f64> = geometry.into();
        let piece = match geometry.0.len() {
            0 => {
                return Err(Error::InvalidGeometry {
                    route_id: id,
                    reason: "empty geometry".to_string(),
                });
            }
            1 => geometry.0.into_iter().next().map(|l| l.0).unwrap_or_default(),
            parts => return Err(Error::MultiPartGeometry { route_id: id, parts }),
        };

        let slot = *index.entry(id.clone()).or_insert_with(|| {
            order.push((id.clone(), Vec::new(), 0));
            order.len() - 1
        });
        let (_, coords, pieces) = &mut order[slot];
        *pieces += 1;
        let skip_joint = match (coords.last(), piece.first()) {
            (Some(end), Some(start)) if end == start => true,
            (Some(_), Some(_)) => {
                return Err(Error::MultiPartGeometry {
                    route_id: id,
                    parts: *pieces,
                });
            }
            _ => false,
        };
        if skip_joint {
            tracing::trace!("Joining piece of route {id} at a shared vertex");
        }
        coords.extend(piece.into_iter().skip(usize::from(skip_joint)));
    }

    order
        .into_iter()
        .map(|(id, coords, _)| {
            let route = Route::by_length(id, LineString::from(coords))?;
            tracing::debug!(
                "Built route {} with {} vertices, measures {}..{}",
                route.id(),
                route.line().0.len(),
                route.first_measure(),
                route.last_measure()
            );
            Ok(route)
        })
        .collect()
}
