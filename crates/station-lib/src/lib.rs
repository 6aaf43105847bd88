//! Station Library - Linear Referencing for Station Points and Cross-Sections
//!
//! This library turns simple 2D polylines into measured routes, steps along those
//! routes at a fixed interval to produce station events, realizes the events as
//! station points with a local bearing, and builds perpendicular cross-section
//! lines of a given width through every station.
//!
//! # Architecture
//!
//! - **[`step_range`]**: Half-open float stepping used to place stations
//! - **[`Route`]**: Polyline with a cumulative-length measure at every vertex
//! - **[`StationEvent`]** / **[`LineEvent`]**: Abstract events along a route
//! - **[`locate`]**: Realizes a measure as a [`StationPoint`] with a bearing
//! - **[`build_cross_section`]**: Perpendicular 3-point line through a station
//! - **[`FeatureStore`]**: Storage seam for tables and feature classes
//! - **[`run`]**: The three station pipelines composed over a store
//!
//! # Conventions
//!
//! Bearings are in degrees, `0°` along the +X axis, increasing counter-clockwise,
//! normalized to `[0, 360)`. Cross-sections are drawn from the left of the route
//! to its right, following the direction of digitization.

mod config;
mod cross_section;
mod events;
mod locate;
pub mod pipeline;
mod route;
mod stepper;
pub mod store;

// Public API exports
pub use config::{AngleMode, ConfigError, Outputs, PipelineConfig, defaults};
pub use cross_section::{CrossSection, build_cross_section, cross_section_from_normal};
pub use events::{LineEvent, StationEvent, generate_events, line_event};
pub use locate::{StationPoint, locate, normalize_degrees};
pub use pipeline::{
    RunSummary, Stage, create_cross_sections, create_line_event_table, create_point_event_table,
    create_route_by_length, locate_point_events, run,
};
pub use route::{MeasureRange, Route, RouteId, build_routes};
pub use stepper::{StepRange, step_range};
pub use store::{FeatureStore, StoreError};

/// Error types for the station library
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Route {route_id} has {parts} parts; only single-part lines are supported")]
    MultiPartGeometry { route_id: RouteId, parts: usize },

    #[error("Invalid geometry for route {route_id}: {reason}")]
    InvalidGeometry { route_id: RouteId, reason: String },

    #[error("Measure {measure} is outside [{first}, {last}] on route {route_id}")]
    MeasureOutOfRange {
        route_id: RouteId,
        measure: f64,
        first: f64,
        last: f64,
    },

    #[error("Storage engine error: {0}")]
    Storage(#[from] StoreError),

    #[error("{stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Tag this error with the pipeline stage it surfaced in.
    ///
    /// Already tagged errors keep their innermost stage.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            Error::Stage { .. } => self,
            other => Error::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage that produced this error, if it was raised inside a pipeline
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The error with any stage tagging removed
    pub fn root(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
