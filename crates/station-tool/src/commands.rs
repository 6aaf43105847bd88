//! Command execution against a directory workspace

use crate::settings::{Command, Settings};
use station_lib::store::JsonDirStore;
use station_lib::{
    FeatureStore, Outputs, PipelineConfig, RunSummary, StoreError, create_cross_sections,
    create_line_event_table, create_point_event_table, create_route_by_length,
    locate_point_events, run,
};
use std::io::Write;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error(transparent)]
    Station(#[from] station_lib::Error),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Failed to encode output: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to write output: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the selected command; `describe` prints to `out`
pub fn execute(settings: &Settings, out: &mut impl Write) -> Result<(), ToolError> {
    let store = JsonDirStore::open(&settings.workspace)?;
    let overwrite = settings.overwrite;

    match &settings.command {
        Command::RouteByLength {
            input,
            id_field,
            output,
        } => {
            let routes = create_route_by_length(&store, input, id_field, output, overwrite)?;
            tracing::info!("Wrote {routes} routes to {output}");
        }
        Command::PointEvents {
            routes,
            id_field,
            interval,
            output,
        } => {
            let events =
                create_point_event_table(&store, routes, id_field, *interval, output, overwrite)?;
            tracing::info!("Wrote {events} point events to {output}");
        }
        Command::LineEvents {
            routes,
            id_field,
            output,
        } => {
            let events = create_line_event_table(&store, routes, id_field, output, overwrite)?;
            tracing::info!("Wrote {events} line events to {output}");
        }
        Command::Locate {
            routes,
            id_field,
            events,
            output,
            angle,
        } => {
            let stations = locate_point_events(
                &store,
                routes,
                id_field,
                events,
                output,
                (*angle).into(),
                overwrite,
            )?;
            tracing::info!("Located {stations} stations in {output}");
        }
        Command::PointsAlongLine {
            input,
            id_field,
            interval,
            points,
            route,
            angle,
        } => {
            let outputs = match route {
                Some(route) => Outputs::PointsAndRoute {
                    stations: points.clone(),
                    route: route.clone(),
                },
                None => Outputs::PointsOnly {
                    stations: points.clone(),
                },
            };
            let mut config = PipelineConfig::new(input, id_field, *interval, outputs);
            config.angle_mode = (*angle).into();
            config.overwrite = overwrite;
            report(&run(&store, &config)?);
        }
        Command::Stations {
            input,
            id_field,
            interval,
            width,
            route,
            points,
            cross_sections,
        } => {
            let outputs = Outputs::StationsAndCrossSections {
                stations: points.clone(),
                route: route.clone(),
                cross_sections: cross_sections.clone(),
                width: *width,
            };
            let mut config = PipelineConfig::new(input, id_field, *interval, outputs);
            config.overwrite = overwrite;
            report(&run(&store, &config)?);
        }
        Command::CrossSections {
            stations,
            id_field,
            width,
            output,
        } => {
            let sections =
                create_cross_sections(&store, stations, id_field, *width, output, overwrite)?;
            tracing::info!("Wrote {sections} cross-sections to {output}");
        }
        Command::Describe { dataset } => {
            let schema = store.describe(dataset)?;
            serde_json::to_writer_pretty(&mut *out, &schema)?;
            writeln!(out)?;
        }
    }
    Ok(())
}

/// Print a failed run to `err`, independent of the log filter
pub fn report_error(e: &ToolError, err: &mut impl Write) {
    tracing::debug!("{e:?}");
    // Nothing left to report to if stderr itself fails
    let _ = writeln!(err, "Error: {e}");
}

fn report(summary: &RunSummary) {
    tracing::info!(
        "Done: {} routes, {} events, {} stations, {} cross-sections",
        summary.routes,
        summary.events,
        summary.stations,
        summary.cross_sections
    );
}
