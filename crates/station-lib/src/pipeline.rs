//! Store-level station tools and the pipelines composed from them
//!
//! Each tool reads its inputs from a [`FeatureStore`] and computes its rows in
//! memory before it replaces the output dataset, so invalid input never
//! destroys a previous output. [`run`] chains the tools into the three station
//! pipelines selected by [`Outputs`].

use crate::config::validate_width;
use crate::store::{FeatureStore, FieldDef, FieldType, GeometryType, Row, Shape, StoreError, Value};
use crate::{
    AngleMode, ConfigError, Error, Outputs, PipelineConfig, Result, Route, RouteId, build_routes,
    cross_section_from_normal, generate_events, line_event, locate, normalize_degrees,
};
use std::collections::HashMap;
use std::fmt;

/// Measure of a point event or station
pub const MEASURE_FIELD: &str = "Measure";
/// Start measure of a line event
pub const FROM_MEASURE_FIELD: &str = "FromMeasure";
/// End measure of a line event
pub const TO_MEASURE_FIELD: &str = "ToMeasure";
/// Station angle in degrees
pub const ANGLE_FIELD: &str = "LOC_ANGLE";

const SCRATCH_ROUTE: &str = "scratch_route";
const SCRATCH_EVENTS: &str = "scratch_events";

/// Pipeline stage, attached to errors raised by [`run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Validate,
    Routes,
    Events,
    Locate,
    CrossSections,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Validate => "Validation",
            Stage::Routes => "Route creation",
            Stage::Events => "Event table creation",
            Stage::Locate => "Event location",
            Stage::CrossSections => "Cross-section creation",
        };
        f.write_str(name)
    }
}

/// Dataset sizes produced by one pipeline run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub routes: usize,
    pub events: usize,
    pub stations: usize,
    pub cross_sections: usize,
}

/// Build measured routes from the line feature class `input`
///
/// Lines sharing a value of `id_field` are merged into one route. The output is
/// a measured polyline feature class with the identifier field (same type and
/// length as on the input) in the input's spatial reference. Returns the
/// number of routes written.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn create_route_by_length<S: FeatureStore + ?Sized>(
    store: &S,
    input: &str,
    id_field: &str,
    output: &str,
    overwrite: bool,
) -> Result<usize> {
    let id_def = route_id_field(store, input, id_field)?;
    let schema = store.describe(input)?;
    if schema.geometry_type != Some(GeometryType::Polyline) {
        return Err(StoreError::GeometryMismatch {
            dataset: input.to_string(),
            reason: "routes can only be built from polylines".to_string(),
        }
        .into());
    }

    let rows = store.bulk_read(input, &[id_def.name.as_str()], &[])?;
    let mut lines = Vec::with_capacity(rows.len());
    for row in &rows {
        let id = row_id(input, row)?;
        let Some(parts) = row.shape.as_ref().and_then(Shape::to_lines) else {
            return Err(Error::InvalidGeometry {
                route_id: id,
                reason: "feature has no line geometry".to_string(),
            });
        };
        lines.push((id, parts));
    }
    let routes = build_routes(lines)?;

    let rows = routes
        .iter()
        .map(|route| {
            Row::with_shape(
                Shape::PolylineM {
                    line: route.line().clone(),
                    measures: route.measures().to_vec(),
                },
                vec![Value::from(route.id())],
            )
        })
        .collect();

    prepare_output(store, output, overwrite)?;
    store.create_feature_class(
        output,
        GeometryType::Polyline,
        schema.spatial_reference.as_deref(),
    )?;
    store.add_field(output, id_def.clone())?;
    let written = store.bulk_write(output, &[id_def.name.as_str()], rows)?;

    tracing::debug!("Wrote {written} routes from {input} to {output}");
    Ok(written)
}

/// Write a point event table with one row every `interval` along each route
///
/// The table holds the identifier field and a `Measure` double. Returns the
/// number of events written.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn create_point_event_table<S: FeatureStore + ?Sized>(
    store: &S,
    routes: &str,
    id_field: &str,
    interval: f64,
    output: &str,
    overwrite: bool,
) -> Result<usize> {
    if !(interval.is_finite() && interval > 0.0) {
        return Err(ConfigError::InvalidInterval(interval).into());
    }
    let id_def = route_id_field(store, routes, id_field)?;

    let mut rows = Vec::new();
    for route in read_routes(store, routes, &id_def)? {
        let before = rows.len();
        rows.extend(generate_events(&route, interval)?.map(|event| {
            Row::new(vec![
                Value::from(&event.route_id),
                Value::Double(event.measure),
            ])
        }));
        tracing::trace!("Route {} has {} events", route.id(), rows.len() - before);
    }

    prepare_output(store, output, overwrite)?;
    store.create_table(output)?;
    store.add_field(output, id_def.clone())?;
    store.add_field(output, FieldDef::new(MEASURE_FIELD, FieldType::Double))?;
    let written = store.bulk_write(output, &[id_def.name.as_str(), MEASURE_FIELD], rows)?;

    tracing::debug!("Wrote {written} point events to {output}");
    Ok(written)
}

/// Write a line event table with one row spanning each route
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn create_line_event_table<S: FeatureStore + ?Sized>(
    store: &S,
    routes: &str,
    id_field: &str,
    output: &str,
    overwrite: bool,
) -> Result<usize> {
    let id_def = route_id_field(store, routes, id_field)?;
    let rows = read_routes(store, routes, &id_def)?
        .iter()
        .map(|route| {
            let event = line_event(route);
            Row::new(vec![
                Value::from(&event.route_id),
                Value::Double(event.from_measure),
                Value::Double(event.to_measure),
            ])
        })
        .collect();

    prepare_output(store, output, overwrite)?;
    store.create_table(output)?;
    store.add_field(output, id_def.clone())?;
    store.add_field(output, FieldDef::new(FROM_MEASURE_FIELD, FieldType::Double))?;
    store.add_field(output, FieldDef::new(TO_MEASURE_FIELD, FieldType::Double))?;
    let written = store.bulk_write(
        output,
        &[id_def.name.as_str(), FROM_MEASURE_FIELD, TO_MEASURE_FIELD],
        rows,
    )?;

    tracing::debug!("Wrote {written} line events to {output}");
    Ok(written)
}

/// Locate the point events of `events` on `routes`
///
/// Writes a point feature class carrying the identifier, `Measure` and the
/// station angle in `LOC_ANGLE`. Events whose route is missing, or whose
/// measure is null, are skipped with a warning. Returns the number of stations
/// written.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn locate_point_events<S: FeatureStore + ?Sized>(
    store: &S,
    routes: &str,
    id_field: &str,
    events: &str,
    output: &str,
    angle_mode: AngleMode,
    overwrite: bool,
) -> Result<usize> {
    let id_def = route_id_field(store, routes, id_field)?;
    let event_id = route_id_field(store, events, id_field)?;
    let measure = required_field(store, events, MEASURE_FIELD)?;
    let spatial_reference = store.describe(routes)?.spatial_reference;

    let routes = read_routes(store, routes, &id_def)?;
    let by_id: HashMap<&RouteId, &Route> = routes.iter().map(|r| (r.id(), r)).collect();

    let event_rows = store.bulk_read(
        events,
        &[event_id.name.as_str(), measure.name.as_str()],
        &[],
    )?;
    let mut rows = Vec::with_capacity(event_rows.len());
    let mut skipped = 0usize;
    for row in &event_rows {
        let id = row_id(events, row)?;
        let Some(route) = by_id.get(&id) else {
            tracing::warn!("Skipping event on unknown route {id}");
            skipped += 1;
            continue;
        };
        let Some(m) = row.values.get(1).and_then(Value::as_f64) else {
            tracing::warn!("Skipping event on route {id} without a measure");
            skipped += 1;
            continue;
        };

        let station = locate(route, m)?;
        rows.push(Row::with_shape(
            Shape::Point {
                point: station.point,
                m: Some(station.measure),
            },
            vec![
                Value::from(&station.route_id),
                Value::Double(station.measure),
                Value::Double(station.angle(angle_mode)),
            ],
        ));
    }

    prepare_output(store, output, overwrite)?;
    store.create_feature_class(output, GeometryType::Point, spatial_reference.as_deref())?;
    store.add_field(output, id_def.clone())?;
    store.add_field(output, FieldDef::new(MEASURE_FIELD, FieldType::Double))?;
    store.add_field(output, FieldDef::new(ANGLE_FIELD, FieldType::Double))?;
    let written = store.bulk_write(
        output,
        &[id_def.name.as_str(), MEASURE_FIELD, ANGLE_FIELD],
        rows,
    )?;

    if skipped > 0 {
        tracing::warn!("{skipped} events of {events} could not be located");
    }
    tracing::debug!("Wrote {written} stations to {output}");
    Ok(written)
}

/// Build cross-sections of `width` through every station of `stations`
///
/// Stations are read ordered by identifier and measure, and their `LOC_ANGLE`
/// is taken as the normal of the route. Writes a polyline feature class with
/// the identifier and `Measure`. Returns the number of cross-sections written.
pub fn create_cross_sections<S: FeatureStore + ?Sized>(
    store: &S,
    stations: &str,
    id_field: &str,
    width: f64,
    output: &str,
    overwrite: bool,
) -> Result<usize> {
    cross_sections_from_stations(
        store,
        stations,
        id_field,
        AngleMode::Normal,
        width,
        output,
        overwrite,
    )
}

#[cfg_attr(feature = "profiling", profiling::function)]
fn cross_sections_from_stations<S: FeatureStore + ?Sized>(
    store: &S,
    stations: &str,
    id_field: &str,
    angle_mode: AngleMode,
    width: f64,
    output: &str,
    overwrite: bool,
) -> Result<usize> {
    validate_width(width)?;
    let id_def = route_id_field(store, stations, id_field)?;
    let measure = required_field(store, stations, MEASURE_FIELD)?;
    let angle = required_field(store, stations, ANGLE_FIELD)?;
    let schema = store.describe(stations)?;
    if schema.geometry_type != Some(GeometryType::Point) {
        return Err(StoreError::GeometryMismatch {
            dataset: stations.to_string(),
            reason: "cross-sections need station points".to_string(),
        }
        .into());
    }

    let station_rows = store.bulk_read(
        stations,
        &[id_def.name.as_str(), measure.name.as_str(), angle.name.as_str()],
        &[id_def.name.as_str(), measure.name.as_str()],
    )?;

    let mut rows = Vec::with_capacity(station_rows.len());
    for row in station_rows {
        let id = row_id(stations, &row)?;
        let Some(Shape::Point { point, .. }) = row.shape else {
            return Err(Error::InvalidGeometry {
                route_id: id,
                reason: "station has no point geometry".to_string(),
            });
        };
        let (Some(m), Some(degrees)) = (
            row.values.get(1).and_then(Value::as_f64),
            row.values.get(2).and_then(Value::as_f64),
        ) else {
            return Err(StoreError::TypeMismatch {
                dataset: stations.to_string(),
                reason: format!("station on route {id} lacks a measure or angle"),
            }
            .into());
        };
        let normal = match angle_mode {
            AngleMode::Normal => degrees,
            AngleMode::Tangent => normalize_degrees(degrees + 90.0),
        };

        let section = cross_section_from_normal(id, m, point, normal, width)?;
        rows.push(Row::with_shape(
            Shape::from(section.geometry),
            vec![Value::from(&section.route_id), Value::Double(section.measure)],
        ));
    }

    prepare_output(store, output, overwrite)?;
    store.create_feature_class(
        output,
        GeometryType::Polyline,
        schema.spatial_reference.as_deref(),
    )?;
    store.add_field(output, id_def.clone())?;
    store.add_field(output, FieldDef::new(MEASURE_FIELD, FieldType::Double))?;
    let written = store.bulk_write(output, &[id_def.name.as_str(), MEASURE_FIELD], rows)?;

    tracing::debug!("Wrote {written} cross-sections to {output}");
    Ok(written)
}

/// Run the station pipeline selected by `config.outputs`
///
/// Routes are built from the input lines, stepped into a scratch event table,
/// located as station points and, when requested, expanded into cross-sections.
/// Scratch datasets are removed on every exit path. Errors carry the [`Stage`]
/// that raised them; outputs completed before a failing stage are kept.
pub fn run<S: FeatureStore + ?Sized>(store: &S, config: &PipelineConfig) -> Result<RunSummary> {
    #[cfg(feature = "profiling")]
    profiling::scope!("pipeline::run");

    tracing::info!(
        "Running {} station pipeline on {} every {} units",
        describe_outputs(config),
        config.input,
        config.station_interval
    );

    validate(store, config).map_err(|e| e.in_stage(Stage::Validate))?;
    let field = config.route_id_field.as_str();
    let mut summary = RunSummary::default();

    let scratch_route;
    let route = match config.outputs.route() {
        Some(route) => route,
        None => {
            scratch_route = Scratch::reserve(store, SCRATCH_ROUTE)
                .map_err(|e| e.in_stage(Stage::Routes))?;
            scratch_route.name.as_str()
        }
    };
    summary.routes = create_route_by_length(store, &config.input, field, route, config.overwrite)
        .map_err(|e| e.in_stage(Stage::Routes))?;
    tracing::info!("Created {} routes in {route}", summary.routes);

    let events =
        Scratch::reserve(store, SCRATCH_EVENTS).map_err(|e| e.in_stage(Stage::Events))?;
    summary.events = create_point_event_table(
        store,
        route,
        field,
        config.station_interval,
        &events.name,
        true,
    )
    .map_err(|e| e.in_stage(Stage::Events))?;
    tracing::info!("Generated {} station events", summary.events);

    let stations = config.outputs.stations();
    summary.stations = locate_point_events(
        store,
        route,
        field,
        &events.name,
        stations,
        config.angle_mode,
        config.overwrite,
    )
    .map_err(|e| e.in_stage(Stage::Locate))?;
    tracing::info!("Located {} stations in {stations}", summary.stations);

    if let Some((cross_sections, width)) = config.outputs.cross_sections() {
        summary.cross_sections = cross_sections_from_stations(
            store,
            stations,
            field,
            config.angle_mode,
            width,
            cross_sections,
            config.overwrite,
        )
        .map_err(|e| e.in_stage(Stage::CrossSections))?;
        tracing::info!(
            "Built {} cross-sections in {cross_sections}",
            summary.cross_sections
        );
    }

    Ok(summary)
}

fn describe_outputs(config: &PipelineConfig) -> &'static str {
    match config.outputs {
        Outputs::PointsOnly { .. } => "points-only",
        Outputs::PointsAndRoute { .. } => "points-and-route",
        Outputs::StationsAndCrossSections { .. } => "cross-section",
    }
}

/// Everything that can be checked before the first dataset is written
fn validate<S: FeatureStore + ?Sized>(store: &S, config: &PipelineConfig) -> Result<()> {
    config.validate()?;
    route_id_field(store, &config.input, &config.route_id_field)?;
    if !config.overwrite {
        for name in config.outputs.names() {
            if store.exists(name)? {
                return Err(StoreError::DatasetExists(name.to_string()).into());
            }
        }
    }
    Ok(())
}

/// A field that must exist on `dataset`
fn required_field<S: FeatureStore + ?Sized>(
    store: &S,
    dataset: &str,
    field: &str,
) -> Result<FieldDef> {
    match store.field(dataset, field) {
        Ok(def) => Ok(def),
        Err(StoreError::FieldNotFound { dataset, field }) => {
            Err(ConfigError::MissingField { dataset, field }.into())
        }
        Err(e) => Err(e.into()),
    }
}

/// The route identifier field of `dataset`, checked for a usable type
fn route_id_field<S: FeatureStore + ?Sized>(
    store: &S,
    dataset: &str,
    field: &str,
) -> Result<FieldDef> {
    let def = required_field(store, dataset, field)?;
    if !def.field_type.is_route_id_type() {
        return Err(ConfigError::UnsupportedIdField {
            field: def.name,
            field_type: def.field_type,
        }
        .into());
    }
    Ok(def)
}

/// Clear the way for `output`, replacing it only when allowed
fn prepare_output<S: FeatureStore + ?Sized>(store: &S, output: &str, overwrite: bool) -> Result<()> {
    if store.exists(output)? {
        if !overwrite {
            return Err(StoreError::DatasetExists(output.to_string()).into());
        }
        tracing::debug!("Replacing existing dataset {output}");
        store.delete(output)?;
    }
    Ok(())
}

/// The route identifier stored as the first value of `row`
fn row_id(dataset: &str, row: &Row) -> Result<RouteId> {
    let id = match row.values.first() {
        Some(value) => RouteId::try_from(value),
        None => Err("row has no identifier".to_string()),
    };
    id.map_err(|reason| {
        StoreError::TypeMismatch {
            dataset: dataset.to_string(),
            reason,
        }
        .into()
    })
}

/// Measured routes stored in `dataset`
fn read_routes<S: FeatureStore + ?Sized>(
    store: &S,
    dataset: &str,
    id_def: &FieldDef,
) -> Result<Vec<Route>> {
    let rows = store.bulk_read(dataset, &[id_def.name.as_str()], &[])?;
    rows.into_iter()
        .map(|row| {
            let id = row_id(dataset, &row)?;
            match row.shape {
                Some(Shape::PolylineM { line, measures }) => Route::from_measured(id, line, measures),
                _ => Err(StoreError::GeometryMismatch {
                    dataset: dataset.to_string(),
                    reason: format!("route {id} has no measured polyline"),
                }
                .into()),
            }
        })
        .collect()
}

/// Scratch dataset name, deleted with the guard if it was created
struct Scratch<'a, S: FeatureStore + ?Sized> {
    store: &'a S,
    name: String,
}

impl<'a, S: FeatureStore + ?Sized> Scratch<'a, S> {
    fn reserve(store: &'a S, base: &str) -> Result<Self> {
        let name = store.unique_name(base)?;
        tracing::trace!("Reserved scratch dataset {name}");
        Ok(Self { store, name })
    }
}

impl<S: FeatureStore + ?Sized> Drop for Scratch<'_, S> {
    fn drop(&mut self) {
        let removed = match self.store.exists(&self.name) {
            Ok(true) => self.store.delete(&self.name),
            Ok(false) => return,
            Err(e) => Err(e),
        };
        match removed {
            Ok(()) => tracing::debug!("Removed scratch dataset {}", self.name),
            Err(e) => tracing::warn!("Failed to remove scratch dataset {}: {}", self.name, e),
        }
    }
}
