//! Pipeline configuration, validated eagerly before any dataset is written

use crate::store::FieldType;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Default values used by the station tools
pub mod defaults {
    /// Station spacing for the station + cross-section pipeline
    pub const STATION_INTERVAL: f64 = 10.0;
    /// Station spacing for the points-along-line pipelines
    pub const POINTS_INTERVAL: f64 = 100.0;
    /// Full width of a cross-section
    pub const CROSS_SECTION_WIDTH: f64 = 100.0;
    pub const ROUTE_OUTPUT: &str = "out_route";
    pub const POINTS_OUTPUT: &str = "out_points";
    pub const CROSS_SECTION_OUTPUT: &str = "out_xsection";
}

/// Configuration errors, detected before a run touches any output
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("station interval must be a positive number, got {0}")]
    InvalidInterval(f64),

    #[error("cross-section width must be a positive number, got {0}")]
    InvalidWidth(f64),

    #[error("step must be a non-zero finite number, got {0}")]
    InvalidStep(f64),

    #[error("{0} must not be empty")]
    EmptyName(&'static str),

    #[error("output dataset {0:?} is used more than once")]
    DuplicateOutput(String),

    #[error("field {field:?} not found in {dataset:?}")]
    MissingField { dataset: String, field: String },

    #[error("route identifier field {field:?} has type {field_type}; expected Short, Long or Text")]
    UnsupportedIdField { field: String, field_type: FieldType },
}

/// Which angle is reported in the `LOC_ANGLE` field of located stations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AngleMode {
    /// Direction of travel along the route
    Tangent,
    /// Perpendicular to the direction of travel, pointing left
    #[default]
    Normal,
}

impl fmt::Display for AngleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AngleMode::Tangent => f.write_str("tangent"),
            AngleMode::Normal => f.write_str("normal"),
        }
    }
}

/// Output datasets of a pipeline run; the variant selects the pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Outputs {
    /// Station points only; the route is kept in a scratch dataset
    PointsOnly { stations: String },
    /// Station points and the measured route
    PointsAndRoute { stations: String, route: String },
    /// Station points, the measured route and cross-sections of `width`
    StationsAndCrossSections {
        stations: String,
        route: String,
        cross_sections: String,
        width: f64,
    },
}

impl Outputs {
    /// The station point dataset
    pub fn stations(&self) -> &str {
        match self {
            Outputs::PointsOnly { stations }
            | Outputs::PointsAndRoute { stations, .. }
            | Outputs::StationsAndCrossSections { stations, .. } => stations,
        }
    }

    /// The persisted route dataset, if the variant keeps one
    pub fn route(&self) -> Option<&str> {
        match self {
            Outputs::PointsOnly { .. } => None,
            Outputs::PointsAndRoute { route, .. }
            | Outputs::StationsAndCrossSections { route, .. } => Some(route),
        }
    }

    /// The cross-section dataset and width, if requested
    pub fn cross_sections(&self) -> Option<(&str, f64)> {
        match self {
            Outputs::StationsAndCrossSections {
                cross_sections,
                width,
                ..
            } => Some((cross_sections, *width)),
            _ => None,
        }
    }

    /// Every output dataset name
    pub(crate) fn names(&self) -> Vec<&str> {
        let mut names = vec![self.stations()];
        names.extend(self.route());
        names.extend(self.cross_sections().map(|(name, _)| name));
        names
    }
}

/// Parameters of one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Input line feature class
    pub input: String,
    /// Identifier field shared by the input, the routes and every output
    pub route_id_field: String,
    /// Distance between stations, in measure units
    pub station_interval: f64,
    /// Angle written to `LOC_ANGLE` on the station points
    #[serde(default)]
    pub angle_mode: AngleMode,
    /// Replace existing output datasets instead of failing
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
    pub outputs: Outputs,
}

fn default_overwrite() -> bool {
    true
}

impl PipelineConfig {
    pub fn new(
        input: impl Into<String>,
        route_id_field: impl Into<String>,
        station_interval: f64,
        outputs: Outputs,
    ) -> Self {
        Self {
            input: input.into(),
            route_id_field: route_id_field.into(),
            station_interval,
            angle_mode: AngleMode::default(),
            overwrite: default_overwrite(),
            outputs,
        }
    }

    /// Check every parameter that can be checked without reading data
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.input.trim().is_empty() {
            return Err(ConfigError::EmptyName("input dataset"));
        }
        if self.route_id_field.trim().is_empty() {
            return Err(ConfigError::EmptyName("route identifier field"));
        }
        if !(self.station_interval.is_finite() && self.station_interval > 0.0) {
            return Err(ConfigError::InvalidInterval(self.station_interval));
        }
        if let Some((_, width)) = self.outputs.cross_sections() {
            validate_width(width)?;
        }

        let mut seen = HashSet::new();
        seen.insert(self.input.as_str());
        for name in self.outputs.names() {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyName("output dataset"));
            }
            if !seen.insert(name) {
                return Err(ConfigError::DuplicateOutput(name.to_string()));
            }
        }
        Ok(())
    }
}

/// A cross-section width must be a positive finite number
pub(crate) fn validate_width(width: f64) -> Result<(), ConfigError> {
    if width.is_finite() && width > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidWidth(width))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cross_section_config() -> PipelineConfig {
        PipelineConfig::new(
            "lines",
            "NAME",
            defaults::STATION_INTERVAL,
            Outputs::StationsAndCrossSections {
                stations: defaults::POINTS_OUTPUT.to_string(),
                route: defaults::ROUTE_OUTPUT.to_string(),
                cross_sections: defaults::CROSS_SECTION_OUTPUT.to_string(),
                width: defaults::CROSS_SECTION_WIDTH,
            },
        )
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = cross_section_config();
        assert_eq!(config.validate(), Ok(()));
        assert!(config.overwrite);
        assert_eq!(config.angle_mode, AngleMode::Normal);
    }

    #[test]
    fn test_rejects_bad_interval() {
        for interval in [0.0, -1.0, f64::NAN] {
            let mut config = cross_section_config();
            config.station_interval = interval;
            assert!(matches!(
                config.validate(),
                Err(ConfigError::InvalidInterval(_))
            ));
        }
    }

    #[test]
    fn test_rejects_bad_width() {
        let mut config = cross_section_config();
        if let Outputs::StationsAndCrossSections { width, .. } = &mut config.outputs {
            *width = 0.0;
        }
        assert_eq!(config.validate(), Err(ConfigError::InvalidWidth(0.0)));
    }

    #[test]
    fn test_rejects_duplicate_and_empty_outputs() {
        let config = PipelineConfig::new(
            "lines",
            "NAME",
            1.0,
            Outputs::PointsAndRoute {
                stations: "same".to_string(),
                route: "same".to_string(),
            },
        );
        assert_eq!(
            config.validate(),
            Err(ConfigError::DuplicateOutput("same".to_string()))
        );

        let config = PipelineConfig::new(
            "lines",
            "NAME",
            1.0,
            Outputs::PointsOnly {
                stations: "lines".to_string(),
            },
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateOutput(_))
        ));

        let config = PipelineConfig::new("lines", " ", 1.0, Outputs::PointsOnly {
            stations: "points".to_string(),
        });
        assert!(matches!(config.validate(), Err(ConfigError::EmptyName(_))));
    }

    #[test]
    fn test_outputs_accessors() {
        let outputs = Outputs::PointsOnly {
            stations: "pts".to_string(),
        };
        assert_eq!(outputs.stations(), "pts");
        assert_eq!(outputs.route(), None);
        assert_eq!(outputs.cross_sections(), None);

        let config = cross_section_config();
        assert_eq!(config.outputs.route(), Some(defaults::ROUTE_OUTPUT));
        assert_eq!(
            config.outputs.cross_sections(),
            Some((defaults::CROSS_SECTION_OUTPUT, defaults::CROSS_SECTION_WIDTH))
        );
    }

    #[test]
    fn test_config_from_json() {
        let json = r#"{
            "input": "streams",
            "route_id_field": "REACH",
            "station_interval": 25.0,
            "outputs": { "kind": "points_only", "stations": "stations" }
        }"#;
        let config: PipelineConfig = serde_json::from_str(json).unwrap();
        assert!(config.overwrite);
        assert_eq!(config.angle_mode, AngleMode::Normal);
        assert_eq!(config.outputs.stations(), "stations");
    }
}
