use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use station_lib::{AngleMode, defaults};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Station Tool - Measured routes, station points and cross-sections from line datasets
pub struct Settings {
    /// Workspace directory; each dataset is a `<name>.json` file inside it
    #[clap(short, long, value_name = "DIR")]
    pub workspace: PathBuf,

    /// Replace output datasets that already exist
    #[clap(long, global = true, default_value = "true", action = ArgAction::Set)]
    pub overwrite: bool,

    /// Log debug messages (RUST_LOG takes precedence)
    #[clap(short, long, global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Build measured routes from a line feature class, measured by length
    RouteByLength {
        /// Input line feature class
        #[clap(long)]
        input: String,
        /// Route identifier field
        #[clap(long)]
        id_field: String,
        /// Output route feature class
        #[clap(long)]
        output: String,
    },

    /// Write a point event table with one event every interval along each route
    PointEvents {
        /// Measured route feature class
        #[clap(long)]
        routes: String,
        #[clap(long)]
        id_field: String,
        /// Distance between events, in measure units
        #[clap(long)]
        interval: f64,
        /// Output event table
        #[clap(long)]
        output: String,
    },

    /// Write a line event table covering each route
    LineEvents {
        #[clap(long)]
        routes: String,
        #[clap(long)]
        id_field: String,
        #[clap(long)]
        output: String,
    },

    /// Locate point events on routes as station points
    Locate {
        #[clap(long)]
        routes: String,
        #[clap(long)]
        id_field: String,
        /// Point event table with the identifier and Measure fields
        #[clap(long)]
        events: String,
        /// Output station point feature class
        #[clap(long)]
        output: String,
        /// Angle written to LOC_ANGLE
        #[clap(long, value_enum, default_value_t = Angle::Normal)]
        angle: Angle,
    },

    /// Generate station points along lines, optionally keeping the routes
    PointsAlongLine {
        /// Input line feature class
        #[clap(long)]
        input: String,
        #[clap(long)]
        id_field: String,
        #[clap(long, default_value_t = defaults::POINTS_INTERVAL)]
        interval: f64,
        /// Output station point feature class
        #[clap(long, default_value = defaults::POINTS_OUTPUT)]
        points: String,
        /// Keep the measured routes in this feature class
        #[clap(long)]
        route: Option<String>,
        #[clap(long, value_enum, default_value_t = Angle::Normal)]
        angle: Angle,
    },

    /// Generate routes, station points and cross-sections from lines
    Stations {
        #[clap(long)]
        input: String,
        #[clap(long)]
        id_field: String,
        #[clap(long, default_value_t = defaults::STATION_INTERVAL)]
        interval: f64,
        /// Full width of each cross-section
        #[clap(long, default_value_t = defaults::CROSS_SECTION_WIDTH)]
        width: f64,
        #[clap(long, default_value = defaults::ROUTE_OUTPUT)]
        route: String,
        #[clap(long, default_value = defaults::POINTS_OUTPUT)]
        points: String,
        #[clap(long, default_value = defaults::CROSS_SECTION_OUTPUT)]
        cross_sections: String,
    },

    /// Build cross-sections through existing station points
    CrossSections {
        /// Station point feature class with Measure and LOC_ANGLE (normal) fields
        #[clap(long)]
        stations: String,
        #[clap(long)]
        id_field: String,
        #[clap(long, default_value_t = defaults::CROSS_SECTION_WIDTH)]
        width: f64,
        #[clap(long)]
        output: String,
    },

    /// Print the schema of a dataset as JSON
    Describe {
        #[clap(long)]
        dataset: String,
    },
}

/// Command line spelling of [`AngleMode`]
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Angle {
    Normal,
    Tangent,
}

impl From<Angle> for AngleMode {
    fn from(angle: Angle) -> Self {
        match angle {
            Angle::Normal => AngleMode::Normal,
            Angle::Tangent => AngleMode::Tangent,
        }
    }
}

impl Settings {
    /// Parse the process arguments, exiting with usage on error
    pub fn from_cli() -> Self {
        match Settings::try_parse() {
            Ok(args) => args,
            Err(e) => e.exit(),
        }
    }
}
