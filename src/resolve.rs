/// Location resolution: decides which extraction paths a run takes.
///
/// The table path is always active, fed either by a pre-supplied document or
/// by a fetch for the configured coordinates. The gridpoint path is active
/// whenever the configuration has a `gridpoints` entry, independent of how
/// the table is sourced.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::WeatherConfig;
use crate::logging::DataSource;
use crate::model::{ForecastError, GridpointIdentifier, Result};

/// Where the forecast table comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    /// Parse this local document; no network request.
    Supplied(PathBuf),
    /// Fetch the document for these coordinates.
    Remote { latitude: f64, longitude: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionPlan {
    pub table: TableSource,
    /// `Some` when a `gridpoints` entry exists, even if incomplete.
    pub gridpoint: Option<GridpointIdentifier>,
}

/// Resolve the extraction plan for a run.
///
/// Fails with `ForecastError::Configuration` when no document is supplied and
/// the location or either coordinate is absent. Coordinates are checked for
/// presence only; `0.0` is a valid latitude or longitude.
pub fn resolve(config: &WeatherConfig, input: Option<&Path>) -> Result<ExtractionPlan> {
    let table = match input {
        Some(path) => TableSource::Supplied(path.to_path_buf()),
        None => {
            let location = config
                .location
                .as_ref()
                .ok_or_else(|| ForecastError::Configuration("missing location key".to_string()))?;
            match (location.latitude, location.longitude) {
                (Some(latitude), Some(longitude)) => TableSource::Remote { latitude, longitude },
                _ => {
                    return Err(ForecastError::Configuration(
                        "missing latitude or longitude key in location".to_string(),
                    ));
                }
            }
        }
    };

    let gridpoint = config.gridpoints.as_ref().map(GridpointIdentifier::from);

    debug!(source = %DataSource::Config, ?table, gridpoint = gridpoint.is_some(), "resolved extraction plan");
    Ok(ExtractionPlan { table, gridpoint })
}
