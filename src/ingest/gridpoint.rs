/// api.weather.gov gridpoint forecast client
///
/// The gridpoint forecast is addressed by forecast office and grid x/y and
/// returns a GeoJSON feature. Only its `properties` object is kept, and it is
/// passed through without interpretation.
///
/// API Documentation: https://www.weather.gov/documentation/services-web-api

use tracing::{debug, info};

use crate::config::Endpoints;
use crate::ingest::http::{render_template, Transport, ACCEPT_GEOJSON};
use crate::logging::DataSource;
use crate::model::{ForecastError, GridpointIdentifier, GridpointProperties, Result};

/// Fetch the `properties` of the gridpoint forecast.
///
/// When any of office/gridX/gridY is absent this returns an empty mapping
/// and makes no request.
pub fn fetch(
    transport: &dyn Transport,
    endpoints: &Endpoints,
    identifier: &GridpointIdentifier,
) -> Result<GridpointProperties> {
    let Some((office, grid_x, grid_y)) = identifier.complete() else {
        debug!(
            source = %DataSource::Gridpoint,
            ?identifier,
            "incomplete gridpoint identifier; skipping request"
        );
        return Ok(GridpointProperties::new());
    };

    let url = render_template(
        &endpoints.gridpoint_forecast_url,
        &[
            ("office", office.to_string()),
            ("gridX", grid_x.to_string()),
            ("gridY", grid_y.to_string()),
        ],
    );
    info!(source = %DataSource::Gridpoint, %url, "fetching gridpoint forecast");

    let body = transport.get_text(&url, ACCEPT_GEOJSON)?;
    extract_properties(&url, &body)
}

/// Pull the `properties` object out of a gridpoint response body.
pub fn extract_properties(url: &str, body: &str) -> Result<GridpointProperties> {
    let mut response: serde_json::Value =
        serde_json::from_str(body).map_err(|e| ForecastError::Decode {
            url: url.to_string(),
            detail: format!("response is not JSON: {}", e),
        })?;

    match response.get_mut("properties").map(serde_json::Value::take) {
        Some(serde_json::Value::Object(properties)) => Ok(properties),
        Some(other) => Err(ForecastError::Decode {
            url: url.to_string(),
            detail: format!("`properties` is not an object: {}", other),
        }),
        None => Err(ForecastError::Decode {
            url: url.to_string(),
            detail: "response has no `properties` field".to_string(),
        }),
    }
}
