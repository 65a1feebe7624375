/// Configuration loading for the forecast table service.
///
/// The configuration names the forecast location and, optionally, a forecast
/// office gridpoint. YAML is the default format; files ending in `.toml` are
/// read as TOML. Absent or null keys load as `None` and are only rejected by
/// the location resolver, which knows whether they are required.

use std::path::Path;

use serde::de::{self, Deserializer};
use serde::Deserialize;

use crate::model::{ForecastError, GridpointIdentifier, Result};

pub const DEFAULT_CONFIG_PATH: &str = "./weather_config.yaml";

pub const DEFAULT_FORECAST_TABLE_URL: &str =
    "https://forecast.weather.gov/MapClick.php?lat={latitude}&lon={longitude}&FcstType=digitalDWML";

pub const DEFAULT_GRIDPOINT_FORECAST_URL: &str =
    "https://api.weather.gov/gridpoints/{office}/{gridX},{gridY}/forecast";

/// api.weather.gov rejects requests without a User-Agent.
pub const DEFAULT_USER_AGENT: &str = concat!(
    env!("CARGO_PKG_NAME"),
    "/",
    env!("CARGO_PKG_VERSION")
);

// ---------------------------------------------------------------------------
// Configuration structures
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct WeatherConfig {
    #[serde(default)]
    pub location: Option<LocationConfig>,
    #[serde(default)]
    pub gridpoints: Option<GridpointConfig>,
    #[serde(default)]
    pub endpoints: Endpoints,
    #[serde(default)]
    pub user_agent: Option<String>,
}

/// WGS84 coordinates of the forecast point.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LocationConfig {
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GridpointConfig {
    #[serde(default)]
    pub office: Option<String>,
    #[serde(default, rename = "gridX", deserialize_with = "grid_index")]
    pub grid_x: Option<u32>,
    #[serde(default, rename = "gridY", deserialize_with = "grid_index")]
    pub grid_y: Option<u32>,
}

/// A grid index as it appears in hand-edited or generated configs.
#[derive(Deserialize)]
#[serde(untagged)]
enum GridValue {
    Int(u32),
    Float(f64),
    Text(String),
}

/// Accept `45`, `45.0`, and `"45"`; reject anything that is not a
/// non-negative whole number.
fn grid_index<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<GridValue>::deserialize(deserializer)? {
        Some(value) => value,
        None => return Ok(None),
    };
    let index = match value {
        GridValue::Int(n) => Some(n),
        GridValue::Float(f) if f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) => {
            Some(f as u32)
        }
        GridValue::Float(_) => None,
        GridValue::Text(text) => text.trim().parse::<u32>().ok(),
    };
    index
        .map(Some)
        .ok_or_else(|| de::Error::custom("grid index must be a non-negative whole number"))
}

impl From<&GridpointConfig> for GridpointIdentifier {
    fn from(config: &GridpointConfig) -> Self {
        GridpointIdentifier {
            office: config.office.clone(),
            grid_x: config.grid_x,
            grid_y: config.grid_y,
        }
    }
}

/// URL templates for the two upstream endpoints.
///
/// Placeholders: `{latitude}`, `{longitude}` for the table endpoint and
/// `{office}`, `{gridX}`, `{gridY}` for the gridpoint endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Endpoints {
    #[serde(default = "default_forecast_table_url")]
    pub forecast_table_url: String,
    #[serde(default = "default_gridpoint_forecast_url")]
    pub gridpoint_forecast_url: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            forecast_table_url: default_forecast_table_url(),
            gridpoint_forecast_url: default_gridpoint_forecast_url(),
        }
    }
}

fn default_forecast_table_url() -> String {
    DEFAULT_FORECAST_TABLE_URL.to_string()
}

fn default_gridpoint_forecast_url() -> String {
    DEFAULT_GRIDPOINT_FORECAST_URL.to_string()
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl WeatherConfig {
    /// Load configuration from a file, choosing the format by extension.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ForecastError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;

        let is_toml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

        if is_toml {
            Self::parse_toml(&contents)
        } else {
            Self::parse_yaml(&contents)
        }
    }

    pub fn parse_yaml(yaml: &str) -> Result<Self> {
        // An empty YAML document deserializes to unit, not a mapping.
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml)
            .map_err(|e| ForecastError::Configuration(format!("invalid YAML: {}", e)))
    }

    pub fn parse_toml(text: &str) -> Result<Self> {
        toml::from_str(text)
            .map_err(|e| ForecastError::Configuration(format!("invalid TOML: {}", e)))
    }

    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(DEFAULT_USER_AGENT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yaml_with_location_and_gridpoints() {
        let config = WeatherConfig::parse_yaml(
            "location:\n  latitude: 40.69\n  longitude: -89.59\n\
             gridpoints:\n  office: ILX\n  gridX: 45\n  gridY: 71\n",
        )
        .expect("valid YAML");

        let location = config.location.expect("location present");
        assert_eq!(location.latitude, Some(40.69));
        assert_eq!(location.longitude, Some(-89.59));

        let grid = config.gridpoints.expect("gridpoints present");
        assert_eq!(grid.office.as_deref(), Some("ILX"));
        assert_eq!(grid.grid_x, Some(45));
        assert_eq!(grid.grid_y, Some(71));
        assert_eq!(config.endpoints, Endpoints::default());
    }

    #[test]
    fn test_grid_indices_accept_strings_and_whole_floats() {
        let config = WeatherConfig::parse_yaml(
            "gridpoints:\n  office: ILX\n  gridX: \"45\"\n  gridY: 71.0\n",
        )
        .expect("numeric strings and whole floats are valid grid indices");
        let grid = config.gridpoints.unwrap();
        assert_eq!(grid.grid_x, Some(45));
        assert_eq!(grid.grid_y, Some(71));
        assert!(GridpointIdentifier::from(&grid).complete().is_some());
    }

    #[test]
    fn test_grid_indices_in_toml_strings() {
        let config = WeatherConfig::parse_toml(
            "[gridpoints]\noffice = \"ILX\"\ngridX = \"45\"\ngridY = 71\n",
        )
        .unwrap();
        let grid = config.gridpoints.unwrap();
        assert_eq!((grid.grid_x, grid.grid_y), (Some(45), Some(71)));
    }

    #[test]
    fn test_bad_grid_index_is_configuration_error() {
        for bad in ["gridX: 45.5", "gridX: -3", "gridX: \"forty-five\""] {
            let yaml = format!("gridpoints:\n  office: ILX\n  {}\n", bad);
            let result = WeatherConfig::parse_yaml(&yaml);
            assert!(
                matches!(result, Err(ForecastError::Configuration(_))),
                "{} should be rejected, got {:?}",
                bad,
                result
            );
        }
    }

    #[test]
    fn test_null_grid_index_loads_as_none() {
        let config = WeatherConfig::parse_yaml("gridpoints:\n  office: ILX\n  gridX: null\n").unwrap();
        assert_eq!(config.gridpoints.unwrap().grid_x, None);
    }

    #[test]
    fn test_null_keys_load_as_none() {
        let config = WeatherConfig::parse_yaml("location:\n  latitude: null\n  longitude: -89.5\n")
            .expect("null values are not a load error");
        let location = config.location.unwrap();
        assert!(location.latitude.is_none());
        assert_eq!(location.longitude, Some(-89.5));
    }

    #[test]
    fn test_null_location_entry_loads_as_none() {
        let config = WeatherConfig::parse_yaml("location:\n").unwrap();
        assert!(config.location.is_none());
    }

    #[test]
    fn test_empty_yaml_is_empty_config() {
        assert_eq!(WeatherConfig::parse_yaml("").unwrap(), WeatherConfig::default());
    }

    #[test]
    fn test_toml_config_with_endpoint_override() {
        let config = WeatherConfig::parse_toml(
            r#"
            user_agent = "backyard-station (ops@example.com)"

            [location]
            latitude = 40.69
            longitude = -89.59

            [endpoints]
            forecast_table_url = "http://localhost:8080/dwml?lat={latitude}&lon={longitude}"
            "#,
        )
        .expect("valid TOML");

        assert_eq!(config.user_agent(), "backyard-station (ops@example.com)");
        assert!(config.endpoints.forecast_table_url.starts_with("http://localhost:8080"));
        // Unset template keeps its default.
        assert_eq!(config.endpoints.gridpoint_forecast_url, DEFAULT_GRIDPOINT_FORECAST_URL);
    }

    #[test]
    fn test_from_file_selects_format_by_extension() {
        let dir = tempfile::tempdir().unwrap();

        let toml_path = dir.path().join("weather.toml");
        std::fs::write(&toml_path, "[gridpoints]\noffice = \"LOT\"\n").unwrap();
        let config = WeatherConfig::from_file(&toml_path).expect("TOML file should load");
        assert_eq!(config.gridpoints.unwrap().office.as_deref(), Some("LOT"));

        let yaml_path = dir.path().join("weather_config.yaml");
        std::fs::write(&yaml_path, "gridpoints:\n  office: LOT\n").unwrap();
        let config = WeatherConfig::from_file(&yaml_path).expect("YAML file should load");
        assert_eq!(config.gridpoints.unwrap().office.as_deref(), Some("LOT"));
    }

    #[test]
    fn test_missing_file_is_configuration_error() {
        let result = WeatherConfig::from_file("/nonexistent/weather_config.yaml");
        assert!(matches!(result, Err(ForecastError::Configuration(_))));
    }

    #[test]
    fn test_default_user_agent_names_crate() {
        let config = WeatherConfig::default();
        assert!(config.user_agent().starts_with("nws_forecast_table/"));
    }
}
