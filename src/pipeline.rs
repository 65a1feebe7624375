/// Sequential composition of one run.
///
/// The table path runs first, then the gridpoint path. Neither reads the
/// other's output. Any error aborts the run before assembly, so a failed
/// run never produces a partial document and never touches the output file.
///
/// Failures are logged here, at the step that produced them, so the
/// `source` field names the extractor that failed regardless of which
/// endpoint templates are configured.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::info;

use crate::config::{Endpoints, WeatherConfig};
use crate::ingest::http::Transport;
use crate::ingest::{dwml, gridpoint};
use crate::logging::{DataSource, log_failure};
use crate::model::{ForecastTable, OutputDocument, Result};
use crate::output::{assemble, write_output};
use crate::resolve::{self, ExtractionPlan, TableSource};
use crate::schedule;

// ---------------------------------------------------------------------------
// Full Run
// ---------------------------------------------------------------------------

/// Everything a scheduled run needs besides the transport.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub config_path: PathBuf,
    /// Parse this DWML document instead of fetching one.
    pub input: Option<PathBuf>,
    pub output: PathBuf,
    /// Upper bound of the random pre-run delay.
    pub max_delay: Duration,
}

/// Load, resolve, wait, extract, and write the output file.
///
/// `connect` builds the transport from the loaded configuration (the user
/// agent lives there). The output file is written only after both
/// extraction paths succeeded.
pub fn run_to_file<T, F>(options: &RunOptions, connect: F) -> Result<OutputDocument>
where
    T: Transport,
    F: FnOnce(&WeatherConfig) -> Result<T>,
{
    let config = load_config(&options.config_path, options.input.is_some())
        .inspect_err(|e| log_failure(DataSource::Config, "load configuration", e))?;
    let plan = resolve::resolve(&config, options.input.as_deref())
        .inspect_err(|e| log_failure(DataSource::Config, "resolve extraction paths", e))?;

    schedule::sleep_before_run(options.max_delay);

    let transport =
        connect(&config).inspect_err(|e| log_failure(DataSource::System, "build HTTP client", e))?;
    let document = execute(&plan, &transport, &config.endpoints)?;

    write_output(&document, &options.output)
        .inspect_err(|e| log_failure(DataSource::System, "write output", e))?;
    info!(source = %DataSource::System, path = %options.output.display(), "wrote forecast");

    Ok(document)
}

/// With a supplied document the configuration only matters for gridpoints,
/// so a missing file is treated as an empty configuration.
pub fn load_config(path: &Path, has_input: bool) -> Result<WeatherConfig> {
    if has_input && !path.exists() {
        info!(
            source = %DataSource::Config,
            path = %path.display(),
            "no configuration file; gridpoint forecast disabled"
        );
        return Ok(WeatherConfig::default());
    }
    WeatherConfig::from_file(path)
}

// ---------------------------------------------------------------------------
// Extraction
// ---------------------------------------------------------------------------

pub fn execute(
    plan: &ExtractionPlan,
    transport: &dyn Transport,
    endpoints: &Endpoints,
) -> Result<OutputDocument> {
    let table = extract_table(&plan.table, transport, endpoints)
        .inspect_err(|e| log_failure(DataSource::Dwml, "forecast table", e))?;
    info!(source = %DataSource::Dwml, records = table.len(), "forecast table ready");

    let forecast = match &plan.gridpoint {
        Some(identifier) => {
            let properties = gridpoint::fetch(transport, endpoints, identifier)
                .inspect_err(|e| log_failure(DataSource::Gridpoint, "gridpoint forecast", e))?;
            info!(source = %DataSource::Gridpoint, keys = properties.len(), "gridpoint forecast ready");
            Some(properties)
        }
        None => None,
    };

    Ok(assemble(Some(table), forecast))
}

fn extract_table(
    source: &TableSource,
    transport: &dyn Transport,
    endpoints: &Endpoints,
) -> Result<ForecastTable> {
    let document = match source {
        TableSource::Supplied(path) => {
            info!(source = %DataSource::Dwml, path = %path.display(), "using supplied forecast document");
            dwml::ForecastDocument::from_file(path)?
        }
        TableSource::Remote { latitude, longitude } => {
            dwml::fetch(transport, endpoints, *latitude, *longitude)?
        }
    };
    dwml::parse(&document)
}

#[cfg(test)]
mod tests {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::model::{ForecastError, RetrievalFailure};

    const TABLE: &str = r#"<?xml version="1.0" encoding="ISO-8859-1"?>
<dwml version="1.0"><data>
  <time-layout><start-valid-time>2024-05-01T13:00:00-05:00</start-valid-time></time-layout>
  <parameters>
    <temperature type="hourly"><value>68</value></temperature>
    <temperature type="dew point"><value>52</value></temperature>
    <cloud-amount type="total"><value>78</value></cloud-amount>
    <probability-of-precipitation type="floating"><value>15</value></probability-of-precipitation>
    <hourly-qpf type="floating"><value>0.0000</value></hourly-qpf>
  </parameters>
</data></dwml>"#;

    /// Answers table URLs (anything with `lat=`) and fails everything else.
    struct TableOnly;

    impl Transport for TableOnly {
        fn get_text(&self, url: &str, _accept: &str) -> Result<String> {
            if url.contains("lat=") {
                Ok(TABLE.to_string())
            } else {
                Err(ForecastError::Retrieval {
                    url: url.to_string(),
                    kind: RetrievalFailure::Status(500),
                })
            }
        }
    }

    /// In-memory sink for captured log lines.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured<R>(f: impl FnOnce() -> R) -> (R, String) {
        let buf = SharedBuf::default();
        let writer = buf.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let result = tracing::subscriber::with_default(subscriber, f);
        let text = String::from_utf8_lossy(&buf.0.lock().unwrap()).into_owned();
        (result, text)
    }

    fn plan_with_gridpoint() -> ExtractionPlan {
        ExtractionPlan {
            table: TableSource::Remote { latitude: 40.69, longitude: -89.59 },
            gridpoint: Some(crate::model::GridpointIdentifier {
                office: Some("ILX".to_string()),
                grid_x: Some(45),
                grid_y: Some(71),
            }),
        }
    }

    #[test]
    fn test_gridpoint_failure_logged_as_gridpoint_with_custom_template() {
        // A self-hosted mirror whose path has no "/gridpoints/" segment.
        let endpoints = Endpoints {
            forecast_table_url: "http://mirror.local/table?lat={latitude}&lon={longitude}".to_string(),
            gridpoint_forecast_url: "http://mirror.local/fc/{office}/{gridX}/{gridY}".to_string(),
        };

        let (result, logs) = captured(|| execute(&plan_with_gridpoint(), &TableOnly, &endpoints));

        assert!(result.is_err());
        let failures: Vec<_> = logs.lines().filter(|l| l.contains("failure=")).collect();
        assert_eq!(failures.len(), 1, "one failure line expected:\n{}", logs);
        assert!(
            failures[0].contains("source=GRIDPOINT"),
            "gridpoint failure attributed to the wrong source: {}",
            failures[0]
        );
    }

    #[test]
    fn test_table_failure_logged_as_dwml() {
        let endpoints = Endpoints {
            forecast_table_url: "http://mirror.local/fc/{latitude}/{longitude}".to_string(),
            ..Endpoints::default()
        };

        let (result, logs) = captured(|| execute(&plan_with_gridpoint(), &TableOnly, &endpoints));

        assert!(result.is_err());
        let failure = logs
            .lines()
            .find(|l| l.contains("failure="))
            .expect("table failure should be logged");
        assert!(failure.contains("source=DWML"), "got: {}", failure);
        assert!(failure.contains("failure=EXPECTED"), "5xx errors are expected: {}", failure);
    }

    #[test]
    fn test_load_config_missing_file_depends_on_input() {
        let missing = Path::new("/nonexistent/weather_config.yaml");
        assert_eq!(load_config(missing, true).unwrap(), WeatherConfig::default());
        assert!(load_config(missing, false).unwrap_err().is_configuration());
    }
}
