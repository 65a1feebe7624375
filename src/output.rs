/// Output assembly and persistence.
///
/// The table and the gridpoint properties are placed side by side under
/// `table` and `forecast`; nothing is merged or cross-referenced.

use std::path::Path;

use serde_json::Value;

use crate::model::{ForecastTable, GridpointProperties, OutputDocument, Result};

pub const DEFAULT_OUTPUT_PATH: &str = "./forecast.json";

pub fn assemble(
    table: Option<ForecastTable>,
    forecast: Option<GridpointProperties>,
) -> OutputDocument {
    OutputDocument { table, forecast }
}

/// Write the document as JSON.
///
/// The document is serialized completely before the file is touched.
pub fn write_output(document: &OutputDocument, path: impl AsRef<Path>) -> Result<()> {
    let json = serde_json::to_string(document)?;
    std::fs::write(path, json)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Current conditions
// ---------------------------------------------------------------------------

/// "Now" from the first table row next to the current day/night period.
///
/// The period's temperature is that period's predicted high or low.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub now_temperature: Option<i64>,
    pub period_name: Option<String>,
    pub predicted_temperature: Option<i64>,
    pub temperature_unit: Option<String>,
    pub detailed_forecast: Option<String>,
}

impl CurrentConditions {
    /// Returns `None` when neither a table row nor a forecast period exists.
    pub fn from_output(document: &OutputDocument) -> Option<Self> {
        let now = document.table.as_ref().and_then(ForecastTable::first);
        let period = document
            .forecast
            .as_ref()
            .and_then(|f| f.get("periods"))
            .and_then(Value::as_array)
            .and_then(|periods| periods.first());

        if now.is_none() && period.is_none() {
            return None;
        }

        let text = |key: &str| {
            period
                .and_then(|p| p.get(key))
                .and_then(Value::as_str)
                .map(String::from)
        };

        Some(Self {
            now_temperature: now.and_then(|r| r.temperature),
            period_name: text("name"),
            predicted_temperature: period
                .and_then(|p| p.get("temperature"))
                .and_then(Value::as_i64),
            temperature_unit: text("temperatureUnit"),
            detailed_forecast: text("detailedForecast"),
        })
    }

    pub fn summary(&self) -> String {
        let unit = self.temperature_unit.as_deref().unwrap_or("F");
        let fmt_temp = |t: Option<i64>| t.map_or_else(|| "n/a".to_string(), |t| format!("{} °{}", t, unit));

        let mut lines = vec![format!("Now: {}", fmt_temp(self.now_temperature))];
        if self.period_name.is_some() || self.predicted_temperature.is_some() {
            lines.push(format!(
                "Predicted ({}): {}",
                self.period_name.as_deref().unwrap_or("current period"),
                fmt_temp(self.predicted_temperature)
            ));
        }
        if let Some(desc) = &self.detailed_forecast {
            lines.push(desc.clone());
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ForecastRecord;
    use serde_json::json;

    fn table_with_temp(temp: Option<i64>) -> ForecastTable {
        ForecastTable::new(vec![ForecastRecord {
            time: Some("2024-01-01T00:00:00".to_string()),
            temperature: temp,
            dew_point: Some(20),
            cloud_amount: Some(50),
            precipitation_probability: Some(10),
            qpf: Some(0.05),
        }])
    }

    fn forecast_properties() -> GridpointProperties {
        match json!({
            "periods": [{
                "name": "Tonight",
                "temperature": 28,
                "temperatureUnit": "F",
                "detailedForecast": "Mostly clear, with a low around 28."
            }]
        }) {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_assemble_places_keys_side_by_side() {
        let doc = assemble(Some(table_with_temp(Some(32))), Some(forecast_properties()));
        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["table"][0]["temperature"], 32);
        assert_eq!(json["forecast"]["periods"][0]["name"], "Tonight");
        assert_eq!(json.as_object().unwrap().len(), 2);
    }

    #[test]
    fn test_assemble_table_only() {
        let json = serde_json::to_value(assemble(Some(table_with_temp(None)), None)).unwrap();
        assert!(json.get("forecast").is_none());
        assert!(json["table"][0]["temperature"].is_null());
    }

    #[test]
    fn test_write_output_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.json");
        let doc = assemble(Some(table_with_temp(Some(32))), Some(GridpointProperties::new()));

        write_output(&doc, &path).expect("write should succeed");

        let written: OutputDocument =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, doc);
    }

    #[test]
    fn test_current_conditions_from_both_paths() {
        let doc = assemble(Some(table_with_temp(Some(32))), Some(forecast_properties()));
        let current = CurrentConditions::from_output(&doc).expect("both paths present");
        assert_eq!(current.now_temperature, Some(32));
        assert_eq!(current.predicted_temperature, Some(28));
        assert_eq!(current.period_name.as_deref(), Some("Tonight"));

        let summary = current.summary();
        assert!(summary.contains("Now: 32 °F"), "got {}", summary);
        assert!(summary.contains("Predicted (Tonight): 28 °F"), "got {}", summary);
        assert!(summary.contains("low around 28"));
    }

    #[test]
    fn test_current_conditions_with_empty_forecast() {
        let doc = assemble(Some(table_with_temp(Some(32))), Some(GridpointProperties::new()));
        let current = CurrentConditions::from_output(&doc).unwrap();
        assert_eq!(current.predicted_temperature, None);
        assert_eq!(current.summary(), "Now: 32 °F");
    }

    #[test]
    fn test_current_conditions_none_without_data() {
        let doc = assemble(Some(ForecastTable::default()), Some(GridpointProperties::new()));
        assert!(CurrentConditions::from_output(&doc).is_none());
    }
}
