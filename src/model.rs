/// Core data types for the forecast table service.
///
/// This module defines the shared domain model imported by all other modules:
/// the normalized forecast rows, the gridpoint identifier, the assembled
/// output document, and the error taxonomy. It contains no I/O.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Forecast table
// ---------------------------------------------------------------------------

/// One hour of the normalized forecast table.
///
/// Every field is drawn from the same positional index across the parameter
/// series of a DWML document. Any field may be `None` when the upstream value
/// was empty or could not be converted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub time: Option<String>, // verbatim, e.g. "2024-01-01T00:00:00-06:00"
    pub temperature: Option<i64>,
    pub dew_point: Option<i64>,
    pub cloud_amount: Option<i64>,
    pub precipitation_probability: Option<i64>,
    pub qpf: Option<f64>,
}

/// Ordered forecast rows in timeline order, one per aligned series position.
///
/// Serializes as a bare JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ForecastTable {
    records: Vec<ForecastRecord>,
}

impl ForecastTable {
    pub fn new(records: Vec<ForecastRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[ForecastRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first(&self) -> Option<&ForecastRecord> {
        self.records.first()
    }

    /// First and last valid times of the table, when both parse as RFC 3339.
    ///
    /// Used for diagnostics only; the record times themselves are never
    /// reformatted.
    pub fn timeline_span(&self) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
        let parse = |record: &ForecastRecord| {
            record
                .time
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t.trim()).ok())
        };
        let start = parse(self.records.first()?)?;
        let end = parse(self.records.last()?)?;
        Some((start, end))
    }
}

impl IntoIterator for ForecastTable {
    type Item = ForecastRecord;
    type IntoIter = std::vec::IntoIter<ForecastRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

// ---------------------------------------------------------------------------
// Gridpoint types
// ---------------------------------------------------------------------------

/// Forecast office grid cell used by the gridpoint forecast endpoint.
///
/// Sourced from the `gridpoints` configuration entry. Any part may be absent;
/// extraction only proceeds when all three are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GridpointIdentifier {
    pub office: Option<String>,
    pub grid_x: Option<u32>,
    pub grid_y: Option<u32>,
}

impl GridpointIdentifier {
    /// Returns `(office, gridX, gridY)` only when every part is present.
    pub fn complete(&self) -> Option<(&str, u32, u32)> {
        Some((self.office.as_deref()?, self.grid_x?, self.grid_y?))
    }
}

/// The upstream `properties` object of a gridpoint forecast, passed through
/// without interpretation.
pub type GridpointProperties = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Output document
// ---------------------------------------------------------------------------

/// The terminal artifact. Keys are present only when their extractor ran.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<ForecastTable>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub forecast: Option<GridpointProperties>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Why a single retrieval request failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetrievalFailure {
    /// Non-2xx HTTP response.
    #[error("HTTP error: {0}")]
    Status(u16),
    /// Connection, TLS, or body read failure.
    #[error("transport error: {0}")]
    Transport(String),
}

/// Run-terminating errors. Value-level conversion problems never surface
/// here; they degrade to nulls inside the table extractor.
#[derive(Debug, thiserror::Error)]
pub enum ForecastError {
    /// Required configuration keys absent or null.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// A fetch against an upstream endpoint failed.
    #[error("Retrieval of {url} failed: {kind}")]
    Retrieval { url: String, kind: RetrievalFailure },
    /// The time-series document is not well-formed XML.
    #[error("Malformed forecast document: {0}")]
    Document(String),
    /// The upstream response could not be interpreted.
    #[error("Unexpected response from {url}: {detail}")]
    Decode { url: String, detail: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl ForecastError {
    pub fn is_retrieval(&self) -> bool {
        matches!(self, ForecastError::Retrieval { .. })
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, ForecastError::Configuration(_))
    }
}

pub type Result<T> = std::result::Result<T, ForecastError>;
