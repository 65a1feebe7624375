/// NWS digital DWML forecast table client
///
/// Retrieves the hourly "digital" forecast for a latitude/longitude from
/// forecast.weather.gov and normalizes it into a `ForecastTable`.
///
/// A DWML document carries each weather parameter as its own repeated
/// `<value>` array. Those arrays share one timeline upstream but are extracted
/// independently here, then combined by index: position `i` of every series
/// is the same forecast hour.
///
/// Documentation: https://graphical.weather.gov/xml/

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use roxmltree::{Document, Node};
use tracing::{debug, info, warn};

use crate::config::Endpoints;
use crate::ingest::http::{render_template, Transport, ACCEPT_XML};
use crate::logging::DataSource;
use crate::model::{ForecastError, ForecastRecord, ForecastTable, Result};

// ============================================================================
// Document
// ============================================================================

/// A well-formed DWML time-series document.
///
/// Holds the raw text; it is parsed again by each call to `parse`, which
/// keeps the type free of self-borrows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForecastDocument {
    xml: String,
}

impl ForecastDocument {
    /// Wrap XML text, rejecting anything that is not well-formed.
    pub fn from_xml(xml: impl Into<String>) -> Result<Self> {
        let xml = xml.into();
        Document::parse(&xml).map_err(|e| ForecastError::Document(e.to_string()))?;
        Ok(Self { xml })
    }

    /// Read a pre-supplied document from disk.
    ///
    /// Saved DWML is usually declared ISO-8859-1, so the bytes are decoded
    /// per the XML declaration rather than assumed to be UTF-8.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Self::from_xml(decode_document(&bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.xml
    }
}

/// Decode raw document bytes to text.
///
/// A declared non-UTF-8 encoding wins. Otherwise the bytes must be UTF-8,
/// falling back to Latin-1 (as windows-1252) when they are not.
pub fn decode_document(bytes: &[u8]) -> String {
    let declared = declared_encoding(bytes)
        .and_then(|label| encoding_rs::Encoding::for_label(label.as_bytes()))
        .filter(|encoding| *encoding != encoding_rs::UTF_8);

    if let Some(encoding) = declared {
        let (text, _had_errors) = encoding.decode_without_bom_handling(bytes);
        return text.into_owned();
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => text.trim_start_matches('\u{feff}').to_string(),
        Err(_) => {
            debug!(source = %DataSource::Dwml, "document is not UTF-8; decoding as Latin-1");
            let (text, _had_errors) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
            text.into_owned()
        }
    }
}

/// The `encoding` pseudo-attribute of the `<?xml ... ?>` declaration.
fn declared_encoding(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    if !bytes.starts_with(b"<?xml") {
        return None;
    }
    let end = bytes.windows(2).position(|w| w == b"?>")?;
    // The declaration itself is ASCII in every encoding DWML uses.
    let prolog = String::from_utf8_lossy(&bytes[..end]);
    let rest = &prolog[prolog.find("encoding")? + "encoding".len()..];
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let value = &rest[1..];
    Some(value[..value.find(quote)?].to_string())
}

// ============================================================================
// Parameter series
// ============================================================================

/// The six parameter series of the forecast table, in output column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeriesName {
    Time,
    Temperature,
    DewPoint,
    CloudAmount,
    PrecipitationProbability,
    Qpf,
}

impl SeriesName {
    pub const ALL: [SeriesName; 6] = [
        SeriesName::Time,
        SeriesName::Temperature,
        SeriesName::DewPoint,
        SeriesName::CloudAmount,
        SeriesName::PrecipitationProbability,
        SeriesName::Qpf,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SeriesName::Time => "time",
            SeriesName::Temperature => "temperature",
            SeriesName::DewPoint => "dew_point",
            SeriesName::CloudAmount => "cloud_amount",
            SeriesName::PrecipitationProbability => "precipitation_probability",
            SeriesName::Qpf => "qpf",
        }
    }

    /// Where the series lives in the document.
    fn path(&self) -> SeriesPath {
        match self {
            // .//start-valid-time
            SeriesName::Time => SeriesPath::direct("start-valid-time"),
            // .//temperature[@type="hourly"]/value
            SeriesName::Temperature => SeriesPath::values_of("temperature", Some("hourly")),
            // .//temperature[@type="dew point"]/value
            SeriesName::DewPoint => SeriesPath::values_of("temperature", Some("dew point")),
            // .//cloud-amount/value
            SeriesName::CloudAmount => SeriesPath::values_of("cloud-amount", None),
            // .//probability-of-precipitation/value
            SeriesName::PrecipitationProbability => {
                SeriesPath::values_of("probability-of-precipitation", None)
            }
            // .//hourly-qpf/value
            SeriesName::Qpf => SeriesPath::values_of("hourly-qpf", None),
        }
    }
}

impl fmt::Display for SeriesName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A descendant element, optionally filtered on its `type` attribute, and
/// optionally the named child elements holding the actual values.
struct SeriesPath {
    element: &'static str,
    type_attr: Option<&'static str>,
    child: Option<&'static str>,
}

impl SeriesPath {
    fn direct(element: &'static str) -> Self {
        Self { element, type_attr: None, child: None }
    }

    fn values_of(element: &'static str, type_attr: Option<&'static str>) -> Self {
        Self { element, type_attr, child: Some("value") }
    }

    fn matches(&self, node: &Node) -> bool {
        node.is_element()
            && node.tag_name().name() == self.element
            && self.type_attr.is_none_or(|t| node.attribute("type") == Some(t))
    }
}

/// Text of every node at `path`, in document order. `None` for nodes with no
/// text content.
fn raw_values<'a>(doc: &'a Document<'_>, path: &SeriesPath) -> Vec<Option<&'a str>> {
    let matched = doc.root_element().descendants().filter(|n| path.matches(n));
    match path.child {
        None => matched.map(|n| n.text()).collect(),
        Some(child) => matched
            .flat_map(|n| {
                n.children()
                    .filter(move |c| c.is_element() && c.tag_name().name() == child)
            })
            .map(|n| n.text())
            .collect(),
    }
}

/// An ordered sequence of values for one named parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSeries<T> {
    pub name: SeriesName,
    pub values: Vec<Option<T>>,
}

impl<T: Clone> ParameterSeries<T> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn at(&self, index: usize) -> Option<T> {
        self.values.get(index).cloned().flatten()
    }
}

// ============================================================================
// Value conversion
// ============================================================================

/// A single value that could not become its declared scalar type.
///
/// Contained within this module: every occurrence turns into a null at that
/// record position.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueConversionError {
    #[error("empty value")]
    Empty,
    #[error("cannot convert {text:?} to {target}")]
    Invalid { text: String, target: &'static str },
}

/// Convert one raw text value. Surrounding whitespace is ignored.
pub fn convert_value<T: FromStr>(
    text: Option<&str>,
    target: &'static str,
) -> std::result::Result<T, ValueConversionError> {
    let trimmed = text.map(str::trim).unwrap_or_default();
    if trimmed.is_empty() {
        return Err(ValueConversionError::Empty);
    }
    trimmed.parse().map_err(|_| ValueConversionError::Invalid {
        text: trimmed.to_string(),
        target,
    })
}

fn typed_series<T: FromStr>(
    doc: &Document<'_>,
    name: SeriesName,
    target: &'static str,
) -> ParameterSeries<T> {
    let values = raw_values(doc, &name.path())
        .into_iter()
        .enumerate()
        .map(|(index, text)| match convert_value(text, target) {
            Ok(value) => Some(value),
            Err(ValueConversionError::Empty) => None,
            Err(err) => {
                debug!(source = %DataSource::Dwml, series = %name, index, "{}", err);
                None
            }
        })
        .collect();
    ParameterSeries { name, values }
}

// ============================================================================
// Series set and alignment
// ============================================================================

/// Series lengths did not agree; records were truncated to the shortest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LengthMismatch {
    pub lengths: Vec<(SeriesName, usize)>,
    pub aligned_len: usize,
}

impl fmt::Display for LengthMismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lengths: Vec<String> = self
            .lengths
            .iter()
            .map(|(name, len)| format!("{}={}", name, len))
            .collect();
        write!(
            f,
            "series lengths differ ({}); truncated to {} records",
            lengths.join(", "),
            self.aligned_len
        )
    }
}

/// Every parameter series extracted from one document, before alignment.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSet {
    pub time: ParameterSeries<String>,
    pub temperature: ParameterSeries<i64>,
    pub dew_point: ParameterSeries<i64>,
    pub cloud_amount: ParameterSeries<i64>,
    pub precipitation_probability: ParameterSeries<i64>,
    pub qpf: ParameterSeries<f64>,
}

impl SeriesSet {
    pub fn lengths(&self) -> Vec<(SeriesName, usize)> {
        vec![
            (self.time.name, self.time.len()),
            (self.temperature.name, self.temperature.len()),
            (self.dew_point.name, self.dew_point.len()),
            (self.cloud_amount.name, self.cloud_amount.len()),
            (self.precipitation_probability.name, self.precipitation_probability.len()),
            (self.qpf.name, self.qpf.len()),
        ]
    }

    /// Number of records the table will hold: the shortest series length.
    pub fn aligned_len(&self) -> usize {
        self.lengths().into_iter().map(|(_, len)| len).min().unwrap_or(0)
    }

    pub fn length_mismatch(&self) -> Option<LengthMismatch> {
        let lengths = self.lengths();
        let aligned_len = self.aligned_len();
        if lengths.iter().all(|(_, len)| *len == aligned_len) {
            return None;
        }
        Some(LengthMismatch { lengths, aligned_len })
    }

    /// Build the record for one aligned position.
    pub fn record_at(&self, index: usize) -> ForecastRecord {
        ForecastRecord {
            time: self.time.at(index),
            temperature: self.temperature.at(index),
            dew_point: self.dew_point.at(index),
            cloud_amount: self.cloud_amount.at(index),
            precipitation_probability: self.precipitation_probability.at(index),
            qpf: self.qpf.at(index),
        }
    }

    pub fn to_table(&self) -> ForecastTable {
        ForecastTable::new((0..self.aligned_len()).map(|i| self.record_at(i)).collect())
    }
}

// ============================================================================
// Public operations
// ============================================================================

/// Fetch the DWML document for a point with a single request.
pub fn fetch(
    transport: &dyn Transport,
    endpoints: &Endpoints,
    latitude: f64,
    longitude: f64,
) -> Result<ForecastDocument> {
    let url = render_template(
        &endpoints.forecast_table_url,
        &[("latitude", latitude.to_string()), ("longitude", longitude.to_string())],
    );
    info!(source = %DataSource::Dwml, %url, "fetching forecast table");

    let body = transport.get_text(&url, ACCEPT_XML)?;
    ForecastDocument::from_xml(body)
}

/// Extract every parameter series from the document without aligning them.
///
/// Callers that need strict alignment can check `SeriesSet::length_mismatch`
/// themselves.
pub fn extract_series(document: &ForecastDocument) -> Result<SeriesSet> {
    let doc = Document::parse(document.as_str())
        .map_err(|e| ForecastError::Document(e.to_string()))?;

    let time = ParameterSeries {
        name: SeriesName::Time,
        values: raw_values(&doc, &SeriesName::Time.path())
            .into_iter()
            .map(|text| text.map(String::from))
            .collect(),
    };

    Ok(SeriesSet {
        time,
        temperature: typed_series(&doc, SeriesName::Temperature, "integer"),
        dew_point: typed_series(&doc, SeriesName::DewPoint, "integer"),
        cloud_amount: typed_series(&doc, SeriesName::CloudAmount, "integer"),
        precipitation_probability: typed_series(
            &doc,
            SeriesName::PrecipitationProbability,
            "integer",
        ),
        qpf: typed_series(&doc, SeriesName::Qpf, "float"),
    })
}

/// Normalize a DWML document into a forecast table.
///
/// Deterministic and free of I/O. Series of differing length are truncated
/// to the shortest, with a warning naming every length.
pub fn parse(document: &ForecastDocument) -> Result<ForecastTable> {
    let series = extract_series(document)?;

    if let Some(mismatch) = series.length_mismatch() {
        warn!(source = %DataSource::Dwml, "{}", mismatch);
    }

    let table = series.to_table();
    match table.timeline_span() {
        Some((start, end)) => debug!(
            source = %DataSource::Dwml,
            records = table.len(),
            %start,
            %end,
            "parsed forecast table"
        ),
        None => debug!(source = %DataSource::Dwml, records = table.len(), "parsed forecast table"),
    }
    Ok(table)
}

// ============================================================================
// Tests
// ============================================================================
