/// Upstream data retrieval and normalization.
///
/// Submodules:
/// - `http`: the single-request transport boundary shared by both extractors.
/// - `dwml`: NWS digital DWML time-series document → `ForecastTable`.
/// - `gridpoint`: api.weather.gov gridpoint forecast → opaque `properties`.

pub mod dwml;
pub mod gridpoint;
pub mod http;
