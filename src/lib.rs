/// NWS forecast table service.
///
/// Fetches the hourly digital forecast (DWML) for a configured point from
/// forecast.weather.gov and, optionally, the gridpoint forecast from
/// api.weather.gov, and writes both as one JSON document:
///
/// ```text
/// { "table": [ {time, temperature, dew_point, cloud_amount,
///               precipitation_probability, qpf}, ... ],
///   "forecast": { ...gridpoint properties... } }
/// ```
///
/// Modules:
/// - `model`: shared types and the error taxonomy.
/// - `config`: YAML/TOML configuration.
/// - `resolve`: which extraction paths a run takes.
/// - `ingest`: the two upstream extractors and their transport.
/// - `output`: assembly, persistence, current-conditions summary.
/// - `pipeline`: one sequential run.
/// - `schedule`: randomized pre-run delay.
/// - `logging`: tracing setup and failure classification.

pub mod config;
pub mod ingest;
pub mod logging;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod resolve;
pub mod schedule;
