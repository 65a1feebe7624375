/// HTTP transport boundary for upstream NWS endpoints.
///
/// Both extractors go through the `Transport` trait so that each performs
/// exactly one GET, failures are classified the same way, and tests can
/// count requests without touching the network. No retries happen here;
/// a failed request aborts the run.

use std::time::Duration;

use crate::model::{ForecastError, Result, RetrievalFailure};

pub const ACCEPT_XML: &str = "application/xml";
pub const ACCEPT_GEOJSON: &str = "application/geo+json";

/// A single blocking GET returning the response body as text.
///
/// Implementations must map a non-success status to
/// `RetrievalFailure::Status` and any transport problem to
/// `RetrievalFailure::Transport`.
pub trait Transport {
    fn get_text(&self, url: &str, accept: &str) -> Result<String>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get_text(&self, url: &str, accept: &str) -> Result<String> {
        (**self).get_text(url, accept)
    }
}

impl Transport for reqwest::blocking::Client {
    fn get_text(&self, url: &str, accept: &str) -> Result<String> {
        let response = self
            .get(url)
            .header("Accept", accept)
            .send()
            .map_err(|e| transport_error(url, &e))?;

        if !response.status().is_success() {
            return Err(ForecastError::Retrieval {
                url: url.to_string(),
                kind: RetrievalFailure::Status(response.status().as_u16()),
            });
        }

        response.text().map_err(|e| transport_error(url, &e))
    }
}

fn transport_error(url: &str, err: &reqwest::Error) -> ForecastError {
    ForecastError::Retrieval {
        url: url.to_string(),
        kind: RetrievalFailure::Transport(err.to_string()),
    }
}

/// Build the blocking client used for a run.
///
/// `timeout` is optional; without one the transport's defaults apply.
pub fn build_client(
    user_agent: &str,
    timeout: Option<Duration>,
) -> Result<reqwest::blocking::Client> {
    let mut builder = reqwest::blocking::Client::builder().user_agent(user_agent);
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    builder.build().map_err(|e| {
        ForecastError::Configuration(format!("cannot build HTTP client: {}", e))
    })
}

/// Substitute `{name}` placeholders in a URL template.
///
/// Unknown placeholders are left as-is.
pub fn render_template(template: &str, params: &[(&str, String)]) -> String {
    params.iter().fold(template.to_string(), |url, (name, value)| {
        url.replace(&format!("{{{}}}", name), value)
    })
}
