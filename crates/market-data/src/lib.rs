//! HTTP-backed collaborators: daily price history from the Yahoo chart API and
//! headline search over the Google News RSS endpoint.

mod google_news;
mod rate_limiter;
mod yahoo;

pub use google_news::{GoogleNewsSource, NewsLocale};
pub use rate_limiter::RateLimiter;
pub use yahoo::YahooPriceSource;

use analysis_core::AnalysisError;

/// Map a non-success HTTP status to the error taxonomy: throttling and server
/// faults are transient, anything else is a rejection.
pub(crate) fn status_error(status: reqwest::StatusCode, body: String) -> AnalysisError {
    let msg = format!("HTTP {}: {}", status, body.chars().take(200).collect::<String>());
    if status.as_u16() == 429 || status.is_server_error() {
        AnalysisError::ApiError(msg)
    } else {
        AnalysisError::RequestRejected(msg)
    }
}
