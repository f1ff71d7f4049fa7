use analysis_core::{AnalysisError, Lookback, PriceBar, PriceSeries, PriceSource};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::{status_error, RateLimiter};

const CHART_URL: &str = "https://query2.finance.yahoo.com/v8/finance/chart";

/// Daily history from the Yahoo Finance chart endpoint.
#[derive(Clone)]
pub struct YahooPriceSource {
    client: Client,
    base_url: String,
    rate_limiter: RateLimiter,
}

impl YahooPriceSource {
    pub fn new(rate_limiter: RateLimiter) -> Self {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: CHART_URL.to_string(),
            rate_limiter,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PriceSource for YahooPriceSource {
    async fn history(&self, symbol: &str, lookback: Lookback) -> Result<PriceSeries, AnalysisError> {
        self.rate_limiter.acquire().await;

        let url = format!("{}/{}", self.base_url, symbol);
        let response = self
            .client
            .get(&url)
            .query(&[("range", lookback.as_range()), ("interval", "1d")])
            .send()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        if !status.is_success() {
            return Err(status_error(status, body));
        }

        let series = parse_chart(symbol, &body)?;
        tracing::debug!(symbol = %symbol, lookback = %lookback, bars = series.len(), "Fetched price history");
        Ok(series)
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Decode a chart payload. Samples with a missing open or close (halted
/// sessions) are dropped; a result without timestamps is an empty series.
fn parse_chart(symbol: &str, body: &str) -> Result<PriceSeries, AnalysisError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)
        .map_err(|e| AnalysisError::InvalidData(format!("chart payload for {}: {}", symbol, e)))?;

    if let Some(err) = envelope.chart.error {
        return Err(AnalysisError::RequestRejected(format!(
            "{} for {}: {}",
            err.code, symbol, err.description
        )));
    }

    let Some(result) = envelope.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(PriceSeries::empty(symbol));
    };
    let Some(quote) = result.indicators.quote.into_iter().next() else {
        return Ok(PriceSeries::empty(symbol));
    };

    let bars = result
        .timestamp
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            let open = quote.open.get(i).copied().flatten()?;
            let close = quote.close.get(i).copied().flatten()?;
            Some(PriceBar {
                timestamp: DateTime::from_timestamp(ts, 0)?,
                open,
                close,
            })
        })
        .collect();

    Ok(PriceSeries::new(symbol, bars))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHART: &str = r#"{
        "chart": {
            "result": [{
                "meta": {"symbol": "TCS.NS", "currency": "INR"},
                "timestamp": [1704067200, 1704153600, 1704240000],
                "indicators": {"quote": [{
                    "open":  [3700.0, null, 3790.5],
                    "close": [3710.0, 3750.0, 3801.25],
                    "volume": [100, 200, 300]
                }]}
            }],
            "error": null
        }
    }"#;

    #[test]
    fn test_parse_chart_skips_incomplete_samples() {
        let series = parse_chart("TCS.NS", CHART).unwrap();
        assert_eq!(series.symbol, "TCS.NS");
        assert_eq!(series.len(), 2);
        assert_eq!(series.first().unwrap().close, 3710.0);
        assert_eq!(series.last().unwrap().open, 3790.5);
    }

    #[test]
    fn test_parse_chart_without_trading_data_is_empty() {
        let body = r#"{"chart": {"result": [{"meta": {}, "indicators": {"quote": [{}]}}], "error": null}}"#;
        let series = parse_chart("NEWCO.NS", body).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn test_parse_chart_error_is_rejection() {
        let body = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        let err = parse_chart("GONE.NS", body).unwrap_err();
        assert!(matches!(err, AnalysisError::RequestRejected(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_chart_garbage_is_invalid_data() {
        assert!(matches!(
            parse_chart("X", "<html>"),
            Err(AnalysisError::InvalidData(_))
        ));
    }
}
