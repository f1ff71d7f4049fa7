use analysis_core::{AnalysisError, Headline, NewsSource};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use std::time::Duration;

use crate::{status_error, RateLimiter};

const SEARCH_URL: &str = "https://news.google.com/rss/search";

/// Edition parameters for the Google News search feed
#[derive(Debug, Clone)]
pub struct NewsLocale {
    pub hl: String,
    pub gl: String,
    pub ceid: String,
}

impl Default for NewsLocale {
    fn default() -> Self {
        Self {
            hl: "en-IN".to_string(),
            gl: "IN".to_string(),
            ceid: "IN:en".to_string(),
        }
    }
}

/// Headline search over the Google News RSS feed.
///
/// Every query is suffixed with `region_suffix` (e.g. "india stock") so that
/// a bare sector or company name stays scoped to the market being covered.
#[derive(Clone)]
pub struct GoogleNewsSource {
    client: Client,
    base_url: String,
    region_suffix: String,
    locale: NewsLocale,
    rate_limiter: RateLimiter,
}

impl GoogleNewsSource {
    pub fn new(region_suffix: impl Into<String>, rate_limiter: RateLimiter) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            base_url: SEARCH_URL.to_string(),
            region_suffix: region_suffix.into(),
            locale: NewsLocale::default(),
            rate_limiter,
        }
    }

    pub fn with_locale(mut self, locale: NewsLocale) -> Self {
        self.locale = locale;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn full_query(&self, query: &str) -> String {
        let suffix = self.region_suffix.trim();
        if suffix.is_empty() {
            query.trim().to_string()
        } else {
            format!("{} {}", query.trim(), suffix)
        }
    }
}

#[async_trait]
impl NewsSource for GoogleNewsSource {
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Headline>, AnalysisError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        self.rate_limiter.acquire().await;

        let q = self.full_query(query);
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("q", q.as_str()),
                ("hl", self.locale.hl.as_str()),
                ("gl", self.locale.gl.as_str()),
                ("ceid", self.locale.ceid.as_str()),
            ])
            .send()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, body));
        }

        let content = response
            .bytes()
            .await
            .map_err(|e| AnalysisError::ApiError(e.to_string()))?;

        let headlines = parse_feed(&content, limit)?;
        tracing::debug!(query = %q, count = headlines.len(), "Fetched headlines");
        Ok(headlines)
    }
}

/// Extract item titles newest first, capped at `limit`. Items without a
/// parseable publication date keep their feed order after the dated ones.
fn parse_feed(content: &[u8], limit: usize) -> Result<Vec<Headline>, AnalysisError> {
    let channel = rss::Channel::read_from(content)
        .map_err(|e| AnalysisError::InvalidData(format!("RSS feed: {}", e)))?;

    let mut items: Vec<(Option<i64>, Headline)> = channel
        .items()
        .iter()
        .filter_map(|item| {
            let title = item.title()?.trim();
            if title.is_empty() {
                return None;
            }
            let published = item
                .pub_date()
                .and_then(|d| DateTime::parse_from_rfc2822(d).ok())
                .map(|d| d.timestamp());
            Some((published, title.to_string()))
        })
        .collect();

    // Stable: equal keys keep feed order
    items.sort_by(|a, b| b.0.cmp(&a.0));

    Ok(items.into_iter().take(limit).map(|(_, title)| title).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0"><channel>
  <title>"Power sector india stock" - Google News</title>
  <link>https://news.google.com</link>
  <description>Google News</description>
  <item><title>NTPC order book swells - Mint</title><pubDate>Mon, 14 Oct 2024 06:00:00 GMT</pubDate></item>
  <item><title>Power stocks rally on demand outlook - ET</title><pubDate>Tue, 15 Oct 2024 09:30:00 GMT</pubDate></item>
  <item><title>  </title><pubDate>Tue, 15 Oct 2024 10:30:00 GMT</pubDate></item>
  <item><title>Tata Power Q2 preview - BS</title></item>
  <item><title>Grid capex outlook - Reuters</title><pubDate>Sun, 13 Oct 2024 08:00:00 GMT</pubDate></item>
</channel></rss>"#;

    #[test]
    fn test_parse_feed_orders_newest_first() {
        let headlines = parse_feed(FEED.as_bytes(), 10).unwrap();
        assert_eq!(
            headlines,
            vec![
                "Power stocks rally on demand outlook - ET",
                "NTPC order book swells - Mint",
                "Grid capex outlook - Reuters",
                "Tata Power Q2 preview - BS",
            ]
        );
    }

    #[test]
    fn test_parse_feed_respects_limit() {
        let headlines = parse_feed(FEED.as_bytes(), 2).unwrap();
        assert_eq!(headlines.len(), 2);
        assert_eq!(headlines[0], "Power stocks rally on demand outlook - ET");
    }

    #[test]
    fn test_parse_feed_rejects_non_rss() {
        assert!(matches!(
            parse_feed(b"not xml at all", 5),
            Err(AnalysisError::InvalidData(_))
        ));
    }

    #[test]
    fn test_query_is_region_scoped() {
        let source = GoogleNewsSource::new("india stock", RateLimiter::per_minute("news", 10));
        assert_eq!(source.full_query("Banking"), "Banking india stock");
        let bare = GoogleNewsSource::new("", RateLimiter::per_minute("news", 10));
        assert_eq!(bare.full_query(" Banking "), "Banking");
    }
}
