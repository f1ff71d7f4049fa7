use async_trait::async_trait;
use crate::{AnalysisError, Headline, Lookback, PriceSeries};

/// Source of historical open/close series
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Ordered series for `symbol` over `lookback`; empty when the symbol did
    /// not trade in the window.
    async fn history(&self, symbol: &str, lookback: Lookback) -> Result<PriceSeries, AnalysisError>;
}

/// Source of news headlines
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// At most `limit` headlines matching `query`, newest first.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Headline>, AnalysisError>;
}

/// Raw text polarity in [-1, 1]. Empty text scores 0.
pub trait PolarityScorer: Send + Sync {
    fn polarity(&self, text: &str) -> f64;
}
