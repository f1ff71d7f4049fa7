use analysis_core::{
    AnalysisError, Headline, Instrument, Lookback, NewsSource, PriceSeries, PriceSource, Rating,
    RetryPolicy,
};
use sentiment_analysis::SentimentScorer;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub mod rating;
pub mod sectors;
pub mod selector;
pub mod summary;

pub use rating::{RatingCalculator, RatingWeights};
pub use sectors::{InstrumentRating, SectorReport};
pub use selector::{best_candidate, Pick};
pub use summary::{IndexQuote, MarketSummary, SectorMood, StockRating};

/// Fan-out limits for collaborator calls
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Headlines requested per news query
    pub headline_limit: usize,
    /// Upper bound on in-flight price/news requests
    pub max_concurrent_fetches: usize,
    pub retry: RetryPolicy,
    /// Appended to a sector name to form its news query
    pub sector_query_suffix: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            headline_limit: 6,
            max_concurrent_fetches: 4,
            retry: RetryPolicy::default(),
            sector_query_suffix: "sector".to_string(),
        }
    }
}

/// Sentiment and rating of one instrument from independently fetched data
#[derive(Debug, Clone)]
pub struct Assessment {
    pub instrument: Instrument,
    pub sentiment: f64,
    /// Absent when the instrument has no usable price history
    pub rating: Option<Rating>,
}

/// Glue between the collaborators and the scoring components.
///
/// Every price/news call goes through the retry policy and a shared
/// semaphore, so independent lookups may be issued concurrently without
/// exceeding `max_concurrent_fetches`.
pub struct SignalEngine {
    prices: Arc<dyn PriceSource>,
    news: Arc<dyn NewsSource>,
    scorer: SentimentScorer,
    calculator: RatingCalculator,
    settings: EngineSettings,
    permits: Arc<Semaphore>,
}

impl SignalEngine {
    pub fn new(
        prices: Arc<dyn PriceSource>,
        news: Arc<dyn NewsSource>,
        scorer: SentimentScorer,
        calculator: RatingCalculator,
        settings: EngineSettings,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(settings.max_concurrent_fetches.max(1)));
        Self {
            prices,
            news,
            scorer,
            calculator,
            settings,
            permits,
        }
    }

    pub fn scorer(&self) -> &SentimentScorer {
        &self.scorer
    }

    pub fn calculator(&self) -> &RatingCalculator {
        &self.calculator
    }

    /// Headlines for `query` using the configured per-query limit.
    pub async fn headlines(&self, query: &str) -> Result<Vec<Headline>, AnalysisError> {
        self.headlines_limited(query, self.settings.headline_limit).await
    }

    pub async fn headlines_limited(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Headline>, AnalysisError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AnalysisError::Config("fetch pool closed".to_string()))?;
        let what = format!("news search '{}'", query);
        self.settings
            .retry
            .run(&what, || self.news.search(query, limit))
            .await
    }

    /// News query for a sector's mood, e.g. `"Power sector"`.
    pub fn sector_query(&self, sector: &str) -> String {
        match self.settings.sector_query_suffix.trim() {
            "" => sector.to_string(),
            suffix => format!("{} {}", sector, suffix),
        }
    }

    /// Mean polarity of the headlines returned for `query`.
    pub async fn sentiment(&self, query: &str) -> Result<f64, AnalysisError> {
        let headlines = self.headlines(query).await?;
        Ok(self.scorer.score(&headlines))
    }

    pub async fn history(&self, symbol: &str, lookback: Lookback) -> Result<PriceSeries, AnalysisError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AnalysisError::Config("fetch pool closed".to_string()))?;
        let what = format!("{} history for {}", lookback, symbol);
        self.settings
            .retry
            .run(&what, || self.prices.history(symbol, lookback))
            .await
    }

    /// Fetch a price series and an instrument-named news batch, then rate.
    pub async fn assess(
        &self,
        instrument: &Instrument,
        lookback: Lookback,
    ) -> Result<Assessment, AnalysisError> {
        let (series, sentiment) = tokio::join!(
            self.history(&instrument.symbol, lookback),
            self.sentiment(&instrument.name),
        );
        let series = series?;
        let sentiment = sentiment?;
        let rating = self.calculator.rate(&series, sentiment);
        if rating.is_none() {
            tracing::debug!(symbol = %instrument.symbol, "No usable price history, rating absent");
        }
        Ok(Assessment {
            instrument: instrument.clone(),
            sentiment,
            rating,
        })
    }
}
