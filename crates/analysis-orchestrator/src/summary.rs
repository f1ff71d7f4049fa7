use analysis_core::{Instrument, Lookback, Rating};
use futures_util::future::join_all;
use sentiment_analysis::SentimentLabel;
use serde::Serialize;

use crate::SignalEngine;

/// Last close and intraday move of a market index
#[derive(Debug, Clone, Serialize)]
pub struct IndexQuote {
    pub index: Instrument,
    pub close: f64,
    pub change: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectorMood {
    pub sector: String,
    pub sentiment: f64,
    pub label: SentimentLabel,
}

#[derive(Debug, Clone, Serialize)]
pub struct MarketSummary {
    pub indices: Vec<IndexQuote>,
    pub sectors: Vec<SectorMood>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockRating {
    pub instrument: Instrument,
    pub rating: Rating,
    pub sentiment: f64,
    pub label: SentimentLabel,
}

impl SignalEngine {
    /// Index snapshot from one-day series plus sector news moods. Indices
    /// without data and sectors whose lookup fails are left out.
    pub async fn market_summary(
        &self,
        indices: &[Instrument],
        sectors: &[String],
        threshold: f64,
    ) -> MarketSummary {
        let (quotes, moods) = tokio::join!(
            join_all(indices.iter().map(|index| self.index_quote(index))),
            self.sector_moods(sectors, threshold),
        );
        MarketSummary {
            indices: quotes.into_iter().flatten().collect(),
            sectors: moods,
        }
    }

    async fn index_quote(&self, index: &Instrument) -> Option<IndexQuote> {
        match self.history(&index.symbol, Lookback::OneDay).await {
            Ok(series) => {
                let Some((close, change)) = series.session_change() else {
                    tracing::warn!("No session data for {}", index.symbol);
                    return None;
                };
                Some(IndexQuote {
                    index: index.clone(),
                    close,
                    change,
                })
            }
            Err(e) => {
                tracing::warn!("Skipping index {}: {}", index.symbol, e);
                None
            }
        }
    }

    pub async fn sector_moods(&self, sectors: &[String], threshold: f64) -> Vec<SectorMood> {
        let queries: Vec<String> = sectors.iter().map(|s| self.sector_query(s)).collect();
        let scores = join_all(queries.iter().map(|q| self.sentiment(q))).await;
        sectors
            .iter()
            .zip(scores)
            .filter_map(|(sector, score)| match score {
                Ok(sentiment) => Some(SectorMood {
                    sector: sector.clone(),
                    sentiment,
                    label: self.scorer().label(sentiment, threshold),
                }),
                Err(e) => {
                    tracing::warn!("Skipping sector mood {}: {}", sector, e);
                    None
                }
            })
            .collect()
    }

    /// Rate every universe instrument. Instruments with an absent rating or a
    /// failed lookup are omitted.
    pub async fn rate_universe(
        &self,
        universe: &[Instrument],
        lookback: Lookback,
        threshold: f64,
    ) -> Vec<StockRating> {
        let assessments = join_all(universe.iter().map(|i| self.assess(i, lookback))).await;
        universe
            .iter()
            .zip(assessments)
            .filter_map(|(instrument, assessment)| match assessment {
                Ok(a) => {
                    let rating = a.rating?;
                    Some(StockRating {
                        label: self.scorer().label(a.sentiment, threshold),
                        instrument: a.instrument,
                        rating,
                        sentiment: a.sentiment,
                    })
                }
                Err(e) => {
                    tracing::warn!("Skipping rating for {}: {}", instrument.symbol, e);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_market_summary_reports_session_move() {
        let prices = FakePrices::default().with("^NSEI", 22000.0, 22150.0);
        let news = Arc::new(FakeNews::default().with("Power sector", &[0.3, 0.1]).with("IT sector", &[-0.05]));
        let engine = engine(prices, news);

        let summary = engine
            .market_summary(
                &[Instrument::new("NIFTY 50", "^NSEI"), Instrument::new("SENSEX", "^BSESN")],
                &["Power".to_string(), "IT".to_string()],
                0.1,
            )
            .await;

        // SENSEX has no data and is omitted
        assert_eq!(summary.indices.len(), 1);
        assert_eq!(summary.indices[0].close, 22150.0);
        assert_eq!(summary.indices[0].change, 150.0);
        assert_eq!(summary.sectors.len(), 2);
        assert_eq!(summary.sectors[0].label, SentimentLabel::Bullish);
        assert_eq!(summary.sectors[1].label, SentimentLabel::Neutral);
    }

    #[tokio::test]
    async fn test_rate_universe_uses_stock_threshold() {
        let prices = FakePrices::default()
            .with("RELIANCE.NS", 100.0, 105.0)
            .with("ITC.NS", 100.0, 95.0);
        let news = Arc::new(FakeNews::default().with("Reliance", &[0.12]).with("ITC", &[-0.2]));
        let engine = engine(prices, news);

        let ratings = engine
            .rate_universe(
                &[
                    Instrument::new("Reliance", "RELIANCE.NS"),
                    Instrument::new("ITC", "ITC.NS"),
                    Instrument::new("Unlisted", "NOPE.NS"),
                ],
                Lookback::SixMonths,
                0.15,
            )
            .await;

        assert_eq!(ratings.len(), 2);
        assert_eq!(ratings[0].label, SentimentLabel::Neutral);
        assert_eq!(ratings[0].rating.value(), 1.1);
        assert_eq!(ratings[1].label, SentimentLabel::Bearish);
        assert_eq!(ratings[1].rating.value(), 1.0);
    }
}
