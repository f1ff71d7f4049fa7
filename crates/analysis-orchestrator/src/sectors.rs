//! Per-sector mood plus per-instrument ratings.
//!
//! Sector mood comes from a news query on the sector name; each instrument is
//! rated from its own price series and its own news query. The two sentiment
//! sources are never shared.

use analysis_core::{Instrument, Lookback, Rating, SectorGroup};
use futures_util::future::join_all;
use sentiment_analysis::SentimentLabel;
use serde::Serialize;

use crate::SignalEngine;

#[derive(Debug, Clone, Serialize)]
pub struct InstrumentRating {
    pub instrument: Instrument,
    pub rating: Rating,
}

#[derive(Debug, Clone, Serialize)]
pub struct SectorReport {
    pub sector: String,
    pub sentiment: f64,
    pub label: SentimentLabel,
    /// Only instruments with a defined rating, in configured order
    pub ratings: Vec<InstrumentRating>,
}

impl SignalEngine {
    /// Build one report per sector, in input order. A sector whose news
    /// lookup fails is dropped; an instrument that cannot be rated is
    /// omitted from its sector.
    pub async fn sector_breakdown(
        &self,
        sectors: &[SectorGroup],
        threshold: f64,
        lookback: Lookback,
    ) -> Vec<SectorReport> {
        let reports = join_all(
            sectors
                .iter()
                .map(|group| self.sector_report(group, threshold, lookback)),
        )
        .await;
        reports.into_iter().flatten().collect()
    }

    async fn sector_report(
        &self,
        group: &SectorGroup,
        threshold: f64,
        lookback: Lookback,
    ) -> Option<SectorReport> {
        let query = self.sector_query(&group.name);
        let (mood, assessments) = tokio::join!(
            self.sentiment(&query),
            join_all(group.instruments.iter().map(|i| self.assess(i, lookback))),
        );

        let sentiment = match mood {
            Ok(score) => score,
            Err(e) => {
                tracing::warn!("Skipping sector {}: {}", group.name, e);
                return None;
            }
        };

        let ratings = group
            .instruments
            .iter()
            .zip(assessments)
            .filter_map(|(instrument, assessment)| match assessment {
                Ok(a) => a.rating.map(|rating| InstrumentRating {
                    instrument: a.instrument,
                    rating,
                }),
                Err(e) => {
                    tracing::warn!(
                        "Skipping {} in sector {}: {}",
                        instrument.symbol,
                        group.name,
                        e
                    );
                    None
                }
            })
            .collect();

        Some(SectorReport {
            sector: group.name.clone(),
            sentiment,
            label: self.scorer().label(sentiment, threshold),
            ratings,
        })
    }
}
