//! "Pick of the day": the watchlist entry with the strongest news sentiment.

use analysis_core::Instrument;
use futures_util::future::join_all;
use serde::Serialize;

use crate::SignalEngine;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pick {
    pub instrument: Instrument,
    pub sentiment: f64,
}

/// Highest score wins; on a tie the earlier entry is kept.
pub fn best_candidate<I>(scored: I) -> Option<Pick>
where
    I: IntoIterator<Item = (Instrument, f64)>,
{
    let mut best: Option<Pick> = None;
    for (instrument, sentiment) in scored {
        let better = match &best {
            Some(current) => sentiment > current.sentiment,
            None => true,
        };
        if better {
            best = Some(Pick {
                instrument,
                sentiment,
            });
        }
    }
    best
}

impl SignalEngine {
    /// Score every candidate by a news query on its display name and return
    /// the best one. Candidates whose news lookup fails are left out.
    pub async fn pick_of_the_day(&self, candidates: &[Instrument]) -> Option<Pick> {
        let scored = join_all(candidates.iter().map(|candidate| async move {
            (candidate, self.sentiment(&candidate.name).await)
        }))
        .await;

        let usable = scored.into_iter().filter_map(|(candidate, result)| match result {
            Ok(score) => {
                tracing::debug!(name = %candidate.name, score, "Scored pick candidate");
                Some((candidate.clone(), score))
            }
            Err(e) => {
                tracing::warn!("Skipping pick candidate {}: {}", candidate.name, e);
                None
            }
        });

        let pick = best_candidate(usable);
        match &pick {
            Some(p) => tracing::info!(
                "Pick of the day: {} ({}) sentiment {:.3}",
                p.instrument.name,
                p.instrument.symbol,
                p.sentiment
            ),
            None => tracing::info!("No pick of the day from {} candidates", candidates.len()),
        }
        pick
    }
}
