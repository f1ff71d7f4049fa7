//! Momentum + sentiment rating on a 1-10 scale.

use analysis_core::{AnalysisError, PriceSeries, Rating};
use serde::{Deserialize, Serialize};

/// How price growth and news sentiment are combined.
///
/// `raw = min(growth * price_weight, price_cap) + sentiment * news_weight`,
/// where the cap only applies when set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatingWeights {
    pub price_weight: f64,
    pub news_weight: f64,
    #[serde(default)]
    pub price_cap: Option<f64>,
}

impl Default for RatingWeights {
    fn default() -> Self {
        Self {
            price_weight: 10.0,
            news_weight: 5.0,
            price_cap: None,
        }
    }
}

impl RatingWeights {
    /// Reject weights that could yield NaN or make the rating decrease as
    /// sentiment improves.
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if !self.price_weight.is_finite() || self.price_weight < 0.0 {
            return Err(AnalysisError::Config(format!(
                "price weight must be finite and >= 0, got {}",
                self.price_weight
            )));
        }
        if !self.news_weight.is_finite() || self.news_weight < 0.0 {
            return Err(AnalysisError::Config(format!(
                "news weight must be finite and >= 0, got {}",
                self.news_weight
            )));
        }
        if let Some(cap) = self.price_cap {
            if !cap.is_finite() || cap <= 0.0 {
                return Err(AnalysisError::Config(format!(
                    "price cap must be finite and > 0, got {}",
                    cap
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct RatingCalculator {
    weights: RatingWeights,
}

impl RatingCalculator {
    pub fn new(weights: RatingWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &RatingWeights {
        &self.weights
    }

    /// Rate a series against a sentiment score. Absent for an empty series or
    /// a zero starting close.
    pub fn rate(&self, series: &PriceSeries, sentiment: f64) -> Option<Rating> {
        let growth = series.growth()?;
        let mut price_component = growth * self.weights.price_weight;
        if let Some(cap) = self.weights.price_cap {
            price_component = price_component.min(cap);
        }
        Rating::from_raw(price_component + sentiment * self.weights.news_weight)
    }
}
