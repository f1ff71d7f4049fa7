use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A headline is identified by its exact text.
pub type Headline = String;

/// Daily open/close sample
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub close: f64,
}

/// Chronologically ordered price samples for one symbol.
///
/// Only the first and last samples feed windowed calculations. An empty
/// series means "no trading data" and must never be read as a zero move.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    bars: Vec<PriceBar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.sort_by_key(|b| b.timestamp);
        Self {
            symbol: symbol.into(),
            bars,
        }
    }

    pub fn empty(symbol: impl Into<String>) -> Self {
        Self::new(symbol, Vec::new())
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> Option<&PriceBar> {
        self.bars.first()
    }

    pub fn last(&self) -> Option<&PriceBar> {
        self.bars.last()
    }

    /// Fractional close-to-close change between the first and last sample.
    ///
    /// `None` for an empty series or a zero/non-finite starting close.
    pub fn growth(&self) -> Option<f64> {
        let first = self.first()?.close;
        let last = self.last()?.close;
        if first == 0.0 || !first.is_finite() || !last.is_finite() {
            return None;
        }
        Some((last - first) / first)
    }

    /// Last close and its intraday move (`close - open` of the last sample).
    pub fn session_change(&self) -> Option<(f64, f64)> {
        let bar = self.last()?;
        Some((bar.close, bar.close - bar.open))
    }
}

/// Historical span requested from a price source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lookback {
    OneDay,
    SixMonths,
    OneYear,
}

impl Lookback {
    /// Range token understood by chart APIs ("1d", "6mo", "1y").
    pub fn as_range(&self) -> &'static str {
        match self {
            Lookback::OneDay => "1d",
            Lookback::SixMonths => "6mo",
            Lookback::OneYear => "1y",
        }
    }

    pub fn from_range(s: &str) -> Option<Self> {
        match s.trim() {
            "1d" => Some(Lookback::OneDay),
            "6mo" => Some(Lookback::SixMonths),
            "1y" => Some(Lookback::OneYear),
            _ => None,
        }
    }
}

impl fmt::Display for Lookback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_range())
    }
}

/// Display name plus trading symbol (with exchange suffix where the price
/// source needs one, e.g. `RELIANCE.NS`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    pub name: String,
    pub symbol: String,
}

impl Instrument {
    pub fn new(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
        }
    }
}

/// Named group of instruments for sector reporting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectorGroup {
    pub name: String,
    pub instruments: Vec<Instrument>,
}

/// Combined momentum/sentiment rating, always within [1, 10] and rounded to
/// one decimal.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Rating(f64);

impl Rating {
    pub const MIN: f64 = 1.0;
    pub const MAX: f64 = 10.0;

    /// Clamp and round a raw score. Non-finite input yields `None`.
    pub fn from_raw(raw: f64) -> Option<Self> {
        if !raw.is_finite() {
            return None;
        }
        let clamped = raw.clamp(Self::MIN, Self::MAX);
        Some(Self((clamped * 10.0).round() / 10.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}
