use analysis_core::{Headline, PolarityScorer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

const NEGATION_WORDS: &[&str] = &[
    "not", "no", "never", "don't", "doesn't", "didn't", "isn't", "aren't",
    "wasn't", "weren't", "won't", "wouldn't", "couldn't", "shouldn't", "hardly",
    "barely", "neither", "nor", "without",
];

const NEGATION_WINDOW: usize = 3;

const POSITIVE_WORDS: &[&str] = &[
    "bullish", "rally", "rallies", "surge", "surges", "gain", "gains", "profit",
    "growth", "beat", "beats", "upgrade", "outperform", "strong", "positive",
    "rise", "rises", "increase", "breakthrough", "success", "exceed", "exceeds",
    "momentum", "buy", "optimistic", "record", "high", "advance", "soars",
    "dividend", "buyback", "upside", "recovery", "rebound", "expansion",
    "robust", "overweight", "raised", "upgraded", "tailwind", "jumps", "wins",
    "order", "orders", "approval",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bearish", "decline", "declines", "loss", "losses", "fall", "falls",
    "plunge", "plunges", "crash", "crashes", "miss", "misses", "downgrade",
    "underperform", "weak", "negative", "drop", "drops", "decrease", "concern",
    "risk", "fail", "disappoint", "slump", "sell", "warning", "pessimistic",
    "low", "retreat", "fear", "trouble", "dilution", "headwind", "lawsuit",
    "probe", "default", "bankruptcy", "layoff", "downside", "overvalued",
    "underweight", "lowered", "suspended", "slips", "tumbles", "penalty",
];

/// Discrete mood of a headline batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    Bullish,
    Bearish,
    Neutral,
}

impl SentimentLabel {
    /// Classify `score` against the symmetric band `[-threshold, threshold]`.
    /// Scores strictly outside the band are directional.
    pub fn from_score(score: f64, threshold: f64) -> Self {
        if score > threshold {
            SentimentLabel::Bullish
        } else if score < -threshold {
            SentimentLabel::Bearish
        } else {
            SentimentLabel::Neutral
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SentimentLabel::Bullish => "Bullish",
            SentimentLabel::Bearish => "Bearish",
            SentimentLabel::Neutral => "Neutral",
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            SentimentLabel::Bullish => "🟢",
            SentimentLabel::Bearish => "🔴",
            SentimentLabel::Neutral => "🟡",
        }
    }
}

impl std::fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name(), self.marker())
    }
}

/// Turns headline batches into a mean polarity score.
#[derive(Clone)]
pub struct SentimentScorer {
    polarity: Arc<dyn PolarityScorer>,
}

impl SentimentScorer {
    pub fn new(polarity: Arc<dyn PolarityScorer>) -> Self {
        Self { polarity }
    }

    /// Mean per-headline polarity; 0.0 for an empty batch.
    pub fn score(&self, headlines: &[Headline]) -> f64 {
        if headlines.is_empty() {
            return 0.0;
        }
        let total: f64 = headlines
            .iter()
            .map(|h| {
                let p = self.polarity.polarity(h);
                if p.is_finite() {
                    p.clamp(-1.0, 1.0)
                } else {
                    0.0
                }
            })
            .sum();
        let avg = total / headlines.len() as f64;
        tracing::debug!("Scored {} headlines, mean polarity {:.3}", headlines.len(), avg);
        avg
    }

    pub fn label(&self, score: f64, threshold: f64) -> SentimentLabel {
        SentimentLabel::from_score(score, threshold)
    }
}

impl Default for SentimentScorer {
    fn default() -> Self {
        Self::new(Arc::new(LexiconPolarity::new()))
    }
}

/// Word-list polarity with short-range negation handling.
///
/// `(positive hits - negative hits) / total hits`, so the result always lies
/// in [-1, 1] and text without any listed word scores 0.
pub struct LexiconPolarity {
    positive: HashSet<&'static str>,
    negative: HashSet<&'static str>,
    negation: HashSet<&'static str>,
}

impl LexiconPolarity {
    pub fn new() -> Self {
        Self {
            positive: POSITIVE_WORDS.iter().copied().collect(),
            negative: NEGATIVE_WORDS.iter().copied().collect(),
            negation: NEGATION_WORDS.iter().copied().collect(),
        }
    }
}

impl Default for LexiconPolarity {
    fn default() -> Self {
        Self::new()
    }
}

impl PolarityScorer for LexiconPolarity {
    fn polarity(&self, text: &str) -> f64 {
        let text_lower = text.to_lowercase();
        let words: Vec<&str> = text_lower
            .split(|c: char| {
                c.is_whitespace() || matches!(c, ',' | ';' | '.' | '!' | '?' | ':' | '"' | '(' | ')')
            })
            .filter(|w| !w.is_empty())
            .collect();

        let negation_positions: Vec<usize> = words
            .iter()
            .enumerate()
            .filter(|(_, w)| self.negation.contains(*w))
            .map(|(i, _)| i)
            .collect();

        let mut net: i32 = 0;
        let mut hits: i32 = 0;

        for (i, word) in words.iter().enumerate() {
            let is_positive = self.positive.contains(*word);
            let is_negative = self.negative.contains(*word);
            if !is_positive && !is_negative {
                continue;
            }

            let negated = negation_positions
                .iter()
                .any(|&neg_pos| neg_pos < i && (i - neg_pos) <= NEGATION_WINDOW);

            let direction = if is_positive { 1 } else { -1 };
            net += if negated { -direction } else { direction };
            hits += 1;
        }

        if hits == 0 {
            return 0.0;
        }
        (net as f64 / hits as f64).clamp(-1.0, 1.0)
    }
}
