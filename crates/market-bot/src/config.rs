use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use analysis_core::{Instrument, Lookback, RetryPolicy, SectorGroup};
use analysis_orchestrator::RatingWeights;
use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use news_alerts::AlertTarget;
use notification_service::NotificationConfig;
use serde::{Deserialize, Serialize};

use crate::schedule::{HourWindow, ScheduleWindows};

/// Instrument tables. Each table is maintained on its own; none is derived
/// from another.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticTables {
    /// Instruments rated in the close report
    pub universe: Vec<Instrument>,
    /// Candidates for the pick of the day
    pub pick_watchlist: Vec<Instrument>,
    pub sectors: Vec<SectorGroup>,
    /// Alert attribution, in priority order
    pub alert_targets: Vec<AlertTarget>,
    pub indices: Vec<Instrument>,
}

fn instruments(items: &[(&str, &str)]) -> Vec<Instrument> {
    items.iter().map(|(name, symbol)| Instrument::new(*name, *symbol)).collect()
}

fn sector(name: &str, items: &[(&str, &str)]) -> SectorGroup {
    SectorGroup {
        name: name.to_string(),
        instruments: instruments(items),
    }
}

impl Default for StaticTables {
    fn default() -> Self {
        Self {
            universe: instruments(&[
                ("Reliance", "RELIANCE.NS"),
                ("TCS", "TCS.NS"),
                ("HDFC Bank", "HDFCBANK.NS"),
                ("Infosys", "INFY.NS"),
                ("ICICI Bank", "ICICIBANK.NS"),
                ("ITC", "ITC.NS"),
                ("Larsen & Toubro", "LT.NS"),
                ("State Bank of India", "SBIN.NS"),
            ]),
            pick_watchlist: instruments(&[
                ("Tata Power", "TATAPOWER.NS"),
                ("Bharat Electronics", "BEL.NS"),
                ("Hindustan Aeronautics", "HAL.NS"),
                ("Adani Ports", "ADANIPORTS.NS"),
                ("NTPC", "NTPC.NS"),
                ("Zomato", "ZOMATO.NS"),
            ]),
            sectors: vec![
                sector(
                    "Power",
                    &[("NTPC", "NTPC.NS"), ("Power Grid", "POWERGRID.NS"), ("Tata Power", "TATAPOWER.NS")],
                ),
                sector(
                    "Defence",
                    &[
                        ("Hindustan Aeronautics", "HAL.NS"),
                        ("Bharat Electronics", "BEL.NS"),
                        ("Bharat Dynamics", "BDL.NS"),
                    ],
                ),
                sector("IT", &[("TCS", "TCS.NS"), ("Infosys", "INFY.NS"), ("Wipro", "WIPRO.NS")]),
                sector(
                    "Banking",
                    &[
                        ("HDFC Bank", "HDFCBANK.NS"),
                        ("ICICI Bank", "ICICIBANK.NS"),
                        ("State Bank of India", "SBIN.NS"),
                    ],
                ),
            ],
            alert_targets: vec![
                AlertTarget::new("Reliance", "RELIANCE"),
                AlertTarget::new("Adani", "ADANI"),
                AlertTarget::new("TCS", "TCS"),
                AlertTarget::new("Infosys", "INFOSYS"),
                AlertTarget::new("HDFC", "HDFC"),
                AlertTarget::new("Tata", "TATA"),
            ],
            indices: instruments(&[("NIFTY 50", "^NSEI"), ("SENSEX", "^BSESN")]),
        }
    }
}

impl StaticTables {
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tables file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse tables file {}", path.display()))
    }
}

/// Everything the bot needs for one scheduling pass, loaded once at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub notification: NotificationConfig,
    pub timezone: Tz,

    // Dedup storage
    pub seen_news_path: PathBuf,
    pub seen_news_database_url: Option<String>,

    // Scoring
    pub sector_threshold: f64,
    pub stock_threshold: f64,
    pub rating: RatingWeights,
    pub rating_lookback: Lookback,

    pub schedule: ScheduleWindows,

    // News queries
    pub headline_limit: usize,
    pub alert_headline_limit: usize,
    pub alert_news_query: String,
    pub news_region_suffix: String,
    pub sector_query_suffix: String,

    // Fetching
    pub max_concurrent_fetches: usize,
    pub retry: RetryPolicy,
    pub price_rate_limit: usize,
    pub news_rate_limit: usize,

    pub send_startup_ping: bool,
    pub tables: StaticTables,
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let tables = match get("BOT_TABLES_PATH") {
            Some(path) => StaticTables::from_file(std::path::Path::new(&path))?,
            None => StaticTables::default(),
        };

        let timezone_name = get("BOT_TIMEZONE").unwrap_or_else(|| "Asia/Kolkata".to_string());
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid BOT_TIMEZONE '{}': {}", timezone_name, e))?;

        let lookback_name = get("RATING_LOOKBACK").unwrap_or_else(|| "6mo".to_string());
        let rating_lookback = Lookback::from_range(&lookback_name)
            .with_context(|| format!("Invalid RATING_LOOKBACK '{}' (use 1d, 6mo or 1y)", lookback_name))?;

        let price_cap = match get("RATING_PRICE_CAP") {
            Some(raw) => Some(
                raw.parse::<f64>()
                    .with_context(|| format!("Invalid RATING_PRICE_CAP '{}'", raw))?,
            ),
            None => None,
        };

        let config = Self {
            notification: NotificationConfig {
                bot_token: get("BOT_TOKEN").context("BOT_TOKEN not set")?,
                chat_id: get("CHAT_ID").context("CHAT_ID not set")?,
                discord_webhook_url: get("DISCORD_WEBHOOK_URL"),
            },
            timezone,

            seen_news_path: PathBuf::from(
                get("SEEN_NEWS_PATH").unwrap_or_else(|| "seen_news.json".to_string()),
            ),
            seen_news_database_url: get("SEEN_NEWS_DATABASE_URL"),

            sector_threshold: parse_or(&get, "SECTOR_SENTIMENT_THRESHOLD", "0.1")?,
            stock_threshold: parse_or(&get, "STOCK_SENTIMENT_THRESHOLD", "0.15")?,
            rating: RatingWeights {
                price_weight: parse_or(&get, "RATING_PRICE_WEIGHT", "10")?,
                news_weight: parse_or(&get, "RATING_NEWS_WEIGHT", "5")?,
                price_cap,
            },
            rating_lookback,

            schedule: ScheduleWindows {
                morning: parse_window(&get, "MORNING_WINDOW", "8-9")?,
                close: parse_window(&get, "CLOSE_WINDOW", "15-16")?,
                weekly_outlook_weekday: parse_or(&get, "WEEKLY_OUTLOOK_WEEKDAY", "6")?,
            },

            headline_limit: parse_or(&get, "HEADLINE_LIMIT", "6")?,
            alert_headline_limit: parse_or(&get, "ALERT_HEADLINE_LIMIT", "20")?,
            alert_news_query: get("ALERT_NEWS_QUERY").unwrap_or_else(|| "market".to_string()),
            news_region_suffix: get("NEWS_REGION_SUFFIX").unwrap_or_else(|| "india stock".to_string()),
            sector_query_suffix: get("SECTOR_QUERY_SUFFIX").unwrap_or_else(|| "sector".to_string()),

            max_concurrent_fetches: parse_or(&get, "MAX_CONCURRENT_FETCHES", "4")?,
            retry: RetryPolicy {
                timeout: Duration::from_secs(parse_or(&get, "FETCH_TIMEOUT_SECS", "15")?),
                max_attempts: parse_or(&get, "FETCH_MAX_ATTEMPTS", "3")?,
                base_backoff: Duration::from_millis(parse_or(&get, "FETCH_BACKOFF_MS", "500")?),
            },
            price_rate_limit: parse_or(&get, "PRICE_RATE_LIMIT", "60")?,
            news_rate_limit: parse_or(&get, "NEWS_RATE_LIMIT", "30")?,

            send_startup_ping: parse_or(&get, "SEND_STARTUP_PING", "false")?,
            tables,
        };

        config.validate()?;
        Ok(config)
    }

    /// Startup checks. A configuration that passes never produces NaN
    /// ratings or an unmatchable alert.
    pub fn validate(&self) -> Result<()> {
        self.rating
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid rating weights: {}", e))?;

        for (name, value) in [
            ("SECTOR_SENTIMENT_THRESHOLD", self.sector_threshold),
            ("STOCK_SENTIMENT_THRESHOLD", self.stock_threshold),
        ] {
            if !value.is_finite() || value <= 0.0 || value >= 1.0 {
                bail!("{} must be between 0 and 1 (exclusive), got {}", name, value);
            }
        }

        for (name, window) in [
            ("MORNING_WINDOW", self.schedule.morning),
            ("CLOSE_WINDOW", self.schedule.close),
        ] {
            if !window.is_valid() {
                bail!("{} must satisfy start <= end <= 23, got {}", name, window);
            }
        }
        if self.schedule.weekly_outlook_weekday > 6 {
            bail!(
                "WEEKLY_OUTLOOK_WEEKDAY must be 0 (Monday) to 6 (Sunday), got {}",
                self.schedule.weekly_outlook_weekday
            );
        }

        for (name, value) in [
            ("HEADLINE_LIMIT", self.headline_limit),
            ("ALERT_HEADLINE_LIMIT", self.alert_headline_limit),
            ("MAX_CONCURRENT_FETCHES", self.max_concurrent_fetches),
            ("PRICE_RATE_LIMIT", self.price_rate_limit),
            ("NEWS_RATE_LIMIT", self.news_rate_limit),
            ("FETCH_MAX_ATTEMPTS", self.retry.max_attempts as usize),
        ] {
            if value == 0 {
                bail!("{} must be greater than 0", name);
            }
        }
        if self.retry.timeout.is_zero() {
            bail!("FETCH_TIMEOUT_SECS must be greater than 0");
        }

        if let Some(target) = self
            .tables
            .alert_targets
            .iter()
            .find(|t| t.token.trim().is_empty())
        {
            bail!("Alert target '{}' has an empty token", target.name);
        }

        Ok(())
    }
}

fn parse_or<G, T>(get: &G, key: &str, default: &str) -> Result<T>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get(key).unwrap_or_else(|| default.to_string());
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid {} '{}': {}", key, raw, e))
}

fn parse_window<G>(get: &G, key: &str, default: &str) -> Result<HourWindow>
where
    G: Fn(&str) -> Option<String>,
{
    parse_or(get, key, default)
}
