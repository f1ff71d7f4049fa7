//! One scheduling pass: work out which reports are due, build each one and
//! hand the text to the notifier.

use std::collections::BTreeSet;
use std::sync::Arc;

use analysis_core::Lookback;
use analysis_orchestrator::{EngineSettings, RatingCalculator, SignalEngine};
use anyhow::Result;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike};
use market_data::{GoogleNewsSource, RateLimiter, YahooPriceSource};
use news_alerts::{DedupPass, InstrumentMatcher, JsonFileStore, SeenNewsStore, SqliteSeenStore};
use notification_service::{NotificationError, NotificationService};
use sentiment_analysis::SentimentScorer;

use crate::config::BotConfig;
use crate::reports;
use crate::schedule::TaskKind;

/// Sector ratings use a one-year price window.
const SECTOR_LOOKBACK: Lookback = Lookback::OneYear;

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    Sent,
    /// Ran successfully but produced no message (e.g. no novel headlines)
    NothingToSend,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct PassReport {
    pub due: BTreeSet<TaskKind>,
    pub outcomes: Vec<(TaskKind, TaskOutcome)>,
}

impl PassReport {
    pub fn failures(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, TaskOutcome::Failed(_)))
            .count()
    }

    pub fn outcome(&self, task: TaskKind) -> Option<&TaskOutcome> {
        self.outcomes.iter().find(|(t, _)| *t == task).map(|(_, o)| o)
    }
}

pub struct Driver {
    config: BotConfig,
    engine: SignalEngine,
    notifier: NotificationService,
    store: Arc<dyn SeenNewsStore>,
    matcher: InstrumentMatcher,
}

impl Driver {
    pub fn new(
        config: BotConfig,
        engine: SignalEngine,
        notifier: NotificationService,
        store: Arc<dyn SeenNewsStore>,
    ) -> Self {
        let matcher = InstrumentMatcher::new(config.tables.alert_targets.clone());
        Self {
            config,
            engine,
            notifier,
            store,
            matcher,
        }
    }

    /// Wire the live collaborators: Yahoo prices, Google News, Telegram and
    /// the configured dedup store.
    pub async fn from_config(config: BotConfig) -> Result<Self> {
        let prices = YahooPriceSource::new(RateLimiter::per_minute("yahoo-chart", config.price_rate_limit));
        let news = GoogleNewsSource::new(
            config.news_region_suffix.clone(),
            RateLimiter::per_minute("google-news", config.news_rate_limit),
        );

        let engine = SignalEngine::new(
            Arc::new(prices),
            Arc::new(news),
            SentimentScorer::default(),
            RatingCalculator::new(config.rating),
            EngineSettings {
                headline_limit: config.headline_limit,
                max_concurrent_fetches: config.max_concurrent_fetches,
                retry: config.retry,
                sector_query_suffix: config.sector_query_suffix.clone(),
            },
        );

        let notifier = NotificationService::new(&config.notification, config.retry);

        let store: Arc<dyn SeenNewsStore> = match config.seen_news_database_url {
            Some(ref url) => {
                tracing::info!("Seen-news set kept in database");
                Arc::new(SqliteSeenStore::connect(url).await?)
            }
            None => {
                tracing::info!("Seen-news set kept in {}", config.seen_news_path.display());
                Arc::new(JsonFileStore::new(config.seen_news_path.clone()))
            }
        };

        Ok(Self::new(config, engine, notifier, store))
    }

    pub async fn send_startup_ping(&self) -> Result<(), NotificationError> {
        self.notifier.send_report(reports::STARTUP_PING).await
    }

    /// Run every task due at `now`. A failing task is logged and does not
    /// stop the remaining ones.
    pub async fn run_pass<Tz: TimeZone>(&self, now: DateTime<Tz>) -> PassReport {
        let hour = now.hour();
        let weekday = now.weekday().num_days_from_monday();
        let date = now.date_naive();

        let due = self.config.schedule.due_tasks(hour, weekday);
        tracing::info!(hour, weekday, "Scheduling pass due: {:?}", due);

        let mut outcomes = Vec::with_capacity(due.len());
        for &task in &due {
            let outcome = self.run_task(task, date).await;
            match &outcome {
                TaskOutcome::Sent => tracing::info!("{} sent", task),
                TaskOutcome::NothingToSend => tracing::info!("{}: nothing to send", task),
                TaskOutcome::Failed(reason) => tracing::warn!("{} failed: {}", task, reason),
            }
            outcomes.push((task, outcome));
        }

        PassReport { due, outcomes }
    }

    async fn run_task(&self, task: TaskKind, date: NaiveDate) -> TaskOutcome {
        match task {
            TaskKind::HourlyAlert => self.breaking_news().await,
            TaskKind::MorningPick => {
                let pick = self.engine.pick_of_the_day(&self.config.tables.pick_watchlist).await;
                let label = pick
                    .as_ref()
                    .map(|p| self.engine.scorer().label(p.sentiment, self.config.stock_threshold));
                self.deliver(&reports::pick_of_the_day(pick.as_ref(), label, date))
                    .await
            }
            TaskKind::CloseReport => {
                let tables = &self.config.tables;
                let sector_names: Vec<String> = tables.sectors.iter().map(|s| s.name.clone()).collect();
                let (summary, ratings) = tokio::join!(
                    self.engine
                        .market_summary(&tables.indices, &sector_names, self.config.sector_threshold),
                    self.engine.rate_universe(
                        &tables.universe,
                        self.config.rating_lookback,
                        self.config.stock_threshold
                    ),
                );
                self.deliver(&reports::close_report(&summary, &ratings, date))
                    .await
            }
            TaskKind::WeeklyOutlook => {
                let sectors = self
                    .engine
                    .sector_breakdown(
                        &self.config.tables.sectors,
                        self.config.sector_threshold,
                        SECTOR_LOOKBACK,
                    )
                    .await;
                self.deliver(&reports::sector_outlook(&sectors, date)).await
            }
        }
    }

    /// The seen-set is committed only after the alert message is delivered,
    /// so an undelivered alert is retried on the next pass.
    async fn breaking_news(&self) -> TaskOutcome {
        let headlines = match self
            .engine
            .headlines_limited(&self.config.alert_news_query, self.config.alert_headline_limit)
            .await
        {
            Ok(headlines) => headlines,
            Err(e) => return TaskOutcome::Failed(format!("news fetch: {}", e)),
        };

        let retry = self.config.retry;
        let mut pass = match retry
            .run("seen-news load", || DedupPass::load(self.store.as_ref()))
            .await
        {
            Ok(pass) => pass,
            Err(e) => return TaskOutcome::Failed(format!("seen-news load: {}", e)),
        };

        let alerts = pass.filter(&headlines, &self.matcher);
        tracing::debug!(
            fetched = headlines.len(),
            novel = alerts.len(),
            "Filtered breaking news"
        );
        let outcome = match reports::breaking_news(&alerts) {
            None => TaskOutcome::NothingToSend,
            Some(text) => match self.notifier.send_report(&text).await {
                Ok(()) => {
                    if let Err(e) = retry.run("seen-news commit", || pass.persist()).await {
                        // Already delivered; these headlines may be alerted again
                        tracing::error!("Failed to commit seen-news set: {}", e);
                    }
                    TaskOutcome::Sent
                }
                Err(e) => TaskOutcome::Failed(format!("delivery: {}", e)),
            },
        };

        if let Err(e) = pass.close().await {
            tracing::warn!("Failed to release seen-news lock: {}", e);
        }
        outcome
    }

    async fn deliver(&self, text: &str) -> TaskOutcome {
        match self.notifier.send_report(text).await {
            Ok(()) => TaskOutcome::Sent,
            Err(e) => TaskOutcome::Failed(format!("delivery: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{AnalysisError, Headline, NewsSource, PriceBar, PriceSeries, PriceSource, RetryPolicy};
    use async_trait::async_trait;
    use chrono::Utc;
    use news_alerts::{AlertError, MemorySeenStore};
    use notification_service::NotificationChannel;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    struct FlatPrices;

    #[async_trait]
    impl PriceSource for FlatPrices {
        async fn history(&self, symbol: &str, _lookback: Lookback) -> Result<PriceSeries, AnalysisError> {
            let bar = PriceBar {
                timestamp: Utc::now(),
                open: 100.0,
                close: 101.0,
            };
            Ok(PriceSeries::new(symbol, vec![bar]))
        }
    }

    #[derive(Default)]
    struct ScriptedNews {
        by_query: HashMap<String, Vec<Headline>>,
    }

    #[async_trait]
    impl NewsSource for ScriptedNews {
        async fn search(&self, query: &str, limit: usize) -> Result<Vec<Headline>, AnalysisError> {
            let mut items = self.by_query.get(query).cloned().unwrap_or_default();
            items.truncate(limit);
            Ok(items)
        }
    }

    #[derive(Clone, Default)]
    struct Chat {
        sent: Arc<Mutex<Vec<String>>>,
        down: Arc<AtomicBool>,
    }

    impl Chat {
        fn messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl NotificationChannel for Chat {
        async fn send(&self, text: &str) -> Result<(), NotificationError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(NotificationError::Rejected {
                    channel: "chat".into(),
                    status: 403,
                    body: "bot was blocked".into(),
                });
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        fn name(&self) -> &str {
            "chat"
        }
    }

    fn config() -> BotConfig {
        let vars: HashMap<&str, &str> = [("BOT_TOKEN", "t"), ("CHAT_ID", "1")].into();
        BotConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap()
    }

    /// Fails the first `load_failures` loads and `save_failures` saves.
    #[derive(Default)]
    struct FlakyStore {
        inner: MemorySeenStore,
        load_failures: AtomicU32,
        save_failures: AtomicU32,
    }

    fn take_failure(budget: &AtomicU32) -> Result<(), AlertError> {
        let left = budget.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match left {
            Ok(_) => Err(AlertError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk busy",
            ))),
            Err(_) => Ok(()),
        }
    }

    #[async_trait]
    impl SeenNewsStore for FlakyStore {
        async fn load(&self) -> Result<HashSet<Headline>, AlertError> {
            take_failure(&self.load_failures)?;
            self.inner.load().await
        }

        async fn save(&self, seen: &HashSet<Headline>) -> Result<(), AlertError> {
            take_failure(&self.save_failures)?;
            self.inner.save(seen).await
        }
    }

    fn driver(news: ScriptedNews, chat: &Chat, store: Arc<dyn SeenNewsStore>) -> Driver {
        let mut config = config();
        let retry = RetryPolicy {
            timeout: Duration::from_secs(1),
            max_attempts: 2,
            base_backoff: Duration::from_millis(1),
        };
        config.retry = retry;
        let engine = SignalEngine::new(
            Arc::new(FlatPrices),
            Arc::new(news),
            SentimentScorer::default(),
            RatingCalculator::new(config.rating),
            EngineSettings {
                headline_limit: config.headline_limit,
                max_concurrent_fetches: 2,
                retry,
                sector_query_suffix: config.sector_query_suffix.clone(),
            },
        );
        let notifier = NotificationService::with_channel(Box::new(chat.clone()), retry);
        Driver::new(config, engine, notifier, store)
    }

    fn alert_news(headlines: &[&str]) -> ScriptedNews {
        let mut news = ScriptedNews::default();
        news.by_query.insert(
            "market".to_string(),
            headlines.iter().map(|h| h.to_string()).collect(),
        );
        news
    }

    fn at(day: u32, hour: u32) -> DateTime<chrono_tz::Tz> {
        chrono_tz::Asia::Kolkata
            .with_ymd_and_hms(2024, 3, day, hour, 0, 0)
            .unwrap()
    }

    #[tokio::test]
    async fn test_midday_pass_only_alerts_once() {
        let chat = Chat::default();
        let store = Arc::new(MemorySeenStore::new());
        let driver = driver(
            alert_news(&["Reliance shares surge on Jio listing", "Rupee steady"]),
            &chat,
            store.clone(),
        );

        // Wednesday noon
        let first = driver.run_pass(at(6, 12)).await;
        assert_eq!(first.due, BTreeSet::from([TaskKind::HourlyAlert]));
        assert_eq!(first.outcome(TaskKind::HourlyAlert), Some(&TaskOutcome::Sent));
        assert_eq!(chat.messages().len(), 1);
        assert!(chat.messages()[0].contains("[Reliance] Reliance shares surge"));

        let second = driver.run_pass(at(6, 13)).await;
        assert_eq!(second.outcome(TaskKind::HourlyAlert), Some(&TaskOutcome::NothingToSend));
        assert_eq!(chat.messages().len(), 1);
        assert_eq!(store.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn test_undelivered_alert_is_not_committed() {
        let chat = Chat::default();
        chat.down.store(true, Ordering::SeqCst);
        let store = Arc::new(MemorySeenStore::new());
        let driver = driver(alert_news(&["TCS wins large deal"]), &chat, store.clone());

        let failed = driver.run_pass(at(6, 12)).await;
        assert_eq!(failed.failures(), 1);
        assert!(store.snapshot().is_empty());

        chat.down.store(false, Ordering::SeqCst);
        let retried = driver.run_pass(at(6, 13)).await;
        assert_eq!(retried.outcome(TaskKind::HourlyAlert), Some(&TaskOutcome::Sent));
        assert_eq!(chat.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_transient_store_failures_are_retried() {
        let chat = Chat::default();
        let store = Arc::new(FlakyStore {
            load_failures: AtomicU32::new(1),
            save_failures: AtomicU32::new(1),
            ..FlakyStore::default()
        });
        let driver = driver(alert_news(&["Infosys raises guidance"]), &chat, store.clone());

        let first = driver.run_pass(at(6, 12)).await;
        assert_eq!(first.outcome(TaskKind::HourlyAlert), Some(&TaskOutcome::Sent));
        assert_eq!(store.inner.snapshot().len(), 1);

        let second = driver.run_pass(at(6, 13)).await;
        assert_eq!(second.outcome(TaskKind::HourlyAlert), Some(&TaskOutcome::NothingToSend));
        assert_eq!(chat.messages().len(), 1);
    }

    #[tokio::test]
    async fn test_store_load_gives_up_after_retry_budget() {
        let chat = Chat::default();
        let store = Arc::new(FlakyStore {
            load_failures: AtomicU32::new(5),
            ..FlakyStore::default()
        });
        let driver = driver(alert_news(&["Infosys raises guidance"]), &chat, store);

        let report = driver.run_pass(at(6, 12)).await;
        assert!(matches!(
            report.outcome(TaskKind::HourlyAlert),
            Some(TaskOutcome::Failed(reason)) if reason.starts_with("seen-news load")
        ));
        assert!(chat.messages().is_empty());
    }

    #[tokio::test]
    async fn test_sunday_morning_sends_pick_and_outlook() {
        let chat = Chat::default();
        let driver = driver(ScriptedNews::default(), &chat, Arc::new(MemorySeenStore::new()));

        // 2024-03-10 is a Sunday
        let report = driver.run_pass(at(10, 9)).await;

        assert_eq!(
            report.due,
            BTreeSet::from([TaskKind::HourlyAlert, TaskKind::MorningPick, TaskKind::WeeklyOutlook])
        );
        assert_eq!(report.outcome(TaskKind::HourlyAlert), Some(&TaskOutcome::NothingToSend));
        let messages = chat.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("🌅 Pick of the Day"));
        assert!(messages[1].starts_with("🗓 Weekly Sector Outlook"));
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_halt_pass() {
        let chat = Chat::default();
        chat.down.store(true, Ordering::SeqCst);
        let driver = driver(ScriptedNews::default(), &chat, Arc::new(MemorySeenStore::new()));

        // Thursday 15:00, close window
        let report = driver.run_pass(at(7, 15)).await;

        assert_eq!(report.outcome(TaskKind::HourlyAlert), Some(&TaskOutcome::NothingToSend));
        assert!(matches!(report.outcome(TaskKind::CloseReport), Some(TaskOutcome::Failed(_))));
        assert_eq!(report.outcomes.len(), 2);
    }

    #[tokio::test]
    async fn test_close_report_contains_summary_and_ratings() {
        let chat = Chat::default();
        let driver = driver(ScriptedNews::default(), &chat, Arc::new(MemorySeenStore::new()));

        driver.run_pass(at(7, 16)).await;

        let messages = chat.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("NIFTY 50: 101.00 (+1.00)"));
        assert!(messages[0].contains("📈 Stock Ratings"));
        // Single-bar series: zero growth and neutral news rate 1.0
        assert!(messages[0].contains("• Reliance: 1.0/10 (Neutral 🟡)"));
    }
}
