use anyhow::Result;
use market_bot::{BotConfig, Driver};

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    // Panic hook: log panic info before crashing
    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    tracing::info!("Starting market report bot");

    // 2. Load and validate configuration
    let config = BotConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Timezone: {}", config.timezone);
    tracing::info!(
        "  Morning window: {}, close window: {}, weekly outlook weekday: {}",
        config.schedule.morning,
        config.schedule.close,
        config.schedule.weekly_outlook_weekday
    );
    tracing::info!(
        "  Thresholds: sector {}, stock {}",
        config.sector_threshold,
        config.stock_threshold
    );
    tracing::info!(
        "  Tables: {} universe, {} watchlist, {} sectors, {} alert targets",
        config.tables.universe.len(),
        config.tables.pick_watchlist.len(),
        config.tables.sectors.len(),
        config.tables.alert_targets.len()
    );

    // 3. Wire collaborators
    let timezone = config.timezone;
    let send_ping = config.send_startup_ping;
    let driver = Driver::from_config(config).await?;

    if send_ping {
        match driver.send_startup_ping().await {
            Ok(()) => tracing::info!("Startup ping delivered"),
            Err(e) => tracing::warn!("Startup ping failed: {}", e),
        }
    }

    // 4. One scheduling pass at the current local time
    let now = chrono::Utc::now().with_timezone(&timezone);
    let report = driver.run_pass(now).await;

    let failures = report.failures();
    if failures > 0 {
        anyhow::bail!("{} of {} due task(s) failed", failures, report.due.len());
    }
    tracing::info!("Pass complete ({} task(s) due)", report.due.len());
    Ok(())
}
