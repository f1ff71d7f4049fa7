//! Plain-text rendering of each report for the chat.

use std::fmt::Write;

use analysis_orchestrator::{MarketSummary, Pick, SectorReport, StockRating};
use chrono::NaiveDate;
use news_alerts::NewsAlert;
use sentiment_analysis::SentimentLabel;

pub const DISCLAIMER: &str = "⚠ Educational AI analysis only. Not SEBI registered advice.";

pub const STARTUP_PING: &str = "✅ BOT STARTED: Telegram connection test";

fn date_line(date: NaiveDate) -> String {
    format!("📅 {}", date.format("%d %b %Y"))
}

/// `None` when there is nothing new to alert.
pub fn breaking_news(alerts: &[NewsAlert]) -> Option<String> {
    if alerts.is_empty() {
        return None;
    }
    let mut msg = String::from("🚨 Breaking Market News\n\n");
    for alert in alerts {
        let _ = writeln!(msg, "• [{}] {}", alert.target.name, alert.headline);
    }
    Some(msg.trim_end().to_string())
}

pub fn pick_of_the_day(pick: Option<&Pick>, label: Option<SentimentLabel>, date: NaiveDate) -> String {
    let mut msg = format!("🌅 Pick of the Day\n{}\n\n", date_line(date));
    match pick {
        Some(pick) => {
            let _ = writeln!(msg, "⭐ {} ({})", pick.instrument.name, pick.instrument.symbol);
            let _ = write!(msg, "News sentiment: {:.2}", pick.sentiment);
            if let Some(label) = label {
                let _ = write!(msg, " ({})", label);
            }
            msg.push('\n');
        }
        None => msg.push_str("No watchlist candidate could be scored today.\n"),
    }
    let _ = write!(msg, "\n{}", DISCLAIMER);
    msg
}

pub fn market_summary(summary: &MarketSummary, date: NaiveDate) -> String {
    let mut msg = format!("📊 Indian Market AI Summary\n{}\n\n", date_line(date));

    if summary.indices.is_empty() {
        msg.push_str("Index data unavailable.\n");
    }
    for quote in &summary.indices {
        let _ = writeln!(msg, "{}: {:.2} ({:+.2})", quote.index.name, quote.close, quote.change);
    }

    msg.push_str("\n🏭 Sector News Sentiment:\n");
    for mood in &summary.sectors {
        let _ = writeln!(msg, "• {}: {}", mood.sector, mood.label);
    }

    let _ = write!(msg, "\n{}", DISCLAIMER);
    msg
}

pub fn stock_ratings(ratings: &[StockRating]) -> String {
    let mut msg = String::from("📈 Stock Ratings\n\n");
    if ratings.is_empty() {
        msg.push_str("No ratings available.\n");
    }
    for r in ratings {
        let _ = writeln!(msg, "• {}: {}/10 ({})", r.instrument.name, r.rating, r.label);
    }
    msg.trim_end().to_string()
}

/// Market summary followed by the stock ratings, sent as one report.
pub fn close_report(summary: &MarketSummary, ratings: &[StockRating], date: NaiveDate) -> String {
    format!("{}\n\n{}", market_summary(summary, date), stock_ratings(ratings))
}

pub fn sector_outlook(reports: &[SectorReport], date: NaiveDate) -> String {
    let mut msg = format!("🗓 Weekly Sector Outlook\n{}\n", date_line(date));
    if reports.is_empty() {
        msg.push_str("\nNo sector data available.\n");
    }
    for report in reports {
        let _ = writeln!(msg, "\n🏭 {}: {}", report.sector, report.label);
        for r in &report.ratings {
            let _ = writeln!(msg, "   • {}: {}/10", r.instrument.name, r.rating);
        }
    }
    let _ = write!(msg, "\n{}", DISCLAIMER);
    msg
}
