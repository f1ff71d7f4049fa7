//! Scheduled market reports delivered to a chat.
//!
//! Each invocation runs a single pass: [`schedule`] decides which reports
//! are due for the local time, [`driver::Driver`] builds them and sends
//! the text through the notifier.

pub mod config;
pub mod driver;
pub mod reports;
pub mod schedule;

pub use config::{BotConfig, StaticTables};
pub use driver::{Driver, PassReport, TaskOutcome};
pub use schedule::{HourWindow, ScheduleWindows, TaskKind};
