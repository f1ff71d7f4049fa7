//! Which reports are due for a given wall-clock hour and weekday.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TaskKind {
    HourlyAlert,
    MorningPick,
    CloseReport,
    WeeklyOutlook,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TaskKind::HourlyAlert => "hourly-alert",
            TaskKind::MorningPick => "morning-pick",
            TaskKind::CloseReport => "close-report",
            TaskKind::WeeklyOutlook => "weekly-outlook",
        };
        f.write_str(name)
    }
}

/// Inclusive range of hours, `start..=end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HourWindow {
    pub start: u32,
    pub end: u32,
}

impl HourWindow {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, hour: u32) -> bool {
        (self.start..=self.end).contains(&hour)
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end && self.end <= 23
    }
}

impl fmt::Display for HourWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

/// Parses `"8-9"` or a single hour such as `"9"`.
impl FromStr for HourWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|e| format!("invalid hour '{}': {}", part.trim(), e))
        };
        match s.split_once('-') {
            Some((start, end)) => Ok(Self::new(parse(start)?, parse(end)?)),
            None => {
                let hour = parse(s)?;
                Ok(Self::new(hour, hour))
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScheduleWindows {
    pub morning: HourWindow,
    pub close: HourWindow,
    /// 0 = Monday
    pub weekly_outlook_weekday: u32,
}

impl Default for ScheduleWindows {
    fn default() -> Self {
        Self {
            morning: HourWindow::new(8, 9),
            close: HourWindow::new(15, 16),
            weekly_outlook_weekday: 6,
        }
    }
}

impl ScheduleWindows {
    /// Pure; `weekday` counts from Monday = 0. The hourly alert is always due.
    pub fn due_tasks(&self, hour: u32, weekday: u32) -> BTreeSet<TaskKind> {
        let mut due = BTreeSet::from([TaskKind::HourlyAlert]);
        if self.morning.contains(hour) {
            due.insert(TaskKind::MorningPick);
            if weekday == self.weekly_outlook_weekday {
                due.insert(TaskKind::WeeklyOutlook);
            }
        }
        if self.close.contains(hour) {
            due.insert(TaskKind::CloseReport);
        }
        due
    }
}
