//! Calendar scheduling — how many compounding events fall in a calendar month.
//!
//! Every day of the month is visited and tested against the frequency rule,
//! so results follow the real calendar (leap years, weekday layout) instead of
//! a fixed days-per-month approximation.

use chrono::{Datelike, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How often growth is applied to the balance.
///
/// Unrecognized labels deserialize to `Other` and compound on every day of the
/// month, matching the `Daily` rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CompoundFrequency {
    Daily,
    /// Monday through Friday.
    Weekday,
    /// Mondays only.
    Weekly,
    /// First day of every month.
    Monthly,
    /// First day of January, April, July and October.
    Quarterly,
    /// First day of January.
    Yearly,
    Other(String),
}

impl CompoundFrequency {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "daily" => Self::Daily,
            "weekday" => Self::Weekday,
            "weekly" => Self::Weekly,
            "monthly" => Self::Monthly,
            "quarterly" => Self::Quarterly,
            "yearly" => Self::Yearly,
            _ => Self::Other(label.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Daily => "daily",
            Self::Weekday => "weekday",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
            Self::Quarterly => "quarterly",
            Self::Yearly => "yearly",
            Self::Other(label) => label,
        }
    }

    /// Whether `date` is a compounding day under this rule.
    pub fn matches(&self, date: NaiveDate) -> bool {
        match self {
            Self::Daily | Self::Other(_) => true,
            Self::Weekday => !matches!(date.weekday(), Weekday::Sat | Weekday::Sun),
            Self::Weekly => date.weekday() == Weekday::Mon,
            Self::Monthly => date.day() == 1,
            Self::Quarterly => date.day() == 1 && is_quarter_start(date.month()),
            Self::Yearly => date.day() == 1 && date.month() == 1,
        }
    }
}

impl From<String> for CompoundFrequency {
    fn from(label: String) -> Self {
        Self::from_label(&label)
    }
}

impl From<CompoundFrequency> for String {
    fn from(freq: CompoundFrequency) -> Self {
        freq.label().to_string()
    }
}

impl fmt::Display for CompoundFrequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Months are 1-based: January, April, July, October.
fn is_quarter_start(month: u32) -> bool {
    matches!(month, 1 | 4 | 7 | 10)
}

/// Number of days in a calendar month (1-based month). Invalid months yield 0.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and(NaiveDate::from_ymd_opt(next_year, next_month, 1))
        .and_then(|first_of_next| first_of_next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(0)
}

/// Count the compounding events in one calendar month.
///
/// The result is always within `[0, days_in_month(year, month)]`.
pub fn count_compounding_events(year: i32, month: u32, frequency: &CompoundFrequency) -> u32 {
    (1..=days_in_month(year, month))
        .filter_map(|day| NaiveDate::from_ymd_opt(year, month, day))
        .filter(|date| frequency.matches(*date))
        .count() as u32
}

/// Advance `date` by whole calendar months.
///
/// The day is clamped to the end of the target month (Jan 31 + 1 month is
/// Feb 28/29), so the target month is never skipped.
pub fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months))
        .unwrap_or(NaiveDate::MAX)
}
