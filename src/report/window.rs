use crate::report::error::{ReportError, Result};
use chrono::{DateTime, Months, TimeDelta, Utc};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Week,
    Month,
    Quarter,
    Year,
}

impl Frequency {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Quarter => "quarter",
            Self::Year => "year",
        }
    }
}

impl FromStr for Frequency {
    type Err = ReportError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "week" | "weekly" => Ok(Self::Week),
            "month" | "monthly" => Ok(Self::Month),
            "quarter" | "quarterly" => Ok(Self::Quarter),
            "year" | "yearly" => Ok(Self::Year),
            _ => Err(ReportError::UnknownFrequency(raw.to_string())),
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Earliest instant covered by a report of `frequency` ending at `now`.
///
/// Month arithmetic clamps to the end of shorter months (Mar 31 minus one
/// month is the last day of February).
pub fn compute_window(now: DateTime<Utc>, frequency: Frequency) -> DateTime<Utc> {
    let earliest = match frequency {
        Frequency::Week => now.checked_sub_signed(TimeDelta::days(7)),
        Frequency::Month => now.checked_sub_months(Months::new(1)),
        Frequency::Quarter => now.checked_sub_months(Months::new(3)),
        Frequency::Year => now.checked_sub_months(Months::new(12)),
    };

    earliest.unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub earliest: DateTime<Utc>,
    pub now: DateTime<Utc>,
}

impl TimeWindow {
    pub fn ending_at(now: DateTime<Utc>, frequency: Frequency) -> Self {
        Self {
            earliest: compute_window(now, frequency),
            now,
        }
    }

    /// Both bounds are exclusive.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant > self.earliest && instant < self.now
    }
}

/// Accepts RFC 3339 as well as offsets written without a colon (`+0000`).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();

    DateTime::parse_from_rfc3339(trimmed)
        .or_else(|_| DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f%z"))
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}
