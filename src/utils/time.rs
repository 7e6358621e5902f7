use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, Utc};

use crate::tracker::error::TrackerError;

/// Decides which calendar day an instant belongs to. Sessions are always stored as UTC
/// timestamps, only day, week and month boundaries depend on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Calendar {
    #[default]
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl Calendar {
    pub fn date_of(&self, moment: DateTime<Utc>) -> NaiveDate {
        match self {
            Calendar::Local => moment.with_timezone(&chrono::Local).date_naive(),
            Calendar::Utc => moment.date_naive(),
            Calendar::Fixed(offset) => moment.with_timezone(offset).date_naive(),
        }
    }
}

impl FromStr for Calendar {
    type Err = TrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TrackerError::InvalidTimezone { input: s.to_string() };
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "local" => return Ok(Calendar::Local),
            "utc" | "z" => return Ok(Calendar::Utc),
            _ => {}
        }

        let (sign, rest) = match trimmed.as_bytes().first() {
            Some(b'+') => (1, &trimmed[1..]),
            Some(b'-') => (-1, &trimmed[1..]),
            _ => return Err(invalid()),
        };
        let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
        let hours = hours.parse::<i32>().map_err(|_| invalid())?;
        let minutes = minutes.parse::<i32>().map_err(|_| invalid())?;
        if !(0..24).contains(&hours) || !(0..60).contains(&minutes) {
            return Err(invalid());
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Calendar::Fixed)
            .ok_or_else(invalid)
    }
}

impl Display for Calendar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Calendar::Local => write!(f, "local"),
            Calendar::Utc => write!(f, "utc"),
            Calendar::Fixed(offset) => write!(f, "{offset}"),
        }
    }
}

/// Whether both dates fall into the same Monday-started ISO week.
pub fn same_iso_week(a: NaiveDate, b: NaiveDate) -> bool {
    a.iso_week() == b.iso_week()
}

/// Renders a duration as zero padded `HH:MM`. Seconds are truncated, hours are not wrapped.
pub fn format_hh_mm(duration: Duration) -> String {
    let minutes = duration.num_minutes().max(0);
    format!("{:02}:{:02}", minutes / 60, minutes % 60)
}
