use std::{collections::HashMap, fmt::Display, io::Write, sync::Arc};

use anyhow::Result;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, Utc};
use chrono_english::parse_date_string;
use clap::{CommandFactory, Parser, ValueEnum};

use crate::{
    tracker::{
        storage::{
            entities::{MonthKey, Session},
            session_storage::SessionStorage,
        },
        store::SessionStore,
    },
    utils::time::{Calendar, format_hh_mm},
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
pub struct ReportCommand {
    #[arg(
        long,
        short,
        help = "Day to report on. Examples are \"today\", \"yesterday\", \"last friday\", \"15/03/2025\""
    )]
    date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
}

/// Time spent on a single task during the reported day.
#[derive(Debug, PartialEq, Eq)]
pub struct TaskUsage {
    pub project: Arc<str>,
    pub task: Arc<str>,
    pub duration: Duration,
}

/// Prints day and week totals for a date from its month file. Weeks crossing into another month
/// only count the sessions of the reported month.
pub async fn process_report_command(
    ReportCommand { date, date_style }: ReportCommand,
    storage: &impl SessionStorage,
    calendar: Calendar,
    output: &mut impl Write,
) -> Result<()> {
    let now = Utc::now();
    let date = match date {
        Some(date) => parse_report_date(&date, date_style, calendar, now).map_err(|e| {
            Args::command().error(
                clap::error::ErrorKind::ValueValidation,
                format!("Failed to validate date {e}"),
            )
        })?,
        None => calendar.date_of(now),
    };

    let store = SessionStore::new(storage.load_sessions(MonthKey::of(date)).await?);
    write_report(&store, date, calendar, now, output)?;
    Ok(())
}

fn parse_report_date(
    input: &str,
    date_style: DateStyle,
    calendar: Calendar,
    now: DateTime<Utc>,
) -> Result<NaiveDate, chrono_english::DateError> {
    let dialect = date_style.into();
    match calendar {
        Calendar::Local => {
            parse_date_string(input, now.with_timezone(&Local), dialect).map(|v| v.date_naive())
        }
        Calendar::Utc => parse_date_string(input, now, dialect).map(|v| v.date_naive()),
        Calendar::Fixed(offset) => {
            parse_date_string(input, now.with_timezone(&offset), dialect).map(|v| v.date_naive())
        }
    }
}

fn write_report(
    store: &SessionStore,
    date: NaiveDate,
    calendar: Calendar,
    now: DateTime<Utc>,
    output: &mut impl Write,
) -> std::io::Result<()> {
    writeln!(output, "{}", date.format("%A %Y-%m-%d"))?;
    writeln!(
        output,
        "Day: {}",
        format_hh_mm(store.total_for_day(date, &calendar, now))
    )?;
    writeln!(
        output,
        "Week {}: {}",
        date.iso_week().week(),
        format_hh_mm(store.total_for_week(date, &calendar, now))
    )?;

    for usage in analyze_tasks(store.history(), date, &calendar, now) {
        writeln!(
            output,
            "  {}\t{} / {}",
            format_hh_mm(usage.duration),
            usage.project,
            usage.task
        )?;
    }
    Ok(())
}

/// Returns the tasks worked on during `date`, longest first.
pub fn analyze_tasks(
    sessions: &[Session],
    date: NaiveDate,
    calendar: &Calendar,
    now: DateTime<Utc>,
) -> Vec<TaskUsage> {
    let mut map = HashMap::<(Arc<str>, Arc<str>), Duration>::new();

    for session in sessions
        .iter()
        .filter(|session| calendar.date_of(session.start) == date)
    {
        *map.entry((session.project.clone(), session.task.clone()))
            .or_insert_with(Duration::zero) += session.duration_until(now);
    }

    let mut usages = map
        .into_iter()
        .map(|((project, task), duration)| TaskUsage {
            project,
            task,
            duration,
        })
        .collect::<Vec<_>>();
    usages.sort_by(|a, b| {
        b.duration
            .cmp(&a.duration)
            .then_with(|| a.project.cmp(&b.project))
            .then_with(|| a.task.cmp(&b.task))
    });
    usages
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, hour, minute, 0).unwrap()
    }

    fn session(project: &str, task: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> Session {
        Session::open(project.into(), task.into(), start).close(end)
    }

    #[test]
    fn tasks_are_grouped_and_sorted() {
        let sessions = [
            session("atlas", "review", at(16, 8, 0), at(16, 8, 30)),
            session("hog", "c2", at(16, 9, 0), at(16, 10, 0)),
            session("atlas", "review", at(16, 11, 0), at(16, 11, 45)),
            session("atlas", "review", at(15, 11, 0), at(15, 15, 0)),
        ];
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();

        let usages = analyze_tasks(&sessions, date, &Calendar::Utc, at(16, 12, 0));

        assert_eq!(
            usages,
            [
                TaskUsage {
                    project: "atlas".into(),
                    task: "review".into(),
                    duration: Duration::minutes(75),
                },
                TaskUsage {
                    project: "hog".into(),
                    task: "c2".into(),
                    duration: Duration::minutes(60),
                },
            ]
        );
    }

    #[test]
    fn report_lists_totals() {
        let store = SessionStore::new(vec![
            session("atlas", "review", at(12, 9, 0), at(12, 12, 0)),
            session("atlas", "review", at(16, 9, 0), at(16, 10, 30)),
        ]);
        let date = NaiveDate::from_ymd_opt(2026, 10, 16).unwrap();
        let mut output = Vec::new();

        write_report(&store, date, Calendar::Utc, at(16, 12, 0), &mut output).unwrap();

        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Friday 2026-10-16\nDay: 01:30\nWeek 42: 04:30\n  01:30\tatlas / review\n"
        );
    }

    #[test]
    fn parses_relative_dates() {
        let now = at(16, 12, 0);
        assert_eq!(
            parse_report_date("yesterday", DateStyle::Uk, Calendar::Utc, now).unwrap(),
            NaiveDate::from_ymd_opt(2026, 10, 15).unwrap()
        );
        assert!(parse_report_date("not a date at all", DateStyle::Uk, Calendar::Utc, now).is_err());
    }
}
