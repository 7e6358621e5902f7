use std::{collections::BTreeMap, fmt::Display, sync::Arc};

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A stretch of work on a task. `end` is only absent while the session is still running.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Session {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
    pub project: Arc<str>,
    pub task: Arc<str>,
}

impl Session {
    pub fn open(project: Arc<str>, task: Arc<str>, start: DateTime<Utc>) -> Self {
        Self {
            start,
            end: None,
            project,
            task,
        }
    }

    pub fn is_running(&self) -> bool {
        self.end.is_none()
    }

    /// Closes the session. An end before the start (clock stepped backwards) is clamped to the
    /// start.
    pub fn close(self, end: DateTime<Utc>) -> Self {
        let end = end.max(self.start);
        Self {
            end: Some(end),
            ..self
        }
    }

    /// Time worked, counting a running session up to `now`.
    pub fn duration_until(&self, now: DateTime<Utc>) -> Duration {
        (self.end.unwrap_or(now) - self.start).max(Duration::zero())
    }
}

/// Year and month naming a session file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    year: i32,
    month: u32,
}

impl MonthKey {
    pub fn new_opt(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn file_name(&self) -> String {
        format!("{self}.csv")
    }
}

impl Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Every task ever used under a project, in the order they were first used. Entries are never
/// removed.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, Vec<String>>",
    into = "BTreeMap<String, Vec<String>>"
)]
pub struct ProjectCache {
    projects: BTreeMap<String, Vec<String>>,
}

impl ProjectCache {
    /// Returns true if the pair wasn't known before.
    pub fn record(&mut self, project: &str, task: &str) -> bool {
        let tasks = self.projects.entry(project.to_string()).or_default();
        if tasks.iter().any(|t| t == task) {
            false
        } else {
            tasks.push(task.to_string());
            true
        }
    }

    pub fn contains(&self, project: &str, task: &str) -> bool {
        self.tasks(project).iter().any(|t| t == task)
    }

    pub fn tasks(&self, project: &str) -> &[String] {
        self.projects.get(project).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn projects(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.projects
            .iter()
            .map(|(project, tasks)| (project.as_str(), tasks.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.projects.is_empty()
    }
}

impl From<BTreeMap<String, Vec<String>>> for ProjectCache {
    fn from(value: BTreeMap<String, Vec<String>>) -> Self {
        let mut cache = ProjectCache::default();
        for (project, tasks) in value {
            cache.projects.entry(project.clone()).or_default();
            for task in tasks {
                cache.record(&project, &task);
            }
        }
        cache
    }
}

impl From<ProjectCache> for BTreeMap<String, Vec<String>> {
    fn from(value: ProjectCache) -> Self {
        value.projects
    }
}
