//! The timer controller. [Tracker] owns the session store and the project cache, moves between
//! idle and running on user actions and renders the labels a tray shows.

use std::{fmt::Display, path::Path, sync::Arc};

use chrono::{DateTime, Utc};
use error::TrackerError;
use storage::{
    entities::{MonthKey, ProjectCache, Session},
    project_cache::{ProjectCacheFile, ProjectCacheStorage},
    session_storage::{SessionStorage, SessionStorageImpl},
};
use store::SessionStore;
use tracing::{error, info, warn};

use crate::utils::{
    clock::Clock,
    time::{Calendar, format_hh_mm},
};

pub mod error;
pub mod storage;
pub mod store;

pub const DEFAULT_PROJECT: &str = "Project";
pub const DEFAULT_TASK: &str = "Task";
pub const SESSION_DIR: &str = "sessions";
pub const PROJECT_CACHE_FILE: &str = "projects.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSettings {
    pub calendar: Calendar,
    /// Used by start/stop when nothing was selected yet.
    pub default_project: Arc<str>,
    pub default_task: Arc<str>,
}

impl Default for TrackerSettings {
    fn default() -> Self {
        Self {
            calendar: Calendar::Local,
            default_project: DEFAULT_PROJECT.into(),
            default_task: DEFAULT_TASK.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    Started(Session),
    Stopped(Session),
    Switched { stopped: Session, started: Session },
}

/// A write that failed while the in-memory state went ahead anyway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceWarning {
    SessionNotSaved { session: Session, reason: String },
    CacheNotSaved { reason: String },
}

impl Display for PersistenceWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PersistenceWarning::SessionNotSaved { session, reason } => write!(
                f,
                "Session {} / {} was not saved, will retry: {reason}",
                session.project, session.task
            ),
            PersistenceWarning::CacheNotSaved { reason } => {
                write!(f, "Project list was not saved, will retry: {reason}")
            }
        }
    }
}

/// Outcome of a user action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionReport {
    pub event: TimerEvent,
    pub warnings: Vec<PersistenceWarning>,
}

/// Everything a tray needs to redraw itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrayView {
    pub status: String,
    pub today: String,
    pub week: String,
    pub start_stop: String,
}

pub struct Tracker<S, C> {
    store: SessionStore,
    cache: ProjectCache,
    cache_dirty: bool,
    /// Closed sessions whose append failed. Retried on every later stop.
    unsaved: Vec<Session>,
    last_selection: Option<(Arc<str>, Arc<str>)>,
    session_storage: S,
    cache_storage: C,
    clock: Box<dyn Clock>,
    settings: TrackerSettings,
}

/// Creates a tracker backed by files in `app_dir`.
pub async fn create_tracker(
    app_dir: &Path,
    clock: impl Clock,
    settings: TrackerSettings,
) -> Result<Tracker<SessionStorageImpl, ProjectCacheFile>, TrackerError> {
    let sessions = SessionStorageImpl::new(app_dir.join(SESSION_DIR), settings.calendar)?;
    let cache = ProjectCacheFile::new(app_dir.join(PROJECT_CACHE_FILE));
    Tracker::load(sessions, cache, Box::new(clock), settings).await
}

impl<S: SessionStorage, C: ProjectCacheStorage> Tracker<S, C> {
    /// Loads the current month and the project cache. Either failing to load is an error, a
    /// malformed file must not be silently treated as empty.
    pub async fn load(
        session_storage: S,
        cache_storage: C,
        clock: Box<dyn Clock>,
        settings: TrackerSettings,
    ) -> Result<Self, TrackerError> {
        let month = MonthKey::of(settings.calendar.date_of(clock.time()));
        let history = session_storage.load_sessions(month).await?;
        let cache = cache_storage.load_project_cache().await?;
        info!("Loaded {} sessions for {month}", history.len());

        Ok(Self {
            store: SessionStore::new(history),
            cache,
            cache_dirty: false,
            unsaved: vec![],
            last_selection: None,
            session_storage,
            cache_storage,
            clock,
            settings,
        })
    }

    pub fn is_running(&self) -> bool {
        self.store.current().is_some()
    }

    pub fn current(&self) -> Option<&Session> {
        self.store.current()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn unsaved_sessions(&self) -> &[Session] {
        &self.unsaved
    }

    pub fn known_projects(&self) -> &ProjectCache {
        &self.cache
    }

    pub async fn start(&mut self, project: &str, task: &str) -> Result<ActionReport, TrackerError> {
        let mut warnings = vec![];
        let started = self.begin(project.into(), task.into(), &mut warnings).await?;
        Ok(ActionReport {
            event: TimerEvent::Started(started),
            warnings,
        })
    }

    pub async fn stop(&mut self) -> Result<ActionReport, TrackerError> {
        let mut warnings = vec![];
        let stopped = self.finish(&mut warnings).await?;
        Ok(ActionReport {
            event: TimerEvent::Stopped(stopped),
            warnings,
        })
    }

    /// The single start/stop button. Starting reuses the last selected task.
    pub async fn on_start_stop_requested(&mut self) -> Result<ActionReport, TrackerError> {
        if self.is_running() {
            return self.stop().await;
        }
        let (project, task) = self.last_selection.clone().unwrap_or_else(|| {
            (
                self.settings.default_project.clone(),
                self.settings.default_task.clone(),
            )
        });
        let mut warnings = vec![];
        let started = self.begin(project, task, &mut warnings).await?;
        Ok(ActionReport {
            event: TimerEvent::Started(started),
            warnings,
        })
    }

    /// Picking a task always starts it, stopping whatever was running first.
    pub async fn on_task_selected(
        &mut self,
        project: &str,
        task: &str,
    ) -> Result<ActionReport, TrackerError> {
        let project = non_empty_or(project, &self.settings.default_project);
        let task = non_empty_or(task, &self.settings.default_task);

        let mut warnings = vec![];
        let stopped = if self.is_running() {
            Some(self.finish(&mut warnings).await?)
        } else {
            None
        };
        let started = self.begin(project, task, &mut warnings).await?;

        let event = match stopped {
            Some(stopped) => TimerEvent::Switched { stopped, started },
            None => TimerEvent::Started(started),
        };
        Ok(ActionReport { event, warnings })
    }

    pub fn on_tick(&self) -> TrayView {
        let now = self.clock.time();
        TrayView {
            status: self.status_label_at(now),
            today: self.day_label_at(now),
            week: self.week_label_at(now),
            start_stop: self.start_stop_label(),
        }
    }

    /// Stops a running session so it isn't lost when the program exits.
    pub async fn shutdown(&mut self) -> Result<Option<ActionReport>, TrackerError> {
        if self.is_running() {
            return Ok(Some(self.stop().await?));
        }
        if !self.unsaved.is_empty() || self.cache_dirty {
            let mut warnings = vec![];
            self.flush_unsaved(&mut warnings).await;
            self.save_cache_if_dirty(&mut warnings).await;
            for warning in warnings {
                warn!("Unsaved state on shutdown: {warning}");
            }
        }
        Ok(None)
    }

    pub fn current_status_label(&self) -> String {
        self.status_label_at(self.clock.time())
    }

    pub fn day_total_label(&self) -> String {
        self.day_label_at(self.clock.time())
    }

    pub fn week_total_label(&self) -> String {
        self.week_label_at(self.clock.time())
    }

    pub fn start_stop_label(&self) -> String {
        if self.is_running() { "Stop" } else { "Start" }.to_string()
    }

    fn status_label_at(&self, now: DateTime<Utc>) -> String {
        match self.store.current() {
            Some(session) => format!(
                "{} / {} ({})",
                session.project,
                session.task,
                format_hh_mm(session.duration_until(now))
            ),
            None => "Idle".to_string(),
        }
    }

    fn day_label_at(&self, now: DateTime<Utc>) -> String {
        let calendar = &self.settings.calendar;
        let total = self.store.total_for_day(calendar.date_of(now), calendar, now);
        format!("Today: {}", format_hh_mm(total))
    }

    fn week_label_at(&self, now: DateTime<Utc>) -> String {
        let calendar = &self.settings.calendar;
        let total = self.store.total_for_week(calendar.date_of(now), calendar, now);
        format!("Week: {}", format_hh_mm(total))
    }

    async fn begin(
        &mut self,
        project: Arc<str>,
        task: Arc<str>,
        warnings: &mut Vec<PersistenceWarning>,
    ) -> Result<Session, TrackerError> {
        let session = self
            .store
            .start(project.clone(), task.clone(), self.clock.time())?;
        info!("Started {project} / {task}");

        if self.cache.record(&project, &task) {
            self.cache_dirty = true;
        }
        self.last_selection = Some((project, task));
        self.save_cache_if_dirty(warnings).await;
        Ok(session)
    }

    async fn finish(
        &mut self,
        warnings: &mut Vec<PersistenceWarning>,
    ) -> Result<Session, TrackerError> {
        let session = self.store.stop(self.clock.time())?;
        info!(
            "Stopped {} / {} after {}",
            session.project,
            session.task,
            format_hh_mm(session.duration_until(session.start))
        );

        self.unsaved.push(session.clone());
        self.flush_unsaved(warnings).await;
        self.save_cache_if_dirty(warnings).await;
        Ok(session)
    }

    async fn flush_unsaved(&mut self, warnings: &mut Vec<PersistenceWarning>) {
        let mut failed = vec![];
        for session in std::mem::take(&mut self.unsaved) {
            if let Err(e) = self.session_storage.append_session(&session).await {
                error!("Failed to save session {session:?}: {e}");
                warnings.push(PersistenceWarning::SessionNotSaved {
                    session: session.clone(),
                    reason: e.to_string(),
                });
                failed.push(session);
            }
        }
        self.unsaved = failed;
    }

    async fn save_cache_if_dirty(&mut self, warnings: &mut Vec<PersistenceWarning>) {
        if !self.cache_dirty {
            return;
        }
        match self.cache_storage.save_project_cache(&self.cache).await {
            Ok(()) => self.cache_dirty = false,
            Err(e) => {
                error!("Failed to save project cache: {e}");
                warnings.push(PersistenceWarning::CacheNotSaved {
                    reason: e.to_string(),
                });
            }
        }
    }
}

fn non_empty_or(value: &str, fallback: &Arc<str>) -> Arc<str> {
    let value = value.trim();
    if value.is_empty() {
        fallback.clone()
    } else {
        value.into()
    }
}
