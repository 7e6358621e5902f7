use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, SubsecRound, Utc};

use crate::utils::time::{Calendar, same_iso_week};

use super::{error::InvalidState, storage::entities::Session};

/// In-memory list of finished sessions plus the one currently running.
#[derive(Debug, Default)]
pub struct SessionStore {
    history: Vec<Session>,
    current: Option<Session>,
}

impl SessionStore {
    pub fn new(history: Vec<Session>) -> Self {
        Self {
            history,
            current: None,
        }
    }

    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    pub fn history(&self) -> &[Session] {
        &self.history
    }

    /// Starts a new session. Timestamps are kept at second precision, the same as on disk.
    pub fn start(
        &mut self,
        project: Arc<str>,
        task: Arc<str>,
        now: DateTime<Utc>,
    ) -> Result<Session, InvalidState> {
        if self.current.is_some() {
            return Err(InvalidState::AlreadyRunning);
        }
        let session = Session::open(project, task, now.trunc_subsecs(0));
        self.current = Some(session.clone());
        Ok(session)
    }

    /// Closes the running session and moves it into the history.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<Session, InvalidState> {
        let session = self
            .current
            .take()
            .ok_or(InvalidState::NotRunning)?
            .close(now.trunc_subsecs(0));
        self.history.push(session.clone());
        Ok(session)
    }

    /// Sums every session started on `date`, including the running one.
    pub fn total_for_day(&self, date: NaiveDate, calendar: &Calendar, now: DateTime<Utc>) -> Duration {
        self.total_where(now, |session| calendar.date_of(session.start) == date)
    }

    /// Sums every session started in the Monday-started week containing `date`.
    pub fn total_for_week(
        &self,
        date: NaiveDate,
        calendar: &Calendar,
        now: DateTime<Utc>,
    ) -> Duration {
        self.total_where(now, |session| {
            same_iso_week(calendar.date_of(session.start), date)
        })
    }

    fn total_where(&self, now: DateTime<Utc>, filter: impl Fn(&Session) -> bool) -> Duration {
        self.history
            .iter()
            .chain(self.current.iter())
            .filter(|session| filter(session))
            .fold(Duration::zero(), |total, session| {
                total + session.duration_until(now)
            })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, day, hour, minute, 0).unwrap()
    }

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
    }

    #[test]
    fn start_twice_is_rejected() {
        let mut store = SessionStore::default();
        store.start("p".into(), "t".into(), at(16, 9, 0)).unwrap();
        assert_eq!(
            store.start("p".into(), "t".into(), at(16, 9, 5)),
            Err(InvalidState::AlreadyRunning)
        );
    }

    #[test]
    fn stop_while_idle_is_rejected() {
        let mut store = SessionStore::default();
        assert_eq!(store.stop(at(16, 9, 0)), Err(InvalidState::NotRunning));
    }

    #[test]
    fn stop_moves_session_into_history() {
        let mut store = SessionStore::default();
        store.start("p".into(), "t".into(), at(16, 9, 0)).unwrap();
        let closed = store.stop(at(16, 10, 30)).unwrap();

        assert_eq!(closed.end, Some(at(16, 10, 30)));
        assert!(store.current().is_none());
        assert_eq!(store.history(), [closed]);
    }

    #[test]
    fn timestamps_drop_subseconds() {
        let mut store = SessionStore::default();
        let now = at(16, 9, 0) + Duration::milliseconds(750);
        let session = store.start("p".into(), "t".into(), now).unwrap();
        assert_eq!(session.start, at(16, 9, 0));
    }

    #[test]
    fn day_total_includes_running_session() {
        let mut store = SessionStore::new(vec![
            Session::open("p".into(), "a".into(), at(16, 8, 0)).close(at(16, 9, 30)),
            Session::open("p".into(), "b".into(), at(15, 8, 0)).close(at(15, 12, 0)),
        ]);
        store.start("p".into(), "c".into(), at(16, 10, 0)).unwrap();

        let total = store.total_for_day(date(16), &Calendar::Utc, at(16, 10, 20));
        assert_eq!(total, Duration::minutes(90 + 20));
    }

    #[test]
    fn day_total_uses_start_date_only() {
        // Crosses midnight, counted fully on the day it started.
        let store = SessionStore::new(vec![
            Session::open("p".into(), "a".into(), at(15, 23, 0)).close(at(16, 1, 0)),
        ]);
        assert_eq!(
            store.total_for_day(date(15), &Calendar::Utc, at(16, 12, 0)),
            Duration::hours(2)
        );
        assert_eq!(
            store.total_for_day(date(16), &Calendar::Utc, at(16, 12, 0)),
            Duration::zero()
        );
    }

    #[test]
    fn week_boundary_splits_sunday_and_monday() {
        let store = SessionStore::new(vec![
            Session::open("p".into(), "sunday".into(), at(11, 23, 59)).close(at(12, 0, 30)),
            Session::open("p".into(), "monday".into(), at(12, 0, 1)).close(at(12, 0, 11)),
        ]);

        assert_eq!(
            store.total_for_week(date(16), &Calendar::Utc, at(16, 12, 0)),
            Duration::minutes(10)
        );
        assert_eq!(
            store.total_for_week(date(11), &Calendar::Utc, at(16, 12, 0)),
            Duration::minutes(31)
        );
    }

    #[test]
    fn day_total_is_sum_of_sessions() {
        let mut store = SessionStore::default();
        let mut expected = Duration::zero();
        for (index, minutes) in [5, 45, 17, 120].into_iter().enumerate() {
            let start = at(16, 8 + index as u32 * 3, 0);
            store.start("p".into(), "t".into(), start).unwrap();
            store.stop(start + Duration::minutes(minutes)).unwrap();
            expected += Duration::minutes(minutes);
        }

        assert_eq!(
            store.total_for_day(date(16), &Calendar::Utc, at(16, 23, 0)),
            expected
        );
    }
}
