use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs4::tokio::AsyncFileExt;
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};
use tracing::{debug, info, warn};

use crate::{
    fs::operations::ends_mid_line,
    tracker::error::{InvalidState, TrackerError},
    utils::time::Calendar,
};

use super::{
    csv::{escape_field, parse_records},
    entities::{MonthKey, Session},
};

pub const SESSION_FILE_HEADER: &str = "start,end,project,task";

/// Interface for abstracting storage of finished sessions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Retrieves every session stored for a month. A missing file is an empty month, a malformed
    /// row fails the whole load.
    async fn load_sessions(&self, month: MonthKey) -> Result<Vec<Session>, TrackerError>;

    /// Appends a closed session to the file of the month it started in.
    async fn append_session(&self, session: &Session) -> Result<(), TrackerError>;
}

/// The main realization of [SessionStorage]. Keeps one comma separated file per month.
pub struct SessionStorageImpl {
    session_dir: PathBuf,
    calendar: Calendar,
}

impl SessionStorageImpl {
    pub fn new(session_dir: PathBuf, calendar: Calendar) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&session_dir)?;

        Ok(Self {
            session_dir,
            calendar,
        })
    }

    pub fn month_of(&self, session: &Session) -> MonthKey {
        MonthKey::of(self.calendar.date_of(session.start))
    }

    pub fn path_for(&self, month: MonthKey) -> PathBuf {
        self.session_dir.join(month.file_name())
    }

    async fn read_locked(path: &Path) -> Result<Option<String>, std::io::Error> {
        let mut file = match File::open(path).await {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        file.lock_shared()?;
        let mut content = String::new();
        let result = file.read_to_string(&mut content).await;
        file.unlock_async().await?;
        result?;
        Ok(Some(content))
    }

    async fn append_with_file(file: &mut File, row: &str) -> Result<(), TrackerError> {
        let mut buffer = String::new();
        if file.seek(std::io::SeekFrom::End(0)).await? == 0 {
            buffer.push_str(SESSION_FILE_HEADER);
            buffer.push('\n');
        } else if ends_mid_line(file).await? {
            // Keep the new row intact even if a previous write was cut off.
            buffer.push('\n');
        }
        buffer.push_str(row);
        buffer.push('\n');

        file.write_all(buffer.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl SessionStorage for SessionStorageImpl {
    async fn load_sessions(&self, month: MonthKey) -> Result<Vec<Session>, TrackerError> {
        let path = self.path_for(month);
        debug!("Loading sessions from {path:?}");
        match Self::read_locked(&path).await? {
            Some(content) => decode_sessions(&path, &content),
            None => {
                debug!("No session file for {month}");
                Ok(vec![])
            }
        }
    }

    async fn append_session(&self, session: &Session) -> Result<(), TrackerError> {
        let row = encode_session(session)?;
        let path = self.path_for(self.month_of(session));

        let mut file = File::options()
            .read(true)
            .append(true)
            .create(true)
            .open(&path)
            .await?;

        file.lock_exclusive()?;
        let result = Self::append_with_file(&mut file, &row).await;
        // The row is already written, reporting this as a failure would append it twice.
        if let Err(e) = file.unlock_async().await {
            warn!("Failed to unlock {path:?}: {e}");
        }

        if result.is_ok() {
            info!("Saved session {}/{} into {path:?}", session.project, session.task);
        }
        result
    }
}

fn encode_session(session: &Session) -> Result<String, TrackerError> {
    let end = session.end.ok_or(InvalidState::AlreadyRunning)?;
    Ok(format!(
        "{},{},{},{}",
        session.start.timestamp(),
        end.timestamp(),
        escape_field(&session.project),
        escape_field(&session.task)
    ))
}

fn decode_sessions(path: &Path, content: &str) -> Result<Vec<Session>, TrackerError> {
    let parse_error = |line: usize, reason: String| TrackerError::Parse {
        path: path.to_path_buf(),
        line,
        reason,
    };

    let records =
        parse_records(content).map_err(|e| parse_error(e.line, e.reason.to_string()))?;
    let mut records = records.into_iter();

    let Some(header) = records.next() else {
        return Ok(vec![]);
    };
    if header.fields.join(",") != SESSION_FILE_HEADER {
        return Err(parse_error(
            header.line,
            format!("expected header \"{SESSION_FILE_HEADER}\""),
        ));
    }

    records
        .map(|record| {
            let [start, end, project, task]: [String; 4] =
                record.fields.try_into().map_err(|fields: Vec<String>| {
                    parse_error(
                        record.line,
                        format!("expected 4 fields, found {}", fields.len()),
                    )
                })?;
            let start = parse_timestamp(&start)
                .ok_or_else(|| parse_error(record.line, format!("invalid start \"{start}\"")))?;
            let end = parse_timestamp(&end)
                .ok_or_else(|| parse_error(record.line, format!("invalid end \"{end}\"")))?;
            if end < start {
                return Err(parse_error(record.line, "end is before start".into()));
            }
            Ok(Session {
                start,
                end: Some(end),
                project: project.into(),
                task: task.into(),
            })
        })
        .collect()
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    value
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(|seconds| DateTime::from_timestamp(seconds, 0))
}
