//! Terminal stand-in for a tray icon. Reads actions from stdin, one per line, and re-renders the
//! labels on every tick.

use std::{
    io::{ErrorKind, Write},
    path::Path,
    str::FromStr,
    time::Duration,
};

use anyhow::{Result, anyhow, bail};
use clap::Parser;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_stream::{StreamExt, wrappers::LinesStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::{
    tracker::{
        ActionReport, TimerEvent, Tracker, TrackerSettings, TrayView, create_tracker,
        error::TrackerError,
        storage::{
            entities::ProjectCache, project_cache::ProjectCacheStorage,
            session_storage::SessionStorage,
        },
    },
    utils::{
        clock::{Clock, DefaultClock},
        time::format_hh_mm,
    },
};

use super::shutdown::detect_shutdown;

pub const DEFAULT_TICK_SECONDS: u64 = 1;

const HELP: &str = "Commands:
  toggle                    start or stop the timer
  select <project> | <task> switch to a task, stopping the running one
  status                    print the current labels
  projects                  list known projects and tasks
  quit                      stop the running session and exit";

#[derive(Debug, Parser)]
pub struct TrayCommand {
    #[arg(long, help = "Seconds between label refreshes. Defaults to 1")]
    tick: Option<u64>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum TrayAction {
    Toggle,
    Select { project: String, task: String },
    Status,
    Projects,
    Help,
    Quit,
}

impl FromStr for TrayAction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (command, rest) = s.split_once(char::is_whitespace).unwrap_or((s, ""));
        match command.to_ascii_lowercase().as_str() {
            "toggle" | "start" | "stop" => Ok(TrayAction::Toggle),
            "select" => {
                let (project, task) = rest
                    .split_once('|')
                    .ok_or_else(|| anyhow!("Usage: select <project> | <task>"))?;
                let (project, task) = (project.trim(), task.trim());
                if project.is_empty() || task.is_empty() {
                    bail!("Usage: select <project> | <task>");
                }
                Ok(TrayAction::Select {
                    project: project.to_string(),
                    task: task.to_string(),
                })
            }
            "status" => Ok(TrayAction::Status),
            "projects" => Ok(TrayAction::Projects),
            "help" | "?" => Ok(TrayAction::Help),
            "quit" | "exit" => Ok(TrayAction::Quit),
            _ => Err(anyhow!("Unknown command \"{command}\", type help for a list")),
        }
    }
}

/// Runs the tray until stdin closes, `quit` is typed or Ctrl-C is pressed.
pub async fn process_tray_command(
    TrayCommand { tick }: TrayCommand,
    app_dir: &Path,
    settings: TrackerSettings,
    configured_tick: Option<u64>,
) -> Result<()> {
    let tick = Duration::from_secs(
        tick.or(configured_tick)
            .unwrap_or(DEFAULT_TICK_SECONDS)
            .max(1),
    );
    let mut tracker = create_tracker(app_dir, DefaultClock, settings).await?;
    info!("Tray started in {app_dir:?}, ticking every {tick:?}");

    let shutdown_token = CancellationToken::new();
    let mut stdout = std::io::stdout();
    let tray = run_tray(
        &mut tracker,
        BufReader::new(tokio::io::stdin()),
        &mut stdout,
        &DefaultClock,
        tick,
        &shutdown_token,
    );
    tokio::pin!(tray);

    tokio::select! {
        result = &mut tray => {
            shutdown_token.cancel();
            result
        }
        _ = detect_shutdown(shutdown_token.clone()) => tray.await,
    }
}

/// Remembers the last printed view so unchanged ticks stay quiet.
#[derive(Default)]
struct Renderer {
    last: Option<TrayView>,
}

impl Renderer {
    fn render(&mut self, view: TrayView, output: &mut impl Write) -> std::io::Result<()> {
        if self.last.as_ref() != Some(&view) {
            write_view(&view, output)?;
            self.last = Some(view);
        }
        Ok(())
    }
}

/// Executes the tray event loop. The tracker is shut down on every exit, including errors.
pub async fn run_tray<S: SessionStorage, C: ProjectCacheStorage>(
    tracker: &mut Tracker<S, C>,
    input: impl AsyncBufRead + Unpin,
    output: &mut impl Write,
    clock: &dyn Clock,
    tick: Duration,
    shutdown: &CancellationToken,
) -> Result<()> {
    let mut lines = LinesStream::new(input.lines());
    let mut renderer = Renderer::default();

    let result = async {
        renderer.render(tracker.on_tick(), output)?;
        let mut next_tick = clock.instant() + tick;

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("Tray received shutdown");
                    break;
                }
                _ = clock.sleep_until(next_tick) => {
                    // Measured from now so a suspended machine doesn't wake up to a burst of ticks.
                    next_tick = clock.instant() + tick;
                    renderer.render(tracker.on_tick(), output)?;
                }
                line = lines.next() => {
                    let line = match line {
                        None => {
                            debug!("Input closed");
                            break;
                        }
                        Some(Ok(line)) => line,
                        Some(Err(e)) if e.kind() == ErrorKind::InvalidData => {
                            warn!("Skipping unreadable input line: {e}");
                            writeln!(output, "Unreadable input line, type help for a list")?;
                            continue;
                        }
                        Some(Err(e)) => return Err(e.into()),
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match line.parse::<TrayAction>() {
                        Ok(TrayAction::Quit) => break,
                        Ok(action) => execute(tracker, action, output).await?,
                        Err(e) => writeln!(output, "{e}")?,
                    }
                    renderer.render(tracker.on_tick(), output)?;
                }
            }
            output.flush()?;
        }
        anyhow::Ok(())
    }
    .await;

    if let Err(e) = &result {
        error!("Tray loop failed, shutting down: {e}");
    }
    let closed = close_tracker(tracker, output).await;
    result.and(closed)
}

/// Stops a running session and reports what could not be saved.
async fn close_tracker<S: SessionStorage, C: ProjectCacheStorage>(
    tracker: &mut Tracker<S, C>,
    output: &mut impl Write,
) -> Result<()> {
    if let Some(report) = tracker.shutdown().await? {
        write_report(Ok(report), output)?;
    }
    for session in tracker.unsaved_sessions() {
        warn!("Exiting with unsaved session {session:?}");
        writeln!(
            output,
            "Warning: session {} / {} could not be saved",
            session.project, session.task
        )?;
    }
    output.flush()?;
    Ok(())
}

async fn execute<S: SessionStorage, C: ProjectCacheStorage>(
    tracker: &mut Tracker<S, C>,
    action: TrayAction,
    output: &mut impl Write,
) -> std::io::Result<()> {
    match action {
        TrayAction::Toggle => write_report(tracker.on_start_stop_requested().await, output),
        TrayAction::Select { project, task } => {
            write_report(tracker.on_task_selected(&project, &task).await, output)
        }
        TrayAction::Status => write_view(&tracker.on_tick(), output),
        TrayAction::Projects => write_projects(tracker.known_projects(), output),
        TrayAction::Help => writeln!(output, "{HELP}"),
        TrayAction::Quit => Ok(()),
    }
}

fn write_view(view: &TrayView, output: &mut impl Write) -> std::io::Result<()> {
    writeln!(
        output,
        "{} | {} | {} | [{}]",
        view.status, view.today, view.week, view.start_stop
    )
}

fn write_report(
    result: Result<ActionReport, TrackerError>,
    output: &mut impl Write,
) -> std::io::Result<()> {
    let report = match result {
        Ok(report) => report,
        Err(e) => return writeln!(output, "Error: {e}"),
    };
    match &report.event {
        TimerEvent::Started(session) => {
            writeln!(output, "Started {} / {}", session.project, session.task)?
        }
        TimerEvent::Stopped(session) => writeln!(
            output,
            "Stopped {} / {} after {}",
            session.project,
            session.task,
            format_hh_mm(session.duration_until(session.start))
        )?,
        TimerEvent::Switched { stopped, started } => writeln!(
            output,
            "Switched from {} / {} to {} / {}",
            stopped.project, stopped.task, started.project, started.task
        )?,
    }
    for warning in &report.warnings {
        writeln!(output, "Warning: {warning}")?;
    }
    Ok(())
}

pub fn write_projects(cache: &ProjectCache, output: &mut impl Write) -> std::io::Result<()> {
    if cache.is_empty() {
        return writeln!(output, "No projects yet");
    }
    for (project, tasks) in cache.projects() {
        writeln!(output, "{project}: {}", tasks.join(", "))?;
    }
    Ok(())
}
