pub mod report;
pub mod shutdown;
pub mod tray;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::{Parser, Subcommand};
use report::{ReportCommand, process_report_command};
use tracing::level_filters::LevelFilter;
use tray::{TrayCommand, process_tray_command, write_projects};

use crate::{
    config::Config,
    tracker::{
        PROJECT_CACHE_FILE, SESSION_DIR, TrackerSettings,
        storage::{
            project_cache::{ProjectCacheFile, ProjectCacheStorage},
            session_storage::SessionStorageImpl,
        },
    },
    utils::{
        dir::{create_application_default_path, create_application_path},
        logging::{CLI_PREFIX, TRAY_PREFIX, enable_logging},
        time::Calendar,
    },
};

#[derive(Parser, Debug)]
#[command(name = "punchclock", version, long_about = None)]
#[command(about = "Work timer tracking time per project and task", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        help = "Calendar used for days and weeks: local, utc or an offset like +02:00"
    )]
    timezone: Option<Calendar>,
    #[arg(long, global = true, help = "Enable trace logging")]
    log: bool,
    #[arg(long = "log-filter", global = true, help = "Log level, overrides RUST_LOG")]
    log_filter: Option<LevelFilter>,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console", global = true)]
    log_console: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Run the timer, reading actions from stdin. Type help for a list")]
    Tray {
        #[command(flatten)]
        command: TrayCommand,
    },
    #[command(about = "Display day and week totals")]
    Report {
        #[command(flatten)]
        command: ReportCommand,
    },
    #[command(about = "List known projects and their tasks")]
    Projects {},
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args
        .dir
        .clone()
        .map_or_else(create_application_default_path, create_application_path)?;

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        args.log_filter
    };
    let prefix = match args.commands {
        Commands::Tray { .. } => TRAY_PREFIX,
        Commands::Report { .. } | Commands::Projects {} => CLI_PREFIX,
    };
    enable_logging(prefix, &app_dir.join("logs"), logging_level, args.log_console)?;

    let config = Config::load(&app_dir);
    let settings = resolve_settings(args.timezone, &config)?;

    match args.commands {
        Commands::Tray { command } => {
            process_tray_command(command, &app_dir, settings, config.tick_seconds).await
        }
        Commands::Report { command } => {
            let storage = SessionStorageImpl::new(app_dir.join(SESSION_DIR), settings.calendar)?;
            process_report_command(command, &storage, settings.calendar, &mut std::io::stdout())
                .await
        }
        Commands::Projects {} => {
            let cache = ProjectCacheFile::new(app_dir.join(PROJECT_CACHE_FILE))
                .load_project_cache()
                .await?;
            write_projects(&cache, &mut std::io::stdout())?;
            Ok(())
        }
    }
}

/// Command line flags win over `config.toml`, which wins over built in defaults.
fn resolve_settings(timezone: Option<Calendar>, config: &Config) -> Result<TrackerSettings> {
    let defaults = TrackerSettings::default();
    let calendar = match (timezone, &config.timezone) {
        (Some(calendar), _) => calendar,
        (None, Some(timezone)) => timezone.parse()?,
        (None, None) => defaults.calendar,
    };
    let non_empty = |value: &Option<String>, fallback: Arc<str>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(Arc::from)
            .unwrap_or(fallback)
    };

    Ok(TrackerSettings {
        calendar,
        default_project: non_empty(&config.default_project, defaults.default_project),
        default_task: non_empty(&config.default_task, defaults.default_task),
    })
}

#[cfg(test)]
mod tests {
    use chrono::FixedOffset;
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn verify_args() {
        Args::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let config = Config {
            timezone: Some("+02:00".into()),
            default_project: Some("atlas".into()),
            default_task: Some("  ".into()),
            tick_seconds: None,
        };

        let settings = resolve_settings(None, &config).unwrap();
        assert_eq!(
            settings.calendar,
            Calendar::Fixed(FixedOffset::east_opt(7200).unwrap())
        );
        assert_eq!(&*settings.default_project, "atlas");
        assert_eq!(&*settings.default_task, crate::tracker::DEFAULT_TASK);

        let settings = resolve_settings(Some(Calendar::Utc), &config).unwrap();
        assert_eq!(settings.calendar, Calendar::Utc);
    }

    #[test]
    fn bad_configured_timezone_is_an_error() {
        let config = Config {
            timezone: Some("mars".into()),
            ..Config::default()
        };
        assert!(resolve_settings(None, &config).is_err());
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let args = Args::try_parse_from([
            "punchclock",
            "report",
            "--date",
            "yesterday",
            "--timezone",
            "utc",
        ])
        .unwrap();
        assert_eq!(args.timezone, Some(Calendar::Utc));
        assert!(matches!(args.commands, Commands::Report { .. }));
    }
}
