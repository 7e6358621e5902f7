use std::{io::ErrorKind, path::Path};

use serde::Deserialize;
use tracing::{info, warn};

pub const CONFIG_FILE: &str = "config.toml";

/// Optional `config.toml` in the application directory. Command line flags take precedence.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// `local`, `utc` or a fixed offset such as `+02:00`.
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub default_project: Option<String>,
    #[serde(default)]
    pub default_task: Option<String>,
    #[serde(default)]
    pub tick_seconds: Option<u64>,
}

impl Config {
    /// A missing file gives defaults. An unreadable or malformed one is reported and ignored.
    pub fn load(app_dir: &Path) -> Self {
        let path = app_dir.join(CONFIG_FILE);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Self::default(),
            Err(e) => {
                warn!("Failed to read {}: {e}", path.display());
                eprintln!("Warning: Failed to read {}: {}", path.display(), e);
                return Self::default();
            }
        };
        match toml::from_str::<Config>(&content) {
            Ok(config) => {
                info!("Loaded config from {}", path.display());
                config
            }
            Err(e) => {
                warn!("Failed to parse {}: {e}", path.display());
                eprintln!("Warning: Failed to parse {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}
