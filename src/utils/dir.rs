use std::{env, io, path::PathBuf};

use anyhow::{Result, anyhow};

const APPLICATION_DIR: &str = "punchclock";

/// Resolves where sessions, the project cache, config and logs live. Uses `$XDG_STATE_HOME`, then
/// `$HOME/.local/state` (`%APPDATA%` on Windows), and creates the directory if needed.
pub fn create_application_default_path() -> Result<PathBuf> {
    let path = default_path_from(|key| env::var(key).ok())?;
    create_application_path(path)
}

pub fn create_application_path(path: PathBuf) -> Result<PathBuf> {
    match std::fs::create_dir_all(&path) {
        Ok(_) => Ok(path),
        Err(v) if v.kind() == io::ErrorKind::AlreadyExists => Ok(path),
        Err(v) => Err(v.into()),
    }
}

fn default_path_from(var: impl Fn(&str) -> Option<String>) -> Result<PathBuf> {
    let mut path = if cfg!(windows) {
        var("APPDATA")
            .map(PathBuf::from)
            .ok_or_else(|| anyhow!("APPDATA should be present on Windows"))?
    } else {
        var("XDG_STATE_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .or_else(|| {
                var("HOME").map(|home| {
                    let mut path = PathBuf::from(home);
                    path.push(".local/state");
                    path
                })
            })
            .ok_or_else(|| anyhow!("Couldn't find neither XDG_STATE_HOME nor HOME"))?
    };
    path.push(APPLICATION_DIR);
    Ok(path)
}

#[cfg(all(test, not(windows)))]
mod tests {
    use super::*;

    #[test]
    fn prefers_xdg_state_home() {
        let path = default_path_from(|key| match key {
            "XDG_STATE_HOME" => Some("/state".into()),
            "HOME" => Some("/home/me".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(path, PathBuf::from("/state/punchclock"));
    }

    #[test]
    fn falls_back_to_home() {
        let path = default_path_from(|key| match key {
            "XDG_STATE_HOME" => Some(String::new()),
            "HOME" => Some("/home/me".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(path, PathBuf::from("/home/me/.local/state/punchclock"));
    }

    #[test]
    fn fails_without_home() {
        assert!(default_path_from(|_| None).is_err());
    }
}
