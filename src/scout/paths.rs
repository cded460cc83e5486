use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ScoutPaths {
    pub home: PathBuf,
    pub log_file: PathBuf,
    pub state_file: PathBuf,
    pub archive_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl ScoutPaths {
    /// Default layout rooted at `home`: the files the scout has always used.
    pub fn under(home: &Path) -> Self {
        Self {
            home: home.to_path_buf(),
            log_file: home.join("change_log.json"),
            state_file: home.join("document_state.json"),
            archive_dir: home.join("_archive"),
            logs_dir: home.join("logs"),
        }
    }

    pub fn lock_file(&self) -> PathBuf {
        self.home.join("docscout.lock")
    }

    /// Fingerprint-named copies of directory documents, one per observed generation.
    pub fn stage_dir(&self) -> PathBuf {
        self.home.join("_staged")
    }
}

fn env_or_default_path(var: &str, fallback: PathBuf) -> PathBuf {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => PathBuf::from(v.trim()),
        _ => fallback,
    }
}

pub fn resolve_paths() -> Result<ScoutPaths> {
    let cwd = env::current_dir().context("current directory could not be resolved")?;
    let home = env_or_default_path("DOCSCOUT_HOME", cwd);
    let defaults = ScoutPaths::under(&home);

    Ok(ScoutPaths {
        log_file: env_or_default_path("DOCSCOUT_LOG_FILE", defaults.log_file),
        state_file: env_or_default_path("DOCSCOUT_STATE_FILE", defaults.state_file),
        archive_dir: env_or_default_path("DOCSCOUT_ARCHIVE_DIR", defaults.archive_dir),
        logs_dir: env_or_default_path("DOCSCOUT_LOGS_DIR", defaults.logs_dir),
        home,
    })
}
