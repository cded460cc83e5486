use crate::error::ScoutError;
use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Http,
    Directory,
}

impl SourceKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "http" | "https" => Some(Self::Http),
            "directory" | "dir" => Some(Self::Directory),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Directory => "directory",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoutSourceConfig {
    pub kind: SourceKind,
    pub base_url: String,
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_link_suffix")]
    pub link_suffix: String,
}

fn default_link_suffix() -> String {
    ".pdf".to_string()
}

impl Default for ScoutSourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::Http,
            base_url: "https://esubmission.ema.europa.eu/".to_string(),
            directory: None,
            link_suffix: default_link_suffix(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoutFetchConfig {
    pub timeout_secs: u64,
    pub workers: usize,
    #[serde(default)]
    pub deadline_secs: Option<u64>,
}

impl Default for ScoutFetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            workers: 4,
            deadline_secs: None,
        }
    }
}

impl ScoutFetchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScoutConfig {
    pub source: ScoutSourceConfig,
    pub fetch: ScoutFetchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct PartialScoutConfig {
    source: Option<ScoutSourceConfig>,
    fetch: Option<ScoutFetchConfig>,
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_optional_u64(var: &str, fallback: Option<u64>) -> Option<u64> {
    match env::var(var) {
        Ok(v) if v.trim().is_empty() || v.trim() == "none" => None,
        Ok(v) => v.trim().parse::<u64>().ok().or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

fn validate(cfg: &ScoutConfig) -> Result<()> {
    match cfg.source.kind {
        SourceKind::Http => {
            if cfg.source.base_url.trim().is_empty() {
                return Err(anyhow!("invalid source: http source requires a base_url"));
            }
        }
        SourceKind::Directory => {
            if cfg.source.directory.is_none() {
                return Err(anyhow!(
                    "invalid source: directory source requires `directory` or DOCSCOUT_SOURCE_DIR"
                ));
            }
        }
    }
    if cfg.source.link_suffix.trim().is_empty() {
        return Err(anyhow!("invalid link suffix: cannot be empty"));
    }
    if cfg.fetch.workers == 0 {
        return Err(anyhow!("invalid fetch workers: must be >= 1"));
    }
    if cfg.fetch.timeout_secs == 0 {
        return Err(anyhow!("invalid fetch timeout: must be >= 1 second"));
    }
    Ok(())
}

pub fn resolve_config_path(home: &Path) -> PathBuf {
    match env::var("DOCSCOUT_CONFIG_PATH") {
        Ok(custom) if !custom.trim().is_empty() => PathBuf::from(custom.trim()),
        _ => home.join("docscout.toml"),
    }
}

fn merge_file_config(base: &mut ScoutConfig, path: &Path) -> Result<()> {
    if !path.exists() {
        return Ok(());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: PartialScoutConfig = toml::from_str(&raw)
        .map_err(|err| anyhow!("failed to parse scout config {}: {err}", path.display()))?;
    if let Some(source) = parsed.source {
        base.source = source;
    }
    if let Some(fetch) = parsed.fetch {
        base.fetch = fetch;
    }
    Ok(())
}

fn apply_env_overrides(cfg: &mut ScoutConfig) -> Result<()> {
    if let Ok(raw) = env::var("DOCSCOUT_SOURCE_KIND") {
        if !raw.trim().is_empty() {
            cfg.source.kind = SourceKind::parse(&raw)
                .ok_or_else(|| anyhow!("invalid DOCSCOUT_SOURCE_KIND `{}`", raw.trim()))?;
        }
    }
    cfg.source.base_url = env_or_string("DOCSCOUT_SOURCE_URL", &cfg.source.base_url);
    if let Ok(dir) = env::var("DOCSCOUT_SOURCE_DIR") {
        if !dir.trim().is_empty() {
            cfg.source.directory = Some(PathBuf::from(dir.trim()));
            // A directory override without an explicit kind means "scan this directory".
            if env::var("DOCSCOUT_SOURCE_KIND").is_err() {
                cfg.source.kind = SourceKind::Directory;
            }
        }
    }
    cfg.source.link_suffix = env_or_string("DOCSCOUT_LINK_SUFFIX", &cfg.source.link_suffix);
    cfg.fetch.timeout_secs = env_or_u64("DOCSCOUT_TIMEOUT_SECS", cfg.fetch.timeout_secs);
    cfg.fetch.workers = env_or_usize("DOCSCOUT_WORKERS", cfg.fetch.workers);
    cfg.fetch.deadline_secs = env_or_optional_u64("DOCSCOUT_DEADLINE_SECS", cfg.fetch.deadline_secs);
    Ok(())
}

fn build_config(home: &Path) -> Result<ScoutConfig> {
    let mut cfg = ScoutConfig::default();
    merge_file_config(&mut cfg, &resolve_config_path(home))?;
    apply_env_overrides(&mut cfg)?;
    validate(&cfg)?;
    Ok(cfg)
}

pub fn load_config(home: &Path) -> Result<ScoutConfig, ScoutError> {
    build_config(home).map_err(|err| ScoutError::InvalidConfig(format!("{err:#}")))
}
