use anyhow::Result;
use std::env;
use std::fs;
use std::path::Path;

use crate::commands::CommandReport;
use crate::scout::changelog::ChangeLogStore;
use crate::scout::checkpoint::CheckpointStore;
use crate::scout::config::{SourceKind, load_config, resolve_config_path};
use crate::scout::lock::{self, LockState};
use crate::scout::paths::resolve_paths;

include!(concat!(env!("OUT_DIR"), "/scout_env_allowlist.rs"));

fn unknown_env_keys<I>(keys: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut unknown: Vec<String> = keys
        .into_iter()
        .filter(|key| key.starts_with(GENERATED_SCOUT_ENV_PREFIX))
        .filter(|key| !GENERATED_SCOUT_ENV_ALLOWLIST.contains(&key.as_str()))
        .collect();
    unknown.sort();
    unknown
}

fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.path().is_file())
                .count()
        })
        .unwrap_or(0)
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("home={}", paths.home.display()));
    report.detail(format!("log_file={}", paths.log_file.display()));
    report.detail(format!("state_file={}", paths.state_file.display()));
    report.detail(format!("archive_dir={}", paths.archive_dir.display()));
    report.detail(format!("logs_dir={}", paths.logs_dir.display()));
    report.detail(format!(
        "config_file={}",
        resolve_config_path(&paths.home).display()
    ));

    match load_config(&paths.home) {
        Ok(cfg) => {
            report.detail(format!("source_kind={}", cfg.source.kind.label()));
            match cfg.source.kind {
                SourceKind::Http => report.detail(format!("source_url={}", cfg.source.base_url)),
                SourceKind::Directory => {
                    if let Some(dir) = &cfg.source.directory {
                        report.detail(format!("source_dir={}", dir.display()));
                    }
                }
            }
            report.detail(format!("link_suffix={}", cfg.source.link_suffix));
            report.detail(format!("timeout_secs={}", cfg.fetch.timeout_secs));
            report.detail(format!("workers={}", cfg.fetch.workers));
            match cfg.fetch.deadline_secs {
                Some(secs) => report.detail(format!("deadline_secs={secs}")),
                None => report.detail("deadline_secs=none"),
            }
        }
        Err(err) => report.issue(format!("{}: {err}", err.code().as_str())),
    }

    match CheckpointStore::new(&paths.state_file).load() {
        Ok(snapshot) => report.detail(format!("checkpoint_documents={}", snapshot.len())),
        Err(err) => report.issue(format!("checkpoint unreadable: {err:#}")),
    }
    match ChangeLogStore::new(&paths.log_file).load() {
        Ok(events) => report.detail(format!("log_entries={}", events.len())),
        Err(err) => report.issue(format!("change log unreadable: {err:#}")),
    }
    report.detail(format!("archive_files={}", count_files(&paths.archive_dir)));

    match lock::inspect(&paths.lock_file()) {
        LockState::Free(last) => {
            report.detail("lock=free");
            if let Some(p) = last {
                report.detail(format!(
                    "last_run pid={} build={} since={}",
                    p.pid, p.build_uuid, p.started_at_epoch_secs
                ));
            }
        }
        LockState::Held(payload) => match payload {
            Some(p) => report.detail(format!(
                "lock=held pid={} build={} since={}",
                p.pid, p.build_uuid, p.started_at_epoch_secs
            )),
            None => report.detail("lock=held"),
        },
    }

    for key in unknown_env_keys(env::vars().map(|(k, _)| k)) {
        report.issue(format!("unrecognised environment variable {key}"));
    }

    Ok(report)
}
