use anyhow::Result;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::commands::CommandReport;
use crate::scout::changelog::ChangeLogStore;
use crate::scout::checkpoint::CheckpointStore;
use crate::scout::event::{ChangeEvent, ChangeKind};
use crate::scout::paths::{ScoutPaths, resolve_paths};
use crate::scout::snapshot::Snapshot;

fn archive_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
}

fn check_archive(paths: &ScoutPaths, events: &[ChangeEvent]) -> CommandReport {
    let mut report = CommandReport::new("verify-archive");
    let mut referenced = BTreeSet::new();

    for event in events {
        let Some(recorded) = event.archive_outcome().and_then(|o| o.path()) else {
            continue;
        };
        let recorded = Path::new(recorded);
        // Relative entries are anchored at the home directory.
        let resolved = paths.home.join(recorded);
        if !resolved.exists() {
            report.issue(format!(
                "{} {} on {}: archived file missing at {}",
                event.kind(),
                event.document,
                event.date,
                recorded.display()
            ));
        }
        if let Some(name) = file_name(recorded) {
            referenced.insert(name);
        }
    }

    let files = archive_files(&paths.archive_dir);
    for file in &files {
        let referenced_here = file_name(file).is_some_and(|name| referenced.contains(&name));
        if !referenced_here {
            report.issue(format!(
                "archive file {} is not referenced by any event",
                file.display()
            ));
        }
    }
    report.detail(format!("archive_files={}", files.len()));
    report
}

fn check_coverage(checkpoint: &Snapshot, events: &[ChangeEvent]) -> CommandReport {
    let mut report = CommandReport::new("verify-coverage");
    let introduced: BTreeSet<&str> = events
        .iter()
        .filter(|e| matches!(e.kind(), ChangeKind::New | ChangeKind::Updated))
        .map(|e| e.document.as_str())
        .collect();

    for (name, _) in checkpoint.iter() {
        if !introduced.contains(name) {
            report.issue(format!(
                "checkpoint document {name} has no NEW or UPDATED event"
            ));
        }
    }
    report
}

pub fn run() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let mut report = CommandReport::new("verify");

    let events = match ChangeLogStore::new(&paths.log_file).load() {
        Ok(events) => {
            report.detail(format!("log_entries={}", events.len()));
            Some(events)
        }
        Err(err) => {
            report.issue(format!("change log unreadable: {err:#}"));
            None
        }
    };
    let checkpoint = match CheckpointStore::new(&paths.state_file).load() {
        Ok(snapshot) => {
            report.detail(format!("checkpoint_documents={}", snapshot.len()));
            Some(snapshot)
        }
        Err(err) => {
            report.issue(format!("checkpoint unreadable: {err:#}"));
            None
        }
    };

    if let Some(events) = &events {
        report.merge(check_archive(&paths, events));
        if let Some(checkpoint) = &checkpoint {
            report.merge(check_coverage(checkpoint, events));
        }
    }

    if report.ok {
        report.detail("stores consistent");
    }
    Ok(report)
}
