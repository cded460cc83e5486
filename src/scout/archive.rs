use crate::error::ScoutError;
use crate::scout::event::ArchiveOutcome;
use crate::scout::pool::map_bounded;
use crate::scout::reconcile::ArchivalRequest;
use crate::scout::retrieve::Retrieve;
use crate::scout::warn::{self, WarnEvent};
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Spaces and slashes become underscores; everything else is kept as observed.
pub fn sanitize_document_name(name: &str) -> String {
    name.replace([' ', '/'], "_")
}

pub fn archive_file_name(as_of: NaiveDate, document: &str) -> String {
    format!(
        "{}_{}_old.pdf",
        as_of.format("%Y-%m-%d"),
        sanitize_document_name(document)
    )
}

#[derive(Debug, Clone)]
pub struct Archiver {
    root: PathBuf,
    record_base: Option<PathBuf>,
}

impl Archiver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            record_base: None,
        }
    }

    /// Archived paths are recorded relative to `base` when the file lies
    /// under it, so the change log survives moving the whole home directory.
    pub fn recorded_relative_to(mut self, base: impl Into<PathBuf>) -> Self {
        self.record_base = Some(base.into());
        self
    }

    fn recorded_path(&self, target: &Path) -> String {
        self.record_base
            .as_deref()
            .and_then(|base| target.strip_prefix(base).ok())
            .unwrap_or(target)
            .display()
            .to_string()
    }

    pub fn target_path(&self, request: &ArchivalRequest) -> PathBuf {
        self.root
            .join(archive_file_name(request.as_of, &request.document))
    }

    fn ensure_root(&self) -> Result<()> {
        fs::create_dir_all(&self.root)
            .with_context(|| format!("failed to create {}", self.root.display()))
    }

    fn write_bytes(&self, target: &Path, bytes: &[u8]) -> Result<()> {
        let mut file = File::create(target)
            .with_context(|| format!("failed to create {}", target.display()))?;
        file.write_all(bytes)
            .with_context(|| format!("failed to write {}", target.display()))?;
        file.sync_all()
            .with_context(|| format!("failed to flush {}", target.display()))?;
        Ok(())
    }

    /// Preserves the superseded bytes for one request. Never returns an error:
    /// every failure is folded into the outcome.
    pub fn archive(&self, request: &ArchivalRequest, retriever: &dyn Retrieve) -> ArchiveOutcome {
        let target = self.target_path(request);
        let result = self
            .ensure_root()
            .map_err(|err| ScoutError::storage("archive directory", &self.root, err))
            .and_then(|_| retriever.retrieve(&request.source))
            .and_then(|bytes| {
                self.write_bytes(&target, &bytes)
                    .map_err(|err| ScoutError::storage("archive file", &target, err))
            });

        match result {
            Ok(()) => ArchiveOutcome::Archived {
                path: self.recorded_path(&target),
            },
            Err(err) => {
                warn::emit(WarnEvent {
                    code: err.code().as_str(),
                    stage: "archive",
                    action: "preserve-superseded",
                    document: &request.document,
                    location: &request.source,
                    retry: "next-update",
                    reason: "archive-failed",
                    err: &err.to_string(),
                });
                ArchiveOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    /// Archives every request on a bounded worker pool. Items not started
    /// before `deadline` are reported as not attempted.
    pub fn archive_all(
        &self,
        requests: &[ArchivalRequest],
        retriever: &dyn Retrieve,
        workers: usize,
        deadline: Option<Instant>,
    ) -> Vec<ArchiveOutcome> {
        map_bounded(requests, workers, |request| {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn::emit(WarnEvent {
                    code: "DEADLINE_EXCEEDED",
                    stage: "archive",
                    action: "skip",
                    document: &request.document,
                    location: &request.source,
                    retry: "next-update",
                    reason: "run-deadline-passed",
                    err: "not attempted",
                });
                return ArchiveOutcome::NotAttempted;
            }
            self.archive(request, retriever)
        })
    }
}
