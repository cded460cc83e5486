use crate::error::ScoutError;
use crate::scout::archive::Archiver;
use crate::scout::changelog::ChangeLogStore;
use crate::scout::checkpoint::CheckpointStore;
use crate::scout::config::ScoutConfig;
use crate::scout::event::{ArchiveOutcome, ChangeEvent, ChangeKind};
use crate::scout::paths::ScoutPaths;
use crate::scout::reconcile::reconcile;
use crate::scout::retrieve::Retrieve;
use crate::scout::source::{Observation, SnapshotSource};
use crate::scout::warn::{self, WarnEvent};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    LoadCheckpoint,
    ObtainSnapshot,
    Reconcile,
    ArchiveUpdates,
    AppendLog,
    SaveCheckpoint,
    Done,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::LoadCheckpoint => "load-checkpoint",
            Self::ObtainSnapshot => "obtain-snapshot",
            Self::Reconcile => "reconcile",
            Self::ArchiveUpdates => "archive-updates",
            Self::AppendLog => "append-log",
            Self::SaveCheckpoint => "save-checkpoint",
            Self::Done => "done",
        };
        f.write_str(label)
    }
}

/// A fatal error together with the stage it stopped the run in.
#[derive(Debug)]
pub struct RunFailure {
    pub stage: RunStage,
    pub error: ScoutError,
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "run failed at {}: {}", self.stage, self.error)
    }
}

impl std::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}

/// A document the run could not fully process; `stage` is where it went wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentFailure {
    pub stage: RunStage,
    pub document: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy)]
pub struct RunOptions {
    pub today: NaiveDate,
    /// Reconcile only: no archive files, no log or checkpoint writes.
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub today: NaiveDate,
    pub dry_run: bool,
    pub previous_documents: usize,
    pub current_documents: usize,
    pub events: Vec<ChangeEvent>,
    pub archived: usize,
    pub failures: Vec<DocumentFailure>,
    pub log_len: usize,
    pub checkpoint_path: Option<PathBuf>,
}

impl RunOutcome {
    pub fn count(&self, kind: ChangeKind) -> usize {
        self.events.iter().filter(|e| e.kind() == kind).count()
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Orchestrator {
    checkpoint: CheckpointStore,
    changelog: ChangeLogStore,
    archiver: Archiver,
    workers: usize,
    deadline: Option<Duration>,
}

impl Orchestrator {
    pub fn new(paths: &ScoutPaths, cfg: &ScoutConfig) -> Self {
        Self {
            checkpoint: CheckpointStore::new(&paths.state_file),
            changelog: ChangeLogStore::new(&paths.log_file),
            archiver: Archiver::new(&paths.archive_dir).recorded_relative_to(&paths.home),
            workers: cfg.fetch.workers,
            deadline: cfg.fetch.deadline(),
        }
    }

    pub fn run(
        &self,
        source: &dyn SnapshotSource,
        retriever: &dyn Retrieve,
        opts: RunOptions,
    ) -> Result<RunOutcome, RunFailure> {
        self.run_observed(source, retriever, opts, &mut |_| {})
    }

    /// Like [`Orchestrator::run`], calling `on_stage` as each stage begins.
    pub fn run_observed(
        &self,
        source: &dyn SnapshotSource,
        retriever: &dyn Retrieve,
        opts: RunOptions,
        on_stage: &mut dyn FnMut(RunStage),
    ) -> Result<RunOutcome, RunFailure> {
        let started = Instant::now();
        let fail = |stage: RunStage| move |error: ScoutError| RunFailure { stage, error };

        on_stage(RunStage::LoadCheckpoint);
        // Both stores are read up front so corrupt state aborts before anything is written.
        let previous = self
            .checkpoint
            .load()
            .map_err(|err| ScoutError::StateCorrupt(format!("{err:#}")))
            .map_err(fail(RunStage::LoadCheckpoint))?;
        let existing_log = self
            .changelog
            .load()
            .map_err(|err| ScoutError::StateCorrupt(format!("{err:#}")))
            .map_err(fail(RunStage::LoadCheckpoint))?;

        on_stage(RunStage::ObtainSnapshot);
        let Observation {
            snapshot: mut current,
            skipped,
        } = source
            .fetch_current_snapshot()
            .map_err(fail(RunStage::ObtainSnapshot))?;

        // An unreadable document keeps its previous entry: not removed, not updated.
        let mut failures = Vec::with_capacity(skipped.len());
        for skip in skipped {
            if let Some(prior) = previous.get(&skip.document) {
                current.insert(skip.document.clone(), prior.clone());
            }
            failures.push(DocumentFailure {
                stage: RunStage::ObtainSnapshot,
                document: skip.document,
                reason: skip.reason,
            });
        }

        on_stage(RunStage::Reconcile);
        let reconciliation = reconcile(&previous, &current, opts.today);
        let mut outcome = RunOutcome {
            today: opts.today,
            dry_run: opts.dry_run,
            previous_documents: previous.len(),
            current_documents: current.len(),
            events: Vec::new(),
            archived: 0,
            failures,
            log_len: existing_log.len(),
            checkpoint_path: None,
        };

        if opts.dry_run {
            outcome.events = reconciliation.events;
            on_stage(RunStage::Done);
            return Ok(outcome);
        }

        on_stage(RunStage::ArchiveUpdates);
        let deadline = self.deadline.map(|d| started + d);
        let results = self.archiver.archive_all(
            &reconciliation.requests,
            retriever,
            self.workers,
            deadline,
        );
        let mut by_document: BTreeMap<&str, ArchiveOutcome> = reconciliation
            .requests
            .iter()
            .map(|r| r.document.as_str())
            .zip(results)
            .collect();

        let mut events = Vec::with_capacity(reconciliation.events.len());
        for event in &reconciliation.events {
            let event = match by_document.remove(event.document.as_str()) {
                Some(result) if event.kind() == ChangeKind::Updated => {
                    match &result {
                        ArchiveOutcome::Archived { .. } => outcome.archived += 1,
                        ArchiveOutcome::Failed { reason } => outcome.failures.push(DocumentFailure {
                            stage: RunStage::ArchiveUpdates,
                            document: event.document.clone(),
                            reason: reason.clone(),
                        }),
                        ArchiveOutcome::NotAttempted => outcome.failures.push(DocumentFailure {
                            stage: RunStage::ArchiveUpdates,
                            document: event.document.clone(),
                            reason: "archival not attempted before deadline".to_string(),
                        }),
                    }
                    event.clone().with_archive_outcome(result)
                }
                _ => event.clone(),
            };
            events.push(event);
        }

        on_stage(RunStage::AppendLog);
        if !reconciliation.is_empty() {
            outcome.log_len = self
                .changelog
                .append_and_save(&existing_log, &events)
                .map_err(|err| ScoutError::storage("change log", self.changelog.path(), err))
                .map_err(fail(RunStage::AppendLog))?;
        }
        outcome.events = events;

        on_stage(RunStage::SaveCheckpoint);
        let saved = current.strip_content();
        let checkpoint_path = self
            .checkpoint
            .save(&saved)
            .map_err(|err| ScoutError::storage("checkpoint", self.checkpoint.path(), err))
            .map_err(fail(RunStage::SaveCheckpoint))?;
        outcome.checkpoint_path = Some(checkpoint_path);

        // Leftover source copies are only disk space; a failed prune is retried next run.
        if let Err(err) = source.prune(&saved) {
            warn::emit(WarnEvent {
                code: err.code().as_str(),
                stage: "save-checkpoint",
                action: "prune-source-copies",
                document: "",
                location: &source.describe(),
                retry: "next-run",
                reason: "stale-copies-kept",
                err: &err.to_string(),
            });
        }

        on_stage(RunStage::Done);
        Ok(outcome)
    }
}
