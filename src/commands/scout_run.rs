use anyhow::{Context, Result, anyhow};

use crate::commands::CommandReport;
use crate::commands::scout_log::describe_event;
use crate::scout::audit;
use crate::scout::config::{ScoutConfig, SourceKind, load_config};
use crate::scout::event::ChangeKind;
use crate::scout::lock::RunLock;
use crate::scout::paths::{ScoutPaths, resolve_paths};
use crate::scout::retrieve::{LocationRetriever, Retrieve};
use crate::scout::run::{Orchestrator, RunOptions, RunOutcome, RunStage};
use crate::scout::source::{DirectorySource, HttpListingSource, SnapshotSource};
use crate::scout::util::{parse_date, today_utc};
use crate::scout::warn::{self, WarnEvent};

#[derive(Debug, Clone, Default)]
pub struct RunCommandOptions {
    pub date: Option<String>,
    pub dry_run: bool,
}

fn record(paths: &ScoutPaths, phase: &str, status: &str, message: &str) {
    if let Err(err) = audit::append_event(paths, phase, status, message) {
        warn::emit(WarnEvent {
            code: "AUDIT_WRITE_FAILED",
            stage: phase,
            action: "append-audit",
            document: "",
            location: &audit::audit_log_path(paths).display().to_string(),
            retry: "none",
            reason: "audit-skipped",
            err: &format!("{err:#}"),
        });
    }
}

fn build_source<'r>(
    paths: &ScoutPaths,
    cfg: &ScoutConfig,
    retriever: &'r dyn Retrieve,
    dry_run: bool,
) -> Result<Box<dyn SnapshotSource + 'r>> {
    match cfg.source.kind {
        SourceKind::Http => Ok(Box::new(HttpListingSource::new(
            cfg.source.base_url.clone(),
            cfg.source.link_suffix.clone(),
            cfg.fetch.workers,
            retriever,
        ))),
        SourceKind::Directory => {
            let dir = cfg
                .source
                .directory
                .clone()
                .ok_or_else(|| anyhow!("directory source selected but no directory configured"))?;
            let source = DirectorySource::new(dir, cfg.source.link_suffix.clone());
            if dry_run {
                return Ok(Box::new(source));
            }
            Ok(Box::new(source.with_staging(paths.stage_dir())))
        }
    }
}

fn summarize(report: &mut CommandReport, outcome: &RunOutcome) {
    report.detail(format!("date={}", outcome.today));
    report.detail(format!("dry_run={}", outcome.dry_run));
    report.detail(format!("previous_documents={}", outcome.previous_documents));
    report.detail(format!("current_documents={}", outcome.current_documents));
    report.detail(format!("new={}", outcome.count(ChangeKind::New)));
    report.detail(format!("updated={}", outcome.count(ChangeKind::Updated)));
    report.detail(format!("removed={}", outcome.count(ChangeKind::Removed)));
    if !outcome.dry_run {
        report.detail(format!("archived={}", outcome.archived));
        report.detail(format!("log_entries={}", outcome.log_len));
    }
    if let Some(path) = &outcome.checkpoint_path {
        report.detail(format!("checkpoint={}", path.display()));
    }
    for event in &outcome.events {
        report.detail(describe_event(event));
    }
    for failure in &outcome.failures {
        let what = match failure.stage {
            RunStage::ObtainSnapshot => "download",
            _ => "archival",
        };
        report.issue(format!(
            "{what} failed for {}: {}",
            failure.document, failure.reason
        ));
    }
}

pub fn run(opts: &RunCommandOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let cfg = load_config(&paths.home)?;
    let today = match &opts.date {
        Some(raw) => parse_date(raw)?,
        None => today_utc(),
    };
    let mut report = CommandReport::new("run");

    let _lock = RunLock::acquire(&paths.lock_file())?;
    let retriever = LocationRetriever::new(cfg.fetch.timeout())
        .context("failed to build document retriever")?;
    let source = build_source(&paths, &cfg, &retriever, opts.dry_run)?;
    report.detail(format!("source={}", source.describe()));

    let orchestrator = Orchestrator::new(&paths, &cfg);
    record(&paths, "run", "started", &source.describe());
    let result = orchestrator.run_observed(
        source.as_ref(),
        &retriever,
        RunOptions {
            today,
            dry_run: opts.dry_run,
        },
        &mut |stage: RunStage| record(&paths, &stage.to_string(), "entered", ""),
    );

    match result {
        Ok(outcome) => {
            summarize(&mut report, &outcome);
            let status = if outcome.is_clean() { "ok" } else { "partial" };
            record(
                &paths,
                "run",
                status,
                &format!(
                    "events={} failures={}",
                    outcome.events.len(),
                    outcome.failures.len()
                ),
            );
            Ok(report)
        }
        Err(failure) => {
            warn::emit(WarnEvent {
                code: failure.error.code().as_str(),
                stage: &failure.stage.to_string(),
                action: "run",
                document: "",
                location: &source.describe(),
                retry: "next-run",
                reason: "run-aborted",
                err: &failure.error.to_string(),
            });
            record(&paths, "run", "failed", &failure.to_string());
            Err(anyhow::Error::new(failure))
        }
    }
}
