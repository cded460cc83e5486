use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::commands::{self, CommandReport};

#[derive(Debug, Parser)]
#[command(name = "docscout", version, about = "Track a published document collection")]
struct Cli {
    /// Print the report as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reconcile the collection once, archive superseded documents, save state
    Run(RunArgs),
    /// Show resolved paths, config, store sizes and lock state
    Status,
    /// Show change log entries
    Log(LogArgs),
    /// Cross-check change log, checkpoint and archive directory
    Verify,
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Date stamped on this run's events (YYYY-MM-DD, default: today in UTC)
    #[arg(long)]
    date: Option<String>,

    /// Report what would change without archiving or writing state
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct LogArgs {
    /// Only events on or after this date (YYYY-MM-DD)
    #[arg(long)]
    since: Option<String>,

    /// Only events of this kind: new, updated or removed
    #[arg(long)]
    kind: Option<String>,

    /// Only events for this document name
    #[arg(long)]
    document: Option<String>,
}

fn render(report: &CommandReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("{}: {}", report.command, if report.ok { "ok" } else { "issues" });
    for detail in &report.details {
        println!("  {detail}");
    }
    for issue in &report.issues {
        println!("  ! {issue}");
    }
    Ok(())
}

/// Runs the selected command. `Ok(false)` means it completed but reported issues.
pub fn run() -> Result<bool> {
    let cli = Cli::parse();
    let report = match &cli.command {
        Command::Run(args) => commands::scout_run::run(&commands::scout_run::RunCommandOptions {
            date: args.date.clone(),
            dry_run: args.dry_run,
        })?,
        Command::Status => commands::scout_status::run()?,
        Command::Log(args) => commands::scout_log::run(&commands::scout_log::LogOptions {
            since: args.since.clone(),
            kind: args.kind.clone(),
            document: args.document.clone(),
        })?,
        Command::Verify => commands::scout_verify::run()?,
    };

    render(&report, cli.json)?;
    Ok(report.ok)
}
