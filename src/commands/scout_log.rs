use anyhow::{Result, anyhow};
use chrono::NaiveDate;

use crate::commands::CommandReport;
use crate::scout::changelog::ChangeLogStore;
use crate::scout::event::{ArchiveOutcome, ChangeEvent, ChangeKind};
use crate::scout::paths::resolve_paths;
use crate::scout::util::parse_date;

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub since: Option<String>,
    pub kind: Option<String>,
    pub document: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct LogFilter {
    since: Option<NaiveDate>,
    kind: Option<ChangeKind>,
    document: Option<String>,
}

impl LogFilter {
    fn from_options(opts: &LogOptions) -> Result<Self> {
        let since = opts.since.as_deref().map(parse_date).transpose()?;
        let kind = match opts.kind.as_deref() {
            Some(raw) => Some(
                ChangeKind::parse(raw)
                    .ok_or_else(|| anyhow!("unknown event kind `{raw}`, expected new|updated|removed"))?,
            ),
            None => None,
        };
        Ok(Self {
            since,
            kind,
            document: opts.document.clone(),
        })
    }

    fn matches(&self, event: &ChangeEvent) -> bool {
        self.since.is_none_or(|since| event.date >= since)
            && self.kind.is_none_or(|kind| event.kind() == kind)
            && self
                .document
                .as_deref()
                .is_none_or(|name| event.document == name)
    }
}

/// One line per event: `date KIND name key=value...`.
pub(crate) fn describe_event(event: &ChangeEvent) -> String {
    let mut line = format!("{} {} {}", event.date, event.kind(), event.document);
    match event.kind() {
        ChangeKind::New => {
            if let Some(location) = event.new_location() {
                line.push_str(&format!(" url={location}"));
            }
        }
        ChangeKind::Removed => {
            if let Some(location) = event.previous_location() {
                line.push_str(&format!(" url={location}"));
            }
        }
        ChangeKind::Updated => {
            if let Some(location) = event.previous_location() {
                line.push_str(&format!(" url={location}"));
            }
            if let Some(location) = event.new_location() {
                line.push_str(&format!(" new_url={location}"));
            }
            match event.archive_outcome() {
                Some(ArchiveOutcome::Archived { path }) => {
                    line.push_str(&format!(" archived={path}"))
                }
                Some(ArchiveOutcome::Failed { reason }) => {
                    line.push_str(&format!(" archived=none error={reason}"))
                }
                Some(ArchiveOutcome::NotAttempted) | None => line.push_str(" archived=none"),
            }
        }
    }
    line
}

pub fn run(opts: &LogOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let filter = LogFilter::from_options(opts)?;
    let mut report = CommandReport::new("log");

    let store = ChangeLogStore::new(&paths.log_file);
    let events = match store.load() {
        Ok(events) => events,
        Err(err) => {
            report.issue(format!("change log unreadable: {err:#}"));
            return Ok(report);
        }
    };

    let mut shown = 0usize;
    for event in events.iter().filter(|e| filter.matches(e)) {
        report.detail(describe_event(event));
        shown += 1;
    }
    report.detail(format!("shown={shown} total={}", events.len()));
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scout::event::Change;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).expect("date")
    }

    fn new_event(d: u32, name: &str) -> ChangeEvent {
        ChangeEvent {
            date: day(d),
            document: name.into(),
            change: Change::New {
                location: format!("u-{name}"),
            },
        }
    }

    #[test]
    fn describes_updates_with_both_locations() {
        let updated = ChangeEvent {
            date: day(1),
            document: "Doc1".into(),
            change: Change::Updated {
                previous_location: Some("u1".into()),
                new_location: "u2".into(),
                archive: ArchiveOutcome::Failed {
                    reason: "status 404".into(),
                },
            },
        };
        assert_eq!(
            describe_event(&updated),
            "2025-06-01 UPDATED Doc1 url=u1 new_url=u2 archived=none error=status 404"
        );
        assert_eq!(
            describe_event(&new_event(2, "Doc2")),
            "2025-06-02 NEW Doc2 url=u-Doc2"
        );
    }

    #[test]
    fn filter_combines_date_kind_and_document() {
        let filter = LogFilter::from_options(&LogOptions {
            since: Some("2025-06-02".into()),
            kind: Some("new".into()),
            document: Some("B".into()),
        })
        .expect("filter");

        assert!(filter.matches(&new_event(3, "B")));
        assert!(!filter.matches(&new_event(1, "B")));
        assert!(!filter.matches(&new_event(3, "A")));
        assert!(!filter.matches(&ChangeEvent {
            date: day(3),
            document: "B".into(),
            change: Change::Removed {
                previous_location: None,
            },
        }));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let opts = LogOptions {
            kind: Some("moved".into()),
            ..LogOptions::default()
        };
        assert!(LogFilter::from_options(&opts).is_err());
    }
}
