use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

const NOT_ATTEMPTED: &str = "not attempted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    New,
    Updated,
    Removed,
}

impl ChangeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Updated => "UPDATED",
            Self::Removed => "REMOVED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "NEW" => Some(Self::New),
            "UPDATED" => Some(Self::Updated),
            "REMOVED" => Some(Self::Removed),
            _ => None,
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened to the superseded bytes of an UPDATED document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    Archived { path: String },
    Failed { reason: String },
    /// Skipped because the run deadline passed before the item was reached.
    NotAttempted,
}

impl ArchiveOutcome {
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Archived { path } => Some(path),
            _ => None,
        }
    }

    fn failure_note(&self) -> Option<String> {
        match self {
            Self::Archived { .. } => None,
            Self::Failed { reason } => Some(reason.clone()),
            Self::NotAttempted => Some(NOT_ATTEMPTED.to_string()),
        }
    }

    fn from_wire(path: Option<String>, error: Option<String>) -> Self {
        match (path, error) {
            (Some(path), _) => Self::Archived { path },
            (None, Some(note)) if note == NOT_ATTEMPTED => Self::NotAttempted,
            (None, note) => Self::Failed {
                reason: note.unwrap_or_default(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    New {
        location: String,
    },
    Removed {
        previous_location: Option<String>,
    },
    Updated {
        previous_location: Option<String>,
        new_location: String,
        archive: ArchiveOutcome,
    },
}

/// One line of the change log. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ChangeEventRecord", try_from = "ChangeEventRecord")]
pub struct ChangeEvent {
    pub date: NaiveDate,
    pub document: String,
    pub change: Change,
}

impl ChangeEvent {
    pub fn kind(&self) -> ChangeKind {
        match self.change {
            Change::New { .. } => ChangeKind::New,
            Change::Removed { .. } => ChangeKind::Removed,
            Change::Updated { .. } => ChangeKind::Updated,
        }
    }

    pub fn previous_location(&self) -> Option<&str> {
        match &self.change {
            Change::New { .. } => None,
            Change::Removed { previous_location } | Change::Updated { previous_location, .. } => {
                previous_location.as_deref()
            }
        }
    }

    pub fn new_location(&self) -> Option<&str> {
        match &self.change {
            Change::New { location } => Some(location),
            Change::Updated { new_location, .. } => Some(new_location),
            Change::Removed { .. } => None,
        }
    }

    pub fn archive_outcome(&self) -> Option<&ArchiveOutcome> {
        match &self.change {
            Change::Updated { archive, .. } => Some(archive),
            _ => None,
        }
    }

    /// Attach the archiver's result. No-op for kinds that never archive.
    pub fn with_archive_outcome(mut self, outcome: ArchiveOutcome) -> Self {
        if let Change::Updated { archive, .. } = &mut self.change {
            *archive = outcome;
        }
        self
    }
}

/// On-disk shape shared with the downstream indexer; absent fields are omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChangeEventRecord {
    date: NaiveDate,
    #[serde(rename = "type")]
    kind: ChangeKind,
    document: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    new_url: Option<String>,
    // Outer `None` omits the field; `Some(None)` writes an explicit null for a failed archive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    archived_old_pdf_path: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    archive_error: Option<String>,
}

impl From<ChangeEvent> for ChangeEventRecord {
    fn from(event: ChangeEvent) -> Self {
        let kind = event.kind();
        let mut record = ChangeEventRecord {
            date: event.date,
            kind,
            document: event.document,
            url: None,
            new_url: None,
            archived_old_pdf_path: None,
            archive_error: None,
        };
        match event.change {
            Change::New { location } => record.url = Some(location),
            Change::Removed { previous_location } => record.url = previous_location,
            Change::Updated {
                previous_location,
                new_location,
                archive,
            } => {
                record.url = previous_location;
                record.new_url = Some(new_location);
                record.archive_error = archive.failure_note();
                record.archived_old_pdf_path = Some(archive.path().map(str::to_string));
            }
        }
        record
    }
}

impl TryFrom<ChangeEventRecord> for ChangeEvent {
    type Error = anyhow::Error;

    fn try_from(record: ChangeEventRecord) -> Result<Self> {
        let change = match record.kind {
            ChangeKind::New => Change::New {
                location: record
                    .url
                    .ok_or_else(|| anyhow!("NEW event for `{}` has no url", record.document))?,
            },
            ChangeKind::Removed => Change::Removed {
                previous_location: record.url,
            },
            ChangeKind::Updated => Change::Updated {
                previous_location: record.url,
                new_location: record.new_url.ok_or_else(|| {
                    anyhow!("UPDATED event for `{}` has no new_url", record.document)
                })?,
                archive: ArchiveOutcome::from_wire(
                    record.archived_old_pdf_path.flatten(),
                    record.archive_error,
                ),
            },
        };
        Ok(ChangeEvent {
            date: record.date,
            document: record.document,
            change,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 14).expect("date")
    }

    #[test]
    fn new_event_wire_shape() {
        let event = ChangeEvent {
            date: day(),
            document: "Doc1".into(),
            change: Change::New {
                location: "u1".into(),
            },
        };
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(
            value,
            json!({"date": "2025-03-14", "type": "NEW", "document": "Doc1", "url": "u1"})
        );
    }

    #[test]
    fn failed_update_writes_explicit_null_path() {
        let event = ChangeEvent {
            date: day(),
            document: "Doc1".into(),
            change: Change::Updated {
                previous_location: Some("u1".into()),
                new_location: "u2".into(),
                archive: ArchiveOutcome::Failed {
                    reason: "status 404".into(),
                },
            },
        };
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(
            value,
            json!({
                "date": "2025-03-14",
                "type": "UPDATED",
                "document": "Doc1",
                "url": "u1",
                "new_url": "u2",
                "archived_old_pdf_path": null,
                "archive_error": "status 404"
            })
        );
    }

    #[test]
    fn field_order_is_stable() {
        let event = ChangeEvent {
            date: day(),
            document: "Doc1".into(),
            change: Change::Updated {
                previous_location: Some("u1".into()),
                new_location: "u2".into(),
                archive: ArchiveOutcome::Archived {
                    path: "_archive/2025-03-14_Doc1_old.pdf".into(),
                },
            },
        };
        let text = serde_json::to_string(&event).expect("serialize");
        assert_eq!(
            text,
            r#"{"date":"2025-03-14","type":"UPDATED","document":"Doc1","url":"u1","new_url":"u2","archived_old_pdf_path":"_archive/2025-03-14_Doc1_old.pdf"}"#
        );
    }

    #[test]
    fn reads_legacy_entries_without_previous_location() {
        let removed: ChangeEvent = serde_json::from_value(
            json!({"date": "2024-01-02", "type": "REMOVED", "document": "Old Guide"}),
        )
        .expect("removed");
        assert_eq!(removed.kind(), ChangeKind::Removed);
        assert_eq!(removed.previous_location(), None);

        let updated: ChangeEvent = serde_json::from_value(json!({
            "date": "2024-01-02",
            "type": "UPDATED",
            "document": "Guide",
            "new_url": "u2",
            "archived_old_pdf_path": null
        }))
        .expect("updated");
        assert_eq!(
            updated.archive_outcome(),
            Some(&ArchiveOutcome::Failed {
                reason: String::new()
            })
        );
    }

    #[test]
    fn not_attempted_survives_reload() {
        let event = ChangeEvent {
            date: day(),
            document: "Doc1".into(),
            change: Change::Updated {
                previous_location: Some("u1".into()),
                new_location: "u1".into(),
                archive: ArchiveOutcome::NotAttempted,
            },
        };
        let text = serde_json::to_string(&event).expect("serialize");
        let back: ChangeEvent = serde_json::from_str(&text).expect("parse");
        assert_eq!(back, event);
    }

    #[test]
    fn new_without_url_is_rejected() {
        let parsed = serde_json::from_value::<ChangeEvent>(
            json!({"date": "2024-01-02", "type": "NEW", "document": "Doc1"}),
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn archive_outcome_only_applies_to_updates() {
        let event = ChangeEvent {
            date: day(),
            document: "Doc1".into(),
            change: Change::New {
                location: "u1".into(),
            },
        }
        .with_archive_outcome(ArchiveOutcome::NotAttempted);
        assert_eq!(event.archive_outcome(), None);
    }
}
