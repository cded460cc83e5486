use crate::scout::event::ChangeEvent;
use crate::scout::util::{to_json_document, write_atomic};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Append-only history of change events, stored as one JSON array.
#[derive(Debug, Clone)]
pub struct ChangeLogStore {
    path: PathBuf,
}

impl ChangeLogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing file is an empty history, not an error.
    pub fn load(&self) -> Result<Vec<ChangeEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        let events: Vec<ChangeEvent> = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", self.path.display()))?;
        Ok(events)
    }

    /// Rewrites the whole file as `existing ++ new_events`. `existing` is only
    /// borrowed, so the caller keeps it intact when the write fails.
    pub fn append_and_save(
        &self,
        existing: &[ChangeEvent],
        new_events: &[ChangeEvent],
    ) -> Result<usize> {
        let combined: Vec<&ChangeEvent> = existing.iter().chain(new_events).collect();
        let data = to_json_document(&combined)?;
        write_atomic(&self.path, &data)?;
        Ok(combined.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scout::event::{ArchiveOutcome, Change};
    use chrono::NaiveDate;

    fn event(day: u32, document: &str) -> ChangeEvent {
        ChangeEvent {
            date: NaiveDate::from_ymd_opt(2025, 1, day).expect("date"),
            document: document.into(),
            change: Change::New {
                location: format!("https://example.test/{document}.pdf"),
            },
        }
    }

    #[test]
    fn missing_log_loads_empty() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = ChangeLogStore::new(tmp.path().join("change_log.json"));
        assert!(store.load().expect("load").is_empty());
    }

    #[test]
    fn append_keeps_prior_events_in_order() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = ChangeLogStore::new(tmp.path().join("change_log.json"));

        let first_run = vec![event(1, "b"), event(1, "a")];
        store.append_and_save(&[], &first_run).expect("first save");

        let existing = store.load().expect("load");
        let second_run = vec![
            event(2, "c"),
            ChangeEvent {
                date: NaiveDate::from_ymd_opt(2025, 1, 2).expect("date"),
                document: "a".into(),
                change: Change::Updated {
                    previous_location: Some("u-a".into()),
                    new_location: "u-a".into(),
                    archive: ArchiveOutcome::Failed {
                        reason: "timeout".into(),
                    },
                },
            },
        ];
        let total = store
            .append_and_save(&existing, &second_run)
            .expect("second save");
        assert_eq!(total, 4);

        let reloaded = store.load().expect("reload");
        assert_eq!(reloaded.len(), existing.len() + second_run.len());
        assert_eq!(&reloaded[..2], &first_run[..]);
        assert_eq!(&reloaded[2..], &second_run[..]);
    }

    #[test]
    fn duplicate_events_are_not_collapsed() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = ChangeLogStore::new(tmp.path().join("change_log.json"));
        let same = vec![event(1, "a")];
        store.append_and_save(&same, &same).expect("save");
        assert_eq!(store.load().expect("load").len(), 2);
    }

    #[test]
    fn failed_save_leaves_file_and_caller_data_untouched() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, b"file, not dir").expect("write");
        let store = ChangeLogStore::new(blocker.join("change_log.json"));

        let existing = vec![event(1, "a")];
        assert!(store.append_and_save(&existing, &[event(2, "b")]).is_err());
        assert_eq!(existing.len(), 1);
        assert_eq!(fs::read(&blocker).expect("read"), b"file, not dir");
    }

    #[test]
    fn corrupt_log_is_an_error() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("change_log.json");
        fs::write(&path, "{\"not\": \"a list\"}").expect("write");
        assert!(ChangeLogStore::new(path).load().is_err());
    }

    #[test]
    fn written_file_uses_four_space_indent() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = ChangeLogStore::new(tmp.path().join("change_log.json"));
        store.append_and_save(&[], &[event(1, "a")]).expect("save");
        let raw = fs::read_to_string(store.path()).expect("read");
        assert!(raw.starts_with("[\n    {\n        \"date\": \"2025-01-01\""));
    }
}
