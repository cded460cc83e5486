//! Snapshot diffing. Pure: no I/O, no clock, never fails.

use crate::scout::event::{ArchiveOutcome, Change, ChangeEvent};
use crate::scout::snapshot::Snapshot;
use chrono::NaiveDate;

/// Instruction to preserve the superseded bytes of one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivalRequest {
    pub document: String,
    pub as_of: NaiveDate,
    pub source: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// NEW, then REMOVED, then UPDATED; ascending by name within each group.
    pub events: Vec<ChangeEvent>,
    /// One per UPDATED event, in the same order.
    pub requests: Vec<ArchivalRequest>,
}

impl Reconciliation {
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

pub fn reconcile(previous: &Snapshot, current: &Snapshot, today: NaiveDate) -> Reconciliation {
    let mut out = Reconciliation::default();

    // Snapshot iteration is name-ordered, so each pass below is already sorted.
    for (name, doc) in current.iter().filter(|(name, _)| !previous.contains(name)) {
        out.events.push(ChangeEvent {
            date: today,
            document: name.to_string(),
            change: Change::New {
                location: doc.location.clone(),
            },
        });
    }

    for (name, doc) in previous.iter().filter(|(name, _)| !current.contains(name)) {
        out.events.push(ChangeEvent {
            date: today,
            document: name.to_string(),
            change: Change::Removed {
                previous_location: Some(doc.location.clone()),
            },
        });
    }

    for (name, old) in previous.iter() {
        let Some(new) = current.get(name) else {
            continue;
        };
        // Identity is the fingerprint alone; a moved but unchanged document is not an update.
        if old.fingerprint == new.fingerprint {
            continue;
        }
        out.events.push(ChangeEvent {
            date: today,
            document: name.to_string(),
            change: Change::Updated {
                previous_location: Some(old.location.clone()),
                new_location: new.location.clone(),
                archive: ArchiveOutcome::NotAttempted,
            },
        });
        out.requests.push(ArchivalRequest {
            document: name.to_string(),
            as_of: today,
            source: old.location.clone(),
        });
    }

    out
}
