//! One generation of observed documents, keyed by document name.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque content digest. Only equality is meaningful.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// SHA-256 of `bytes`, lowercase hex.
    pub fn of(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self(format!("{:x}", hasher.finalize()))
    }

    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDescriptor {
    #[serde(rename = "url")]
    pub location: String,
    #[serde(rename = "hash")]
    pub fingerprint: Fingerprint,
    /// Raw bytes from this run's fetch; never persisted.
    #[serde(skip)]
    pub content: Option<Vec<u8>>,
}

impl DocumentDescriptor {
    pub fn compact(location: impl Into<String>, fingerprint: Fingerprint) -> Self {
        Self {
            location: location.into(),
            fingerprint,
            content: None,
        }
    }

    /// Descriptor for freshly fetched bytes; the fingerprint is derived from them.
    pub fn fetched(location: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            location: location.into(),
            fingerprint: Fingerprint::of(&content),
            content: Some(content),
        }
    }
}

/// Serialized as the checkpoint object `{ name: {"url", "hash"} }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    documents: BTreeMap<String, DocumentDescriptor>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts unless `name` is already present; the first observation of a name wins.
    pub fn insert(&mut self, name: impl Into<String>, doc: DocumentDescriptor) -> bool {
        let name = name.into();
        if self.documents.contains_key(&name) {
            return false;
        }
        self.documents.insert(name, doc);
        true
    }

    pub fn get(&self, name: &str) -> Option<&DocumentDescriptor> {
        self.documents.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.documents.contains_key(name)
    }

    /// Entries in ascending name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &DocumentDescriptor)> {
        self.documents.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn is_compact(&self) -> bool {
        self.documents.values().all(|doc| doc.content.is_none())
    }

    /// The checkpoint form of this snapshot: locations and fingerprints only.
    pub fn strip_content(&self) -> Snapshot {
        Snapshot {
            documents: self
                .documents
                .iter()
                .map(|(name, doc)| {
                    (
                        name.clone(),
                        DocumentDescriptor::compact(doc.location.clone(), doc.fingerprint.clone()),
                    )
                })
                .collect(),
        }
    }
}

impl<N: Into<String>> FromIterator<(N, DocumentDescriptor)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (N, DocumentDescriptor)>>(iter: I) -> Self {
        let mut out = Snapshot::new();
        for (name, doc) in iter {
            out.insert(name, doc);
        }
        out
    }
}
