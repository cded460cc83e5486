//! Producers of the current full snapshot.

use crate::error::ScoutError;
use crate::scout::pool::map_bounded;
use crate::scout::retrieve::Retrieve;
use crate::scout::snapshot::{DocumentDescriptor, Fingerprint, Snapshot};
use crate::scout::util::write_atomic;
use crate::scout::warn::{self, WarnEvent};
use anyhow::Context;
use reqwest::Url;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// A document that was listed but could not be read during this observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    pub document: String,
    pub location: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Observation {
    pub snapshot: Snapshot,
    pub skipped: Vec<SkippedDocument>,
}

pub trait SnapshotSource {
    /// Everything observable right now. `Err` means nothing could be observed
    /// at all; documents that individually fail are reported in `skipped`.
    fn fetch_current_snapshot(&self) -> Result<Observation, ScoutError>;

    fn describe(&self) -> String;

    /// Called once `kept` is the saved checkpoint; drops source-side copies
    /// nothing refers to any more. Returns how many were removed.
    fn prune(&self, _kept: &Snapshot) -> Result<usize, ScoutError> {
        Ok(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingLink {
    pub text: String,
    pub href: String,
}

fn find_ascii_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let needle = needle.as_bytes();
    if needle.is_empty() || hay.len() < needle.len() {
        return None;
    }
    (from..=hay.len() - needle.len()).find(|&i| hay[i..i + needle.len()].eq_ignore_ascii_case(needle))
}

fn attribute_value(tag: &str, attr: &str) -> Option<String> {
    let lower = tag.to_ascii_lowercase();
    let bytes = lower.as_bytes();
    let mut search = 0usize;
    while let Some(rel) = lower[search..].find(attr) {
        let start = search + rel;
        search = start + attr.len();
        let boundary = start == 0 || bytes[start - 1].is_ascii_whitespace();
        if !boundary {
            continue;
        }
        let rest = tag[start + attr.len()..].trim_start();
        let Some(rest) = rest.strip_prefix('=') else {
            continue;
        };
        let rest = rest.trim_start();
        let value = match rest.chars().next() {
            Some(q @ ('"' | '\'')) => rest[1..].split(q).next().unwrap_or(""),
            Some(_) => rest
                .split(|c: char| c.is_whitespace() || c == '>')
                .next()
                .unwrap_or(""),
            None => "",
        };
        return Some(decode_entities(value));
    }
    None
}

fn strip_tags(fragment: &str) -> String {
    let mut out = String::with_capacity(fragment.len());
    let mut in_tag = false;
    for ch in fragment.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out
}

fn decode_entities(input: &str) -> String {
    input
        .replace("&nbsp;", "\u{a0}")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Anchors in document order as `(visible text, raw href)`.
pub fn extract_links(html: &str) -> Vec<ListingLink> {
    let mut out = Vec::new();
    let mut cursor = 0usize;
    while let Some(open) = find_ascii_ci(html, "<a", cursor) {
        let after = open + 2;
        let is_anchor = html[after..]
            .chars()
            .next()
            .is_some_and(|c| c.is_whitespace() || c == '>');
        if !is_anchor {
            cursor = after;
            continue;
        }
        let Some(tag_end) = html[after..].find('>').map(|i| after + i) else {
            break;
        };
        let close = find_ascii_ci(html, "</a", tag_end).unwrap_or(html.len());
        if let Some(href) = attribute_value(&html[after..tag_end], "href") {
            let text = decode_entities(&strip_tags(&html[tag_end + 1..close]));
            out.push(ListingLink {
                text: text.trim().to_string(),
                href,
            });
        }
        cursor = close.max(tag_end + 1);
    }
    out
}

/// Scrapes one listing page and downloads every linked document.
pub struct HttpListingSource<'r> {
    base_url: String,
    link_suffix: String,
    workers: usize,
    retriever: &'r dyn Retrieve,
}

impl<'r> HttpListingSource<'r> {
    pub fn new(
        base_url: impl Into<String>,
        link_suffix: impl Into<String>,
        workers: usize,
        retriever: &'r dyn Retrieve,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            link_suffix: link_suffix.into(),
            workers,
            retriever,
        }
    }

    /// `(name, absolute url)` for each usable link; the first link of a name wins.
    fn document_links(&self, html: &str) -> Result<Vec<(String, String)>, ScoutError> {
        let base = Url::parse(&self.base_url)
            .map_err(|err| ScoutError::Fetch(format!("invalid base url {}: {err}", self.base_url)))?;
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for link in extract_links(html) {
            if link.text.is_empty() || !link.href.ends_with(&self.link_suffix) {
                continue;
            }
            let Ok(resolved) = base.join(&link.href) else {
                continue;
            };
            if seen.insert(link.text.clone()) {
                out.push((link.text, resolved.to_string()));
            }
        }
        Ok(out)
    }
}

impl SnapshotSource for HttpListingSource<'_> {
    fn fetch_current_snapshot(&self) -> Result<Observation, ScoutError> {
        let page = self
            .retriever
            .retrieve(&self.base_url)
            .map_err(|err| ScoutError::Fetch(err.to_string()))?;
        let html = String::from_utf8_lossy(&page);
        let links = self.document_links(&html)?;

        let fetched = map_bounded(&links, self.workers, |(name, url)| {
            self.retriever.retrieve(url).inspect_err(|err| {
                warn::emit(WarnEvent {
                    code: err.code().as_str(),
                    stage: "fetch",
                    action: "download-document",
                    document: name,
                    location: url,
                    retry: "next-run",
                    reason: "document-skipped",
                    err: &err.to_string(),
                });
            })
        });

        let mut observation = Observation::default();
        for ((name, url), bytes) in links.into_iter().zip(fetched) {
            match bytes {
                Ok(bytes) => {
                    observation
                        .snapshot
                        .insert(name, DocumentDescriptor::fetched(url, bytes));
                }
                Err(err) => observation.skipped.push(SkippedDocument {
                    document: name,
                    location: url,
                    reason: err.to_string(),
                }),
            }
        }
        Ok(observation)
    }

    fn describe(&self) -> String {
        format!("http {}", self.base_url)
    }
}

/// Treats a local directory as the published collection: name = file stem.
///
/// Files are rewritten in place, so with staging enabled each observed
/// generation is copied to `<stage_dir>/<fingerprint><suffix>` and that copy
/// becomes the document's location. A later run can then still read the
/// superseded bytes when it archives them.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
    suffix: String,
    stage_dir: Option<PathBuf>,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>, suffix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            suffix: suffix.into(),
            stage_dir: None,
        }
    }

    pub fn with_staging(mut self, stage_dir: impl Into<PathBuf>) -> Self {
        self.stage_dir = Some(stage_dir.into());
        self
    }

    /// Location recorded for `bytes` read from `path`.
    fn locate(
        &self,
        path: &Path,
        fingerprint: &Fingerprint,
        bytes: &[u8],
    ) -> anyhow::Result<String> {
        let Some(stage_dir) = &self.stage_dir else {
            return Ok(path.display().to_string());
        };
        let staged = stage_dir.join(format!("{fingerprint}{}", self.suffix));
        if !staged.is_file() {
            write_atomic(&staged, bytes)
                .with_context(|| format!("failed to stage {}", path.display()))?;
        }
        Ok(staged.display().to_string())
    }
}

impl SnapshotSource for DirectorySource {
    fn fetch_current_snapshot(&self) -> Result<Observation, ScoutError> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|err| ScoutError::Fetch(format!("failed to read {}: {err}", self.dir.display())))?;

        let mut observation = Observation::default();
        for entry in entries {
            let entry = entry.map_err(|err| ScoutError::Fetch(err.to_string()))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(name) = file_name.strip_suffix(self.suffix.as_str()) else {
                continue;
            };
            if name.is_empty() {
                continue;
            }
            let read = fs::read(&path)
                .with_context(|| format!("failed to read {}", path.display()))
                .and_then(|bytes| {
                    let fingerprint = Fingerprint::of(&bytes);
                    let location = self.locate(&path, &fingerprint, &bytes)?;
                    Ok(DocumentDescriptor {
                        location,
                        fingerprint,
                        content: Some(bytes),
                    })
                });
            match read {
                Ok(doc) => {
                    observation.snapshot.insert(name, doc);
                }
                Err(err) => {
                    let location = path.display().to_string();
                    let reason = format!("{err:#}");
                    warn::emit(WarnEvent {
                        code: "READ_FAILED",
                        stage: "fetch",
                        action: "read-document",
                        document: name,
                        location: &location,
                        retry: "next-run",
                        reason: "document-skipped",
                        err: &reason,
                    });
                    observation.skipped.push(SkippedDocument {
                        document: name.to_string(),
                        location,
                        reason,
                    });
                }
            }
        }
        Ok(observation)
    }

    fn describe(&self) -> String {
        format!("directory {}", self.dir.display())
    }

    fn prune(&self, kept: &Snapshot) -> Result<usize, ScoutError> {
        let Some(stage_dir) = &self.stage_dir else {
            return Ok(0);
        };
        let Ok(entries) = fs::read_dir(stage_dir) else {
            return Ok(0);
        };
        let referenced: BTreeSet<String> = kept.iter().map(|(_, doc)| doc.location.clone()).collect();

        let mut removed = 0usize;
        for entry in entries.filter_map(|entry| entry.ok()) {
            let path = entry.path();
            if !path.is_file() || referenced.contains(&path.display().to_string()) {
                continue;
            }
            fs::remove_file(&path).map_err(|err| ScoutError::StorageWrite {
                artifact: "staged copy",
                path: path.display().to_string(),
                reason: err.to_string(),
            })?;
            removed += 1;
        }
        Ok(removed)
    }
}
