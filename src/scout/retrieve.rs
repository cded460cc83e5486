use crate::error::ScoutError;
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Fetches the bytes behind a document location.
pub trait Retrieve: Send + Sync {
    fn retrieve(&self, location: &str) -> Result<Vec<u8>, ScoutError>;
}

impl<F> Retrieve for F
where
    F: Fn(&str) -> Result<Vec<u8>, ScoutError> + Send + Sync,
{
    fn retrieve(&self, location: &str) -> Result<Vec<u8>, ScoutError> {
        self(location)
    }
}

/// `http(s)://` over a blocking client; `file://` and bare paths from disk.
#[derive(Debug, Clone)]
pub struct LocationRetriever {
    client: Client,
}

impl LocationRetriever {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("docscout/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build http client")?;
        Ok(Self { client })
    }

    pub(crate) fn get_http(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .with_context(|| format!("request to {url} failed"))?;
        if !response.status().is_success() {
            anyhow::bail!("GET {url} returned status {}", response.status());
        }
        let bytes = response
            .bytes()
            .with_context(|| format!("failed to read body of {url}"))?;
        Ok(bytes.to_vec())
    }
}

fn is_http(location: &str) -> bool {
    let lower = location.to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

fn local_path(location: &str) -> PathBuf {
    match location.strip_prefix("file://") {
        Some(rest) => PathBuf::from(rest),
        None => Path::new(location).to_path_buf(),
    }
}

impl Retrieve for LocationRetriever {
    fn retrieve(&self, location: &str) -> Result<Vec<u8>, ScoutError> {
        let fetched = if is_http(location) {
            self.get_http(location)
        } else {
            let path = local_path(location);
            fs::read(&path).with_context(|| format!("failed to read {}", path.display()))
        };
        fetched.map_err(|err| ScoutError::Retrieval {
            location: location.to_string(),
            reason: format!("{err:#}"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_locations_read_from_disk() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let path = tmp.path().join("guide.pdf");
        fs::write(&path, b"%PDF-1.7").expect("write");

        let retriever = LocationRetriever::new(Duration::from_secs(1)).expect("client");
        let bare = retriever
            .retrieve(&path.display().to_string())
            .expect("bare path");
        let url = retriever
            .retrieve(&format!("file://{}", path.display()))
            .expect("file url");
        assert_eq!(bare, b"%PDF-1.7");
        assert_eq!(url, bare);
    }

    #[test]
    fn missing_file_is_a_retrieval_failure() {
        let retriever = LocationRetriever::new(Duration::from_secs(1)).expect("client");
        let err = retriever
            .retrieve("/definitely/not/here.pdf")
            .expect_err("should fail");
        assert!(matches!(err, ScoutError::Retrieval { .. }));
    }

    #[test]
    fn scheme_detection_is_case_insensitive() {
        assert!(is_http("HTTPS://example.test/a.pdf"));
        assert!(!is_http("/srv/docs/a.pdf"));
        assert_eq!(local_path("file:///srv/a.pdf"), PathBuf::from("/srv/a.pdf"));
    }
}
