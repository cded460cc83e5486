use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("could not obtain current snapshot: {0}")]
    Fetch(String),
    #[error("could not retrieve {location}: {reason}")]
    Retrieval { location: String, reason: String },
    #[error("failed to write {artifact} at {path}: {reason}")]
    StorageWrite {
        artifact: &'static str,
        path: String,
        reason: String,
    },
    #[error("persisted state unreadable: {0}")]
    StateCorrupt(String),
    #[error("config file invalid or unreadable: {0}")]
    InvalidConfig(String),
    #[error("another run holds the lock: {0}")]
    Locked(String),
}

impl ScoutError {
    pub fn code(&self) -> ScoutErrorCode {
        match self {
            Self::Locked(_) => ScoutErrorCode::E001Locked,
            Self::Fetch(_) => ScoutErrorCode::E002FetchFailed,
            Self::Retrieval { .. } => ScoutErrorCode::E003RetrievalFailed,
            Self::StorageWrite { .. } => ScoutErrorCode::E004StorageWrite,
            Self::InvalidConfig(_) => ScoutErrorCode::E005ConfigInvalid,
            Self::StateCorrupt(_) => ScoutErrorCode::E006StateCorrupt,
        }
    }

    pub(crate) fn storage(artifact: &'static str, path: &std::path::Path, err: anyhow::Error) -> Self {
        Self::StorageWrite {
            artifact,
            path: path.display().to_string(),
            reason: format!("{err:#}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoutErrorCode {
    E001Locked,
    E002FetchFailed,
    E003RetrievalFailed,
    E004StorageWrite,
    E005ConfigInvalid,
    E006StateCorrupt,
}

impl ScoutErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::E001Locked => "E001_LOCKED",
            Self::E002FetchFailed => "E002_FETCH_FAILED",
            Self::E003RetrievalFailed => "E003_RETRIEVAL_FAILED",
            Self::E004StorageWrite => "E004_STORAGE_WRITE",
            Self::E005ConfigInvalid => "E005_CONFIG_INVALID",
            Self::E006StateCorrupt => "E006_STATE_CORRUPT",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_follow_error_kind() {
        let err = ScoutError::Retrieval {
            location: "https://example.test/a.pdf".into(),
            reason: "status 404".into(),
        };
        assert_eq!(err.code().as_str(), "E003_RETRIEVAL_FAILED");
        assert_eq!(
            err.to_string(),
            "could not retrieve https://example.test/a.pdf: status 404"
        );
    }
}
