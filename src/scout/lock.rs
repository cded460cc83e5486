use crate::error::ScoutError;
use crate::scout::util::now_epoch_secs;
use anyhow::{Context, Result};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockPayload {
    pub pid: u32,
    pub build_uuid: String,
    pub started_at_epoch_secs: u64,
}

/// Exclusive advisory lock held for the duration of one run.
///
/// The lock file itself stays on disk between runs and keeps the last
/// holder's payload. Only the advisory lock decides whether a run is active.
#[derive(Debug)]
pub struct RunLock {
    file: File,
}

fn read_payload(file: &mut File) -> Option<LockPayload> {
    let mut raw = String::new();
    file.seek(SeekFrom::Start(0)).ok()?;
    file.read_to_string(&mut raw).ok()?;
    serde_json::from_str(&raw).ok()
}

impl RunLock {
    pub fn acquire(path: &Path) -> Result<Self, ScoutError> {
        let open = || -> Result<File> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)
                .with_context(|| format!("failed to open {}", path.display()))
        };
        let mut file = open().map_err(|err| ScoutError::storage("run lock", path, err))?;

        if file.try_lock_exclusive().is_err() {
            let holder = read_payload(&mut file)
                .map(|p| format!("pid {} since epoch {}", p.pid, p.started_at_epoch_secs))
                .unwrap_or_else(|| "unknown holder".to_string());
            return Err(ScoutError::Locked(format!("{} ({holder})", path.display())));
        }

        let payload = LockPayload {
            pid: std::process::id(),
            build_uuid: env!("BUILD_UUID").to_string(),
            started_at_epoch_secs: now_epoch_secs().unwrap_or(0),
        };
        let write = |file: &mut File| -> Result<()> {
            file.set_len(0)?;
            file.seek(SeekFrom::Start(0))?;
            file.write_all(serde_json::to_string(&payload)?.as_bytes())?;
            file.sync_all()?;
            Ok(())
        };
        write(&mut file).map_err(|err| ScoutError::storage("run lock", path, err))?;

        Ok(Self { file })
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        // Removing the file here would let a waiting run lock an unlinked inode.
        let _ = FileExt::unlock(&self.file);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockState {
    /// Nobody holds the lock; carries the last recorded holder, if any.
    Free(Option<LockPayload>),
    Held(Option<LockPayload>),
}

pub fn inspect(path: &Path) -> LockState {
    let Ok(mut file) = OpenOptions::new().read(true).write(true).open(path) else {
        return LockState::Free(None);
    };
    let payload = read_payload(&mut file);
    if file.try_lock_exclusive().is_err() {
        return LockState::Held(payload);
    }
    let _ = FileExt::unlock(&file);
    LockState::Free(payload)
}
