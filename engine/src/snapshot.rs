//! Durable JSON snapshot of the ledger store. Writes go to a temp file and
//! are renamed into place so a crash mid-write can never leave a
//! half-written snapshot behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use spintrack_types::{Snapshot, SNAPSHOT_VERSION};

pub struct Snapshotter {
    path: PathBuf,
}

impl Snapshotter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot back. A missing or empty file means a fresh start;
    /// unreadable JSON or an unsupported version is an error the caller
    /// must treat as fatal rather than silently running on corrupt state.
    pub fn load(&self) -> anyhow::Result<Option<Snapshot>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to read snapshot {}", self.path.display())
                })
            }
        };
        if raw.trim().is_empty() {
            return Ok(None);
        }
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("invalid snapshot JSON in {}", self.path.display()))?;
        if snapshot.version != SNAPSHOT_VERSION {
            bail!(
                "unsupported snapshot version {} in {}",
                snapshot.version,
                self.path.display()
            );
        }
        Ok(Some(snapshot))
    }

    pub fn write(&self, snapshot: &Snapshot) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir).with_context(|| {
                    format!("failed to create snapshot directory {}", dir.display())
                })?;
            }
        }
        let raw = serde_json::to_vec_pretty(snapshot).context("failed to serialize snapshot")?;
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        fs::write(&tmp, raw)
            .with_context(|| format!("failed to write snapshot temp file {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("failed to move snapshot into place at {}", self.path.display()))?;
        Ok(())
    }
}
