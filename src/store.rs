//! In-memory result accumulation and the persisted result artifact.
//!
//! Records are appended as chunks complete and written out once, as a
//! pretty-printed JSON array, when the loop ends. The write goes to a
//! sibling temporary file that is then renamed over the target, so a
//! reader sees either the previous artifact or the new one in full.

use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};
use crate::models::ResultRecord;

#[derive(Debug, Default, Clone)]
pub struct ResultStore {
    records: Vec<ResultRecord>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<ResultRecord>) -> Self {
        Self { records }
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = ResultRecord>) {
        self.records.extend(records);
    }

    pub fn records(&self) -> &[ResultRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<ResultRecord> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Stable sort by chunk index; records of one chunk keep their order.
    pub fn sort_by_chunk(&mut self) {
        self.records.sort_by_key(|r| r.chunk_index());
    }

    /// Sort by chunk index and replace the artifact at `path`.
    pub fn persist(&mut self, path: &Path) -> Result<()> {
        self.sort_by_chunk();
        let json = serde_json::to_string_pretty(&self.records)
            .map_err(|e| persist_error(path, std::io::Error::other(e)))?;
        write_atomic(path, json.as_bytes())?;
        tracing::info!(
            path = %path.display(),
            records = self.records.len(),
            "analysis results saved"
        );
        Ok(())
    }

    /// Read a previously persisted artifact.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| PipelineError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let records: Vec<ResultRecord> =
            serde_json::from_str(&content).map_err(|e| PipelineError::Load {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        Ok(Self { records })
    }
}

/// Write `bytes` to `path` through a temporary sibling and a rename.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| persist_error(path, e))?;
    }

    let tmp = temp_path(path);
    if let Err(e) = std::fs::write(&tmp, bytes) {
        let _ = std::fs::remove_file(&tmp);
        return Err(persist_error(path, e));
    }
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        persist_error(path, e)
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

fn persist_error(path: &Path, source: std::io::Error) -> PipelineError {
    PipelineError::Persist {
        path: path.to_path_buf(),
        source,
    }
}
