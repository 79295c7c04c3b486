//! Job status records and their sled-backed store.
//!
//! One record per job id, overwritten as the job progresses. The record keeps a
//! small typed header and an open `payload` map that job code fills freely.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sled::{Db, Tree};

use crate::error::StorageError;

const TREE_STATUS: &str = "job_status";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatusRecord {
    pub job_id: String,
    /// Name of the unit of work, e.g. `project_validator`
    pub name: String,
    pub status: JobState,
    /// Options the job was submitted with
    #[serde(default)]
    pub options: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    /// Job-defined fields, flattened into the status document
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl JobStatusRecord {
    pub fn queued(job_id: impl Into<String>, name: impl Into<String>, options: Map<String, Value>) -> Self {
        let now = now_millis();
        Self {
            job_id: job_id.into(),
            name: name.into(),
            status: JobState::Queued,
            options,
            message: None,
            created_at_ms: now,
            updated_at_ms: now,
            payload: Map::new(),
        }
    }
}

#[derive(Clone)]
pub struct JobStatusStore {
    db: Db,
    statuses: Tree,
}

impl JobStatusStore {
    pub fn new(db: Db) -> Result<Self, StorageError> {
        let statuses = db.open_tree(TREE_STATUS)?;
        Ok(Self { db, statuses })
    }

    pub fn shared(db: Db) -> Result<Arc<Self>, StorageError> {
        Ok(Arc::new(Self::new(db)?))
    }

    pub fn put(&self, record: &JobStatusRecord) -> Result<(), StorageError> {
        let value = serde_json::to_vec(record)?;
        self.statuses.insert(record.job_id.as_bytes(), value)?;
        Ok(())
    }

    pub fn get(&self, job_id: &str) -> Result<Option<JobStatusRecord>, StorageError> {
        let Some(raw) = self.statuses.get(job_id.as_bytes())? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_slice(&raw)?))
    }

    /// Read-modify-write one record. Returns `None` when the job is unknown.
    pub fn update<F>(&self, job_id: &str, f: F) -> Result<Option<JobStatusRecord>, StorageError>
    where
        F: FnOnce(&mut JobStatusRecord),
    {
        let Some(mut record) = self.get(job_id)? else {
            return Ok(None);
        };
        f(&mut record);
        record.updated_at_ms = now_millis();
        self.put(&record)?;
        Ok(Some(record))
    }

    /// All records, newest first.
    pub fn list(&self) -> Result<Vec<JobStatusRecord>, StorageError> {
        let mut out = Vec::new();
        for result in self.statuses.iter() {
            let (_, value) = result?;
            out.push(serde_json::from_slice::<JobStatusRecord>(&value)?);
        }
        out.sort_by_key(|r| std::cmp::Reverse(r.created_at_ms));
        Ok(out)
    }

    /// Remove finished jobs last updated more than `max_age_ms` before `now_ms`.
    /// Returns the removed records.
    pub fn prune_finished(
        &self,
        max_age_ms: u64,
        now_ms: u64,
    ) -> Result<Vec<JobStatusRecord>, StorageError> {
        let mut removed = Vec::new();
        for record in self.list()? {
            if record.status.is_terminal()
                && now_ms.saturating_sub(record.updated_at_ms) > max_age_ms
            {
                self.statuses.remove(record.job_id.as_bytes())?;
                removed.push(record);
            }
        }
        Ok(removed)
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
