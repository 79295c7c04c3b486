//! Status polling
//!
//! Merges a job's latest status record with the log records written after the
//! caller's cursor. Read-only: the tracker holds no state of its own.

use crate::error::{ApiError, StorageError};
use crate::jobs::status::{JobState, JobStatusStore};
use crate::log::{LogRecord, LogStore};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Status value reported for a job id the status store does not know.
pub const UNKNOWN_STATUS: &str = "unknown";

/// One poll result.
///
/// Serializes as the status document with `logs`, `validating` and
/// `validators` filled in where the document does not already carry them.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    document: Map<String, Value>,
    logs: Vec<LogRecord>,
}

impl StatusSnapshot {
    fn new(mut document: Map<String, Value>, logs: Vec<LogRecord>) -> Self {
        document
            .entry("validating".to_string())
            .or_insert(Value::Null);
        document
            .entry("validators".to_string())
            .or_insert_with(|| json!([]));
        Self { document, logs }
    }

    /// The `status` field: a job state, or `unknown`.
    pub fn status(&self) -> &str {
        self.document
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or(UNKNOWN_STATUS)
    }

    pub fn state(&self) -> Option<JobState> {
        self.document
            .get("status")
            .cloned()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn is_known(&self) -> bool {
        self.state().is_some()
    }

    pub fn is_terminal(&self) -> bool {
        self.state().map(JobState::is_terminal).unwrap_or(false)
    }

    pub fn logs(&self) -> &[LogRecord] {
        &self.logs
    }

    pub fn validating(&self) -> Option<&str> {
        self.document.get("validating").and_then(Value::as_str)
    }

    pub fn validators(&self) -> &[Value] {
        self.document
            .get("validators")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.document.get(key)
    }

    /// Cursor to send on the next poll: the highest id returned, else `after`.
    pub fn next_cursor(&self, after: u64) -> u64 {
        self.logs.last().map(|r| r.id).unwrap_or(after)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for StatusSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let has_logs = self.document.contains_key("logs");
        let len = self.document.len() + usize::from(!has_logs);
        let mut map = serializer.serialize_map(Some(len))?;
        for (key, value) in &self.document {
            map.serialize_entry(key, value)?;
        }
        if !has_logs {
            map.serialize_entry("logs", &self.logs)?;
        }
        map.end()
    }
}

pub struct JobStatusTracker {
    statuses: Arc<JobStatusStore>,
    logs: Arc<LogStore>,
}

impl JobStatusTracker {
    pub fn new(statuses: Arc<JobStatusStore>, logs: Arc<LogStore>) -> Self {
        Self { statuses, logs }
    }

    /// Current status of `job_id` plus the records of `log_uid` with id > `after`.
    ///
    /// An unknown job id is not an error: it yields the default snapshot.
    pub fn poll(&self, job_id: &str, log_uid: u64, after: u64) -> Result<StatusSnapshot, ApiError> {
        // Status before logs: a terminal status then always comes with its final records
        let document = match self.statuses.get(job_id)? {
            Some(record) => match serde_json::to_value(&record).map_err(StorageError::from)? {
                Value::Object(map) => map,
                _ => unknown_document(job_id),
            },
            None => unknown_document(job_id),
        };
        let logs = self.logs.read_after(log_uid, after)?;

        debug!(
            job_id = %job_id,
            log_uid,
            after,
            returned = logs.len(),
            "Polled validation job"
        );
        Ok(StatusSnapshot::new(document, logs))
    }
}

fn unknown_document(job_id: &str) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("job_id".to_string(), json!(job_id));
    map.insert("status".to_string(), json!(UNKNOWN_STATUS));
    map
}
