//! Log record schema.

use serde::{Deserialize, Serialize};

/// One line of a validation run's log. Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Log uid of the validation run this record belongs to
    pub uid: u64,
    /// Strictly increasing within `uid`; pollers use it as their cursor
    pub id: u64,
    pub message: String,
    /// RFC 3339 UTC timestamp
    pub created_at: String,
}

impl LogRecord {
    pub fn new(uid: u64, id: u64, message: impl Into<String>) -> Self {
        Self {
            uid,
            id,
            message: message.into(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}
