//! Validation log: append-only records partitioned by log uid.

pub mod record;
pub mod store;

pub use record::LogRecord;
pub use store::{LogStore, LogWriter};
