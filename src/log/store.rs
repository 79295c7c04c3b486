//! Durable sled-backed validation log store.

use std::sync::Arc;

use parking_lot::Mutex;
use sled::{Db, Tree};
use tracing::warn;

use crate::error::StorageError;
use crate::log::record::LogRecord;

const TREE_RECORDS: &str = "validation_log_records";
const TREE_META: &str = "validation_log_meta";
const KEY_MAX_UID: &[u8] = b"max_uid";
const KEY_PAD: usize = 20;

/// Append-only log partitioned by uid.
///
/// Appends go through a single lock so that, per uid, a record with a larger id
/// is never visible before one with a smaller id. Readers take no lock.
#[derive(Clone)]
pub struct LogStore {
    db: Db,
    records: Tree,
    meta: Tree,
    append_lock: Arc<Mutex<()>>,
}

impl LogStore {
    pub fn new(db: Db) -> Result<Self, StorageError> {
        let records = db.open_tree(TREE_RECORDS)?;
        let meta = db.open_tree(TREE_META)?;
        Ok(Self {
            db,
            records,
            meta,
            append_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn shared(db: Db) -> Result<Arc<Self>, StorageError> {
        Ok(Arc::new(Self::new(db)?))
    }

    /// Highest uid handed out or written to so far.
    pub fn max_uid(&self) -> Result<Option<u64>, StorageError> {
        Ok(self.meta.get(KEY_MAX_UID)?.map(|raw| decode_u64(&raw)))
    }

    /// Allocate a fresh uid: one greater than the current maximum, starting at 1.
    ///
    /// The increment is a single compare-and-swap on the counter, so concurrent
    /// callers always receive distinct values.
    pub fn allocate_uid(&self) -> Result<u64, StorageError> {
        let updated = self.meta.update_and_fetch(KEY_MAX_UID, |old| {
            let next = old.map(decode_u64).unwrap_or(0) + 1;
            Some(next.to_be_bytes().to_vec())
        })?;
        Ok(updated.map(|raw| decode_u64(&raw)).unwrap_or(1))
    }

    /// Append a message under `uid`, assigning the next id for that uid.
    pub fn append(&self, uid: u64, message: impl Into<String>) -> Result<LogRecord, StorageError> {
        let _guard = self.append_lock.lock();

        let next_key = next_id_key(uid);
        let id = self
            .meta
            .get(&next_key)?
            .map(|raw| decode_u64(&raw))
            .unwrap_or(1);

        let record = LogRecord::new(uid, id, message);
        let value = serde_json::to_vec(&record)?;
        self.records.insert(encode_record_key(uid, id).as_bytes(), value)?;
        self.meta.insert(&next_key, (id + 1).to_be_bytes().to_vec())?;
        self.raise_max_uid(uid)?;
        Ok(record)
    }

    /// Records of `uid` with `id > after_id`, ascending by id.
    pub fn read_after(&self, uid: u64, after_id: u64) -> Result<Vec<LogRecord>, StorageError> {
        let prefix = uid_prefix(uid);
        let start = encode_record_key(uid, after_id.saturating_add(1));
        let mut out = Vec::new();
        for result in self.records.range(start.as_bytes()..) {
            let (key, value) = result?;
            if !key.starts_with(prefix.as_bytes()) {
                break;
            }
            let record: LogRecord = serde_json::from_slice(&value)?;
            if record.id > after_id {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// All records of `uid`, ascending.
    pub fn read_all(&self, uid: u64) -> Result<Vec<LogRecord>, StorageError> {
        self.read_after(uid, 0)
    }

    /// Handle bound to one uid.
    pub fn writer(self: &Arc<Self>, uid: u64) -> LogWriter {
        LogWriter {
            store: Arc::clone(self),
            uid,
        }
    }

    /// Drop every record of `uid` and its id counter. Used by retention pruning.
    pub fn delete_uid(&self, uid: u64) -> Result<usize, StorageError> {
        let _guard = self.append_lock.lock();
        let prefix = uid_prefix(uid);
        let keys: Vec<sled::IVec> = self
            .records
            .scan_prefix(prefix.as_bytes())
            .keys()
            .collect::<Result<_, _>>()?;
        for key in &keys {
            self.records.remove(key)?;
        }
        self.meta.remove(next_id_key(uid))?;
        Ok(keys.len())
    }

    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn encode_record_key(uid: u64, id: u64) -> String {
        encode_record_key(uid, id)
    }

    fn raise_max_uid(&self, uid: u64) -> Result<(), StorageError> {
        self.meta.fetch_and_update(KEY_MAX_UID, |old| {
            let current = old.map(decode_u64).unwrap_or(0);
            Some(current.max(uid).to_be_bytes().to_vec())
        })?;
        Ok(())
    }
}

/// Appends to one validation run's log.
#[derive(Clone)]
pub struct LogWriter {
    store: Arc<LogStore>,
    uid: u64,
}

impl LogWriter {
    pub fn uid(&self) -> u64 {
        self.uid
    }

    pub fn write(&self, message: impl Into<String>) -> Result<LogRecord, StorageError> {
        self.store.append(self.uid, message)
    }

    /// Write, logging instead of failing. The validation log is best effort from
    /// inside a running job.
    pub fn write_best_effort(&self, message: impl Into<String>) {
        if let Err(err) = self.write(message) {
            warn!(log_uid = self.uid, error = %err, "failed to append validation log record");
        }
    }
}

fn uid_prefix(uid: u64) -> String {
    format!("{uid:0KEY_PAD$}:")
}

fn encode_record_key(uid: u64, id: u64) -> String {
    format!("{uid:0KEY_PAD$}:{id:0KEY_PAD$}")
}

fn next_id_key(uid: u64) -> Vec<u8> {
    format!("next_id:{uid:0KEY_PAD$}").into_bytes()
}

fn decode_u64(raw: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let len = raw.len().min(8);
    buf[8 - len..].copy_from_slice(&raw[raw.len() - len..]);
    u64::from_be_bytes(buf)
}
