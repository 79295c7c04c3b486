//! Redirect handoff into a plugin's export action.
//!
//! A selection is parked here under a one-time token and the token travels
//! through the redirect. The plugin side redeems it exactly once; contexts
//! expire after `ttl_ms` and are refused when their serialized form is larger
//! than `max_bytes`.

use crate::config::HandoffConfig;
use crate::error::ApiError;
use crate::jobs::status::now_millis;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

static TOKEN_COUNTER: AtomicU64 = AtomicU64::new(1);

/// What the plugin's export action needs to pick up the selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandoffContext {
    pub plugin: String,
    pub route: String,
    pub template: Option<String>,
    /// Canonical template path, only ever set from a resolved selection
    pub template_path: Option<PathBuf>,
    /// Name of the content source the plugin should export from
    pub content_service: String,
}

struct Entry {
    context: HandoffContext,
    expires_at_ms: u64,
}

pub struct HandoffStore {
    entries: Mutex<HashMap<String, Entry>>,
    ttl_ms: u64,
    max_bytes: usize,
}

impl HandoffStore {
    pub fn new(config: &HandoffConfig) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_ms: config.ttl_ms,
            max_bytes: config.max_bytes,
        }
    }

    /// Park `context` and return its token.
    pub fn issue(&self, context: HandoffContext) -> Result<String, ApiError> {
        self.issue_at(context, now_millis())
    }

    pub fn issue_at(&self, context: HandoffContext, now_ms: u64) -> Result<String, ApiError> {
        let size = serde_json::to_vec(&context)
            .map_err(|e| ApiError::ConfigError(format!("handoff context: {}", e)))?
            .len();
        if size > self.max_bytes {
            warn!(plugin = %context.plugin, size, limit = self.max_bytes, "Handoff context too large");
            return Err(ApiError::HandoffTooLarge {
                size,
                limit: self.max_bytes,
            });
        }

        let token = new_token(now_ms);
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.expires_at_ms > now_ms);
        debug!(plugin = %context.plugin, route = %context.route, "Issued handoff token");
        entries.insert(
            token.clone(),
            Entry {
                context,
                expires_at_ms: now_ms.saturating_add(self.ttl_ms),
            },
        );
        Ok(token)
    }

    /// Take the context for `token`. A token works once.
    pub fn redeem(&self, token: &str) -> Result<HandoffContext, ApiError> {
        self.redeem_at(token, now_millis())
    }

    pub fn redeem_at(&self, token: &str, now_ms: u64) -> Result<HandoffContext, ApiError> {
        match self.entries.lock().remove(token) {
            Some(entry) if entry.expires_at_ms > now_ms => Ok(entry.context),
            _ => Err(ApiError::HandoffExpired),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn new_token(now_ms: u64) -> String {
    let seq = TOKEN_COUNTER.fetch_add(1, Ordering::Relaxed);
    let seed = format!("handoff-{}-{}-{}", now_ms, std::process::id(), seq);
    hex::encode(&blake3::hash(seed.as_bytes()).as_bytes()[..16])
}
