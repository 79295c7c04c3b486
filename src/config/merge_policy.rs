//! Merge rules: defaults applied before any file or environment source.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("templates_root", "templates/reports")?
        .set_default("storage.store_path", ".export-manager/store")?
        .set_default("jobs.workers", 2)?
        .set_default("jobs.max_queue_size", 64)?
        .set_default("handoff.ttl_ms", 60_000)?
        .set_default("handoff.max_bytes", 4096)
}
