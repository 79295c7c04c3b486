//! Export Manager: export plugin selection and pre-export validation
//!
//! Discovers export-capable plugins, resolves report templates safely inside
//! each plugin's templates directory, runs pre-export validation as background
//! jobs with an append-only progress log, and hands a finished selection off to
//! the plugin's own export route.

pub mod cli;
pub mod config;
pub mod content;
pub mod error;
pub mod export;
pub mod handoff;
pub mod jobs;
pub mod log;
pub mod logging;
pub mod plugin;
pub mod template;
