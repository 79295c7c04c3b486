//! CLI domain: parse, route and output only.
//! No domain orchestration; a single route table dispatches to the export service.

mod output;
mod parse;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands, OutputFormat};
pub use route::{RunContext, DEFAULT_CONTENT_PATH};
