//! CLI parse: clap types for export-manager. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// export-manager - pick an export plugin and template, validate, hand off
#[derive(Parser, Debug)]
#[command(name = "export-manager")]
#[command(about = "Select export plugins and templates and run pre-export validation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides default config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Disable logging entirely
    #[arg(long, default_value = "false")]
    pub quiet: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Output format for command results
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List export plugins with their routes and templates
    Plugins,
    /// List the templates of one plugin
    Templates {
        plugin: String,
    },
    /// Resolve a template name to its path inside the plugin's templates directory
    Resolve {
        plugin: String,
        template: String,
    },
    /// Start a pre-export validation job
    ///
    /// The job runs inside this process and the workspace store stays locked
    /// until it finishes. Use --wait to follow its log; `status` works once
    /// this command has exited.
    Validate {
        plugin: String,
        template: String,
        /// Project content JSON (default: <workspace>/.export-manager/content.json)
        #[arg(long)]
        content: Option<PathBuf>,
        /// Stream the validation log until the job finishes
        #[arg(long)]
        wait: bool,
    },
    /// Poll a validation job
    Status {
        job_id: String,
        log_uid: u64,
        /// Only return log records with a larger id
        #[arg(long, default_value = "0")]
        after: u64,
    },
    /// Hand the selection off to one of the plugin's export routes
    Export {
        plugin: String,
        template: Option<String>,
        /// Named route of the plugin
        #[arg(long)]
        route: String,
    },
    /// Remove finished jobs older than the retention window
    Prune,
    /// Print the effective configuration
    Config,
}
