//! Integration tests for the export manager

mod cli_commands;
mod config_integration;
mod export_flow;
mod template_resolution;
mod test_utils;
