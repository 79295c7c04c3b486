//! Property-based tests for path safety and log cursors

mod log_cursor;
mod path_safety;
