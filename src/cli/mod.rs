//! Command-line interface for tablemark.

mod commands;

pub use commands::{is_verbose, run};
