//! CLI argument parsing for the server binary

pub mod args;

pub use args::{parse_args, CliArgs};
