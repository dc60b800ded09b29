//! Thin client commands over the transaction API

pub mod args;
pub mod commands;
pub mod errors;

pub use args::{Cli, Command};
pub use commands::{run_command, Backend, Config};
pub use errors::{CliError, CliResult};
