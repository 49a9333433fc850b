//! CLI module for revtree
//!
//! Provides command-line interface for:
//! - init: Create a database directory
//! - create-resource: Create and bootstrap a resource
//! - revisions: List the committed revisions of a resource
//! - verify: Walk every reachable page of a resource

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{create_resource, init, revisions, run, run_command, verify};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
