//! CLI argument definitions using clap
//!
//! Commands:
//! - revtree init --path <dir> --name <name> --type <xml|json>
//! - revtree create-resource --path <dir> --name <name>
//! - revtree revisions --path <dir> --resource <name>
//! - revtree verify --path <dir> --resource <name>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// revtree - versioned tree storage with copy-on-write pages
#[derive(Parser, Debug)]
#[command(name = "revtree")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a new database directory
    Init {
        /// Database directory
        #[arg(long)]
        path: PathBuf,

        /// Database name (defaults to the directory name)
        #[arg(long)]
        name: Option<String>,

        /// Document model: xml or json
        #[arg(long = "type", default_value = "xml")]
        document_type: String,
    },

    /// Create a resource and commit its first revision
    CreateResource {
        /// Database directory
        #[arg(long)]
        path: PathBuf,

        /// Resource name
        #[arg(long)]
        name: String,

        /// Do not store DeweyID labels on nodes
        #[arg(long)]
        no_dewey_ids: bool,
    },

    /// List the revisions of a resource
    Revisions {
        /// Database directory
        #[arg(long)]
        path: PathBuf,

        /// Resource name
        #[arg(long)]
        resource: String,
    },

    /// Check every page reachable from the latest root
    Verify {
        /// Database directory
        #[arg(long)]
        path: PathBuf,

        /// Resource name
        #[arg(long)]
        resource: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
