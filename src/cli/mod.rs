use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "sinkguard")]
#[command(about = "Policy gate for dangerous operations - validate before you execute")]
#[command(version)]
pub struct Cli {
    /// Path to policy file
    #[arg(short, long, default_value = "sinkguard.toml")]
    pub policy: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate a value against a sink and print the decision
    Check {
        /// Sink id to evaluate against
        sink: String,
        /// Value to evaluate (a JSON document with --json, a path with --path)
        value: String,
        /// Parse the value as JSON before evaluating
        #[arg(long)]
        json: bool,
        /// Treat the value as a filesystem path
        #[arg(long)]
        path: bool,
    },
    /// Load the policy and report load-time errors
    Lint,
    /// View the decision audit log
    Audit {
        /// Show last N entries
        #[arg(long, default_value = "50")]
        tail: usize,
        /// Export the full log instead of tailing
        #[arg(long)]
        export: bool,
        /// Export format (json or csv)
        #[arg(long, default_value = "json")]
        format: String,
    },
    /// Show aggregated decision statistics
    Stats,
    /// Initialize sinkguard configuration
    Init,
}
