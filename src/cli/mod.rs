//! CLI module - Command-line interface for kappalib
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// kappalib - web novel library backend
#[derive(Parser)]
#[command(name = "kappalib")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the HTTP API (default)
    #[command(alias = "daemon", alias = "-d")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Bulk import novels, chapters and sources from a JSON document
    Import {
        /// Path to the JSON document
        path: String,

        /// Parse and validate without writing
        #[arg(long)]
        dry_run: bool,
    },
}

pub use commands::*;
