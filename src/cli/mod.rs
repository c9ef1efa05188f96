//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod output;

/// Sign and verify jDeploy application bundles
#[derive(Parser, Debug)]
#[command(name = "jdeploy-sign")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Emit machine-readable JSON on stdout and JSON logs on stderr
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/jdeploy-sign/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign every file in a bundle directory for a release version
    Sign(commands::sign::SignArgs),

    /// Verify a signed bundle against trusted certificates
    Verify(commands::verify::VerifyArgs),

    /// Generate a developer key pair and self-signed certificate
    Identity(commands::identity::IdentityArgs),
}
