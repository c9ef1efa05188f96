//! CLI command implementations
//!
//! Each subcommand has its own module with:
//! - Args struct for command-line arguments
//! - `run()` function to execute the command

use std::process::ExitCode;

use crate::app::AppContext;
use crate::cli::Commands;
use crate::error::Result;

pub mod identity;
pub mod sign;
pub mod verify;

/// Dispatch a command to its handler
pub fn run(ctx: &AppContext, command: &Commands) -> Result<ExitCode> {
    match command {
        Commands::Sign(args) => sign::run(ctx, args).map(|()| ExitCode::SUCCESS),
        Commands::Verify(args) => verify::run(ctx, args),
        Commands::Identity(args) => identity::run(ctx, args).map(|()| ExitCode::SUCCESS),
    }
}
