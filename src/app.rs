//! Per-invocation context shared by every command.

use std::path::PathBuf;

use crate::cli::Cli;
use crate::config::Config;
use crate::error::{Result, SignError};

pub struct AppContext {
    pub config: Config,
    pub json: bool,
    pub verbosity: u8,
    /// Directory `jdeploy-sign.toml` is read from.
    pub project_root: PathBuf,
}

impl AppContext {
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let project_root = std::env::current_dir()
            .map_err(|err| SignError::Config(format!("cannot determine working directory: {err}")))?;
        let config = Config::load(cli.config.as_deref(), &project_root)?;
        Ok(Self {
            config,
            json: cli.json,
            verbosity: cli.verbose,
            project_root,
        })
    }
}
