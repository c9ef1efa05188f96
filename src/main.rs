//! jdeploy-sign - sign and verify jDeploy bundles
//!
//! Signs every file of a bundle directory, binds the manifest to a release
//! version and checks bundles against trusted certificates.

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use jdeploy_sign::app::AppContext;
use jdeploy_sign::cli::Cli;
use jdeploy_sign::cli::output::{emit_json, json_error};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(&cli);

    let result = AppContext::from_cli(&cli)
        .and_then(|ctx| jdeploy_sign::cli::commands::run(&ctx, &cli.command));
    match result {
        Ok(code) => code,
        Err(e) => {
            if cli.json {
                let _ = emit_json(&json_error(&e));
            } else {
                eprintln!("Error: {e}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cli: &Cli) {
    if cli.quiet {
        return;
    }

    let filter = match cli.verbose {
        0 => "warn,jdeploy_sign=info",
        1 => "info,jdeploy_sign=debug",
        2 => "debug,jdeploy_sign=trace",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    if cli.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
