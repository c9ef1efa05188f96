//! jdeploy-sign verify - Check a bundle against trusted certificates

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Args;

use crate::app::AppContext;
use crate::certs::validity::ValidityPolicy;
use crate::cli::output::{HumanLayout, emit_human, emit_json, json_ok};
use crate::error::Result;
use crate::signing::{TrustedCertificates, VerifyOptions, VerifyPackageParams, verify_package};

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Bundle directory to verify
    pub directory: PathBuf,

    /// Release version the bundle must be signed for
    #[arg(long = "version", value_name = "VERSION")]
    pub release: String,

    /// Trusted certificates: inline PEM or a .pem/.der/.cer/.crt file
    #[arg(long, value_name = "PEM_OR_FILE")]
    pub trusted: String,

    /// How the manifest timestamp relates to the certificate validity window
    /// (ignore, if_present, required; default: from config)
    #[arg(long)]
    pub validity_policy: Option<ValidityPolicy>,

    /// Worker threads (default: from config)
    #[arg(long)]
    pub threads: Option<usize>,
}

/// Exits successfully only when the bundle is signed correctly.
pub fn run(ctx: &AppContext, args: &VerifyArgs) -> Result<ExitCode> {
    let trusted_certificates: TrustedCertificates = args.trusted.parse()?;
    let params = VerifyPackageParams {
        version: args.release.clone(),
        bundle_path: args.directory.clone(),
        trusted_certificates,
    };
    let options = VerifyOptions {
        validity_policy: args
            .validity_policy
            .unwrap_or(ctx.config.verify.validity_policy),
        threads: args.threads.unwrap_or(ctx.config.verify.threads),
    };
    let outcome = verify_package(&params, options);

    if ctx.json {
        emit_json(&json_ok(&outcome))?;
    } else {
        let mut layout = HumanLayout::new();
        layout.kv("bundle", &args.directory.display().to_string());
        layout.kv("version", &args.release);
        if let Some(result) = outcome.result {
            layout.kv("result", &result.to_string());
        }
        match &outcome.message {
            Some(message) => layout.push_line(format!("✗ {message}")),
            None => layout.push_line("✓ The package is signed correctly"),
        };
        emit_human(layout);
    }

    Ok(if outcome.verified {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
