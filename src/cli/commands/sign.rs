//! jdeploy-sign sign - Sign a bundle directory

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::Args;
use tracing::debug;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_json, json_ok};
use crate::error::{Result, SignError};
use crate::keys::{FileKeyProvider, KeyProvider, KeyStoreKeyProvider, create_key_provider};
use crate::signing::{FileSigner, SignOptions};

#[derive(Args, Debug)]
pub struct SignArgs {
    /// Bundle directory to sign in place
    pub directory: PathBuf,

    /// Release version the manifest signature is bound to
    #[arg(long = "version", value_name = "VERSION")]
    pub release: String,

    /// Keystore file holding the signing key (password from config or JDEPLOY_KEYSTORE_PASSWORD)
    #[arg(long, conflicts_with = "private_key")]
    pub keystore: Option<PathBuf>,

    /// Key alias in the keystore (default: configured developer id)
    #[arg(long)]
    pub alias: Option<String>,

    /// PEM private key file
    #[arg(long)]
    pub private_key: Option<PathBuf>,

    /// Certificate chain (PEM or DER) for --private-key
    #[arg(long, requires = "private_key")]
    pub certificate: Option<PathBuf>,

    /// Root certificate appended to the chain for --private-key
    #[arg(long, requires = "certificate")]
    pub root_certificate: Option<PathBuf>,

    /// Signing time recorded in the manifest (RFC 3339; default: now)
    #[arg(long)]
    pub timestamp: Option<DateTime<Utc>>,

    /// Worker threads (default: from config)
    #[arg(long)]
    pub threads: Option<usize>,
}

pub fn run(ctx: &AppContext, args: &SignArgs) -> Result<()> {
    let provider = key_provider(ctx, args)?;
    debug!(provider = provider.name(), "selected key provider");

    let signer = FileSigner::new(SignOptions {
        threads: args.threads.unwrap_or(ctx.config.signing.threads),
        timestamp: args.timestamp,
    });
    let report = signer.sign_directory(&args.release, &args.directory, provider.as_ref())?;

    if ctx.json {
        return emit_json(&json_ok(&report));
    }

    let mut layout = HumanLayout::new();
    layout
        .title("Signed bundle")
        .kv("version", &report.version)
        .kv("files", &report.files_signed.to_string())
        .kv("timestamp", &report.timestamp)
        .kv("certificates", &report.certificate_count.to_string())
        .kv("manifest", &report.manifest_path.display().to_string());
    emit_human(layout);
    Ok(())
}

fn key_provider(ctx: &AppContext, args: &SignArgs) -> Result<Box<dyn KeyProvider>> {
    let keys = &ctx.config.keys;

    if let Some(private_key) = &args.private_key {
        let mut provider = FileKeyProvider::from_private_key(private_key);
        if let Some(certificate) = &args.certificate {
            provider = provider.with_certificate(certificate);
        }
        if let Some(root) = &args.root_certificate {
            provider = provider.with_root_certificate(root);
        }
        return Ok(Box::new(provider));
    }

    if let Some(keystore) = &args.keystore {
        let alias = args
            .alias
            .clone()
            .or_else(|| keys.developer_id.clone())
            .ok_or_else(|| {
                SignError::Config("--keystore needs --alias or a configured developer_id".to_string())
            })?;
        let password = keys.keystore_password.clone().ok_or_else(|| {
            SignError::Config(
                "keystore password not configured (set JDEPLOY_KEYSTORE_PASSWORD)".to_string(),
            )
        })?;
        let mut provider = KeyStoreKeyProvider::new(keystore, password, alias);
        if let Some(ca_id) = &keys.ca_id {
            provider = provider.with_ca_alias(ca_id);
        }
        return Ok(Box::new(provider));
    }

    let mut keys = keys.clone();
    if args.alias.is_some() {
        keys.developer_id.clone_from(&args.alias);
    }
    Ok(Box::new(create_key_provider(&keys)))
}
