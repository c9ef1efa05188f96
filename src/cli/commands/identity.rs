//! jdeploy-sign identity - Create a developer key pair and certificate

use std::path::{Path, PathBuf};

use clap::Args;
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use tracing::info;

use crate::app::AppContext;
use crate::certs::chain::CertificateChain;
use crate::certs::issuer::{CertificateIssuer, DEFAULT_KEY_BITS};
use crate::cli::output::{HumanLayout, emit_human, emit_json, json_ok};
use crate::error::{Result, SignError};
use crate::identity::DeveloperIdentity;
use crate::keys::DeveloperKeyStore;
use crate::keys::material::{private_key_to_pem, public_key_to_pem};

pub const PRIVATE_KEY_FILE: &str = "private.pem";
pub const PUBLIC_KEY_FILE: &str = "public.pem";
pub const CERTIFICATE_FILE: &str = "certificate.pem";

#[derive(Args, Debug)]
pub struct IdentityArgs {
    /// Developer name (certificate CN)
    #[arg(long)]
    pub name: String,

    /// Organization (O)
    #[arg(long)]
    pub organization: Option<String>,

    /// City (L)
    #[arg(long)]
    pub city: Option<String>,

    /// Two-letter country code (C)
    #[arg(long)]
    pub country: Option<String>,

    /// Write private.pem, public.pem and certificate.pem here
    #[arg(long, required_unless_present = "url")]
    pub out_dir: Option<PathBuf>,

    /// Identity URL; stores the key pair in the developer keystore under it,
    /// reusing an existing entry
    #[arg(long)]
    pub url: Option<String>,

    /// Developer keystore path (default: from config)
    #[arg(long, requires = "url")]
    pub keystore: Option<PathBuf>,

    /// RSA modulus size in bits
    #[arg(long, default_value_t = DEFAULT_KEY_BITS)]
    pub key_size: usize,

    /// Overwrite existing PEM files in --out-dir
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
struct IdentityReport {
    subject: String,
    fingerprint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    keystore: Option<PathBuf>,
    files: Vec<PathBuf>,
}

pub fn run(ctx: &AppContext, args: &IdentityArgs) -> Result<()> {
    let identity = identity_from_args(args);
    let issuer = CertificateIssuer::new().with_key_size(args.key_size);

    let (key, chain, keystore) = match &args.url {
        Some(_) => {
            let path = args
                .keystore
                .clone()
                .or_else(|| ctx.config.keys.resolved_keystore_path())
                .ok_or_else(|| SignError::Config("cannot locate the developer keystore".to_string()))?;
            let password = ctx.config.keys.keystore_password.clone().ok_or_else(|| {
                SignError::Config(
                    "keystore password not configured (set JDEPLOY_KEYSTORE_PASSWORD)".to_string(),
                )
            })?;
            let store = DeveloperKeyStore::new(&path, password).with_issuer(issuer);
            let (key, chain) = store.get_key_pair(&identity, true)?.ok_or_else(|| {
                SignError::KeyNotFound(format!("no key pair for {}", identity.name))
            })?;
            (key, chain, Some(path))
        }
        None => {
            let key = issuer.generate_key_pair()?;
            let cert = issuer.issue_self_signed(&identity, &key)?;
            (key, CertificateChain::single(cert), None)
        }
    };

    let files = match &args.out_dir {
        Some(dir) => write_pem_files(dir, &key, &chain, args.force)?,
        None => Vec::new(),
    };

    let report = IdentityReport {
        subject: chain.leaf().subject()?,
        fingerprint: chain.leaf().fingerprint_sha256(),
        keystore,
        files,
    };
    info!(subject = %report.subject, "developer identity ready");

    if ctx.json {
        return emit_json(&json_ok(&report));
    }

    let mut layout = HumanLayout::new();
    layout
        .title("Developer identity")
        .kv("subject", &report.subject)
        .kv("fingerprint", &report.fingerprint);
    if let Some(path) = &report.keystore {
        layout.kv("keystore", &path.display().to_string());
    }
    for file in &report.files {
        layout.kv("wrote", &file.display().to_string());
    }
    emit_human(layout);
    Ok(())
}

fn identity_from_args(args: &IdentityArgs) -> DeveloperIdentity {
    let mut identity = DeveloperIdentity::new(args.name.clone());
    if let Some(organization) = &args.organization {
        identity = identity.with_organization(organization);
    }
    if let Some(city) = &args.city {
        identity = identity.with_city(city);
    }
    if let Some(country) = &args.country {
        identity = identity.with_country_code(country);
    }
    if let Some(url) = &args.url {
        identity = identity.with_identity_url(url);
    }
    identity
}

fn write_pem_files(
    dir: &Path,
    key: &RsaPrivateKey,
    chain: &CertificateChain,
    force: bool,
) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let outputs = [
        (PRIVATE_KEY_FILE, private_key_to_pem(key)?),
        (PUBLIC_KEY_FILE, public_key_to_pem(&RsaPublicKey::from(key))?),
        (CERTIFICATE_FILE, chain.to_pem()?),
    ];

    if !force {
        if let Some((name, _)) = outputs.iter().find(|(name, _)| dir.join(name).exists()) {
            return Err(SignError::ValidationFailed(format!(
                "{} already exists (use --force to overwrite)",
                dir.join(name).display()
            )));
        }
    }

    let mut written = Vec::with_capacity(outputs.len());
    for (name, contents) in outputs {
        let path = dir.join(name);
        std::fs::write(&path, contents)?;
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::material::{decode_private_key, decode_public_key};
    use crate::test_utils::keys::self_signed;
    use tempfile::tempdir;

    #[test]
    fn writes_matching_pem_files() {
        let dir = tempdir().unwrap();
        let (cert, key) = self_signed("Identity Dev");
        let written =
            write_pem_files(dir.path(), &key, &CertificateChain::single(cert.clone()), false).unwrap();
        assert_eq!(written.len(), 3);

        let private = decode_private_key(&std::fs::read(dir.path().join(PRIVATE_KEY_FILE)).unwrap()).unwrap();
        let public = decode_public_key(&std::fs::read(dir.path().join(PUBLIC_KEY_FILE)).unwrap()).unwrap();
        assert_eq!(private, key);
        assert_eq!(public, RsaPublicKey::from(&key));
        assert_eq!(
            std::fs::read_to_string(dir.path().join(CERTIFICATE_FILE)).unwrap(),
            cert.to_pem().unwrap()
        );
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let dir = tempdir().unwrap();
        let (cert, key) = self_signed("Identity Dev");
        let chain = CertificateChain::single(cert);
        std::fs::write(dir.path().join(PUBLIC_KEY_FILE), "existing").unwrap();

        let err = write_pem_files(dir.path(), &key, &chain, false).unwrap_err();
        assert!(matches!(err, SignError::ValidationFailed(_)));
        assert_eq!(
            std::fs::read_to_string(dir.path().join(PUBLIC_KEY_FILE)).unwrap(),
            "existing"
        );
        assert!(write_pem_files(dir.path(), &key, &chain, true).is_ok());
    }
}
