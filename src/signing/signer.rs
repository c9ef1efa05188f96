use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use rsa::RsaPublicKey;
use serde::Serialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::certs::validity::format_timestamp;
use crate::error::{Result, SignError};
use crate::keys::KeyProvider;
use crate::signing::digest::{RsaSigner, sha256_file};
use crate::signing::manifest::{
    ARTIFACT_FILES, CERTIFICATE_FILE, MANIFEST_FILE, Manifest, ManifestEntry, SIGNATURE_FILE,
    TIMESTAMP_KEY, relative_key,
};
use crate::signing::worker_pool;

#[derive(Debug, Clone, Default)]
pub struct SignOptions {
    /// Worker threads for per-file hashing and signing; `0` uses rayon's default.
    pub threads: usize,
    /// Fixed signing time instead of the current clock.
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignReport {
    pub version: String,
    pub files_signed: usize,
    pub timestamp: String,
    pub certificate_count: usize,
    pub manifest_path: PathBuf,
    pub signature_path: PathBuf,
    pub certificate_path: PathBuf,
}

#[derive(Debug, Clone, Default)]
pub struct FileSigner {
    options: SignOptions,
}

/// Sign `directory` for `version` with default options.
pub fn sign_directory(
    version: &str,
    directory: &Path,
    provider: &dyn KeyProvider,
) -> Result<SignReport> {
    FileSigner::default().sign_directory(version, directory, provider)
}

impl FileSigner {
    pub const fn new(options: SignOptions) -> Self {
        Self { options }
    }

    /// Hash and sign every regular file under `directory`, then write the
    /// manifest, its version-bound signature and the certificate chain to
    /// the bundle root. Nothing is written unless every file was signed.
    pub fn sign_directory(
        &self,
        version: &str,
        directory: &Path,
        provider: &dyn KeyProvider,
    ) -> Result<SignReport> {
        if !directory.is_dir() {
            return Err(SignError::ValidationFailed(format!(
                "bundle directory {} does not exist",
                directory.display()
            )));
        }

        let (key, chain) = provider.signing_identity().map_err(|err| match err {
            err @ (SignError::KeyNotFound(_)
            | SignError::AllProvidersFailed(_)
            | SignError::Unsupported { .. }) => {
                SignError::Config(format!("no signing identity available: {err}"))
            }
            other => other,
        })?;
        if chain.leaf().public_key()? != RsaPublicKey::from(&key) {
            return Err(SignError::Config(format!(
                "certificate from {} does not match its signing key",
                provider.name()
            )));
        }

        let files = collect_files(directory)?;
        debug!(files = files.len(), directory = %directory.display(), "collected bundle files");

        let signer = RsaSigner::new(key);
        let pool = worker_pool(self.options.threads)?;
        let signed: Vec<Result<(String, ManifestEntry)>> = pool.install(|| {
            files
                .par_iter()
                .map(|(rel, path)| sign_file(&signer, rel, path))
                .collect()
        });

        let mut manifest = Manifest::new();
        for result in signed {
            let (rel, entry) = result?;
            manifest.entries.insert(rel, entry);
        }

        let timestamp = format_timestamp(self.options.timestamp.unwrap_or_else(Utc::now));
        manifest.timestamp = Some(timestamp.clone());

        let manifest_bytes = manifest.to_json_bytes()?;
        let manifest_signature = signer.sign_manifest(&manifest_bytes, version)?;

        let manifest_path = directory.join(MANIFEST_FILE);
        let signature_path = directory.join(SIGNATURE_FILE);
        let certificate_path = directory.join(CERTIFICATE_FILE);
        std::fs::write(&manifest_path, &manifest_bytes)?;
        std::fs::write(&signature_path, hex::encode(manifest_signature))?;
        std::fs::write(&certificate_path, chain.to_der_concat())?;

        info!(
            version,
            files = manifest.len(),
            directory = %directory.display(),
            "signed bundle"
        );

        Ok(SignReport {
            version: version.to_string(),
            files_signed: manifest.len(),
            timestamp,
            certificate_count: chain.certificates().len(),
            manifest_path,
            signature_path,
            certificate_path,
        })
    }
}

fn sign_file(signer: &RsaSigner, rel: &str, path: &Path) -> Result<(String, ManifestEntry)> {
    let hash = sha256_file(path).map_err(|err| {
        SignError::Io(std::io::Error::new(
            err.kind(),
            format!("read {}: {err}", path.display()),
        ))
    })?;
    let signature = signer.sign(&hash)?;
    debug!(path = rel, "signed file");
    Ok((
        rel.to_string(),
        ManifestEntry {
            hash: hex::encode(hash),
            signature: hex::encode(signature),
        },
    ))
}

/// Regular files under `root` keyed by POSIX-relative path, sorted. The
/// signing artifacts are skipped at the bundle root only; symlinks are
/// neither followed nor signed.
fn collect_files(root: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .min_depth(1)
    {
        let entry = entry?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            debug!(path = %entry.path().display(), "skipping symlink");
            continue;
        }
        if !file_type.is_file() {
            continue;
        }

        if entry.depth() == 1 {
            let name = entry.file_name().to_string_lossy();
            if ARTIFACT_FILES.contains(&&*name) {
                continue;
            }
            if name == TIMESTAMP_KEY {
                return Err(SignError::ValidationFailed(format!(
                    "a root-level file named {TIMESTAMP_KEY} collides with the manifest timestamp"
                )));
            }
        }

        files.push((relative_key(root, entry.path())?, entry.into_path()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}
