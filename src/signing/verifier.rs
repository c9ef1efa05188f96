//! Read-only bundle verification.
//!
//! Only files listed in the manifest are checked. Extra files in the
//! bundle are not inspected.

use std::io;
use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::certs::chain::CertificateChain;
use crate::certs::trust::CertificateVerifier;
use crate::certs::validity::ValidityPolicy;
use crate::error::Result;
use crate::signing::VerificationResult;
use crate::signing::digest::{RsaVerifier, decode_hex, sha256_file};
use crate::signing::manifest::{
    CERTIFICATE_FILE, MANIFEST_FILE, Manifest, ManifestEntry, SIGNATURE_FILE, entry_path,
};
use crate::signing::worker_pool;

#[derive(Debug, Clone, Copy, Default)]
pub struct VerifyOptions {
    pub validity_policy: ValidityPolicy,
    /// Worker threads for per-file checks; `0` uses rayon's default.
    pub threads: usize,
}

#[derive(Debug, Clone, Default)]
pub struct FileVerifier {
    options: VerifyOptions,
}

/// Verify `directory` against `version` with default options.
pub fn verify_directory(
    version: &str,
    directory: &Path,
    policy: &dyn CertificateVerifier,
) -> Result<VerificationResult> {
    FileVerifier::default().verify_directory(version, directory, policy)
}

impl FileVerifier {
    pub const fn new(options: VerifyOptions) -> Self {
        Self { options }
    }

    /// Malformed certificates, a non-RSA leaf key and an unparseable
    /// manifest are errors; every other failure is a verdict. A missing
    /// signing artifact means the bundle is unsigned, while one that exists
    /// but cannot be read is a [`VerificationResult::SignatureMismatch`].
    pub fn verify_directory(
        &self,
        version: &str,
        directory: &Path,
        policy: &dyn CertificateVerifier,
    ) -> Result<VerificationResult> {
        let cert_bytes = match read_artifact(directory, CERTIFICATE_FILE) {
            Ok(bytes) => bytes,
            Err(verdict) => return Ok(verdict),
        };
        let chain = CertificateChain::from_der_concat(&cert_bytes)?;

        if !policy.is_trusted(&chain) {
            warn!(
                leaf = %chain.leaf().fingerprint_sha256(),
                "bundle certificate is not trusted"
            );
            return Ok(VerificationResult::UntrustedCertificate);
        }

        let leaf = chain.leaf();
        let verifier = RsaVerifier::new(leaf.public_key()?);

        let manifest_bytes = match read_artifact(directory, MANIFEST_FILE) {
            Ok(bytes) => bytes,
            Err(verdict) => return Ok(verdict),
        };
        let signature_bytes = match read_artifact(directory, SIGNATURE_FILE) {
            Ok(bytes) => bytes,
            Err(verdict) => return Ok(verdict),
        };

        let manifest_signature = String::from_utf8(signature_bytes)
            .ok()
            .and_then(|text| decode_hex(&text));
        let Some(manifest_signature) = manifest_signature else {
            warn!("manifest signature is not hex");
            return Ok(VerificationResult::SignatureMismatch);
        };
        if !verifier.verify_manifest(&manifest_bytes, version, &manifest_signature) {
            warn!(version, "manifest signature does not match");
            return Ok(VerificationResult::SignatureMismatch);
        }

        let manifest = Manifest::from_json_bytes(&manifest_bytes)?;

        let validity = self
            .options
            .validity_policy
            .check(leaf, manifest.timestamp.as_deref())?;
        if !validity.is_acceptable() {
            warn!(
                ?validity,
                timestamp = manifest.timestamp.as_deref().unwrap_or("<none>"),
                "signing time is outside the certificate validity window"
            );
            return Ok(VerificationResult::UntrustedCertificate);
        }

        let entries: Vec<(&String, &ManifestEntry)> = manifest.entries.iter().collect();
        let pool = worker_pool(self.options.threads)?;
        let outcomes: Vec<Option<String>> = pool.install(|| {
            entries
                .par_iter()
                .map(|(key, entry)| check_entry(directory, key, entry, &verifier).err())
                .collect()
        });

        if let Some((key, reason)) = entries
            .iter()
            .zip(outcomes)
            .find_map(|((key, _), outcome)| outcome.map(|reason| (key, reason)))
        {
            warn!(path = %key, reason = %reason, "bundle file failed verification");
            return Ok(VerificationResult::SignatureMismatch);
        }

        info!(version, files = manifest.len(), "bundle signed correctly");
        Ok(VerificationResult::SignedCorrectly)
    }
}

/// `Err` is the verdict to return when the artifact is unusable.
fn read_artifact(directory: &Path, name: &str) -> std::result::Result<Vec<u8>, VerificationResult> {
    let path = directory.join(name);
    match std::fs::read(&path) {
        Ok(bytes) => Ok(bytes),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "signing artifact is missing");
            Err(VerificationResult::NotSignedAtAll)
        }
        Err(err) => {
            warn!(path = %path.display(), error = %err, "signing artifact is unreadable");
            Err(VerificationResult::SignatureMismatch)
        }
    }
}

/// `Err` carries the reason the entry does not match.
fn check_entry(
    root: &Path,
    key: &str,
    entry: &ManifestEntry,
    verifier: &RsaVerifier,
) -> std::result::Result<(), String> {
    let relative = entry_path(key).map_err(|err| err.to_string())?;
    let path = root.join(relative);

    let metadata = std::fs::symlink_metadata(&path).map_err(|err| format!("missing: {err}"))?;
    if !metadata.file_type().is_file() {
        return Err("not a regular file".to_string());
    }

    let live_hash = sha256_file(&path).map_err(|err| format!("unreadable: {err}"))?;
    let recorded_hash = decode_hex(&entry.hash).ok_or("recorded hash is not hex")?;
    if recorded_hash != live_hash {
        return Err("content hash differs".to_string());
    }

    let signature = decode_hex(&entry.signature).ok_or("recorded signature is not hex")?;
    if !verifier.verify(&live_hash, &signature) {
        return Err("file signature does not verify".to_string());
    }
    Ok(())
}
