//! SHA-256 digests and RSA-SHA256 (PKCS#1 v1.5) signatures.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding as _, Signer as _, Verifier as _};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

use crate::error::Result;

pub type Sha256Digest = [u8; 32];

pub fn sha256(bytes: &[u8]) -> Sha256Digest {
    Sha256::digest(bytes).into()
}

/// Stream a file through SHA-256.
pub fn sha256_file(path: &Path) -> io::Result<Sha256Digest> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hasher.finalize().into())
}

/// Lowercase hex with surrounding whitespace tolerated.
pub fn decode_hex(text: &str) -> Option<Vec<u8>> {
    hex::decode(text.trim()).ok()
}

/// SHA256withRSA signer. Shareable across worker threads.
#[derive(Debug, Clone)]
pub struct RsaSigner {
    key: SigningKey<Sha256>,
}

impl RsaSigner {
    pub fn new(key: RsaPrivateKey) -> Self {
        Self {
            key: SigningKey::new(key),
        }
    }

    pub fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        Ok(self.key.try_sign(message)?.to_vec())
    }

    /// Per-manifest signature: the manifest bytes followed by the version.
    pub fn sign_manifest(&self, manifest: &[u8], version: &str) -> Result<Vec<u8>> {
        self.sign(&versioned_payload(manifest, version))
    }
}

#[derive(Debug, Clone)]
pub struct RsaVerifier {
    key: VerifyingKey<Sha256>,
}

impl RsaVerifier {
    pub fn new(key: RsaPublicKey) -> Self {
        Self {
            key: VerifyingKey::new(key),
        }
    }

    /// False for a bad signature and for bytes that are not a signature.
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> bool {
        Signature::try_from(signature)
            .is_ok_and(|signature| self.key.verify(message, &signature).is_ok())
    }

    pub fn verify_manifest(&self, manifest: &[u8], version: &str, signature: &[u8]) -> bool {
        self.verify(&versioned_payload(manifest, version), signature)
    }
}

fn versioned_payload(manifest: &[u8], version: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(manifest.len() + version.len());
    payload.extend_from_slice(manifest);
    payload.extend_from_slice(version.as_bytes());
    payload
}
