//! Bundle signing and verification.

pub mod digest;
pub mod manifest;
pub mod package;
pub mod signer;
pub mod verifier;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SignError};

pub use manifest::{CERTIFICATE_FILE, MANIFEST_FILE, Manifest, ManifestEntry, SIGNATURE_FILE};
pub use package::{PackageVerification, TrustedCertificates, VerifyPackageParams, verify_package};
pub use signer::{FileSigner, SignOptions, SignReport, sign_directory};
pub use verifier::{FileVerifier, VerifyOptions, verify_directory};

/// Terminal verdict of verifying a bundle. Anything other than
/// `SignedCorrectly` must block installation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationResult {
    SignedCorrectly,
    NotSignedAtAll,
    SignatureMismatch,
    UntrustedCertificate,
}

impl VerificationResult {
    pub const fn is_verified(self) -> bool {
        matches!(self, Self::SignedCorrectly)
    }
}

impl std::fmt::Display for VerificationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SignedCorrectly => write!(f, "SIGNED_CORRECTLY"),
            Self::NotSignedAtAll => write!(f, "NOT_SIGNED_AT_ALL"),
            Self::SignatureMismatch => write!(f, "SIGNATURE_MISMATCH"),
            Self::UntrustedCertificate => write!(f, "UNTRUSTED_CERTIFICATE"),
        }
    }
}

/// `0` threads means rayon's default sizing.
fn worker_pool(threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|index| format!("jdeploy-sign-{index}"))
        .build()
        .map_err(|err| SignError::Config(format!("cannot start worker pool: {err}")))
}
