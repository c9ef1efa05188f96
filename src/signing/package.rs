//! One-call verification of a published package against a set of trusted
//! certificates, reduced to a yes/no answer and a user-facing message.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;
use tracing::{debug, warn};

use crate::certs::chain::{Certificate, parse_certificates};
use crate::certs::trust::TrustPolicy;
use crate::error::{Result, SignError};
use crate::signing::VerificationResult;
use crate::signing::verifier::{FileVerifier, VerifyOptions};

const PEM_CERTIFICATE_HEADER: &str = "-----BEGIN CERTIFICATE-----";
const CERTIFICATE_EXTENSIONS: [&str; 4] = ["pem", "der", "cer", "crt"];

/// Where the trusted certificates come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustedCertificates {
    /// Inline PEM text holding one or more certificates.
    Pem(String),
    /// A `.pem`, `.der`, `.cer` or `.crt` file.
    File(PathBuf),
}

impl FromStr for TrustedCertificates {
    type Err = SignError;

    fn from_str(raw: &str) -> Result<Self> {
        let trimmed = raw.trim_start();
        if trimmed.is_empty() {
            return Err(SignError::ValidationFailed(
                "trusted certificates are required".to_string(),
            ));
        }
        if trimmed.starts_with(PEM_CERTIFICATE_HEADER) {
            return Ok(Self::Pem(raw.to_string()));
        }

        let path = Path::new(raw);
        let known_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| CERTIFICATE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
        if known_extension && path.is_file() {
            return Ok(Self::File(path.to_path_buf()));
        }
        Err(SignError::Config(format!(
            "trusted certificates must be PEM text or an existing .pem/.der/.cer/.crt file: {raw}"
        )))
    }
}

impl TrustedCertificates {
    pub fn load(&self) -> Result<Vec<Certificate>> {
        let certs = match self {
            Self::Pem(text) => parse_certificates(text.as_bytes())?,
            Self::File(path) => {
                let bytes = std::fs::read(path).map_err(|err| {
                    SignError::Config(format!("read {}: {err}", path.display()))
                })?;
                parse_certificates(&bytes)?
            }
        };
        if certs.is_empty() {
            return Err(SignError::Certificate(
                "no trusted certificates found".to_string(),
            ));
        }
        Ok(certs)
    }
}

#[derive(Debug, Clone)]
pub struct VerifyPackageParams {
    pub version: String,
    pub bundle_path: PathBuf,
    pub trusted_certificates: TrustedCertificates,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PackageVerification {
    pub verified: bool,
    /// Why the package was rejected; `None` when verified.
    pub message: Option<String>,
    /// `None` when verification could not run at all.
    pub result: Option<VerificationResult>,
}

impl PackageVerification {
    fn from_result(result: VerificationResult) -> Self {
        let message = match result {
            VerificationResult::SignedCorrectly => None,
            VerificationResult::NotSignedAtAll => Some("The package is not signed"),
            VerificationResult::UntrustedCertificate => {
                Some("The package is signed with an untrusted certificate")
            }
            VerificationResult::SignatureMismatch => {
                Some("The package signature does not match the contents")
            }
        };
        Self {
            verified: result.is_verified(),
            message: message.map(str::to_string),
            result: Some(result),
        }
    }

    fn from_error(err: &SignError) -> Self {
        Self {
            verified: false,
            message: Some(err.to_string()),
            result: None,
        }
    }
}

/// Verify a package; never fails, errors are folded into the answer.
pub fn verify_package(params: &VerifyPackageParams, options: VerifyOptions) -> PackageVerification {
    match run(params, options) {
        Ok(result) => PackageVerification::from_result(result),
        Err(err) => {
            warn!(
                bundle = %params.bundle_path.display(),
                error = %err,
                "package verification could not run"
            );
            PackageVerification::from_error(&err)
        }
    }
}

fn run(params: &VerifyPackageParams, options: VerifyOptions) -> Result<VerificationResult> {
    if params.version.trim().is_empty() {
        return Err(SignError::ValidationFailed("version is required".to_string()));
    }
    if params.bundle_path.as_os_str().is_empty() {
        return Err(SignError::ValidationFailed(
            "bundle path is required".to_string(),
        ));
    }
    if !params.bundle_path.is_dir() {
        return Err(SignError::ValidationFailed(format!(
            "bundle directory {} does not exist",
            params.bundle_path.display()
        )));
    }

    let trusted = params.trusted_certificates.load()?;
    debug!(count = trusted.len(), "loaded trusted certificates");
    let policy = TrustPolicy::trust_any(trusted);
    FileVerifier::new(options).verify_directory(&params.version, &params.bundle_path, &policy)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyProvider as _;
    use crate::signing::manifest::CERTIFICATE_FILE;
    use crate::signing::signer::sign_directory;
    use crate::test_utils::fixtures::BundleFixture;
    use crate::test_utils::keys::{self_signed, static_provider};

    fn signed(name: &str) -> (BundleFixture, Certificate) {
        let bundle = BundleFixture::hello_world();
        let provider = static_provider(name);
        sign_directory("1.0.0", bundle.path(), &provider).unwrap();
        let leaf = provider.certificate_chain().unwrap().leaf().clone();
        (bundle, leaf)
    }

    fn params(bundle: &BundleFixture, version: &str, trusted: TrustedCertificates) -> VerifyPackageParams {
        VerifyPackageParams {
            version: version.to_string(),
            bundle_path: bundle.path().to_path_buf(),
            trusted_certificates: trusted,
        }
    }

    #[test]
    fn verified_package_has_no_message() {
        let (bundle, leaf) = signed("Package Dev");
        let outcome = verify_package(
            &params(&bundle, "1.0.0", TrustedCertificates::Pem(leaf.to_pem().unwrap())),
            VerifyOptions::default(),
        );
        assert!(outcome.verified);
        assert_eq!(outcome.message, None);
        assert_eq!(outcome.result, Some(VerificationResult::SignedCorrectly));
    }

    #[test]
    fn verdicts_map_to_messages() {
        let (bundle, leaf) = signed("Package Dev");
        let trusted = TrustedCertificates::Pem(leaf.to_pem().unwrap());

        let mismatch = verify_package(&params(&bundle, "2.0.0", trusted.clone()), VerifyOptions::default());
        assert!(!mismatch.verified);
        assert_eq!(
            mismatch.message.as_deref(),
            Some("The package signature does not match the contents")
        );

        let (stranger, _) = self_signed("Package Stranger");
        let untrusted = verify_package(
            &params(&bundle, "1.0.0", TrustedCertificates::Pem(stranger.to_pem().unwrap())),
            VerifyOptions::default(),
        );
        assert_eq!(untrusted.result, Some(VerificationResult::UntrustedCertificate));
        assert_eq!(
            untrusted.message.as_deref(),
            Some("The package is signed with an untrusted certificate")
        );

        std::fs::remove_file(bundle.path().join(CERTIFICATE_FILE)).unwrap();
        let unsigned = verify_package(&params(&bundle, "1.0.0", trusted), VerifyOptions::default());
        assert_eq!(unsigned.result, Some(VerificationResult::NotSignedAtAll));
        assert_eq!(unsigned.message.as_deref(), Some("The package is not signed"));
    }

    #[test]
    fn trusted_certificates_from_der_file() {
        let (bundle, leaf) = signed("Package Dev");
        let trust_dir = BundleFixture::new();
        let cert_path = trust_dir.path().join("trusted.cer");
        std::fs::write(&cert_path, leaf.der()).unwrap();

        let trusted: TrustedCertificates = cert_path.to_str().unwrap().parse().unwrap();
        assert_eq!(trusted, TrustedCertificates::File(cert_path));
        assert!(verify_package(&params(&bundle, "1.0.0", trusted), VerifyOptions::default()).verified);
    }

    #[test]
    fn unrecognized_source_is_rejected() {
        assert!("".parse::<TrustedCertificates>().is_err());
        assert!("/no/such/file.pem".parse::<TrustedCertificates>().is_err());
        assert!("plain words".parse::<TrustedCertificates>().is_err());
        assert!(matches!(
            "-----BEGIN CERTIFICATE-----\n...".parse::<TrustedCertificates>(),
            Ok(TrustedCertificates::Pem(_))
        ));
    }

    #[test]
    fn loading_errors_leave_result_empty() {
        let (bundle, _) = signed("Package Dev");
        let outcome = verify_package(
            &params(&bundle, "1.0.0", TrustedCertificates::Pem("not a certificate".to_string())),
            VerifyOptions::default(),
        );
        assert!(!outcome.verified);
        assert!(outcome.message.is_some());
        assert_eq!(outcome.result, None);

        let missing = VerifyPackageParams {
            version: "1.0.0".to_string(),
            bundle_path: bundle.path().join("absent"),
            trusted_certificates: TrustedCertificates::Pem(String::new()),
        };
        let outcome = verify_package(&missing, VerifyOptions::default());
        assert!(outcome.message.unwrap().contains("does not exist"));
        assert_eq!(outcome.result, None);
    }
}
