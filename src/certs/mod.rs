//! Certificates, issuance and trust evaluation

pub mod chain;
pub mod issuer;
pub mod trust;
pub mod validity;

use x509_parser::error::PEMError;
use x509_parser::pem::Pem;

pub use chain::{Certificate, CertificateChain};
pub use issuer::{CertificateIssuer, IssuerOptions};
pub use trust::{CertificateVerifier, TrustPolicy};
pub use validity::ValidityPolicy;

/// DER input always opens with a SEQUENCE tag; PEM never does.
pub(crate) fn is_der(bytes: &[u8]) -> bool {
    bytes.first() == Some(&0x30)
}

/// Every PEM block in `bytes`, in order. Text outside the blocks is skipped.
pub(crate) fn pem_blocks(bytes: &[u8]) -> std::result::Result<Vec<Pem>, PEMError> {
    Pem::iter_from_buffer(bytes).collect()
}
