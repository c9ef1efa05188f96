use std::sync::OnceLock;

use rsa::RsaPrivateKey;

use crate::certs::chain::{Certificate, CertificateChain};
use crate::certs::issuer::CertificateIssuer;
use crate::identity::DeveloperIdentity;
use crate::keys::StaticKeyProvider;

// 2048-bit keys keep unit tests fast; the signing scheme does not depend on size.
static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
static ALT_KEY: OnceLock<RsaPrivateKey> = OnceLock::new();

fn generate() -> RsaPrivateKey {
    CertificateIssuer::new()
        .with_key_size(2048)
        .generate_key_pair()
        .expect("generate test key")
}

pub fn rsa_2048() -> &'static RsaPrivateKey {
    KEY.get_or_init(generate)
}

pub fn rsa_2048_alt() -> &'static RsaPrivateKey {
    ALT_KEY.get_or_init(generate)
}

/// Self-signed certificate for `name`, keyed with [`rsa_2048_alt`].
pub fn self_signed(name: &str) -> (Certificate, RsaPrivateKey) {
    let key = rsa_2048_alt().clone();
    let cert = CertificateIssuer::new()
        .issue_self_signed(&DeveloperIdentity::new(name), &key)
        .expect("issue self-signed test certificate");
    (cert, key)
}

/// Leaf keyed with [`rsa_2048`], issued by `issuer_name` keyed with
/// [`rsa_2048_alt`]. Pairs with [`self_signed`]`(issuer_name)`.
pub fn ca_signed_leaf(name: &str, issuer_name: &str) -> (Certificate, RsaPrivateKey) {
    let key = rsa_2048().clone();
    let cert = CertificateIssuer::new()
        .issue_signed_by(
            &DeveloperIdentity::new(name),
            &key,
            &DeveloperIdentity::new(issuer_name),
            rsa_2048_alt(),
            false,
        )
        .expect("issue CA-signed test certificate");
    (cert, key)
}

/// Provider holding [`rsa_2048`] and a self-signed certificate for `name`.
pub fn static_provider(name: &str) -> StaticKeyProvider {
    let key = rsa_2048().clone();
    let cert = CertificateIssuer::new()
        .issue_self_signed(&DeveloperIdentity::new(name), &key)
        .expect("issue provider certificate");
    StaticKeyProvider::new(name, key, CertificateChain::single(cert))
}
