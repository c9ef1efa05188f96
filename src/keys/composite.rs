use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::{debug, warn};

use crate::certs::chain::{Certificate, CertificateChain};
use crate::error::{Result, SignError};
use crate::keys::KeyProvider;

/// Ordered fallback over several providers. Each call tries delegates in
/// order and returns the first success; it fails only when every delegate
/// fails, listing all of their errors.
#[derive(Default)]
pub struct CompositeKeyProvider {
    providers: Vec<Box<dyn KeyProvider>>,
}

impl CompositeKeyProvider {
    pub fn new(providers: Vec<Box<dyn KeyProvider>>) -> Self {
        Self { providers }
    }

    pub fn push(&mut self, provider: impl KeyProvider + 'static) {
        self.providers.push(Box::new(provider));
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    fn first_success<T>(
        &self,
        capability: &'static str,
        op: impl Fn(&dyn KeyProvider) -> Result<T>,
    ) -> Result<T> {
        if self.providers.is_empty() {
            return Err(SignError::AllProvidersFailed(vec![
                "no key providers configured".to_string(),
            ]));
        }

        let mut failures = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            match op(provider.as_ref()) {
                Ok(value) => {
                    debug!(provider = provider.name(), capability, "key provider succeeded");
                    return Ok(value);
                }
                Err(err) => {
                    warn!(
                        provider = provider.name(),
                        capability,
                        error = %err,
                        "key provider failed, trying next"
                    );
                    failures.push(format!("{}: {err}", provider.name()));
                }
            }
        }
        Err(SignError::AllProvidersFailed(failures))
    }
}

impl KeyProvider for CompositeKeyProvider {
    fn name(&self) -> &str {
        "composite"
    }

    fn signing_key(&self) -> Result<RsaPrivateKey> {
        self.first_success("signing key", |p| p.signing_key())
    }

    fn public_key(&self) -> Result<RsaPublicKey> {
        self.first_success("public key", |p| p.public_key())
    }

    fn certificate_chain(&self) -> Result<CertificateChain> {
        self.first_success("certificate chain", |p| p.certificate_chain())
    }

    fn trust_anchors(&self) -> Result<Vec<Certificate>> {
        self.first_success("trust anchors", |p| p.trust_anchors())
    }

    // Key and chain must come from the same delegate.
    fn signing_identity(&self) -> Result<(RsaPrivateKey, CertificateChain)> {
        self.first_success("signing identity", |p| p.signing_identity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::StaticKeyProvider;
    use crate::test_utils::keys::{rsa_2048, self_signed, static_provider};

    struct Failing(&'static str);

    impl KeyProvider for Failing {
        fn name(&self) -> &str {
            self.0
        }

        fn signing_key(&self) -> Result<RsaPrivateKey> {
            Err(SignError::KeyNotFound(format!("{} has no key", self.0)))
        }
    }

    #[test]
    fn returns_first_success() {
        let mut composite = CompositeKeyProvider::default();
        composite.push(Failing("env"));
        composite.push(static_provider("Fallback"));

        assert_eq!(&composite.signing_key().unwrap(), rsa_2048());
        assert_eq!(composite.provider_names(), vec!["env", "Fallback"]);
    }

    #[test]
    fn all_failures_are_listed() {
        let providers: Vec<Box<dyn KeyProvider>> =
            vec![Box::new(Failing("env")), Box::new(Failing("keychain"))];
        let composite = CompositeKeyProvider::new(providers);

        let err = composite.signing_key().unwrap_err();
        let SignError::AllProvidersFailed(failures) = &err else {
            panic!("unexpected error: {err}");
        };
        assert_eq!(failures.len(), 2);
        assert!(failures[0].starts_with("env:"));
        assert!(failures[1].starts_with("keychain:"));
    }

    #[test]
    fn empty_composite_fails() {
        assert!(matches!(
            CompositeKeyProvider::default().signing_key().unwrap_err(),
            SignError::AllProvidersFailed(_)
        ));
    }

    #[test]
    fn signing_identity_skips_partial_providers() {
        // The first provider has a key but no chain; the pair must come from
        // the second provider as a unit.
        let (cert, key) = self_signed("Whole Identity");
        let mut composite = CompositeKeyProvider::default();
        composite.push(StaticKeyOnly);
        composite.push(StaticKeyProvider::new(
            "whole",
            key.clone(),
            CertificateChain::single(cert.clone()),
        ));

        let (found_key, chain) = composite.signing_identity().unwrap();
        assert_eq!(found_key, key);
        assert_eq!(chain.leaf(), &cert);
    }

    struct StaticKeyOnly;

    impl KeyProvider for StaticKeyOnly {
        fn name(&self) -> &str {
            "key-only"
        }

        fn signing_key(&self) -> Result<RsaPrivateKey> {
            Ok(rsa_2048().clone())
        }
    }
}
