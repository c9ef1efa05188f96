//! Signing key acquisition.
//!
//! Every backend implements [`KeyProvider`], a single capability-based
//! interface: produce the signing key, produce the certificate chain that
//! vouches for it, and produce the trust anchors an installer should pin.
//! Backends surface failures immediately; only [`CompositeKeyProvider`]
//! catches a failure and moves on to the next delegate.

pub mod composite;
pub mod env;
pub mod factory;
pub mod file;
pub mod keychain;
pub mod keystore;
pub mod material;

use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::certs::chain::{Certificate, CertificateChain};
use crate::error::{Result, SignError};

pub use composite::CompositeKeyProvider;
pub use env::{EnvKeyProvider, EnvSource, ProcessEnv};
pub use factory::create_key_provider;
pub use file::FileKeyProvider;
pub use keychain::{KeychainKeyProvider, KeyringStore, MemorySecretStore, SecretStore};
pub use keystore::{DeveloperKeyStore, KeyStore, KeyStoreKeyProvider};

pub trait KeyProvider: Send + Sync {
    /// Short label used in logs and aggregated errors.
    fn name(&self) -> &str;

    fn signing_key(&self) -> Result<RsaPrivateKey>;

    /// Leaf certificate key when a chain is available, otherwise the public
    /// half of the signing key.
    fn public_key(&self) -> Result<RsaPublicKey> {
        match self.certificate_chain() {
            Ok(chain) => chain.leaf().public_key(),
            Err(_) => Ok(RsaPublicKey::from(&self.signing_key()?)),
        }
    }

    fn certificate_chain(&self) -> Result<CertificateChain> {
        Err(SignError::Unsupported {
            provider: self.name().to_string(),
            capability: "certificate chain",
        })
    }

    /// Certificates an installer can trust for bundles signed by this
    /// provider. Defaults to the top of the certificate chain.
    fn trust_anchors(&self) -> Result<Vec<Certificate>> {
        Ok(vec![self.certificate_chain()?.last().clone()])
    }

    /// Signing key and chain taken from the same backing store.
    fn signing_identity(&self) -> Result<(RsaPrivateKey, CertificateChain)> {
        Ok((self.signing_key()?, self.certificate_chain()?))
    }
}

impl<P: KeyProvider + ?Sized> KeyProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn signing_key(&self) -> Result<RsaPrivateKey> {
        (**self).signing_key()
    }

    fn public_key(&self) -> Result<RsaPublicKey> {
        (**self).public_key()
    }

    fn certificate_chain(&self) -> Result<CertificateChain> {
        (**self).certificate_chain()
    }

    fn trust_anchors(&self) -> Result<Vec<Certificate>> {
        (**self).trust_anchors()
    }

    fn signing_identity(&self) -> Result<(RsaPrivateKey, CertificateChain)> {
        (**self).signing_identity()
    }
}

/// Key material already held in memory, e.g. freshly generated.
#[derive(Debug, Clone)]
pub struct StaticKeyProvider {
    name: String,
    key: RsaPrivateKey,
    chain: CertificateChain,
}

impl StaticKeyProvider {
    pub fn new(name: impl Into<String>, key: RsaPrivateKey, chain: CertificateChain) -> Self {
        Self {
            name: name.into(),
            key,
            chain,
        }
    }
}

impl KeyProvider for StaticKeyProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn signing_key(&self) -> Result<RsaPrivateKey> {
        Ok(self.key.clone())
    }

    fn certificate_chain(&self) -> Result<CertificateChain> {
        Ok(self.chain.clone())
    }
}
