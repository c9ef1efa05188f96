use std::path::{Path, PathBuf};

use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::certs::chain::{Certificate, CertificateChain, parse_certificates};
use crate::error::{Result, SignError};
use crate::keys::KeyProvider;
use crate::keys::material::{decode_private_key, decode_public_key};

/// Keys read from files on disk: a PKCS8 private key, an optional X509
/// public key and optional certificates.
#[derive(Debug, Clone)]
pub struct FileKeyProvider {
    private_key_path: PathBuf,
    public_key_path: Option<PathBuf>,
    certificate_path: Option<PathBuf>,
    root_certificate_path: Option<PathBuf>,
}

impl FileKeyProvider {
    /// PKCS8 private key and X509 public key paths.
    pub fn new(private_key_path: impl Into<PathBuf>, public_key_path: impl Into<PathBuf>) -> Self {
        Self {
            public_key_path: Some(public_key_path.into()),
            ..Self::from_private_key(private_key_path)
        }
    }

    /// Only a private key; the public key comes from the certificate or is
    /// derived from the private key.
    pub fn from_private_key(private_key_path: impl Into<PathBuf>) -> Self {
        Self {
            private_key_path: private_key_path.into(),
            public_key_path: None,
            certificate_path: None,
            root_certificate_path: None,
        }
    }

    #[must_use]
    pub fn with_certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.certificate_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_root_certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.root_certificate_path = Some(path.into());
        self
    }

    fn root_certificate(&self) -> Result<Option<Certificate>> {
        let Some(path) = &self.root_certificate_path else {
            return Ok(None);
        };
        let mut certs = parse_certificates(&read(path)?)?;
        if certs.len() != 1 {
            return Err(SignError::Certificate(format!(
                "{} must hold exactly one certificate",
                path.display()
            )));
        }
        Ok(certs.pop())
    }
}

impl KeyProvider for FileKeyProvider {
    fn name(&self) -> &str {
        "file"
    }

    fn signing_key(&self) -> Result<RsaPrivateKey> {
        decode_private_key(&read(&self.private_key_path)?)
    }

    fn public_key(&self) -> Result<RsaPublicKey> {
        if let Some(path) = &self.public_key_path {
            return decode_public_key(&read(path)?);
        }
        match self.certificate_chain() {
            Ok(chain) => chain.leaf().public_key(),
            Err(_) => Ok(RsaPublicKey::from(&self.signing_key()?)),
        }
    }

    fn certificate_chain(&self) -> Result<CertificateChain> {
        let path = self.certificate_path.as_ref().ok_or_else(|| SignError::Unsupported {
            provider: self.name().to_string(),
            capability: "certificate chain (no certificate file configured)",
        })?;
        let mut chain = CertificateChain::new(parse_certificates(&read(path)?)?)?;
        if let Some(root) = self.root_certificate()? {
            if chain.last() != &root {
                chain.extend([root]);
            }
        }
        Ok(chain)
    }

    fn trust_anchors(&self) -> Result<Vec<Certificate>> {
        if let Some(root) = self.root_certificate()? {
            return Ok(vec![root]);
        }
        Ok(vec![self.certificate_chain()?.last().clone()])
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path)
        .map_err(|err| SignError::KeyNotFound(format!("cannot read {}: {err}", path.display())))
}
