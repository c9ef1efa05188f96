//! Password-protected keystore files.
//!
//! A keystore is a JSON document mapping aliases to entries. Private key
//! entries hold a password-encrypted PKCS8 PEM key plus its certificate
//! chain; certificate entries hold a single trusted certificate.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::certs::chain::{Certificate, CertificateChain, parse_certificates};
use crate::certs::issuer::CertificateIssuer;
use crate::error::{Result, SignError};
use crate::identity::DeveloperIdentity;
use crate::keys::KeyProvider;
use crate::keys::material::{decode_private_key_with_password, encrypted_private_key_to_pem};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum KeyStoreEntry {
    PrivateKey { key: String, chain: Vec<String> },
    TrustedCertificate { certificate: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStore {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, KeyStoreEntry>,
}

impl Default for KeyStore {
    fn default() -> Self {
        Self {
            version: FORMAT_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl KeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let store: Self = serde_json::from_str(&content).map_err(|err| {
            SignError::Config(format!("invalid keystore {}: {err}", path.display()))
        })?;
        if store.version != FORMAT_VERSION {
            return Err(SignError::Config(format!(
                "unsupported keystore version {} in {}",
                store.version,
                path.display()
            )));
        }
        Ok(store)
    }

    /// Load `path`, or start empty when it does not exist yet.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::new())
        }
    }

    /// Atomically replace `path` with this keystore.
    pub fn save(&self, path: &Path) -> Result<()> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;

        let json = serde_json::to_string_pretty(self)?;
        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(json.as_bytes())?;
        temp.flush()?;
        temp.persist(path).map_err(|err| SignError::Io(err.error))?;
        debug!(path = %path.display(), entries = self.entries.len(), "saved keystore");
        Ok(())
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    pub fn is_key_entry(&self, alias: &str) -> bool {
        matches!(self.entries.get(alias), Some(KeyStoreEntry::PrivateKey { .. }))
    }

    pub fn set_key_entry(
        &mut self,
        alias: impl Into<String>,
        key: &RsaPrivateKey,
        password: &str,
        chain: &CertificateChain,
    ) -> Result<()> {
        let entry = KeyStoreEntry::PrivateKey {
            key: encrypted_private_key_to_pem(key, password)?,
            chain: chain.iter().map(Certificate::to_pem).collect::<Result<_>>()?,
        };
        self.entries.insert(alias.into(), entry);
        Ok(())
    }

    pub fn set_certificate_entry(
        &mut self,
        alias: impl Into<String>,
        cert: &Certificate,
    ) -> Result<()> {
        self.entries.insert(
            alias.into(),
            KeyStoreEntry::TrustedCertificate {
                certificate: cert.to_pem()?,
            },
        );
        Ok(())
    }

    fn entry(&self, alias: &str) -> Result<&KeyStoreEntry> {
        self.entries
            .get(alias)
            .ok_or_else(|| SignError::KeyNotFound(format!("keystore has no entry {alias}")))
    }

    pub fn private_key(&self, alias: &str, password: &str) -> Result<RsaPrivateKey> {
        match self.entry(alias)? {
            KeyStoreEntry::PrivateKey { key, .. } => {
                decode_private_key_with_password(key.as_bytes(), Some(password))
            }
            KeyStoreEntry::TrustedCertificate { .. } => Err(SignError::KeyNotFound(format!(
                "keystore entry {alias} is a certificate, not a private key"
            ))),
        }
    }

    /// Chain of a key entry, or the single certificate of a certificate entry.
    pub fn certificate_chain(&self, alias: &str) -> Result<CertificateChain> {
        let pems: Vec<&String> = match self.entry(alias)? {
            KeyStoreEntry::PrivateKey { chain, .. } => chain.iter().collect(),
            KeyStoreEntry::TrustedCertificate { certificate } => vec![certificate],
        };
        let mut certs = Vec::with_capacity(pems.len());
        for pem in pems {
            certs.extend(parse_certificates(pem.as_bytes())?);
        }
        if certs.is_empty() {
            return Err(SignError::KeyNotFound(format!(
                "keystore entry {alias} has no certificate"
            )));
        }
        CertificateChain::new(certs)
    }
}

/// Key provider over a keystore file.
#[derive(Debug, Clone)]
pub struct KeyStoreKeyProvider {
    path: PathBuf,
    password: String,
    key_alias: String,
    certificate_alias: String,
    ca_alias: Option<String>,
}

impl KeyStoreKeyProvider {
    pub fn new(
        path: impl Into<PathBuf>,
        password: impl Into<String>,
        alias: impl Into<String>,
    ) -> Self {
        let alias = alias.into();
        Self {
            path: path.into(),
            password: password.into(),
            certificate_alias: alias.clone(),
            key_alias: alias,
            ca_alias: None,
        }
    }

    #[must_use]
    pub fn with_certificate_alias(mut self, alias: impl Into<String>) -> Self {
        self.certificate_alias = alias.into();
        self
    }

    #[must_use]
    pub fn with_ca_alias(mut self, alias: impl Into<String>) -> Self {
        self.ca_alias = Some(alias.into());
        self
    }

    fn open(&self) -> Result<KeyStore> {
        if !self.path.exists() {
            return Err(SignError::KeyNotFound(format!(
                "keystore {} does not exist",
                self.path.display()
            )));
        }
        KeyStore::load(&self.path)
    }

    fn ca_certificate(&self, store: &KeyStore) -> Result<Option<Certificate>> {
        let Some(alias) = &self.ca_alias else {
            return Ok(None);
        };
        Ok(Some(store.certificate_chain(alias)?.leaf().clone()))
    }
}

impl KeyProvider for KeyStoreKeyProvider {
    fn name(&self) -> &str {
        "keystore"
    }

    fn signing_key(&self) -> Result<RsaPrivateKey> {
        self.open()?.private_key(&self.key_alias, &self.password)
    }

    fn certificate_chain(&self) -> Result<CertificateChain> {
        let store = self.open()?;
        let mut chain = store.certificate_chain(&self.certificate_alias)?;
        if let Some(ca) = self.ca_certificate(&store)? {
            if !chain.certificates().contains(&ca) {
                chain.extend([ca]);
            }
        }
        Ok(chain)
    }

    fn trust_anchors(&self) -> Result<Vec<Certificate>> {
        let store = self.open()?;
        if let Some(ca) = self.ca_certificate(&store)? {
            return Ok(vec![ca]);
        }
        Ok(vec![store.certificate_chain(&self.certificate_alias)?.last().clone()])
    }
}

/// Per-developer keystore keyed by identity URL, generating a self-signed
/// key pair on first use.
#[derive(Debug, Clone)]
pub struct DeveloperKeyStore {
    path: PathBuf,
    password: String,
    issuer: CertificateIssuer,
}

impl DeveloperKeyStore {
    pub fn new(path: impl Into<PathBuf>, password: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            password: password.into(),
            issuer: CertificateIssuer::new(),
        }
    }

    #[must_use]
    pub const fn with_issuer(mut self, issuer: CertificateIssuer) -> Self {
        self.issuer = issuer;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Find the key pair stored under the identity URL or any alias URL.
    /// When none exists and `generate` is set, issue a self-signed pair,
    /// store it under the identity URL and persist the keystore.
    pub fn get_key_pair(
        &self,
        identity: &DeveloperIdentity,
        generate: bool,
    ) -> Result<Option<(RsaPrivateKey, CertificateChain)>> {
        let mut store = KeyStore::load_or_default(&self.path)?;

        for alias in identity.candidate_aliases() {
            if store.is_key_entry(alias) {
                debug!(alias, "found developer key pair");
                let key = store.private_key(alias, &self.password)?;
                let chain = store.certificate_chain(alias)?;
                return Ok(Some((key, chain)));
            }
        }

        if !generate {
            return Ok(None);
        }

        let alias = identity.identity_url.as_deref().ok_or_else(|| {
            SignError::ValidationFailed(
                "developer identity needs an identity URL to store a generated key".to_string(),
            )
        })?;

        info!(alias, "generating developer key pair");
        let key = self.issuer.generate_key_pair()?;
        let cert = self.issuer.issue_self_signed(identity, &key)?;
        let chain = CertificateChain::single(cert);
        store.set_key_entry(alias, &key, &self.password, &chain)?;
        store.save(&self.path)?;
        Ok(Some((key, chain)))
    }
}
