//! Keys held in the operating system's credential store.
//!
//! An entry is PEM text: one private key block (optionally
//! password-encrypted) followed by the certificate chain, leaf first. An
//! optional second alias holds the developer CA certificate. Windows probes
//! the `personal` store and then `root`; macOS uses the `login` keychain.
//!
//! OS credential prompts can block indefinitely, so lookups may run on a
//! worker thread bounded by a timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use parking_lot::Mutex;
use rsa::RsaPrivateKey;
use tracing::{debug, warn};

use crate::certs::chain::{Certificate, CertificateChain, parse_certificates};
use crate::error::{Result, SignError};
use crate::keys::KeyProvider;
use crate::keys::material::decode_private_key_with_password;

/// Default keyring service prefix; the store name is appended.
pub const DEFAULT_SERVICE: &str = "jdeploy-sign";

/// Store names probed on this platform, in order.
pub fn platform_stores() -> Vec<String> {
    let stores: &[&str] = if cfg!(target_os = "windows") {
        &["personal", "root"]
    } else if cfg!(target_os = "macos") {
        &["login"]
    } else {
        &["default"]
    };
    stores.iter().map(|s| (*s).to_string()).collect()
}

/// Backend that resolves `(store, alias)` to stored PEM text.
pub trait SecretStore: Send + Sync {
    fn get(&self, store: &str, alias: &str) -> Result<Option<String>>;
    fn set(&self, store: &str, alias: &str, secret: &str) -> Result<()>;
}

/// The platform keyring (Keychain, Credential Manager, Secret Service).
#[derive(Debug, Clone)]
pub struct KeyringStore {
    service: String,
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new(DEFAULT_SERVICE)
    }
}

impl KeyringStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, store: &str, alias: &str) -> Result<keyring::Entry> {
        keyring::Entry::new(&format!("{}.{store}", self.service), alias)
            .map_err(|err| SignError::Keychain(format!("open entry {alias} in {store}: {err}")))
    }
}

impl SecretStore for KeyringStore {
    fn get(&self, store: &str, alias: &str) -> Result<Option<String>> {
        match self.entry(store, alias)?.get_password() {
            Ok(secret) => Ok(Some(secret)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(SignError::Keychain(format!(
                "read {alias} from {store}: {err}"
            ))),
        }
    }

    fn set(&self, store: &str, alias: &str, secret: &str) -> Result<()> {
        self.entry(store, alias)?
            .set_password(secret)
            .map_err(|err| SignError::Keychain(format!("write {alias} to {store}: {err}")))
    }
}

/// Process-local store for tests and embedding.
#[derive(Debug, Default)]
pub struct MemorySecretStore {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for MemorySecretStore {
    fn get(&self, store: &str, alias: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .lock()
            .get(&(store.to_string(), alias.to_string()))
            .cloned())
    }

    fn set(&self, store: &str, alias: &str, secret: &str) -> Result<()> {
        self.entries
            .lock()
            .insert((store.to_string(), alias.to_string()), secret.to_string());
        Ok(())
    }
}

pub struct KeychainKeyProvider {
    alias: String,
    ca_alias: Option<String>,
    password: Option<String>,
    stores: Vec<String>,
    backend: Arc<dyn SecretStore>,
    timeout: Option<Duration>,
}

impl KeychainKeyProvider {
    pub fn new(alias: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            ca_alias: None,
            password: None,
            stores: platform_stores(),
            backend: Arc::new(KeyringStore::default()),
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn SecretStore>) -> Self {
        self.backend = backend;
        self
    }

    #[must_use]
    pub fn with_stores(mut self, stores: Vec<String>) -> Self {
        self.stores = stores;
        self
    }

    #[must_use]
    pub fn with_ca_alias(mut self, alias: impl Into<String>) -> Self {
        self.ca_alias = Some(alias.into());
        self
    }

    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn fetch(&self, alias: &str) -> Result<String> {
        for store in &self.stores {
            if let Some(secret) = self.lookup(store, alias)? {
                debug!(alias, store = %store, "found keychain entry");
                return Ok(secret);
            }
            debug!(alias, store = %store, "keychain entry not in store");
        }
        Err(SignError::KeyNotFound(format!(
            "{alias} not found in keychain stores [{}]",
            self.stores.join(", ")
        )))
    }

    fn lookup(&self, store: &str, alias: &str) -> Result<Option<String>> {
        let Some(timeout) = self.timeout else {
            return self.backend.get(store, alias);
        };

        let (tx, rx) = crossbeam_channel::bounded(1);
        let backend = Arc::clone(&self.backend);
        let (worker_store, worker_alias) = (store.to_string(), alias.to_string());
        std::thread::Builder::new()
            .name("keychain-lookup".to_string())
            .spawn(move || {
                let _ = tx.send(backend.get(&worker_store, &worker_alias));
            })?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                // The worker stays blocked on the OS prompt; its result is dropped.
                warn!(alias, store, ?timeout, "keychain lookup timed out");
                Err(SignError::Timeout(format!(
                    "keychain lookup of {alias} in {store} exceeded {}ms",
                    timeout.as_millis()
                )))
            }
            Err(RecvTimeoutError::Disconnected) => Err(SignError::Keychain(
                "keychain lookup thread exited without a result".to_string(),
            )),
        }
    }

    fn ca_certificates(&self) -> Result<Vec<Certificate>> {
        let Some(ca_alias) = &self.ca_alias else {
            return Ok(Vec::new());
        };
        let certs = parse_certificates(self.fetch(ca_alias)?.as_bytes())?;
        if certs.is_empty() {
            return Err(SignError::KeyNotFound(format!(
                "keychain entry {ca_alias} holds no certificate"
            )));
        }
        Ok(certs)
    }
}

impl KeyProvider for KeychainKeyProvider {
    fn name(&self) -> &str {
        "keychain"
    }

    fn signing_key(&self) -> Result<RsaPrivateKey> {
        let secret = self.fetch(&self.alias)?;
        decode_private_key_with_password(secret.as_bytes(), self.password.as_deref())
    }

    fn certificate_chain(&self) -> Result<CertificateChain> {
        let certs = parse_certificates(self.fetch(&self.alias)?.as_bytes())?;
        if certs.is_empty() {
            return Err(SignError::KeyNotFound(format!(
                "keychain entry {} holds no certificate",
                self.alias
            )));
        }
        let mut chain = CertificateChain::new(certs)?;
        for ca in self.ca_certificates()? {
            if !chain.certificates().contains(&ca) {
                chain.extend([ca]);
            }
        }
        Ok(chain)
    }

    fn trust_anchors(&self) -> Result<Vec<Certificate>> {
        let cas = self.ca_certificates()?;
        if !cas.is_empty() {
            return Ok(cas);
        }
        Ok(vec![self.certificate_chain()?.last().clone()])
    }
}
