//! Default provider chain built from configuration.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::config::KeysConfig;
use crate::keys::keychain::{KeyringStore, SecretStore};
use crate::keys::{CompositeKeyProvider, EnvKeyProvider, KeyStoreKeyProvider, KeychainKeyProvider};

/// Environment first, then the keystore (when the file exists and an alias
/// and password are configured), then the OS keychain on macOS and Windows
/// (when an alias is configured).
pub fn create_key_provider(config: &KeysConfig) -> CompositeKeyProvider {
    let keychain_backend: Option<Arc<dyn SecretStore>> =
        if cfg!(any(target_os = "macos", target_os = "windows")) {
            Some(Arc::new(KeyringStore::new(config.keychain_service.clone())))
        } else {
            None
        };
    build(config, EnvKeyProvider::new(), keychain_backend)
}

pub(crate) fn build(
    config: &KeysConfig,
    env: EnvKeyProvider,
    keychain_backend: Option<Arc<dyn SecretStore>>,
) -> CompositeKeyProvider {
    let mut composite = CompositeKeyProvider::default();
    composite.push(env);
    debug!("registered environment key provider");

    if let (Some(path), Some(alias), Some(password)) = (
        config.resolved_keystore_path(),
        config.developer_id.as_deref(),
        config.keystore_password.as_deref(),
    ) {
        if path.exists() {
            let mut provider = KeyStoreKeyProvider::new(&path, password, alias);
            if let Some(ca) = &config.ca_id {
                provider = provider.with_ca_alias(ca.clone());
            }
            debug!(path = %path.display(), alias, "registered keystore key provider");
            composite.push(provider);
        } else {
            debug!(path = %path.display(), "keystore not found, skipping");
        }
    }

    if let (Some(backend), Some(alias)) = (keychain_backend, config.developer_id.as_deref()) {
        let mut provider = KeychainKeyProvider::new(alias)
            .with_backend(backend)
            .with_timeout(config.keychain_timeout_ms.map(Duration::from_millis));
        if let Some(ca) = &config.ca_id {
            provider = provider.with_ca_alias(ca.clone());
        }
        if let Some(password) = &config.keystore_password {
            provider = provider.with_password(password.clone());
        }
        debug!(alias, "registered keychain key provider");
        composite.push(provider);
    }

    composite
}
