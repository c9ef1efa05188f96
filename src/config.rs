use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::certs::validity::ValidityPolicy;
use crate::error::{Result, SignError};
use crate::keys::env::{EnvSource, ProcessEnv};

pub const CONFIG_ENV: &str = "JDEPLOY_SIGN_CONFIG";
pub const PROJECT_CONFIG_FILE: &str = "jdeploy-sign.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub keys: KeysConfig,
    #[serde(default)]
    pub signing: SigningConfig,
    #[serde(default)]
    pub verify: VerifyConfig,
}

impl Config {
    /// Explicit path (or `JDEPLOY_SIGN_CONFIG`) wins; otherwise the global
    /// config is merged with `<project_root>/jdeploy-sign.toml`. Environment
    /// overrides apply last.
    pub fn load(explicit_path: Option<&Path>, project_root: &Path) -> Result<Self> {
        Self::load_with_env(explicit_path, project_root, &ProcessEnv)
    }

    pub fn load_with_env(
        explicit_path: Option<&Path>,
        project_root: &Path,
        env: &dyn EnvSource,
    ) -> Result<Self> {
        let mut config = Self::default();

        let explicit = explicit_path
            .map(PathBuf::from)
            .or_else(|| env.var(CONFIG_ENV).map(PathBuf::from));

        if let Some(path) = explicit {
            let patch = Self::load_patch(&path)?.ok_or_else(|| {
                SignError::Config(format!("config file {} does not exist", path.display()))
            })?;
            config.merge_patch(patch);
        } else {
            if let Some(global) = Self::load_global()? {
                config.merge_patch(global);
            }
            if let Some(project) = Self::load_patch(&project_root.join(PROJECT_CONFIG_FILE))? {
                config.merge_patch(project);
            }
        }

        config.apply_env_overrides(env)?;

        Ok(config)
    }

    fn load_global() -> Result<Option<ConfigPatch>> {
        let Some(dir) = dirs::config_dir() else {
            return Ok(None);
        };
        Self::load_patch(&dir.join("jdeploy-sign/config.toml"))
    }

    fn load_patch(path: &Path) -> Result<Option<ConfigPatch>> {
        if !path.exists() {
            return Ok(None);
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|err| SignError::Config(format!("read config {}: {err}", path.display())))?;
        let patch = toml::from_str(&raw)
            .map_err(|err| SignError::Config(format!("parse config {}: {err}", path.display())))?;
        Ok(Some(patch))
    }

    fn merge_patch(&mut self, patch: ConfigPatch) {
        if let Some(patch) = patch.keys {
            self.keys.merge(patch);
        }
        if let Some(patch) = patch.signing {
            self.signing.merge(patch);
        }
        if let Some(patch) = patch.verify {
            self.verify.merge(patch);
        }
    }

    pub fn apply_env_overrides(&mut self, env: &dyn EnvSource) -> Result<()> {
        if let Some(value) = env.var("JDEPLOY_KEYSTORE_PATH") {
            self.keys.keystore_path = Some(PathBuf::from(value));
        }
        if let Some(value) = env.var("JDEPLOY_KEYSTORE_PASSWORD") {
            self.keys.keystore_password = Some(value);
        }
        if let Some(value) = env.var("JDEPLOY_DEVELOPER_ID") {
            self.keys.developer_id = Some(value);
        }
        if let Some(value) = env.var("JDEPLOY_DEVELOPER_CA_ID") {
            self.keys.ca_id = Some(value);
        }
        if let Some(value) = env_u64(env, "JDEPLOY_KEYCHAIN_TIMEOUT_MS")? {
            self.keys.keychain_timeout_ms = Some(value);
        }

        if let Some(value) = env_u64(env, "JDEPLOY_SIGN_THREADS")? {
            let threads = usize::try_from(value).map_err(|err| {
                SignError::Config(format!("invalid JDEPLOY_SIGN_THREADS value {value}: {err}"))
            })?;
            self.signing.threads = threads;
            self.verify.threads = threads;
        }
        if let Some(value) = env.var("JDEPLOY_VALIDITY_POLICY") {
            self.verify.validity_policy = value.parse()?;
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeysConfig {
    /// Defaults to `~/.jdeploy/keystore.json` when unset.
    #[serde(default)]
    pub keystore_path: Option<PathBuf>,
    #[serde(default)]
    pub keystore_password: Option<String>,
    /// Key alias in the keystore and keychain.
    #[serde(default)]
    pub developer_id: Option<String>,
    /// Alias of the developer CA certificate.
    #[serde(default)]
    pub ca_id: Option<String>,
    #[serde(default = "default_keychain_service")]
    pub keychain_service: String,
    #[serde(default)]
    pub keychain_timeout_ms: Option<u64>,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            keystore_path: None,
            keystore_password: None,
            developer_id: None,
            ca_id: None,
            keychain_service: default_keychain_service(),
            keychain_timeout_ms: None,
        }
    }
}

fn default_keychain_service() -> String {
    crate::keys::keychain::DEFAULT_SERVICE.to_string()
}

impl KeysConfig {
    fn merge(&mut self, patch: KeysPatch) {
        if let Some(value) = patch.keystore_path {
            self.keystore_path = Some(value);
        }
        if let Some(value) = patch.keystore_password {
            self.keystore_password = Some(value);
        }
        if let Some(value) = patch.developer_id {
            self.developer_id = Some(value);
        }
        if let Some(value) = patch.ca_id {
            self.ca_id = Some(value);
        }
        if let Some(value) = patch.keychain_service {
            self.keychain_service = value;
        }
        if let Some(value) = patch.keychain_timeout_ms {
            self.keychain_timeout_ms = Some(value);
        }
    }

    /// Configured keystore path with `~` expanded, or the default location.
    pub fn resolved_keystore_path(&self) -> Option<PathBuf> {
        match &self.keystore_path {
            Some(path) => Some(expand_home(path)),
            None => dirs::home_dir().map(|home| home.join(".jdeploy").join("keystore.json")),
        }
    }
}

/// `0` means the rayon default (one worker per core).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SigningConfig {
    #[serde(default)]
    pub threads: usize,
}

impl SigningConfig {
    fn merge(&mut self, patch: SigningPatch) {
        if let Some(value) = patch.threads {
            self.threads = value;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerifyConfig {
    #[serde(default)]
    pub validity_policy: ValidityPolicy,
    #[serde(default)]
    pub threads: usize,
}

impl VerifyConfig {
    fn merge(&mut self, patch: VerifyPatch) {
        if let Some(value) = patch.validity_policy {
            self.validity_policy = value;
        }
        if let Some(value) = patch.threads {
            self.threads = value;
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ConfigPatch {
    pub keys: Option<KeysPatch>,
    pub signing: Option<SigningPatch>,
    pub verify: Option<VerifyPatch>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct KeysPatch {
    pub keystore_path: Option<PathBuf>,
    pub keystore_password: Option<String>,
    pub developer_id: Option<String>,
    pub ca_id: Option<String>,
    pub keychain_service: Option<String>,
    pub keychain_timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct SigningPatch {
    pub threads: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct VerifyPatch {
    pub validity_policy: Option<ValidityPolicy>,
    pub threads: Option<usize>,
}

fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

fn env_u64(env: &dyn EnvSource, key: &str) -> Result<Option<u64>> {
    match env.var(key) {
        Some(value) => value.trim().parse::<u64>().map(Some).map_err(|err| {
            SignError::Config(format!("invalid {key} value {value}: {err}"))
        }),
        None => Ok(None),
    }
}
