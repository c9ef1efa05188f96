//! Keys supplied through environment variables.
//!
//! Each variable holds either inline PEM text or a path to a PEM/DER file.

use std::collections::HashMap;
use std::path::Path;

use rsa::{RsaPrivateKey, RsaPublicKey};
use tracing::debug;

use crate::certs::chain::{Certificate, CertificateChain, parse_certificates};
use crate::error::{Result, SignError};
use crate::keys::KeyProvider;
use crate::keys::material::{decode_private_key, decode_public_key};

pub const PRIVATE_KEY_VAR: &str = "JDEPLOY_PRIVATE_KEY";
pub const PUBLIC_KEY_VAR: &str = "JDEPLOY_PUBLIC_KEY";
pub const CERTIFICATE_VAR: &str = "JDEPLOY_CERTIFICATE";
pub const ROOT_CERTIFICATE_VAR: &str = "JDEPLOY_ROOT_CERTIFICATE";

const PEM_HEADER: &str = "-----BEGIN ";

/// Source of variable lookups, so tests need not mutate the process env.
pub trait EnvSource: Send + Sync {
    fn var(&self, key: &str) -> Option<String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|value| !value.trim().is_empty())
    }
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).filter(|value| !value.trim().is_empty()).cloned()
    }
}

pub struct EnvKeyProvider {
    source: Box<dyn EnvSource>,
}

impl Default for EnvKeyProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvKeyProvider {
    pub fn new() -> Self {
        Self::with_source(ProcessEnv)
    }

    pub fn with_source(source: impl EnvSource + 'static) -> Self {
        Self {
            source: Box::new(source),
        }
    }

    fn required(&self, key: &str) -> Result<Vec<u8>> {
        let value = self
            .source
            .var(key)
            .ok_or_else(|| SignError::KeyNotFound(format!("environment variable {key} is not set")))?;
        load_material(key, &value)
    }

    fn optional(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.source
            .var(key)
            .map(|value| load_material(key, &value))
            .transpose()
    }

    fn root_certificate(&self) -> Result<Option<Certificate>> {
        let Some(bytes) = self.optional(ROOT_CERTIFICATE_VAR)? else {
            return Ok(None);
        };
        let mut certs = parse_certificates(&bytes)?;
        if certs.len() != 1 {
            return Err(SignError::Certificate(format!(
                "{ROOT_CERTIFICATE_VAR} must hold exactly one certificate, found {}",
                certs.len()
            )));
        }
        Ok(certs.pop())
    }
}

impl KeyProvider for EnvKeyProvider {
    fn name(&self) -> &str {
        "environment"
    }

    fn signing_key(&self) -> Result<RsaPrivateKey> {
        decode_private_key(&self.required(PRIVATE_KEY_VAR)?)
    }

    fn public_key(&self) -> Result<RsaPublicKey> {
        if let Some(bytes) = self.optional(PUBLIC_KEY_VAR)? {
            return decode_public_key(&bytes);
        }
        match self.certificate_chain() {
            Ok(chain) => chain.leaf().public_key(),
            Err(_) => Ok(RsaPublicKey::from(&self.signing_key()?)),
        }
    }

    fn certificate_chain(&self) -> Result<CertificateChain> {
        let bytes = self.required(CERTIFICATE_VAR)?;
        let mut chain = CertificateChain::new(parse_certificates(&bytes)?)?;
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

fn is_inline_pem(value: &str) -> bool {
    value.trim_start().starts_with(PEM_HEADER)
}

/// Inline PEM is used as-is; anything else is treated as a file path.
fn load_material(key: &str, value: &str) -> Result<Vec<u8>> {
    if is_inline_pem(value) {
        return Ok(value.trim_start().as_bytes().to_vec());
    }

    let path = Path::new(value.trim());
    debug!(variable = key, path = %path.display(), "reading key material from file");
    std::fs::read(path).map_err(|err| {
        SignError::KeyNotFound(format!("{key} points at {}: {err}", path.display()))
    })
}
