use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SignError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Keychain error: {0}")]
    Keychain(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Every key provider failed:\n  {}", .0.join("\n  "))]
    AllProvidersFailed(Vec<String>),

    #[error("Not supported by {provider}: {capability}")]
    Unsupported {
        provider: String,
        capability: &'static str,
    },

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Cryptographic error: {0}")]
    Crypto(String),

    #[error("Invalid manifest: {0}")]
    Manifest(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

impl From<rsa::Error> for SignError {
    fn from(err: rsa::Error) -> Self {
        Self::Crypto(err.to_string())
    }
}

impl From<rsa::signature::Error> for SignError {
    fn from(err: rsa::signature::Error) -> Self {
        Self::Crypto(err.to_string())
    }
}

impl From<rcgen::Error> for SignError {
    fn from(err: rcgen::Error) -> Self {
        Self::Certificate(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SignError>;
