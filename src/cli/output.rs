use chrono::{DateTime, Utc};
use console::style;
use serde::Serialize;

use crate::error::{Result, SignError};

/// Envelope for `--json` output.
#[derive(Serialize)]
pub struct JsonResponse<T> {
    pub status: JsonStatus,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub data: T,
}

#[derive(Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JsonStatus {
    Ok,
    Error { code: String, message: String },
}

pub fn json_ok<T: Serialize>(data: T) -> JsonResponse<T> {
    JsonResponse {
        status: JsonStatus::Ok,
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data,
    }
}

pub fn json_error(err: &SignError) -> JsonResponse<serde_json::Value> {
    JsonResponse {
        status: JsonStatus::Error {
            code: error_code(err).to_string(),
            message: err.to_string(),
        },
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        data: serde_json::Value::Null,
    }
}

/// Stable machine-readable code for an error.
pub const fn error_code(err: &SignError) -> &'static str {
    match err {
        SignError::Io(_) | SignError::Walk(_) => "IO_ERROR",
        SignError::Json(_) => "JSON_ERROR",
        SignError::Config(_) => "CONFIG_ERROR",
        SignError::KeyNotFound(_) => "KEY_NOT_FOUND",
        SignError::InvalidKey(_) => "INVALID_KEY",
        SignError::Keychain(_) => "KEYCHAIN_ERROR",
        SignError::Timeout(_) => "TIMEOUT",
        SignError::AllProvidersFailed(_) => "ALL_PROVIDERS_FAILED",
        SignError::Unsupported { .. } => "UNSUPPORTED",
        SignError::Certificate(_) => "CERTIFICATE_ERROR",
        SignError::Crypto(_) => "CRYPTO_ERROR",
        SignError::Manifest(_) => "INVALID_MANIFEST",
        SignError::ValidationFailed(_) => "VALIDATION_FAILED",
    }
}

pub fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value)?;
    println!("{payload}");
    Ok(())
}

pub struct HumanLayout {
    lines: Vec<String>,
    key_width: usize,
}

impl Default for HumanLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl HumanLayout {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            lines: Vec::new(),
            key_width: 14,
        }
    }

    pub fn title(&mut self, text: &str) -> &mut Self {
        self.lines.push(style(text).bold().to_string());
        self.lines.push(String::new());
        self
    }

    pub fn kv(&mut self, key: &str, value: &str) -> &mut Self {
        let key_style = style(format!("{key:width$}", width = self.key_width)).dim();
        self.lines.push(format!("{key_style} {value}"));
        self
    }

    pub fn push_line(&mut self, line: impl Into<String>) -> &mut Self {
        self.lines.push(line.into());
        self
    }

    #[must_use]
    pub fn build(self) -> String {
        self.lines.join("\n")
    }
}

pub fn emit_human(layout: HumanLayout) {
    println!("{}", layout.build());
}
