//! How a manifest's signing timestamp relates to the leaf certificate's
//! validity window.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::certs::chain::Certificate;
use crate::error::{Result, SignError};

/// `yyyy-MM-dd'T'HH:mm:ss'Z'`, always UTC.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidityPolicy {
    /// Never consult the certificate validity window.
    Ignore,
    /// Check the window when the manifest carries a timestamp.
    #[default]
    IfPresent,
    /// The manifest must carry a timestamp inside the window.
    Required,
}

impl FromStr for ValidityPolicy {
    type Err = SignError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "ignore" => Ok(Self::Ignore),
            "if_present" => Ok(Self::IfPresent),
            "required" => Ok(Self::Required),
            _ => Err(SignError::Config(format!(
                "invalid validity policy {s} (expected ignore|if_present|required)"
            ))),
        }
    }
}

impl std::fmt::Display for ValidityPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ignore => write!(f, "ignore"),
            Self::IfPresent => write!(f, "if_present"),
            Self::Required => write!(f, "required"),
        }
    }
}

/// Outcome of applying a [`ValidityPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidityCheck {
    Valid,
    Skipped,
    MissingTimestamp,
    OutsideWindow,
}

impl ValidityCheck {
    pub const fn is_acceptable(self) -> bool {
        matches!(self, Self::Valid | Self::Skipped)
    }
}

impl ValidityPolicy {
    pub fn check(self, leaf: &Certificate, timestamp: Option<&str>) -> Result<ValidityCheck> {
        match (self, timestamp) {
            (Self::Ignore, _) => Ok(ValidityCheck::Skipped),
            (Self::IfPresent, None) => Ok(ValidityCheck::Skipped),
            (Self::Required, None) => Ok(ValidityCheck::MissingTimestamp),
            (_, Some(raw)) => {
                let signed_at = parse_timestamp(raw)?;
                if leaf.is_valid_at(signed_at)? {
                    Ok(ValidityCheck::Valid)
                } else {
                    Ok(ValidityCheck::OutsideWindow)
                }
            }
        }
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|err| SignError::Manifest(format!("invalid timestamp {raw}: {err}")))
}
