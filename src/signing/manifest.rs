//! The signed manifest: bundle-relative paths mapped to per-file hash and
//! signature, plus the signing timestamp.
//!
//! On disk the manifest is a single JSON object with sorted keys and a
//! 4-space indent. Path keys map to `{"hash", "signature"}` objects; the
//! reserved `timestamp` key holds a string.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::ser::PrettyFormatter;

use crate::error::{Result, SignError};

pub const MANIFEST_FILE: &str = "jdeploy.mf";
pub const SIGNATURE_FILE: &str = "jdeploy.mf.sig";
pub const CERTIFICATE_FILE: &str = "jdeploy.cer";
pub const TIMESTAMP_KEY: &str = "timestamp";

/// The three files signing adds to the bundle root.
pub const ARTIFACT_FILES: [&str; 3] = [MANIFEST_FILE, SIGNATURE_FILE, CERTIFICATE_FILE];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Lowercase hex SHA-256 of the file bytes.
    pub hash: String,
    /// Lowercase hex RSA-SHA256 signature over the raw hash bytes.
    pub signature: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub timestamp: Option<String>,
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        let mut object: BTreeMap<&str, Value> = BTreeMap::new();
        for (path, entry) in &self.entries {
            object.insert(path.as_str(), serde_json::to_value(entry)?);
        }
        if let Some(timestamp) = &self.timestamp {
            object.insert(TIMESTAMP_KEY, Value::String(timestamp.clone()));
        }

        let mut out = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        object.serialize(&mut serializer)?;
        Ok(out)
    }

    pub fn from_json_bytes(bytes: &[u8]) -> Result<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|err| SignError::Manifest(format!("not valid JSON: {err}")))?;
        let Value::Object(object) = value else {
            return Err(SignError::Manifest("expected a JSON object".to_string()));
        };

        let mut manifest = Self::new();
        for (key, value) in object {
            if key == TIMESTAMP_KEY {
                let Value::String(timestamp) = value else {
                    return Err(SignError::Manifest("timestamp must be a string".to_string()));
                };
                manifest.timestamp = Some(timestamp);
                continue;
            }
            let entry: ManifestEntry = serde_json::from_value(value)
                .map_err(|err| SignError::Manifest(format!("entry {key}: {err}")))?;
            manifest.entries.insert(key, entry);
        }
        Ok(manifest)
    }
}

/// POSIX-style key for `path` relative to `root`.
pub fn relative_key(root: &Path, path: &Path) -> Result<String> {
    let relative = path.strip_prefix(root).map_err(|_| {
        SignError::ValidationFailed(format!(
            "{} is outside {}",
            path.display(),
            root.display()
        ))
    })?;

    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str().ok_or_else(|| {
                SignError::ValidationFailed(format!(
                    "file name is not valid UTF-8: {}",
                    relative.display()
                ))
            })?),
            _ => {
                return Err(SignError::ValidationFailed(format!(
                    "unexpected path component in {}",
                    relative.display()
                )));
            }
        }
    }
    if parts.is_empty() {
        return Err(SignError::ValidationFailed("empty relative path".to_string()));
    }
    Ok(parts.join("/"))
}

/// Convert a manifest key back into a relative path, rejecting anything
/// that could resolve outside the bundle.
pub fn entry_path(key: &str) -> Result<PathBuf> {
    if key.is_empty() || key.contains('\\') || key.contains('\0') {
        return Err(SignError::ValidationFailed(format!(
            "invalid manifest path: {key:?}"
        )));
    }

    let mut path = PathBuf::new();
    for segment in key.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(SignError::ValidationFailed(format!(
                "manifest path contains invalid segment: {key}"
            )));
        }
        path.push(segment);
    }

    if path.is_absolute() {
        return Err(SignError::ValidationFailed(format!(
            "manifest path must be relative: {key}"
        )));
    }
    for component in path.components() {
        if !matches!(component, Component::Normal(_)) {
            return Err(SignError::ValidationFailed(format!(
                "manifest path contains invalid component: {key}"
            )));
        }
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(hash: &str) -> ManifestEntry {
        ManifestEntry {
            hash: hash.to_string(),
            signature: "00ff".to_string(),
        }
    }

    #[test]
    fn serializes_sorted_with_four_space_indent() {
        let mut manifest = Manifest::new();
        manifest.entries.insert("z.txt".to_string(), entry("bb"));
        manifest.entries.insert("a/b.txt".to_string(), entry("aa"));
        manifest.timestamp = Some("2024-01-01T00:00:00Z".to_string());

        let json = String::from_utf8(manifest.to_json_bytes().unwrap()).unwrap();
        let expected = r#"{
    "a/b.txt": {
        "hash": "aa",
        "signature": "00ff"
    },
    "timestamp": "2024-01-01T00:00:00Z",
    "z.txt": {
        "hash": "bb",
        "signature": "00ff"
    }
}"#;
        assert_eq!(json, expected);
        assert_eq!(Manifest::from_json_bytes(json.as_bytes()).unwrap(), manifest);
    }

    #[test]
    fn timestamp_is_optional() {
        let manifest =
            Manifest::from_json_bytes(br#"{"a.txt": {"hash": "aa", "signature": "bb"}}"#).unwrap();
        assert!(manifest.timestamp.is_none());
        assert_eq!(manifest.len(), 1);
    }

    #[test]
    fn rejects_non_object_and_bad_entries() {
        assert!(Manifest::from_json_bytes(b"[]").is_err());
        assert!(Manifest::from_json_bytes(b"not json").is_err());
        assert!(Manifest::from_json_bytes(br#"{"a.txt": "oops"}"#).is_err());
        assert!(Manifest::from_json_bytes(br#"{"timestamp": 5}"#).is_err());
    }

    #[test]
    fn relative_keys_use_forward_slashes() {
        let root = Path::new("bundle");
        let path = root.join("lib").join("app.jar");
        assert_eq!(relative_key(root, &path).unwrap(), "lib/app.jar");
        assert!(relative_key(root, root).is_err());
        assert!(relative_key(root, Path::new("elsewhere/file")).is_err());
    }

    #[test]
    fn entry_path_rejects_traversal() {
        assert_eq!(
            entry_path("lib/app.jar").unwrap(),
            Path::new("lib").join("app.jar")
        );
        for bad in ["", "../secret", "lib/../../x", "/etc/passwd", "a//b", "./a", "a\\b"] {
            assert!(entry_path(bad).is_err(), "{bad:?} should be rejected");
        }
    }
}
