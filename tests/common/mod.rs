//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::OnceLock;

use jdeploy_sign::certs::{CertificateChain, CertificateIssuer};
use jdeploy_sign::identity::DeveloperIdentity;
use jdeploy_sign::keys::StaticKeyProvider;
use rsa::RsaPrivateKey;
use tempfile::TempDir;

static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();

/// RSA-4096 key generated once per test binary.
pub fn rsa_4096() -> &'static RsaPrivateKey {
    KEY.get_or_init(|| {
        CertificateIssuer::new()
            .generate_key_pair()
            .expect("generate 4096-bit test key")
    })
}

/// Provider with the shared key and a self-signed certificate for `name`.
pub fn provider(name: &str) -> StaticKeyProvider {
    let key = rsa_4096().clone();
    let cert = CertificateIssuer::new()
        .issue_self_signed(&DeveloperIdentity::new(name), &key)
        .expect("issue test certificate");
    StaticKeyProvider::new(name, key, CertificateChain::single(cert))
}

pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create parent dirs");
    }
    std::fs::write(path, contents).expect("write bundle file");
}

/// `a.txt` = "hello", `sub/b.txt` = "world".
pub fn hello_world_bundle() -> TempDir {
    let dir = TempDir::new().expect("create bundle dir");
    write_file(dir.path(), "a.txt", "hello");
    write_file(dir.path(), "sub/b.txt", "world");
    dir
}
