//! Decoding RSA keys from DER or PEM bytes.

use pkcs8::{DecodePrivateKey as _, DecodePublicKey as _, EncodePrivateKey as _, LineEnding};
use rsa::pkcs1::{DecodeRsaPrivateKey as _, DecodeRsaPublicKey as _};
use rsa::{RsaPrivateKey, RsaPublicKey};

use x509_parser::pem::Pem;

use crate::certs::chain::Certificate;
use crate::certs::{is_der, pem_blocks};
use crate::error::{Result, SignError};

const PKCS8_LABEL: &str = "PRIVATE KEY";
const PKCS1_LABEL: &str = "RSA PRIVATE KEY";
const ENCRYPTED_LABEL: &str = "ENCRYPTED PRIVATE KEY";
const PRIVATE_KEY_LABELS: [&str; 3] = [PKCS8_LABEL, PKCS1_LABEL, ENCRYPTED_LABEL];

const SPKI_LABEL: &str = "PUBLIC KEY";
const PKCS1_PUBLIC_LABEL: &str = "RSA PUBLIC KEY";
const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// First block carrying one of `labels`. Keychain entries put the key and
/// its certificates in one buffer, so other blocks are skipped.
fn find_block(bytes: &[u8], labels: &[&str]) -> Result<Pem> {
    pem_blocks(bytes)
        .map_err(|err| SignError::InvalidKey(format!("invalid PEM: {err}")))?
        .into_iter()
        .find(|block| labels.contains(&block.label.as_str()))
        .ok_or_else(|| {
            SignError::InvalidKey(format!("no PEM block labelled {}", labels.join(" or ")))
        })
}

/// PKCS8 or PKCS1 DER, or PEM holding `PRIVATE KEY` / `RSA PRIVATE KEY`.
pub fn decode_private_key(bytes: &[u8]) -> Result<RsaPrivateKey> {
    decode_private_key_with_password(bytes, None)
}

/// Like [`decode_private_key`] but also accepts a password-encrypted PKCS8
/// key when `password` is given.
pub fn decode_private_key_with_password(
    bytes: &[u8],
    password: Option<&str>,
) -> Result<RsaPrivateKey> {
    if is_der(bytes) {
        let encrypted = password.and_then(|pw| RsaPrivateKey::from_pkcs8_encrypted_der(bytes, pw).ok());
        if let Some(key) = encrypted {
            return Ok(key);
        }
        return RsaPrivateKey::from_pkcs8_der(bytes)
            .or_else(|_| RsaPrivateKey::from_pkcs1_der(bytes))
            .map_err(|err| {
                SignError::InvalidKey(format!("private key is not PKCS8 or PKCS1 DER: {err}"))
            });
    }

    let block = find_block(bytes, &PRIVATE_KEY_LABELS)?;
    match (block.label.as_str(), password) {
        (PKCS1_LABEL, _) => RsaPrivateKey::from_pkcs1_der(&block.contents)
            .map_err(|err| SignError::InvalidKey(format!("PKCS1 private key: {err}"))),
        (ENCRYPTED_LABEL, None) => Err(SignError::InvalidKey(
            "private key is encrypted and no password was supplied".to_string(),
        )),
        (ENCRYPTED_LABEL, Some(password)) => {
            RsaPrivateKey::from_pkcs8_encrypted_der(&block.contents, password).map_err(|err| {
                SignError::InvalidKey(format!("cannot decrypt private key (wrong password?): {err}"))
            })
        }
        _ => RsaPrivateKey::from_pkcs8_der(&block.contents)
            .map_err(|err| SignError::InvalidKey(format!("PKCS8 private key: {err}"))),
    }
}

/// X509 SubjectPublicKeyInfo DER, or PEM holding `PUBLIC KEY`,
/// `RSA PUBLIC KEY` or a `CERTIFICATE` whose key is used.
pub fn decode_public_key(bytes: &[u8]) -> Result<RsaPublicKey> {
    if is_der(bytes) {
        return RsaPublicKey::from_public_key_der(bytes)
            .map_err(|err| SignError::InvalidKey(format!("public key is not X509 DER: {err}")));
    }

    let block = find_block(bytes, &[SPKI_LABEL, PKCS1_PUBLIC_LABEL, CERTIFICATE_LABEL])?;
    match block.label.as_str() {
        PKCS1_PUBLIC_LABEL => RsaPublicKey::from_pkcs1_der(&block.contents)
            .map_err(|err| SignError::InvalidKey(format!("PKCS1 public key: {err}"))),
        CERTIFICATE_LABEL => Certificate::from_der(block.contents)?.public_key(),
        _ => RsaPublicKey::from_public_key_der(&block.contents)
            .map_err(|err| SignError::InvalidKey(format!("X509 public key: {err}"))),
    }
}

pub fn private_key_to_pem(key: &RsaPrivateKey) -> Result<String> {
    key.to_pkcs8_pem(LineEnding::LF)
        .map(|pem| pem.to_string())
        .map_err(|err| SignError::InvalidKey(format!("encode private key: {err}")))
}

pub fn encrypted_private_key_to_pem(key: &RsaPrivateKey, password: &str) -> Result<String> {
    let mut rng = rsa::rand_core::OsRng;
    key.to_pkcs8_encrypted_pem(&mut rng, password, LineEnding::LF)
        .map(|pem| pem.to_string())
        .map_err(|err| SignError::InvalidKey(format!("encrypt private key: {err}")))
}

pub fn public_key_to_pem(key: &RsaPublicKey) -> Result<String> {
    use pkcs8::EncodePublicKey as _;
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|err| SignError::InvalidKey(format!("encode public key: {err}")))
}

pub fn private_key_to_der(key: &RsaPrivateKey) -> Result<Vec<u8>> {
    key.to_pkcs8_der()
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(|err| SignError::InvalidKey(format!("encode private key: {err}")))
}

pub fn public_key_to_der(key: &RsaPublicKey) -> Result<Vec<u8>> {
    use pkcs8::EncodePublicKey as _;
    key.to_public_key_der()
        .map(|doc| doc.as_bytes().to_vec())
        .map_err(|err| SignError::InvalidKey(format!("encode public key: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::keys::{rsa_2048, self_signed};
    use rsa::pkcs1::EncodeRsaPrivateKey as _;

    #[test]
    fn decodes_pkcs8_der_and_pem() {
        let key = rsa_2048();
        let der = private_key_to_der(key).unwrap();
        let pem = private_key_to_pem(key).unwrap();

        assert_eq!(&decode_private_key(&der).unwrap(), key);
        assert_eq!(&decode_private_key(pem.as_bytes()).unwrap(), key);
    }

    #[test]
    fn decodes_pkcs1_pem() {
        let key = rsa_2048();
        let pem = key.to_pkcs1_pem(LineEnding::LF).unwrap();
        assert_eq!(&decode_private_key(pem.as_bytes()).unwrap(), key);
    }

    #[test]
    fn encrypted_key_needs_the_right_password() {
        let key = rsa_2048();
        let pem = encrypted_private_key_to_pem(key, "hunter2").unwrap();

        assert!(decode_private_key(pem.as_bytes()).is_err());
        assert!(decode_private_key_with_password(pem.as_bytes(), Some("wrong")).is_err());
        assert_eq!(
            &decode_private_key_with_password(pem.as_bytes(), Some("hunter2")).unwrap(),
            key
        );
    }

    #[test]
    fn public_key_from_spki_or_certificate() {
        let (cert, key) = self_signed("Public Key Source");
        let expected = RsaPublicKey::from(&key);

        let der = public_key_to_der(&expected).unwrap();
        assert_eq!(decode_public_key(&der).unwrap(), expected);

        let pem = public_key_to_pem(&expected).unwrap();
        assert_eq!(decode_public_key(pem.as_bytes()).unwrap(), expected);

        assert_eq!(decode_public_key(cert.to_pem().unwrap().as_bytes()).unwrap(), expected);
    }

    #[test]
    fn key_is_found_behind_certificates_and_comments() {
        let (cert, key) = self_signed("Bundled Entry");
        let text = format!(
            "# exported entry\n{}{}",
            cert.to_pem().unwrap(),
            private_key_to_pem(&key).unwrap()
        );

        assert_eq!(decode_private_key(text.as_bytes()).unwrap(), key);
        assert_eq!(
            decode_public_key(text.as_bytes()).unwrap(),
            RsaPublicKey::from(&key)
        );
    }

    #[test]
    fn certificate_alone_is_not_a_private_key() {
        let (cert, _) = self_signed("No Key Here");
        let err = decode_private_key(cert.to_pem().unwrap().as_bytes()).unwrap_err();
        assert!(err.to_string().contains("no PEM block labelled"));
    }

    #[test]
    fn garbage_is_invalid_key() {
        let err = decode_private_key(b"definitely not a key").unwrap_err();
        assert!(matches!(err, SignError::InvalidKey(_)));
    }
}
