//! X.509 certificates and leaf-first certificate chains.

use chrono::{DateTime, Utc};
use pkcs8::LineEnding;
use pkcs8::der::pem::encode_string;
use rsa::RsaPublicKey;
use rsa::pkcs1v15;
use rsa::pkcs8::DecodePublicKey as _;
use rsa::signature::Verifier as _;
use sha2::{Digest, Sha256, Sha384, Sha512};
use x509_parser::certificate::X509Certificate;

use crate::certs::{is_der, pem_blocks};
use crate::error::{Result, SignError};

const CERTIFICATE_LABEL: &str = "CERTIFICATE";
const SHA256_WITH_RSA: &str = "1.2.840.113549.1.1.11";
const SHA384_WITH_RSA: &str = "1.2.840.113549.1.1.12";
const SHA512_WITH_RSA: &str = "1.2.840.113549.1.1.13";

/// A single DER-encoded X.509 certificate.
///
/// Only the DER bytes are kept; fields are parsed on demand so the type stays
/// cheap to clone and compare.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Certificate {
    der: Vec<u8>,
}

impl Certificate {
    /// Wrap exactly one DER certificate. Trailing bytes are rejected.
    pub fn from_der(der: impl Into<Vec<u8>>) -> Result<Self> {
        let der = der.into();
        let (rest, _) = x509_parser::parse_x509_certificate(&der)
            .map_err(|err| SignError::Certificate(format!("invalid certificate DER: {err}")))?;
        if !rest.is_empty() {
            return Err(SignError::Certificate(format!(
                "{} trailing bytes after certificate",
                rest.len()
            )));
        }
        Ok(Self { der })
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    fn parsed(&self) -> Result<X509Certificate<'_>> {
        x509_parser::parse_x509_certificate(&self.der)
            .map(|(_, cert)| cert)
            .map_err(|err| SignError::Certificate(format!("invalid certificate DER: {err}")))
    }

    pub fn subject(&self) -> Result<String> {
        Ok(self.parsed()?.subject().to_string())
    }

    pub fn issuer(&self) -> Result<String> {
        Ok(self.parsed()?.issuer().to_string())
    }

    pub fn common_name(&self) -> Result<Option<String>> {
        let cert = self.parsed()?;
        let cn = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_string);
        Ok(cn)
    }

    /// RSA public key from the subject public key info.
    pub fn public_key(&self) -> Result<RsaPublicKey> {
        let cert = self.parsed()?;
        RsaPublicKey::from_public_key_der(cert.public_key().raw)
            .map_err(|err| SignError::Certificate(format!("certificate key is not RSA: {err}")))
    }

    /// `(not_before, not_after)` in UTC.
    pub fn validity(&self) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let cert = self.parsed()?;
        let validity = cert.validity();
        let not_before = to_utc(validity.not_before.timestamp())?;
        let not_after = to_utc(validity.not_after.timestamp())?;
        Ok((not_before, not_after))
    }

    pub fn is_valid_at(&self, at: DateTime<Utc>) -> Result<bool> {
        let (not_before, not_after) = self.validity()?;
        Ok(not_before <= at && at <= not_after)
    }

    pub fn is_self_issued(&self) -> Result<bool> {
        let cert = self.parsed()?;
        Ok(cert.subject().as_raw() == cert.issuer().as_raw())
    }

    /// Lowercase hex SHA-256 over the DER encoding.
    pub fn fingerprint_sha256(&self) -> String {
        hex::encode(Sha256::digest(&self.der))
    }

    /// True when `issuer`'s subject matches this certificate's issuer name and
    /// `issuer`'s key verifies this certificate's signature.
    pub fn is_issued_by(&self, issuer: &Self) -> Result<bool> {
        let cert = self.parsed()?;
        let issuer_cert = issuer.parsed()?;
        if cert.issuer().as_raw() != issuer_cert.subject().as_raw() {
            return Ok(false);
        }

        let key = RsaPublicKey::from_public_key_der(issuer_cert.public_key().raw)
            .map_err(|err| SignError::Certificate(format!("issuer key is not RSA: {err}")))?;
        let tbs = cert.tbs_certificate.as_ref();
        let signature_bytes: &[u8] = &cert.signature_value.data;
        let signature = pkcs1v15::Signature::try_from(signature_bytes)
            .map_err(|err| SignError::Certificate(format!("bad RSA signature bytes: {err}")))?;

        let verified = match cert.signature_algorithm.algorithm.to_id_string().as_str() {
            SHA256_WITH_RSA => pkcs1v15::VerifyingKey::<Sha256>::new(key)
                .verify(tbs, &signature)
                .is_ok(),
            SHA384_WITH_RSA => pkcs1v15::VerifyingKey::<Sha384>::new(key)
                .verify(tbs, &signature)
                .is_ok(),
            SHA512_WITH_RSA => pkcs1v15::VerifyingKey::<Sha512>::new(key)
                .verify(tbs, &signature)
                .is_ok(),
            other => {
                return Err(SignError::Certificate(format!(
                    "unsupported certificate signature algorithm {other}"
                )));
            }
        };
        Ok(verified)
    }

    pub fn to_pem(&self) -> Result<String> {
        encode_string(CERTIFICATE_LABEL, LineEnding::LF, &self.der)
            .map_err(|err| SignError::Certificate(format!("encode certificate PEM: {err}")))
    }
}

fn to_utc(timestamp: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(timestamp, 0).ok_or_else(|| {
        SignError::Certificate(format!("certificate time {timestamp} out of range"))
    })
}

/// Split a raw concatenation of DER certificates. Each iteration consumes
/// exactly one certificate's worth of bytes.
pub fn split_der_certificates(mut bytes: &[u8]) -> Result<Vec<Certificate>> {
    let mut certs = Vec::new();
    while !bytes.is_empty() {
        let (rest, _) = x509_parser::parse_x509_certificate(bytes).map_err(|err| {
            SignError::Certificate(format!(
                "invalid certificate #{} in chain: {err}",
                certs.len() + 1
            ))
        })?;
        let consumed = bytes.len() - rest.len();
        certs.push(Certificate {
            der: bytes[..consumed].to_vec(),
        });
        bytes = rest;
    }
    Ok(certs)
}

/// Certificates from either PEM text or concatenated DER.
pub fn parse_certificates(bytes: &[u8]) -> Result<Vec<Certificate>> {
    if is_der(bytes) {
        return split_der_certificates(bytes);
    }
    pem_blocks(bytes)
        .map_err(|err| SignError::Certificate(format!("invalid certificate PEM: {err}")))?
        .into_iter()
        .filter(|block| block.label == CERTIFICATE_LABEL)
        .map(|block| Certificate::from_der(block.contents))
        .collect()
}

/// Ordered certificate chain, leaf first. Never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateChain {
    certs: Vec<Certificate>,
}

impl CertificateChain {
    pub fn new(certs: Vec<Certificate>) -> Result<Self> {
        if certs.is_empty() {
            return Err(SignError::Certificate(
                "certificate chain must contain at least one certificate".to_string(),
            ));
        }
        Ok(Self { certs })
    }

    pub fn single(cert: Certificate) -> Self {
        Self { certs: vec![cert] }
    }

    /// Parse the on-disk format: concatenated DER, leaf first.
    pub fn from_der_concat(bytes: &[u8]) -> Result<Self> {
        Self::new(split_der_certificates(bytes)?)
    }

    /// Parse PEM or DER input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Self::new(parse_certificates(bytes)?)
    }

    pub fn leaf(&self) -> &Certificate {
        &self.certs[0]
    }

    pub fn last(&self) -> &Certificate {
        &self.certs[self.certs.len() - 1]
    }

    pub fn certificates(&self) -> &[Certificate] {
        &self.certs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Certificate> {
        self.certs.iter()
    }

    /// Append issuers after the current last entry.
    pub fn extend(&mut self, issuers: impl IntoIterator<Item = Certificate>) {
        self.certs.extend(issuers);
    }

    pub fn to_der_concat(&self) -> Vec<u8> {
        self.certs.iter().flat_map(|c| c.der.iter().copied()).collect()
    }

    pub fn to_pem(&self) -> Result<String> {
        self.certs.iter().map(Certificate::to_pem).collect()
    }
}

impl<'a> IntoIterator for &'a CertificateChain {
    type Item = &'a Certificate;
    type IntoIter = std::slice::Iter<'a, Certificate>;

    fn into_iter(self) -> Self::IntoIter {
        self.certs.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::keys::{ca_signed_leaf, self_signed};
    use chrono::TimeZone;

    #[test]
    fn empty_chain_is_rejected() {
        assert!(CertificateChain::new(Vec::new()).is_err());
    }

    #[test]
    fn splits_concatenated_der_leaf_first() {
        let (root, _) = self_signed("Root CA");
        let (leaf, _) = ca_signed_leaf("Leaf", "Root CA");

        let mut bytes = leaf.der().to_vec();
        bytes.extend_from_slice(root.der());

        let chain = CertificateChain::from_der_concat(&bytes).unwrap();
        assert_eq!(chain.certificates().len(), 2);
        assert_eq!(chain.leaf(), &leaf);
        assert_eq!(chain.last(), &root);
        assert_eq!(chain.to_der_concat(), bytes);
    }

    #[test]
    fn truncated_chain_is_a_certificate_error() {
        let (cert, _) = self_signed("Truncated");
        let mut bytes = cert.der().to_vec();
        bytes.extend_from_slice(&cert.der()[..20]);

        let err = CertificateChain::from_der_concat(&bytes).unwrap_err();
        assert!(matches!(err, SignError::Certificate(_)));
        assert!(err.to_string().contains("#2"));
    }

    #[test]
    fn pem_and_der_parse_to_the_same_chain() {
        let (cert, _) = self_signed("Pem Dev");
        let from_pem = CertificateChain::from_bytes(cert.to_pem().unwrap().as_bytes()).unwrap();
        let from_der = CertificateChain::from_bytes(cert.der()).unwrap();
        assert_eq!(from_pem, from_der);
    }

    #[test]
    fn pem_chain_skips_key_blocks_and_keeps_order() {
        let (leaf, key) = ca_signed_leaf("Mixed Leaf", "Mixed Root");
        let (root, _) = self_signed("Mixed Root");
        let text = format!(
            "{}{}{}",
            crate::keys::material::private_key_to_pem(&key).unwrap(),
            leaf.to_pem().unwrap(),
            root.to_pem().unwrap()
        );

        let certs = parse_certificates(text.as_bytes()).unwrap();
        assert_eq!(certs, vec![leaf, root]);
    }

    #[test]
    fn exposes_subject_and_common_name() {
        let (cert, _) = self_signed("Jane Dev");
        assert_eq!(cert.common_name().unwrap().as_deref(), Some("Jane Dev"));
        assert!(cert.subject().unwrap().contains("CN=Jane Dev"));
        assert!(cert.is_self_issued().unwrap());
    }

    #[test]
    fn public_key_matches_signing_key() {
        let (cert, key) = self_signed("Key Match");
        assert_eq!(cert.public_key().unwrap(), RsaPublicKey::from(&key));
    }

    #[test]
    fn validity_window_spans_2000_to_3000() {
        let (cert, _) = self_signed("Long Lived");
        let (not_before, not_after) = cert.validity().unwrap();
        assert_eq!(not_before, Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(not_after, Utc.with_ymd_and_hms(3000, 1, 1, 0, 0, 0).unwrap());
        assert!(cert.is_valid_at(Utc::now()).unwrap());
        assert!(
            !cert
                .is_valid_at(Utc.with_ymd_and_hms(1999, 6, 1, 0, 0, 0).unwrap())
                .unwrap()
        );
    }

    #[test]
    fn issuer_link_requires_matching_signature() {
        let (root, _) = self_signed("Root CA");
        let (leaf, _) = ca_signed_leaf("Leaf", "Root CA");
        let (stranger, _) = self_signed("Stranger");

        assert!(leaf.is_issued_by(&root).unwrap());
        assert!(!leaf.is_issued_by(&stranger).unwrap());
        assert!(root.is_issued_by(&root).unwrap());
    }

    #[test]
    fn fingerprint_is_lowercase_hex() {
        let (cert, _) = self_signed("Fingerprint");
        let fp = cert.fingerprint_sha256();
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }
}
