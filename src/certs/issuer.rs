//! Key pair generation and self-signed certificate issuance.

use rcgen::{
    BasicConstraints, CertificateParams, DistinguishedName, DnType, IsCa, KeyPair, SerialNumber,
};
use rsa::RsaPrivateKey;
use rsa::pkcs8::EncodePrivateKey as _;
use tracing::{debug, info};

use crate::certs::chain::Certificate;
use crate::error::{Result, SignError};
use crate::identity::DeveloperIdentity;

pub const DEFAULT_KEY_BITS: usize = 4096;

/// Validity window for issued certificates, as calendar years (Jan 1, UTC).
/// Defaults to 2000..3000.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuerOptions {
    pub not_before_year: i32,
    pub not_after_year: i32,
    pub serial: u64,
}

impl IssuerOptions {
    pub const DEFAULT: Self = Self {
        not_before_year: 2000,
        not_after_year: 3000,
        serial: 1,
    };
}

impl Default for IssuerOptions {
    fn default() -> Self {
        Self::DEFAULT
    }
}

#[derive(Debug, Clone)]
pub struct CertificateIssuer {
    key_bits: usize,
    options: IssuerOptions,
}

impl Default for CertificateIssuer {
    fn default() -> Self {
        Self::new()
    }
}

impl CertificateIssuer {
    pub const fn new() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
            options: IssuerOptions::DEFAULT,
        }
    }

    #[must_use]
    pub const fn with_key_size(mut self, bits: usize) -> Self {
        self.key_bits = bits;
        self
    }

    #[must_use]
    pub const fn with_options(mut self, options: IssuerOptions) -> Self {
        self.options = options;
        self
    }

    pub const fn options(&self) -> IssuerOptions {
        self.options
    }

    pub fn generate_key_pair(&self) -> Result<RsaPrivateKey> {
        debug!(bits = self.key_bits, "generating RSA key pair");
        let mut rng = rsa::rand_core::OsRng;
        Ok(RsaPrivateKey::new(&mut rng, self.key_bits)?)
    }

    /// Issue a self-signed SHA256withRSA certificate whose subject and issuer
    /// are both built from `identity`.
    pub fn issue_self_signed(
        &self,
        identity: &DeveloperIdentity,
        key: &RsaPrivateKey,
    ) -> Result<Certificate> {
        let signer = rcgen_key_pair(key)?;
        let mut params = self.params_for(identity)?;
        params.is_ca = IsCa::NoCa;

        let cert = params.self_signed(&signer)?;
        info!(subject = %identity.x500_subject(), "issued self-signed certificate");
        Certificate::from_der(cert.der().to_vec())
    }

    /// Issue a certificate for `identity`/`subject_key` signed by an issuing
    /// authority. When `as_ca` is set the certificate may itself issue others.
    pub fn issue_signed_by(
        &self,
        identity: &DeveloperIdentity,
        subject_key: &RsaPrivateKey,
        issuer_identity: &DeveloperIdentity,
        issuer_key: &RsaPrivateKey,
        as_ca: bool,
    ) -> Result<Certificate> {
        let subject_pair = rcgen_key_pair(subject_key)?;
        let issuer_pair = rcgen_key_pair(issuer_key)?;

        let mut issuer_params = self.params_for(issuer_identity)?;
        issuer_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let issuer_cert = issuer_params.self_signed(&issuer_pair)?;

        let mut params = self.params_for(identity)?;
        params.is_ca = if as_ca {
            IsCa::Ca(BasicConstraints::Unconstrained)
        } else {
            IsCa::NoCa
        };
        let cert = params.signed_by(&subject_pair, &issuer_cert, &issuer_pair)?;
        Certificate::from_der(cert.der().to_vec())
    }

    /// Self-signed certificate marked as a CA, for use as a trust root.
    pub fn issue_root(
        &self,
        identity: &DeveloperIdentity,
        key: &RsaPrivateKey,
    ) -> Result<Certificate> {
        let signer = rcgen_key_pair(key)?;
        let mut params = self.params_for(identity)?;
        params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        let cert = params.self_signed(&signer)?;
        Certificate::from_der(cert.der().to_vec())
    }

    fn params_for(&self, identity: &DeveloperIdentity) -> Result<CertificateParams> {
        if identity.name.trim().is_empty() {
            return Err(SignError::ValidationFailed(
                "developer identity requires a name".to_string(),
            ));
        }

        let mut params = CertificateParams::default();
        params.distinguished_name = distinguished_name(identity);
        params.serial_number = Some(SerialNumber::from(self.options.serial));
        params.not_before = rcgen::date_time_ymd(self.options.not_before_year, 1, 1);
        params.not_after = rcgen::date_time_ymd(self.options.not_after_year, 1, 1);
        Ok(params)
    }
}

fn distinguished_name(identity: &DeveloperIdentity) -> DistinguishedName {
    let mut dn = DistinguishedName::new();
    dn.push(DnType::CommonName, identity.name.as_str());
    if let Some(organization) = &identity.organization {
        dn.push(DnType::OrganizationName, organization.as_str());
    }
    if let Some(city) = &identity.city {
        dn.push(DnType::LocalityName, city.as_str());
    }
    if let Some(country) = &identity.country_code {
        dn.push(DnType::CountryName, country.as_str());
    }
    dn
}

fn rcgen_key_pair(key: &RsaPrivateKey) -> Result<KeyPair> {
    let der = key
        .to_pkcs8_der()
        .map_err(|err| SignError::InvalidKey(format!("encode PKCS8: {err}")))?;
    KeyPair::try_from(der.as_bytes()).map_err(SignError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::keys::{rsa_2048, rsa_2048_alt};
    use rsa::RsaPublicKey;
    use rsa::traits::PublicKeyParts as _;

    #[test]
    fn self_signed_certificate_carries_identity_subject() {
        let identity = DeveloperIdentity::new("Jane Dev")
            .with_organization("Weblite")
            .with_city("Vancouver")
            .with_country_code("CA");
        let key = rsa_2048();

        let cert = CertificateIssuer::new().issue_self_signed(&identity, key).unwrap();

        let subject = cert.subject().unwrap();
        assert!(subject.contains("CN=Jane Dev"));
        assert!(subject.contains("O=Weblite"));
        assert!(subject.contains("L=Vancouver"));
        assert!(subject.contains("C=CA"));
        assert_eq!(cert.subject().unwrap(), cert.issuer().unwrap());
        assert_eq!(cert.public_key().unwrap(), RsaPublicKey::from(key));
        assert!(cert.is_issued_by(&cert).unwrap());
    }

    #[test]
    fn builder_and_default_share_the_validity_window() {
        assert_eq!(CertificateIssuer::new().options(), IssuerOptions::default());
        assert_eq!(CertificateIssuer::default().options(), IssuerOptions::DEFAULT);
        assert_eq!(IssuerOptions::DEFAULT.not_before_year, 2000);
        assert_eq!(IssuerOptions::DEFAULT.not_after_year, 3000);
    }

    #[test]
    fn validity_window_is_configurable() {
        let issuer = CertificateIssuer::new().with_options(IssuerOptions {
            not_before_year: 2020,
            not_after_year: 2030,
            serial: 7,
        });
        let cert = issuer
            .issue_self_signed(&DeveloperIdentity::new("Short"), rsa_2048())
            .unwrap();
        let (not_before, not_after) = cert.validity().unwrap();
        assert_eq!(not_before.format("%Y").to_string(), "2020");
        assert_eq!(not_after.format("%Y").to_string(), "2030");
    }

    #[test]
    fn empty_name_is_rejected() {
        let err = CertificateIssuer::new()
            .issue_self_signed(&DeveloperIdentity::new("  "), rsa_2048())
            .unwrap_err();
        assert!(matches!(err, SignError::ValidationFailed(_)));
    }

    #[test]
    fn leaf_signed_by_root_links_to_it() {
        let issuer = CertificateIssuer::new();
        let root_identity = DeveloperIdentity::new("Root CA");
        let root = issuer.issue_root(&root_identity, rsa_2048_alt()).unwrap();
        let leaf = issuer
            .issue_signed_by(
                &DeveloperIdentity::new("Leaf"),
                rsa_2048(),
                &root_identity,
                rsa_2048_alt(),
                false,
            )
            .unwrap();

        assert!(leaf.is_issued_by(&root).unwrap());
        assert!(!root.is_issued_by(&leaf).unwrap());
    }

    #[test]
    fn generated_key_has_requested_size() {
        let key = CertificateIssuer::new()
            .with_key_size(1024)
            .generate_key_pair()
            .unwrap();
        assert_eq!(key.size() * 8, 1024);
    }
}
