//! Trust decisions over whole certificate chains.

use tracing::{debug, warn};

use crate::certs::chain::{Certificate, CertificateChain};

/// Decides whether a leaf-first certificate chain is trusted.
pub trait CertificateVerifier: Send + Sync {
    fn is_trusted(&self, chain: &CertificateChain) -> bool;
}

impl<F> CertificateVerifier for F
where
    F: Fn(&CertificateChain) -> bool + Send + Sync,
{
    fn is_trusted(&self, chain: &CertificateChain) -> bool {
        self(chain)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustPolicy {
    /// Trust only a chain whose leaf is exactly this certificate.
    PinnedLeaf(Certificate),
    /// Trust a chain that links, certificate by certificate, up to one of
    /// these anchors.
    RootedIn(Vec<Certificate>),
    /// Trust if any member policy trusts. Empty never trusts.
    AnyOf(Vec<TrustPolicy>),
}

impl TrustPolicy {
    /// Accept a chain whose leaf is one of `certs`, or that is rooted in one
    /// of them.
    pub fn trust_any(certs: Vec<Certificate>) -> Self {
        let mut members: Vec<Self> = certs.iter().cloned().map(Self::PinnedLeaf).collect();
        members.push(Self::RootedIn(certs));
        Self::AnyOf(members)
    }

    pub fn evaluate(&self, chain: &CertificateChain) -> bool {
        match self {
            Self::PinnedLeaf(pinned) => chain.leaf() == pinned,
            Self::RootedIn(anchors) => is_rooted_in(chain, anchors),
            Self::AnyOf(members) => members.iter().any(|policy| policy.evaluate(chain)),
        }
    }
}

impl CertificateVerifier for TrustPolicy {
    fn is_trusted(&self, chain: &CertificateChain) -> bool {
        let trusted = self.evaluate(chain);
        debug!(
            trusted,
            leaf = %chain.leaf().fingerprint_sha256(),
            "evaluated trust policy"
        );
        trusted
    }
}

fn is_rooted_in(chain: &CertificateChain, anchors: &[Certificate]) -> bool {
    if anchors.is_empty() {
        return false;
    }

    let certs = chain.certificates();
    for pair in certs.windows(2) {
        match pair[0].is_issued_by(&pair[1]) {
            Ok(true) => {}
            Ok(false) => {
                debug!("certificate chain is not issuer-linked");
                return false;
            }
            Err(err) => {
                warn!(error = %err, "could not check certificate chain link");
                return false;
            }
        }
    }

    // An anchor may appear inside the presented chain; everything below it
    // was just shown to link up to it.
    if certs.iter().any(|cert| anchors.contains(cert)) {
        return true;
    }

    let top = chain.last();
    anchors.iter().any(|anchor| match top.is_issued_by(anchor) {
        Ok(linked) => linked,
        Err(err) => {
            warn!(error = %err, "could not check chain against trust anchor");
            false
        }
    })
}
