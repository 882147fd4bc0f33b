//! Certification path assembly.
//!
//! Builds a path from a presented leaf certificate to a self-signed trust
//! anchor using nothing but the leaf and the contents of a
//! [`TrustStore`]. Revocation is out of scope here: the path is built
//! first and judged afterwards, so a revoked-but-linkable chain still
//! builds and the revocation stage reports the precise failure.

pub mod signature;
pub mod validity;

use const_oid::AssociatedOid;
use der::Decode;
use time::OffsetDateTime;
use x509_cert::{
    ext::pkix::{AuthorityKeyIdentifier, SubjectKeyIdentifier},
    Certificate,
};

use crate::{trust_store::TrustStore, util::common_name_or_unknown};

/// Upper bound on path length, to terminate on pathological issuer graphs
/// such as cross-signed loops.
const MAX_PATH_DEPTH: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum PathBuildingError {
    #[error("trust store contains no certificates")]
    EmptyTrustStore,

    #[error("certificate '{subject}' is {reason}")]
    OutsideValidityPeriod {
        subject: String,
        reason: validity::Error,
    },

    #[error("self-signed certificate '{subject}' is not in the trust store")]
    UntrustedSelfSigned { subject: String },

    #[error("no trusted issuer found for certificate '{subject}'")]
    NoIssuerFound { subject: String },

    #[error("certificate path exceeded {0} certificates")]
    DepthExceeded(usize),
}

/// An ordered certification path: leaf first, trust anchor last.
///
/// Never empty; a self-signed leaf that is itself trusted yields a
/// single-certificate path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertPath {
    certificates: Vec<Certificate>,
}

impl CertPath {
    pub(crate) fn new_unchecked(certificates: Vec<Certificate>) -> Self {
        debug_assert!(!certificates.is_empty());
        Self { certificates }
    }

    /// The presented end-entity certificate.
    pub fn leaf(&self) -> &Certificate {
        &self.certificates[0]
    }

    /// The trust anchor the path terminates at.
    pub fn anchor(&self) -> &Certificate {
        &self.certificates[self.certificates.len() - 1]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Certificate> {
        self.certificates.iter()
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Adjacent (subject, issuer) pairs, leaf first. Empty for a
    /// single-certificate path.
    pub fn links(&self) -> impl Iterator<Item = (&Certificate, &Certificate)> {
        self.certificates.windows(2).map(|pair| (&pair[0], &pair[1]))
    }
}

/// Build a certification path for `leaf` from the trust store contents.
///
/// Candidate issuers are drawn from the store in alias order and the first
/// one that matches (subject name, key identifiers, signature, validity)
/// is taken, so the result is deterministic for a given store. The
/// presented certificate must be valid at `at`; so must every issuer on
/// the path.
pub fn build_path(
    leaf: &Certificate,
    trust_store: &TrustStore,
    at: OffsetDateTime,
) -> Result<CertPath, PathBuildingError> {
    if trust_store.is_empty() {
        return Err(PathBuildingError::EmptyTrustStore);
    }

    check_validity(leaf, at)?;

    if is_self_signed(leaf) {
        return if trust_store.contains(leaf) {
            Ok(CertPath::new_unchecked(vec![leaf.clone()]))
        } else {
            Err(PathBuildingError::UntrustedSelfSigned {
                subject: common_name_or_unknown(leaf).to_string(),
            })
        };
    }

    let mut certificates = vec![leaf.clone()];

    loop {
        if certificates.len() >= MAX_PATH_DEPTH {
            return Err(PathBuildingError::DepthExceeded(MAX_PATH_DEPTH));
        }

        let next = {
            let current = &certificates[certificates.len() - 1];
            find_issuer(current, trust_store, at)
                .ok_or_else(|| PathBuildingError::NoIssuerFound {
                    subject: common_name_or_unknown(current).to_string(),
                })?
                .clone()
        };

        let reached_anchor = is_self_signed(&next);
        certificates.push(next);
        if reached_anchor {
            break;
        }
    }

    tracing::debug!(
        "built certificate path of {} certificates for '{}'",
        certificates.len(),
        common_name_or_unknown(leaf)
    );

    Ok(CertPath::new_unchecked(certificates))
}

fn check_validity(certificate: &Certificate, at: OffsetDateTime) -> Result<(), PathBuildingError> {
    if let Some(reason) = validity::check_validity_period_at(certificate, at)
        .into_iter()
        .next()
    {
        return Err(PathBuildingError::OutsideValidityPeriod {
            subject: common_name_or_unknown(certificate).to_string(),
            reason,
        });
    }
    Ok(())
}

/// Whether a certificate is issued by itself: same subject and issuer, and
/// the signature verifies with its own key.
pub(crate) fn is_self_signed(certificate: &Certificate) -> bool {
    certificate.tbs_certificate.subject == certificate.tbs_certificate.issuer
        && signature::issuer_signed_subject(certificate, certificate)
}

/// The first stored certificate that works as `subject`'s issuer.
fn find_issuer<'a>(
    subject: &Certificate,
    trust_store: &'a TrustStore,
    at: OffsetDateTime,
) -> Option<&'a Certificate> {
    let mut candidates = trust_store
        .certificates()
        .map(|(_, candidate)| candidate)
        .filter(|candidate| candidate.tbs_certificate.subject == subject.tbs_certificate.issuer)
        .filter(|candidate| {
            let consistent = key_identifiers_consistent(candidate, subject);
            if !consistent {
                tracing::warn!(
                    "key identifier mismatch between '{}' and candidate issuer '{}'",
                    common_name_or_unknown(subject),
                    common_name_or_unknown(candidate)
                );
            }
            consistent
        })
        .filter(|candidate| {
            let signed = signature::issuer_signed_subject(subject, candidate);
            if !signed {
                tracing::warn!(
                    "candidate issuer '{}' did not sign '{}'",
                    common_name_or_unknown(candidate),
                    common_name_or_unknown(subject)
                );
            }
            signed
        })
        .filter(|candidate| {
            let errors = validity::check_validity_period_at(candidate, at);
            if !errors.is_empty() {
                tracing::warn!(
                    "candidate issuer '{}' rejected: {errors:?}",
                    common_name_or_unknown(candidate)
                );
            }
            errors.is_empty()
        });

    let first = candidates.next()?;
    if candidates.next().is_some() {
        tracing::warn!(
            "more than one issuer candidate found for '{}', using the first one",
            common_name_or_unknown(subject)
        );
    }
    Some(first)
}

/// Soft key-identifier linkage check: when the subject carries an
/// authority key identifier and the candidate a subject key identifier,
/// they must match. Certificates missing either extension are not
/// disqualified; the signature check is the authority.
fn key_identifiers_consistent(candidate: &Certificate, subject: &Certificate) -> bool {
    let aki = subject
        .tbs_certificate
        .extensions
        .iter()
        .flatten()
        .find(|extension| extension.extn_id == AuthorityKeyIdentifier::OID)
        .and_then(|extension| {
            AuthorityKeyIdentifier::from_der(extension.extn_value.as_bytes())
                .inspect_err(|e| tracing::warn!("unable to parse authority key identifier: {e}"))
                .ok()
        })
        .and_then(|aki| aki.key_identifier);

    let Some(aki) = aki else {
        return true;
    };

    let skis: Vec<SubjectKeyIdentifier> = candidate
        .tbs_certificate
        .extensions
        .iter()
        .flatten()
        .filter(|extension| extension.extn_id == SubjectKeyIdentifier::OID)
        .filter_map(|extension| {
            SubjectKeyIdentifier::from_der(extension.extn_value.as_bytes())
                .inspect_err(|e| tracing::warn!("unable to parse subject key identifier: {e}"))
                .ok()
        })
        .collect();

    if skis.is_empty() {
        return true;
    }

    skis.iter().any(|ski| aki == ski.0)
}
