//! Validation outcomes and the error taxonomy.

use x509_cert::ext::pkix::CrlReason;

use crate::path::PathBuildingError;

/// Terminal answer of a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    /// A trusted path exists and no revocation source disqualified it.
    Valid,
    /// A revocation source conclusively reported a certificate revoked.
    Revoked,
    /// Revocation checking was required but no source produced a
    /// conclusive answer.
    RevocationStatusUnknown,
}

/// Errors raised by [`CertPathValidator::validate`](crate::CertPathValidator::validate).
///
/// `CertificateRevoked` and `RevocationStatusUnknown` are conclusions
/// rather than infrastructure failures; they are errors so that a caller
/// cannot accidentally treat an unvalidated certificate as accepted.
/// [`ValidationError::outcome`] recovers the outcome for callers that want
/// to apply their own policy to an undetermined status.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The call itself was unusable: empty tenant name, malformed policy
    /// OID. Retrying without fixing the caller cannot succeed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No path from the presented certificate to a trusted root.
    #[error("certificate path building failed: {0}")]
    PathBuilding(#[from] PathBuildingError),

    /// A revocation source conclusively reported the certificate revoked.
    #[error("certificate with serial {serial} is revoked")]
    CertificateRevoked {
        serial: String,
        reason: Option<CrlReason>,
    },

    /// Revocation checking was required but no source could answer for
    /// some certificate in the path.
    #[error("revocation status could not be determined: {0}")]
    RevocationStatusUnknown(String),

    /// Configuration or infrastructure failure that prevented revocation
    /// checking from running at all: an unreachable administrator CRL, OCSP
    /// required without a responder, a certificate whose advertised CRL
    /// sources all failed, or a certificate-policy constraint violation.
    #[error("revocation check failed: {0}")]
    RevocationCheck(String),
}

impl ValidationError {
    /// The outcome this error encodes, if it is a conclusion rather than a
    /// failure to reach one.
    pub fn outcome(&self) -> Option<ValidationOutcome> {
        match self {
            ValidationError::CertificateRevoked { .. } => Some(ValidationOutcome::Revoked),
            ValidationError::RevocationStatusUnknown(_) => {
                Some(ValidationOutcome::RevocationStatusUnknown)
            }
            _ => None,
        }
    }
}
