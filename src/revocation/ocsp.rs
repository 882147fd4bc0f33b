//! OCSP integration seam.
//!
//! The crate does not speak the OCSP wire protocol itself; deployments
//! inject an [`OcspClient`] and the validator consults it before any CRL
//! work when the policy asks for OCSP.

use async_trait::async_trait;
use x509_cert::{ext::pkix::CrlReason, Certificate};

/// Answer from an OCSP responder about one certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OcspStatus {
    /// The responder vouches the certificate is not revoked.
    Good,
    /// The responder reports the certificate revoked.
    Revoked {
        serial: String,
        reason: Option<CrlReason>,
    },
    /// The responder has no answer for this certificate.
    Unknown,
}

#[derive(Debug, thiserror::Error)]
pub enum OcspError {
    /// No OCSP client is configured.
    #[error("OCSP checking is disabled")]
    Disabled,

    /// The responder could not be reached or answered unusably.
    #[error("OCSP responder error: {0}")]
    Responder(String),
}

/// Client able to query an OCSP responder.
#[async_trait]
pub trait OcspClient: Send + Sync {
    /// Ask `responder_url` for the status of `certificate`, which was
    /// issued by `issuer`.
    async fn check(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
        responder_url: &str,
    ) -> Result<OcspStatus, OcspError>;
}

/// `()` is the disabled client: every check fails with
/// [`OcspError::Disabled`]. Combined with a CRL failover policy this
/// degrades to CRL-only checking; without failover the status comes back
/// undetermined.
#[async_trait]
impl OcspClient for () {
    async fn check(
        &self,
        _certificate: &Certificate,
        _issuer: &Certificate,
        _responder_url: &str,
    ) -> Result<OcspStatus, OcspError> {
        Err(OcspError::Disabled)
    }
}
