//! Per-tenant revocation policy.

use serde::{Deserialize, Serialize};

/// Controls which revocation sources participate in a validation and how
/// their answers combine.
///
/// Plain data, deserializable straight from service configuration; no I/O
/// happens here. The interplay of the flags is resolved per validation by
/// [`RevocationPolicyEngine`](crate::RevocationPolicyEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CertificatePolicy {
    /// Master switch. When false no revocation source is consulted and
    /// certificates are never reported revoked.
    #[serde(default = "default_revocation_check_enabled")]
    pub revocation_check_enabled: bool,

    /// Consult OCSP as the primary revocation source.
    #[serde(default)]
    pub use_ocsp: bool,

    /// Explicit OCSP responder. When absent, the responder is taken from
    /// the leaf certificate's authority information access extension.
    #[serde(default)]
    pub ocsp_responder_url: Option<String>,

    /// Fall back to CRL checking when OCSP is inconclusive. Only meaningful
    /// together with `use_ocsp`.
    #[serde(default)]
    pub use_crl_as_failover: bool,

    /// Administrator-pinned CRL endpoint, consulted for every validation in
    /// addition to whatever the certificates advertise. Failure to obtain
    /// this CRL fails the validation.
    #[serde(default)]
    pub custom_crl_url: Option<String>,

    /// Harvest CRL distribution point URLs from the certificates in the
    /// path.
    #[serde(default = "default_use_cert_embedded_crl")]
    pub use_cert_embedded_crl: bool,

    /// Certificate-policy OIDs acceptable for this tenant. When non-empty,
    /// every certificate below the trust anchor must assert one of these or
    /// anyPolicy.
    #[serde(default)]
    pub oid_allow_list: Vec<String>,
}

fn default_revocation_check_enabled() -> bool {
    true
}

fn default_use_cert_embedded_crl() -> bool {
    true
}

impl Default for CertificatePolicy {
    fn default() -> Self {
        Self {
            revocation_check_enabled: default_revocation_check_enabled(),
            use_ocsp: false,
            ocsp_responder_url: None,
            use_crl_as_failover: false,
            custom_crl_url: None,
            use_cert_embedded_crl: default_use_cert_embedded_crl(),
            oid_allow_list: Vec::new(),
        }
    }
}

impl CertificatePolicy {
    /// Policy with revocation checking switched off entirely.
    pub fn disabled() -> Self {
        Self {
            revocation_check_enabled: false,
            ..Default::default()
        }
    }

    /// CRL-only checking, optionally pinned to an administrator CRL.
    pub fn crl_only(custom_crl_url: Option<String>) -> Self {
        Self {
            custom_crl_url,
            ..Default::default()
        }
    }

    /// OCSP-first checking with CRL failover.
    pub fn ocsp_with_crl_failover(responder_url: Option<String>) -> Self {
        Self {
            use_ocsp: true,
            ocsp_responder_url: responder_url,
            use_crl_as_failover: true,
            ..Default::default()
        }
    }
}
