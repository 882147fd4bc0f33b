//! Revocation policy evaluation.
//!
//! The architecture has three stages:
//!
//! - [`RevocationPolicyEngine`] resolves a [`CertificatePolicy`] against a
//!   built path into a [`RevocationContext`]: which sources participate,
//!   which CRLs are at hand, which warnings were swallowed along the way.
//!   All CRL downloads happen here, through the tenant's [`CrlCache`].
//! - [`crl`] judges individual certificates against the gathered CRLs.
//! - The validator walks the path and combines OCSP answers with CRL
//!   verdicts per certificate.
//!
//! Everything is parameters in, parameters out. No stage reads or writes
//! process-global state, so concurrent validations under different tenant
//! policies cannot observe each other.

pub mod cache;
pub mod crl;
mod error;
pub mod http;
pub mod ocsp;

#[cfg(feature = "reqwest")]
mod reqwest_client;

pub use cache::{CachedCrl, CrlCache, CrlCacheConfig, TenantCrlCache};
pub use crl::CrlVerdict;
pub use error::CrlError;
pub use http::{HttpClient, HttpResponse, NoHttpClientError};
pub use ocsp::{OcspClient, OcspError, OcspStatus};

#[cfg(feature = "reqwest")]
pub use reqwest_client::ReqwestClient;

use std::sync::Arc;

use const_oid::{AssociatedOid, ObjectIdentifier};
use der::Decode;
use tracing::{debug, warn};
use x509_cert::{
    ext::pkix::{
        name::{DistributionPointName, GeneralName},
        AuthorityInfoAccessSyntax, CrlDistributionPoints,
    },
    Certificate,
};

use crate::{
    error::ValidationError, path::CertPath, policy::CertificatePolicy,
    util::common_name_or_unknown,
};

/// id-ad-ocsp: the OCSP responder entry in authority information access.
pub(crate) const OID_AD_OCSP: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.48.1");

/// Where a CRL URL came from. Failure handling differs by origin, and the
/// dispatch is a match so a new origin cannot be silently mishandled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrlSource {
    /// Administrator-configured endpoint from the policy. Must be
    /// obtained; any failure is fatal to the validation.
    Custom { url: String },

    /// Distribution point advertised by a certificate in the path. A
    /// failure is a warning unless it leaves the certificate with no
    /// source at all.
    CertEmbedded { url: String, subject: String },

    /// Recognized but never dialed: ldap and other non-HTTP schemes.
    Unsupported {
        url: String,
        subject: Option<String>,
    },
}

impl CrlSource {
    /// Classify the policy's custom CRL URL.
    pub fn custom(url: &str) -> Self {
        if cache::has_supported_scheme(url) {
            CrlSource::Custom {
                url: url.to_string(),
            }
        } else {
            CrlSource::Unsupported {
                url: url.to_string(),
                subject: None,
            }
        }
    }

    /// Classify a URL advertised by a certificate.
    pub fn cert_embedded(url: &str, subject: &str) -> Self {
        if cache::has_supported_scheme(url) {
            CrlSource::CertEmbedded {
                url: url.to_string(),
                subject: subject.to_string(),
            }
        } else {
            CrlSource::Unsupported {
                url: url.to_string(),
                subject: Some(subject.to_string()),
            }
        }
    }

    pub fn url(&self) -> &str {
        match self {
            CrlSource::Custom { url }
            | CrlSource::CertEmbedded { url, .. }
            | CrlSource::Unsupported { url, .. } => url,
        }
    }
}

/// Resolved OCSP participation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspSettings {
    pub responder_url: String,
}

/// Everything the validator needs to judge revocation, resolved from one
/// policy and one path.
///
/// Plain data. Building it performed all CRL downloads, so judging a
/// certificate against it involves no further I/O except OCSP queries.
#[derive(Debug)]
pub struct RevocationContext {
    /// False only when the policy disables revocation checking outright.
    pub revocation_enabled: bool,

    /// Present when OCSP participates, with the resolved responder.
    pub ocsp: Option<OcspSettings>,

    /// Whether CRL verdicts count: primary checking, or failover behind
    /// OCSP.
    pub crl_enabled: bool,

    /// Every CRL gathered for this validation, custom first.
    pub crl_candidates: Vec<Arc<CachedCrl>>,

    /// Human-readable notes about sources that were skipped or failed
    /// without failing the validation.
    pub warnings: Vec<String>,

    /// Parsed certificate-policy OID allow-list.
    pub initial_policy_oids: Vec<ObjectIdentifier>,

    /// True when the allow-list is non-empty and every certificate below
    /// the anchor must assert an acceptable policy.
    pub explicit_policy_required: bool,
}

impl RevocationContext {
    fn disabled() -> Self {
        Self {
            revocation_enabled: false,
            ocsp: None,
            crl_enabled: false,
            crl_candidates: Vec::new(),
            warnings: Vec::new(),
            initial_policy_oids: Vec::new(),
            explicit_policy_required: false,
        }
    }
}

/// Resolves a [`CertificatePolicy`] against a built path into an explicit
/// [`RevocationContext`], downloading CRLs through one tenant's cache.
pub struct RevocationPolicyEngine<'a, C> {
    cache: &'a CrlCache<C>,
}

impl<'a, C: HttpClient> RevocationPolicyEngine<'a, C> {
    pub fn new(cache: &'a CrlCache<C>) -> Self {
        Self { cache }
    }

    /// Decide the participation of each revocation source and gather the
    /// CRLs the validation will judge against.
    ///
    /// Sources are resolved in a fixed order: OCSP responder, the
    /// administrator CRL, then certificate-advertised distribution points
    /// walked leaf to anchor; two validations over the same inputs make
    /// the same decisions.
    pub async fn prepare(
        &self,
        policy: &CertificatePolicy,
        path: &CertPath,
    ) -> Result<RevocationContext, ValidationError> {
        // The OID allow-list constrains the path even when revocation
        // checking itself is off.
        let initial_policy_oids = parse_policy_oids(&policy.oid_allow_list)?;
        let explicit_policy_required = !initial_policy_oids.is_empty();

        if !policy.revocation_check_enabled {
            debug!("revocation checking disabled by policy");
            return Ok(RevocationContext {
                initial_policy_oids,
                explicit_policy_required,
                ..RevocationContext::disabled()
            });
        }

        let (ocsp, crl_enabled) = if policy.use_ocsp {
            let responder_url = resolve_ocsp_responder(policy, path.leaf()).ok_or_else(|| {
                ValidationError::RevocationCheck(
                    "OCSP is enabled but no responder URL is available from the policy \
                     or the certificate"
                        .to_string(),
                )
            })?;
            debug!(responder = %responder_url, "OCSP enabled");
            (
                Some(OcspSettings { responder_url }),
                policy.use_crl_as_failover,
            )
        } else {
            (None, true)
        };

        let mut candidates: Vec<Arc<CachedCrl>> = Vec::new();
        let mut warnings: Vec<String> = Vec::new();

        if crl_enabled {
            if let Some(custom_url) = &policy.custom_crl_url {
                let source = CrlSource::custom(custom_url);
                match self.fetch_source(&source).await {
                    Ok(Some(entry)) => candidates.push(entry),
                    Ok(None) => {
                        return Err(ValidationError::RevocationCheck(format!(
                            "administrator CRL URL has an unsupported scheme: {custom_url}"
                        )))
                    }
                    Err(e) => {
                        return Err(ValidationError::RevocationCheck(format!(
                            "could not obtain administrator CRL from {custom_url}: {e}"
                        )))
                    }
                }
            }

            if policy.use_cert_embedded_crl {
                self.collect_cert_embedded(
                    path,
                    policy.custom_crl_url.is_some(),
                    ocsp.is_some(),
                    &mut candidates,
                    &mut warnings,
                )
                .await?;
            }
        }

        Ok(RevocationContext {
            revocation_enabled: true,
            ocsp,
            crl_enabled,
            crl_candidates: candidates,
            warnings,
            initial_policy_oids,
            explicit_policy_required,
        })
    }

    /// Gather CRLs from the distribution points of every certificate on
    /// the path.
    ///
    /// Per-URL failures are warnings, with one exception: a certificate
    /// that advertised distribution points but yielded no CRL at all,
    /// while no other source (administrator CRL, OCSP) can answer for it,
    /// fails the validation here rather than producing a misleading
    /// undetermined status later.
    async fn collect_cert_embedded(
        &self,
        path: &CertPath,
        custom_crl_configured: bool,
        ocsp_enabled: bool,
        candidates: &mut Vec<Arc<CachedCrl>>,
        warnings: &mut Vec<String>,
    ) -> Result<(), ValidationError> {
        for certificate in path.iter() {
            let subject = common_name_or_unknown(certificate);
            let urls = crl_distribution_urls(certificate).map_err(|e| {
                ValidationError::RevocationCheck(format!(
                    "malformed CRL distribution points extension on '{subject}': {e}"
                ))
            })?;

            if urls.is_empty() {
                continue;
            }

            let mut obtained = 0usize;
            let mut failures: Vec<String> = Vec::new();

            for url in &urls {
                let source = CrlSource::cert_embedded(url, subject);
                match self.fetch_source(&source).await {
                    Ok(Some(entry)) => {
                        obtained += 1;
                        candidates.push(entry);
                    }
                    Ok(None) => {
                        failures.push(format!("{url}: unsupported scheme"));
                    }
                    Err(e) => {
                        warn!("CRL download failed for {url}: {e}");
                        failures.push(format!("{url}: {e}"));
                    }
                }
            }

            if obtained == 0 && !custom_crl_configured && !ocsp_enabled {
                // No other source can answer for this certificate.
                return Err(ValidationError::RevocationCheck(format!(
                    "no usable CRL source for certificate '{subject}': {}",
                    failures.join("; ")
                )));
            }

            warnings.extend(
                failures
                    .into_iter()
                    .map(|failure| format!("certificate '{subject}': {failure}")),
            );
        }

        Ok(())
    }

    /// Fetch one source through the tenant cache. `Ok(None)` means the
    /// source is recognized but never dialed.
    async fn fetch_source(&self, source: &CrlSource) -> Result<Option<Arc<CachedCrl>>, CrlError> {
        match source {
            CrlSource::Custom { url } | CrlSource::CertEmbedded { url, .. } => {
                self.cache.get_or_download(url).await.map(Some)
            }
            CrlSource::Unsupported { url, subject } => {
                match subject {
                    Some(subject) => warn!(
                        "skipping unsupported CRL distribution point {url} from certificate '{subject}'"
                    ),
                    None => warn!("skipping unsupported CRL URL {url}"),
                }
                Ok(None)
            }
        }
    }
}

/// The responder from the policy override, else from the leaf's authority
/// information access extension.
fn resolve_ocsp_responder(policy: &CertificatePolicy, leaf: &Certificate) -> Option<String> {
    if let Some(url) = &policy.ocsp_responder_url {
        if !url.trim().is_empty() {
            return Some(url.clone());
        }
    }

    ocsp_responder_urls(leaf).into_iter().next()
}

/// OCSP responder URLs from the authority information access extension, in
/// certificate order. An unparseable extension yields nothing; the caller
/// treats a missing responder as its own failure.
pub fn ocsp_responder_urls(certificate: &Certificate) -> Vec<String> {
    let Some(extension) = certificate
        .tbs_certificate
        .extensions
        .iter()
        .flatten()
        .find(|extension| extension.extn_id == AuthorityInfoAccessSyntax::OID)
    else {
        return Vec::new();
    };

    let aia = match AuthorityInfoAccessSyntax::from_der(extension.extn_value.as_bytes()) {
        Ok(aia) => aia,
        Err(e) => {
            warn!("unable to parse authority information access extension: {e}");
            return Vec::new();
        }
    };

    aia.0
        .iter()
        .filter(|access| access.access_method == OID_AD_OCSP)
        .filter_map(|access| match &access.access_location {
            GeneralName::UniformResourceIdentifier(uri) => Some(uri.to_string()),
            _ => None,
        })
        .collect()
}

/// CRL distribution point URIs advertised by a certificate, in extension
/// order. Certificates without the extension, or with only non-URI name
/// forms, yield an empty list; only a malformed extension is an error.
pub fn crl_distribution_urls(certificate: &Certificate) -> Result<Vec<String>, CrlError> {
    let Some(extension) = certificate
        .tbs_certificate
        .extensions
        .iter()
        .flatten()
        .find(|extension| extension.extn_id == CrlDistributionPoints::OID)
    else {
        return Ok(Vec::new());
    };

    let points = CrlDistributionPoints::from_der(extension.extn_value.as_bytes())?;

    Ok(points
        .0
        .iter()
        .filter_map(|point| point.distribution_point.as_ref())
        .filter_map(|name| match name {
            DistributionPointName::FullName(names) => Some(names),
            DistributionPointName::NameRelativeToCRLIssuer(_) => None,
        })
        .flat_map(|names| names.iter())
        .filter_map(|name| match name {
            GeneralName::UniformResourceIdentifier(uri) => Some(uri.to_string()),
            _ => None,
        })
        .collect())
}

/// Parse the policy OID allow-list. A malformed OID is a configuration
/// bug, not a certificate problem.
fn parse_policy_oids(allow_list: &[String]) -> Result<Vec<ObjectIdentifier>, ValidationError> {
    allow_list
        .iter()
        .map(|oid| {
            ObjectIdentifier::new(oid).map_err(|e| {
                ValidationError::InvalidArgument(format!("malformed policy OID '{oid}': {e}"))
            })
        })
        .collect()
}
