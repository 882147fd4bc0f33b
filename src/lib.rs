//! Client certificate path building and revocation checking for
//! multi-tenant services.
//!
//! Validation runs in two phases. First a certification path is built from
//! the presented certificate to a self-signed anchor using only the
//! tenant's [`TrustStore`]. Then a [`RevocationPolicyEngine`] resolves the
//! tenant's [`CertificatePolicy`] into an explicit revocation context
//! (which sources participate, which CRLs are at hand) and the
//! [`CertPathValidator`] judges every certificate on the path against it.
//!
//! The terminal answer is one of three outcomes: valid, revoked, or status
//! unknown. The latter two surface as [`ValidationError`] variants so they
//! cannot be mistaken for acceptance; [`ValidationError::outcome`]
//! converts them back for callers that apply their own policy to an
//! undetermined status.
//!
//! CRLs are cached per tenant in a [`TenantCrlCache`], which the embedding
//! service constructs once and shares between validators. Validation never
//! re-downloads a cached CRL, stale or not; a periodic
//! [`TenantCrlCache::refresh_tenant`] sweep replaces entries whose
//! `nextUpdate` has passed. OCSP is an injection seam: implement
//! [`OcspClient`] to wire in a responder protocol, or pass `()` to leave
//! it disabled.

pub mod error;
pub mod path;
pub mod policy;
pub mod revocation;
pub mod trust_store;
mod util;
pub mod validator;

pub use error::{ValidationError, ValidationOutcome};
pub use path::{build_path, CertPath, PathBuildingError};
pub use policy::CertificatePolicy;
#[cfg(feature = "reqwest")]
pub use revocation::ReqwestClient;
pub use revocation::{
    CachedCrl, CrlCache, CrlCacheConfig, CrlError, CrlSource, CrlVerdict, HttpClient,
    HttpResponse, NoHttpClientError, OcspClient, OcspError, OcspSettings, OcspStatus,
    RevocationContext, RevocationPolicyEngine, TenantCrlCache,
};
pub use trust_store::TrustStore;
pub use validator::{CertPathValidator, ValidationOptions};
