use std::error::Error as StdError;

/// Errors from CRL retrieval, caching, and evaluation.
#[derive(Debug, thiserror::Error)]
pub enum CrlError {
    /// Transport-level failure while downloading a CRL.
    #[error("failed to fetch CRL from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// The endpoint answered with a non-success status.
    #[error("CRL endpoint {url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The response body exceeded the configured size cap.
    #[error("CRL from {url} is {size} bytes, over the {limit} byte limit")]
    TooLarge {
        url: String,
        size: usize,
        limit: usize,
    },

    /// Only http and https URLs are ever dialed.
    #[error("unsupported CRL URL scheme: {url}")]
    UnsupportedScheme { url: String },

    /// The payload was not a DER-encoded certificate list.
    #[error("failed to parse CRL: {0}")]
    Parse(#[from] der::Error),

    /// The CRL issuer name does not match the certificate that is supposed
    /// to have signed it.
    #[error("CRL issuer does not match the issuing certificate")]
    IssuerMismatch,

    /// thisUpdate lies in the future.
    #[error("CRL is not yet valid: thisUpdate {this_update}")]
    NotYetValid { this_update: String },

    /// Signature verification against the issuer's key failed.
    #[error("CRL signature validation failed")]
    SignatureInvalid,

    /// RFC 5280 5.2/5.3: a CRL carrying an unrecognized critical extension
    /// must not be used.
    #[error("CRL contains unrecognized critical extension: {oid}")]
    UnrecognizedCriticalExtension { oid: String },

    /// One or more entries could not be re-downloaded during a refresh
    /// sweep. The previous entries remain cached.
    #[error("CRL refresh failed: {errors:?}")]
    RefreshFailed { errors: Vec<String> },
}
