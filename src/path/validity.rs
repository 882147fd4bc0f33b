use time::OffsetDateTime;
use x509_cert::Certificate;

/// Check a certificate's validity period against a specific point in time.
pub fn check_validity_period_at(certificate: &Certificate, at: OffsetDateTime) -> Vec<Error> {
    let validity = &certificate.tbs_certificate.validity;
    let mut errors = vec![];
    if OffsetDateTime::from(validity.not_before.to_system_time()) > at {
        errors.push(Error::NotYetValid)
    }
    if OffsetDateTime::from(validity.not_after.to_system_time()) < at {
        errors.push(Error::Expired)
    }
    errors
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("expired")]
    Expired,
    #[error("not yet valid")]
    NotYetValid,
}
