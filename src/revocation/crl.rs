//! CRL usability checks and revocation lookups.

use std::{sync::Arc, time::SystemTime};

use const_oid::ObjectIdentifier;
use der::{Decode, Encode};
use x509_cert::{crl::CertificateList, ext::pkix::CrlReason, Certificate};

use super::{cache::CachedCrl, error::CrlError};
use crate::{path::signature::verify_signed_data, util::common_name_or_unknown};

// CRL extensions we recognize (RFC 5280 Section 5.2)
const OID_AUTHORITY_KEY_IDENTIFIER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.35");
const OID_ISSUER_ALT_NAME: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.18");
const OID_CRL_NUMBER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.20");
const OID_ISSUING_DISTRIBUTION_POINT: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.28");
const OID_FRESHEST_CRL: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.46");

// CRL entry extensions we recognize (RFC 5280 Section 5.3)
pub(crate) const OID_CRL_REASON: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.21");
const OID_HOLD_INSTRUCTION_CODE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.23");
const OID_INVALIDITY_DATE: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.24");
const OID_CERTIFICATE_ISSUER: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.29");

const RECOGNIZED_CRL_EXTENSIONS: &[ObjectIdentifier] = &[
    OID_AUTHORITY_KEY_IDENTIFIER,
    OID_ISSUER_ALT_NAME,
    OID_CRL_NUMBER,
    OID_ISSUING_DISTRIBUTION_POINT,
    OID_FRESHEST_CRL,
];

const RECOGNIZED_CRL_ENTRY_EXTENSIONS: &[ObjectIdentifier] = &[
    OID_CRL_REASON,
    OID_HOLD_INSTRUCTION_CODE,
    OID_INVALIDITY_DATE,
    OID_CERTIFICATE_ISSUER,
];

/// Revocation verdict for one certificate against the available CRLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CrlVerdict {
    /// At least one usable CRL covered the certificate and none listed it.
    NotRevoked,
    /// A usable CRL lists the certificate's serial number.
    Revoked {
        serial: String,
        reason: Option<CrlReason>,
    },
    /// No usable CRL covered the certificate.
    NoCoverage,
}

/// Check that `crl` is usable for certificates issued by `issuer`.
///
/// Usable means the CRL issuer matches the issuing certificate's subject,
/// `thisUpdate` is not in the future, every critical extension is
/// recognized (RFC 5280 Sections 5.2 and 5.3), and the signature verifies
/// against the issuer's key.
///
/// A `nextUpdate` in the past does not disqualify the CRL: cached CRLs
/// stay in service until a refresh sweep replaces them, so staleness is
/// only logged here.
pub fn validate_crl(
    crl: &CertificateList,
    issuer: &Certificate,
    now: SystemTime,
) -> Result<(), CrlError> {
    if crl.tbs_cert_list.issuer != issuer.tbs_certificate.subject {
        return Err(CrlError::IssuerMismatch);
    }

    let this_update = crl.tbs_cert_list.this_update;
    if now < this_update.to_system_time() {
        return Err(CrlError::NotYetValid {
            this_update: format!("{this_update:?}"),
        });
    }

    if let Some(next_update) = crl.tbs_cert_list.next_update {
        if now > next_update.to_system_time() {
            tracing::warn!(
                "CRL issued by '{}' is stale (nextUpdate {next_update:?}), using it until refreshed",
                common_name_or_unknown(issuer)
            );
        }
    }

    check_critical_extensions(crl)?;

    let tbs = crl.tbs_cert_list.to_der().map_err(|e| {
        tracing::error!("unable to encode TBS certificate list: {e:?}");
        CrlError::SignatureInvalid
    })?;

    if !verify_signed_data(issuer, crl.signature.raw_bytes(), &tbs) {
        return Err(CrlError::SignatureInvalid);
    }

    Ok(())
}

fn check_critical_extensions(crl: &CertificateList) -> Result<(), CrlError> {
    for extension in crl.tbs_cert_list.crl_extensions.iter().flatten() {
        if extension.critical && !RECOGNIZED_CRL_EXTENSIONS.contains(&extension.extn_id) {
            return Err(CrlError::UnrecognizedCriticalExtension {
                oid: extension.extn_id.to_string(),
            });
        }
    }

    for revoked in crl.tbs_cert_list.revoked_certificates.iter().flatten() {
        for extension in revoked.crl_entry_extensions.iter().flatten() {
            if extension.critical && !RECOGNIZED_CRL_ENTRY_EXTENSIONS.contains(&extension.extn_id) {
                return Err(CrlError::UnrecognizedCriticalExtension {
                    oid: extension.extn_id.to_string(),
                });
            }
        }
    }

    Ok(())
}

/// Look up a certificate's serial number in one CRL.
///
/// An explicit `unspecified` reason code is reported as no reason, the
/// same as an entry without one.
pub fn check_revocation(crl: &CertificateList, certificate: &Certificate) -> CrlVerdict {
    let serial = &certificate.tbs_certificate.serial_number;

    for revoked in crl.tbs_cert_list.revoked_certificates.iter().flatten() {
        if &revoked.serial_number != serial {
            continue;
        }

        let reason = revoked
            .crl_entry_extensions
            .iter()
            .flatten()
            .find_map(|extension| {
                if extension.extn_id == OID_CRL_REASON {
                    CrlReason::from_der(extension.extn_value.as_bytes()).ok()
                } else {
                    None
                }
            })
            .filter(|reason| *reason != CrlReason::Unspecified);

        return CrlVerdict::Revoked {
            serial: hex::encode(serial.as_bytes()),
            reason,
        };
    }

    CrlVerdict::NotRevoked
}

/// Determine one certificate's revocation status from the candidate CRLs.
///
/// Candidates that fail the usability check for this issuer are skipped
/// with a log line; in a multi-CA path most candidates are simply for a
/// different issuer. The first usable CRL listing the serial decides.
/// Usable coverage with no listing means not revoked; no usable coverage
/// at all is reported as such for the caller to judge.
pub fn check_with_crls(
    certificate: &Certificate,
    issuer: &Certificate,
    candidates: &[Arc<CachedCrl>],
    now: SystemTime,
) -> CrlVerdict {
    let mut covered = false;

    for candidate in candidates {
        if let Err(e) = validate_crl(&candidate.crl, issuer, now) {
            tracing::debug!(
                url = %candidate.url,
                "CRL not usable for '{}': {e}",
                common_name_or_unknown(certificate)
            );
            continue;
        }

        covered = true;
        if let CrlVerdict::Revoked { serial, reason } = check_revocation(&candidate.crl, certificate)
        {
            return CrlVerdict::Revoked { serial, reason };
        }
    }

    if covered {
        CrlVerdict::NotRevoked
    } else {
        CrlVerdict::NoCoverage
    }
}
