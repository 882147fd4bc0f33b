//! Alias-keyed store of trusted certificates.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use der::Decode;
use x509_cert::Certificate;

use crate::util;

/// Trusted certificates, keyed by an administrator-chosen alias.
///
/// Every entry can serve both as a trust anchor and as an intermediate link
/// during path building. Aliases iterate in sorted order, which keeps path
/// building deterministic when several stored certificates could serve as
/// the next link.
#[derive(Debug, Clone, Default)]
pub struct TrustStore {
    certificates: BTreeMap<String, Certificate>,
}

impl TrustStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a certificate under `alias`, replacing any previous entry.
    pub fn insert(&mut self, alias: impl Into<String>, certificate: Certificate) {
        self.certificates.insert(alias.into(), certificate);
    }

    /// Store a PEM-encoded certificate.
    pub fn insert_pem(&mut self, alias: impl Into<String>, pem: &[u8]) -> Result<()> {
        let certificate = util::certificate_from_pem(pem)?;
        self.insert(alias, certificate);
        Ok(())
    }

    /// Store a DER-encoded certificate.
    pub fn insert_der(&mut self, alias: impl Into<String>, der_bytes: &[u8]) -> Result<()> {
        let certificate =
            Certificate::from_der(der_bytes).context("unable to parse certificate")?;
        self.insert(alias, certificate);
        Ok(())
    }

    pub fn certificate(&self, alias: &str) -> Option<&Certificate> {
        self.certificates.get(alias)
    }

    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.certificates.keys().map(String::as_str)
    }

    /// Alias and certificate pairs, in alias order.
    pub fn certificates(&self) -> impl Iterator<Item = (&str, &Certificate)> {
        self.certificates
            .iter()
            .map(|(alias, certificate)| (alias.as_str(), certificate))
    }

    pub fn len(&self) -> usize {
        self.certificates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certificates.is_empty()
    }

    /// Whether `certificate` itself is stored, matched by subject name and
    /// public key rather than object identity.
    pub fn contains(&self, certificate: &Certificate) -> bool {
        self.certificates.values().any(|stored| {
            stored.tbs_certificate.subject == certificate.tbs_certificate.subject
                && stored.tbs_certificate.subject_public_key_info
                    == certificate.tbs_certificate.subject_public_key_info
        })
    }
}
