//! Orchestration: path building, policy constraints, revocation checking.

use std::{sync::Arc, time::SystemTime};

use const_oid::{AssociatedOid, ObjectIdentifier};
use der::Decode;
use time::OffsetDateTime;
use tracing::{debug, warn};
use x509_cert::{ext::pkix::CertificatePolicies, Certificate};

use crate::{
    error::{ValidationError, ValidationOutcome},
    path::{build_path, CertPath},
    policy::CertificatePolicy,
    revocation::{
        crl::{check_with_crls, CrlVerdict},
        HttpClient, OcspClient, OcspStatus, RevocationContext, RevocationPolicyEngine,
        TenantCrlCache,
    },
    trust_store::TrustStore,
    util::common_name_or_unknown,
};

/// anyPolicy satisfies any allow-listed certificate policy.
const ANY_POLICY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.5.29.32.0");

/// Options for a single validation run.
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// The time validity periods are checked against. `None` means now.
    pub validation_time: Option<OffsetDateTime>,
}

impl ValidationOptions {
    fn validation_time(&self) -> OffsetDateTime {
        self.validation_time.unwrap_or_else(OffsetDateTime::now_utc)
    }
}

/// Validates client certificates for a multi-tenant service.
///
/// Holds the process-shared tenant CRL caches and the OCSP client; the
/// tenant, trust store, and policy arrive per call, so one validator
/// serves any number of tenants concurrently without their revocation
/// state mixing.
pub struct CertPathValidator<C, O> {
    caches: Arc<TenantCrlCache<C>>,
    ocsp: O,
}

impl<C, O> CertPathValidator<C, O>
where
    C: HttpClient + Clone,
    O: OcspClient,
{
    pub fn new(caches: Arc<TenantCrlCache<C>>, ocsp: O) -> Self {
        Self { caches, ocsp }
    }

    /// Validate `certificate` against `trust_store` under `policy` on
    /// behalf of `tenant`, at the current time.
    ///
    /// `Ok` is always [`ValidationOutcome::Valid`]. A revoked certificate
    /// and an undetermined status are returned as the corresponding
    /// [`ValidationError`] variants so they cannot be overlooked;
    /// [`ValidationError::outcome`] converts them back into outcomes for
    /// callers that apply their own policy to undetermined results.
    pub async fn validate(
        &self,
        certificate: &Certificate,
        trust_store: &TrustStore,
        policy: &CertificatePolicy,
        tenant: &str,
    ) -> Result<ValidationOutcome, ValidationError> {
        self.validate_with_options(
            certificate,
            trust_store,
            policy,
            tenant,
            &ValidationOptions::default(),
        )
        .await
    }

    /// Validate at a caller-chosen point in time.
    pub async fn validate_with_options(
        &self,
        certificate: &Certificate,
        trust_store: &TrustStore,
        policy: &CertificatePolicy,
        tenant: &str,
        options: &ValidationOptions,
    ) -> Result<ValidationOutcome, ValidationError> {
        if tenant.trim().is_empty() {
            return Err(ValidationError::InvalidArgument(
                "tenant name must not be empty".to_string(),
            ));
        }

        let validation_time = options.validation_time();

        debug!(
            tenant,
            subject = common_name_or_unknown(certificate),
            "validating client certificate"
        );

        let path = build_path(certificate, trust_store, validation_time)?;

        let cache = self.caches.cache_for(tenant);
        let engine = RevocationPolicyEngine::new(&cache);
        let context = engine.prepare(policy, &path).await?;

        for warning in &context.warnings {
            warn!(tenant, "revocation source skipped: {warning}");
        }

        check_policy_constraints(&path, &context)?;

        self.check_revocation_statuses(&path, &context, validation_time)
            .await?;

        debug!(
            tenant,
            subject = common_name_or_unknown(certificate),
            "client certificate validated"
        );

        Ok(ValidationOutcome::Valid)
    }

    /// Judge every non-anchor certificate against its issuer, leaf first.
    /// The first revoked or undetermined certificate ends the walk.
    async fn check_revocation_statuses(
        &self,
        path: &CertPath,
        context: &RevocationContext,
        validation_time: OffsetDateTime,
    ) -> Result<(), ValidationError> {
        if !context.revocation_enabled {
            return Ok(());
        }

        let now: SystemTime = validation_time.into();

        for (certificate, issuer) in path.links() {
            self.check_certificate(certificate, issuer, context, now)
                .await?;
        }

        Ok(())
    }

    /// OCSP first when it participates, CRLs as primary source or as
    /// failover behind an inconclusive OCSP answer.
    async fn check_certificate(
        &self,
        certificate: &Certificate,
        issuer: &Certificate,
        context: &RevocationContext,
        now: SystemTime,
    ) -> Result<(), ValidationError> {
        let subject = common_name_or_unknown(certificate);

        if let Some(ocsp) = &context.ocsp {
            match self
                .ocsp
                .check(certificate, issuer, &ocsp.responder_url)
                .await
            {
                Ok(OcspStatus::Good) => {
                    debug!("OCSP reports '{subject}' good");
                    return Ok(());
                }
                Ok(OcspStatus::Revoked { serial, reason }) => {
                    return Err(ValidationError::CertificateRevoked { serial, reason });
                }
                Ok(OcspStatus::Unknown) => {
                    warn!("OCSP status for '{subject}' is unknown");
                    if !context.crl_enabled {
                        return Err(ValidationError::RevocationStatusUnknown(format!(
                            "OCSP could not determine the status of '{subject}' \
                             and CRL failover is disabled"
                        )));
                    }
                }
                Err(e) => {
                    warn!("OCSP check for '{subject}' failed: {e}");
                    if !context.crl_enabled {
                        return Err(ValidationError::RevocationStatusUnknown(format!(
                            "OCSP check for '{subject}' failed ({e}) \
                             and CRL failover is disabled"
                        )));
                    }
                }
            }
        }

        if context.crl_enabled {
            return match check_with_crls(certificate, issuer, &context.crl_candidates, now) {
                CrlVerdict::NotRevoked => Ok(()),
                CrlVerdict::Revoked { serial, reason } => {
                    Err(ValidationError::CertificateRevoked { serial, reason })
                }
                CrlVerdict::NoCoverage => Err(ValidationError::RevocationStatusUnknown(format!(
                    "no CRL covers certificate '{subject}'"
                ))),
            };
        }

        // Revocation required but neither source is active for this
        // certificate.
        Err(ValidationError::RevocationStatusUnknown(format!(
            "no revocation source available for '{subject}'"
        )))
    }
}

/// When the policy pins acceptable certificate-policy OIDs, every
/// certificate below the trust anchor must assert one of them or
/// anyPolicy.
fn check_policy_constraints(
    path: &CertPath,
    context: &RevocationContext,
) -> Result<(), ValidationError> {
    if !context.explicit_policy_required {
        return Ok(());
    }

    for (certificate, _) in path.links() {
        let subject = common_name_or_unknown(certificate);
        let asserted = asserted_policy_oids(certificate).map_err(|e| {
            ValidationError::RevocationCheck(format!(
                "malformed certificate policies extension on '{subject}': {e}"
            ))
        })?;

        let accepted = asserted
            .iter()
            .any(|oid| *oid == ANY_POLICY || context.initial_policy_oids.contains(oid));

        if !accepted {
            return Err(ValidationError::RevocationCheck(format!(
                "certificate '{subject}' does not assert an acceptable certificate policy"
            )));
        }
    }

    Ok(())
}

/// OIDs asserted by the certificatePolicies extension; empty when the
/// extension is absent.
fn asserted_policy_oids(certificate: &Certificate) -> Result<Vec<ObjectIdentifier>, der::Error> {
    let Some(extension) = certificate
        .tbs_certificate
        .extensions
        .iter()
        .flatten()
        .find(|extension| extension.extn_id == CertificatePolicies::OID)
    else {
        return Ok(Vec::new());
    };

    let policies = CertificatePolicies::from_der(extension.extn_value.as_bytes())?;
    Ok(policies
        .0
        .iter()
        .map(|information| information.policy_identifier)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revocation::{OcspError, OcspStatus};
    use crate::test::{
        build_crl, certificate_policies_extension, issue_leaf, leaf_with_extensions, test_ca,
        TestCa,
    };
    use async_trait::async_trait;
    use x509_cert::ext::pkix::CrlReason;

    /// OCSP client that always answers the same thing.
    struct StaticOcsp(OcspStatus);

    #[async_trait]
    impl OcspClient for StaticOcsp {
        async fn check(
            &self,
            _certificate: &Certificate,
            _issuer: &Certificate,
            _responder_url: &str,
        ) -> Result<OcspStatus, OcspError> {
            Ok(self.0.clone())
        }
    }

    fn store_with(ca: &TestCa) -> TrustStore {
        let mut store = TrustStore::new();
        store.insert("root", ca.certificate.clone());
        store
    }

    fn validator_without_io() -> (Arc<TenantCrlCache<()>>, CertPathValidator<(), ()>) {
        let caches = Arc::new(TenantCrlCache::new(()));
        let validator = CertPathValidator::new(Arc::clone(&caches), ());
        (caches, validator)
    }

    #[tokio::test]
    async fn disabled_revocation_accepts_a_linkable_path() {
        let ca = test_ca("CN=Validator CA");
        let leaf = issue_leaf("CN=client", &ca, &[]);
        let (_, validator) = validator_without_io();

        let outcome = validator
            .validate(&leaf, &store_with(&ca), &CertificatePolicy::disabled(), "acme")
            .await
            .unwrap();
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[tokio::test]
    async fn empty_tenant_is_rejected_before_any_work() {
        let ca = test_ca("CN=Validator CA");
        let leaf = issue_leaf("CN=client", &ca, &[]);
        let (_, validator) = validator_without_io();

        let result = validator
            .validate(&leaf, &store_with(&ca), &CertificatePolicy::disabled(), "  ")
            .await;
        assert!(matches!(result, Err(ValidationError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn path_building_failures_propagate() {
        let ca = test_ca("CN=Validator CA");
        let leaf = issue_leaf("CN=client", &ca, &[]);
        let (_, validator) = validator_without_io();

        let result = validator
            .validate(
                &leaf,
                &TrustStore::new(),
                &CertificatePolicy::disabled(),
                "acme",
            )
            .await;
        assert!(matches!(result, Err(ValidationError::PathBuilding(_))));
    }

    #[tokio::test]
    async fn no_crl_coverage_is_undetermined() {
        let ca = test_ca("CN=Validator CA");
        let leaf = issue_leaf("CN=client", &ca, &[]);
        let (_, validator) = validator_without_io();

        let result = validator
            .validate(&leaf, &store_with(&ca), &CertificatePolicy::default(), "acme")
            .await;
        match result {
            Err(error) => {
                assert_eq!(
                    error.outcome(),
                    Some(ValidationOutcome::RevocationStatusUnknown)
                );
            }
            Ok(outcome) => panic!("expected an undetermined status, got {outcome:?}"),
        }
    }

    #[tokio::test]
    async fn seeded_administrator_crl_revokes() {
        let ca = test_ca("CN=Validator CA");
        let leaf = issue_leaf("CN=client", &ca, &[]);
        let serial = leaf.tbs_certificate.serial_number.clone();
        let url = "http://crl.example.com/pinned.crl";

        let (caches, validator) = validator_without_io();
        caches
            .cache_for("acme")
            .put(url, build_crl(&ca, &[serial.clone()], None))
            .await;

        let policy = CertificatePolicy::crl_only(Some(url.to_string()));
        let result = validator
            .validate(&leaf, &store_with(&ca), &policy, "acme")
            .await;
        match result {
            Err(ValidationError::CertificateRevoked { serial: reported, .. }) => {
                assert_eq!(reported, hex::encode(serial.as_bytes()));
            }
            other => panic!("expected a revoked certificate, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn seeded_administrator_crl_clears() {
        let ca = test_ca("CN=Validator CA");
        let leaf = issue_leaf("CN=client", &ca, &[]);
        let url = "http://crl.example.com/pinned.crl";

        let (caches, validator) = validator_without_io();
        caches
            .cache_for("acme")
            .put(url, build_crl(&ca, &[], None))
            .await;

        let policy = CertificatePolicy::crl_only(Some(url.to_string()));
        let outcome = validator
            .validate(&leaf, &store_with(&ca), &policy, "acme")
            .await
            .unwrap();
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[tokio::test]
    async fn tenants_do_not_share_seeded_crls() {
        let ca = test_ca("CN=Validator CA");
        let leaf = issue_leaf("CN=client", &ca, &[]);
        let url = "http://crl.example.com/pinned.crl";

        let (caches, validator) = validator_without_io();
        caches
            .cache_for("acme")
            .put(url, build_crl(&ca, &[], None))
            .await;

        let policy = CertificatePolicy::crl_only(Some(url.to_string()));

        // The seeding tenant validates, the other has no entry and no
        // transport to fetch one.
        validator
            .validate(&leaf, &store_with(&ca), &policy, "acme")
            .await
            .unwrap();
        let result = validator
            .validate(&leaf, &store_with(&ca), &policy, "globex")
            .await;
        assert!(matches!(result, Err(ValidationError::RevocationCheck(_))));
    }

    #[tokio::test]
    async fn ocsp_good_is_sufficient_without_failover() {
        let ca = test_ca("CN=Validator CA");
        let leaf = issue_leaf("CN=client", &ca, &[]);
        let caches = Arc::new(TenantCrlCache::new(()));
        let validator = CertPathValidator::new(caches, StaticOcsp(OcspStatus::Good));

        let policy = CertificatePolicy {
            use_ocsp: true,
            ocsp_responder_url: Some("http://ocsp.example.com/status".to_string()),
            ..Default::default()
        };

        let outcome = validator
            .validate(&leaf, &store_with(&ca), &policy, "acme")
            .await
            .unwrap();
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[tokio::test]
    async fn ocsp_revoked_is_terminal() {
        let ca = test_ca("CN=Validator CA");
        let leaf = issue_leaf("CN=client", &ca, &[]);
        let caches = Arc::new(TenantCrlCache::new(()));
        let validator = CertPathValidator::new(
            caches,
            StaticOcsp(OcspStatus::Revoked {
                serial: "0abc".to_string(),
                reason: Some(CrlReason::KeyCompromise),
            }),
        );

        let policy = CertificatePolicy {
            use_ocsp: true,
            ocsp_responder_url: Some("http://ocsp.example.com/status".to_string()),
            use_crl_as_failover: true,
            ..Default::default()
        };

        let result = validator
            .validate(&leaf, &store_with(&ca), &policy, "acme")
            .await;
        assert!(matches!(
            result,
            Err(ValidationError::CertificateRevoked { .. })
        ));
    }

    #[tokio::test]
    async fn ocsp_unknown_without_failover_is_undetermined() {
        let ca = test_ca("CN=Validator CA");
        let leaf = issue_leaf("CN=client", &ca, &[]);
        let caches = Arc::new(TenantCrlCache::new(()));
        let validator = CertPathValidator::new(caches, StaticOcsp(OcspStatus::Unknown));

        let policy = CertificatePolicy {
            use_ocsp: true,
            ocsp_responder_url: Some("http://ocsp.example.com/status".to_string()),
            use_crl_as_failover: false,
            ..Default::default()
        };

        let result = validator
            .validate(&leaf, &store_with(&ca), &policy, "acme")
            .await;
        assert!(matches!(
            result,
            Err(ValidationError::RevocationStatusUnknown(_))
        ));
    }

    #[tokio::test]
    async fn ocsp_unknown_fails_over_to_a_seeded_crl() {
        let ca = test_ca("CN=Validator CA");
        let leaf = issue_leaf("CN=client", &ca, &[]);
        let url = "http://crl.example.com/pinned.crl";

        let caches = Arc::new(TenantCrlCache::new(()));
        caches
            .cache_for("acme")
            .put(url, build_crl(&ca, &[], None))
            .await;
        let validator =
            CertPathValidator::new(Arc::clone(&caches), StaticOcsp(OcspStatus::Unknown));

        let policy = CertificatePolicy {
            use_ocsp: true,
            ocsp_responder_url: Some("http://ocsp.example.com/status".to_string()),
            use_crl_as_failover: true,
            custom_crl_url: Some(url.to_string()),
            ..Default::default()
        };

        let outcome = validator
            .validate(&leaf, &store_with(&ca), &policy, "acme")
            .await
            .unwrap();
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[tokio::test]
    async fn disabled_ocsp_client_counts_as_inconclusive() {
        let ca = test_ca("CN=Validator CA");
        let leaf = issue_leaf("CN=client", &ca, &[]);
        let (_, validator) = validator_without_io();

        let policy = CertificatePolicy {
            use_ocsp: true,
            ocsp_responder_url: Some("http://ocsp.example.com/status".to_string()),
            use_crl_as_failover: false,
            ..Default::default()
        };

        let result = validator
            .validate(&leaf, &store_with(&ca), &policy, "acme")
            .await;
        assert!(matches!(
            result,
            Err(ValidationError::RevocationStatusUnknown(_))
        ));
    }

    #[tokio::test]
    async fn allow_listed_policy_oid_is_accepted() {
        let ca = test_ca("CN=Validator CA");
        let leaf = leaf_with_extensions(
            "CN=client",
            &ca,
            vec![certificate_policies_extension(&["1.3.6.1.4.1.99999.7"])],
        );
        let (_, validator) = validator_without_io();

        let policy = CertificatePolicy {
            oid_allow_list: vec!["1.3.6.1.4.1.99999.7".to_string()],
            ..CertificatePolicy::disabled()
        };

        let outcome = validator
            .validate(&leaf, &store_with(&ca), &policy, "acme")
            .await
            .unwrap();
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[tokio::test]
    async fn any_policy_satisfies_the_allow_list() {
        let ca = test_ca("CN=Validator CA");
        let leaf = leaf_with_extensions(
            "CN=client",
            &ca,
            vec![certificate_policies_extension(&["2.5.29.32.0"])],
        );
        let (_, validator) = validator_without_io();

        let policy = CertificatePolicy {
            oid_allow_list: vec!["1.3.6.1.4.1.99999.7".to_string()],
            ..CertificatePolicy::disabled()
        };

        let outcome = validator
            .validate(&leaf, &store_with(&ca), &policy, "acme")
            .await
            .unwrap();
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[tokio::test]
    async fn missing_policy_assertion_is_rejected() {
        let ca = test_ca("CN=Validator CA");
        let leaf = issue_leaf("CN=client", &ca, &[]);
        let (_, validator) = validator_without_io();

        let policy = CertificatePolicy {
            oid_allow_list: vec!["1.3.6.1.4.1.99999.7".to_string()],
            ..CertificatePolicy::disabled()
        };

        let result = validator
            .validate(&leaf, &store_with(&ca), &policy, "acme")
            .await;
        match result {
            Err(ValidationError::RevocationCheck(message)) => {
                assert!(message.contains("acceptable certificate policy"), "{message}");
            }
            other => panic!("expected a policy constraint failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unlisted_policy_assertion_is_rejected() {
        let ca = test_ca("CN=Validator CA");
        let leaf = leaf_with_extensions(
            "CN=client",
            &ca,
            vec![certificate_policies_extension(&["1.3.6.1.4.1.99999.8"])],
        );
        let (_, validator) = validator_without_io();

        let policy = CertificatePolicy {
            oid_allow_list: vec!["1.3.6.1.4.1.99999.7".to_string()],
            ..CertificatePolicy::disabled()
        };

        let result = validator
            .validate(&leaf, &store_with(&ca), &policy, "acme")
            .await;
        assert!(matches!(result, Err(ValidationError::RevocationCheck(_))));
    }

    #[tokio::test]
    async fn validation_time_is_honored() {
        use std::time::Duration;

        let ca = test_ca("CN=Validator CA");
        let leaf = issue_leaf("CN=client", &ca, &[]);
        let (_, validator) = validator_without_io();

        // Test certificates are valid for ten minutes.
        let options = ValidationOptions {
            validation_time: Some(OffsetDateTime::now_utc() + Duration::from_secs(3600)),
        };
        let result = validator
            .validate_with_options(
                &leaf,
                &store_with(&ca),
                &CertificatePolicy::disabled(),
                "acme",
                &options,
            )
            .await;
        assert!(matches!(result, Err(ValidationError::PathBuilding(_))));
    }
}

#[cfg(all(test, feature = "reqwest"))]
mod network_tests {
    use super::*;
    use crate::revocation::ReqwestClient;
    use crate::test::{build_crl, crl_der, issue_leaf, test_ca, TestCa};
    use std::time::{Duration, SystemTime};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_with(ca: &TestCa) -> TrustStore {
        let mut store = TrustStore::new();
        store.insert("root", ca.certificate.clone());
        store
    }

    fn validator() -> (
        Arc<TenantCrlCache<ReqwestClient>>,
        CertPathValidator<ReqwestClient, ()>,
    ) {
        let caches = Arc::new(TenantCrlCache::new(ReqwestClient::new().unwrap()));
        let validator = CertPathValidator::new(Arc::clone(&caches), ());
        (caches, validator)
    }

    #[test_log::test(tokio::test)]
    async fn validation_passes_when_certificate_not_revoked() {
        let ca = test_ca("CN=Network Validator CA");
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ca.crl"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(crl_der(&build_crl(&ca, &[], None))),
            )
            .mount(&server)
            .await;

        let leaf = issue_leaf("CN=client", &ca, &[&format!("{}/ca.crl", server.uri())]);
        let (_, validator) = validator();

        let outcome = validator
            .validate(&leaf, &store_with(&ca), &CertificatePolicy::default(), "acme")
            .await
            .unwrap();
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[test_log::test(tokio::test)]
    async fn validation_fails_when_certificate_is_revoked() {
        let ca = test_ca("CN=Network Validator CA");
        let server = MockServer::start().await;
        let leaf = issue_leaf("CN=client", &ca, &[&format!("{}/ca.crl", server.uri())]);
        let serial = leaf.tbs_certificate.serial_number.clone();

        Mock::given(method("GET"))
            .and(path("/ca.crl"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_bytes(crl_der(&build_crl(&ca, &[serial.clone()], None))),
            )
            .mount(&server)
            .await;

        let (_, validator) = validator();

        let result = validator
            .validate(&leaf, &store_with(&ca), &CertificatePolicy::default(), "acme")
            .await;
        match result {
            Err(error @ ValidationError::CertificateRevoked { .. }) => {
                assert_eq!(error.outcome(), Some(ValidationOutcome::Revoked));
            }
            other => panic!("expected a revoked certificate, got {other:?}"),
        }
    }

    #[test_log::test(tokio::test)]
    async fn unreachable_distribution_point_with_no_other_source_is_fatal() {
        let ca = test_ca("CN=Network Validator CA");
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ca.crl"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let leaf = issue_leaf("CN=client", &ca, &[&format!("{}/ca.crl", server.uri())]);
        let (_, validator) = validator();

        let result = validator
            .validate(&leaf, &store_with(&ca), &CertificatePolicy::default(), "acme")
            .await;
        assert!(matches!(result, Err(ValidationError::RevocationCheck(_))));
    }

    #[test_log::test(tokio::test)]
    async fn administrator_crl_covers_a_broken_distribution_point() {
        let ca = test_ca("CN=Network Validator CA");
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/broken.crl"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pinned.crl"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(crl_der(&build_crl(&ca, &[], None))),
            )
            .mount(&server)
            .await;

        let leaf = issue_leaf("CN=client", &ca, &[&format!("{}/broken.crl", server.uri())]);
        let (_, validator) = validator();
        let policy =
            CertificatePolicy::crl_only(Some(format!("{}/pinned.crl", server.uri())));

        let outcome = validator
            .validate(&leaf, &store_with(&ca), &policy, "acme")
            .await
            .unwrap();
        assert_eq!(outcome, ValidationOutcome::Valid);
    }

    #[test_log::test(tokio::test)]
    async fn unreachable_administrator_crl_is_fatal() {
        let ca = test_ca("CN=Network Validator CA");
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/pinned.crl"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let leaf = issue_leaf("CN=client", &ca, &[]);
        let (_, validator) = validator();
        let policy =
            CertificatePolicy::crl_only(Some(format!("{}/pinned.crl", server.uri())));

        let result = validator
            .validate(&leaf, &store_with(&ca), &policy, "acme")
            .await;
        assert!(matches!(result, Err(ValidationError::RevocationCheck(_))));
    }

    #[test_log::test(tokio::test)]
    async fn repeated_validations_reuse_the_cached_crl() {
        let ca = test_ca("CN=Network Validator CA");
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ca.crl"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(crl_der(&build_crl(&ca, &[], None))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let leaf = issue_leaf("CN=client", &ca, &[&format!("{}/ca.crl", server.uri())]);
        let (_, validator) = validator();
        let store = store_with(&ca);

        for _ in 0..3 {
            validator
                .validate(&leaf, &store, &CertificatePolicy::default(), "acme")
                .await
                .unwrap();
        }
    }

    #[test_log::test(tokio::test)]
    async fn tenants_fetch_their_own_copies() {
        let ca = test_ca("CN=Network Validator CA");
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/ca.crl"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(crl_der(&build_crl(&ca, &[], None))),
            )
            .expect(2)
            .mount(&server)
            .await;

        let leaf = issue_leaf("CN=client", &ca, &[&format!("{}/ca.crl", server.uri())]);
        let (_, validator) = validator();
        let store = store_with(&ca);

        for tenant in ["acme", "globex"] {
            validator
                .validate(&leaf, &store, &CertificatePolicy::default(), tenant)
                .await
                .unwrap();
        }
    }

    #[test_log::test(tokio::test)]
    async fn refresh_sweep_picks_up_a_replacement_crl() {
        let ca = test_ca("CN=Network Validator CA");
        let server = MockServer::start().await;
        let url = format!("{}/ca.crl", server.uri());
        let leaf = issue_leaf("CN=client", &ca, &[&url]);
        let serial = leaf.tbs_certificate.serial_number.clone();

        // The endpoint now serves a CRL that no longer lists the serial.
        Mock::given(method("GET"))
            .and(path("/ca.crl"))
            .respond_with(
                ResponseTemplate::new(200).set_body_bytes(crl_der(&build_crl(&ca, &[], None))),
            )
            .mount(&server)
            .await;

        let (caches, validator) = validator();
        let store = store_with(&ca);

        // Seed a stale CRL that still lists the certificate.
        caches
            .cache_for("acme")
            .put(
                &url,
                build_crl(
                    &ca,
                    &[serial],
                    Some(SystemTime::now() - Duration::from_secs(3600)),
                ),
            )
            .await;

        let before = validator
            .validate(&leaf, &store, &CertificatePolicy::default(), "acme")
            .await;
        assert!(matches!(
            before,
            Err(ValidationError::CertificateRevoked { .. })
        ));

        caches.refresh_tenant("acme").await;

        let after = validator
            .validate(&leaf, &store, &CertificatePolicy::default(), "acme")
            .await
            .unwrap();
        assert_eq!(after, ValidationOutcome::Valid);
    }

    #[test_log::test(tokio::test)]
    async fn stale_cached_crl_still_answers_validations() {
        let ca = test_ca("CN=Network Validator CA");
        let server = MockServer::start().await;
        let url = format!("{}/ca.crl", server.uri());
        let leaf = issue_leaf("CN=client", &ca, &[&url]);

        // The endpoint must not be contacted: the stale entry serves.
        Mock::given(method("GET"))
            .and(path("/ca.crl"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;

        let (caches, validator) = validator();
        caches
            .cache_for("acme")
            .put(
                &url,
                build_crl(
                    &ca,
                    &[],
                    Some(SystemTime::now() - Duration::from_secs(3600)),
                ),
            )
            .await;

        let outcome = validator
            .validate(&leaf, &store_with(&ca), &CertificatePolicy::default(), "acme")
            .await
            .unwrap();
        assert_eq!(outcome, ValidationOutcome::Valid);
    }
}
