//! Tenant-scoped CRL caching.

use std::{sync::Arc, time::SystemTime};

use dashmap::DashMap;
use der::Decode;
use moka::future::Cache;
use serde::{Deserialize, Serialize};
use x509_cert::crl::CertificateList;

use super::{error::CrlError, http::HttpClient};

fn default_max_cached_crls() -> u64 {
    100
}

fn default_max_crl_bytes() -> usize {
    10 * 1024 * 1024
}

/// Sizing knobs for per-tenant CRL caches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrlCacheConfig {
    /// Entry bound of each tenant's cache; least recently used entries are
    /// evicted beyond it.
    #[serde(default = "default_max_cached_crls")]
    pub max_cached_crls: u64,

    /// Largest CRL body accepted from the network.
    #[serde(default = "default_max_crl_bytes")]
    pub max_crl_bytes: usize,
}

impl Default for CrlCacheConfig {
    fn default() -> Self {
        Self {
            max_cached_crls: default_max_cached_crls(),
            max_crl_bytes: default_max_crl_bytes(),
        }
    }
}

/// A parsed CRL plus bookkeeping about where and when it was obtained.
#[derive(Debug)]
pub struct CachedCrl {
    /// Source the CRL was downloaded from (or seeded under).
    pub url: String,
    pub crl: CertificateList,
    pub fetched_at: SystemTime,
}

impl CachedCrl {
    fn new(url: impl Into<String>, crl: CertificateList) -> Self {
        Self {
            url: url.into(),
            crl,
            fetched_at: SystemTime::now(),
        }
    }

    /// When the issuer promises the next CRL, if it promises one.
    pub fn next_update(&self) -> Option<SystemTime> {
        self.crl
            .tbs_cert_list
            .next_update
            .map(|time| time.to_system_time())
    }

    /// Whether the CRL's nextUpdate has passed. CRLs without a nextUpdate
    /// never go stale.
    pub fn is_stale(&self, now: SystemTime) -> bool {
        match self.next_update() {
            Some(next_update) => now > next_update,
            None => false,
        }
    }
}

/// One tenant's CRL cache, keyed by source URL.
///
/// Reads serve whatever is cached, stale or not; only [`CrlCache::refresh`]
/// re-downloads, so validation latency stops depending on CRL endpoints
/// once an entry exists. Concurrent misses for one URL may download twice;
/// the last insert wins, which is harmless for CRLs.
pub struct CrlCache<C> {
    entries: Cache<String, Arc<CachedCrl>>,
    http: C,
    max_crl_bytes: usize,
}

impl<C: HttpClient> CrlCache<C> {
    pub fn new(http: C, config: &CrlCacheConfig) -> Self {
        Self {
            entries: Cache::builder().max_capacity(config.max_cached_crls).build(),
            http,
            max_crl_bytes: config.max_crl_bytes,
        }
    }

    /// The current entry for `url`, stale or not. Never touches the
    /// network.
    pub async fn get(&self, url: &str) -> Option<Arc<CachedCrl>> {
        self.entries.get(url).await
    }

    /// Store a CRL under `url`, replacing any existing entry.
    pub async fn put(&self, url: impl Into<String>, crl: CertificateList) {
        let url = url.into();
        let entry = Arc::new(CachedCrl::new(url.clone(), crl));
        self.entries.insert(url, entry).await;
    }

    /// The cached entry if present, otherwise download, cache, and return.
    ///
    /// A present-but-stale entry is returned as-is; replacing it is the
    /// refresh sweep's business, not the validation path's.
    pub async fn get_or_download(&self, url: &str) -> Result<Arc<CachedCrl>, CrlError> {
        if let Some(entry) = self.entries.get(url).await {
            tracing::debug!(url, "CRL cache hit");
            return Ok(entry);
        }

        tracing::debug!(url, "CRL cache miss, downloading");
        let crl = self.download(url).await?;
        let entry = Arc::new(CachedCrl::new(url, crl));
        self.entries.insert(url.to_string(), Arc::clone(&entry)).await;
        Ok(entry)
    }

    /// Re-download every entry whose nextUpdate has passed.
    ///
    /// Fresh entries are left alone. A failed re-download keeps the old
    /// entry in place; failures are collected and reported together once
    /// the whole sweep has run.
    pub async fn refresh(&self) -> Result<(), CrlError> {
        let now = SystemTime::now();
        let stale: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_stale(now))
            .map(|(url, _)| url.as_ref().clone())
            .collect();

        let mut errors = Vec::new();
        for url in stale {
            match self.download(&url).await {
                Ok(crl) => {
                    tracing::debug!(url = %url, "refreshed stale CRL");
                    let entry = Arc::new(CachedCrl::new(url.clone(), crl));
                    self.entries.insert(url, entry).await;
                }
                Err(e) => {
                    tracing::warn!(url = %url, "failed to refresh CRL: {e}");
                    errors.push(format!("{url}: {e}"));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CrlError::RefreshFailed { errors })
        }
    }

    /// Number of cached CRLs.
    pub fn len(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    async fn download(&self, url: &str) -> Result<CertificateList, CrlError> {
        if !has_supported_scheme(url) {
            return Err(CrlError::UnsupportedScheme {
                url: url.to_string(),
            });
        }

        let response = self.http.fetch(url).await.map_err(|e| CrlError::Fetch {
            url: url.to_string(),
            source: Box::new(e),
        })?;

        if !response.is_success() {
            return Err(CrlError::Status {
                url: url.to_string(),
                status: response.status,
            });
        }

        if response.body.len() > self.max_crl_bytes {
            return Err(CrlError::TooLarge {
                url: url.to_string(),
                size: response.body.len(),
                limit: self.max_crl_bytes,
            });
        }

        Ok(CertificateList::from_der(&response.body)?)
    }
}

/// Only http and https URLs are ever dialed. LDAP distribution points in
/// particular are recognized and refused rather than attempted.
pub(crate) fn has_supported_scheme(url: &str) -> bool {
    let url = url.trim_start().to_ascii_lowercase();
    url.starts_with("http://") || url.starts_with("https://")
}

/// Registry of per-tenant CRL caches.
///
/// Constructed once at service startup and shared behind an `Arc` by every
/// validator; there is no process-global instance. Tenants get a cache
/// lazily on first use and keep it until [`TenantCrlCache::remove`] at
/// tenant teardown, so one tenant's CRL churn cannot evict another's
/// entries.
pub struct TenantCrlCache<C> {
    tenants: DashMap<String, Arc<CrlCache<C>>>,
    http: C,
    config: CrlCacheConfig,
}

impl<C: HttpClient + Clone> TenantCrlCache<C> {
    pub fn new(http: C) -> Self {
        Self::with_config(http, CrlCacheConfig::default())
    }

    pub fn with_config(http: C, config: CrlCacheConfig) -> Self {
        Self {
            tenants: DashMap::new(),
            http,
            config,
        }
    }

    /// The tenant's cache, created on first use.
    pub fn cache_for(&self, tenant: &str) -> Arc<CrlCache<C>> {
        self.tenants
            .entry(tenant.to_string())
            .or_insert_with(|| Arc::new(CrlCache::new(self.http.clone(), &self.config)))
            .value()
            .clone()
    }

    /// Drop a tenant's cache, for tenant deletion. Unknown tenants are a
    /// no-op.
    pub fn remove(&self, tenant: &str) {
        self.tenants.remove(tenant);
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }

    /// Run the refresh sweep for one tenant.
    ///
    /// Meant to be driven by a periodic scheduler. Failures are logged
    /// rather than returned: a broken CRL endpoint must not take the
    /// refresh loop down, and the previous entries stay in service.
    pub async fn refresh_tenant(&self, tenant: &str) {
        // Clone the handle out so no map guard is held across an await.
        let cache = self
            .tenants
            .get(tenant)
            .map(|entry| Arc::clone(entry.value()));

        let Some(cache) = cache else {
            tracing::debug!(tenant, "no CRL cache for tenant, nothing to refresh");
            return;
        };

        if let Err(e) = cache.refresh().await {
            tracing::warn!(tenant, "CRL refresh incomplete: {e}");
        }
    }
}
