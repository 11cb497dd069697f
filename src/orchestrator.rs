//! Two-phase provider fetch feeding the resolver.
//!
//! Phase one queries every identity provider concurrently. Phase two searches
//! news by the company name phase one resolved, consulting the per-domain news
//! cache first. Every payload is appended to the audit trail before
//! resolution. Personal mailbox domains skip the company lookups and news.

use chrono::Utc;
use futures::future::join_all;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{
    NormalizedProfile, ProviderSource, QuickEnrichResponse, RawSourcePayload, SourceData,
    SourcePayloads,
};
use crate::providers::{is_free_email_domain, EnrichmentProvider, Lookup, ProviderSet};
use crate::resolver::{estimate_employee_count, resolve_company_name, resolve_profile};
use crate::store::{ProfileStore, StagingStatus};

/// Company domain for an email, preferring an explicit one.
pub fn domain_for(email: &str, domain: Option<&str>) -> Result<String, AppError> {
    if let Some(d) = domain.map(str::trim).filter(|d| !d.is_empty()) {
        return Ok(d.to_lowercase());
    }
    match email.rsplit_once('@') {
        Some((local, d)) if !local.is_empty() && !d.is_empty() => Ok(d.to_lowercase()),
        _ => Err(AppError::BadRequest(format!(
            "Cannot derive a company domain from '{}'",
            email
        ))),
    }
}

/// Calls one provider, turning errors and timeouts into failed payloads.
pub async fn fetch_isolated(
    provider: &dyn EnrichmentProvider,
    lookup: &Lookup,
    timeout: Duration,
) -> RawSourcePayload {
    let source = provider.source();
    match tokio::time::timeout(timeout, provider.fetch(lookup)).await {
        Ok(Ok(payload)) => payload,
        Ok(Err(e)) => {
            tracing::warn!("⚠ {} fetch failed for {}: {}", source.as_str(), lookup.email, e);
            RawSourcePayload::failed(source, e.to_string())
        }
        Err(_) => {
            tracing::warn!(
                "⚠ {} fetch timed out after {:?} for {}",
                source.as_str(),
                timeout,
                lookup.email
            );
            RawSourcePayload::failed(source, format!("Timed out after {:?}", timeout))
        }
    }
}

/// Runs `task` over `items` with at most `concurrency` in flight, keeping input order.
pub async fn bounded_batch<I, T, F, Fut>(items: Vec<I>, concurrency: usize, task: F) -> Vec<T>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = T>,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let futures = items.into_iter().map(|item| {
        let semaphore = Arc::clone(&semaphore);
        let fut = task(item);
        async move {
            // The semaphore is never closed.
            let _permit = semaphore.acquire_owned().await.ok();
            fut.await
        }
    });
    join_all(futures).await
}

/// Fetches, audits and resolves one identity.
pub struct SourceResolver {
    providers: ProviderSet,
    store: Arc<dyn ProfileStore>,
    fetch_timeout: Duration,
    news_max_age: chrono::Duration,
}

impl SourceResolver {
    pub fn new(config: &Config, providers: ProviderSet, store: Arc<dyn ProfileStore>) -> Self {
        Self {
            providers,
            store,
            // Slightly above the client timeout so the client error wins.
            fetch_timeout: Duration::from_secs(config.provider_timeout_secs + 1),
            news_max_age: chrono::Duration::hours(config.news_cache_max_age_hours),
        }
    }

    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub async fn resolve(&self, email: &str, domain: Option<&str>) -> Result<NormalizedProfile, AppError> {
        let domain = domain_for(email, domain)?;
        tracing::info!("Resolving profile for {} ({})", email, domain);

        let placeholder = NormalizedProfile {
            email: email.to_string(),
            domain: domain.clone(),
            ..Default::default()
        };
        self.stage(email, &placeholder, StagingStatus::Resolving).await;

        let personal = is_free_email_domain(&domain);
        let lookup = Lookup::new(email, &domain);
        let mut payloads: SourcePayloads =
            self.fetch_identity(&lookup, personal).await.into_iter().collect();

        if personal {
            tracing::info!("⏭ Skipping company lookups and news for personal domain {}", domain);
        } else {
            let company = resolve_company_name(&payloads, &domain);
            payloads.insert(self.fetch_news(&lookup.with_company(company)).await);
        }

        for payload in payloads.iter() {
            if let Err(e) = self.store.store_raw_payload(email, payload).await {
                tracing::warn!("⚠ Failed to store {} payload: {}", payload.source.as_str(), e);
            }
        }

        let profile = resolve_profile(email, &domain, &payloads, Utc::now());
        self.stage(email, &profile, StagingStatus::Ready).await;

        tracing::info!(
            "✓ Resolved {} from {} sources (quality {:.2})",
            email,
            profile.data_sources.len(),
            profile.data_quality_score
        );
        Ok(profile)
    }

    /// Apollo and PDL company only, no audit trail, no news. Personal mailboxes
    /// answer `found: false` without calling anyone.
    pub async fn quick_lookup(&self, email: &str) -> Result<QuickEnrichResponse, AppError> {
        let domain = domain_for(email, None)?;
        let mut response = QuickEnrichResponse {
            email: email.to_string(),
            domain: domain.clone(),
            ..Default::default()
        };
        if is_free_email_domain(&domain) {
            tracing::info!("⏭ Quick enrich skipped for personal domain {}", domain);
            return Ok(response);
        }

        let lookup = Lookup::new(email, &domain);
        let payloads: SourcePayloads = join_all(
            self.providers
                .identity
                .iter()
                .filter(|p| matches!(p.source(), ProviderSource::Apollo | ProviderSource::PdlCompany))
                .map(|p| fetch_isolated(p.as_ref(), &lookup, self.fetch_timeout)),
        )
        .await
        .into_iter()
        .collect();

        let person = payloads.apollo();
        let company = payloads.pdl_company();
        if person.is_none() && company.is_none() {
            return Ok(response);
        }

        response.found = true;
        response.company_name = resolve_company_name(&payloads, &domain);
        response.industry = company
            .and_then(|c| c.industry.clone())
            .or_else(|| person.and_then(|p| p.industry.clone()))
            .unwrap_or_default();
        response.title = person.and_then(|p| p.title.clone()).unwrap_or_default();
        response.seniority = person.and_then(|p| p.seniority.clone()).unwrap_or_default();
        response.company_summary = company.and_then(|c| c.summary.clone()).unwrap_or_default();
        response.employee_count_range = company.and_then(|c| c.employee_count_range.clone());
        response.founded_year = company.and_then(|c| c.founded);

        let counts = [
            person
                .and_then(|p| p.company_size.as_deref())
                .and_then(estimate_employee_count),
            company.and_then(|c| c.employee_count),
        ];
        response.employee_count = counts.into_iter().flatten().max();

        tracing::info!("✓ Quick enrich for {}: found={}", email, response.found);
        Ok(response)
    }

    async fn fetch_identity(&self, lookup: &Lookup, personal: bool) -> Vec<RawSourcePayload> {
        join_all(
            self.providers
                .identity
                .iter()
                .filter(|p| !(personal && p.company_scoped()))
                .map(|p| fetch_isolated(p.as_ref(), lookup, self.fetch_timeout)),
        )
        .await
    }

    async fn fetch_news(&self, lookup: &Lookup) -> RawSourcePayload {
        match self.store.cached_news(&lookup.domain, self.news_max_age).await {
            Ok(Some(news)) => {
                tracing::info!("✓ News cache hit for {}", lookup.domain);
                return RawSourcePayload::fetched(SourceData::GNews(news));
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("⚠ News cache read failed for {}: {}", lookup.domain, e),
        }

        let payload = fetch_isolated(self.providers.news.as_ref(), lookup, self.fetch_timeout).await;
        if let (true, Some(SourceData::GNews(news))) = (payload.is_usable(), &payload.data) {
            if !news.is_complete() {
                tracing::info!("⏭ Not caching partial news for {}", lookup.domain);
                return payload;
            }
            if let Err(e) = self.store.cache_news(&lookup.domain, news).await {
                tracing::warn!("⚠ News cache write failed for {}: {}", lookup.domain, e);
            }
        }
        payload
    }

    async fn stage(&self, email: &str, profile: &NormalizedProfile, status: StagingStatus) {
        if let Err(e) = self.store.upsert_staging(email, profile, status).await {
            tracing::warn!("⚠ Failed to update staging for {}: {}", email, e);
        }
    }
}
