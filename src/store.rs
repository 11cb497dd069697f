//! Persistence for enrichment runs: the raw provider audit trail, the
//! staging table, finalized records and the per-domain news cache.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::cache_validator::SealedEntry;
use crate::errors::AppError;
use crate::models::{FinalizedRecord, NewsDigest, NormalizedProfile, RawSourcePayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingStatus {
    Resolving,
    Ready,
}

impl StagingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StagingStatus::Resolving => "resolving",
            StagingStatus::Ready => "ready",
        }
    }
}

/// Storage handle passed into the orchestrator and the HTTP layer.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Appends one provider payload to the audit trail, synthetic and failed ones included.
    async fn store_raw_payload(&self, email: &str, payload: &RawSourcePayload) -> Result<(), AppError>;

    async fn raw_payloads(&self, email: &str) -> Result<Vec<RawSourcePayload>, AppError>;

    async fn upsert_staging(
        &self,
        email: &str,
        profile: &NormalizedProfile,
        status: StagingStatus,
    ) -> Result<(), AppError>;

    /// Writes a finalized record. Later writes supersede earlier ones on read.
    async fn write_finalized(&self, record: &FinalizedRecord) -> Result<(), AppError>;

    async fn latest_finalized(&self, email: &str) -> Result<Option<FinalizedRecord>, AppError>;

    /// Cached news for a domain when fetched within `max_age`.
    async fn cached_news(&self, domain: &str, max_age: Duration) -> Result<Option<NewsDigest>, AppError>;

    async fn cache_news(&self, domain: &str, news: &NewsDigest) -> Result<(), AppError>;

    async fn health_check(&self) -> bool;
}

fn seal_news(news: &NewsDigest) -> Result<SealedEntry, AppError> {
    SealedEntry::seal(news).map_err(AppError::from)
}

/// Opens a cached news row, treating stale or tampered entries as misses.
fn open_news(stored: &serde_json::Value, max_age: Duration, now: DateTime<Utc>) -> Option<NewsDigest> {
    let entry: SealedEntry = serde_json::from_value(stored.clone()).ok()?;
    if !entry.is_fresh(max_age, now) {
        return None;
    }
    entry.open()
}

// ============ Postgres ============

pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    async fn store_raw_payload(&self, email: &str, payload: &RawSourcePayload) -> Result<(), AppError> {
        let body = serde_json::to_value(payload)?;
        sqlx::query(
            r#"
            INSERT INTO raw_data (id, email, source, payload, fetched_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(payload.source.as_str())
        .bind(&body)
        .bind(payload.fetched_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        tracing::debug!("Stored raw_data for {} from {}", email, payload.source);
        Ok(())
    }

    async fn raw_payloads(&self, email: &str) -> Result<Vec<RawSourcePayload>, AppError> {
        let rows: Vec<(serde_json::Value,)> = sqlx::query_as(
            "SELECT payload FROM raw_data WHERE email = $1 ORDER BY fetched_at",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::Database)?;

        let mut payloads = Vec::with_capacity(rows.len());
        for (body,) in rows {
            payloads.push(serde_json::from_value(body)?);
        }
        Ok(payloads)
    }

    async fn upsert_staging(
        &self,
        email: &str,
        profile: &NormalizedProfile,
        status: StagingStatus,
    ) -> Result<(), AppError> {
        let fields = serde_json::to_value(profile)?;
        sqlx::query(
            r#"
            INSERT INTO staging_normalized (email, normalized_fields, status)
            VALUES ($1, $2, $3)
            ON CONFLICT (email) DO UPDATE
            SET normalized_fields = EXCLUDED.normalized_fields,
                status = EXCLUDED.status,
                updated_at = now()
            "#,
        )
        .bind(email)
        .bind(&fields)
        .bind(status.as_str())
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        tracing::debug!("Staging record for {} is {}", email, status.as_str());
        Ok(())
    }

    async fn write_finalized(&self, record: &FinalizedRecord) -> Result<(), AppError> {
        let normalized = serde_json::to_value(&record.profile)?;
        let sources = json!(record.data_sources);
        let full = serde_json::to_value(record)?;
        sqlx::query(
            r#"
            INSERT INTO finalize_data
                (id, email, normalized_data, personalization_intro, personalization_cta,
                 data_sources, record, resolved_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&record.email)
        .bind(&normalized)
        .bind(&record.personalization.intro_hook)
        .bind(&record.personalization.cta)
        .bind(&sources)
        .bind(&full)
        .bind(record.resolved_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;

        tracing::info!("✓ Wrote finalize_data for {}", record.email);
        Ok(())
    }

    async fn latest_finalized(&self, email: &str) -> Result<Option<FinalizedRecord>, AppError> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(
            r#"
            SELECT record FROM finalize_data
            WHERE email = $1
            ORDER BY write_seq DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::Database)?;

        match row {
            Some((record,)) => Ok(Some(serde_json::from_value(record)?)),
            None => Ok(None),
        }
    }

    async fn cached_news(&self, domain: &str, max_age: Duration) -> Result<Option<NewsDigest>, AppError> {
        let row: Option<(serde_json::Value,)> =
            sqlx::query_as("SELECT news FROM company_news_cache WHERE domain = $1")
                .bind(domain)
                .fetch_optional(&self.pool)
                .await
                .map_err(AppError::Database)?;

        Ok(row.and_then(|(stored,)| open_news(&stored, max_age, Utc::now())))
    }

    async fn cache_news(&self, domain: &str, news: &NewsDigest) -> Result<(), AppError> {
        let entry = seal_news(news)?;
        sqlx::query(
            r#"
            INSERT INTO company_news_cache (domain, news, fetched_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (domain) DO UPDATE
            SET news = EXCLUDED.news, fetched_at = EXCLUDED.fetched_at
            "#,
        )
        .bind(domain)
        .bind(entry.to_json())
        .bind(entry.sealed_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::Database)?;
        Ok(())
    }

    async fn health_check(&self) -> bool {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("❌ Database health check failed: {}", e);
                false
            }
        }
    }
}

// ============ In-memory ============

#[derive(Default)]
struct MemoryTables {
    raw: HashMap<String, Vec<RawSourcePayload>>,
    staging: HashMap<String, (NormalizedProfile, StagingStatus)>,
    finalized: HashMap<String, Vec<FinalizedRecord>>,
    news: HashMap<String, serde_json::Value>,
}

/// Process-local store used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryProfileStore {
    tables: RwLock<MemoryTables>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn staging_status(&self, email: &str) -> Option<StagingStatus> {
        self.tables.read().await.staging.get(email).map(|(_, s)| *s)
    }

    /// Replaces a cached news row verbatim.
    pub async fn put_raw_news(&self, domain: &str, stored: serde_json::Value) {
        self.tables.write().await.news.insert(domain.to_string(), stored);
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn store_raw_payload(&self, email: &str, payload: &RawSourcePayload) -> Result<(), AppError> {
        self.tables
            .write()
            .await
            .raw
            .entry(email.to_string())
            .or_default()
            .push(payload.clone());
        Ok(())
    }

    async fn raw_payloads(&self, email: &str) -> Result<Vec<RawSourcePayload>, AppError> {
        Ok(self
            .tables
            .read()
            .await
            .raw
            .get(email)
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert_staging(
        &self,
        email: &str,
        profile: &NormalizedProfile,
        status: StagingStatus,
    ) -> Result<(), AppError> {
        self.tables
            .write()
            .await
            .staging
            .insert(email.to_string(), (profile.clone(), status));
        Ok(())
    }

    async fn write_finalized(&self, record: &FinalizedRecord) -> Result<(), AppError> {
        self.tables
            .write()
            .await
            .finalized
            .entry(record.email.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn latest_finalized(&self, email: &str) -> Result<Option<FinalizedRecord>, AppError> {
        let tables = self.tables.read().await;
        // Records are kept in write order.
        Ok(tables
            .finalized
            .get(email)
            .and_then(|records| records.last().cloned()))
    }

    async fn cached_news(&self, domain: &str, max_age: Duration) -> Result<Option<NewsDigest>, AppError> {
        let tables = self.tables.read().await;
        Ok(tables
            .news
            .get(domain)
            .and_then(|stored| open_news(stored, max_age, Utc::now())))
    }

    async fn cache_news(&self, domain: &str, news: &NewsDigest) -> Result<(), AppError> {
        let stored = seal_news(news)?.to_json();
        self.tables.write().await.news.insert(domain.to_string(), stored);
        Ok(())
    }

    async fn health_check(&self) -> bool {
        true
    }
}
