use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use moka::future::Cache;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use uuid::Uuid;

use crate::cache_validator::SealedEntry;
use crate::errors::AppError;
use crate::models::{
    BatchEnrichRequest, EnrichRequest, EnrichResponse, FinalizedRecord, ProfileSummary,
    QuickEnrichRequest, QuickEnrichResponse,
};
use crate::pipeline::{normalize_email, EnrichmentPipeline};

const MAX_BATCH_SIZE: usize = 100;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<EnrichmentPipeline>,
    /// Emails with an enrichment in flight, keyed to the claim timestamp (µs).
    pub processing_cache: Cache<String, i64>,
    /// Latest finalized record per email, sealed.
    pub profile_cache: Cache<String, SealedEntry>,
}

impl AppState {
    pub fn new(pipeline: Arc<EnrichmentPipeline>) -> Self {
        Self {
            pipeline,
            processing_cache: Cache::builder()
                .time_to_live(Duration::from_secs(300))
                .max_capacity(10_000)
                .build(),
            profile_cache: Cache::builder()
                .time_to_live(Duration::from_secs(300))
                .max_capacity(10_000)
                .build(),
        }
    }

    async fn remember(&self, record: &FinalizedRecord) {
        match SealedEntry::seal(record) {
            Ok(entry) => self.profile_cache.insert(record.email.clone(), entry).await,
            Err(e) => tracing::warn!("⚠ Could not cache profile for {}: {}", record.email, e),
        }
    }
}

/// Routes plus body limit, tracing and CORS. Rate limiting is applied to the
/// `/rad` routes when `rate_limited` is set.
pub fn build_router(state: Arc<AppState>, rate_limited: bool) -> anyhow::Result<Router> {
    let rad_routes = Router::new()
        .route("/rad/enrich", post(enrich))
        .route("/rad/enrich/batch", post(enrich_batch))
        .route("/rad/quick-enrich", post(quick_enrich))
        .route("/rad/profile/:email", get(get_profile))
        .route("/rad/health", get(rad_health))
        .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024));

    let rad_routes = if rate_limited {
        // 10 requests/second per IP, burst of 20
        let governor_conf = Arc::new(
            GovernorConfigBuilder::default()
                .per_second(10)
                .burst_size(20)
                .key_extractor(SmartIpKeyExtractor)
                .finish()
                .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
        );
        rad_routes.layer(ServiceBuilder::new().layer(GovernorLayer {
            config: governor_conf,
        }))
    } else {
        rad_routes
    };

    Ok(Router::new()
        .route("/health", get(health))
        .merge(rad_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()))
}

/// Liveness for the load balancer; bypasses rate limiting.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "rad-enrichment-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /rad/health
///
/// Reports storage reachability.
pub async fn rad_health(State(state): State<Arc<AppState>>) -> (StatusCode, Json<serde_json::Value>) {
    let healthy = state.pipeline.store().health_check().await;
    let (code, status) = if healthy {
        (StatusCode::OK, "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "unhealthy")
    };
    (
        code,
        Json(json!({
            "status": status,
            "service": "rad_enrichment",
            "timestamp": chrono::Utc::now().to_rfc3339()
        })),
    )
}

/// Claims `email` for processing. `Err` carries the response for a duplicate.
async fn claim(state: &AppState, email: &str) -> Result<i64, Response> {
    let now = chrono::Utc::now().timestamp_micros();

    if let Some(since) = state.processing_cache.get(email).await {
        let seconds_ago = (now - since) / 1_000_000;
        tracing::warn!(
            "⏭ DUPLICATE REQUEST BLOCKED - {} already being enriched ({} seconds ago)",
            email,
            seconds_ago
        );
        return Err(duplicate_response(
            email,
            format!("Enrichment already in progress (started {} seconds ago).", seconds_ago),
        ));
    }

    state.processing_cache.insert(email.to_string(), now).await;

    // Let racing requests overwrite the claim before re-checking it.
    tokio::time::sleep(Duration::from_millis(100)).await;

    if let Some(claimed) = state.processing_cache.get(email).await {
        if claimed != now {
            tracing::warn!("⏭ RACE CONDITION DETECTED - another request won for {}", email);
            return Err(duplicate_response(
                email,
                "Another concurrent request is enriching this email.".to_string(),
            ));
        }
    }
    Ok(now)
}

fn duplicate_response(email: &str, message: String) -> Response {
    (
        StatusCode::ACCEPTED,
        Json(json!({
            "status": "processing",
            "message": message,
            "email": email,
            "duplicate_request": true
        })),
    )
        .into_response()
}

/// POST /rad/enrich
pub async fn enrich(
    State(state): State<Arc<AppState>>,
    Json(mut payload): Json<EnrichRequest>,
) -> Result<Response, AppError> {
    payload.email = normalize_email(&payload.email)?;
    let email = payload.email.clone();
    tracing::info!("POST /rad/enrich - {}", email);

    let claim_time = match claim(&state, &email).await {
        Ok(at) => at,
        Err(duplicate) => return Ok(duplicate),
    };

    let outcome = state.pipeline.enrich(&payload).await;

    if state.processing_cache.get(&email).await == Some(claim_time) {
        state.processing_cache.invalidate(&email).await;
    }

    let record = outcome?;
    state.remember(&record).await;

    let response = EnrichResponse {
        job_id: Uuid::new_v4(),
        status: "completed".to_string(),
        profile: ProfileSummary::from(&record.profile),
        context: record.context,
        personalization: record.personalization,
        executive_review: record.executive_review,
    };
    Ok(Json(response).into_response())
}

/// POST /rad/enrich/batch
pub async fn enrich_batch(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<BatchEnrichRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if payload.emails.is_empty() {
        return Err(AppError::BadRequest("At least one email is required".to_string()));
    }
    if payload.emails.len() > MAX_BATCH_SIZE {
        return Err(AppError::BadRequest(format!(
            "Batch size {} exceeds the limit of {}",
            payload.emails.len(),
            MAX_BATCH_SIZE
        )));
    }
    tracing::info!("POST /rad/enrich/batch - {} emails", payload.emails.len());

    let total = payload.emails.len();
    let results = state.pipeline.enrich_batch(payload.emails).await;
    let mut completed = 0;
    for result in results.iter().filter(|r| r.status == "completed") {
        // newer record in the store; the next read reloads it
        state.profile_cache.invalidate(&result.email).await;
        completed += 1;
    }

    Ok(Json(json!({
        "total": total,
        "completed": completed,
        "failed": total - completed,
        "results": results
    })))
}

/// POST /rad/quick-enrich
pub async fn quick_enrich(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<QuickEnrichRequest>,
) -> Result<Json<QuickEnrichResponse>, AppError> {
    tracing::info!("POST /rad/quick-enrich - {}", payload.email.trim());
    Ok(Json(state.pipeline.quick_enrich(&payload.email).await?))
}

/// GET /rad/profile/:email
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(email): Path<String>,
) -> Result<Json<FinalizedRecord>, AppError> {
    let email = email.trim().to_lowercase();

    if let Some(entry) = state.profile_cache.get(&email).await {
        if let Some(record) = entry.open::<FinalizedRecord>() {
            tracing::debug!("✓ Profile cache hit for {}", email);
            return Ok(Json(record));
        }
        state.profile_cache.invalidate(&email).await;
    }

    match state.pipeline.store().latest_finalized(&email).await? {
        Some(record) => {
            state.remember(&record).await;
            Ok(Json(record))
        }
        None => Err(AppError::NotFound(format!(
            "No profile found for {}. Run POST /rad/enrich first.",
            email
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::models::{PdlCompany, ProviderSource, RawSourcePayload, SourceData, ZoomInfoCompany};
    use crate::providers::{EnrichmentProvider, Lookup, ProviderSet};
    use crate::store::MemoryProfileStore;
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct Slow;

    #[async_trait]
    impl EnrichmentProvider for Slow {
        fn source(&self) -> ProviderSource {
            ProviderSource::ZoomInfo
        }

        async fn fetch(&self, _lookup: &Lookup) -> Result<RawSourcePayload, AppError> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(RawSourcePayload::fetched(SourceData::ZoomInfo(ZoomInfoCompany {
                company_name: Some("Acme".to_string()),
                ..Default::default()
            })))
        }
    }

    /// Names the company after how many times it has been asked.
    #[derive(Default)]
    struct Versioned(AtomicUsize);

    #[async_trait]
    impl EnrichmentProvider for Versioned {
        fn source(&self) -> ProviderSource {
            ProviderSource::PdlCompany
        }

        async fn fetch(&self, _lookup: &Lookup) -> Result<RawSourcePayload, AppError> {
            let version = self.0.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(RawSourcePayload::fetched(SourceData::PdlCompany(PdlCompany {
                display_name: Some(format!("Acme v{}", version)),
                ..Default::default()
            })))
        }
    }

    struct NoNews;

    #[async_trait]
    impl EnrichmentProvider for NoNews {
        fn source(&self) -> ProviderSource {
            ProviderSource::GNews
        }

        async fn fetch(&self, _lookup: &Lookup) -> Result<RawSourcePayload, AppError> {
            Ok(RawSourcePayload::fetched(SourceData::GNews(Default::default())))
        }
    }

    async fn company_in(app: &Router, request: Request<Body>) -> serde_json::Value {
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        body["profile"]["company_name"].clone()
    }

    fn post(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_profile_request() -> Request<Body> {
        Request::builder()
            .uri("/rad/profile/jane@acme.com")
            .body(Body::empty())
            .unwrap()
    }

    fn state() -> Arc<AppState> {
        let providers = ProviderSet {
            identity: vec![Arc::new(Slow)],
            news: Arc::new(Slow),
        };
        let pipeline = EnrichmentPipeline::with_parts(
            &Config::default(),
            providers,
            None,
            Arc::new(MemoryProfileStore::new()),
        )
        .unwrap();
        Arc::new(AppState::new(Arc::new(pipeline)))
    }

    #[tokio::test]
    async fn test_duplicate_claim_is_rejected() {
        let state = state();
        assert!(claim(&state, "a@acme.com").await.is_ok());
        let second = claim(&state, "a@acme.com").await.unwrap_err();
        assert_eq!(second.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_invalid_email_is_bad_request() {
        let app = build_router(state(), false).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/rad/enrich")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"email":"nope"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_quick_enrich_personal_mailbox() {
        let app = build_router(state(), false).unwrap();

        let response = app
            .clone()
            .oneshot(post("/rad/quick-enrich", json!({"email": " Jane@Gmail.com "})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["found"], false);
        assert_eq!(body["email"], "jane@gmail.com");
        assert_eq!(body["company_name"], "");

        let response = app
            .oneshot(post("/rad/quick-enrich", json!({"email": "jane"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_profile_is_not_found() {
        let app = build_router(state(), false).unwrap();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/rad/profile/ghost@acme.com")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_profile_read_sees_batch_rewrite() {
        let providers = ProviderSet {
            identity: vec![Arc::new(Versioned::default())],
            news: Arc::new(NoNews),
        };
        let pipeline = EnrichmentPipeline::with_parts(
            &Config::default(),
            providers,
            None,
            Arc::new(MemoryProfileStore::new()),
        )
        .unwrap();
        let app = build_router(Arc::new(AppState::new(Arc::new(pipeline))), false).unwrap();

        let response = app
            .clone()
            .oneshot(post("/rad/enrich", json!({"email": "jane@acme.com"})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(company_in(&app, get_profile_request()).await, "Acme v1");

        let response = app
            .clone()
            .oneshot(post("/rad/enrich/batch", json!({"emails": ["jane@acme.com"]})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(company_in(&app, get_profile_request()).await, "Acme v2");
    }
}
