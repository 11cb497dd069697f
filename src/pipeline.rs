//! End-to-end enrichment: resolve, infer context, generate, persist.

use regex::Regex;
use std::sync::{Arc, LazyLock};
use uuid::Uuid;

use crate::config::Config;
use crate::context_inference::infer_context;
use crate::errors::{AppError, ResultExt};
use crate::executive_review::{ExecutiveReviewGenerator, ReviewInputs};
use crate::llm_client::{AnthropicClient, LanguageModel};
use crate::models::{
    BatchItemResult, ContextOverrides, EnrichRequest, FinalizedRecord, NormalizedProfile,
    QuickEnrichResponse,
};
use crate::orchestrator::{bounded_batch, SourceResolver};
use crate::personalization::{PersonalizationGenerator, UserContext};
use crate::providers::ProviderSet;
use crate::store::ProfileStore;

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?)+$",
    )
    .expect("email pattern is valid")
});

/// Trims and lowercases an email, rejecting anything that is not `local@domain.tld`.
pub fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    if email.len() < 5 || !EMAIL_PATTERN.is_match(&email) {
        tracing::warn!("❌ Invalid email rejected: {}", raw);
        return Err(AppError::BadRequest(format!("Invalid email address: {}", raw)));
    }
    Ok(email)
}

/// Parses a form value, dropping values outside the enumeration.
fn parse_override<T: std::str::FromStr<Err = String>>(value: &Option<String>) -> Option<T> {
    let raw = value.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
    match raw.parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::debug!("Ignoring override: {}", e);
            None
        }
    }
}

pub fn overrides_from(request: &EnrichRequest) -> ContextOverrides {
    ContextOverrides {
        journey_stage: parse_override(&request.journey_stage),
        it_environment: parse_override(&request.it_environment),
        business_priority: parse_override(&request.business_priority),
        primary_challenge: parse_override(&request.primary_challenge),
    }
}

/// Form-supplied names only fill gaps the providers left.
fn fill_names(profile: &mut NormalizedProfile, request: &EnrichRequest) {
    let given = |v: &Option<String>| v.as_deref().map(str::trim).filter(|s| !s.is_empty()).map(String::from);
    if profile.first_name.is_none() {
        profile.first_name = given(&request.first_name);
    }
    if profile.last_name.is_none() {
        profile.last_name = given(&request.last_name);
    }
}

pub struct EnrichmentPipeline {
    resolver: SourceResolver,
    personalization: PersonalizationGenerator,
    reviews: ExecutiveReviewGenerator,
    store: Arc<dyn ProfileStore>,
    batch_concurrency: usize,
}

impl EnrichmentPipeline {
    pub fn new(
        resolver: SourceResolver,
        personalization: PersonalizationGenerator,
        reviews: ExecutiveReviewGenerator,
        store: Arc<dyn ProfileStore>,
        batch_concurrency: usize,
    ) -> Self {
        Self {
            resolver,
            personalization,
            reviews,
            store,
            batch_concurrency,
        }
    }

    /// Wires the live providers and model client from configuration.
    pub fn from_config(config: &Config, store: Arc<dyn ProfileStore>) -> Result<Self, AppError> {
        let model = AnthropicClient::from_config(config)?;
        Self::with_parts(config, ProviderSet::from_config(config)?, model, store)
    }

    pub fn with_parts(
        config: &Config,
        providers: ProviderSet,
        model: Option<Arc<dyn LanguageModel>>,
        store: Arc<dyn ProfileStore>,
    ) -> Result<Self, AppError> {
        Ok(Self::new(
            SourceResolver::new(config, providers, Arc::clone(&store)),
            PersonalizationGenerator::new(config, model.clone()),
            ExecutiveReviewGenerator::new(config, model),
            store,
            config.batch_concurrency,
        ))
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    /// Enriches one lead. `request.email` must already be normalized.
    pub async fn enrich(&self, request: &EnrichRequest) -> Result<FinalizedRecord, AppError> {
        let email = request.email.as_str();
        let mut profile = self.resolver.resolve(email, request.domain.as_deref()).await?;
        fill_names(&mut profile, request);

        let context = infer_context(&profile, &overrides_from(request));
        let user = UserContext::from(request);
        let inputs = ReviewInputs::from_profile(
            &profile,
            &context,
            request.persona.as_deref(),
            request.company_size.as_deref(),
        );

        let (personalization, executive_review) = tokio::join!(
            self.personalization.generate(&profile, &user),
            self.reviews.generate(&inputs)
        );

        let record = FinalizedRecord {
            email: email.to_string(),
            data_sources: profile.data_sources.clone(),
            resolved_at: profile.resolved_at,
            profile,
            context,
            personalization,
            executive_review,
        };

        self.store
            .write_finalized(&record)
            .await
            .with_context(|| format!("Failed to persist finalized record for {}", email))?;
        tracing::info!(
            "✓ Enrichment complete for {} (review via {})",
            email,
            record.executive_review.model_used
        );
        Ok(record)
    }

    /// Company pre-fill from the fast providers only; nothing is generated or stored.
    pub async fn quick_enrich(&self, raw_email: &str) -> Result<QuickEnrichResponse, AppError> {
        let email = normalize_email(raw_email)?;
        self.resolver.quick_lookup(&email).await
    }

    /// Enriches many emails with bounded concurrency. Failures are reported per item.
    pub async fn enrich_batch(&self, emails: Vec<String>) -> Vec<BatchItemResult> {
        tracing::info!("Batch enrichment: {} emails ({} concurrent)", emails.len(), self.batch_concurrency);
        bounded_batch(emails, self.batch_concurrency, |raw| async move {
            let outcome = match normalize_email(&raw) {
                Ok(email) => {
                    let request = EnrichRequest {
                        email,
                        ..Default::default()
                    };
                    self.enrich(&request).await
                }
                Err(e) => Err(e),
            };
            match outcome {
                Ok(record) => BatchItemResult {
                    email: record.email,
                    status: "completed".to_string(),
                    job_id: Some(Uuid::new_v4()),
                    data_quality_score: Some(record.profile.data_quality_score),
                    error: None,
                },
                Err(e) => {
                    tracing::error!("❌ Batch item {} failed: {}", raw, e);
                    BatchItemResult {
                        email: raw,
                        status: "failed".to_string(),
                        job_id: None,
                        data_quality_score: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .await
    }
}
