use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============ Provider Payloads ============

/// A third-party data provider consulted during enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderSource {
    #[serde(rename = "apollo")]
    Apollo,
    #[serde(rename = "zoominfo")]
    ZoomInfo,
    #[serde(rename = "pdl_company")]
    PdlCompany,
    #[serde(rename = "pdl")]
    Pdl,
    #[serde(rename = "hunter")]
    Hunter,
    #[serde(rename = "gnews")]
    GNews,
}

impl ProviderSource {
    /// Every provider, in trust-table order.
    pub const ALL: [ProviderSource; 6] = [
        ProviderSource::Apollo,
        ProviderSource::ZoomInfo,
        ProviderSource::PdlCompany,
        ProviderSource::Pdl,
        ProviderSource::Hunter,
        ProviderSource::GNews,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderSource::Apollo => "apollo",
            ProviderSource::ZoomInfo => "zoominfo",
            ProviderSource::PdlCompany => "pdl_company",
            ProviderSource::Pdl => "pdl",
            ProviderSource::Hunter => "hunter",
            ProviderSource::GNews => "gnews",
        }
    }

    /// Static trust rank; higher wins when providers disagree.
    pub fn trust_priority(&self) -> u8 {
        match self {
            ProviderSource::Apollo => 5,
            ProviderSource::ZoomInfo | ProviderSource::PdlCompany => 4,
            ProviderSource::Pdl => 3,
            ProviderSource::Hunter => 2,
            ProviderSource::GNews => 1,
        }
    }
}

impl fmt::Display for ProviderSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Contact match from the primary contact-enrichment API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApolloPerson {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub seniority: Option<String>,
    pub departments: Vec<String>,
    pub linkedin_url: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub company_name: Option<String>,
    pub company_size: Option<String>,
    pub industry: Option<String>,
}

/// One employment entry from the person-enrichment API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdlExperience {
    pub company: Option<String>,
    pub title: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Person record from the secondary contact-enrichment API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdlPerson {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub job_title: Option<String>,
    pub job_company_name: Option<String>,
    pub job_company_industry: Option<String>,
    pub job_company_size: Option<String>,
    pub linkedin_url: Option<String>,
    pub location_locality: Option<String>,
    pub location_region: Option<String>,
    pub location_country: Option<String>,
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    pub experience: Vec<PdlExperience>,
}

/// Deliverability verdict for the lookup email.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HunterVerification {
    pub status: Option<String>,
    pub result: Option<String>,
    pub score: Option<i64>,
}

/// Firmographics from the secondary company API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomInfoCompany {
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub employee_count: Option<i64>,
    pub revenue: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    pub founded_year: Option<i32>,
}

/// Deep company profile.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdlCompany {
    pub name: Option<String>,
    pub display_name: Option<String>,
    pub industry: Option<String>,
    pub size: Option<String>,
    pub employee_count: Option<i64>,
    pub employee_count_range: Option<String>,
    pub locality: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub summary: Option<String>,
    pub headline: Option<String>,
    pub founded: Option<i32>,
    pub company_type: Option<String>,
    pub ticker: Option<String>,
    pub naics_codes: Vec<String>,
    pub sic_codes: Vec<String>,
    pub tags: Vec<String>,
    pub total_funding_raised: Option<f64>,
    pub latest_funding_stage: Option<String>,
    pub employee_growth_rate: Option<f64>,
    pub inferred_revenue: Option<String>,
    pub linkedin_url: Option<String>,
}

/// A single news article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsArticle {
    pub title: String,
    pub content: String,
    pub url: Option<String>,
    pub published_date: Option<String>,
    pub source: Option<String>,
    /// Search query that found the article (`general`, `ai_technology`, `rss`).
    pub query_category: Option<String>,
}

/// Outcome counts for the queries behind one news digest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryStats {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Company news search results with derived themes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsDigest {
    /// Short summary of the coverage.
    pub answer: Option<String>,
    pub results: Vec<NewsArticle>,
    pub result_count: usize,
    pub themes: Vec<String>,
    pub sentiment: Option<String>,
    pub categorized: BTreeMap<String, Vec<NewsArticle>>,
    /// Feed the articles came from: `gnews` or `google_news_rss`.
    pub feed: Option<String>,
    /// GNews refused at least one query for quota reasons.
    pub quota_exhausted: bool,
    pub query_stats: Option<QueryStats>,
}

impl NewsDigest {
    /// Every query answered and none hit a quota. Only complete digests are cached.
    pub fn is_complete(&self) -> bool {
        !self.quota_exhausted && self.query_stats.map_or(true, |s| s.failed == 0)
    }
}

/// One provider's structured response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "provider", content = "fields", rename_all = "snake_case")]
pub enum SourceData {
    Apollo(ApolloPerson),
    Pdl(PdlPerson),
    Hunter(HunterVerification),
    #[serde(rename = "zoominfo")]
    ZoomInfo(ZoomInfoCompany),
    PdlCompany(PdlCompany),
    #[serde(rename = "gnews")]
    GNews(NewsDigest),
}

impl SourceData {
    pub fn source(&self) -> ProviderSource {
        match self {
            SourceData::Apollo(_) => ProviderSource::Apollo,
            SourceData::Pdl(_) => ProviderSource::Pdl,
            SourceData::Hunter(_) => ProviderSource::Hunter,
            SourceData::ZoomInfo(_) => ProviderSource::ZoomInfo,
            SourceData::PdlCompany(_) => ProviderSource::PdlCompany,
            SourceData::GNews(_) => ProviderSource::GNews,
        }
    }
}

/// One provider's response for one identity lookup.
///
/// Created per enrichment request and persisted as an audit trail. Never
/// mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSourcePayload {
    /// Provider that produced this payload.
    pub source: ProviderSource,
    /// Structured fields, absent when the call failed.
    pub data: Option<SourceData>,
    /// Error description when the call failed.
    pub error: Option<String>,
    /// Mock payload produced without credentials; never resolved.
    pub synthetic: bool,
    /// When the provider answered.
    pub fetched_at: DateTime<Utc>,
}

impl RawSourcePayload {
    pub fn fetched(data: SourceData) -> Self {
        Self {
            source: data.source(),
            data: Some(data),
            error: None,
            synthetic: false,
            fetched_at: Utc::now(),
        }
    }

    pub fn synthetic(data: SourceData) -> Self {
        Self {
            synthetic: true,
            ..Self::fetched(data)
        }
    }

    pub fn failed(source: ProviderSource, error: impl Into<String>) -> Self {
        Self {
            source,
            data: None,
            error: Some(error.into()),
            synthetic: false,
            fetched_at: Utc::now(),
        }
    }

    /// Only usable payloads may contribute values to a profile.
    pub fn is_usable(&self) -> bool {
        self.data.is_some() && self.error.is_none() && !self.synthetic
    }
}

/// The payloads gathered for one lookup, keyed by provider.
#[derive(Debug, Clone, Default)]
pub struct SourcePayloads {
    payloads: BTreeMap<ProviderSource, RawSourcePayload>,
}

impl SourcePayloads {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a payload, replacing any earlier one from the same provider.
    pub fn insert(&mut self, payload: RawSourcePayload) {
        self.payloads.insert(payload.source, payload);
    }

    pub fn get(&self, source: ProviderSource) -> Option<&RawSourcePayload> {
        self.payloads.get(&source)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RawSourcePayload> {
        self.payloads.values()
    }

    fn usable(&self, source: ProviderSource) -> Option<&SourceData> {
        self.payloads
            .get(&source)
            .filter(|p| p.is_usable())
            .and_then(|p| p.data.as_ref())
    }

    pub fn apollo(&self) -> Option<&ApolloPerson> {
        match self.usable(ProviderSource::Apollo) {
            Some(SourceData::Apollo(p)) => Some(p),
            _ => None,
        }
    }

    pub fn pdl(&self) -> Option<&PdlPerson> {
        match self.usable(ProviderSource::Pdl) {
            Some(SourceData::Pdl(p)) => Some(p),
            _ => None,
        }
    }

    pub fn hunter(&self) -> Option<&HunterVerification> {
        match self.usable(ProviderSource::Hunter) {
            Some(SourceData::Hunter(h)) => Some(h),
            _ => None,
        }
    }

    pub fn zoominfo(&self) -> Option<&ZoomInfoCompany> {
        match self.usable(ProviderSource::ZoomInfo) {
            Some(SourceData::ZoomInfo(z)) => Some(z),
            _ => None,
        }
    }

    pub fn pdl_company(&self) -> Option<&PdlCompany> {
        match self.usable(ProviderSource::PdlCompany) {
            Some(SourceData::PdlCompany(c)) => Some(c),
            _ => None,
        }
    }

    pub fn gnews(&self) -> Option<&NewsDigest> {
        match self.usable(ProviderSource::GNews) {
            Some(SourceData::GNews(n)) => Some(n),
            _ => None,
        }
    }

    /// Usable providers, in trust-table order.
    pub fn usable_sources(&self) -> Vec<ProviderSource> {
        ProviderSource::ALL
            .into_iter()
            .filter(|s| self.usable(*s).is_some())
            .collect()
    }
}

impl FromIterator<RawSourcePayload> for SourcePayloads {
    fn from_iter<I: IntoIterator<Item = RawSourcePayload>>(iter: I) -> Self {
        let mut set = Self::new();
        for payload in iter {
            set.insert(payload);
        }
        set
    }
}

// ============ Normalized Profile ============

/// Weighted field-coverage report over the three importance tiers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletenessReport {
    /// Weighted present / weighted total, rounded to 2 decimals.
    pub score: f64,
    /// `"present/total"` over all tracked fields.
    pub field_coverage: String,
    pub present: Vec<String>,
    pub missing_critical: Vec<String>,
    pub missing_important: Vec<String>,
    pub missing_nice: Vec<String>,
}

/// The resolved contact and company.
///
/// Every populated field originates from at least one usable provider payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizedProfile {
    pub email: String,
    pub domain: String,

    // Identity
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub full_name: Option<String>,
    pub title: Option<String>,
    pub seniority: Option<String>,
    pub departments: Vec<String>,
    pub skills: Vec<String>,
    pub interests: Vec<String>,
    pub experience: Vec<PdlExperience>,
    pub linkedin_url: Option<String>,

    // Company
    pub company_name: Option<String>,
    pub company_display_name: Option<String>,
    /// Canonical industry bucket.
    pub industry: Option<String>,
    /// Industry string exactly as the winning provider reported it.
    pub industry_raw: Option<String>,
    pub company_size: Option<String>,
    pub employee_count: Option<i64>,
    pub employee_count_range: Option<String>,
    /// Set when `employee_count` was estimated from a range.
    pub employee_count_estimated: bool,
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
    pub company_description: Option<String>,
    pub founded_year: Option<i32>,
    pub company_type: Option<String>,
    pub ticker: Option<String>,
    pub naics_codes: Vec<String>,
    pub sic_codes: Vec<String>,

    // Email verification
    pub email_verified: Option<bool>,
    pub email_score: Option<i64>,
    pub email_deliverable: Option<bool>,

    // News
    pub company_context: Option<String>,
    pub recent_news: Vec<NewsArticle>,
    pub news_themes: Vec<String>,
    pub news_sentiment: Option<String>,
    pub news_by_category: BTreeMap<String, Vec<NewsArticle>>,

    // Company intelligence
    pub company_summary: Option<String>,
    pub company_headline: Option<String>,
    pub company_tags: Vec<String>,
    pub total_funding: Option<f64>,
    pub latest_funding_stage: Option<String>,
    pub employee_growth_rate: Option<f64>,
    pub inferred_revenue: Option<String>,
    pub company_linkedin: Option<String>,

    // Metadata
    pub data_sources: Vec<ProviderSource>,
    pub data_quality_score: f64,
    pub completeness: CompletenessReport,
    pub resolved_at: DateTime<Utc>,
}

// ============ Inferred Context ============

/// Declares a closed string enumeration with `as_str`, `Display` and `FromStr`.
macro_rules! string_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $text)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim().to_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str().to_lowercase() == needle)
                    .ok_or_else(|| format!("unknown {} '{}'", stringify!($name), s))
            }
        }
    };
}

string_enum!(
    /// IT maturity of the organization.
    ItEnvironment {
        Traditional => "traditional",
        Modernizing => "modernizing",
        Modern => "modern",
    }
);

string_enum!(
    BusinessPriority {
        ReducingCost => "reducing_cost",
        ImprovingPerformance => "improving_performance",
        PreparingAi => "preparing_ai",
    }
);

string_enum!(
    PrimaryChallenge {
        LegacySystems => "legacy_systems",
        IntegrationFriction => "integration_friction",
        ResourceConstraints => "resource_constraints",
        SkillsGap => "skills_gap",
        DataGovernance => "data_governance",
    }
);

string_enum!(
    UrgencyLevel {
        Low => "low",
        Medium => "medium",
        High => "high",
    }
);

string_enum!(
    /// Buying-journey position. `Awareness` is only ever caller-supplied.
    JourneyStage {
        Awareness => "awareness",
        Consideration => "consideration",
        Decision => "decision",
        Implementation => "implementation",
    }
);

string_enum!(
    TechMaturity {
        Advanced => "advanced",
        Modern => "modern",
        Traditional => "traditional",
        Mixed => "mixed",
        Unknown => "unknown",
    }
);

string_enum!(
    Sentiment {
        Positive => "positive",
        Negative => "negative",
        Neutral => "neutral",
    }
);

string_enum!(
    AiStage {
        None => "none",
        Exploring => "exploring",
        Piloting => "piloting",
        Deployed => "deployed",
    }
);

string_enum!(
    CrisisCategory {
        Workforce => "workforce",
        Regulatory => "regulatory",
        Financial => "financial",
        Security => "security",
    }
);

string_enum!(
    /// Modernization stage shown in the executive review.
    Stage {
        Observer => "Observer",
        Challenger => "Challenger",
        Leader => "Leader",
    }
);

string_enum!(
    Segment {
        Enterprise => "Enterprise",
        MidMarket => "Mid-Market",
        Smb => "SMB",
    }
);

string_enum!(
    /// IT decision maker or business decision maker.
    Persona {
        Itdm => "ITDM",
        Bdm => "BDM",
    }
);

/// Company tags bucketed by technology family.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechSignals {
    pub cloud: Vec<String>,
    pub ai_ml: Vec<String>,
    pub traditional: Vec<String>,
    pub security: Vec<String>,
    pub data: Vec<String>,
    pub maturity: TechMaturity,
}

impl Default for TechSignals {
    fn default() -> Self {
        Self {
            cloud: Vec::new(),
            ai_ml: Vec::new(),
            traditional: Vec::new(),
            security: Vec::new(),
            data: Vec::new(),
            maturity: TechMaturity::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentimentReport {
    pub sentiment: Sentiment,
    pub positive_hits: usize,
    pub negative_hits: usize,
    pub signals: Vec<String>,
}

impl Default for SentimentReport {
    fn default() -> Self {
        Self {
            sentiment: Sentiment::Neutral,
            positive_hits: 0,
            negative_hits: 0,
            signals: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMentions {
    pub technologies: Vec<String>,
    pub competitors: Vec<String>,
    pub has_partnership: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiReadiness {
    pub stage: AiStage,
    pub confidence: f64,
    pub signals: Vec<String>,
}

impl Default for AiReadiness {
    fn default() -> Self {
        Self {
            stage: AiStage::None,
            confidence: 0.0,
            signals: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrisisSignal {
    pub category: CrisisCategory,
    pub description: String,
}

/// Structured signals extracted from a company's recent news.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewsAnalysis {
    pub sentiment: SentimentReport,
    pub entities: EntityMentions,
    pub ai_readiness: AiReadiness,
    pub crisis: Option<CrisisSignal>,
    pub article_count: usize,
}

/// Caller-supplied values that always take precedence over inference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ContextOverrides {
    pub journey_stage: Option<JourneyStage>,
    pub it_environment: Option<ItEnvironment>,
    pub business_priority: Option<BusinessPriority>,
    pub primary_challenge: Option<PrimaryChallenge>,
}

/// Buyer context inferred from a profile. Recomputed on every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InferredContext {
    pub it_environment: ItEnvironment,
    pub business_priority: BusinessPriority,
    pub primary_challenge: PrimaryChallenge,
    pub urgency_level: UrgencyLevel,
    pub journey_stage: JourneyStage,
    pub confidence_score: f64,
    pub tech_signals: TechSignals,
    pub news: NewsAnalysis,
}

// ============ Generated Content ============

/// An advantage or risk item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Insight {
    pub headline: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Recommendation {
    pub title: String,
    pub description: String,
}

/// Structured executive-review copy as produced by the model or a fallback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratedContent {
    pub advantages: Vec<Insight>,
    pub risks: Vec<Insight>,
    pub recommendations: Vec<Recommendation>,
    pub case_study_relevance: String,
}

/// One field that broke its contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// Path such as `advantages[0].headline`.
    pub field: String,
    pub reason: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub failures: Vec<ValidationFailure>,
}

/// A case study from the fixed catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseStudy {
    pub key: String,
    pub name: String,
    pub description: String,
    pub link: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailOutcome {
    Passed,
    FellBack,
}

/// Model-judged specificity of passing content. Advisory only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificityVerdict {
    /// 1 (generic) to 5 (unmistakably about this company).
    pub score: u8,
    pub is_specific: bool,
    pub reason: String,
}

/// The complete executive review handed to the PDF renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveReview {
    pub company_name: String,
    pub industry: String,
    pub segment: Segment,
    pub persona: Persona,
    pub stage: Stage,
    pub stage_sidebar: String,
    pub stage_identification_text: String,
    pub case_study: CaseStudy,
    pub content: GeneratedContent,
    pub guardrail: GuardrailOutcome,
    /// Model calls spent on regeneration.
    pub retry_attempts: u32,
    pub model_used: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub specificity: Option<SpecificityVerdict>,
}

/// Intro hook and call to action for the ebook landing page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Personalization {
    pub intro_hook: String,
    pub cta: String,
    /// Model name, or `mock` / `fallback`.
    pub model_used: String,
    pub tokens_used: u32,
    pub latency_ms: u64,
}

/// The record persisted per email after a successful enrichment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedRecord {
    pub email: String,
    pub profile: NormalizedProfile,
    pub context: InferredContext,
    pub personalization: Personalization,
    pub executive_review: ExecutiveReview,
    pub data_sources: Vec<ProviderSource>,
    pub resolved_at: DateTime<Utc>,
}

// ============ API Request/Response Models ============

/// Request body for `POST /rad/enrich`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnrichRequest {
    /// Email address of the lead to enrich.
    pub email: String,
    /// Company domain, derived from the email when absent.
    pub domain: Option<String>,
    /// Overrides the resolved first name.
    pub first_name: Option<String>,
    /// Overrides the resolved last name.
    pub last_name: Option<String>,
    /// What the reader is doing (e.g. `exploring`, `building_case`).
    pub goal: Option<String>,
    /// Self-reported role (e.g. `executive`, `it_infrastructure`).
    pub persona: Option<String>,
    /// Self-reported industry.
    pub industry: Option<String>,
    /// Self-reported size code (e.g. `enterprise`, `midmarket`).
    pub company_size: Option<String>,
    pub it_environment: Option<String>,
    pub business_priority: Option<String>,
    pub primary_challenge: Option<String>,
    pub journey_stage: Option<String>,
}

/// Request body for `POST /rad/enrich/batch`.
#[derive(Debug, Clone, Deserialize)]
pub struct BatchEnrichRequest {
    pub emails: Vec<String>,
}

/// Request body for `POST /rad/quick-enrich`.
#[derive(Debug, Clone, Deserialize)]
pub struct QuickEnrichRequest {
    pub email: String,
}

/// Company pre-fill for a sign-up form. Text fields are empty when unknown.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QuickEnrichResponse {
    pub found: bool,
    pub email: String,
    pub domain: String,
    pub company_name: String,
    pub industry: String,
    pub title: String,
    pub seniority: String,
    pub company_summary: String,
    pub employee_count: Option<i64>,
    pub employee_count_range: Option<String>,
    pub founded_year: Option<i32>,
}

/// Profile fields echoed back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ProfileSummary {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub title: Option<String>,
    pub company_name: Option<String>,
    pub industry: Option<String>,
    pub employee_count: Option<i64>,
    pub data_quality_score: f64,
    pub completeness_score: f64,
    pub data_sources: Vec<ProviderSource>,
}

impl From<&NormalizedProfile> for ProfileSummary {
    fn from(profile: &NormalizedProfile) -> Self {
        Self {
            email: profile.email.clone(),
            first_name: profile.first_name.clone(),
            last_name: profile.last_name.clone(),
            title: profile.title.clone(),
            company_name: profile.company_name.clone(),
            industry: profile.industry.clone(),
            employee_count: profile.employee_count,
            data_quality_score: profile.data_quality_score,
            completeness_score: profile.completeness.score,
            data_sources: profile.data_sources.clone(),
        }
    }
}

/// Response body for `POST /rad/enrich`.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichResponse {
    pub job_id: Uuid,
    pub status: String,
    pub profile: ProfileSummary,
    pub context: InferredContext,
    pub personalization: Personalization,
    pub executive_review: ExecutiveReview,
}

/// Per-email outcome of a batch enrichment.
#[derive(Debug, Clone, Serialize)]
pub struct BatchItemResult {
    pub email: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_quality_score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
