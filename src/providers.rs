//! HTTP clients for the third-party enrichment providers.
//!
//! Every client answers with a [`RawSourcePayload`]. Without an API key a
//! client returns a synthetic payload instead of calling out, which keeps the
//! pipeline runnable in development while the resolver ignores the values.

use async_trait::async_trait;
use futures::future::join_all;
use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use crate::config::{Config, ProviderConfig};
use crate::errors::AppError;
use crate::keywords::SearchText;
use crate::models::{
    ApolloPerson, HunterVerification, NewsArticle, NewsDigest, PdlCompany, PdlExperience,
    PdlPerson, ProviderSource, QueryStats, RawSourcePayload, SourceData, ZoomInfoCompany,
};
use crate::news_analysis::detect_sentiment;
use crate::resolver::company_name_from_domain;

const NEWS_MAX_ARTICLES: &str = "10";

/// Identity being enriched. `company_name` is only known in the news phase.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub email: String,
    pub domain: String,
    pub company_name: Option<String>,
}

impl Lookup {
    pub fn new(email: &str, domain: &str) -> Self {
        Self {
            email: email.to_string(),
            domain: domain.to_string(),
            company_name: None,
        }
    }

    pub fn with_company(mut self, name: impl Into<String>) -> Self {
        self.company_name = Some(name.into());
        self
    }

    fn company(&self) -> String {
        self.company_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| company_name_from_domain(&self.domain))
    }
}

/// One third-party data source.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    fn source(&self) -> ProviderSource;

    /// Looks the company up by domain, which means nothing for a personal mailbox.
    fn company_scoped(&self) -> bool {
        false
    }

    async fn fetch(&self, lookup: &Lookup) -> Result<RawSourcePayload, AppError>;
}

/// Shared client, endpoint and credentials for one provider.
#[derive(Clone)]
struct ProviderHttp {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    name: &'static str,
}

impl ProviderHttp {
    fn new(name: &'static str, config: &ProviderConfig, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder().timeout(timeout).build().map_err(|e| {
            AppError::Internal(format!("Failed to build {} client: {}", name, e))
        })?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            name,
        })
    }

    fn url(&self, path: &str, params: &[(&str, &str)]) -> Result<reqwest::Url, AppError> {
        reqwest::Url::parse_with_params(&format!("{}{}", self.base_url, path), params)
            .map_err(|e| AppError::upstream(self.name, format!("invalid URL: {}", e)))
    }

    async fn checked(&self, request: RequestBuilder) -> Result<Response, AppError> {
        let response = request.send().await.map_err(|e| {
            AppError::upstream(self.name, format!("request failed: {}", e))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!("{} returned error {}: {}", self.name, status, error_text);
            return Err(AppError::upstream(
                self.name,
                format!("returned status {}: {}", status, error_text),
            ));
        }
        Ok(response)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AppError> {
        self.checked(request).await?.json().await.map_err(|e| {
            AppError::upstream(self.name, format!("unparseable response: {}", e))
        })
    }

    async fn send_text(&self, request: RequestBuilder) -> Result<String, AppError> {
        self.checked(request).await?.text().await.map_err(|e| {
            AppError::upstream(self.name, format!("unreadable response: {}", e))
        })
    }
}

// ============ Apollo ============

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApolloOrganization {
    name: Option<String>,
    estimated_num_employees: Option<i64>,
    industry: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApolloRawPerson {
    first_name: Option<String>,
    last_name: Option<String>,
    title: Option<String>,
    seniority: Option<String>,
    departments: Vec<String>,
    linkedin_url: Option<String>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    organization: Option<ApolloOrganization>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApolloMatch {
    person: Option<ApolloRawPerson>,
}

impl From<ApolloRawPerson> for ApolloPerson {
    fn from(raw: ApolloRawPerson) -> Self {
        let org = raw.organization.unwrap_or_default();
        Self {
            first_name: raw.first_name,
            last_name: raw.last_name,
            title: raw.title,
            seniority: raw.seniority,
            departments: raw.departments,
            linkedin_url: raw.linkedin_url,
            city: raw.city,
            state: raw.state,
            country: raw.country,
            company_name: org.name,
            company_size: org.estimated_num_employees.map(|n| n.to_string()),
            industry: org.industry,
        }
    }
}

/// Contact match by email.
pub struct ApolloProvider {
    http: ProviderHttp,
}

impl ApolloProvider {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            http: ProviderHttp::new("Apollo", config, timeout)?,
        })
    }
}

#[async_trait]
impl EnrichmentProvider for ApolloProvider {
    fn source(&self) -> ProviderSource {
        ProviderSource::Apollo
    }

    async fn fetch(&self, lookup: &Lookup) -> Result<RawSourcePayload, AppError> {
        let Some(key) = &self.http.api_key else {
            return Ok(RawSourcePayload::synthetic(SourceData::Apollo(ApolloPerson {
                first_name: Some("Alex".to_string()),
                title: Some("Director of IT".to_string()),
                company_name: Some(lookup.company()),
                ..Default::default()
            })));
        };

        tracing::info!("Fetching Apollo match for {}", lookup.email);
        let url = self.http.url("/v1/people/match", &[])?;
        let reply: ApolloMatch = self
            .http
            .send(
                self.http
                    .client
                    .post(url)
                    .header("X-Api-Key", key)
                    .json(&json!({ "email": lookup.email, "domain": lookup.domain })),
            )
            .await?;

        match reply.person {
            Some(person) => Ok(RawSourcePayload::fetched(SourceData::Apollo(person.into()))),
            None => Ok(RawSourcePayload::failed(ProviderSource::Apollo, "No match")),
        }
    }
}

// ============ People Data Labs ============

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PdlNamed {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PdlRawExperience {
    company: Option<PdlNamed>,
    title: Option<PdlNamed>,
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PdlRawPerson {
    first_name: Option<String>,
    last_name: Option<String>,
    full_name: Option<String>,
    job_title: Option<String>,
    job_company_name: Option<String>,
    job_company_industry: Option<String>,
    job_company_size: Option<String>,
    linkedin_url: Option<String>,
    location_locality: Option<String>,
    location_region: Option<String>,
    location_country: Option<String>,
    skills: Vec<String>,
    interests: Vec<String>,
    experience: Vec<PdlRawExperience>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PdlPersonReply {
    data: Option<PdlRawPerson>,
}

impl From<PdlRawPerson> for PdlPerson {
    fn from(raw: PdlRawPerson) -> Self {
        Self {
            first_name: raw.first_name,
            last_name: raw.last_name,
            full_name: raw.full_name,
            job_title: raw.job_title,
            job_company_name: raw.job_company_name,
            job_company_industry: raw.job_company_industry,
            job_company_size: raw.job_company_size,
            linkedin_url: raw.linkedin_url,
            location_locality: raw.location_locality,
            location_region: raw.location_region,
            location_country: raw.location_country,
            skills: raw.skills,
            interests: raw.interests,
            experience: raw
                .experience
                .into_iter()
                .map(|e| PdlExperience {
                    company: e.company.and_then(|c| c.name),
                    title: e.title.and_then(|t| t.name),
                    start_date: e.start_date,
                    end_date: e.end_date,
                })
                .collect(),
        }
    }
}

/// Person enrichment by email.
pub struct PdlPersonProvider {
    http: ProviderHttp,
}

impl PdlPersonProvider {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            http: ProviderHttp::new("PDL", config, timeout)?,
        })
    }
}

#[async_trait]
impl EnrichmentProvider for PdlPersonProvider {
    fn source(&self) -> ProviderSource {
        ProviderSource::Pdl
    }

    async fn fetch(&self, lookup: &Lookup) -> Result<RawSourcePayload, AppError> {
        let Some(key) = &self.http.api_key else {
            return Ok(RawSourcePayload::synthetic(SourceData::Pdl(PdlPerson {
                job_title: Some("IT Manager".to_string()),
                job_company_name: Some(lookup.company()),
                skills: vec!["cloud".to_string()],
                ..Default::default()
            })));
        };

        tracing::info!("Fetching PDL person for {}", lookup.email);
        let url = self
            .http
            .url("/v5/person/enrich", &[("email", lookup.email.as_str())])?;
        let reply: PdlPersonReply = self
            .http
            .send(self.http.client.get(url).header("X-Api-Key", key))
            .await?;

        match reply.data {
            Some(person) => Ok(RawSourcePayload::fetched(SourceData::Pdl(person.into()))),
            None => Ok(RawSourcePayload::failed(ProviderSource::Pdl, "No match")),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PdlLocation {
    locality: Option<String>,
    region: Option<String>,
    country: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PdlRawCompany {
    name: Option<String>,
    display_name: Option<String>,
    industry: Option<String>,
    size: Option<String>,
    employee_count: Option<i64>,
    location: Option<PdlLocation>,
    summary: Option<String>,
    headline: Option<String>,
    founded: Option<i32>,
    #[serde(rename = "type")]
    company_type: Option<String>,
    ticker: Option<String>,
    naics: Vec<Value>,
    sic: Vec<Value>,
    tags: Vec<String>,
    total_funding_raised: Option<f64>,
    latest_funding_stage: Option<String>,
    employee_growth_rate: Option<Value>,
    inferred_revenue: Option<String>,
    linkedin_url: Option<String>,
}

fn codes(entries: &[Value], key: &str) -> Vec<String> {
    entries
        .iter()
        .filter_map(|e| match e.get(key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .collect()
}

/// Growth is either a bare rate or keyed by window (`12_month` preferred).
fn growth_rate(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Object(map) => map
            .get("12_month")
            .or_else(|| map.values().next())
            .and_then(Value::as_f64),
        _ => None,
    }
}

impl From<PdlRawCompany> for PdlCompany {
    fn from(raw: PdlRawCompany) -> Self {
        let location = raw.location.unwrap_or_default();
        Self {
            name: raw.name,
            display_name: raw.display_name,
            industry: raw.industry,
            employee_count_range: raw.size.clone(),
            size: raw.size,
            employee_count: raw.employee_count,
            locality: location.locality,
            region: location.region,
            country: location.country,
            summary: raw.summary,
            headline: raw.headline,
            founded: raw.founded,
            company_type: raw.company_type,
            ticker: raw.ticker,
            naics_codes: codes(&raw.naics, "naics_code"),
            sic_codes: codes(&raw.sic, "sic_code"),
            tags: raw.tags,
            total_funding_raised: raw.total_funding_raised,
            latest_funding_stage: raw.latest_funding_stage,
            employee_growth_rate: raw.employee_growth_rate.as_ref().and_then(growth_rate),
            inferred_revenue: raw.inferred_revenue,
            linkedin_url: raw.linkedin_url,
        }
    }
}

/// Company profile by website domain.
pub struct PdlCompanyProvider {
    http: ProviderHttp,
}

impl PdlCompanyProvider {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            http: ProviderHttp::new("PDL Company", config, timeout)?,
        })
    }
}

#[async_trait]
impl EnrichmentProvider for PdlCompanyProvider {
    fn source(&self) -> ProviderSource {
        ProviderSource::PdlCompany
    }

    fn company_scoped(&self) -> bool {
        true
    }

    async fn fetch(&self, lookup: &Lookup) -> Result<RawSourcePayload, AppError> {
        let Some(key) = &self.http.api_key else {
            return Ok(RawSourcePayload::synthetic(SourceData::PdlCompany(PdlCompany {
                name: Some(lookup.company()),
                size: Some("51-200".to_string()),
                ..Default::default()
            })));
        };

        tracing::info!("Fetching PDL company for {}", lookup.domain);
        let url = self
            .http
            .url("/v5/company/enrich", &[("website", lookup.domain.as_str())])?;
        let company: PdlRawCompany = self
            .http
            .send(self.http.client.get(url).header("X-Api-Key", key))
            .await?;

        if company.name.is_none() && company.display_name.is_none() {
            return Ok(RawSourcePayload::failed(ProviderSource::PdlCompany, "No match"));
        }
        Ok(RawSourcePayload::fetched(SourceData::PdlCompany(company.into())))
    }
}

// ============ Hunter ============

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct HunterReply {
    data: Option<HunterVerification>,
}

/// Email deliverability check.
pub struct HunterProvider {
    http: ProviderHttp,
}

impl HunterProvider {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            http: ProviderHttp::new("Hunter", config, timeout)?,
        })
    }
}

#[async_trait]
impl EnrichmentProvider for HunterProvider {
    fn source(&self) -> ProviderSource {
        ProviderSource::Hunter
    }

    async fn fetch(&self, lookup: &Lookup) -> Result<RawSourcePayload, AppError> {
        let Some(key) = &self.http.api_key else {
            return Ok(RawSourcePayload::synthetic(SourceData::Hunter(HunterVerification {
                status: Some("valid".to_string()),
                result: Some("deliverable".to_string()),
                score: Some(90),
            })));
        };

        tracing::info!("Verifying {} with Hunter", lookup.email);
        tracing::debug!(
            "Hunter URL: {}/v2/email-verifier?email={}&api_key=[REDACTED]",
            self.http.base_url,
            lookup.email
        );
        let url = self.http.url(
            "/v2/email-verifier",
            &[("email", lookup.email.as_str()), ("api_key", key.as_str())],
        )?;
        let reply: HunterReply = self.http.send(self.http.client.get(url)).await?;

        match reply.data {
            Some(verification) => Ok(RawSourcePayload::fetched(SourceData::Hunter(verification))),
            None => Ok(RawSourcePayload::failed(ProviderSource::Hunter, "Empty response")),
        }
    }
}

// ============ ZoomInfo ============

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ZoomInfoRawCompany {
    name: Option<String>,
    primary_industry: Vec<String>,
    employee_count: Option<i64>,
    revenue: Option<Value>,
    city: Option<String>,
    state: Option<String>,
    country: Option<String>,
    description_list: Vec<ZoomInfoDescription>,
    founded_year: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ZoomInfoDescription {
    description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ZoomInfoMatch {
    data: Vec<ZoomInfoRawCompany>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ZoomInfoResult {
    result: Vec<ZoomInfoMatch>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ZoomInfoReply {
    data: ZoomInfoResult,
}

impl From<ZoomInfoRawCompany> for ZoomInfoCompany {
    fn from(raw: ZoomInfoRawCompany) -> Self {
        let founded_year = match raw.founded_year {
            Some(Value::Number(n)) => n.as_i64().and_then(|y| i32::try_from(y).ok()),
            Some(Value::String(s)) => s.trim().parse().ok(),
            _ => None,
        };
        let revenue = match raw.revenue {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        Self {
            company_name: raw.name,
            industry: raw.primary_industry.into_iter().next(),
            employee_count: raw.employee_count,
            revenue,
            city: raw.city,
            state: raw.state,
            country: raw.country,
            description: raw.description_list.into_iter().find_map(|d| d.description),
            founded_year,
        }
    }
}

/// Firmographics by company website.
pub struct ZoomInfoProvider {
    http: ProviderHttp,
}

impl ZoomInfoProvider {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            http: ProviderHttp::new("ZoomInfo", config, timeout)?,
        })
    }
}

#[async_trait]
impl EnrichmentProvider for ZoomInfoProvider {
    fn source(&self) -> ProviderSource {
        ProviderSource::ZoomInfo
    }

    fn company_scoped(&self) -> bool {
        true
    }

    async fn fetch(&self, lookup: &Lookup) -> Result<RawSourcePayload, AppError> {
        let Some(key) = &self.http.api_key else {
            return Ok(RawSourcePayload::synthetic(SourceData::ZoomInfo(ZoomInfoCompany {
                company_name: Some(lookup.company()),
                employee_count: Some(100),
                ..Default::default()
            })));
        };

        tracing::info!("Fetching ZoomInfo company for {}", lookup.domain);
        let url = self.http.url("/enrich/company", &[])?;
        let body = json!({
            "matchCompanyInput": [{ "companyWebsite": lookup.domain }],
            "outputFields": [
                "name", "primaryIndustry", "employeeCount", "revenue", "city", "state",
                "country", "descriptionList", "foundedYear"
            ],
        });
        let reply: ZoomInfoReply = self
            .http
            .send(self.http.client.post(url).bearer_auth(key).json(&body))
            .await?;

        let company = reply
            .data
            .result
            .into_iter()
            .flat_map(|m| m.data)
            .next();
        match company {
            Some(company) => Ok(RawSourcePayload::fetched(SourceData::ZoomInfo(company.into()))),
            None => Ok(RawSourcePayload::failed(ProviderSource::ZoomInfo, "No match")),
        }
    }
}

// ============ GNews ============

/// Theme label and the phrases that signal it in a headline or summary.
const NEWS_THEMES: &[(&str, &[&str])] = &[
    ("funding", &["funding", "raises", "series", "investment", "ipo"]),
    ("expansion", &["expand", "expansion", "new office", "opens", "growth"]),
    ("acquisition", &["acquire", "acquires", "acquisition", "merger"]),
    ("ai", &["ai", "artificial intelligence", "machine learning", "generative"]),
    ("cloud", &["cloud", "saas", "data center"]),
    ("digital transformation", &["digital transformation", "modernization", "modernize", "migration"]),
    ("partnership", &["partner", "partnership", "alliance", "collaboration"]),
    ("product launch", &["launch", "launches", "unveils", "introduces"]),
    ("layoffs", &["layoff", "layoffs", "job cuts", "restructuring"]),
    ("leadership", &["ceo", "appoints", "names new", "hires"]),
    ("security", &["breach", "cyberattack", "ransomware", "vulnerability"]),
];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GNewsSource {
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GNewsArticle {
    title: String,
    description: Option<String>,
    content: Option<String>,
    url: Option<String>,
    published_at: Option<String>,
    source: Option<GNewsSource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct GNewsReply {
    articles: Vec<GNewsArticle>,
}

impl From<GNewsArticle> for NewsArticle {
    fn from(raw: GNewsArticle) -> Self {
        Self {
            title: raw.title,
            content: raw.description.or(raw.content).unwrap_or_default(),
            url: raw.url,
            published_date: raw.published_at,
            source: raw.source.and_then(|s| s.name),
            query_category: None,
        }
    }
}

/// Dedup key across queries: the URL when present, else the title.
fn article_key(article: &NewsArticle) -> String {
    article
        .url
        .clone()
        .unwrap_or_else(|| article.title.trim().to_lowercase())
}

/// Builds the digest: themes in table order, articles grouped by theme.
pub fn digest_articles(articles: Vec<NewsArticle>) -> NewsDigest {
    let mut themes = Vec::new();
    let mut categorized: BTreeMap<String, Vec<NewsArticle>> = BTreeMap::new();
    for (theme, phrases) in NEWS_THEMES {
        let matching: Vec<NewsArticle> = articles
            .iter()
            .filter(|a| SearchText::from_parts([a.title.as_str(), a.content.as_str()]).any(phrases))
            .cloned()
            .collect();
        if !matching.is_empty() {
            themes.push(theme.to_string());
            categorized.insert(theme.to_string(), matching);
        }
    }

    let sentiment = (!articles.is_empty())
        .then(|| detect_sentiment(&articles).sentiment.as_str().to_string());
    let answer = articles
        .iter()
        .map(|a| a.content.trim())
        .find(|c| !c.is_empty())
        .map(str::to_string);

    NewsDigest {
        answer,
        result_count: articles.len(),
        results: articles,
        themes,
        sentiment,
        categorized,
        ..Default::default()
    }
}

/// GNews query categories and the clause each appends to the quoted company name.
const GNEWS_QUERIES: &[(&str, &str)] = &[
    ("general", ""),
    ("ai_technology", " AND (AI OR \"artificial intelligence\" OR cloud)"),
];

/// How one GNews query ended.
#[derive(Debug)]
enum QueryOutcome {
    Articles(Vec<NewsArticle>),
    /// 403 or 429: the daily quota is spent.
    QuotaExhausted,
    Failed,
}

/// Company news search by resolved company name.
///
/// Runs one query per category concurrently. When no query succeeds, or the
/// quota ran out before any article came back, the Google News RSS feed is
/// searched instead if a fallback is attached.
pub struct GNewsProvider {
    http: ProviderHttp,
    fallback: Option<GoogleNewsRssProvider>,
}

impl GNewsProvider {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            http: ProviderHttp::new("GNews", config, timeout)?,
            fallback: None,
        })
    }

    pub fn with_fallback(mut self, fallback: GoogleNewsRssProvider) -> Self {
        self.fallback = Some(fallback);
        self
    }

    async fn search(&self, key: &str, company: &str, category: &str, clause: &str) -> QueryOutcome {
        let query = format!("\"{}\"{}", company, clause);
        let url = match self.http.url(
            "/api/v4/search",
            &[
                ("q", query.as_str()),
                ("lang", "en"),
                ("max", NEWS_MAX_ARTICLES),
                ("apikey", key),
            ],
        ) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("⚠ GNews {} query skipped: {}", category, e);
                return QueryOutcome::Failed;
            }
        };

        let response = match self.http.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("⚠ GNews {} query failed: {}", category, e);
                return QueryOutcome::Failed;
            }
        };

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!("⚠ GNews quota exhausted ({}) on {} query", status, category);
            return QueryOutcome::QuotaExhausted;
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            tracing::warn!("GNews returned error {} on {} query: {}", status, category, error_text);
            return QueryOutcome::Failed;
        }

        match response.json::<GNewsReply>().await {
            Ok(reply) => QueryOutcome::Articles(
                reply
                    .articles
                    .into_iter()
                    .map(|raw| NewsArticle {
                        query_category: Some(category.to_string()),
                        ..NewsArticle::from(raw)
                    })
                    .collect(),
            ),
            Err(e) => {
                tracing::warn!("⚠ GNews {} query unparseable: {}", category, e);
                QueryOutcome::Failed
            }
        }
    }
}

#[async_trait]
impl EnrichmentProvider for GNewsProvider {
    fn source(&self) -> ProviderSource {
        ProviderSource::GNews
    }

    async fn fetch(&self, lookup: &Lookup) -> Result<RawSourcePayload, AppError> {
        let company = lookup.company();
        let Some(key) = &self.http.api_key else {
            return Ok(RawSourcePayload::synthetic(SourceData::GNews(digest_articles(vec![
                NewsArticle {
                    title: format!("{} announces cloud expansion", company),
                    ..Default::default()
                },
            ]))));
        };

        tracing::info!("Searching GNews for '{}'", company);
        let outcomes = join_all(
            GNEWS_QUERIES
                .iter()
                .map(|(category, clause)| self.search(key, &company, category, clause)),
        )
        .await;

        let mut stats = QueryStats {
            total: outcomes.len(),
            ..Default::default()
        };
        let mut quota_exhausted = false;
        let mut seen = HashSet::new();
        let mut articles = Vec::new();
        for outcome in outcomes {
            match outcome {
                QueryOutcome::Articles(found) => {
                    stats.succeeded += 1;
                    articles.extend(found.into_iter().filter(|a| seen.insert(article_key(a))));
                }
                QueryOutcome::QuotaExhausted => {
                    stats.failed += 1;
                    quota_exhausted = true;
                }
                QueryOutcome::Failed => stats.failed += 1,
            }
        }
        tracing::info!(
            "GNews for '{}': {}/{} queries succeeded, {} articles",
            company,
            stats.succeeded,
            stats.total,
            articles.len()
        );

        let mut feed = GNEWS_FEED;
        if stats.succeeded == 0 || (quota_exhausted && articles.is_empty()) {
            if let Some(rss) = &self.fallback {
                tracing::warn!("⚠ GNews unavailable for '{}', falling back to Google News RSS", company);
                match rss.search(&company).await {
                    Ok(found) => {
                        articles = found;
                        feed = RSS_FEED;
                    }
                    Err(e) => tracing::warn!("⚠ Google News RSS fallback failed: {}", e),
                }
            }
        }

        let nothing_answered = stats.succeeded == 0 && feed == GNEWS_FEED;
        let mut digest = digest_articles(articles);
        digest.feed = Some(feed.to_string());
        digest.quota_exhausted = quota_exhausted;
        digest.query_stats = Some(stats);

        let payload = RawSourcePayload::fetched(SourceData::GNews(digest));
        if nothing_answered {
            // keeps the stats for the audit trail without counting as a source
            return Ok(RawSourcePayload {
                error: Some(format!("all {} GNews queries failed", stats.total)),
                ..payload
            });
        }
        Ok(payload)
    }
}

// ============ Google News RSS ============

const GNEWS_FEED: &str = "gnews";
const RSS_FEED: &str = "google_news_rss";
const RSS_MAX_ITEMS: usize = 10;

static MARKUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("markup pattern is valid"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

#[derive(Debug, Clone, Copy)]
enum RssField {
    Title,
    Link,
    Description,
    PubDate,
    Source,
}

fn push_text(article: &mut NewsArticle, field: RssField, text: &str) {
    match field {
        RssField::Title => article.title.push_str(text),
        RssField::Link => article.url.get_or_insert_with(String::new).push_str(text),
        RssField::Description => article.content.push_str(text),
        RssField::PubDate => article
            .published_date
            .get_or_insert_with(String::new)
            .push_str(text),
        RssField::Source => article.source.get_or_insert_with(String::new).push_str(text),
    }
}

/// Descriptions arrive as escaped HTML; keep the visible text only.
fn strip_markup(html: &str) -> String {
    let text = MARKUP.replace_all(html, " ").replace("&nbsp;", " ");
    WHITESPACE.replace_all(&text, " ").trim().to_string()
}

/// Parses `<item>` entries out of an RSS 2.0 document.
///
/// Input that is not XML at all yields no items. Items without a title are
/// dropped and at most ten are kept.
pub fn parse_rss(xml: &str) -> Result<Vec<NewsArticle>, String> {
    let mut reader = Reader::from_str(xml);
    let mut articles = Vec::new();
    let mut item: Option<NewsArticle> = None;
    let mut field: Option<RssField> = None;

    while articles.len() < RSS_MAX_ITEMS {
        match reader.read_event().map_err(|e| e.to_string())? {
            Event::Start(e) => {
                field = match e.local_name().as_ref() {
                    b"item" => {
                        item = Some(NewsArticle {
                            query_category: Some("rss".to_string()),
                            ..Default::default()
                        });
                        None
                    }
                    b"title" => Some(RssField::Title),
                    b"link" => Some(RssField::Link),
                    b"description" => Some(RssField::Description),
                    b"pubDate" => Some(RssField::PubDate),
                    b"source" => Some(RssField::Source),
                    _ => None,
                };
            }
            Event::Text(t) => {
                if let (Some(article), Some(f)) = (item.as_mut(), field) {
                    let text = t.unescape().map_err(|e| e.to_string())?;
                    push_text(article, f, &text);
                }
            }
            Event::CData(c) => {
                if let (Some(article), Some(f)) = (item.as_mut(), field) {
                    push_text(article, f, &String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"item" {
                    if let Some(mut article) = item.take() {
                        article.title = article.title.trim().to_string();
                        article.content = strip_markup(&article.content);
                        if !article.title.is_empty() {
                            articles.push(article);
                        }
                    }
                }
                field = None;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(articles)
}

/// Keyless company news search over the public Google News RSS feed.
pub struct GoogleNewsRssProvider {
    http: ProviderHttp,
}

impl GoogleNewsRssProvider {
    pub fn new(config: &ProviderConfig, timeout: Duration) -> Result<Self, AppError> {
        Ok(Self {
            http: ProviderHttp::new("Google News RSS", config, timeout)?,
        })
    }

    /// HTTP failures are errors; a feed that does not parse reads as no news.
    pub async fn search(&self, company: &str) -> Result<Vec<NewsArticle>, AppError> {
        let query = format!("\"{}\"", company);
        let url = self.http.url(
            "/rss/search",
            &[
                ("q", query.as_str()),
                ("hl", "en-US"),
                ("gl", "US"),
                ("ceid", "US:en"),
            ],
        )?;
        let body = self.http.send_text(self.http.client.get(url)).await?;

        match parse_rss(&body) {
            Ok(articles) => {
                tracing::info!("✓ Google News RSS returned {} items for '{}'", articles.len(), company);
                Ok(articles)
            }
            Err(e) => {
                tracing::warn!("⚠ Google News RSS feed for '{}' did not parse: {}", company, e);
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl EnrichmentProvider for GoogleNewsRssProvider {
    fn source(&self) -> ProviderSource {
        ProviderSource::GNews
    }

    async fn fetch(&self, lookup: &Lookup) -> Result<RawSourcePayload, AppError> {
        let articles = self.search(&lookup.company()).await?;
        let mut digest = digest_articles(articles);
        digest.feed = Some(RSS_FEED.to_string());
        digest.query_stats = Some(QueryStats {
            total: 1,
            succeeded: 1,
            failed: 0,
        });
        Ok(RawSourcePayload::fetched(SourceData::GNews(digest)))
    }
}

// ============ Personal email domains ============

/// Consumer mailbox domains. They identify a person, never a company.
const FREE_EMAIL_DOMAINS: &[&str] = &[
    "gmail.com",
    "googlemail.com",
    "yahoo.com",
    "yahoo.co.uk",
    "hotmail.com",
    "outlook.com",
    "live.com",
    "msn.com",
    "aol.com",
    "icloud.com",
    "me.com",
    "mac.com",
    "protonmail.com",
    "proton.me",
    "gmx.com",
    "mail.com",
    "yandex.com",
    "zoho.com",
];

pub fn is_free_email_domain(domain: &str) -> bool {
    let domain = domain.trim().to_ascii_lowercase();
    FREE_EMAIL_DOMAINS.contains(&domain.as_str())
}

/// The configured providers, split by fetch phase.
#[derive(Clone)]
pub struct ProviderSet {
    /// Contact and company lookups that only need the email and domain.
    pub identity: Vec<Arc<dyn EnrichmentProvider>>,
    /// News search, run once the company name is resolved.
    pub news: Arc<dyn EnrichmentProvider>,
}

impl ProviderSet {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let timeout = Duration::from_secs(config.provider_timeout_secs);
        let providers = &config.providers;

        for (name, provider) in [
            ("Apollo", &providers.apollo),
            ("PDL", &providers.pdl),
            ("Hunter", &providers.hunter),
            ("ZoomInfo", &providers.zoominfo),
            ("GNews", &providers.gnews),
        ] {
            if !provider.is_configured() {
                tracing::warn!("⚠ {} API key not set, using synthetic payloads", name);
            }
        }

        Ok(Self {
            identity: vec![
                Arc::new(ApolloProvider::new(&providers.apollo, timeout)?),
                Arc::new(PdlPersonProvider::new(&providers.pdl, timeout)?),
                Arc::new(HunterProvider::new(&providers.hunter, timeout)?),
                Arc::new(ZoomInfoProvider::new(&providers.zoominfo, timeout)?),
                Arc::new(PdlCompanyProvider::new(&providers.pdl, timeout)?),
            ],
            news: Arc::new(
                GNewsProvider::new(&providers.gnews, timeout)?.with_fallback(
                    GoogleNewsRssProvider::new(&providers.google_news_rss, timeout)?,
                ),
            ),
        })
    }
}
