//! Merges provider payloads into one normalized profile.
//!
//! Resolution is a pure function of the payload set: every field has a fixed
//! candidate list, values from unusable payloads are never read, and
//! conflicts are settled only by the static trust table.

use chrono::{DateTime, Utc};

use crate::models::ProviderSource::{Apollo, Pdl, PdlCompany, ZoomInfo};
use crate::models::{
    CompletenessReport, NormalizedProfile, PdlExperience, ProviderSource, SourcePayloads,
};

/// Substring pattern to canonical industry bucket.
pub const INDUSTRY_NORMALIZATION: &[(&str, &str)] = &[
    ("information technology", "technology"),
    ("software", "technology"),
    ("internet", "technology"),
    ("computer", "technology"),
    ("saas", "technology"),
    ("it services", "technology"),
    ("financial", "financial_services"),
    ("banking", "financial_services"),
    ("insurance", "financial_services"),
    ("investment", "financial_services"),
    ("capital markets", "financial_services"),
    ("fintech", "financial_services"),
    ("healthcare", "healthcare"),
    ("health care", "healthcare"),
    ("hospital", "healthcare"),
    ("medical", "healthcare"),
    ("pharmaceutical", "healthcare"),
    ("pharma", "healthcare"),
    ("biotech", "healthcare"),
    ("life science", "healthcare"),
    ("manufacturing", "manufacturing"),
    ("automotive", "manufacturing"),
    ("industrial", "manufacturing"),
    ("aerospace", "manufacturing"),
    ("retail", "retail"),
    ("e-commerce", "retail"),
    ("ecommerce", "retail"),
    ("consumer goods", "retail"),
    ("energy", "energy"),
    ("oil", "energy"),
    ("utilities", "energy"),
    ("renewable", "energy"),
    ("telecom", "telecommunications"),
    ("wireless", "telecommunications"),
    ("communications", "telecommunications"),
    ("media", "media"),
    ("entertainment", "media"),
    ("publishing", "media"),
    ("broadcast", "media"),
    ("government", "government"),
    ("federal", "government"),
    ("public sector", "government"),
    ("defense", "government"),
    ("military", "government"),
    ("education", "education"),
    ("university", "education"),
    ("academic", "education"),
    ("higher education", "education"),
    ("consulting", "professional_services"),
    ("professional service", "professional_services"),
    ("legal", "professional_services"),
    ("accounting", "professional_services"),
];

/// Providers counted in the data-quality base score.
pub const TOTAL_SOURCES: usize = ProviderSource::ALL.len();

const CRITICAL_FIELDS: &[&str] = &["company_name", "industry", "title", "employee_count"];
const IMPORTANT_FIELDS: &[&str] = &["company_summary", "founded_year", "seniority", "recent_news"];
const NICE_FIELDS: &[&str] = &[
    "skills",
    "employee_growth_rate",
    "total_funding",
    "latest_funding_stage",
    "company_tags",
    "news_themes",
];

/// Maps a raw industry string onto a canonical bucket.
///
/// Exact pattern matches win, then the longest matching substring pattern.
/// Unknown industries are kept as a lowercased, underscored slug.
pub fn canonicalize_industry(raw: &str) -> Option<String> {
    let lowered = raw.trim().to_lowercase();
    if lowered.is_empty() {
        return None;
    }

    if let Some((_, bucket)) = INDUSTRY_NORMALIZATION
        .iter()
        .find(|(pattern, _)| *pattern == lowered)
    {
        return Some(bucket.to_string());
    }

    let mut by_length: Vec<&(&str, &str)> = INDUSTRY_NORMALIZATION.iter().collect();
    by_length.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    if let Some((_, bucket)) = by_length.into_iter().find(|(p, _)| lowered.contains(p)) {
        return Some(bucket.to_string());
    }

    Some(lowered.replace([' ', '-'], "_"))
}

/// Estimates a headcount from `"low-high"`, `"N+"` or a bare integer.
///
/// `"N+"` reads as "more than N-1" and scales that bound by 1.5, so the
/// provider bucket `"10001+"` estimates 15000.
pub fn estimate_employee_count(range: &str) -> Option<i64> {
    let cleaned: String = range.chars().filter(|c| *c != ',' && *c != ' ').collect();
    if cleaned.is_empty() {
        return None;
    }

    if let Some(base) = cleaned.strip_suffix('+') {
        let n = base.parse::<i64>().ok()?;
        return Some((n.saturating_sub(1) as f64 * 1.5) as i64);
    }

    let parts: Vec<&str> = cleaned.split('-').collect();
    if parts.len() == 2 {
        let low = parts[0].parse::<i64>().ok()?;
        let high = parts[1].parse::<i64>().ok()?;
        if high < low {
            return None;
        }
        return Some(low + (high - low) / 2);
    }

    cleaned.parse::<i64>().ok()
}

/// `"microsoft.com"` → `"Microsoft"`, `"acme-robotics.io"` → `"Acme-Robotics"`.
///
/// Every letter that follows a non-letter starts a new word; separators are kept.
pub fn company_name_from_domain(domain: &str) -> String {
    let label = domain.trim().split('.').next().unwrap_or_default();
    let mut name = String::with_capacity(label.len());
    let mut word_start = true;
    for c in label.chars() {
        if c.is_alphabetic() {
            if word_start {
                name.extend(c.to_uppercase());
            } else {
                name.extend(c.to_lowercase());
            }
            word_start = false;
        } else {
            name.push(c);
            word_start = true;
        }
    }
    name
}

fn text(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
}

fn list<T: Clone>(values: &[T]) -> Option<Vec<T>> {
    if values.is_empty() {
        None
    } else {
        Some(values.to_vec())
    }
}

/// Company name used to seed the news lookup.
///
/// Candidates are tried in fixed preference order, not trust order; the
/// domain label is the last resort.
pub fn resolve_company_name(payloads: &SourcePayloads, domain: &str) -> String {
    payloads
        .pdl_company()
        .and_then(|c| text(&c.display_name).or_else(|| text(&c.name)))
        .or_else(|| payloads.apollo().and_then(|a| text(&a.company_name)))
        .or_else(|| payloads.zoominfo().and_then(|z| text(&z.company_name)))
        .or_else(|| payloads.pdl().and_then(|p| text(&p.job_company_name)))
        .unwrap_or_else(|| company_name_from_domain(domain))
}

/// One provider field that may supply a profile value.
pub struct Candidate<T> {
    pub source: ProviderSource,
    pub extract: fn(&SourcePayloads) -> Option<T>,
}

/// Highest-trust value among the candidates; list order breaks ties.
pub fn merge_field<T>(payloads: &SourcePayloads, candidates: &[Candidate<T>]) -> Option<T> {
    let mut values: Vec<(u8, T)> = candidates
        .iter()
        .filter_map(|c| (c.extract)(payloads).map(|v| (c.source.trust_priority(), v)))
        .collect();
    values.sort_by(|a, b| b.0.cmp(&a.0));
    values.into_iter().next().map(|(_, v)| v)
}

const FIRST_NAME: &[Candidate<String>] = &[
    Candidate { source: Apollo, extract: |p| p.apollo().and_then(|a| text(&a.first_name)) },
    Candidate { source: Pdl, extract: |p| p.pdl().and_then(|d| text(&d.first_name)) },
];

const LAST_NAME: &[Candidate<String>] = &[
    Candidate { source: Apollo, extract: |p| p.apollo().and_then(|a| text(&a.last_name)) },
    Candidate { source: Pdl, extract: |p| p.pdl().and_then(|d| text(&d.last_name)) },
];

const FULL_NAME: &[Candidate<String>] = &[
    Candidate { source: Pdl, extract: |p| p.pdl().and_then(|d| text(&d.full_name)) },
];

const TITLE: &[Candidate<String>] = &[
    Candidate { source: Apollo, extract: |p| p.apollo().and_then(|a| text(&a.title)) },
    Candidate { source: Pdl, extract: |p| p.pdl().and_then(|d| text(&d.job_title)) },
];

const COMPANY_NAME: &[Candidate<String>] = &[
    Candidate { source: PdlCompany, extract: |p| p.pdl_company().and_then(|c| text(&c.display_name)) },
    Candidate { source: PdlCompany, extract: |p| p.pdl_company().and_then(|c| text(&c.name)) },
    Candidate { source: Apollo, extract: |p| p.apollo().and_then(|a| text(&a.company_name)) },
    Candidate { source: ZoomInfo, extract: |p| p.zoominfo().and_then(|z| text(&z.company_name)) },
    Candidate { source: Pdl, extract: |p| p.pdl().and_then(|d| text(&d.job_company_name)) },
];

const COMPANY_DISPLAY_NAME: &[Candidate<String>] = &[
    Candidate { source: PdlCompany, extract: |p| p.pdl_company().and_then(|c| text(&c.display_name)) },
];

const INDUSTRY: &[Candidate<String>] = &[
    Candidate { source: PdlCompany, extract: |p| p.pdl_company().and_then(|c| text(&c.industry)) },
    Candidate { source: Apollo, extract: |p| p.apollo().and_then(|a| text(&a.industry)) },
    Candidate { source: ZoomInfo, extract: |p| p.zoominfo().and_then(|z| text(&z.industry)) },
    Candidate { source: Pdl, extract: |p| p.pdl().and_then(|d| text(&d.job_company_industry)) },
];

const COMPANY_SIZE: &[Candidate<String>] = &[
    Candidate { source: PdlCompany, extract: |p| p.pdl_company().and_then(|c| text(&c.size)) },
    Candidate { source: Apollo, extract: |p| p.apollo().and_then(|a| text(&a.company_size)) },
    Candidate { source: Pdl, extract: |p| p.pdl().and_then(|d| text(&d.job_company_size)) },
];

const EMPLOYEE_COUNT: &[Candidate<i64>] = &[
    Candidate { source: PdlCompany, extract: |p| p.pdl_company().and_then(|c| c.employee_count) },
    Candidate { source: ZoomInfo, extract: |p| p.zoominfo().and_then(|z| z.employee_count) },
];

const EMPLOYEE_COUNT_RANGE: &[Candidate<String>] = &[
    Candidate { source: PdlCompany, extract: |p| p.pdl_company().and_then(|c| text(&c.employee_count_range)) },
];

const LINKEDIN_URL: &[Candidate<String>] = &[
    Candidate { source: Apollo, extract: |p| p.apollo().and_then(|a| text(&a.linkedin_url)) },
    Candidate { source: Pdl, extract: |p| p.pdl().and_then(|d| text(&d.linkedin_url)) },
];

const CITY: &[Candidate<String>] = &[
    Candidate { source: PdlCompany, extract: |p| p.pdl_company().and_then(|c| text(&c.locality)) },
    Candidate { source: Apollo, extract: |p| p.apollo().and_then(|a| text(&a.city)) },
    Candidate { source: ZoomInfo, extract: |p| p.zoominfo().and_then(|z| text(&z.city)) },
    Candidate { source: Pdl, extract: |p| p.pdl().and_then(|d| text(&d.location_locality)) },
];

const STATE: &[Candidate<String>] = &[
    Candidate { source: PdlCompany, extract: |p| p.pdl_company().and_then(|c| text(&c.region)) },
    Candidate { source: Apollo, extract: |p| p.apollo().and_then(|a| text(&a.state)) },
    Candidate { source: ZoomInfo, extract: |p| p.zoominfo().and_then(|z| text(&z.state)) },
    Candidate { source: Pdl, extract: |p| p.pdl().and_then(|d| text(&d.location_region)) },
];

const COUNTRY: &[Candidate<String>] = &[
    Candidate { source: PdlCompany, extract: |p| p.pdl_company().and_then(|c| text(&c.country)) },
    Candidate { source: Apollo, extract: |p| p.apollo().and_then(|a| text(&a.country)) },
    Candidate { source: ZoomInfo, extract: |p| p.zoominfo().and_then(|z| text(&z.country)) },
    Candidate { source: Pdl, extract: |p| p.pdl().and_then(|d| text(&d.location_country)) },
];

const SENIORITY: &[Candidate<String>] = &[
    Candidate { source: Apollo, extract: |p| p.apollo().and_then(|a| text(&a.seniority)) },
];

const DEPARTMENTS: &[Candidate<Vec<String>>] = &[
    Candidate { source: Apollo, extract: |p| p.apollo().and_then(|a| list(&a.departments)) },
];

const SKILLS: &[Candidate<Vec<String>>] = &[
    Candidate { source: Pdl, extract: |p| p.pdl().and_then(|d| list(&d.skills)) },
];

const INTERESTS: &[Candidate<Vec<String>>] = &[
    Candidate { source: Pdl, extract: |p| p.pdl().and_then(|d| list(&d.interests)) },
];

const EXPERIENCE: &[Candidate<Vec<PdlExperience>>] = &[
    Candidate { source: Pdl, extract: |p| p.pdl().and_then(|d| list(&d.experience)) },
];

const COMPANY_DESCRIPTION: &[Candidate<String>] = &[
    Candidate { source: PdlCompany, extract: |p| p.pdl_company().and_then(|c| text(&c.summary)) },
    Candidate { source: ZoomInfo, extract: |p| p.zoominfo().and_then(|z| text(&z.description)) },
];

const FOUNDED_YEAR: &[Candidate<i32>] = &[
    Candidate { source: PdlCompany, extract: |p| p.pdl_company().and_then(|c| c.founded) },
    Candidate { source: ZoomInfo, extract: |p| p.zoominfo().and_then(|z| z.founded_year) },
];

const COMPANY_TYPE: &[Candidate<String>] = &[
    Candidate { source: PdlCompany, extract: |p| p.pdl_company().and_then(|c| text(&c.company_type)) },
];

const TICKER: &[Candidate<String>] = &[
    Candidate { source: PdlCompany, extract: |p| p.pdl_company().and_then(|c| text(&c.ticker)) },
];

const NAICS_CODES: &[Candidate<Vec<String>>] = &[
    Candidate { source: PdlCompany, extract: |p| p.pdl_company().and_then(|c| list(&c.naics_codes)) },
];

const SIC_CODES: &[Candidate<Vec<String>>] = &[
    Candidate { source: PdlCompany, extract: |p| p.pdl_company().and_then(|c| list(&c.sic_codes)) },
];

/// Data-quality score in `[0, 1]`.
pub fn calculate_quality_score(payloads: &SourcePayloads) -> f64 {
    let usable = payloads.usable_sources();
    let mut score = usable.len() as f64 / TOTAL_SOURCES as f64;

    for bonus_source in [Apollo, ZoomInfo, PdlCompany] {
        if usable.contains(&bonus_source) {
            score += 0.1;
        }
    }
    if let Some(news) = payloads.gnews() {
        if news.result_count >= 5 {
            score += 0.05;
        }
        if !news.themes.is_empty() {
            score += 0.05;
        }
    }

    score.min(1.0)
}

fn field_present(profile: &NormalizedProfile, field: &str) -> bool {
    let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
    match field {
        "company_name" => has(&profile.company_name),
        "industry" => has(&profile.industry),
        "title" => has(&profile.title),
        "employee_count" => profile.employee_count.is_some(),
        "company_summary" => has(&profile.company_summary),
        "founded_year" => profile.founded_year.is_some(),
        "seniority" => has(&profile.seniority),
        "recent_news" => !profile.recent_news.is_empty(),
        "skills" => !profile.skills.is_empty(),
        "employee_growth_rate" => profile.employee_growth_rate.is_some(),
        "total_funding" => profile.total_funding.is_some(),
        "latest_funding_stage" => has(&profile.latest_funding_stage),
        "company_tags" => !profile.company_tags.is_empty(),
        "news_themes" => !profile.news_themes.is_empty(),
        _ => false,
    }
}

/// Weighted completeness over critical (3), important (2) and nice (1) fields.
pub fn completeness_report(profile: &NormalizedProfile) -> CompletenessReport {
    let tiers: [(&[&str], u32); 3] = [(CRITICAL_FIELDS, 3), (IMPORTANT_FIELDS, 2), (NICE_FIELDS, 1)];

    let mut report = CompletenessReport::default();
    let mut weighted_present = 0u32;
    let mut weighted_total = 0u32;

    for (tier, (fields, weight)) in tiers.iter().enumerate() {
        for field in fields.iter() {
            weighted_total += weight;
            if field_present(profile, field) {
                weighted_present += weight;
                report.present.push(field.to_string());
            } else {
                let missing = match tier {
                    0 => &mut report.missing_critical,
                    1 => &mut report.missing_important,
                    _ => &mut report.missing_nice,
                };
                missing.push(field.to_string());
            }
        }
    }

    let total_fields = CRITICAL_FIELDS.len() + IMPORTANT_FIELDS.len() + NICE_FIELDS.len();
    report.score = ((weighted_present as f64 / weighted_total as f64) * 100.0).round() / 100.0;
    report.field_coverage = format!("{}/{}", report.present.len(), total_fields);
    report
}

/// Resolves one profile from the gathered payloads.
pub fn resolve_profile(
    email: &str,
    domain: &str,
    payloads: &SourcePayloads,
    resolved_at: DateTime<Utc>,
) -> NormalizedProfile {
    let industry_raw = merge_field(payloads, INDUSTRY);

    let mut profile = NormalizedProfile {
        email: email.to_string(),
        domain: domain.to_string(),
        first_name: merge_field(payloads, FIRST_NAME),
        last_name: merge_field(payloads, LAST_NAME),
        full_name: merge_field(payloads, FULL_NAME),
        title: merge_field(payloads, TITLE),
        seniority: merge_field(payloads, SENIORITY),
        departments: merge_field(payloads, DEPARTMENTS).unwrap_or_default(),
        skills: merge_field(payloads, SKILLS).unwrap_or_default(),
        interests: merge_field(payloads, INTERESTS).unwrap_or_default(),
        experience: merge_field(payloads, EXPERIENCE).unwrap_or_default(),
        linkedin_url: merge_field(payloads, LINKEDIN_URL),
        company_name: merge_field(payloads, COMPANY_NAME),
        company_display_name: merge_field(payloads, COMPANY_DISPLAY_NAME),
        industry: industry_raw.as_deref().and_then(canonicalize_industry),
        industry_raw,
        company_size: merge_field(payloads, COMPANY_SIZE),
        employee_count: merge_field(payloads, EMPLOYEE_COUNT),
        employee_count_range: merge_field(payloads, EMPLOYEE_COUNT_RANGE),
        city: merge_field(payloads, CITY),
        state: merge_field(payloads, STATE),
        country: merge_field(payloads, COUNTRY),
        company_description: merge_field(payloads, COMPANY_DESCRIPTION),
        founded_year: merge_field(payloads, FOUNDED_YEAR),
        company_type: merge_field(payloads, COMPANY_TYPE),
        ticker: merge_field(payloads, TICKER),
        naics_codes: merge_field(payloads, NAICS_CODES).unwrap_or_default(),
        sic_codes: merge_field(payloads, SIC_CODES).unwrap_or_default(),
        data_sources: payloads.usable_sources(),
        data_quality_score: calculate_quality_score(payloads),
        resolved_at,
        ..Default::default()
    };

    if let Some(hunter) = payloads.hunter() {
        profile.email_verified = hunter.status.as_deref().map(|s| s == "valid");
        profile.email_score = hunter.score;
        profile.email_deliverable = hunter.result.as_deref().map(|r| r == "deliverable");
    }

    if let Some(news) = payloads.gnews() {
        profile.company_context = text(&news.answer);
        profile.recent_news = news.results.clone();
        profile.news_themes = news.themes.clone();
        profile.news_sentiment = text(&news.sentiment);
        profile.news_by_category = news.categorized.clone();
    }

    if let Some(company) = payloads.pdl_company() {
        profile.company_summary = text(&company.summary);
        profile.company_headline = text(&company.headline);
        profile.company_tags = company.tags.clone();
        profile.total_funding = company.total_funding_raised;
        profile.latest_funding_stage = text(&company.latest_funding_stage);
        profile.employee_growth_rate = company.employee_growth_rate;
        profile.inferred_revenue = text(&company.inferred_revenue);
        profile.company_linkedin = text(&company.linkedin_url);
        if profile.employee_count.is_none() {
            profile.employee_count = company.employee_count;
        }
    }

    if profile.employee_count.is_none() {
        let estimate = profile
            .employee_count_range
            .as_deref()
            .and_then(estimate_employee_count)
            .or_else(|| profile.company_size.as_deref().and_then(estimate_employee_count));
        if let Some(count) = estimate {
            profile.employee_count = Some(count);
            profile.employee_count_estimated = true;
        }
    }

    profile.completeness = completeness_report(&profile);

    tracing::info!(
        "✓ Resolved profile for {}: sources={:?}, quality={:.2}, completeness={}",
        email,
        profile.data_sources.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
        profile.data_quality_score,
        profile.completeness.field_coverage
    );

    profile
}
