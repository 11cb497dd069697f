//! Rule cascades that infer buyer context from a resolved profile.
//!
//! Each attribute is decided by an ordered list of checks; the first match
//! wins and a fixed default applies when nothing matches.

use crate::keywords::SearchText;
use crate::models::{
    BusinessPriority, ContextOverrides, InferredContext, ItEnvironment, JourneyStage,
    NormalizedProfile, PrimaryChallenge, TechMaturity, TechSignals, UrgencyLevel,
};
use crate::news_analysis::analyze_news;

const AI_CLOUD_KEYWORDS: &[&str] = &[
    "ai", "artificial intelligence", "machine learning", "cloud", "saas", "cloud computing",
    "deep learning", "neural", "gpu",
];
const TRANSFORMATION_KEYWORDS: &[&str] = &[
    "digital transformation", "modernization", "migration", "cloud migration", "transformation",
];
const COST_KEYWORDS: &[&str] = &[
    "cost reduction", "cost savings", "efficiency", "cost optimization", "budget", "expense",
];
const AI_ADOPTION_KEYWORDS: &[&str] = &[
    "ai adoption", "machine learning", "artificial intelligence", "generative ai", "llm",
    "ai strategy",
];
const GROWTH_KEYWORDS: &[&str] = &["expansion", "growth", "scaling", "acquisition", "new market"];
const TALENT_KEYWORDS: &[&str] = &[
    "talent", "hiring", "skills gap", "workforce", "recruitment", "skills shortage",
];
const INTEGRATION_KEYWORDS: &[&str] = &[
    "integration", "interoperability", "compatibility", "migration", "legacy",
];
const INVESTMENT_KEYWORDS: &[&str] = &[
    "investment", "funding", "capital", "acquisition", "strategic investment", "secures",
    "raises", "raised", "series",
];
const PILOT_KEYWORDS: &[&str] = &["pilot", "proof of concept", "poc", "testing", "trial", "prototype"];
const DATA_AI_ROLE_KEYWORDS: &[&str] = &[
    "data", "ai", "ml", "analytics", "machine learning", "artificial intelligence",
];
const C_LEVEL_TITLE_KEYWORDS: &[&str] = &["ceo", "cto", "cio", "cfo", "ciso", "coo", "chief"];

const TECH_INDUSTRIES: &[&str] = &["technology", "software", "saas", "cloud"];
const REGULATED_INDUSTRY_MARKERS: &[&str] =
    &["health", "financial", "banking", "insurance", "pharma", "government"];

const CLOUD_TAGS: &[&str] = &[
    "cloud", "cloud computing", "aws", "azure", "gcp", "google cloud", "saas", "paas", "iaas",
    "kubernetes", "docker", "serverless", "microservices", "cloud-native", "devops",
];
const AI_ML_TAGS: &[&str] = &[
    "ai", "artificial intelligence", "machine learning", "deep learning", "generative ai",
    "neural", "computer vision", "nlp", "natural language processing", "llm", "gpu", "ml",
];
const TRADITIONAL_TAGS: &[&str] = &[
    "mainframe", "legacy", "erp", "on-premise", "on-premises", "cobol", "as400",
    "client-server",
];
const SECURITY_TAGS: &[&str] = &[
    "security", "cybersecurity", "information security", "cyber security", "identity",
    "encryption", "zero trust", "endpoint",
];
const DATA_TAGS: &[&str] = &[
    "data", "big data", "analytics", "data warehouse", "data lake", "business intelligence",
    "etl", "database",
];

/// Fields counted towards the confidence score.
pub const CONFIDENCE_SIGNAL_FIELDS: usize = 11;

/// Signals pulled once from the profile for all cascades.
struct Signals<'a> {
    profile: &'a NormalizedProfile,
    themes: SearchText,
    articles: SearchText,
    tags: SearchText,
    title: SearchText,
    industry: String,
}

impl<'a> Signals<'a> {
    fn new(profile: &'a NormalizedProfile) -> Self {
        Self {
            profile,
            themes: SearchText::from_parts(profile.news_themes.iter().map(String::as_str)),
            articles: SearchText::from_parts(
                profile
                    .recent_news
                    .iter()
                    .flat_map(|a| [a.title.as_str(), a.content.as_str()]),
            ),
            tags: SearchText::from_parts(profile.company_tags.iter().map(String::as_str)),
            title: SearchText::new(profile.title.as_deref().unwrap_or_default()),
            industry: profile
                .industry
                .as_deref()
                .unwrap_or_default()
                .trim()
                .to_lowercase(),
        }
    }

    fn news_mentions(&self, set: &[&str]) -> bool {
        self.themes.any(set) || self.articles.any(set)
    }

    fn is_tech_industry(&self) -> bool {
        TECH_INDUSTRIES.contains(&self.industry.as_str())
    }

    fn is_regulated_industry(&self) -> bool {
        let raw = self
            .profile
            .industry_raw
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        REGULATED_INDUSTRY_MARKERS
            .iter()
            .any(|m| self.industry.contains(m) || raw.contains(m))
    }

    fn is_c_level(&self) -> bool {
        let seniority = self
            .profile
            .seniority
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        seniority == "c_suite" || seniority == "cxo" || self.title.any(C_LEVEL_TITLE_KEYWORDS)
    }
}

fn tag_matches(tag: &str, keyword: &str) -> bool {
    tag == keyword || (keyword.len() >= 5 && tag.contains(keyword))
}

fn bucket(tags: &[String], keywords: &[&str]) -> Vec<String> {
    tags.iter()
        .filter(|tag| {
            let lowered = tag.trim().to_lowercase();
            keywords.iter().any(|k| tag_matches(&lowered, k))
        })
        .cloned()
        .collect()
}

/// Buckets company tags by technology family and grades their maturity.
pub fn classify_tech_tags(tags: &[String]) -> TechSignals {
    let tags: Vec<String> = tags.iter().filter(|t| !t.trim().is_empty()).cloned().collect();
    if tags.is_empty() {
        return TechSignals::default();
    }

    let cloud = bucket(&tags, CLOUD_TAGS);
    let ai_ml = bucket(&tags, AI_ML_TAGS);
    let traditional = bucket(&tags, TRADITIONAL_TAGS);

    let maturity = match (!cloud.is_empty(), !ai_ml.is_empty()) {
        (true, true) => TechMaturity::Advanced,
        (true, false) | (false, true) => TechMaturity::Modern,
        (false, false) if !traditional.is_empty() => TechMaturity::Traditional,
        _ => TechMaturity::Mixed,
    };

    TechSignals {
        security: bucket(&tags, SECURITY_TAGS),
        data: bucket(&tags, DATA_TAGS),
        cloud,
        ai_ml,
        traditional,
        maturity,
    }
}

pub fn infer_it_environment(profile: &NormalizedProfile) -> ItEnvironment {
    let signals = Signals::new(profile);

    match classify_tech_tags(&profile.company_tags).maturity {
        TechMaturity::Advanced | TechMaturity::Modern => return ItEnvironment::Modern,
        TechMaturity::Traditional => return ItEnvironment::Traditional,
        TechMaturity::Mixed | TechMaturity::Unknown => {}
    }

    if let Some(founded) = profile.founded_year {
        if founded > 2015 && signals.is_tech_industry() {
            return ItEnvironment::Modern;
        }
        if founded < 2000 && !signals.is_tech_industry() {
            return ItEnvironment::Traditional;
        }
    }

    if signals.themes.any(TRANSFORMATION_KEYWORDS) || signals.themes.any(AI_CLOUD_KEYWORDS) {
        return ItEnvironment::Modernizing;
    }

    ItEnvironment::Modernizing
}

pub fn infer_business_priority(profile: &NormalizedProfile) -> BusinessPriority {
    let signals = Signals::new(profile);

    if signals.news_mentions(COST_KEYWORDS) {
        return BusinessPriority::ReducingCost;
    }
    if signals.title.any(DATA_AI_ROLE_KEYWORDS) {
        return BusinessPriority::PreparingAi;
    }
    if signals.news_mentions(AI_ADOPTION_KEYWORDS) {
        return BusinessPriority::PreparingAi;
    }
    if signals.tags.any(AI_CLOUD_KEYWORDS) {
        return BusinessPriority::PreparingAi;
    }
    if profile.employee_growth_rate.is_some_and(|g| g > 0.3) {
        return BusinessPriority::ImprovingPerformance;
    }
    if signals.news_mentions(GROWTH_KEYWORDS) {
        return BusinessPriority::ImprovingPerformance;
    }

    BusinessPriority::PreparingAi
}

pub fn infer_challenge(profile: &NormalizedProfile) -> PrimaryChallenge {
    let signals = Signals::new(profile);

    if signals.is_regulated_industry() {
        return PrimaryChallenge::DataGovernance;
    }
    if signals.news_mentions(TALENT_KEYWORDS) {
        return PrimaryChallenge::SkillsGap;
    }
    if profile.employee_count.is_some_and(|n| n < 200) {
        return PrimaryChallenge::ResourceConstraints;
    }
    if signals.news_mentions(INTEGRATION_KEYWORDS) {
        return PrimaryChallenge::IntegrationFriction;
    }
    if profile.founded_year.is_some_and(|y| y < 2005) && !signals.is_tech_industry() {
        return PrimaryChallenge::LegacySystems;
    }

    PrimaryChallenge::LegacySystems
}

pub fn infer_urgency_level(profile: &NormalizedProfile) -> UrgencyLevel {
    let growth = profile.employee_growth_rate;

    if growth.is_some_and(|g| g > 0.4) {
        return UrgencyLevel::High;
    }
    if profile.latest_funding_stage.is_some() && profile.total_funding.is_some() {
        return UrgencyLevel::High;
    }
    if growth.is_some_and(|g| g < 0.0) {
        return UrgencyLevel::Low;
    }
    if profile.employee_count.is_some_and(|n| n < 100) && growth.map_or(true, |g| g <= 0.0) {
        return UrgencyLevel::Low;
    }

    UrgencyLevel::Medium
}

pub fn infer_journey_stage(profile: &NormalizedProfile) -> JourneyStage {
    let signals = Signals::new(profile);

    if signals.is_c_level() && signals.articles.any(INVESTMENT_KEYWORDS) {
        return JourneyStage::Decision;
    }
    if signals.articles.any(PILOT_KEYWORDS) {
        return JourneyStage::Implementation;
    }
    if profile.latest_funding_stage.is_some() {
        return JourneyStage::Consideration;
    }

    JourneyStage::Consideration
}

/// Number of confidence signal fields populated on the profile.
pub fn count_signals(profile: &NormalizedProfile) -> usize {
    let present = |s: &Option<String>| s.as_deref().is_some_and(|v| !v.trim().is_empty());
    [
        !profile.company_tags.is_empty(),
        !profile.news_themes.is_empty(),
        !profile.recent_news.is_empty(),
        profile.founded_year.is_some(),
        profile.employee_count.is_some(),
        profile.employee_growth_rate.is_some(),
        present(&profile.latest_funding_stage),
        present(&profile.title),
        present(&profile.seniority),
        present(&profile.industry),
        present(&profile.company_summary),
    ]
    .into_iter()
    .filter(|p| *p)
    .count()
}

/// Confidence in the inferred context, in `[0.2, 1.0]`.
///
/// Non-decreasing in the number of populated signal fields.
pub fn calculate_confidence(profile: &NormalizedProfile) -> f64 {
    let mut score = 0.2
        + (count_signals(profile) as f64 / CONFIDENCE_SIGNAL_FIELDS as f64) * 0.7;
    if profile.recent_news.len() >= 3 {
        score += 0.1;
    }
    (score.min(1.0) * 100.0).round() / 100.0
}

/// Infers the full buyer context. Overrides always win over inference.
pub fn infer_context(profile: &NormalizedProfile, overrides: &ContextOverrides) -> InferredContext {
    let context = InferredContext {
        it_environment: overrides
            .it_environment
            .unwrap_or_else(|| infer_it_environment(profile)),
        business_priority: overrides
            .business_priority
            .unwrap_or_else(|| infer_business_priority(profile)),
        primary_challenge: overrides
            .primary_challenge
            .unwrap_or_else(|| infer_challenge(profile)),
        urgency_level: infer_urgency_level(profile),
        journey_stage: overrides
            .journey_stage
            .unwrap_or_else(|| infer_journey_stage(profile)),
        confidence_score: calculate_confidence(profile),
        tech_signals: classify_tech_tags(&profile.company_tags),
        news: analyze_news(&profile.recent_news),
    };

    tracing::info!(
        "Context inferred: env={}, priority={}, challenge={}, urgency={}, stage={}, confidence={:.2}",
        context.it_environment,
        context.business_priority,
        context.primary_challenge,
        context.urgency_level,
        context.journey_stage,
        context.confidence_score
    );

    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewsArticle;

    fn article(title: &str) -> NewsArticle {
        NewsArticle {
            title: title.to_string(),
            ..Default::default()
        }
    }

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_old_manufacturer_is_traditional() {
        let profile = NormalizedProfile {
            founded_year: Some(1985),
            industry: Some("manufacturing".to_string()),
            ..Default::default()
        };
        assert_eq!(infer_it_environment(&profile), ItEnvironment::Traditional);
    }

    #[test]
    fn test_tags_take_precedence_over_founding_year() {
        let profile = NormalizedProfile {
            founded_year: Some(1985),
            industry: Some("manufacturing".to_string()),
            company_tags: tags(&["Cloud Computing", "Machine Learning"]),
            ..Default::default()
        };
        assert_eq!(infer_it_environment(&profile), ItEnvironment::Modern);
    }

    #[test]
    fn test_young_tech_company_is_modern() {
        let profile = NormalizedProfile {
            founded_year: Some(2018),
            industry: Some("technology".to_string()),
            ..Default::default()
        };
        assert_eq!(infer_it_environment(&profile), ItEnvironment::Modern);
    }

    #[test]
    fn test_it_environment_default() {
        assert_eq!(
            infer_it_environment(&NormalizedProfile::default()),
            ItEnvironment::Modernizing
        );
    }

    #[test]
    fn test_tech_tag_classification() {
        let signals = classify_tech_tags(&tags(&["AWS", "data lake", "mainframe", "Zero Trust"]));
        assert_eq!(signals.cloud, tags(&["AWS"]));
        assert_eq!(signals.data, tags(&["data lake"]));
        assert_eq!(signals.security, tags(&["Zero Trust"]));
        assert_eq!(signals.maturity, TechMaturity::Modern);

        let legacy = classify_tech_tags(&tags(&["mainframe", "cobol"]));
        assert_eq!(legacy.maturity, TechMaturity::Traditional);

        let mixed = classify_tech_tags(&tags(&["logistics", "consulting"]));
        assert_eq!(mixed.maturity, TechMaturity::Mixed);

        assert_eq!(classify_tech_tags(&[]).maturity, TechMaturity::Unknown);
    }

    #[test]
    fn test_short_tag_keywords_require_exact_match() {
        // "ai" must not match "retail"
        let signals = classify_tech_tags(&tags(&["retail"]));
        assert!(signals.ai_ml.is_empty());
        assert_eq!(signals.maturity, TechMaturity::Mixed);
    }

    #[test]
    fn test_cost_news_wins_priority() {
        let profile = NormalizedProfile {
            title: Some("Head of Data".to_string()),
            recent_news: vec![article("Acme launches cost reduction program")],
            ..Default::default()
        };
        assert_eq!(infer_business_priority(&profile), BusinessPriority::ReducingCost);
    }

    #[test]
    fn test_data_role_prepares_for_ai() {
        let profile = NormalizedProfile {
            title: Some("VP Data Platform".to_string()),
            employee_growth_rate: Some(0.5),
            ..Default::default()
        };
        assert_eq!(infer_business_priority(&profile), BusinessPriority::PreparingAi);
    }

    #[test]
    fn test_director_title_is_not_a_data_role() {
        let profile = NormalizedProfile {
            title: Some("Director of Operations".to_string()),
            employee_growth_rate: Some(0.35),
            ..Default::default()
        };
        assert_eq!(
            infer_business_priority(&profile),
            BusinessPriority::ImprovingPerformance
        );
    }

    #[test]
    fn test_database_admin_is_not_a_data_role() {
        let profile = NormalizedProfile {
            title: Some("Database Admin".to_string()),
            employee_growth_rate: Some(0.35),
            ..Default::default()
        };
        assert_eq!(
            infer_business_priority(&profile),
            BusinessPriority::ImprovingPerformance
        );
    }

    #[test]
    fn test_priority_default() {
        assert_eq!(
            infer_business_priority(&NormalizedProfile::default()),
            BusinessPriority::PreparingAi
        );
    }

    #[test]
    fn test_challenge_cascade() {
        let regulated = NormalizedProfile {
            industry: Some("healthcare".to_string()),
            employee_count: Some(50),
            ..Default::default()
        };
        assert_eq!(infer_challenge(&regulated), PrimaryChallenge::DataGovernance);

        let small = NormalizedProfile {
            industry: Some("retail".to_string()),
            employee_count: Some(150),
            ..Default::default()
        };
        assert_eq!(infer_challenge(&small), PrimaryChallenge::ResourceConstraints);

        let hiring = NormalizedProfile {
            employee_count: Some(150),
            recent_news: vec![article("Acme struggles with hiring engineers")],
            ..Default::default()
        };
        assert_eq!(infer_challenge(&hiring), PrimaryChallenge::SkillsGap);

        let integrating = NormalizedProfile {
            employee_count: Some(5000),
            news_themes: vec!["Systems integration".to_string()],
            ..Default::default()
        };
        assert_eq!(infer_challenge(&integrating), PrimaryChallenge::IntegrationFriction);

        assert_eq!(
            infer_challenge(&NormalizedProfile::default()),
            PrimaryChallenge::LegacySystems
        );
    }

    #[test]
    fn test_urgency_cascade() {
        let fast = NormalizedProfile {
            employee_growth_rate: Some(0.55),
            ..Default::default()
        };
        assert_eq!(infer_urgency_level(&fast), UrgencyLevel::High);

        let funded = NormalizedProfile {
            latest_funding_stage: Some("series_c".to_string()),
            total_funding: Some(120_000_000.0),
            ..Default::default()
        };
        assert_eq!(infer_urgency_level(&funded), UrgencyLevel::High);

        let shrinking = NormalizedProfile {
            employee_growth_rate: Some(-0.1),
            ..Default::default()
        };
        assert_eq!(infer_urgency_level(&shrinking), UrgencyLevel::Low);

        let tiny = NormalizedProfile {
            employee_count: Some(40),
            ..Default::default()
        };
        assert_eq!(infer_urgency_level(&tiny), UrgencyLevel::Low);

        assert_eq!(
            infer_urgency_level(&NormalizedProfile::default()),
            UrgencyLevel::Medium
        );
    }

    #[test]
    fn test_journey_stage_cascade() {
        let decision = NormalizedProfile {
            title: Some("Chief Technology Officer".to_string()),
            recent_news: vec![article("Acme raises $50M Series B")],
            ..Default::default()
        };
        assert_eq!(infer_journey_stage(&decision), JourneyStage::Decision);

        let not_c_level = NormalizedProfile {
            title: Some("Director of Engineering".to_string()),
            recent_news: vec![article("Acme raises $50M Series B")],
            ..Default::default()
        };
        assert_eq!(infer_journey_stage(&not_c_level), JourneyStage::Consideration);

        let pilot = NormalizedProfile {
            recent_news: vec![article("Acme begins pilot of new platform")],
            ..Default::default()
        };
        assert_eq!(infer_journey_stage(&pilot), JourneyStage::Implementation);
    }

    #[test]
    fn test_overrides_win() {
        let profile = NormalizedProfile {
            founded_year: Some(1985),
            industry: Some("manufacturing".to_string()),
            ..Default::default()
        };
        let overrides = ContextOverrides {
            it_environment: Some(ItEnvironment::Modern),
            journey_stage: Some(JourneyStage::Awareness),
            business_priority: Some(BusinessPriority::ReducingCost),
            primary_challenge: Some(PrimaryChallenge::SkillsGap),
        };
        let context = infer_context(&profile, &overrides);
        assert_eq!(context.it_environment, ItEnvironment::Modern);
        assert_eq!(context.journey_stage, JourneyStage::Awareness);
        assert_eq!(context.business_priority, BusinessPriority::ReducingCost);
        assert_eq!(context.primary_challenge, PrimaryChallenge::SkillsGap);
    }

    #[test]
    fn test_confidence_bounds() {
        assert_eq!(calculate_confidence(&NormalizedProfile::default()), 0.2);

        let full = NormalizedProfile {
            company_tags: tags(&["cloud"]),
            news_themes: tags(&["growth"]),
            recent_news: vec![article("a"), article("b"), article("c")],
            founded_year: Some(2001),
            employee_count: Some(500),
            employee_growth_rate: Some(0.1),
            latest_funding_stage: Some("series_a".to_string()),
            title: Some("CTO".to_string()),
            seniority: Some("c_suite".to_string()),
            industry: Some("technology".to_string()),
            company_summary: Some("Acme builds rockets.".to_string()),
            ..Default::default()
        };
        assert_eq!(count_signals(&full), CONFIDENCE_SIGNAL_FIELDS);
        assert_eq!(calculate_confidence(&full), 1.0);
    }
}
