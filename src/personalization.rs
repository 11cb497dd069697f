//! Intro hook and call to action for the ebook landing page.

use regex::Regex;
use serde::Deserialize;
use std::sync::{Arc, LazyLock};
use std::time::Instant;

use crate::config::Config;
use crate::llm_client::{LanguageModel, ModelCallError, ModelRequest, RetryPolicy};
use crate::models::{EnrichRequest, NormalizedProfile, Personalization};

pub const MAX_INTRO_CHARS: usize = 200;
pub const MAX_CTA_CHARS: usize = 150;
const MAX_TOKENS: u32 = 500;
const PREMIUM_QUALITY_THRESHOLD: f64 = 0.8;

static REPLY_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{[^{}]*"intro_hook"[^{}]*"cta"[^{}]*\}"#).expect("reply pattern is valid")
});

const SYSTEM_PROMPT: &str = r##"You are a B2B marketing copywriter creating personalized content for ebook landing pages.

Your task: Generate a personalized intro hook (1-2 sentences) and call-to-action (CTA) based on the prospect's profile.

Rules:
1. Be conversational and specific to their role/company
2. Reference their industry or company context when available
3. Keep intro under 200 characters
4. Keep CTA under 150 characters
5. Do NOT make unsubstantiated claims (no "guaranteed", "proven", "#1", etc.)
6. Do NOT use superlatives without evidence
7. Sound helpful, not salesy

Output ONLY valid JSON in this exact format:
{
  "intro_hook": "Your personalized intro here",
  "cta": "Your call to action here"
}

No other text before or after the JSON."##;

/// What the reader told us about themselves on the form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserContext {
    pub goal: Option<String>,
    pub persona: Option<String>,
    pub industry: Option<String>,
}

impl From<&EnrichRequest> for UserContext {
    fn from(req: &EnrichRequest) -> Self {
        let clean = |v: &Option<String>| {
            v.as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| s.to_lowercase())
        };
        Self {
            goal: clean(&req.goal),
            persona: clean(&req.persona),
            industry: clean(&req.industry),
        }
    }
}

fn goal_description(goal: &str) -> Option<&'static str> {
    match goal {
        "exploring" => Some("exploring modernization options and doing early research"),
        "evaluating" => Some("comparing different approaches for their organization"),
        "learning" => Some("learning about best practices and industry trends"),
        "building_case" => Some("building a business case to present internally"),
        _ => None,
    }
}

fn persona_description(persona: &str) -> Option<&'static str> {
    match persona {
        "executive" => Some("an executive leader (C-suite or VP level) focused on strategic decisions"),
        "it_infrastructure" => Some("an IT/Infrastructure professional managing technical operations"),
        "security" => Some("a security professional focused on protecting systems and data"),
        "data_ai" => Some("a data/AI engineer working on analytics and machine learning"),
        "sales_gtm" => Some("a sales or GTM leader driving revenue growth"),
        "hr_people" => Some("an HR/People Ops professional managing talent and culture"),
        "other" => Some("a professional seeking industry insights"),
        _ => None,
    }
}

fn industry_angle(industry: &str) -> Option<&'static str> {
    match industry {
        "healthcare" => Some("compliance, patient outcomes, and operational efficiency"),
        "financial_services" => Some("risk management, regulatory compliance, and digital transformation"),
        "technology" => Some("innovation velocity, scalability, and technical excellence"),
        "gaming_media" => Some("user engagement, content delivery, and real-time performance"),
        "manufacturing" => Some("operational efficiency, supply chain optimization, and IoT"),
        "retail" => Some("customer experience, omnichannel strategy, and inventory management"),
        "government" => Some("security, compliance, and citizen services modernization"),
        "energy" => Some("grid modernization, sustainability, and operational resilience"),
        "telecommunications" => Some("network performance, 5G adoption, and customer experience"),
        _ => None,
    }
}

fn industry_hook(industry: &str) -> &'static str {
    match industry {
        "healthcare" => "Healthcare organizations are modernizing their infrastructure to improve patient outcomes while maintaining strict compliance.",
        "financial_services" => "Financial services leaders are balancing regulatory requirements with the need for digital transformation and innovation.",
        "technology" => "Tech companies like yours are pushing the boundaries of what's possible with modern infrastructure and AI workloads.",
        "gaming_media" => "Gaming and media companies need infrastructure that delivers real-time performance at massive scale.",
        "manufacturing" => "Manufacturing leaders are leveraging smart infrastructure to optimize operations and drive efficiency.",
        "retail" => "Retail organizations are transforming customer experiences through modern, scalable technology.",
        "government" => "Government agencies are modernizing citizen services while maintaining the highest security standards.",
        "energy" => "Energy companies are building resilient, sustainable infrastructure for the future.",
        "telecommunications" => "Telecom providers are building next-generation networks to meet growing connectivity demands.",
        _ => "Organizations like yours are discovering new ways to modernize and scale.",
    }
}

fn goal_intro(goal: &str) -> &'static str {
    match goal {
        "exploring" => "You're taking the right first step by exploring your options.",
        "evaluating" => "Making the right infrastructure decision requires careful evaluation.",
        "learning" => "Staying informed on best practices gives you a strategic advantage.",
        "building_case" => "Building a compelling business case starts with the right insights.",
        _ => "",
    }
}

fn persona_cta(persona: &str) -> Option<&'static str> {
    match persona {
        "executive" => Some("Get the executive summary with ROI insights for your board"),
        "it_infrastructure" => Some("Download the technical deep-dive with architecture patterns"),
        "security" => Some("Access the security-focused guide with compliance frameworks"),
        "data_ai" => Some("Get the data infrastructure guide optimized for AI workloads"),
        "sales_gtm" => Some("Download strategies to accelerate your digital sales motion"),
        "hr_people" => Some("Learn how tech modernization impacts talent and culture"),
        _ => None,
    }
}

/// `15000` → `"15,000"`.
pub fn format_thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::new();
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if value < 0 {
        format!("-{}", out)
    } else {
        out
    }
}

/// `7_100_000_000.0` → `"$7.1B"`.
pub fn format_money(amount: f64) -> String {
    if amount >= 1e9 {
        format!("${:.1}B", amount / 1e9)
    } else if amount >= 1e6 {
        format!("${:.1}M", amount / 1e6)
    } else {
        format!("${}", format_thousands(amount.round() as i64))
    }
}

pub fn growth_phrase(rate: f64) -> String {
    let pct = (rate * 100.0).round() as i64;
    if rate >= 0.3 {
        format!("rapidly growing ({}% headcount growth)", pct)
    } else if rate > 0.0 {
        format!("growing ({}% headcount growth)", pct)
    } else if rate < 0.0 {
        format!("shrinking ({}% headcount change)", pct)
    } else {
        "stable headcount".to_string()
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let kept: String = text.chars().take(max - 3).collect();
    format!("{}...", kept)
}

fn prefix_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Company facts that stand in for news when no articles were found.
pub fn derived_intelligence(profile: &NormalizedProfile) -> Vec<String> {
    let mut facts = Vec::new();
    if let Some(count) = profile.employee_count {
        facts.push(format!("- Headcount: {} employees", format_thousands(count)));
    }
    if let Some(rate) = profile.employee_growth_rate {
        facts.push(format!("- Growth: {}", growth_phrase(rate)));
    }
    if let Some(stage) = &profile.latest_funding_stage {
        match profile.total_funding.filter(|f| *f > 0.0) {
            Some(total) => facts.push(format!(
                "- Funding: {} ({} raised in total)",
                stage,
                format_money(total)
            )),
            None => facts.push(format!("- Funding: {}", stage)),
        }
    }
    if !profile.company_tags.is_empty() {
        facts.push(format!("- Focus areas: {}", profile.company_tags.join(", ")));
    }
    if let Some(year) = profile.founded_year {
        facts.push(format!("- Founded: {}", year));
    }
    if let Some(summary) = profile
        .company_summary
        .as_deref()
        .or(profile.company_description.as_deref())
    {
        facts.push(format!("- About: {}", prefix_chars(summary, 300)));
    }
    facts
}

/// Prompt for the intro hook and CTA.
pub fn build_prompt(profile: &NormalizedProfile, user: &UserContext) -> String {
    let company = profile.company_name.as_deref().unwrap_or("your company");
    let industry = user
        .industry
        .as_deref()
        .or(profile.industry.as_deref())
        .unwrap_or("your industry");

    let mut parts = vec![
        "Create personalized content for this prospect:\n".to_string(),
        format!("- First Name: {}", profile.first_name.as_deref().unwrap_or("there")),
        format!("- Company: {}", company),
        format!("- Title: {}", profile.title.as_deref().unwrap_or("professional")),
        format!("- Industry: {}", industry),
    ];
    if let Some(size) = &profile.company_size {
        parts.push(format!("- Company Size: {}", size));
    }
    if let Some(seniority) = &profile.seniority {
        parts.push(format!("- Seniority: {}", seniority));
    }

    if let Some(goal) = &user.goal {
        let desc = goal_description(goal).unwrap_or(goal.as_str());
        parts.push(format!("\nThis person is currently {}.", desc));
    }
    if let Some(persona) = &user.persona {
        let desc = persona_description(persona).unwrap_or(persona.as_str());
        parts.push(format!("They are {}.", desc));
    }
    if let Some(angle) = industry_angle(industry) {
        parts.push(format!("In their industry, key concerns include {}.", angle));
    }

    if profile.recent_news.is_empty() {
        let facts = derived_intelligence(profile);
        if facts.is_empty() {
            parts.push(
                "\nNo recent news or company data is available. Ground the content in common challenges for their industry and role."
                    .to_string(),
            );
        } else {
            parts.push(format!(
                "\nCOMPANY INTELLIGENCE SIGNALS (DERIVED INTELLIGENCE, no recent news found for {}):",
                company
            ));
            parts.extend(facts);
            parts.push("Use these facts in place of news so the content is specific to this company.".to_string());
        }
    } else {
        parts.push("\nRECENT NEWS:".to_string());
        for article in profile.recent_news.iter().take(5) {
            match article.source.as_deref().filter(|s| !s.is_empty()) {
                Some(source) => parts.push(format!("- {} ({})", article.title, source)),
                None => parts.push(format!("- {}", article.title)),
            }
        }
        if !profile.news_themes.is_empty() {
            parts.push(format!("News themes: {}", profile.news_themes.join(", ")));
        }
    }

    if let Some(context) = &profile.company_context {
        parts.push(format!("\nRecent company context: {}", prefix_chars(context, 500)));
    }

    parts.push("\nGenerate content that speaks directly to their role, goals, and industry context.".to_string());
    parts.push("Make it specific and actionable, not generic.".to_string());
    parts.push("\nGenerate the JSON response now.".to_string());
    parts.join("\n")
}

pub fn build_fix_prompt(failed_response: &str) -> String {
    format!(
        r#"The previous response was not valid JSON. Here's what was returned:

{}

Please fix this and return ONLY valid JSON in this exact format:
{{
  "intro_hook": "Your personalized intro here",
  "cta": "Your call to action here"
}}

No other text."#,
        failed_response
    )
}

#[derive(Deserialize)]
struct Reply {
    #[serde(default)]
    intro_hook: String,
    #[serde(default)]
    cta: String,
}

/// Extracts `(intro_hook, cta)` from a reply, truncating over-long values.
pub fn parse_reply(content: &str) -> Option<(String, String)> {
    let found = REPLY_JSON.find(content)?;
    let reply: Reply = match serde_json::from_str(found.as_str()) {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!("JSON parse error: {}", e);
            return None;
        }
    };
    let intro = reply.intro_hook.trim();
    let cta = reply.cta.trim();
    if intro.is_empty() || cta.is_empty() {
        return None;
    }
    Some((
        truncate_chars(intro, MAX_INTRO_CHARS),
        truncate_chars(cta, MAX_CTA_CHARS),
    ))
}

/// Deterministic copy used when no model is configured.
pub fn mock_personalization(profile: &NormalizedProfile, user: &UserContext) -> Personalization {
    tracing::info!("Personalization: using mock response (no API key)");
    // no industry at all gets the generic hook
    let industry = user
        .industry
        .as_deref()
        .or(profile.industry.as_deref())
        .unwrap_or_default();
    let base_hook = industry_hook(industry);
    let goal_hook = user.goal.as_deref().map(goal_intro).unwrap_or("");

    let intro = match (&profile.first_name, &profile.company_name) {
        (Some(_), Some(company)) => {
            let intro = format!("{} {}", goal_hook, base_hook).trim().to_string();
            if intro.chars().count() < 50 {
                format!("{} At {}, these insights can drive real impact.", intro, company)
            } else {
                intro
            }
        }
        (Some(_), None) => format!("{} {}", goal_hook, base_hook).trim().to_string(),
        _ => base_hook.to_string(),
    };

    let cta = match (user.persona.as_deref().and_then(persona_cta), &profile.title) {
        (Some(cta), _) => cta.to_string(),
        (None, Some(title)) => format!("Get your free ebook with actionable insights for {}s like you", title),
        (None, None) => "Download your personalized guide and unlock strategies for your team".to_string(),
    };

    Personalization {
        intro_hook: prefix_chars(&intro, MAX_INTRO_CHARS),
        cta: prefix_chars(&cta, MAX_CTA_CHARS),
        model_used: "mock".to_string(),
        tokens_used: 0,
        latency_ms: 0,
    }
}

/// Safe copy returned after every attempt failed.
pub fn fallback_personalization(profile: &NormalizedProfile) -> Personalization {
    tracing::warn!("⚠ Using fallback personalization due to model failures");
    let greeting = profile
        .first_name
        .as_deref()
        .map(|n| format!("Hi {}, ", n))
        .unwrap_or_default();
    Personalization {
        intro_hook: format!(
            "{}This guide was created to help professionals like you navigate common challenges in your field.",
            greeting
        ),
        cta: "Download the guide and discover actionable insights for your team.".to_string(),
        model_used: "fallback".to_string(),
        tokens_used: 0,
        latency_ms: 0,
    }
}

/// Generates the intro hook and CTA, choosing the model per profile.
#[derive(Clone)]
pub struct PersonalizationGenerator {
    model: Option<Arc<dyn LanguageModel>>,
    default_model: String,
    premium_model: String,
    vip_domains: Vec<String>,
    policy: RetryPolicy,
}

impl PersonalizationGenerator {
    pub fn new(config: &Config, model: Option<Arc<dyn LanguageModel>>) -> Self {
        Self {
            model,
            default_model: config.personalization_model.clone(),
            premium_model: config.premium_model.clone(),
            vip_domains: config.vip_domains.clone(),
            policy: RetryPolicy::from_config(config),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Premium model for high-quality profiles and VIP domains.
    pub fn should_use_premium(&self, profile: &NormalizedProfile) -> bool {
        profile.data_quality_score >= PREMIUM_QUALITY_THRESHOLD
            || self
                .vip_domains
                .iter()
                .any(|d| d.eq_ignore_ascii_case(&profile.domain))
    }

    pub fn model_for(&self, profile: &NormalizedProfile) -> &str {
        if self.should_use_premium(profile) {
            &self.premium_model
        } else {
            &self.default_model
        }
    }

    pub async fn generate(&self, profile: &NormalizedProfile, user: &UserContext) -> Personalization {
        let Some(model) = &self.model else {
            return mock_personalization(profile, user);
        };

        let started = Instant::now();
        let model_name = self.model_for(profile).to_string();
        let mut prompt = build_prompt(profile, user);

        for attempt in 1..=self.policy.max_attempts {
            let request = ModelRequest::new(model_name.clone(), prompt.clone(), MAX_TOKENS)
                .with_system(SYSTEM_PROMPT);

            match model.complete(&request).await {
                Ok(response) => {
                    if let Some((intro_hook, cta)) = parse_reply(&response.text) {
                        let latency_ms = started.elapsed().as_millis() as u64;
                        tracing::info!(
                            "✓ Generated personalization: model={}, tokens={}, latency={}ms",
                            model_name,
                            response.tokens_used(),
                            latency_ms
                        );
                        return Personalization {
                            intro_hook,
                            cta,
                            model_used: model_name,
                            tokens_used: response.tokens_used(),
                            latency_ms,
                        };
                    }
                    if attempt < self.policy.max_attempts {
                        tracing::warn!(
                            "Parse failed, retrying with fix prompt (attempt {})",
                            attempt
                        );
                        prompt = build_fix_prompt(&response.text);
                    }
                }
                Err(ModelCallError::RateLimited(msg)) => {
                    let delay = self.policy.backoff(attempt);
                    tracing::warn!("⚠ Rate limited, retrying in {:?}: {}", delay, msg);
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_transient() => {
                    tracing::warn!("⚠ {}, retrying", e);
                }
                Err(e) => {
                    tracing::error!("❌ Personalization call failed: {}", e);
                    break;
                }
            }
        }

        fallback_personalization(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewsArticle;

    fn datadog() -> NormalizedProfile {
        NormalizedProfile {
            first_name: Some("John".to_string()),
            title: Some("CTO".to_string()),
            company_name: Some("Datadog".to_string()),
            industry: Some("technology".to_string()),
            employee_count: Some(5000),
            employee_growth_rate: Some(0.25),
            company_summary: Some(
                "Datadog is a monitoring and analytics platform for cloud-scale applications."
                    .to_string(),
            ),
            total_funding: Some(147_800_000.0),
            latest_funding_stage: Some("ipo".to_string()),
            company_tags: vec![
                "cloud".to_string(),
                "monitoring".to_string(),
                "saas".to_string(),
                "analytics".to_string(),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_derived_intelligence_when_no_news() {
        let prompt = build_prompt(&datadog(), &UserContext::default());
        assert!(prompt.contains("DERIVED INTELLIGENCE"));
        assert!(prompt.contains("5,000"));
        assert!(prompt.contains("Datadog"));
        assert!(prompt.contains("monitoring"));
        assert!(prompt.contains("$147.8M"));
    }

    #[test]
    fn test_news_replaces_derived_intelligence() {
        let mut profile = datadog();
        profile.recent_news = vec![NewsArticle {
            title: "Datadog launches new AI observability suite".to_string(),
            source: Some("TechCrunch".to_string()),
            ..Default::default()
        }];
        let prompt = build_prompt(&profile, &UserContext::default());
        assert!(!prompt.contains("DERIVED INTELLIGENCE"));
        assert!(prompt.contains("Datadog launches new AI observability suite (TechCrunch)"));
    }

    #[test]
    fn test_growth_and_funding_signals() {
        let profile = NormalizedProfile {
            company_name: Some("ScaleAI".to_string()),
            employee_growth_rate: Some(0.45),
            latest_funding_stage: Some("series_d".to_string()),
            ..Default::default()
        };
        let prompt = build_prompt(&profile, &UserContext::default());
        assert!(prompt.contains("45%"));
        assert!(prompt.contains("rapidly growing"));
        assert!(prompt.contains("series_d"));
    }

    #[test]
    fn test_user_context_lines() {
        let user = UserContext {
            goal: Some("building_case".to_string()),
            persona: Some("security".to_string()),
            industry: Some("healthcare".to_string()),
        };
        let prompt = build_prompt(&datadog(), &user);
        assert!(prompt.contains("This person is currently building a business case"));
        assert!(prompt.contains("They are a security professional"));
        assert!(prompt.contains("- Industry: healthcare"));
        assert!(prompt.contains("key concerns include compliance, patient outcomes"));
    }

    #[test]
    fn test_parse_reply_and_truncation() {
        let long_intro = "a".repeat(250);
        let text = format!(
            "Sure!\n```json\n{{\"intro_hook\": \"{}\", \"cta\": \"Read it\"}}\n```",
            long_intro
        );
        let (intro, cta) = parse_reply(&text).unwrap();
        assert_eq!(intro.chars().count(), MAX_INTRO_CHARS);
        assert!(intro.ends_with("..."));
        assert_eq!(cta, "Read it");

        assert!(parse_reply("no json here").is_none());
        assert!(parse_reply(r#"{"intro_hook": "", "cta": "x"}"#).is_none());
    }

    #[test]
    fn test_mock_uses_tables() {
        let user = UserContext {
            goal: Some("exploring".to_string()),
            persona: Some("executive".to_string()),
            industry: None,
        };
        let result = mock_personalization(&datadog(), &user);
        assert_eq!(result.model_used, "mock");
        assert!(result.intro_hook.starts_with("You're taking the right first step"));
        assert!(result.intro_hook.contains("Tech companies like yours"));
        assert_eq!(result.cta, "Get the executive summary with ROI insights for your board");

        let bare = mock_personalization(&NormalizedProfile::default(), &UserContext::default());
        assert_eq!(
            bare.intro_hook,
            "Organizations like yours are discovering new ways to modernize and scale."
        );
    }

    #[test]
    fn test_system_prompt_is_whole() {
        assert!(SYSTEM_PROMPT.contains(r##""guaranteed", "proven", "#1", etc."##));
        assert!(SYSTEM_PROMPT.ends_with("No other text before or after the JSON."));
    }

    #[test]
    fn test_mock_without_industry_is_generic() {
        let profile = NormalizedProfile {
            first_name: Some("Jane".to_string()),
            company_name: Some("Acme".to_string()),
            ..Default::default()
        };
        let result = mock_personalization(&profile, &UserContext::default());
        assert!(result.intro_hook.starts_with("Organizations like yours"));
        assert!(!result.intro_hook.contains("Tech companies"));
    }

    #[test]
    fn test_premium_model_rule() {
        let generator = PersonalizationGenerator::new(&Config::default(), None);
        let mut profile = NormalizedProfile {
            domain: "acme.com".to_string(),
            data_quality_score: 0.5,
            ..Default::default()
        };
        assert!(!generator.should_use_premium(&profile));
        profile.data_quality_score = 0.8;
        assert!(generator.should_use_premium(&profile));
        profile.data_quality_score = 0.1;
        profile.domain = "google.com".to_string();
        assert_eq!(generator.model_for(&profile), "claude-opus-4-5-20251101");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_thousands(15000), "15,000");
        assert_eq!(format_thousands(999), "999");
        assert_eq!(format_thousands(1_234_567), "1,234,567");
        assert_eq!(format_money(7_100_000_000.0), "$7.1B");
    }
}
