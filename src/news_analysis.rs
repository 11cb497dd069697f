//! Keyword-driven signals from company news.
//!
//! Every function here is pure: the same articles always produce the same
//! analysis.

use crate::keywords::SearchText;
use crate::models::{
    AiReadiness, AiStage, CrisisCategory, CrisisSignal, EntityMentions, NewsAnalysis,
    NewsArticle, Sentiment, SentimentReport,
};

pub const POSITIVE_KEYWORDS: &[&str] = &[
    "growth", "revenue", "profit", "award", "innovation", "partnership", "expansion", "launch",
    "record", "success", "breakthrough", "milestone", "wins", "achievement", "leading", "strong",
    "surpass", "exceed", "improve", "gain", "positive", "accelerate", "momentum",
];

pub const NEGATIVE_KEYWORDS: &[&str] = &[
    "layoff", "layoffs", "restructuring", "decline", "loss", "investigation", "lawsuit",
    "breach", "hack", "fine", "penalty", "downturn", "cuts", "closure", "bankruptcy", "default",
    "scandal", "fraud", "probe", "setback", "downsizing", "struggling", "crisis", "failing",
];

pub const TECH_KEYWORDS: &[&str] = &[
    "aws", "azure", "gcp", "google cloud", "kubernetes", "docker", "ai", "machine learning",
    "deep learning", "generative ai", "cloud", "saas", "gpu", "cpu", "data center", "pytorch",
    "tensorflow", "llm", "nvidia", "amd", "intel", "oracle", "salesforce", "snowflake",
    "databricks",
];

pub const COMPETITOR_KEYWORDS: &[&str] = &["intel", "nvidia", "arm", "qualcomm", "broadcom"];

pub const PARTNER_KEYWORDS: &[&str] = &[
    "partnership", "partner", "collaborate", "collaboration", "alliance", "joint venture",
    "agreement", "deal", "contract",
];

pub const AI_EXPLORING_KEYWORDS: &[&str] = &[
    "exploring ai", "exploring artificial intelligence", "ai strategy", "ai roadmap",
    "evaluating ai", "considering ai", "ai opportunity", "ai opportunities",
];

pub const AI_PILOTING_KEYWORDS: &[&str] = &[
    "pilot", "proof of concept", "poc", "testing ai", "ai trial", "ai experiment", "piloting",
];

pub const AI_DEPLOYED_KEYWORDS: &[&str] = &[
    "deployed", "in production", "ai-powered", "machine learning platform", "ai infrastructure",
    "ml pipeline", "ai at scale", "production ai", "production ml",
];

/// Crisis categories in detection order; the first hit wins.
const CRISIS_RULES: &[(CrisisCategory, &[&str], &str)] = &[
    (
        CrisisCategory::Workforce,
        &["layoff", "layoffs", "downsizing", "job cuts", "workforce reduction", "restructuring"],
        "Workforce restructuring detected",
    ),
    (
        CrisisCategory::Regulatory,
        &["investigation", "sec", "regulatory", "probe", "lawsuit", "compliance violation", "fine", "penalty"],
        "Regulatory issue detected",
    ),
    (
        CrisisCategory::Financial,
        &["bankruptcy", "default", "debt", "insolvency", "financial distress", "revenue decline"],
        "Financial distress detected",
    ),
    (
        CrisisCategory::Security,
        &["breach", "hack", "data leak", "cybersecurity incident", "ransomware", "vulnerability"],
        "Security incident detected",
    ),
];

fn article_text(articles: &[NewsArticle]) -> SearchText {
    SearchText::from_parts(
        articles
            .iter()
            .flat_map(|a| [a.title.as_str(), a.content.as_str()]),
    )
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

pub fn detect_sentiment(articles: &[NewsArticle]) -> SentimentReport {
    if articles.is_empty() {
        return SentimentReport::default();
    }
    let text = article_text(articles);
    let positive_hits = text.count(POSITIVE_KEYWORDS);
    let negative_hits = text.count(NEGATIVE_KEYWORDS);

    let mut signals = Vec::new();
    if positive_hits > 0 {
        signals.push(format!("{} positive indicators", positive_hits));
    }
    if negative_hits > 0 {
        signals.push(format!("{} negative indicators", negative_hits));
    }

    let sentiment = if negative_hits > positive_hits && negative_hits >= 2 {
        Sentiment::Negative
    } else if positive_hits > negative_hits && positive_hits >= 2 {
        Sentiment::Positive
    } else {
        Sentiment::Neutral
    };

    SentimentReport {
        sentiment,
        positive_hits,
        negative_hits,
        signals,
    }
}

pub fn extract_entities(articles: &[NewsArticle]) -> EntityMentions {
    if articles.is_empty() {
        return EntityMentions::default();
    }
    let text = article_text(articles);
    let mut technologies: Vec<String> = text
        .entities(TECH_KEYWORDS)
        .into_iter()
        .map(String::from)
        .collect();
    let mut competitors: Vec<String> = text
        .entities(COMPETITOR_KEYWORDS)
        .into_iter()
        .map(String::from)
        .collect();
    technologies.sort();
    competitors.sort();

    EntityMentions {
        technologies,
        competitors,
        has_partnership: text.any(PARTNER_KEYWORDS),
    }
}

pub fn detect_ai_readiness(articles: &[NewsArticle]) -> AiReadiness {
    if articles.is_empty() {
        return AiReadiness::default();
    }
    let text = article_text(articles);
    let deployed = text.count(AI_DEPLOYED_KEYWORDS);
    let piloting = text.count(AI_PILOTING_KEYWORDS);
    let exploring = text.count(AI_EXPLORING_KEYWORDS);

    let (stage, confidence, signal) = if deployed >= 2 {
        (
            AiStage::Deployed,
            0.5 + deployed as f64 * 0.15,
            format!("AI deployment signals: {}", deployed),
        )
    } else if deployed == 1 {
        (
            AiStage::Deployed,
            0.5 + deployed as f64 * 0.1,
            format!("AI deployment mention: {}", deployed),
        )
    } else if piloting >= 1 {
        (
            AiStage::Piloting,
            0.3 + piloting as f64 * 0.15,
            format!("AI piloting signals: {}", piloting),
        )
    } else if exploring >= 1 {
        (
            AiStage::Exploring,
            0.2 + exploring as f64 * 0.1,
            format!("AI exploration signals: {}", exploring),
        )
    } else {
        return AiReadiness::default();
    };

    AiReadiness {
        stage,
        confidence: round2(confidence.min(1.0)),
        signals: vec![signal],
    }
}

pub fn detect_crisis(articles: &[NewsArticle]) -> Option<CrisisSignal> {
    if articles.is_empty() {
        return None;
    }
    let text = article_text(articles);
    CRISIS_RULES
        .iter()
        .find(|(_, keywords, _)| text.any(keywords))
        .map(|(category, _, description)| CrisisSignal {
            category: *category,
            description: description.to_string(),
        })
}

/// Runs all four analyzers over the articles.
pub fn analyze_news(articles: &[NewsArticle]) -> NewsAnalysis {
    let analysis = NewsAnalysis {
        sentiment: detect_sentiment(articles),
        entities: extract_entities(articles),
        ai_readiness: detect_ai_readiness(articles),
        crisis: detect_crisis(articles),
        article_count: articles.len(),
    };

    tracing::info!(
        "News analysis: sentiment={}, ai_stage={}, crisis={}",
        analysis.sentiment.sentiment,
        analysis.ai_readiness.stage,
        analysis
            .crisis
            .as_ref()
            .map(|c| c.category.as_str())
            .unwrap_or("none")
    );

    analysis
}
