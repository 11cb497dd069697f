//! Validation, targeted retry and fallback for executive-review copy.
//!
//! The engine never fails a request. Content either passes every check or
//! the sections that still fail are replaced with a curated reference example
//! rewritten for the subject company.

use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::keywords::SearchText;
use crate::llm_client::ModelCallError;
use crate::models::{
    GeneratedContent, GuardrailOutcome, Stage, ValidationFailure, ValidationResult,
};
use crate::reference_content::{examples_for_stage, ReferenceExample};

/// Length contract for a single text field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub min_chars: usize,
    pub max_chars: usize,
    pub min_words: usize,
    pub max_words: usize,
    /// Headlines and titles also reject colons.
    pub headline: bool,
}

pub const HEADLINE_SPEC: FieldSpec = FieldSpec {
    min_chars: 20,
    max_chars: 65,
    min_words: 4,
    max_words: 10,
    headline: true,
};

pub const DESCRIPTION_SPEC: FieldSpec = FieldSpec {
    min_chars: 80,
    max_chars: 220,
    min_words: 13,
    max_words: 35,
    headline: false,
};

pub const RELEVANCE_SPEC: FieldSpec = FieldSpec {
    min_chars: 60,
    max_chars: 200,
    min_words: 15,
    max_words: 30,
    headline: false,
};

pub const EXPECTED_ADVANTAGES: usize = 2;
pub const EXPECTED_RISKS: usize = 2;
pub const EXPECTED_RECOMMENDATIONS: usize = 3;

pub const BANNED_PHRASES: &[&str] = &[
    // filler
    "in today's landscape",
    "in today's world",
    "in today's environment",
    "in the current landscape",
    "in an era of",
    "in this rapidly evolving",
    "rapidly evolving",
    "ever-changing",
    "ever-evolving",
    "fast-paced",
    "digital transformation journey",
    "unlock the power",
    "unlock the potential",
    "harness the power",
    "leverage the power",
    "paradigm shift",
    "synergy",
    "synergies",
    "cutting-edge",
    "cutting edge",
    "next-generation",
    "next generation",
    "state-of-the-art",
    "best-in-class",
    "world-class",
    // hype
    "revolutionary",
    "groundbreaking",
    "game-changing",
    "game changer",
    "unprecedented",
    "unparalleled",
    "unmatched",
    "transformative",
    // pressure
    "act now",
    "don't miss",
    "limited time",
    "hurry",
];

/// (character, name, headline only)
pub const BANNED_CHARACTERS: &[(char, &str, bool)] = &[
    ('\u{2014}', "em dash", false),
    ('\u{2013}', "en dash", false),
    ('!', "exclamation mark", false),
    (':', "colon", true),
];

const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "with", "of", "to", "in", "a", "an", "on", "at", "by", "from", "or",
    "into", "your", "our", "their", "its", "is", "are", "as",
];

/// Used in place of the company name when the swapped text would break its contract.
const GENERIC_SUBJECT: &str = "the organization";

const INDUSTRY_GROUPS: &[&[&str]] = &[
    &["healthcare", "life sciences", "pharma"],
    &["financial services", "banking", "insurance", "fintech"],
    &["retail", "ecommerce", "consumer goods"],
    &["manufacturing", "industrial", "automotive", "aec"],
    &["technology", "software", "telecommunications", "tech"],
    &["energy", "utilities", "oil and gas"],
];

/// Top-level section of generated content. Ordering drives prompt and log order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    Advantages,
    Risks,
    Recommendations,
    CaseStudyRelevance,
}

impl Section {
    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Advantages => "advantages",
            Section::Risks => "risks",
            Section::Recommendations => "recommendations",
            Section::CaseStudyRelevance => "case_study_relevance",
        }
    }

    /// Section owning a failure path such as `risks[1].headline`.
    pub fn from_field_path(path: &str) -> Option<Section> {
        let head = path.split('[').next().unwrap_or(path);
        match head {
            "advantages" => Some(Section::Advantages),
            "risks" => Some(Section::Risks),
            "recommendations" => Some(Section::Recommendations),
            "case_study_relevance" => Some(Section::CaseStudyRelevance),
            _ => None,
        }
    }
}

/// Who the content is written for, in display form (e.g. "Reducing cost").
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewTarget {
    pub company_name: String,
    pub industry: String,
    pub priority: String,
    pub challenge: String,
    pub stage: Stage,
}

fn failure(field: &str, reason: String, value: &str) -> ValidationFailure {
    ValidationFailure {
        field: field.to_string(),
        reason,
        value: value.to_string(),
    }
}

/// Checks one field against its length contract, banned phrases and banned characters.
pub fn validate_field(value: &str, field: &str, spec: &FieldSpec) -> Vec<ValidationFailure> {
    if value.trim().is_empty() {
        return vec![failure(field, "Empty value".to_string(), "")];
    }

    let mut failures = Vec::new();
    let chars = value.chars().count();
    let words = value.split_whitespace().count();

    if chars < spec.min_chars {
        failures.push(failure(
            field,
            format!("Below min chars ({}/{})", chars, spec.min_chars),
            value,
        ));
    }
    if chars > spec.max_chars {
        failures.push(failure(
            field,
            format!("Exceeds max chars ({}/{})", chars, spec.max_chars),
            value,
        ));
    }
    if words < spec.min_words {
        failures.push(failure(
            field,
            format!("Below min words ({}/{})", words, spec.min_words),
            value,
        ));
    }
    if words > spec.max_words {
        failures.push(failure(
            field,
            format!("Exceeds max words ({}/{})", words, spec.max_words),
            value,
        ));
    }

    let lowered = value.to_lowercase();
    for phrase in BANNED_PHRASES {
        if lowered.contains(phrase) {
            failures.push(failure(
                field,
                format!("Contains banned phrase: '{}'", phrase),
                value,
            ));
        }
    }

    for (ch, name, headline_only) in BANNED_CHARACTERS {
        if *headline_only && !spec.headline {
            continue;
        }
        if value.contains(*ch) {
            failures.push(failure(
                field,
                format!("Contains banned character: {}", name),
                value,
            ));
        }
    }

    failures
}

fn count_failure(section: Section, expected: usize, found: usize) -> Option<ValidationFailure> {
    (expected != found).then(|| {
        failure(
            section.as_str(),
            format!("Expected {} items, found {}", expected, found),
            &format!("{} items", found),
        )
    })
}

/// Field contracts and item counts. Content passing this is safe to render.
pub fn validate_structure(content: &GeneratedContent) -> ValidationResult {
    let mut failures = Vec::new();

    failures.extend(count_failure(
        Section::Advantages,
        EXPECTED_ADVANTAGES,
        content.advantages.len(),
    ));
    for (i, item) in content.advantages.iter().enumerate() {
        failures.extend(validate_field(
            &item.headline,
            &format!("advantages[{}].headline", i),
            &HEADLINE_SPEC,
        ));
        failures.extend(validate_field(
            &item.description,
            &format!("advantages[{}].description", i),
            &DESCRIPTION_SPEC,
        ));
    }

    failures.extend(count_failure(Section::Risks, EXPECTED_RISKS, content.risks.len()));
    for (i, item) in content.risks.iter().enumerate() {
        failures.extend(validate_field(
            &item.headline,
            &format!("risks[{}].headline", i),
            &HEADLINE_SPEC,
        ));
        failures.extend(validate_field(
            &item.description,
            &format!("risks[{}].description", i),
            &DESCRIPTION_SPEC,
        ));
    }

    failures.extend(count_failure(
        Section::Recommendations,
        EXPECTED_RECOMMENDATIONS,
        content.recommendations.len(),
    ));
    for (i, item) in content.recommendations.iter().enumerate() {
        failures.extend(validate_field(
            &item.title,
            &format!("recommendations[{}].title", i),
            &HEADLINE_SPEC,
        ));
        failures.extend(validate_field(
            &item.description,
            &format!("recommendations[{}].description", i),
            &DESCRIPTION_SPEC,
        ));
    }

    failures.extend(validate_field(
        &content.case_study_relevance,
        Section::CaseStudyRelevance.as_str(),
        &RELEVANCE_SPEC,
    ));

    ValidationResult {
        passed: failures.is_empty(),
        failures,
    }
}

fn section_items(content: &GeneratedContent) -> Vec<(Section, Vec<String>)> {
    vec![
        (
            Section::Advantages,
            content
                .advantages
                .iter()
                .map(|i| format!("{} {}", i.headline, i.description))
                .collect(),
        ),
        (
            Section::Risks,
            content
                .risks
                .iter()
                .map(|i| format!("{} {}", i.headline, i.description))
                .collect(),
        ),
        (
            Section::Recommendations,
            content
                .recommendations
                .iter()
                .map(|i| format!("{} {}", i.title, i.description))
                .collect(),
        ),
    ]
}

/// Only the first item of each repeated section may name the company.
///
/// Matching is case-insensitive on whole words, and names of two characters
/// or fewer are not checked.
pub fn validate_company_name(content: &GeneratedContent, company_name: &str) -> Vec<ValidationFailure> {
    let name = company_name.trim();
    if name.chars().count() <= 2 {
        return Vec::new();
    }

    let mut failures = Vec::new();
    for (section, items) in section_items(content) {
        for (i, text) in items.iter().enumerate().skip(1) {
            if SearchText::new(text).contains_phrase(name) {
                failures.push(failure(
                    &format!("{}[{}]", section.as_str(), i),
                    format!(
                        "Company name '{}' appears in {}[{}] (only the first item may name the company)",
                        name,
                        section.as_str(),
                        i
                    ),
                    text,
                ));
            }
        }
    }
    failures
}

/// Lowercased content words of a priority, challenge or industry phrase.
pub fn derive_keywords(phrase: &str) -> Vec<String> {
    phrase
        .replace('_', " ")
        .to_lowercase()
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
        .filter(|w| w.chars().count() > 2 && !STOP_WORDS.contains(&w.as_str()))
        .collect()
}

fn mentions_any(text: &str, keywords: &[String]) -> bool {
    let lowered = text.to_lowercase();
    keywords.iter().any(|k| lowered.contains(k.as_str()))
}

/// Blocking personalization checks on the first advantage, first risk and relevance line.
pub fn validate_personalization(
    content: &GeneratedContent,
    target: &ReviewTarget,
) -> Vec<ValidationFailure> {
    let priority_keywords = derive_keywords(&target.priority);
    let challenge_keywords = derive_keywords(&target.challenge);
    let mut relevance_keywords = derive_keywords(&target.industry);
    relevance_keywords.extend(challenge_keywords.iter().cloned());

    let mut failures = Vec::new();

    if let Some(first) = content.advantages.first() {
        let text = format!("{} {}", first.headline, first.description);
        if !priority_keywords.is_empty() && !mentions_any(&text, &priority_keywords) {
            failures.push(failure(
                "advantages[0]",
                "First advantage does not reference the business priority".to_string(),
                &text,
            ));
        }
    }

    if let Some(first) = content.risks.first() {
        let text = format!("{} {}", first.headline, first.description);
        if !challenge_keywords.is_empty() && !mentions_any(&text, &challenge_keywords) {
            failures.push(failure(
                "risks[0]",
                "First risk does not reference the challenge".to_string(),
                &text,
            ));
        }
    }

    let relevance = content.case_study_relevance.trim();
    if !relevance.is_empty()
        && !relevance_keywords.is_empty()
        && !mentions_any(relevance, &relevance_keywords)
    {
        failures.push(failure(
            Section::CaseStudyRelevance.as_str(),
            "Case study relevance does not reference the industry or challenge".to_string(),
            relevance,
        ));
    }

    failures
}

/// Every check: structure, company-name rule and personalization.
pub fn validate_content(content: &GeneratedContent, target: &ReviewTarget) -> ValidationResult {
    let mut failures = validate_structure(content).failures;
    failures.extend(validate_company_name(content, &target.company_name));
    failures.extend(validate_personalization(content, target));
    ValidationResult {
        passed: failures.is_empty(),
        failures,
    }
}

/// Sections referenced by a failure list, in section order.
pub fn failing_sections(failures: &[ValidationFailure]) -> BTreeSet<Section> {
    failures
        .iter()
        .filter_map(|f| Section::from_field_path(&f.field))
        .collect()
}

fn in_same_group(a: &str, b: &str) -> bool {
    INDUSTRY_GROUPS.iter().any(|group| {
        group.iter().any(|t| a.contains(t)) && group.iter().any(|t| b.contains(t))
    })
}

/// Similarity of a reference example to the target profile.
pub fn score_example(example: &ReferenceExample, target: &ReviewTarget) -> i32 {
    let example_industry = example.industry.to_lowercase();
    let industry = target.industry.to_lowercase();

    let mut score = 0;
    if example_industry == industry {
        score += 3;
    } else if in_same_group(&example_industry, &industry) {
        score += 1;
    }
    if example.priority.to_lowercase() == target.priority.to_lowercase() {
        score += 2;
    }
    if example.challenge.to_lowercase() == target.challenge.to_lowercase() {
        score += 2;
    }
    score
}

/// Highest-scoring example for the target's stage; ties go to pool order.
pub fn select_fallback_example(target: &ReviewTarget) -> &'static ReferenceExample {
    let examples = examples_for_stage(target.stage);
    let mut best = examples[0];
    let mut best_score = -1;
    for example in examples {
        let score = score_example(example, target);
        if score > best_score {
            best_score = score;
            best = example;
        }
    }
    best
}

/// Replaces the example's company name, keeping the field inside its contract.
fn swap_name(text: &str, original: &str, replacement: &str, field: &str, spec: &FieldSpec) -> String {
    if !text.contains(original) {
        return text.to_string();
    }
    let swapped = text.replace(original, replacement);
    if validate_field(&swapped, field, spec).is_empty() {
        return swapped;
    }
    text.replace(original, GENERIC_SUBJECT)
}

/// Relevance line for fallback content; the first candidate inside the contract wins.
pub fn fallback_relevance(industry: &str, challenge: &str) -> String {
    let challenge = challenge.to_lowercase();
    let candidates = [
        format!(
            "This case study demonstrates how organizations in {} can address {} through data center modernization.",
            industry, challenge
        ),
        format!(
            "This case study shows how {} organizations can address {} through data center modernization.",
            industry, challenge
        ),
    ];
    candidates
        .into_iter()
        .find(|c| validate_field(c, Section::CaseStudyRelevance.as_str(), &RELEVANCE_SPEC).is_empty())
        .unwrap_or_else(|| {
            "This case study shows how organizations with similar goals and constraints modernized their data center infrastructure to improve outcomes."
                .to_string()
        })
}

/// Curated content for the target, with the example's company swapped for the real one.
pub fn fallback_content(target: &ReviewTarget) -> GeneratedContent {
    let example = select_fallback_example(target);
    let mut content = example.to_content();
    let original = example.company;
    let company = target.company_name.trim();
    let company = if company.is_empty() { GENERIC_SUBJECT } else { company };

    if let Some(first) = content.advantages.first_mut() {
        first.headline = swap_name(&first.headline, original, company, "advantages[0].headline", &HEADLINE_SPEC);
        first.description = swap_name(
            &first.description,
            original,
            company,
            "advantages[0].description",
            &DESCRIPTION_SPEC,
        );
    }
    if let Some(first) = content.risks.first_mut() {
        first.headline = swap_name(&first.headline, original, company, "risks[0].headline", &HEADLINE_SPEC);
        first.description = swap_name(
            &first.description,
            original,
            company,
            "risks[0].description",
            &DESCRIPTION_SPEC,
        );
    }
    if let Some(first) = content.recommendations.first_mut() {
        first.description = swap_name(
            &first.description,
            original,
            company,
            "recommendations[0].description",
            &DESCRIPTION_SPEC,
        );
    }

    content.case_study_relevance = fallback_relevance(&target.industry, &target.challenge);
    content
}

/// New content with `sections` taken from `update` where it has a non-empty value.
pub fn merge_sections(
    base: &GeneratedContent,
    update: &GeneratedContent,
    sections: &BTreeSet<Section>,
) -> GeneratedContent {
    let mut merged = base.clone();
    for section in sections {
        match section {
            Section::Advantages if !update.advantages.is_empty() => {
                merged.advantages = update.advantages.clone();
            }
            Section::Risks if !update.risks.is_empty() => {
                merged.risks = update.risks.clone();
            }
            Section::Recommendations if !update.recommendations.is_empty() => {
                merged.recommendations = update.recommendations.clone();
            }
            Section::CaseStudyRelevance if !update.case_study_relevance.trim().is_empty() => {
                merged.case_study_relevance = update.case_study_relevance.clone();
            }
            _ => {}
        }
    }
    merged
}

/// Prompt asking the model to regenerate only the failing sections.
pub fn build_retry_prompt(target: &ReviewTarget, failures: &[ValidationFailure]) -> String {
    let details = failures
        .iter()
        .map(|f| format!("- {}: {} (current value: \"{}\")", f.field, f.reason, f.value))
        .collect::<Vec<_>>()
        .join("\n");
    let sections = failing_sections(failures)
        .iter()
        .map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "The following fields in the executive review for {company} ({industry}) failed validation:\n\n\
{details}\n\n\
Please regenerate ONLY the sections that contain failures: {sections}.\n\
Keep the same personalization (industry={industry}, priority={priority}, challenge={challenge}, stage={stage}).\n\
Headlines must be 4-10 words (20-65 characters). Descriptions must be 13-35 words (80-220 characters).\n\
Case study relevance must be 15-30 words (60-200 characters).\n\
Only the first item of each section may mention {company} by name.\n\
No colons in headlines, no em dashes, no exclamation marks, no banned filler phrases.",
        company = target.company_name,
        industry = target.industry,
        details = details,
        sections = sections,
        priority = target.priority,
        challenge = target.challenge,
        stage = target.stage,
    )
}

/// Produces replacement content for a retry prompt.
#[async_trait]
pub trait SectionRegenerator: Send + Sync {
    /// `Ok(None)` means the model answered without usable structured output.
    async fn regenerate(&self, prompt: &str) -> Result<Option<GeneratedContent>, ModelCallError>;
}

/// Final state of one guardrail run.
#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailRun {
    pub content: GeneratedContent,
    pub outcome: GuardrailOutcome,
    /// Regeneration calls made.
    pub attempts: u32,
    /// Failures that sent sections to the fallback example.
    pub replaced: Vec<ValidationFailure>,
}

#[derive(Debug, Clone, Copy)]
pub struct GuardrailEngine {
    max_retries: u32,
}

impl Default for GuardrailEngine {
    fn default() -> Self {
        Self { max_retries: 2 }
    }
}

impl GuardrailEngine {
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Validate, retry the failing sections, then fall back. Always returns content.
    pub async fn run(
        &self,
        initial: GeneratedContent,
        target: &ReviewTarget,
        regenerator: Option<&dyn SectionRegenerator>,
    ) -> GuardrailRun {
        let mut content = initial;
        let mut validation = validate_content(&content, target);
        let mut attempts = 0;

        if validation.passed {
            return GuardrailRun {
                content,
                outcome: GuardrailOutcome::Passed,
                attempts,
                replaced: Vec::new(),
            };
        }

        tracing::warn!(
            "⚠ Executive review for {} failed validation with {} issues",
            target.company_name,
            validation.failures.len()
        );

        if let Some(regenerator) = regenerator {
            while attempts < self.max_retries {
                attempts += 1;
                let prompt = build_retry_prompt(target, &validation.failures);
                let sections = failing_sections(&validation.failures);

                let update = match regenerator.regenerate(&prompt).await {
                    Ok(Some(update)) => update,
                    Ok(None) => {
                        tracing::warn!("Retry {} returned no structured output", attempts);
                        continue;
                    }
                    Err(e) => {
                        tracing::error!("❌ Retry {} failed: {}", attempts, e);
                        break;
                    }
                };

                content = merge_sections(&content, &update, &sections);
                validation = validate_content(&content, target);
                if validation.passed {
                    tracing::info!("✓ Retry {} fixed all validation failures", attempts);
                    return GuardrailRun {
                        content,
                        outcome: GuardrailOutcome::Passed,
                        attempts,
                        replaced: Vec::new(),
                    };
                }
                tracing::warn!(
                    "Retry {} still has {} failures",
                    attempts,
                    validation.failures.len()
                );
            }
        }

        let sections = failing_sections(&validation.failures);
        let fallback = fallback_content(target);
        for section in &sections {
            tracing::info!(
                "Replaced failing section '{}' with fallback example content",
                section.as_str()
            );
        }
        content = merge_sections(&content, &fallback, &sections);

        GuardrailRun {
            content,
            outcome: GuardrailOutcome::FellBack,
            attempts,
            replaced: validation.failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Insight, Recommendation};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    fn insight(headline: &str, description: &str) -> Insight {
        Insight {
            headline: headline.to_string(),
            description: description.to_string(),
        }
    }

    fn target() -> ReviewTarget {
        ReviewTarget {
            company_name: "Northwind".to_string(),
            industry: "Healthcare".to_string(),
            priority: "Reducing cost".to_string(),
            challenge: "Legacy systems".to_string(),
            stage: Stage::Challenger,
        }
    }

    fn good_content() -> GeneratedContent {
        GeneratedContent {
            advantages: vec![
                insight(
                    "Lower cost of running patient systems",
                    "Consolidating aging infrastructure lets Northwind cut maintenance spend and redirect budget toward clinical programs that improve patient outcomes.",
                ),
                insight(
                    "Faster access to clinical data for teams",
                    "Modern compute and storage shorten the time clinicians wait for records, which supports quicker decisions across hospitals and outpatient sites.",
                ),
            ],
            risks: vec![
                insight(
                    "Legacy systems that slow every upgrade",
                    "Keeping legacy systems in place raises support costs at Northwind and makes each compliance update slower and more expensive to deliver.",
                ),
                insight(
                    "Security gaps across connected devices",
                    "Unpatched endpoints and inconsistent controls increase exposure to breaches that can interrupt care delivery and trigger costly regulatory reviews.",
                ),
            ],
            recommendations: vec![
                Recommendation {
                    title: "Retire the most expensive legacy workloads".to_string(),
                    description: "Start with the systems that carry the highest maintenance spend so Northwind sees savings early and can fund later phases of the program.".to_string(),
                },
                Recommendation {
                    title: "Standardize infrastructure across facilities".to_string(),
                    description: "Use a common platform for compute and storage in every facility to reduce integration effort and simplify compliance reporting for IT teams.".to_string(),
                },
                Recommendation {
                    title: "Prepare data platforms for clinical AI".to_string(),
                    description: "Organize and secure clinical data now so future analytics and AI workloads can be adopted without rebuilding the underlying infrastructure.".to_string(),
                },
            ],
            case_study_relevance: "This case study shows how healthcare organizations replaced legacy systems with modern infrastructure while keeping costs under control.".to_string(),
        }
    }

    struct ScriptedRegenerator {
        replies: Mutex<Vec<Result<Option<GeneratedContent>, ModelCallError>>>,
        calls: AtomicU32,
    }

    impl ScriptedRegenerator {
        fn new(replies: Vec<Result<Option<GeneratedContent>, ModelCallError>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl SectionRegenerator for ScriptedRegenerator {
        async fn regenerate(&self, _prompt: &str) -> Result<Option<GeneratedContent>, ModelCallError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                Ok(None)
            } else {
                replies.remove(0)
            }
        }
    }

    #[test]
    fn test_good_content_passes() {
        let result = validate_content(&good_content(), &target());
        assert!(result.passed, "{:?}", result.failures);
    }

    #[test]
    fn test_banned_phrase_in_headline() {
        let failures = validate_field(
            "Revolutionary gains in today's landscape",
            "advantages[0].headline",
            &HEADLINE_SPEC,
        );
        assert!(failures
            .iter()
            .any(|f| f.reason == "Contains banned phrase: 'revolutionary'"));
        assert!(failures
            .iter()
            .any(|f| f.reason == "Contains banned phrase: 'in today's landscape'"));
    }

    #[test]
    fn test_length_and_character_reasons() {
        let failures = validate_field("Too short: wow!", "risks[0].headline", &HEADLINE_SPEC);
        let reasons: Vec<&str> = failures.iter().map(|f| f.reason.as_str()).collect();
        assert!(reasons.contains(&"Below min chars (15/20)"));
        assert!(reasons.contains(&"Below min words (3/4)"));
        assert!(reasons.contains(&"Contains banned character: exclamation mark"));
        assert!(reasons.contains(&"Contains banned character: colon"));

        let empty = validate_field("", "risks[0].description", &DESCRIPTION_SPEC);
        assert_eq!(empty.len(), 1);
        assert_eq!(empty[0].reason, "Empty value");
    }

    #[test]
    fn test_colon_allowed_in_descriptions() {
        let text = "Two goals matter here: lower operating costs and faster delivery of new services for teams across every region.";
        let failures = validate_field(text, "advantages[0].description", &DESCRIPTION_SPEC);
        assert!(failures.is_empty(), "{:?}", failures);
    }

    #[test]
    fn test_company_name_only_in_first_item() {
        let mut content = good_content();
        content.risks[1].description = "Unpatched endpoints at northwind increase exposure to breaches that can interrupt care delivery and trigger costly reviews.".to_string();
        let failures = validate_company_name(&content, "Northwind");
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].field, "risks[1]");

        assert!(validate_company_name(&content, "NW").is_empty());
    }

    #[test]
    fn test_derive_keywords() {
        assert_eq!(derive_keywords("Preparing for AI adoption"), vec!["preparing", "adoption"]);
        assert_eq!(
            derive_keywords("data_governance"),
            vec!["data".to_string(), "governance".to_string()]
        );
        assert!(derive_keywords("AI").is_empty());
    }

    #[test]
    fn test_personalization_failures() {
        let mut content = good_content();
        content.advantages[0] = insight(
            "Faster access to clinical data for teams",
            "Modern compute and storage shorten the time clinicians wait for records, which supports quicker decisions across hospitals.",
        );
        let failures = validate_personalization(&content, &target());
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].field, "advantages[0]");
    }

    #[test]
    fn test_item_counts() {
        let mut content = good_content();
        content.recommendations.pop();
        let result = validate_structure(&content);
        assert!(!result.passed);
        assert_eq!(result.failures[0].field, "recommendations");
        assert_eq!(result.failures[0].reason, "Expected 3 items, found 2");
    }

    #[test]
    fn test_failing_sections_grouping() {
        let failures = vec![
            failure("risks[1].headline", "x".into(), ""),
            failure("advantages[0].description", "x".into(), ""),
            failure("risks[0]", "x".into(), ""),
        ];
        let sections: Vec<Section> = failing_sections(&failures).into_iter().collect();
        assert_eq!(sections, vec![Section::Advantages, Section::Risks]);
    }

    #[test]
    fn test_fallback_scoring_prefers_industry() {
        let t = ReviewTarget {
            company_name: "Mercy Health".to_string(),
            industry: "Healthcare".to_string(),
            priority: "Preparing for AI adoption".to_string(),
            challenge: "Data governance and compliance".to_string(),
            stage: Stage::Leader,
        };
        let example = select_fallback_example(&t);
        assert_eq!(example.company, "HCA Healthcare");

        let content = fallback_content(&t);
        assert!(content.advantages[0].description.contains("Mercy Health"));
        assert!(!content.advantages[0].description.contains("HCA"));
    }

    #[test]
    fn test_fallback_content_passes_structure_for_every_stage() {
        for stage in Stage::ALL {
            let t = ReviewTarget {
                company_name: "A Company With An Unusually Long Registered Legal Name Holdings".to_string(),
                stage: *stage,
                ..target()
            };
            let content = fallback_content(&t);
            let result = validate_structure(&content);
            assert!(result.passed, "{:?}: {:?}", stage, result.failures);
            assert!(validate_company_name(&content, &t.company_name).is_empty());
        }
    }

    #[test]
    fn test_fallback_relevance_chain() {
        let line = fallback_relevance("Healthcare", "Legacy systems");
        assert!(line.starts_with("This case study demonstrates how organizations in Healthcare"));
        assert!(line.contains("legacy systems"));

        let long = "x".repeat(150);
        let line = fallback_relevance(&long, "Legacy systems");
        assert!(validate_field(&line, "case_study_relevance", &RELEVANCE_SPEC).is_empty());
    }

    #[test]
    fn test_merge_ignores_empty_sections() {
        let base = good_content();
        let update = GeneratedContent {
            advantages: vec![],
            risks: vec![insight("a", "b")],
            ..Default::default()
        };
        let sections: BTreeSet<Section> = [Section::Advantages, Section::Risks].into_iter().collect();
        let merged = merge_sections(&base, &update, &sections);
        assert_eq!(merged.advantages, base.advantages);
        assert_eq!(merged.risks, update.risks);
        assert_eq!(merged.recommendations, base.recommendations);
    }

    #[test]
    fn test_retry_prompt_lists_failures() {
        let failures = vec![failure(
            "advantages[0].headline",
            "Contains banned phrase: 'synergy'".into(),
            "Synergy across every team",
        )];
        let prompt = build_retry_prompt(&target(), &failures);
        assert!(prompt.contains("executive review for Northwind (Healthcare)"));
        assert!(prompt.contains("- advantages[0].headline: Contains banned phrase: 'synergy'"));
        assert!(prompt.contains("regenerate ONLY the sections that contain failures: advantages."));
    }

    #[tokio::test]
    async fn test_run_passes_without_retry() {
        let regen = ScriptedRegenerator::new(vec![]);
        let run = GuardrailEngine::default()
            .run(good_content(), &target(), Some(&regen))
            .await;
        assert_eq!(run.outcome, GuardrailOutcome::Passed);
        assert_eq!(run.attempts, 0);
        assert_eq!(regen.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retry_fixes_only_failing_section() {
        let mut broken = good_content();
        broken.risks[1].headline = "Risk!".to_string();
        let regen = ScriptedRegenerator::new(vec![Ok(Some(good_content()))]);

        let run = GuardrailEngine::default()
            .run(broken, &target(), Some(&regen))
            .await;
        assert_eq!(run.outcome, GuardrailOutcome::Passed);
        assert_eq!(run.attempts, 1);
        assert_eq!(run.content.risks, good_content().risks);
    }

    #[tokio::test]
    async fn test_exhausted_retries_fall_back() {
        let mut broken = good_content();
        broken.advantages[0].headline = "Game-changing synergy!".to_string();
        let regen = ScriptedRegenerator::new(vec![Ok(None), Ok(Some(broken.clone()))]);

        let run = GuardrailEngine::new(2)
            .run(broken.clone(), &target(), Some(&regen))
            .await;
        assert_eq!(run.outcome, GuardrailOutcome::FellBack);
        assert_eq!(run.attempts, 2);
        assert!(validate_structure(&run.content).passed);
        // untouched sections survive
        assert_eq!(run.content.risks, broken.risks);
    }

    #[tokio::test]
    async fn test_model_error_stops_retrying() {
        let mut broken = good_content();
        broken.case_study_relevance = String::new();
        let regen = ScriptedRegenerator::new(vec![Err(ModelCallError::RateLimited(
            "429".to_string(),
        ))]);

        let run = GuardrailEngine::new(3).run(broken, &target(), Some(&regen)).await;
        assert_eq!(run.outcome, GuardrailOutcome::FellBack);
        assert_eq!(run.attempts, 1);
        assert!(!run.content.case_study_relevance.is_empty());
    }

    #[tokio::test]
    async fn test_no_regenerator_falls_back_immediately() {
        let run = GuardrailEngine::default()
            .run(GeneratedContent::default(), &target(), None)
            .await;
        assert_eq!(run.outcome, GuardrailOutcome::FellBack);
        assert_eq!(run.attempts, 0);
        assert!(validate_structure(&run.content).passed);
    }
}
