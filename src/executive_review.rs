//! Two-page executive review: prompt assembly, tool-forced generation,
//! the guardrail loop and an advisory specificity judge.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use crate::config::Config;
use crate::guardrails::{
    fallback_content, select_fallback_example, GuardrailEngine, ReviewTarget, SectionRegenerator,
};
use crate::keywords::SearchText;
use crate::llm_client::{
    complete_with_retry, strip_code_fence, LanguageModel, ModelCallError, ModelRequest,
    ModelResponse, RetryPolicy, ToolSpec,
};
use crate::models::{
    BusinessPriority, ExecutiveReview, GeneratedContent, GuardrailOutcome, InferredContext,
    NormalizedProfile, Persona, PrimaryChallenge, Segment, SpecificityVerdict, Stage,
};
use crate::personalization::derived_intelligence;
use crate::reference_content::{
    challenge_display, industry_display, priority_display, select_case_study, stage_for_environment,
    stage_identification_text, stage_sidebar, ReferenceLibrary,
};

pub const TOOL_NAME: &str = "generate_executive_review";
const MAX_TOKENS: u32 = 2000;
const RETRY_MAX_TOKENS: u32 = 1500;
const JUDGE_MAX_TOKENS: u32 = 200;
const SPECIFIC_SCORE: u8 = 3;

const SYSTEM_PROMPT: &str = r#"You are an expert business strategist creating personalized executive reviews for AMD's Data Center Modernization program.

Your output must follow these strict rules:

CONTENT STRUCTURE:
- Headlines: 4-10 words, imperative or benefit-driven, no colons
- Descriptions: One single sentence, 13-35 words, human and professional tone
- No jargon, buzzwords, hype, or filler phrases like "in today's landscape"
- No em dashes, no exclamation marks, no emojis

COMPANY NAME RULES:
- Use the company name only in the FIRST item of each section (advantages, risks, recommendations)
- After first mention, use pronouns: "their environment", "the company", "the organization", "their teams"
- Never repeat the company name across every line (this is an AI tell)

PERSONALIZATION REQUIREMENTS (CRITICAL):
You MUST incorporate ALL of these inputs into the content:
- INDUSTRY: Reference industry-specific workloads, systems, and use cases using the terminology table below
- PERSONA: Tailor language for the reader (ITDM = technical infrastructure focus, BDM = business outcomes focus)
- PRIORITY: The first advantage and first recommendation MUST directly address the stated priority
- CHALLENGE: The first risk MUST directly reference the stated challenge and its consequences

INDUSTRY TERMINOLOGY (use these terms in your output):
- Healthcare: EHR systems, clinical AI, imaging systems, HIPAA compliance, patient data
- Financial Services: trading systems, fraud detection, regulatory compliance, transaction processing
- Retail: POS systems, ecommerce platforms, inventory management, supply chain, omnichannel
- Manufacturing: OT systems, equipment monitoring, plant-floor workloads, ERP, production systems
- Technology: cloud infrastructure, developer platforms, CI/CD pipelines, microservices
- Telecommunications: network infrastructure, 5G, service delivery platforms, subscriber management
- Energy: SCADA systems, grid management, operational technology, asset monitoring
- Government: citizen services, secure infrastructure, compliance frameworks, data sovereignty
- Education: learning platforms, research computing, student information systems
- AEC: BIM, CAD, project data, distributed project teams, field systems

STAGE-SPECIFIC FOCUS:
- Observer: low-lift, cost-saving steps, foundational efficiency, reducing technical debt
- Challenger: performance optimization, integration improvements, scalability, competitive positioning
- Leader: governance, AI readiness, optimization at scale, maintaining competitive advantage

OUTPUT FORMAT:
Return valid JSON only, no markdown, no explanation. Match the exact structure shown in the example."#;

fn item_schema(title_key: &str, title_hint: &str) -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            title_key: {
                "type": "string",
                "description": title_hint,
                "minLength": 20,
                "maxLength": 65,
            },
            "description": {
                "type": "string",
                "description": "Single sentence, 13-35 words, professional tone. 80-220 characters.",
                "minLength": 80,
                "maxLength": 220,
            },
        },
        "required": [title_key, "description"],
    })
}

/// Tool definition that forces structured output with per-field length hints.
pub fn review_tool() -> ToolSpec {
    ToolSpec {
        name: TOOL_NAME.to_string(),
        description: "Generate a personalized executive review with advantages, risks, and recommendations. Each field has strict character limits.".to_string(),
        input_schema: json!({
            "type": "object",
            "properties": {
                "advantages": {
                    "type": "array",
                    "description": "Exactly 2 advantages. First must relate to stated business priority.",
                    "items": item_schema("headline", "4-10 words, benefit-driven, no colons. 20-65 characters."),
                    "minItems": 2,
                    "maxItems": 2,
                },
                "risks": {
                    "type": "array",
                    "description": "Exactly 2 risks. First must reference consequences of stated challenge.",
                    "items": item_schema("headline", "4-10 words, consequence-focused, no colons. 20-65 characters."),
                    "minItems": 2,
                    "maxItems": 2,
                },
                "recommendations": {
                    "type": "array",
                    "description": "Exactly 3 recommendations. Stage-appropriate actions.",
                    "items": item_schema("title", "4-10 words, imperative form, no colons. 20-65 characters."),
                    "minItems": 3,
                    "maxItems": 3,
                },
                "case_study_relevance": {
                    "type": "string",
                    "description": "One sentence (15-30 words) explaining why the selected case study is relevant to this company's specific situation, industry, and challenge.",
                    "minLength": 60,
                    "maxLength": 200,
                },
            },
            "required": ["advantages", "risks", "recommendations", "case_study_relevance"],
        }),
    }
}

fn persona_guidance(persona: Persona) -> &'static str {
    match persona {
        Persona::Itdm => "Focus on infrastructure, systems, technical architecture, and IT operational efficiency.",
        Persona::Bdm => "Focus on business outcomes, revenue impact, competitive positioning, and operational results.",
    }
}

fn stage_focus(stage: Stage) -> &'static str {
    match stage {
        Stage::Observer => "foundational, cost-focused",
        Stage::Challenger => "performance, integration-focused",
        Stage::Leader => "optimization, AI-readiness focused",
    }
}

const ITDM_ROLES: &[&str] = &[
    "cto", "cio", "ciso", "cdo", "vp_engineering", "vp_it", "vp_data", "vp_security",
    "eng_manager", "it_manager", "data_manager", "security_manager", "senior_engineer",
    "engineer", "sysadmin", "it_infrastructure", "security", "data_ai",
];

const BDM_ROLES: &[&str] = &[
    "ceo", "coo", "cfo", "c_suite_other", "vp_ops", "vp_finance", "ops_manager",
    "finance_manager", "procurement", "executive", "sales_gtm", "hr_people",
];

const TECHNICAL_TITLE_TERMS: &[&str] = &[
    "cto", "cio", "ciso", "it", "chief technology", "chief information", "engineer",
    "engineering", "infrastructure", "architect", "devops", "security", "developer",
    "sysadmin", "data", "platform", "technical",
];

const TECHNICAL_DEPARTMENTS: &[&str] = &[
    "engineering", "information technology", "information_technology", "it", "data", "security",
];

/// ITDM or BDM. An explicit role code wins, then title and departments. Defaults to BDM.
pub fn persona_for(role: Option<&str>, title: Option<&str>, departments: &[String]) -> Persona {
    if let Some(role) = role.map(|r| r.trim().to_lowercase()) {
        if ITDM_ROLES.contains(&role.as_str()) {
            return Persona::Itdm;
        }
        if BDM_ROLES.contains(&role.as_str()) {
            return Persona::Bdm;
        }
    }
    if let Some(title) = title {
        if SearchText::new(title).any(TECHNICAL_TITLE_TERMS) {
            return Persona::Itdm;
        }
    }
    let departments = SearchText::from_parts(departments.iter().map(String::as_str));
    if departments.any(TECHNICAL_DEPARTMENTS) {
        return Persona::Itdm;
    }
    Persona::Bdm
}

/// Segment from an explicit size code, else headcount. Defaults to Enterprise.
pub fn segment_for(size_code: Option<&str>, employee_count: Option<i64>) -> Segment {
    match size_code.map(|s| s.trim().to_lowercase()).as_deref() {
        Some("startup") | Some("small") => return Segment::Smb,
        Some("midmarket") | Some("mid_market") => return Segment::MidMarket,
        Some("enterprise") | Some("large_enterprise") => return Segment::Enterprise,
        _ => {}
    }
    match employee_count {
        Some(n) if n >= 1000 => Segment::Enterprise,
        Some(n) if n >= 100 => Segment::MidMarket,
        Some(_) => Segment::Smb,
        None => Segment::Enterprise,
    }
}

/// News, or company facts when there is none. Empty when neither exists.
pub fn build_enrichment_section(profile: &NormalizedProfile) -> String {
    if !profile.recent_news.is_empty() {
        let mut lines = vec!["RECENT COMPANY NEWS (reference where relevant):".to_string()];
        lines.extend(
            profile
                .recent_news
                .iter()
                .take(5)
                .map(|article| format!("- {}", article.title)),
        );
        if !profile.news_themes.is_empty() {
            lines.push(format!("News themes: {}", profile.news_themes.join(", ")));
        }
        return lines.join("\n");
    }

    let facts = derived_intelligence(profile);
    if facts.is_empty() {
        return String::new();
    }
    let mut lines =
        vec!["COMPANY INTELLIGENCE (use these facts to make the content specific):".to_string()];
    lines.extend(facts);
    lines.join("\n")
}

/// Everything the review is written for.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewInputs {
    pub company_name: String,
    /// Canonical industry bucket.
    pub industry: String,
    pub segment: Segment,
    pub persona: Persona,
    pub stage: Stage,
    pub priority: BusinessPriority,
    pub challenge: PrimaryChallenge,
    /// Output of [`build_enrichment_section`].
    pub enrichment: String,
}

impl ReviewInputs {
    pub fn from_profile(
        profile: &NormalizedProfile,
        context: &InferredContext,
        role: Option<&str>,
        size_code: Option<&str>,
    ) -> Self {
        let company_name = profile
            .company_name
            .clone()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| profile.domain.clone());
        Self {
            company_name,
            industry: profile.industry.clone().unwrap_or_default(),
            segment: segment_for(size_code, profile.employee_count),
            persona: persona_for(role, profile.title.as_deref(), &profile.departments),
            stage: stage_for_environment(context.it_environment),
            priority: context.business_priority,
            challenge: context.primary_challenge,
            enrichment: build_enrichment_section(profile),
        }
    }

    pub fn industry_label(&self) -> String {
        industry_display(&self.industry)
    }

    pub fn target(&self) -> ReviewTarget {
        ReviewTarget {
            company_name: self.company_name.clone(),
            industry: self.industry_label(),
            priority: priority_display(self.priority).to_string(),
            challenge: challenge_display(self.challenge).to_string(),
            stage: self.stage,
        }
    }
}

/// User prompt with the closest example as a few-shot demonstration.
pub fn build_user_prompt(inputs: &ReviewInputs, reference_block: &str) -> String {
    let target = inputs.target();
    let example = select_fallback_example(&target);
    let example_input = serde_json::to_string_pretty(&example.profile_json()).unwrap_or_default();
    let example_output = serde_json::to_string_pretty(&example.output_json()).unwrap_or_default();
    let enrichment = if inputs.enrichment.is_empty() {
        String::new()
    } else {
        format!("\n{}\n", inputs.enrichment)
    };

    format!(
        r#"Generate an executive review for this profile:

Company: {company}
Industry: {industry}
Segment: {segment}
Persona: {persona} - {guidance}
Stage: {stage}
Business Priority: {priority}
Challenge: {challenge}
{reference}{enrichment}
PERSONALIZATION CHECKLIST (you must address ALL of these):
1. First advantage headline MUST relate to "{priority}"
2. First risk headline MUST reference consequences of "{challenge}"
3. Content MUST use {industry}-specific terminology and systems
4. Language MUST be appropriate for a {persona} reader
5. Recommendations MUST be {stage}-appropriate ({focus})

Here is an example of excellent output for a {stage} stage company:

INPUT:
{example_input}

OUTPUT:
{example_output}

Now generate the executive review for {company}. The content must be clearly personalized to their specific industry ({industry}), priority ({priority}), and challenge ({challenge}).

Use the generate_executive_review tool to return your response."#,
        company = target.company_name,
        industry = target.industry,
        segment = inputs.segment,
        persona = inputs.persona,
        guidance = persona_guidance(inputs.persona),
        stage = inputs.stage,
        priority = target.priority,
        challenge = target.challenge,
        reference = reference_block,
        enrichment = enrichment,
        focus = stage_focus(inputs.stage),
        example_input = example_input,
        example_output = example_output,
    )
}

/// Structured content from a reply: tool input first, then fenced or bare JSON text.
pub fn parse_content(response: &ModelResponse) -> Option<GeneratedContent> {
    if let Some(input) = &response.tool_input {
        match serde_json::from_value(input.clone()) {
            Ok(content) => return Some(content),
            Err(e) => tracing::warn!("⚠ Tool input did not match the review shape: {}", e),
        }
    }
    let text = strip_code_fence(&response.text);
    if text.is_empty() {
        return None;
    }
    match serde_json::from_str(text) {
        Ok(content) => Some(content),
        Err(e) => {
            tracing::error!("❌ Failed to parse executive review JSON: {}", e);
            None
        }
    }
}

struct ModelRegenerator<'a> {
    model: &'a dyn LanguageModel,
    model_name: &'a str,
    policy: RetryPolicy,
}

#[async_trait]
impl<'a> SectionRegenerator for ModelRegenerator<'a> {
    async fn regenerate(&self, prompt: &str) -> Result<Option<GeneratedContent>, ModelCallError> {
        let request = ModelRequest::new(self.model_name, prompt, RETRY_MAX_TOKENS)
            .with_system(SYSTEM_PROMPT)
            .with_tool(review_tool());
        let response = complete_with_retry(self.model, &request, self.policy).await?;
        Ok(parse_content(&response))
    }
}

#[derive(Deserialize)]
struct JudgeReply {
    score: f64,
    #[serde(default)]
    reason: String,
}

fn judge_prompt(content: &GeneratedContent, industry: &str, persona: Persona) -> String {
    let body = serde_json::to_string_pretty(content).unwrap_or_default();
    format!(
        r#"Rate how specific this executive review is to a {industry} company, written for a {persona} reader.

Score from 1 to 5:
1 = generic text that could apply to any company in any industry
3 = mentions the industry but relies on general statements
5 = uses industry-specific systems, workloads and terminology throughout

CONTENT:
{body}

Return ONLY JSON in this exact format:
{{"score": <1-5>, "reason": "<one sentence>"}}"#
    )
}

/// Asks the model to score content specificity.
///
/// Never blocks delivery: any failure is reported as specific with a reason
/// starting with `Judge error`.
pub async fn judge_specificity(
    model: &dyn LanguageModel,
    model_name: &str,
    content: &GeneratedContent,
    industry: &str,
    persona: Persona,
) -> SpecificityVerdict {
    let request = ModelRequest::new(
        model_name,
        judge_prompt(content, industry, persona),
        JUDGE_MAX_TOKENS,
    );
    let reply = match model.complete(&request).await {
        Ok(response) => serde_json::from_str::<JudgeReply>(strip_code_fence(&response.text))
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    match reply {
        Ok(reply) => {
            let score = reply.score.round().clamp(1.0, 5.0) as u8;
            SpecificityVerdict {
                score,
                is_specific: score >= SPECIFIC_SCORE,
                reason: reply.reason,
            }
        }
        Err(e) => {
            tracing::warn!("⚠ Specificity judge failed: {}", e);
            SpecificityVerdict {
                score: 0,
                is_specific: true,
                reason: format!("Judge error: {}", e),
            }
        }
    }
}

/// Writes executive reviews, degrading to curated content when the model is missing or fails.
#[derive(Clone)]
pub struct ExecutiveReviewGenerator {
    model: Option<Arc<dyn LanguageModel>>,
    model_name: String,
    library: ReferenceLibrary,
    guardrails: GuardrailEngine,
    policy: RetryPolicy,
}

impl ExecutiveReviewGenerator {
    pub fn new(config: &Config, model: Option<Arc<dyn LanguageModel>>) -> Self {
        Self {
            model,
            model_name: config.review_model.clone(),
            library: ReferenceLibrary::new(config.content_dir.clone()),
            guardrails: GuardrailEngine::new(config.guardrail_max_retries),
            policy: RetryPolicy::from_config(config),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn assemble(
        &self,
        inputs: &ReviewInputs,
        content: GeneratedContent,
        guardrail: GuardrailOutcome,
        retry_attempts: u32,
        model_used: String,
        specificity: Option<SpecificityVerdict>,
    ) -> ExecutiveReview {
        ExecutiveReview {
            company_name: inputs.company_name.clone(),
            industry: inputs.industry_label(),
            segment: inputs.segment,
            persona: inputs.persona,
            stage: inputs.stage,
            stage_sidebar: stage_sidebar(inputs.stage).to_string(),
            stage_identification_text: stage_identification_text(inputs.stage),
            case_study: select_case_study(
                inputs.stage,
                inputs.priority,
                &inputs.industry,
                inputs.challenge,
            ),
            content,
            guardrail,
            retry_attempts,
            model_used,
            specificity,
        }
    }

    /// Curated review with the company name swapped in.
    pub fn mock_review(&self, inputs: &ReviewInputs) -> ExecutiveReview {
        let content = fallback_content(&inputs.target());
        self.assemble(
            inputs,
            content,
            GuardrailOutcome::FellBack,
            0,
            "mock".to_string(),
            None,
        )
    }

    pub async fn generate(&self, inputs: &ReviewInputs) -> ExecutiveReview {
        let Some(model) = &self.model else {
            tracing::warn!("No model configured, returning mock executive review");
            return self.mock_review(inputs);
        };

        let reference = self
            .library
            .reference_block(&inputs.industry_label(), inputs.persona, inputs.segment)
            .await;
        let request = ModelRequest::new(
            self.model_name.as_str(),
            build_user_prompt(inputs, &reference),
            MAX_TOKENS,
        )
        .with_system(SYSTEM_PROMPT)
        .with_tool(review_tool());

        let response = match complete_with_retry(model.as_ref(), &request, self.policy).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("❌ Executive review generation failed: {}", e);
                return self.mock_review(inputs);
            }
        };
        let Some(content) = parse_content(&response) else {
            tracing::error!("❌ No structured executive review in response, falling back");
            return self.mock_review(inputs);
        };

        let target = inputs.target();
        let regenerator = ModelRegenerator {
            model: model.as_ref(),
            model_name: &self.model_name,
            policy: self.policy,
        };
        let run = self
            .guardrails
            .run(content, &target, Some(&regenerator))
            .await;

        let specificity = match run.outcome {
            GuardrailOutcome::Passed => Some(
                judge_specificity(
                    model.as_ref(),
                    &self.model_name,
                    &run.content,
                    &target.industry,
                    inputs.persona,
                )
                .await,
            ),
            GuardrailOutcome::FellBack => None,
        };

        tracing::info!(
            "✓ Executive review for {}: outcome={:?}, retries={}",
            inputs.company_name,
            run.outcome,
            run.attempts
        );

        self.assemble(
            inputs,
            run.content,
            run.outcome,
            run.attempts,
            self.model_name.clone(),
            specificity,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guardrails::{validate_content, validate_structure};
    use crate::models::NewsArticle;
    use crate::reference_content::REFERENCE_POOL;
    use std::sync::Mutex;
    use std::time::Duration;

    struct Scripted {
        replies: Mutex<Vec<Result<ModelResponse, ModelCallError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl Scripted {
        fn new(mut replies: Vec<Result<ModelResponse, ModelCallError>>) -> Arc<Self> {
            replies.reverse();
            Arc::new(Self {
                replies: Mutex::new(replies),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LanguageModel for Scripted {
        async fn complete(&self, request: &ModelRequest) -> Result<ModelResponse, ModelCallError> {
            self.prompts.lock().unwrap().push(request.prompt.clone());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(ModelCallError::Api("no more replies".to_string())))
        }
    }

    fn tool_reply(content: &GeneratedContent) -> Result<ModelResponse, ModelCallError> {
        Ok(ModelResponse {
            tool_input: Some(serde_json::to_value(content).unwrap()),
            ..Default::default()
        })
    }

    fn text_reply(text: &str) -> Result<ModelResponse, ModelCallError> {
        Ok(ModelResponse {
            text: text.to_string(),
            ..Default::default()
        })
    }

    fn aecom_inputs() -> ReviewInputs {
        ReviewInputs {
            company_name: "AECOM".to_string(),
            industry: "manufacturing".to_string(),
            segment: Segment::Enterprise,
            persona: Persona::Itdm,
            stage: Stage::Observer,
            priority: BusinessPriority::ReducingCost,
            challenge: PrimaryChallenge::LegacySystems,
            enrichment: String::new(),
        }
    }

    fn aecom_content() -> GeneratedContent {
        let mut content = REFERENCE_POOL[0].to_content();
        content.case_study_relevance =
            "This case study shows how a firm with legacy systems cut costs by modernizing its data center footprint."
                .to_string();
        content
    }

    fn generator(model: Option<Arc<dyn LanguageModel>>) -> ExecutiveReviewGenerator {
        ExecutiveReviewGenerator::new(&Config::default(), model).with_policy(RetryPolicy {
            max_attempts: 1,
            delay: Duration::from_millis(1),
        })
    }

    #[test]
    fn test_fixture_content_passes_every_check() {
        let result = validate_content(&aecom_content(), &aecom_inputs().target());
        assert!(result.passed, "{:?}", result.failures);
    }

    #[tokio::test]
    async fn test_mock_review_without_model() {
        let review = generator(None).generate(&aecom_inputs()).await;
        assert_eq!(review.model_used, "mock");
        assert_eq!(review.guardrail, GuardrailOutcome::FellBack);
        assert!(validate_structure(&review.content).passed);
        assert!(review.case_study.name.contains("Smurfit Westrock"));
        assert!(review.specificity.is_none());
    }

    #[tokio::test]
    async fn test_passing_tool_output_is_judged() {
        let model = Scripted::new(vec![
            tool_reply(&aecom_content()),
            text_reply(r#"{"score": 4, "reason": "Uses BIM and CAD workloads."}"#),
        ]);
        let review = generator(Some(model.clone())).generate(&aecom_inputs()).await;

        assert_eq!(review.guardrail, GuardrailOutcome::Passed);
        assert_eq!(review.retry_attempts, 0);
        assert_eq!(review.model_used, "claude-sonnet-4-20250514");
        assert_eq!(review.content, aecom_content());
        let verdict = review.specificity.unwrap();
        assert!(verdict.is_specific);
        assert_eq!(verdict.score, 4);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_failing_section_is_regenerated() {
        let mut first = aecom_content();
        first.advantages[1].headline = "Revolutionary gains in today's landscape".to_string();
        let model = Scripted::new(vec![
            tool_reply(&first),
            tool_reply(&aecom_content()),
            text_reply("```json\n{\"score\": 3, \"reason\": \"Moderate.\"}\n```"),
        ]);
        let review = generator(Some(model.clone())).generate(&aecom_inputs()).await;

        assert_eq!(review.guardrail, GuardrailOutcome::Passed);
        assert_eq!(review.retry_attempts, 1);
        assert_eq!(review.content.advantages, aecom_content().advantages);
        assert_eq!(review.specificity.unwrap().score, 3);

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[1].contains("advantages[1].headline"));
    }

    #[tokio::test]
    async fn test_unparseable_reply_falls_back_to_mock() {
        let model = Scripted::new(vec![text_reply("I cannot help with that.")]);
        let review = generator(Some(model)).generate(&aecom_inputs()).await;
        assert_eq!(review.model_used, "mock");
        assert_eq!(review.guardrail, GuardrailOutcome::FellBack);
    }

    #[tokio::test]
    async fn test_judge_rejects_generic_content() {
        let model = Scripted::new(vec![text_reply(
            r#"{"score": 2, "reason": "Content is generic and could apply to any industry."}"#,
        )]);
        let verdict =
            judge_specificity(model.as_ref(), "m", &aecom_content(), "Healthcare", Persona::Itdm)
                .await;
        assert!(!verdict.is_specific);
        assert_eq!(verdict.score, 2);
    }

    #[tokio::test]
    async fn test_judge_errors_never_block() {
        let model = Scripted::new(vec![Err(ModelCallError::Timeout("API timeout".to_string()))]);
        let verdict =
            judge_specificity(model.as_ref(), "m", &aecom_content(), "Healthcare", Persona::Itdm)
                .await;
        assert!(verdict.is_specific);
        assert!(verdict.reason.contains("Judge error"));
    }

    #[test]
    fn test_parse_content_prefers_tool_input_then_fenced_text() {
        let content = aecom_content();
        let fenced = format!("```json\n{}\n```", serde_json::to_string(&content).unwrap());
        let from_text = parse_content(&text_reply(&fenced).unwrap()).unwrap();
        assert_eq!(from_text, content);

        let both = ModelResponse {
            text: "garbage".to_string(),
            tool_input: Some(serde_json::to_value(&content).unwrap()),
            ..Default::default()
        };
        assert_eq!(parse_content(&both).unwrap(), content);
        assert!(parse_content(&text_reply("not json").unwrap()).is_none());
    }

    #[test]
    fn test_prompt_carries_inputs_and_example() {
        let prompt = build_user_prompt(&aecom_inputs(), "");
        assert!(prompt.contains("Company: AECOM"));
        assert!(prompt.contains("Business Priority: Reducing cost"));
        assert!(prompt.contains("Challenge: Legacy systems"));
        assert!(prompt.contains("Persona: ITDM - Focus on infrastructure"));
        assert!(prompt.contains("foundational, cost-focused"));
        assert!(prompt.contains("\"advantages\""));
    }

    #[test]
    fn test_persona_mapping() {
        assert_eq!(persona_for(Some("cto"), None, &[]), Persona::Itdm);
        assert_eq!(persona_for(Some("cfo"), Some("Engineer"), &[]), Persona::Bdm);
        assert_eq!(persona_for(None, Some("VP of Infrastructure"), &[]), Persona::Itdm);
        assert_eq!(persona_for(None, Some("Director of Sales"), &[]), Persona::Bdm);
        assert_eq!(
            persona_for(None, Some("Director"), &["engineering".to_string()]),
            Persona::Itdm
        );
        assert_eq!(persona_for(None, None, &[]), Persona::Bdm);
    }

    #[test]
    fn test_segment_mapping() {
        assert_eq!(segment_for(Some("startup"), Some(50_000)), Segment::Smb);
        assert_eq!(segment_for(Some("midmarket"), None), Segment::MidMarket);
        assert_eq!(segment_for(None, Some(5000)), Segment::Enterprise);
        assert_eq!(segment_for(None, Some(250)), Segment::MidMarket);
        assert_eq!(segment_for(None, Some(40)), Segment::Smb);
        assert_eq!(segment_for(Some("unknown"), None), Segment::Enterprise);
    }

    #[test]
    fn test_enrichment_section_sources() {
        let mut profile = NormalizedProfile {
            employee_count: Some(12000),
            founded_year: Some(1990),
            ..Default::default()
        };
        let section = build_enrichment_section(&profile);
        assert!(section.starts_with("COMPANY INTELLIGENCE"));
        assert!(section.contains("12,000"));

        profile.recent_news = vec![NewsArticle {
            title: "Acme opens new AI lab".to_string(),
            ..Default::default()
        }];
        let section = build_enrichment_section(&profile);
        assert!(section.starts_with("RECENT COMPANY NEWS"));
        assert!(section.contains("Acme opens new AI lab"));

        assert!(build_enrichment_section(&NormalizedProfile::default()).is_empty());
    }
}
