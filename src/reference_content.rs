//! Curated reference material for executive reviews.
//!
//! Holds the gold-standard example pool used for few-shot prompting and
//! fallback, the case study catalog, display labels for context codes and a
//! loader for the optional markdown reference library.

use regex::Regex;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::models::{
    BusinessPriority, CaseStudy, GeneratedContent, Insight, ItEnvironment, Persona,
    PrimaryChallenge, Recommendation, Segment, Stage,
};

// ============ Case Studies ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseStudyKey {
    KtCloud,
    SmurfitWestrock,
    Pqr,
}

impl CaseStudyKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseStudyKey::KtCloud => "kt_cloud",
            CaseStudyKey::SmurfitWestrock => "smurfit_westrock",
            CaseStudyKey::Pqr => "pqr",
        }
    }

    pub fn case_study(&self) -> CaseStudy {
        let (name, description, link) = match self {
            CaseStudyKey::KtCloud => (
                "KT Cloud Expands AI Power with AMD Instinct Accelerators",
                "KT Cloud built a scalable AI cloud service using AMD Instinct MI250 accelerators, increasing performance and reducing GPU service costs by up to 70%.",
                "https://www.amd.com/en/resources/case-study/kt-cloud-expands-ai-power.html",
            ),
            CaseStudyKey::SmurfitWestrock => (
                "Smurfit Westrock Saves AWS Costs for Innovation with AMD",
                "Smurfit Westrock cut cloud costs by 25% and lowered its carbon footprint by 10% by transitioning to AWS instances powered by AMD EPYC CPUs.",
                "https://www.amd.com/en/resources/case-study/smurfit-westrock-saves-aws-costs.html",
            ),
            CaseStudyKey::Pqr => (
                "PQR Offers Next-Gen IT Services with AMD Pensando DPUs",
                "PQR created a next-generation data center service emphasizing stronger security and operational simplicity using AMD Pensando DPU-enabled infrastructure.",
                "https://www.amd.com/en/resources/case-study/pqr-next-gen-it-services.html",
            ),
        };
        CaseStudy {
            key: self.as_str().to_string(),
            name: name.to_string(),
            description: description.to_string(),
            link: link.to_string(),
        }
    }
}

/// Picks the case study for a profile. `industry` is the canonical bucket.
///
/// Cost reduction always wins, then regulated industries, then skills or
/// governance challenges outside tech and retail, then performance or AI
/// priorities. The stage decides the rest.
pub fn select_case_study(
    stage: Stage,
    priority: BusinessPriority,
    industry: &str,
    challenge: PrimaryChallenge,
) -> CaseStudy {
    let key = if priority == BusinessPriority::ReducingCost {
        CaseStudyKey::SmurfitWestrock
    } else if matches!(industry, "healthcare" | "financial_services" | "government") {
        CaseStudyKey::Pqr
    } else if matches!(
        challenge,
        PrimaryChallenge::SkillsGap | PrimaryChallenge::DataGovernance
    ) && !matches!(industry, "technology" | "telecommunications" | "retail")
    {
        CaseStudyKey::Pqr
    } else if matches!(
        priority,
        BusinessPriority::ImprovingPerformance | BusinessPriority::PreparingAi
    ) {
        CaseStudyKey::KtCloud
    } else {
        match stage {
            Stage::Observer => CaseStudyKey::SmurfitWestrock,
            Stage::Leader => CaseStudyKey::Pqr,
            Stage::Challenger => CaseStudyKey::KtCloud,
        }
    };
    key.case_study()
}

// ============ Stages and Display Labels ============

pub fn stage_for_environment(environment: ItEnvironment) -> Stage {
    match environment {
        ItEnvironment::Traditional => Stage::Observer,
        ItEnvironment::Modernizing => Stage::Challenger,
        ItEnvironment::Modern => Stage::Leader,
    }
}

pub fn stage_sidebar(stage: Stage) -> &'static str {
    match stage {
        Stage::Observer => "9% of Observers plan to modernize within the next two years.",
        Stage::Challenger => "58% of Challengers are currently undertaking modernization initiatives.",
        Stage::Leader => "33% of Leaders have fully modernized in the past two years.",
    }
}

pub fn stage_identification_text(stage: Stage) -> String {
    format!(
        "Based on the information you shared, your organization best aligns with the {} stage of modernization.",
        stage
    )
}

pub fn priority_display(priority: BusinessPriority) -> &'static str {
    match priority {
        BusinessPriority::ReducingCost => "Reducing cost",
        BusinessPriority::ImprovingPerformance => "Improving workload performance",
        BusinessPriority::PreparingAi => "Preparing for AI adoption",
    }
}

pub fn challenge_display(challenge: PrimaryChallenge) -> &'static str {
    match challenge {
        PrimaryChallenge::LegacySystems => "Legacy systems",
        PrimaryChallenge::IntegrationFriction => "Integration friction",
        PrimaryChallenge::ResourceConstraints => "Resource constraints",
        PrimaryChallenge::SkillsGap => "Skills gap",
        PrimaryChallenge::DataGovernance => "Data governance and compliance",
    }
}

/// Display label for a canonical industry; unknown buckets are title-cased.
pub fn industry_display(industry: &str) -> String {
    let label = match industry {
        "technology" => "Technology",
        "financial_services" => "Financial Services",
        "healthcare" => "Healthcare",
        "manufacturing" => "Manufacturing",
        "retail" => "Retail",
        "energy" => "Energy",
        "telecommunications" => "Telecommunications",
        "media" => "Media",
        "government" => "Government",
        "education" => "Education",
        "professional_services" => "Professional Services",
        "" | "other" => "Other",
        other => {
            return other
                .split(|c: char| c == '_' || c.is_whitespace())
                .filter(|w| !w.is_empty())
                .map(|w| {
                    let mut chars = w.chars();
                    match chars.next() {
                        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                        None => String::new(),
                    }
                })
                .collect::<Vec<_>>()
                .join(" ");
        }
    };
    label.to_string()
}

// ============ Example Pool ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExampleItem {
    /// Headline for advantages and risks, title for recommendations.
    pub headline: &'static str,
    pub description: &'static str,
}

impl ExampleItem {
    pub const fn new(headline: &'static str, description: &'static str) -> Self {
        Self {
            headline,
            description,
        }
    }
}

/// A hand-written executive review that passes every content rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceExample {
    pub company: &'static str,
    pub industry: &'static str,
    pub segment: Segment,
    pub persona: Persona,
    pub stage: Stage,
    pub priority: &'static str,
    pub challenge: &'static str,
    pub advantages: [ExampleItem; 2],
    pub risks: [ExampleItem; 2],
    pub recommendations: [ExampleItem; 3],
    /// Short name of the case study the example was written around.
    pub case_study: &'static str,
}

impl ReferenceExample {
    /// The example copy, without a relevance line.
    pub fn to_content(&self) -> GeneratedContent {
        let insight = |item: &ExampleItem| Insight {
            headline: item.headline.to_string(),
            description: item.description.to_string(),
        };
        GeneratedContent {
            advantages: self.advantages.iter().map(insight).collect(),
            risks: self.risks.iter().map(insight).collect(),
            recommendations: self
                .recommendations
                .iter()
                .map(|item| Recommendation {
                    title: item.headline.to_string(),
                    description: item.description.to_string(),
                })
                .collect(),
            case_study_relevance: String::new(),
        }
    }

    /// Example inputs as shown to the model.
    pub fn profile_json(&self) -> serde_json::Value {
        json!({
            "company": self.company,
            "industry": self.industry,
            "segment": self.segment,
            "persona": self.persona,
            "stage": self.stage,
            "priority": self.priority,
            "challenge": self.challenge,
        })
    }

    /// Example output as shown to the model.
    pub fn output_json(&self) -> serde_json::Value {
        let content = self.to_content();
        json!({
            "advantages": content.advantages,
            "risks": content.risks,
            "recommendations": content.recommendations,
            "case_study": self.case_study,
        })
    }
}

/// Examples for a stage, in pool order.
pub fn examples_for_stage(stage: Stage) -> Vec<&'static ReferenceExample> {
    REFERENCE_POOL.iter().filter(|e| e.stage == stage).collect()
}

pub static REFERENCE_POOL: &[ReferenceExample] = &[
    ReferenceExample {
        company: "AECOM",
        industry: "AEC",
        segment: Segment::Enterprise,
        persona: Persona::Itdm,
        stage: Stage::Observer,
        priority: "Reducing cost",
        challenge: "Legacy systems",
        advantages: [
            ExampleItem::new(
                "Cost savings from reducing legacy system overhead",
                "Retiring aging on-prem systems lowers operating costs and reduces the maintenance burden across AECOM's globally distributed project teams.",
            ),
            ExampleItem::new(
                "Efficiency gains through basic standardization",
                "Unifying fragmented BIM, CAD, and project data environments creates quick workflow efficiencies without requiring major architectural change.",
            ),
        ],
        risks: [
            ExampleItem::new(
                "High total cost of ownership from legacy infrastructure",
                "Running large, outdated systems at enterprise scale drives rising support, licensing, and hardware costs that conflict with cost-reduction goals.",
            ),
            ExampleItem::new(
                "Integration gaps that add avoidable project costs",
                "Siloed tools and limited interoperability across field, design, and ERP systems increase rework risk and make secure integration harder for IT.",
            ),
        ],
        recommendations: [
            ExampleItem::new(
                "Modernize high-impact legacy workloads first",
                "Target the most cost-intensive on-prem systems, such as storage and compute tied to BIM and CAD, to reduce maintenance overhead and improve stability for distributed project teams.",
            ),
            ExampleItem::new(
                "Standardize core infrastructure to reduce fragmentation",
                "Adopt consistent tooling and platform standards across regions to lower integration effort for ITDM teams and eliminate duplicated spend across project sites.",
            ),
            ExampleItem::new(
                "Build a scalable foundation for future AI workloads",
                "Upgrade underlying compute and storage so the company can support emerging AI-driven design and planning tools without incurring higher costs from repeated rework.",
            ),
        ],
        case_study: "Smurfit Westrock",
    },
    ReferenceExample {
        company: "Allbirds",
        industry: "Consumer Goods",
        segment: Segment::Smb,
        persona: Persona::Bdm,
        stage: Stage::Observer,
        priority: "Reducing cost",
        challenge: "Resource constraints",
        advantages: [
            ExampleItem::new(
                "Lower operating costs by modernizing high-expense systems",
                "Replacing or consolidating aging infrastructure reduces ongoing maintenance spend and helps Allbirds stretch limited resources further across its growing digital and retail operations.",
            ),
            ExampleItem::new(
                "Quick efficiency gains from simplifying fragmented environments",
                "Streamlining ecommerce, inventory, and operations systems cuts redundant work and reduces the burden on its lean teams.",
            ),
        ],
        risks: [
            ExampleItem::new(
                "Rising costs from continuing to maintain outdated systems",
                "Legacy platforms require increasing support and licensing effort, making it harder for Allbirds to manage expenses under tight resource constraints.",
            ),
            ExampleItem::new(
                "Resource constraints slow progress on foundational modernization",
                "Without added support or simplification, the business may struggle to execute essential upgrades that reduce cost and improve efficiency.",
            ),
        ],
        recommendations: [
            ExampleItem::new(
                "Modernize the systems that drive the highest operational costs",
                "Update or consolidate the platforms behind ecommerce, inventory, and fulfillment to reduce maintenance spend and improve day-to-day efficiency.",
            ),
            ExampleItem::new(
                "Simplify the tech stack to reduce workload on lean teams",
                "Standardize tools and remove redundant systems so limited resources can focus on the core platforms that support growth.",
            ),
            ExampleItem::new(
                "Adopt solutions that deliver quick, low-effort efficiency gains",
                "Choose modernization steps with clear savings and minimal lift so the company can reduce cost without straining its small IT and operations teams.",
            ),
        ],
        case_study: "Smurfit Westrock",
    },
    ReferenceExample {
        company: "Target",
        industry: "Retail",
        segment: Segment::Enterprise,
        persona: Persona::Bdm,
        stage: Stage::Challenger,
        priority: "Improving workload performance",
        challenge: "Integration friction",
        advantages: [
            ExampleItem::new(
                "Performance gains from upgrading core systems",
                "Modernizing high-volume retail workloads improves responsiveness across POS, ecommerce, and supply chain operations.",
            ),
            ExampleItem::new(
                "Faster throughput by reducing integration friction",
                "Improving data flow between merchandising, inventory, and digital platforms enables more consistent performance for customer-facing processes.",
            ),
        ],
        risks: [
            ExampleItem::new(
                "Persistent slowdowns from legacy system connections",
                "If integration issues remain unresolved, performance bottlenecks will continue to affect revenue, customer experience, and store operations.",
            ),
            ExampleItem::new(
                "Competitors advance with more unified retail platforms",
                "Delays in improving system performance allow faster, better-integrated retailers to gain an advantage in speed and reliability.",
            ),
        ],
        recommendations: [
            ExampleItem::new(
                "Prioritize performance upgrades for high-volume retail systems",
                "Focus modernization on the transactional workloads that power POS, ecommerce, and inventory to improve speed and reduce friction during peak demand.",
            ),
            ExampleItem::new(
                "Strengthen integration across core retail platforms",
                "Improve data consistency and flow between store, digital, and supply chain systems to eliminate performance delays that impact customer experience and revenue.",
            ),
            ExampleItem::new(
                "Adopt scalable infrastructure to support unified commerce",
                "Move toward more flexible compute and storage environments so the organization can handle growing performance demands across omnichannel operations without added complexity.",
            ),
        ],
        case_study: "KT Cloud",
    },
    ReferenceExample {
        company: "Caterpillar",
        industry: "Manufacturing",
        segment: Segment::Enterprise,
        persona: Persona::Bdm,
        stage: Stage::Challenger,
        priority: "Improving workload performance",
        challenge: "Skills gap",
        advantages: [
            ExampleItem::new(
                "Performance gains from modernizing critical industrial workloads",
                "Upgrading compute environments that support equipment monitoring and production systems improves reliability and throughput across global manufacturing operations.",
            ),
            ExampleItem::new(
                "Fewer delays by reducing friction between OT and IT systems",
                "Improving integration across factory equipment, ERP, and analytics platforms enables more consistent performance and faster issue resolution for production teams.",
            ),
        ],
        risks: [
            ExampleItem::new(
                "Operational slowdowns if legacy OT connections remain in place",
                "If outdated interfaces remain and OT skills gaps persist, performance issues will continue to impact production output, equipment uptime, and supply chain operations.",
            ),
            ExampleItem::new(
                "Skills gaps can limit the impact of modernization efforts",
                "Without enough talent to support new tools and integrated OT-IT workflows, performance improvements may stall or fail to scale across manufacturing sites.",
            ),
        ],
        recommendations: [
            ExampleItem::new(
                "Prioritize modernization of core production systems",
                "Focus upgrades on equipment monitoring, analytics, and plant-floor workloads that have the greatest impact on performance and uptime.",
            ),
            ExampleItem::new(
                "Strengthen integration across OT and IT environments",
                "Standardize platforms and improve data flow between factory equipment, ERP, and analytics tools to reduce delays and improve operational reliability.",
            ),
            ExampleItem::new(
                "Invest in capabilities that close critical skills gaps",
                "Expand training and bring in specialized expertise so modernization work can scale across manufacturing sites and support more reliable, integrated operations.",
            ),
        ],
        case_study: "PQR",
    },
    ReferenceExample {
        company: "HCA Healthcare",
        industry: "Healthcare",
        segment: Segment::Enterprise,
        persona: Persona::Itdm,
        stage: Stage::Leader,
        priority: "Preparing for AI adoption",
        challenge: "Data governance and compliance",
        advantages: [
            ExampleItem::new(
                "Stronger readiness for advanced AI adoption",
                "HCA Healthcare's modern, scalable infrastructure gives IT teams the foundation to support clinical AI models that need high performance and reliable data access.",
            ),
            ExampleItem::new(
                "Tighter governance accelerates compliant AI adoption",
                "With established data controls across EHR, imaging, and operational systems, the organization can evaluate and deploy AI use cases confidently within strict regulatory boundaries.",
            ),
        ],
        risks: [
            ExampleItem::new(
                "Data governance gaps threaten AI accuracy and safety",
                "If interoperability or data quality issues persist across clinical and administrative systems, AI models may underperform or increase compliance risk for IT.",
            ),
            ExampleItem::new(
                "Regulatory complexity can slow enterprise AI deployment",
                "Highly regulated environments like healthcare require rigorous validation and documentation, which may extend timelines to operationalize AI at scale.",
            ),
        ],
        recommendations: [
            ExampleItem::new(
                "Strengthen data foundations for clinical AI",
                "Improve data quality and interoperability across EHR, imaging, and operational systems to ensure AI models are accurate, reliable, and compliant.",
            ),
            ExampleItem::new(
                "Expand governance frameworks for safe AI use",
                "Enhance validation, documentation, and audit controls so IT teams can deploy AI tools that meet strict healthcare regulatory requirements.",
            ),
            ExampleItem::new(
                "Scale infrastructure for high-performance AI workloads",
                "Increase compute and storage capacity to run demanding AI models consistently across clinical and administrative environments.",
            ),
        ],
        case_study: "PQR",
    },
    ReferenceExample {
        company: "JPMorgan Chase",
        industry: "Financial Services",
        segment: Segment::Enterprise,
        persona: Persona::Bdm,
        stage: Stage::Leader,
        priority: "Improving workload performance",
        challenge: "Data governance and compliance",
        advantages: [
            ExampleItem::new(
                "Performance optimization drives competitive trading advantages",
                "JPMorgan Chase can leverage optimized infrastructure to execute transactions faster and more reliably than competitors in latency-sensitive markets.",
            ),
            ExampleItem::new(
                "Strong governance enables compliant innovation at scale",
                "Mature data controls and audit capabilities allow the organization to deploy new trading and analytics systems while maintaining regulatory compliance.",
            ),
        ],
        risks: [
            ExampleItem::new(
                "Compliance overhead may constrain performance gains",
                "If governance requirements add latency or complexity to critical trading systems, the company may not fully realize performance optimization benefits.",
            ),
            ExampleItem::new(
                "Fintech competitors move faster with fewer constraints",
                "Newer financial technology firms with lighter regulatory burdens can iterate and deploy performance improvements more rapidly than established institutions.",
            ),
        ],
        recommendations: [
            ExampleItem::new(
                "Optimize high-frequency trading infrastructure",
                "Focus performance improvements on the systems that directly impact revenue generation and competitive positioning in time-sensitive financial markets.",
            ),
            ExampleItem::new(
                "Streamline compliance without sacrificing controls",
                "Implement automated governance and audit capabilities that maintain regulatory compliance while reducing the performance overhead of manual processes.",
            ),
            ExampleItem::new(
                "Deploy AI for real-time risk and fraud detection",
                "Leverage optimized compute infrastructure to run advanced AI models that improve risk management and fraud prevention without adding transaction latency.",
            ),
        ],
        case_study: "PQR",
    },
];

// ============ Reference Library ============

const INDUSTRY_CONTEXT_CHARS: usize = 1800;
const PERSONA_CONTEXT_CHARS: usize = 800;
const SEGMENT_CONTEXT_CHARS: usize = 800;

static NUMBERED_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^##\s+(\d+|[IVX]+)\.").expect("numbered section pattern is valid")
});

static CONTEXT_SECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^##\s+(Executive Summary|Industry Context|Buyer Context|Navigating)")
        .expect("context section pattern is valid")
});

fn industry_file(industry: &str) -> Option<&'static str> {
    match industry {
        "Healthcare" => Some("KP_Industry_Healthcare.md"),
        "Financial Services" => Some("KP_Industry_Financial Services.md"),
        "Manufacturing" => Some("KP_Industry_Manufacturing.md"),
        "Retail" => Some("KP_Industry_Retail.md"),
        "Energy" => Some("KP_Industry_Energy.md"),
        "Education" => Some("KP_Industry_Education.md"),
        "Media" => Some("KP_Industry_Media and Ent.md"),
        _ => None,
    }
}

fn persona_file(persona: Persona) -> &'static str {
    match persona {
        Persona::Itdm => "KP_Job Function_ITDM.md",
        Persona::Bdm => "KP_Job Function_BDM.md",
    }
}

fn segment_file(segment: Segment) -> &'static str {
    match segment {
        Segment::Enterprise => "KP_Segment_Enterprise.md",
        Segment::MidMarket => "KP_Segment_Mid-Market.md",
        Segment::Smb => "KP_Segment_SMB.md",
    }
}

/// Keeps the first two numbered sections and any summary or context section,
/// then cuts to `max_chars` at the last sentence end past the halfway mark.
pub fn condense(markdown: &str, max_chars: usize) -> String {
    let mut relevant = Vec::new();
    let mut in_relevant = false;
    let mut numbered = 0;

    for line in markdown.lines() {
        if NUMBERED_SECTION.is_match(line) {
            numbered += 1;
            in_relevant = numbered <= 2;
        }
        if CONTEXT_SECTION.is_match(line) {
            in_relevant = true;
        }
        if in_relevant {
            let cleaned = line.trim();
            if cleaned.chars().count() > 10 && !cleaned.starts_with("- ○") {
                relevant.push(cleaned);
            }
        }
    }

    let condensed = relevant.join(" ");
    if condensed.chars().count() <= max_chars {
        return condensed;
    }

    let truncated: String = condensed.chars().take(max_chars).collect();
    match truncated.rfind('.') {
        Some(idx) if truncated[..idx].chars().count() > max_chars / 2 => {
            truncated[..=idx].to_string()
        }
        _ => truncated,
    }
}

/// Markdown reference material on disk. Missing files yield no context.
#[derive(Debug, Clone, Default)]
pub struct ReferenceLibrary {
    dir: Option<PathBuf>,
}

impl ReferenceLibrary {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    async fn load(&self, file: &str, max_chars: usize) -> Option<String> {
        let path = self.dir.as_ref()?.join(file);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                let condensed = condense(&text, max_chars);
                (!condensed.is_empty()).then_some(condensed)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!("⚠ Failed to read reference file {}: {}", path.display(), e);
                None
            }
        }
    }

    pub async fn industry_context(&self, industry: &str) -> Option<String> {
        self.load(industry_file(industry)?, INDUSTRY_CONTEXT_CHARS).await
    }

    pub async fn persona_context(&self, persona: Persona) -> Option<String> {
        self.load(persona_file(persona), PERSONA_CONTEXT_CHARS).await
    }

    pub async fn segment_context(&self, segment: Segment) -> Option<String> {
        self.load(segment_file(segment), SEGMENT_CONTEXT_CHARS).await
    }

    /// Prompt block with whatever reference material exists, or an empty string.
    pub async fn reference_block(&self, industry: &str, persona: Persona, segment: Segment) -> String {
        let mut parts = Vec::new();
        if let Some(ctx) = self.industry_context(industry).await {
            parts.push(format!("AMD INDUSTRY CONTEXT ({}):\n{}", industry, ctx));
        }
        if let Some(ctx) = self.persona_context(persona).await {
            parts.push(format!("AMD PERSONA CONTEXT ({}):\n{}", persona, ctx));
        }
        if let Some(ctx) = self.segment_context(segment).await {
            parts.push(format!("AMD SEGMENT CONTEXT ({}):\n{}", segment, ctx));
        }
        if parts.is_empty() {
            return String::new();
        }
        format!(
            "\n\n---\nAMD REFERENCE MATERIAL (use to ground your recommendations in AMD's actual capabilities):\n\n{}\n---\n",
            parts.join("\n\n")
        )
    }
}
