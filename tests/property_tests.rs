/// Property-based tests using proptest
/// Invariants of resolution, inference and the guardrail loop that should hold for all inputs
use chrono::{TimeZone, Utc};
use proptest::prelude::*;

use rad_enrichment_api::context_inference::calculate_confidence;
use rad_enrichment_api::guardrails::{
    validate_company_name, validate_content, validate_structure, GuardrailEngine, ReviewTarget,
};
use rad_enrichment_api::models::{
    ApolloPerson, GeneratedContent, GuardrailOutcome, Insight, NewsArticle, NormalizedProfile,
    PdlCompany, RawSourcePayload, Recommendation, SourceData, SourcePayloads, Stage,
    ZoomInfoCompany,
};
use rad_enrichment_api::resolver::{canonicalize_industry, estimate_employee_count, resolve_profile};

// Property: canonicalization is idempotent
proptest! {
    #[test]
    fn canonicalization_is_idempotent(raw in "[a-zA-Z][a-zA-Z &-]{0,30}") {
        let once = canonicalize_industry(&raw).unwrap();
        let twice = canonicalize_industry(&once).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn canonicalization_never_panics(raw in "\\PC*") {
        let _ = canonicalize_industry(&raw);
    }

    #[test]
    fn closed_ranges_estimate_midpoint(low in 1i64..100_000, width in 0i64..100_000) {
        let high = low + width;
        prop_assert_eq!(
            estimate_employee_count(&format!("{}-{}", low, high)),
            Some((low + high) / 2)
        );
    }
}

fn profile_with(signals: &[bool; 11]) -> NormalizedProfile {
    let text = |on: bool, v: &str| on.then(|| v.to_string());
    NormalizedProfile {
        company_tags: if signals[0] { vec!["cloud".to_string()] } else { Vec::new() },
        news_themes: if signals[1] { vec!["ai".to_string()] } else { Vec::new() },
        recent_news: if signals[2] {
            vec![NewsArticle { title: "News".to_string(), ..Default::default() }; 3]
        } else {
            Vec::new()
        },
        founded_year: signals[3].then_some(1999),
        employee_count: signals[4].then_some(250),
        employee_growth_rate: signals[5].then_some(0.1),
        latest_funding_stage: text(signals[6], "series_b"),
        title: text(signals[7], "CTO"),
        seniority: text(signals[8], "c_suite"),
        industry: text(signals[9], "technology"),
        company_summary: text(signals[10], "Builds things"),
        ..Default::default()
    }
}

// Property: confidence never decreases as signal fields are added
proptest! {
    #[test]
    fn confidence_is_monotonic(base in any::<[bool; 11]>(), extra in any::<[bool; 11]>()) {
        let mut superset = base;
        for (s, e) in superset.iter_mut().zip(extra.iter()) {
            *s |= *e;
        }
        let smaller = calculate_confidence(&profile_with(&base));
        let larger = calculate_confidence(&profile_with(&superset));
        prop_assert!(larger >= smaller);
        prop_assert!((0.2..=1.0).contains(&larger));
    }
}

fn payloads(
    apollo: (Option<String>, Option<String>, Option<String>),
    pdl_company: (Option<String>, Option<String>, Option<String>),
    zoominfo: (Option<String>, Option<i64>),
    synthetic_apollo: bool,
) -> SourcePayloads {
    let apollo = SourceData::Apollo(ApolloPerson {
        title: apollo.0,
        company_name: apollo.1,
        industry: apollo.2,
        ..Default::default()
    });
    let apollo = if synthetic_apollo {
        RawSourcePayload::synthetic(apollo)
    } else {
        RawSourcePayload::fetched(apollo)
    };
    vec![
        apollo,
        RawSourcePayload::fetched(SourceData::PdlCompany(PdlCompany {
            display_name: pdl_company.0,
            name: pdl_company.1,
            size: pdl_company.2.clone(),
            employee_count_range: pdl_company.2,
            ..Default::default()
        })),
        RawSourcePayload::fetched(SourceData::ZoomInfo(ZoomInfoCompany {
            company_name: zoominfo.0,
            employee_count: zoominfo.1,
            ..Default::default()
        })),
    ]
    .into_iter()
    .collect()
}

fn opt_text() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[A-Za-z ]{0,12}")
}

// Property: resolution is a pure function of its inputs
proptest! {
    #[test]
    fn resolution_is_deterministic(
        apollo in (opt_text(), opt_text(), opt_text()),
        pdl_company in (opt_text(), opt_text(), proptest::option::of("[0-9]{1,4}(-[0-9]{1,5}|\\+)?")),
        zoominfo in (opt_text(), proptest::option::of(1i64..1_000_000)),
        synthetic_apollo in any::<bool>(),
    ) {
        let set = payloads(apollo, pdl_company, zoominfo, synthetic_apollo);
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let first = resolve_profile("a@acme.com", "acme.com", &set, at);
        let second = resolve_profile("a@acme.com", "acme.com", &set, at);
        prop_assert_eq!(&first, &second);
        if synthetic_apollo {
            prop_assert!(first.title.is_none());
        }
    }
}

fn insight() -> impl Strategy<Value = Insight> {
    ("[A-Za-z ':!]{0,60}", "[A-Za-z ,.'!]{0,240}")
        .prop_map(|(headline, description)| Insight { headline, description })
}

fn content() -> impl Strategy<Value = GeneratedContent> {
    (
        proptest::collection::vec(insight(), 0..4),
        proptest::collection::vec(insight(), 0..4),
        proptest::collection::vec(insight(), 0..4),
        "[A-Za-z ,.]{0,200}",
    )
        .prop_map(|(advantages, risks, recs, relevance)| GeneratedContent {
            advantages,
            risks,
            recommendations: recs
                .into_iter()
                .map(|i| Recommendation { title: i.headline, description: i.description })
                .collect(),
            case_study_relevance: relevance,
        })
}

fn target(stage: Stage) -> ReviewTarget {
    ReviewTarget {
        company_name: "Northwind".to_string(),
        industry: "Healthcare".to_string(),
        priority: "Reducing cost".to_string(),
        challenge: "Legacy systems".to_string(),
        stage,
    }
}

fn stage() -> impl Strategy<Value = Stage> {
    prop_oneof![Just(Stage::Observer), Just(Stage::Challenger), Just(Stage::Leader)]
}

// Property: the guardrail loop always terminates with structurally valid content
proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn guardrail_always_returns_valid_structure(initial in content(), stage in stage(), retries in 0u32..4) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let target = target(stage);
        let run = runtime.block_on(GuardrailEngine::new(retries).run(initial, &target, None));

        prop_assert!(run.attempts <= retries);
        prop_assert!(validate_structure(&run.content).passed);
        if run.outcome == GuardrailOutcome::Passed {
            prop_assert!(validate_content(&run.content, &target).passed);
        }
    }

    #[test]
    fn passing_content_names_company_only_first(initial in content(), stage in stage(), at in 0usize..3) {
        let mut initial = initial;
        if let Some(item) = initial.risks.get_mut(at) {
            item.description = format!("Northwind {}", item.description);
        }
        let target = target(stage);
        if validate_content(&initial, &target).passed {
            prop_assert!(validate_company_name(&initial, "Northwind").is_empty());
        }
    }
}
