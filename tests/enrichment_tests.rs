/// Scenario tests for the enrichment service
/// Covers the documented example scenarios plus the HTTP routes in mock mode
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use std::sync::Arc;
use tower::ServiceExt;

use rad_enrichment_api::config::Config;
use rad_enrichment_api::context_inference::{infer_it_environment, infer_urgency_level};
use rad_enrichment_api::guardrails::validate_structure;
use rad_enrichment_api::handlers::{build_router, AppState};
use rad_enrichment_api::models::{
    ApolloPerson, BusinessPriority, GeneratedContent, Insight, ItEnvironment, NormalizedProfile,
    PdlCompany, PrimaryChallenge, RawSourcePayload, SourceData, SourcePayloads, Stage,
    UrgencyLevel,
};
use rad_enrichment_api::pipeline::EnrichmentPipeline;
use rad_enrichment_api::reference_content::select_case_study;
use rad_enrichment_api::resolver::{estimate_employee_count, resolve_company_name};
use rad_enrichment_api::store::MemoryProfileStore;

// ============ Example scenarios ============

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
fn test_fast_growth_is_high_urgency() {
    let profile = NormalizedProfile {
        employee_growth_rate: Some(0.55),
        ..Default::default()
    };
    assert_eq!(infer_urgency_level(&profile), UrgencyLevel::High);
}

#[test]
fn test_display_name_wins_company_name() {
    let payloads: SourcePayloads = vec![
        RawSourcePayload::fetched(SourceData::PdlCompany(PdlCompany {
            display_name: Some("Google".to_string()),
            name: Some("Alphabet Inc.".to_string()),
            ..Default::default()
        })),
        RawSourcePayload::fetched(SourceData::Apollo(ApolloPerson {
            company_name: Some("Google Inc".to_string()),
            ..Default::default()
        })),
    ]
    .into_iter()
    .collect();
    assert_eq!(resolve_company_name(&payloads, "google.com"), "Google");
}

#[test]
fn test_employee_range_estimates() {
    assert_eq!(estimate_employee_count("1001-5000"), Some(3000));
    assert_eq!(estimate_employee_count("10001+"), Some(15000));
}

#[test]
fn test_banned_phrases_fail_validation() {
    let content = GeneratedContent {
        advantages: vec![Insight {
            headline: "Revolutionary gains in today's landscape".to_string(),
            description: "Placeholder".to_string(),
        }],
        ..Default::default()
    };
    let result = validate_structure(&content);
    assert!(!result.passed);
    assert!(result.failures.iter().any(|f| f.field == "advantages[0].headline"
        && (f.reason.contains("revolutionary") || f.reason.contains("today's landscape"))));
}

#[test]
fn test_cost_priority_selects_smurfit_westrock() {
    for stage in [Stage::Observer, Stage::Challenger, Stage::Leader] {
        for industry in ["technology", "healthcare", "retail"] {
            let study = select_case_study(
                stage,
                BusinessPriority::ReducingCost,
                industry,
                PrimaryChallenge::LegacySystems,
            );
            assert!(study.name.contains("Smurfit Westrock"), "{stage} / {industry}");
        }
    }
}

// ============ Routes in mock mode ============

fn app() -> axum::Router {
    let config = Config::default();
    let pipeline =
        EnrichmentPipeline::from_config(&config, Arc::new(MemoryProfileStore::new())).unwrap();
    build_router(Arc::new(AppState::new(Arc::new(pipeline))), false).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health_routes() {
    let app = app();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(Request::builder().uri("/rad/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["service"], "rad_enrichment");
}

#[tokio::test]
async fn test_enrich_then_fetch_profile() {
    let app = app();

    let response = app
        .clone()
        .oneshot(post_json(
            "/rad/enrich",
            serde_json::json!({
                "email": "  Jane@Acme.com ",
                "persona": "executive",
                "businessPriority": "preparing_ai",
                "goal": "building_case"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["status"], "completed");
    assert_eq!(body["profile"]["email"], "jane@acme.com");
    // every provider is unconfigured, so nothing resolves
    assert_eq!(body["profile"]["data_quality_score"], 0.0);
    assert_eq!(body["context"]["business_priority"], "preparing_ai");
    assert_eq!(body["personalization"]["model_used"], "mock");
    assert_eq!(body["executive_review"]["persona"], "BDM");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/rad/profile/jane@acme.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let record = json_body(response).await;
    assert_eq!(record["email"], "jane@acme.com");
}

#[tokio::test]
async fn test_missing_profile_message() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/rad/profile/ghost@acme.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = json_body(response).await;
    assert_eq!(
        body["error"],
        "No profile found for ghost@acme.com. Run POST /rad/enrich first."
    );
}

#[tokio::test]
async fn test_concurrent_duplicates_are_short_circuited() {
    let app = app();
    let request = || post_json("/rad/enrich", serde_json::json!({"email": "dup@acme.com"}));

    let (a, b) = tokio::join!(app.clone().oneshot(request()), app.clone().oneshot(request()));
    let mut statuses = vec![a.unwrap().status(), b.unwrap().status()];
    statuses.sort();
    assert_eq!(statuses, vec![StatusCode::OK, StatusCode::ACCEPTED]);
}

#[tokio::test]
async fn test_batch_route_reports_each_email() {
    let response = app()
        .oneshot(post_json(
            "/rad/enrich/batch",
            serde_json::json!({"emails": ["a@acme.com", "b@acme.com", "not-an-email"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["total"], 3);
    assert_eq!(body["completed"], 2);
    assert_eq!(body["results"][2]["status"], "failed");
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let response = app()
        .oneshot(post_json("/rad/enrich/batch", serde_json::json!({"emails": []})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
