//! Property and scenario tests for the extraction pipeline, the migrator
//! and the HTTP surface.
//!
//! 1. Output always carries every declared field
//! 2. Re-running the pipeline on its own output changes nothing
//! 3. Backfill never fills without bullet evidence
//! 4. Locked values come out exactly as they went in
//! 5. Equivalent legacy snapshots migrate to identical profiles

use std::collections::BTreeMap;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use proptest::prelude::*;
use serde_json::{json, Value};
use tower::ServiceExt;

use vacancy_api::config::Config;
use vacancy_api::extraction::{
    extract_profile, ExtractionOutcome, ExtractionRequest, OmissionLog, PipelineOptions,
    RecoveryStatus,
};
use vacancy_api::migration::migrate_profile;
use vacancy_api::profile::schema::declared_paths;
use vacancy_api::profile::{FieldPath, CURRENT_SCHEMA_VERSION};
use vacancy_api::routes::build_router;
use vacancy_api::state::AppState;

fn run(request: &ExtractionRequest) -> ExtractionOutcome {
    extract_profile(request, &PipelineOptions::default(), &OmissionLog::new())
        .expect("pipeline should not fail on a parsable payload")
}

fn path(raw: &str) -> FieldPath {
    FieldPath::parse(raw).unwrap()
}

// ============================================================================
// Strategies
// ============================================================================

/// Declared paths, a few aliases, and some junk keys.
fn key_strategy() -> impl Strategy<Value = String> {
    let declared: Vec<String> = declared_paths().map(|(p, _)| p.to_string()).collect();
    prop_oneof![
        4 => proptest::sample::select(declared),
        1 => proptest::sample::select(vec![
            "position.title".to_string(),
            "location.city".to_string(),
            "requirements.skills".to_string(),
            "tasks".to_string(),
            "legacy.notes".to_string(),
            "company.founded".to_string(),
            "schema_version".to_string(),
        ]),
    ]
}

fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-50i64..5000).prop_map(Value::from),
        (-1000.0f64..100_000.0).prop_map(Value::from),
        "[A-Za-z0-9 .,@-]{0,24}".prop_map(Value::from),
        Just(json!("jobs@acme.io")),
        Just(json!("remote")),
        Just(json!("Senior")),
        Just(json!("3 rounds")),
    ]
}

fn value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        3 => scalar_strategy(),
        1 => prop::collection::vec(scalar_strategy(), 0..4).prop_map(Value::Array),
        1 => prop::collection::btree_map("[a-z]{1,8}", scalar_strategy(), 0..3)
            .prop_map(|m| Value::Object(m.into_iter().collect())),
    ]
}

fn document_strategy() -> impl Strategy<Value = Value> {
    prop::collection::btree_map(key_strategy(), value_strategy(), 0..10).prop_map(|fields| {
        let mut doc = json!({});
        for (key, value) in fields {
            if let Some(p) = FieldPath::parse(&key) {
                p.set(&mut doc, value);
            }
        }
        doc
    })
}

/// Prose without bullet markers.
fn prose_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec("[a-z][a-z ]{0,50}", 0..12).prop_map(|lines| lines.join("\n"))
}

fn locked_strategy() -> impl Strategy<Value = (String, Value)> {
    proptest::sample::select(vec![
        ("company.name".to_string(), json!("Locked GmbH")),
        ("company.contact_email".to_string(), json!("hr@locked.example")),
        ("position.team_size".to_string(), json!(7)),
        ("employment.work_policy".to_string(), json!("hybrid")),
        ("responsibilities.items".to_string(), json!(["Keep this"])),
        ("requirements.hard_skills_required".to_string(), json!([])),
    ])
}

// ============================================================================
// Pipeline properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn every_declared_field_is_present(doc in document_strategy()) {
        let out = run(&ExtractionRequest::new(doc.to_string()));
        let document = out.profile.to_document();
        for (p, _) in declared_paths() {
            prop_assert!(p.get(&document).is_some(), "{} missing", p);
        }
        prop_assert_eq!(out.profile.schema_version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn pipeline_is_idempotent(doc in document_strategy(), prose in prose_strategy()) {
        let mut first_request = ExtractionRequest::new(doc.to_string());
        first_request.source_text = Some(prose.clone());
        let first = run(&first_request);

        let mut second_request = ExtractionRequest::new(serde_json::to_string(&first.profile).unwrap());
        second_request.source_text = Some(prose);
        let second = run(&second_request);

        prop_assert_eq!(&second.profile, &first.profile);
        prop_assert_eq!(second.metadata.recovery_status, RecoveryStatus::Clean);
        for issue in &second.issues {
            prop_assert!(first.issues.contains(issue), "new issue on second run: {}", issue);
        }
    }

    #[test]
    fn backfill_needs_bullet_evidence(prose in prose_strategy()) {
        let mut request = ExtractionRequest::new("{}");
        request.source_text = Some(prose);
        let out = run(&request);
        prop_assert!(out.profile.responsibilities.items.is_empty());
        prop_assert!(out.profile.requirements.hard_skills_required.is_empty());
        prop_assert!(out.profile.requirements.soft_skills_required.is_empty());
        prop_assert!(!out.issues.iter().any(|i| i.ends_with("filled via heuristics")));
        prop_assert!(!out.recovered);
    }

    #[test]
    fn locked_values_survive(doc in document_strategy(), (key, value) in locked_strategy()) {
        let mut request = ExtractionRequest::new(doc.to_string());
        request.source_text = Some(
            "Responsibilities:\n- Ship features\n\nRequirements:\n- Rust\n".to_string(),
        );
        request.title_hint = Some("Hinted Title".to_string());
        request.company_hint = Some("Hinted Co".to_string());
        request.locked_fields.insert(key.clone(), value.clone());

        let out = run(&request);
        let document = out.profile.to_document();
        prop_assert_eq!(path(&key).get(&document), Some(&value));
        prop_assert_eq!(out.metadata.fields[&key].score, Some(1.0));
    }
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_prose_wrapped_payload() {
    let out = run(&ExtractionRequest::new(
        "Here is what I found:\n{\"company\":{\"name\":\"ACME\"}}\nHope that helps!",
    ));
    assert_eq!(out.metadata.recovery_status, RecoveryStatus::Repaired);
    assert_eq!(out.profile.company.name.as_deref(), Some("ACME"));
    assert!(out.recovered);
}

#[test]
fn test_empty_payload_reports_missing_values() {
    let out = run(&ExtractionRequest::new("{}"));
    assert_eq!(out.profile.company.name, None);
    assert_eq!(out.profile.company.contact_email, "");
    assert_eq!(out.profile.location.primary_city, "");
    for field in ["company.name", "company.contact_email", "location.primary_city"] {
        assert!(
            out.issues.contains(&format!("{field}: missing value")),
            "{field} not reported: {:?}",
            out.issues
        );
    }
}

#[test]
fn test_interview_stage_lists_become_counts() {
    let out = run(&ExtractionRequest::new(r#"{"process": {"interview_stages": []}}"#));
    assert_eq!(out.profile.process.interview_stages, None);

    let out = run(&ExtractionRequest::new(
        r#"{"process": {"interview_stages": ["Phone", "Onsite"]}}"#,
    ));
    assert_eq!(out.profile.process.interview_stages, Some(2));
    assert!(out.recovered);
    assert_eq!(
        out.metadata.fields["process.interview_stages"].note.as_deref(),
        Some("schema_repair")
    );
}

#[test]
fn test_responsibilities_backfilled_from_source_text() {
    let mut request = ExtractionRequest::new(r#"{"responsibilities": {"items": []}}"#);
    request.source_text = Some(
        "About the role\n\nResponsibilities:\n- Build the ingestion service\n- Operate it in production\n- Write runbooks\n\nApply by email.\n"
            .to_string(),
    );
    let out = run(&request);
    assert_eq!(
        out.profile.responsibilities.items,
        vec![
            "Build the ingestion service",
            "Operate it in production",
            "Write runbooks"
        ]
    );
    assert!(out
        .issues
        .contains(&"responsibilities.items: filled via heuristics".to_string()));
    assert_eq!(
        out.metadata.fields["responsibilities.items"].note.as_deref(),
        Some("heuristic_fill")
    );
    assert!(out.recovered);
}

#[test]
fn test_v1_snapshot_migrates_to_current() {
    let out = migrate_profile(json!({"schema_version": 1, "company": {"name": "Acme"}})).unwrap();
    assert_eq!(out.profile.schema_version, CURRENT_SCHEMA_VERSION);
    assert_eq!(out.profile.business_context.org_name, "Acme");
    let document = out.profile.to_document();
    for (p, _) in declared_paths() {
        assert!(p.get(&document).is_some(), "{p} missing after migration");
    }
}

#[test]
fn test_equivalent_legacy_snapshots_migrate_identically() {
    let v1 = json!({
        "company": {"name": "Nordwind"},
        "position": {"title": "Site Reliability Engineer"},
        "location": {"city": "Bremen"},
        "responsibilities": ["Keep the lights on"],
        "requirements": {"skills": ["Terraform", "English C1"]},
        "compensation": {"salary_range": "60000 to 72000"}
    });
    let v2 = json!({
        "schema_version": 2,
        "company": {"name": "Nordwind"},
        "position": {"job_title": "Site Reliability Engineer"},
        "location": {"primary_city": "Bremen"},
        "responsibilities": {"items": ["Keep the lights on"]},
        "business_context": {"org_name": "Nordwind"},
        "requirements": {"skills": ["Terraform", "English C1"]},
        "compensation": {"salary_range": {"min": 60000, "max": 72000}}
    });
    let a = migrate_profile(v1).unwrap();
    let b = migrate_profile(v2).unwrap();
    assert_eq!(a.profile, b.profile);
    assert_eq!(a.from_version, 1);
    assert_eq!(b.from_version, 2);
}

#[test]
fn test_locked_value_overrides_model_and_hint() {
    let mut request = ExtractionRequest::new(r#"{"position": {"job_title": "Model Title"}}"#);
    request.title_hint = Some("Hint Title".to_string());
    request
        .locked_fields
        .insert("position.job_title".to_string(), json!("Locked Title"));
    let out = run(&request);
    assert_eq!(out.profile.position.job_title, "Locked Title");
}

#[test]
fn test_undeclared_locked_path_is_ignored() {
    let mut locked = BTreeMap::new();
    locked.insert("company.founded".to_string(), json!(1999));
    let request = ExtractionRequest {
        raw_output: "{}".to_string(),
        locked_fields: locked,
        ..ExtractionRequest::default()
    };
    let out = run(&request);
    assert!(out
        .issues
        .contains(&"ignored locked value for company.founded".to_string()));
}

// ============================================================================
// HTTP surface
// ============================================================================

fn app(config: Config) -> axum::Router {
    build_router(AppState::new(config))
}

async fn post_json(router: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_extract_endpoint_returns_profile_and_metadata() {
    let (status, body) = post_json(
        app(Config::default()),
        "/api/v1/profiles/extract",
        json!({"raw_output": "{\"company\": {\"name\": \"ACME\"}}"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["request_id"].is_string());
    assert_eq!(body["profile"]["company"]["name"], json!("ACME"));
    assert_eq!(body["recovered"], json!(false));
    assert_eq!(body["metadata"]["recovery_status"], json!("clean"));
    assert!(body["issues"].is_array());
}

#[tokio::test]
async fn test_extract_endpoint_rejects_unparsable_output() {
    let (status, body) = post_json(
        app(Config::default()),
        "/api/v1/profiles/extract",
        json!({"raw_output": "no structured data here"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], json!("UNPARSABLE_PAYLOAD"));
}

#[tokio::test]
async fn test_extract_endpoint_enforces_payload_limit() {
    let config = Config {
        max_payload_bytes: 16,
        ..Config::default()
    };
    let (status, body) = post_json(
        app(config),
        "/api/v1/profiles/extract",
        json!({"raw_output": "{\"company\": {\"name\": \"A rather long company name\"}}"}),
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body["error"]["code"], json!("PAYLOAD_TOO_LARGE"));
}

#[tokio::test]
async fn test_migrate_endpoint_refuses_future_versions() {
    let (status, body) = post_json(
        app(Config::default()),
        "/api/v1/profiles/migrate",
        json!({"schema_version": CURRENT_SCHEMA_VERSION + 1}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], json!("FUTURE_SCHEMA_VERSION"));
}

#[tokio::test]
async fn test_migrate_endpoint_upgrades_snapshot() {
    let (status, body) = post_json(
        app(Config::default()),
        "/api/v1/profiles/migrate",
        json!({"schema_version": 1, "company": {"name": "Acme"}}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["from_version"], json!(1));
    assert_eq!(body["profile"]["business_context"]["org_name"], json!("Acme"));
    assert_eq!(body["profile"]["schema_version"], json!(CURRENT_SCHEMA_VERSION));
}

#[tokio::test]
async fn test_skeleton_endpoint() {
    let response = app(Config::default())
        .oneshot(
            Request::builder()
                .uri("/api/v1/profiles/skeleton")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["company"]["contact_email"], json!(""));
    assert_eq!(body["schema_version"], json!(CURRENT_SCHEMA_VERSION));
}
