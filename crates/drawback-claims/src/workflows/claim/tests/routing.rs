use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;

use crate::workflows::claim::{
    claim_router, ClaimError, ClaimRegistry, Collaborators, RequirementCatalog, SessionSettings,
};

fn registry() -> ClaimRegistry {
    ClaimRegistry::new(
        RequirementCatalog::standard(),
        Collaborators::from_backend(Arc::new(ScriptedBackend::default())),
        SessionSettings::default(),
    )
}

fn router() -> Router {
    claim_router(Arc::new(registry()))
}

fn post_json(uri: &str, payload: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("router responds");
    let status = response.status();
    (status, read_json_body(response).await)
}

async fn create_claim(router: &Router) -> String {
    let (status, body) = send(
        router,
        Request::post("/api/v1/claims")
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["claim_id"].as_str().expect("claim id").to_string()
}

async fn advance(router: &Router, claim: &str, trigger: &str) -> (StatusCode, Value) {
    send(
        router,
        post_json(
            &format!("/api/v1/claims/{claim}/advance"),
            json!({ "trigger": trigger }),
        ),
    )
    .await
}

#[tokio::test]
async fn creating_a_claim_returns_the_welcome_view() {
    let router = router();
    let (status, body) = send(
        &router,
        Request::post("/api/v1/claims")
            .body(Body::empty())
            .expect("request"),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["claim_id"], "claim-000001");
    assert_eq!(body["step"], "welcome");
    assert_eq!(body["progress_percent"], 0);
    assert_eq!(body["steps"].as_array().map(Vec::len), Some(8));
}

#[tokio::test]
async fn unknown_claims_are_not_found() {
    let router = router();
    let (status, body) = send(
        &router,
        Request::get("/api/v1/claims/claim-999999")
            .body(Body::empty())
            .expect("request"),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().is_some());
}

#[test]
fn removing_a_claim_releases_its_session() {
    let registry = registry();
    assert!(registry.is_empty());
    let first = registry.create();
    let second = registry.create();
    assert_eq!(registry.len(), 2);

    registry.remove(&first.id().0).expect("known claim");
    assert_eq!(registry.len(), 1);
    assert!(registry.get(&first.id().0).is_err());
    assert!(registry.get(&second.id().0).is_ok());
    assert!(matches!(
        registry.remove(&first.id().0),
        Err(ClaimError::NotFound { .. })
    ));
}

#[tokio::test]
async fn closed_claims_are_forgotten() {
    let router = router();
    let claim = create_claim(&router).await;
    let close = || {
        Request::delete(format!("/api/v1/claims/{claim}"))
            .body(Body::empty())
            .expect("request")
    };

    let response = router.clone().oneshot(close()).await.expect("router responds");
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let (status, _) = send(
        &router,
        Request::get(format!("/api/v1/claims/{claim}"))
            .body(Body::empty())
            .expect("request"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&router, close()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().is_some());
}

#[tokio::test]
async fn catalog_lists_the_requirement_categories() {
    let router = router();
    let (status, body) = send(
        &router,
        Request::get("/api/v1/catalog")
            .body(Body::empty())
            .expect("request"),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["categories"].as_array().map(Vec::len), Some(5));
}

#[tokio::test]
async fn blocked_and_unavailable_moves_are_conflicts() {
    let router = router();
    let claim = create_claim(&router).await;

    let (status, _) = advance(&router, &claim, "skip_exports").await;
    assert_eq!(status, StatusCode::CONFLICT);

    advance(&router, &claim, "start").await;
    advance(&router, &claim, "continue").await;
    let (status, body) = advance(&router, &claim, "continue").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["from"], "upload_imports");
    assert_eq!(body["to"], "upload_exports");
    assert_eq!(body["reason"], "an import dataset must be uploaded first");
}

#[tokio::test]
async fn malformed_payloads_are_unprocessable() {
    let router = router();
    let claim = create_claim(&router).await;

    let (status, body) = send(
        &router,
        post_json(&format!("/api/v1/claims/{claim}/jump"), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "step");

    let (status, body) = send(
        &router,
        post_json(
            &format!("/api/v1/claims/{claim}/imports"),
            json!({ "filename": "imports.csv", "content_base64": "not base64!" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "content_base64");
}

#[tokio::test]
async fn import_upload_and_skip_reach_a_completed_analysis() {
    let router = router();
    let claim = create_claim(&router).await;
    advance(&router, &claim, "start").await;
    advance(&router, &claim, "skip_instructions").await;

    let (status, body) = send(
        &router,
        post_json(
            &format!("/api/v1/claims/{claim}/imports"),
            json!({
                "filename": "imports_q1.csv",
                "content_base64": STANDARD.encode(IMPORTS_CSV),
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step"], "upload_exports");

    let (status, body) = advance(&router, &claim, "skip_exports").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step"], "analysis");
    assert_eq!(body["import_only"], true);
    assert_eq!(body["analysis"]["eligible_transactions"], 3);

    let (status, body) = send(
        &router,
        post_json(&format!("/api/v1/claims/{claim}/jump"), json!({ "index": 0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["step"], "welcome");
}

#[tokio::test]
async fn groups_reject_unknown_documents() {
    let router = router();
    let claim = create_claim(&router).await;

    let (status, body) = send(
        &router,
        post_json(
            &format!("/api/v1/claims/{claim}/groups"),
            json!({ "name": "Q1", "document_ids": ["doc-404"] }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "document_ids");

    let (status, _) = send(
        &router,
        post_json(
            &format!("/api/v1/claims/{claim}/groups/from-suggestion"),
            json!({ "index": 0 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn form_generation_outside_its_step_is_a_conflict() {
    let router = router();
    let claim = create_claim(&router).await;

    let (status, _) = send(
        &router,
        post_json(
            &format!("/api/v1/claims/{claim}/form"),
            serde_json::to_value(company()).expect("company json"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}
