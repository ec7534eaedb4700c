use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use super::catalog::RequirementCatalog;
use super::collaborators::Collaborators;
use super::domain::{CompanyInfo, DocumentId, UploadFile, WizardStep};
use super::session::{ClaimId, ClaimSession, DocumentSubmission, SessionSettings};
use super::views::ClaimView;
use super::wizard::Trigger;
use super::ClaimError;

/// Live claim sessions keyed by claim id.
pub struct ClaimRegistry {
    sessions: Mutex<HashMap<ClaimId, Arc<ClaimSession>>>,
    sequence: AtomicU64,
    catalog: RequirementCatalog,
    collaborators: Collaborators,
    settings: SessionSettings,
}

impl ClaimRegistry {
    pub fn new(
        catalog: RequirementCatalog,
        collaborators: Collaborators,
        settings: SessionSettings,
    ) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(1),
            catalog,
            collaborators,
            settings,
        }
    }

    /// Build a registry using the requirement service's catalog, or the standard one if the
    /// service cannot be reached.
    pub async fn bootstrap(collaborators: Collaborators, settings: SessionSettings) -> Self {
        let fetched = tokio::time::timeout(
            settings.collaborator_timeout,
            collaborators.requirements.requirements(),
        )
        .await;

        let catalog = match fetched {
            Ok(Ok(categories)) if !categories.is_empty() => {
                info!(categories = categories.len(), "loaded requirement catalog");
                RequirementCatalog::from_categories(categories)
            }
            Ok(Ok(_)) => RequirementCatalog::standard(),
            Ok(Err(error)) => {
                warn!(error = %error, "requirement catalog unavailable, using standard catalog");
                RequirementCatalog::standard()
            }
            Err(_) => {
                warn!("requirement catalog request timed out, using standard catalog");
                RequirementCatalog::standard()
            }
        };
        Self::new(catalog, collaborators, settings)
    }

    pub fn create(&self) -> Arc<ClaimSession> {
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        let claim_id = ClaimId(format!("claim-{id:06}"));
        let session = Arc::new(ClaimSession::new(
            claim_id.clone(),
            self.catalog.clone(),
            self.collaborators.clone(),
            self.settings.clone(),
        ));
        self.lock().insert(claim_id.clone(), session.clone());
        info!(claim = %claim_id, "claim session started");
        session
    }

    pub fn get(&self, claim_id: &str) -> Result<Arc<ClaimSession>, ClaimError> {
        self.lock()
            .get(&ClaimId(claim_id.to_string()))
            .cloned()
            .ok_or_else(|| ClaimError::not_found("claim", claim_id))
    }

    /// Drop a claim session. Requests already holding the session finish against it.
    pub fn remove(&self, claim_id: &str) -> Result<(), ClaimError> {
        let removed = self.lock().remove(&ClaimId(claim_id.to_string()));
        match removed {
            Some(_) => {
                info!(claim = %claim_id, "claim session closed");
                Ok(())
            }
            None => Err(ClaimError::not_found("claim", claim_id)),
        }
    }

    pub fn catalog(&self) -> &RequirementCatalog {
        &self.catalog
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<ClaimId, Arc<ClaimSession>>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// HTTP endpoints driving claim sessions.
pub fn claim_router(registry: Arc<ClaimRegistry>) -> Router {
    Router::new()
        .route("/api/v1/claims", post(create_handler))
        .route("/api/v1/catalog", get(catalog_handler))
        .route(
            "/api/v1/claims/:claim_id",
            get(view_handler).delete(close_handler),
        )
        .route("/api/v1/claims/:claim_id/advance", post(advance_handler))
        .route("/api/v1/claims/:claim_id/back", post(back_handler))
        .route("/api/v1/claims/:claim_id/jump", post(jump_handler))
        .route("/api/v1/claims/:claim_id/imports", post(imports_handler))
        .route("/api/v1/claims/:claim_id/exports", post(exports_handler))
        .route(
            "/api/v1/claims/:claim_id/analysis/retry",
            post(retry_analysis_handler),
        )
        .route(
            "/api/v1/claims/:claim_id/analysis/refresh",
            post(refresh_analysis_handler),
        )
        .route(
            "/api/v1/claims/:claim_id/documents",
            get(documents_handler).post(upload_document_handler),
        )
        .route(
            "/api/v1/claims/:claim_id/documents/refresh",
            post(refresh_documents_handler),
        )
        .route(
            "/api/v1/claims/:claim_id/documents/:document_id",
            delete(delete_document_handler),
        )
        .route(
            "/api/v1/claims/:claim_id/completeness",
            get(completeness_handler),
        )
        .route(
            "/api/v1/claims/:claim_id/suggestions",
            get(suggestions_handler),
        )
        .route(
            "/api/v1/claims/:claim_id/groups",
            get(groups_handler).post(create_group_handler),
        )
        .route(
            "/api/v1/claims/:claim_id/groups/from-suggestion",
            post(materialize_handler),
        )
        .route("/api/v1/claims/:claim_id/form", post(form_handler))
        .route(
            "/api/v1/claims/:claim_id/error/dismiss",
            post(dismiss_error_handler),
        )
        .with_state(registry)
}

#[derive(Debug, Deserialize)]
pub(crate) struct AdvanceRequest {
    pub trigger: Trigger,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JumpRequest {
    #[serde(default)]
    pub step: Option<WizardStep>,
    #[serde(default)]
    pub index: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FilePayload {
    pub filename: String,
    pub content_base64: String,
}

impl FilePayload {
    fn decode(self) -> Result<UploadFile, ClaimError> {
        let content = STANDARD
            .decode(self.content_base64.trim())
            .map_err(|error| ClaimError::validation("content_base64", error.to_string()))?;
        Ok(UploadFile::new(self.filename, content))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct DocumentPayload {
    #[serde(flatten)]
    pub file: FilePayload,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub tags: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SuggestionRequest {
    pub index: usize,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GroupRequest {
    pub name: String,
    pub document_ids: Vec<DocumentId>,
}

pub(crate) async fn create_handler(State(registry): State<Arc<ClaimRegistry>>) -> Response {
    let session = registry.create();
    (StatusCode::CREATED, axum::Json(session.view())).into_response()
}

pub(crate) async fn close_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
) -> Response {
    match registry.remove(&claim_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn catalog_handler(State(registry): State<Arc<ClaimRegistry>>) -> Response {
    let payload = json!({ "categories": registry.catalog().categories() });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

pub(crate) async fn view_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
) -> Response {
    match registry.get(&claim_id) {
        Ok(session) => (StatusCode::OK, axum::Json(session.view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn advance_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
    axum::Json(request): axum::Json<AdvanceRequest>,
) -> Response {
    let session = match registry.get(&claim_id) {
        Ok(session) => session,
        Err(error) => return error_response(error),
    };
    view_response(session.fire(request.trigger).await)
}

pub(crate) async fn back_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
) -> Response {
    let session = match registry.get(&claim_id) {
        Ok(session) => session,
        Err(error) => return error_response(error),
    };
    view_response(session.go_back().await)
}

pub(crate) async fn jump_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
    axum::Json(request): axum::Json<JumpRequest>,
) -> Response {
    let session = match registry.get(&claim_id) {
        Ok(session) => session,
        Err(error) => return error_response(error),
    };
    let outcome = match (request.step, request.index) {
        (Some(step), _) => session.jump_to(step).await,
        (None, Some(index)) => session.jump_to_index(index).await,
        (None, None) => Err(ClaimError::missing_field("step")),
    };
    view_response(outcome)
}

pub(crate) async fn imports_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
    axum::Json(payload): axum::Json<FilePayload>,
) -> Response {
    let session = match registry.get(&claim_id) {
        Ok(session) => session,
        Err(error) => return error_response(error),
    };
    match payload.decode() {
        Ok(file) => view_response(session.upload_imports(file).await),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn exports_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
    axum::Json(payload): axum::Json<FilePayload>,
) -> Response {
    let session = match registry.get(&claim_id) {
        Ok(session) => session,
        Err(error) => return error_response(error),
    };
    match payload.decode() {
        Ok(file) => view_response(session.upload_exports(file).await),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn retry_analysis_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
) -> Response {
    let session = match registry.get(&claim_id) {
        Ok(session) => session,
        Err(error) => return error_response(error),
    };
    view_response(session.retry_analysis().await)
}

pub(crate) async fn refresh_analysis_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
) -> Response {
    let session = match registry.get(&claim_id) {
        Ok(session) => session,
        Err(error) => return error_response(error),
    };
    view_response(session.refresh_analysis().await)
}

pub(crate) async fn documents_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
) -> Response {
    match registry.get(&claim_id) {
        Ok(session) => {
            let view = session.view();
            (StatusCode::OK, axum::Json(view.documents)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn upload_document_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
    axum::Json(payload): axum::Json<DocumentPayload>,
) -> Response {
    let session = match registry.get(&claim_id) {
        Ok(session) => session,
        Err(error) => return error_response(error),
    };
    let file = match payload.file.decode() {
        Ok(file) => file,
        Err(error) => return error_response(error),
    };
    let submission = DocumentSubmission {
        file,
        document_type: payload.document_type,
        tags: payload.tags,
    };
    view_response(session.upload_document(submission).await)
}

pub(crate) async fn refresh_documents_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
) -> Response {
    let session = match registry.get(&claim_id) {
        Ok(session) => session,
        Err(error) => return error_response(error),
    };
    view_response(session.refresh_documents().await)
}

pub(crate) async fn delete_document_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path((claim_id, document_id)): Path<(String, String)>,
) -> Response {
    let session = match registry.get(&claim_id) {
        Ok(session) => session,
        Err(error) => return error_response(error),
    };
    view_response(session.delete_document(&DocumentId(document_id)).await)
}

pub(crate) async fn completeness_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
) -> Response {
    match registry.get(&claim_id) {
        Ok(session) => (StatusCode::OK, axum::Json(session.document_status())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn suggestions_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
) -> Response {
    match registry.get(&claim_id) {
        Ok(session) => {
            let payload = json!({ "suggestions": session.suggestions() });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn groups_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
) -> Response {
    match registry.get(&claim_id) {
        Ok(session) => {
            let payload = json!({ "groups": session.groups() });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_group_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
    axum::Json(request): axum::Json<GroupRequest>,
) -> Response {
    let outcome = registry
        .get(&claim_id)
        .and_then(|session| session.create_group(&request.name, &request.document_ids));
    match outcome {
        Ok(group) => (StatusCode::CREATED, axum::Json(group)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn materialize_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
    axum::Json(request): axum::Json<SuggestionRequest>,
) -> Response {
    let outcome = registry
        .get(&claim_id)
        .and_then(|session| session.materialize_suggestion(request.index));
    match outcome {
        Ok(group) => (StatusCode::CREATED, axum::Json(group)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn form_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
    axum::Json(company): axum::Json<CompanyInfo>,
) -> Response {
    let session = match registry.get(&claim_id) {
        Ok(session) => session,
        Err(error) => return error_response(error),
    };
    view_response(session.generate_form(company).await)
}

pub(crate) async fn dismiss_error_handler(
    State(registry): State<Arc<ClaimRegistry>>,
    Path(claim_id): Path<String>,
) -> Response {
    match registry.get(&claim_id) {
        Ok(session) => (StatusCode::OK, axum::Json(session.dismiss_error())).into_response(),
        Err(error) => error_response(error),
    }
}

fn view_response(outcome: Result<ClaimView, ClaimError>) -> Response {
    match outcome {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) fn error_response(error: ClaimError) -> Response {
    let status = match &error {
        ClaimError::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        ClaimError::NotFound { .. } => StatusCode::NOT_FOUND,
        ClaimError::NavigationBlocked { .. }
        | ClaimError::TransitionUnavailable { .. }
        | ClaimError::StepMismatch { .. }
        | ClaimError::StaleData { .. } => StatusCode::CONFLICT,
        ClaimError::Collaborator(_) => StatusCode::BAD_GATEWAY,
    };

    let payload = match &error {
        ClaimError::Validation { field, message } => json!({
            "error": error.to_string(),
            "field": field,
            "message": message,
        }),
        ClaimError::NavigationBlocked { from, to, reason } => json!({
            "error": error.to_string(),
            "from": from,
            "to": to,
            "reason": reason,
        }),
        _ => json!({ "error": error.to_string() }),
    };
    (status, axum::Json(payload)).into_response()
}
