use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::backends::offline::detect_document_type;
use crate::workflows::claim::{
    evaluate, AnalysisReference, AnalysisResult, AnalysisService, ClaimId, ClaimSession,
    ClaimWorkflow, CollaboratorError, Collaborators, CompanyInfo, CompletenessReport,
    DocumentFilter, DocumentId, DocumentRequirementCategory, DocumentScope, DocumentStore,
    DocumentUpload, ExportId, FormGenerator, FormReference, ImportId, RequirementCatalog,
    RequirementService, SessionSettings, Trigger, UploadFile, UploadedDocument,
};

pub(super) fn ts(minute: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0)
        .single()
        .expect("valid timestamp")
        + chrono::Duration::minutes(minute)
}

pub(super) fn import_id(value: &str) -> ImportId {
    ImportId(value.to_string())
}

pub(super) fn export_id(value: &str) -> ExportId {
    ExportId(value.to_string())
}

pub(super) fn doc_id(value: &str) -> DocumentId {
    DocumentId(value.to_string())
}

pub(super) fn document(id: &str, document_type: &str, minute: i64) -> UploadedDocument {
    UploadedDocument {
        id: doc_id(id),
        document_type: document_type.to_string(),
        filename: format!("{id}.pdf"),
        uploaded_at: ts(minute),
        import_id: None,
        export_id: None,
        tags: None,
        file_size: 1024,
    }
}

pub(super) fn linked(
    id: &str,
    document_type: &str,
    minute: i64,
    import: Option<&str>,
    export: Option<&str>,
) -> UploadedDocument {
    UploadedDocument {
        import_id: import.map(import_id),
        export_id: export.map(export_id),
        ..document(id, document_type, minute)
    }
}

/// One document per category the form generator cannot produce, linked to the import.
pub(super) fn supporting_documents(import: &str) -> Vec<UploadedDocument> {
    vec![
        linked("doc-duty", "cbp_7552", 1, Some(import), None),
        linked("doc-entry", "cbp_7501", 2, Some(import), None),
        linked("doc-clearance", "customs_clearance", 3, Some(import), None),
        linked("doc-bol", "bill_of_lading", 4, Some(import), None),
    ]
}

/// Supporting documents plus a drawback entry form: every standard category satisfied.
pub(super) fn complete_documents(import: &str) -> Vec<UploadedDocument> {
    let mut documents = supporting_documents(import);
    documents.push(linked("doc-7551", "cbp_7551", 5, Some(import), None));
    documents
}

pub(super) fn analysis_result(eligible: u32, refund: f64) -> AnalysisResult {
    AnalysisResult {
        eligible_transactions: eligible,
        potential_refund: refund,
        matches: Vec::new(),
        unmatched_imports: Vec::new(),
        results_file: Some("results/drawback_analysis.csv".to_string()),
    }
}

pub(super) fn company() -> CompanyInfo {
    CompanyInfo {
        company_name: "Harbor Trading Co".to_string(),
        company_address: "12 Pier Road".to_string(),
        company_city: "Long Beach".to_string(),
        company_state: "CA".to_string(),
        company_zip: "90802".to_string(),
        company_ein: "12-3456789".to_string(),
        contact_name: "Dana Ortiz".to_string(),
        contact_phone: "555-0100".to_string(),
        contact_email: "dana@harbor.example".to_string(),
    }
}

pub(super) fn workflow() -> ClaimWorkflow {
    ClaimWorkflow::new(RequirementCatalog::standard())
}

/// Workflow waiting on the export dataset with `import` recorded.
pub(super) fn at_upload_exports(import: &str) -> ClaimWorkflow {
    let mut workflow = workflow();
    workflow.fire(Trigger::Start).expect("start");
    workflow.fire(Trigger::Continue).expect("leave instructions");
    workflow
        .import_received(import_id(import))
        .expect("import accepted");
    workflow
}

/// Import-only workflow sitting on the analysis step with the analysis applied.
pub(super) fn analyzed_import_only(import: &str) -> ClaimWorkflow {
    let mut workflow = at_upload_exports(import);
    let transition = workflow.fire(Trigger::SkipExports).expect("skip exports");
    for effect in transition.effects {
        if let crate::workflows::claim::Effect::Analyze(key) = effect {
            workflow
                .apply_analysis(key, Ok(analysis_result(3, 120.50)))
                .expect("current analysis");
        }
    }
    workflow
}

pub(super) const IMPORTS_CSV: &str = "entry_number,product_id,import_date,quantity,duty_paid\n\
E-1001,WIDGET-A,2024-01-15,100,50.00\n\
E-1002,WIDGET-B,2024-02-20,40,40.00\n\
E-1003,WIDGET-C,2024-03-05,25,31.72\n";

pub(super) const EXPORTS_CSV: &str = "export_reference,product_id,export_date,quantity,destination\n\
X-2001,WIDGET-A,2024-04-01,60,CA\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AnalysisMode {
    Immediate,
    /// Yield once before answering so concurrent callers interleave.
    YieldOnce,
    Hang,
}

/// Scriptable stand-in for every collaborator.
pub(super) struct ScriptedBackend {
    pub analysis_calls: AtomicUsize,
    pub form_calls: AtomicUsize,
    analysis_mode: Mutex<AnalysisMode>,
    analysis_outcome: Mutex<Result<AnalysisResult, CollaboratorError>>,
    status_outcome: Mutex<Option<Result<CompletenessReport, CollaboratorError>>>,
    documents: Mutex<Vec<UploadedDocument>>,
    sequence: AtomicU64,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self {
            analysis_calls: AtomicUsize::new(0),
            form_calls: AtomicUsize::new(0),
            analysis_mode: Mutex::new(AnalysisMode::Immediate),
            analysis_outcome: Mutex::new(Ok(analysis_result(3, 120.50))),
            status_outcome: Mutex::new(None),
            documents: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(0),
        }
    }
}

impl ScriptedBackend {
    pub(super) fn with_mode(self, mode: AnalysisMode) -> Self {
        *self.analysis_mode.lock().expect("mode lock") = mode;
        self
    }

    pub(super) fn with_analysis(self, outcome: Result<AnalysisResult, CollaboratorError>) -> Self {
        *self.analysis_outcome.lock().expect("outcome lock") = outcome;
        self
    }

    pub(super) fn set_analysis(&self, outcome: Result<AnalysisResult, CollaboratorError>) {
        *self.analysis_outcome.lock().expect("outcome lock") = outcome;
    }

    pub(super) fn set_status(&self, outcome: Result<CompletenessReport, CollaboratorError>) {
        *self.status_outcome.lock().expect("status lock") = Some(outcome);
    }

    pub(super) fn analysis_calls(&self) -> usize {
        self.analysis_calls.load(Ordering::SeqCst)
    }

    pub(super) fn stored_documents(&self) -> Vec<UploadedDocument> {
        self.documents.lock().expect("documents lock").clone()
    }
}

#[async_trait]
impl AnalysisService for ScriptedBackend {
    async fn analyze(
        &self,
        _import_id: &ImportId,
        _export_id: Option<&ExportId>,
    ) -> Result<AnalysisResult, CollaboratorError> {
        self.analysis_calls.fetch_add(1, Ordering::SeqCst);
        let mode = *self.analysis_mode.lock().expect("mode lock");
        match mode {
            AnalysisMode::Immediate => {}
            AnalysisMode::YieldOnce => tokio::task::yield_now().await,
            AnalysisMode::Hang => std::future::pending::<()>().await,
        }
        self.analysis_outcome.lock().expect("outcome lock").clone()
    }
}

#[async_trait]
impl DocumentStore for ScriptedBackend {
    async fn list_documents(
        &self,
        filter: &DocumentFilter,
    ) -> Result<Vec<UploadedDocument>, CollaboratorError> {
        let scope = DocumentScope::for_claim(filter.import_id.clone(), filter.export_id.clone());
        Ok(self
            .documents
            .lock()
            .expect("documents lock")
            .iter()
            .filter(|document| scope.includes(document))
            .cloned()
            .collect())
    }

    async fn upload(&self, upload: DocumentUpload) -> Result<UploadedDocument, CollaboratorError> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let document = UploadedDocument {
            id: DocumentId(format!("doc-{sequence:03}")),
            document_type: upload.document_type,
            filename: upload.file.filename,
            uploaded_at: ts(sequence as i64),
            import_id: upload.import_id,
            export_id: upload.export_id,
            tags: upload.tags,
            file_size: upload.file.content.len() as u64,
        };
        self.documents
            .lock()
            .expect("documents lock")
            .push(document.clone());
        Ok(document)
    }

    async fn delete(&self, document_id: &DocumentId) -> Result<(), CollaboratorError> {
        let mut documents = self.documents.lock().expect("documents lock");
        let before = documents.len();
        documents.retain(|document| &document.id != document_id);
        if documents.len() == before {
            return Err(CollaboratorError::NotFound(format!("document {document_id}")));
        }
        Ok(())
    }

    async fn detect_type(&self, file: &UploadFile) -> Result<Option<String>, CollaboratorError> {
        Ok(detect_document_type(&file.filename).map(str::to_string))
    }
}

#[async_trait]
impl RequirementService for ScriptedBackend {
    async fn requirements(&self) -> Result<Vec<DocumentRequirementCategory>, CollaboratorError> {
        Ok(RequirementCatalog::standard().categories().to_vec())
    }

    async fn status(&self, scope: &DocumentScope) -> Result<CompletenessReport, CollaboratorError> {
        let scripted = self.status_outcome.lock().expect("status lock").clone();
        match scripted {
            Some(outcome) => outcome,
            None => {
                let documents = self.stored_documents();
                Ok(evaluate(
                    RequirementCatalog::standard().categories(),
                    &documents,
                    scope,
                ))
            }
        }
    }
}

#[async_trait]
impl FormGenerator for ScriptedBackend {
    async fn generate(
        &self,
        company: &CompanyInfo,
        analysis: &AnalysisReference,
    ) -> Result<FormReference, CollaboratorError> {
        self.form_calls.fetch_add(1, Ordering::SeqCst);
        Ok(FormReference {
            form_path: format!(
                "forms/{}_{}.pdf",
                company.company_ein, analysis.key.import_id
            ),
        })
    }
}

pub(super) fn settings(timeout: Duration) -> SessionSettings {
    SessionSettings {
        collaborator_timeout: timeout,
        ..SessionSettings::default()
    }
}

pub(super) fn session_with(backend: Arc<ScriptedBackend>) -> ClaimSession {
    session_with_settings(backend, SessionSettings::default())
}

pub(super) fn session_with_settings(
    backend: Arc<ScriptedBackend>,
    settings: SessionSettings,
) -> ClaimSession {
    ClaimSession::new(
        ClaimId("claim-test".to_string()),
        RequirementCatalog::standard(),
        Collaborators::from_backend(backend),
        settings,
    )
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
