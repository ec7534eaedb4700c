use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::catalog::RequirementCatalog;
use super::collaborators::{CollaboratorError, Collaborators, DocumentFilter, DocumentUpload};
use super::domain::{
    CompanyInfo, DocumentGroup, DocumentId, DocumentScope, ExportId, FormDefaults, ImportId,
    PotentialApplication, UploadFile, UploadedDocument, WizardStep,
};
use super::views::ClaimView;
use super::wizard::{ClaimWorkflow, DocumentStatus, Effect, OperationKind, Transition, Trigger};
use super::ClaimError;

const IMPORT_DATASET_TYPE: &str = "import_data";
const EXPORT_DATASET_TYPE: &str = "export_data";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimId(pub String);

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-session knobs resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSettings {
    pub collaborator_timeout: Duration,
    pub form_defaults: FormDefaults,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            collaborator_timeout: Duration::from_secs(30),
            form_defaults: FormDefaults::default(),
        }
    }
}

/// Supporting document submitted during the documents step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSubmission {
    pub file: UploadFile,
    pub document_type: Option<String>,
    pub tags: Option<String>,
}

/// Drives a [`ClaimWorkflow`] against the collaborators.
///
/// The workflow lock is only held for synchronous state changes, never across a collaborator
/// call, so responses can be applied while other requests for the same claim are waiting.
pub struct ClaimSession {
    id: ClaimId,
    workflow: Mutex<ClaimWorkflow>,
    collaborators: Collaborators,
    settings: SessionSettings,
}

impl ClaimSession {
    pub fn new(
        id: ClaimId,
        catalog: RequirementCatalog,
        collaborators: Collaborators,
        settings: SessionSettings,
    ) -> Self {
        Self {
            id,
            workflow: Mutex::new(ClaimWorkflow::new(catalog)),
            collaborators,
            settings,
        }
    }

    pub fn id(&self) -> &ClaimId {
        &self.id
    }

    pub fn view(&self) -> ClaimView {
        ClaimView::from_workflow(self.id.clone(), &self.lock())
    }

    pub fn step(&self) -> WizardStep {
        self.lock().step()
    }

    pub fn document_status(&self) -> DocumentStatus {
        self.lock().document_status()
    }

    pub fn documents(&self) -> Vec<UploadedDocument> {
        self.lock().documents().to_vec()
    }

    pub fn suggestions(&self) -> Vec<PotentialApplication> {
        self.lock().suggestions().to_vec()
    }

    pub fn groups(&self) -> Vec<DocumentGroup> {
        self.lock().groups().to_vec()
    }

    pub async fn fire(&self, trigger: Trigger) -> Result<ClaimView, ClaimError> {
        let transition = self.lock().fire(trigger)?;
        self.finish(transition).await
    }

    pub async fn go_back(&self) -> Result<ClaimView, ClaimError> {
        let transition = self.lock().go_back()?;
        self.finish(transition).await
    }

    pub async fn jump_to(&self, step: WizardStep) -> Result<ClaimView, ClaimError> {
        let transition = self.lock().jump_to(step)?;
        self.finish(transition).await
    }

    pub async fn jump_to_index(&self, index: usize) -> Result<ClaimView, ClaimError> {
        let transition = self.lock().jump_to_index(index)?;
        self.finish(transition).await
    }

    /// Upload the import dataset; the stored document id becomes the claim's import id.
    pub async fn upload_imports(&self, file: UploadFile) -> Result<ClaimView, ClaimError> {
        let Some(document) = self
            .upload_dataset(file, IMPORT_DATASET_TYPE, WizardStep::UploadImports)
            .await?
        else {
            return Ok(self.view());
        };
        let transition = self.lock().import_received(ImportId(document.id.0))?;
        self.finish_optional(transition).await
    }

    /// Upload the export dataset; advances to analysis when waiting on it.
    pub async fn upload_exports(&self, file: UploadFile) -> Result<ClaimView, ClaimError> {
        let Some(document) = self
            .upload_dataset(file, EXPORT_DATASET_TYPE, WizardStep::UploadExports)
            .await?
        else {
            return Ok(self.view());
        };
        let transition = self.lock().export_received(ExportId(document.id.0))?;
        self.finish_optional(transition).await
    }

    pub async fn retry_analysis(&self) -> Result<ClaimView, ClaimError> {
        let effect = self.lock().retry_analysis()?;
        self.run_effects(effect.into_iter().collect()).await;
        Ok(self.view())
    }

    pub async fn refresh_analysis(&self) -> Result<ClaimView, ClaimError> {
        let effect = self.lock().refresh_analysis()?;
        self.run_effects(effect.into_iter().collect()).await;
        Ok(self.view())
    }

    pub async fn refresh_documents(&self) -> Result<ClaimView, ClaimError> {
        let effect = self.lock().begin_document_refresh();
        self.run_effects(effect.into_iter().collect()).await;
        Ok(self.view())
    }

    /// Upload a supporting document linked to the active claim.
    ///
    /// A missing type is resolved through the store's type detection.
    pub async fn upload_document(
        &self,
        submission: DocumentSubmission,
    ) -> Result<ClaimView, ClaimError> {
        if submission.file.filename.trim().is_empty() {
            return Err(ClaimError::missing_field("filename"));
        }

        let document_type = match submission.document_type.filter(|kind| !kind.trim().is_empty()) {
            Some(kind) => kind,
            None => {
                let detected = self
                    .call(
                        "type detection",
                        self.collaborators.documents.detect_type(&submission.file),
                    )
                    .await;
                match detected {
                    Ok(Some(kind)) => kind,
                    Ok(None) => {
                        return Err(ClaimError::validation(
                            "document_type",
                            "could not be detected from the file",
                        ))
                    }
                    Err(error) => {
                        self.lock().record_failure(
                            WizardStep::UploadDocuments,
                            OperationKind::Upload,
                            &error,
                        );
                        return Ok(self.view());
                    }
                }
            }
        };

        let upload = {
            let mut workflow = self.lock();
            workflow.begin_upload();
            DocumentUpload {
                file: submission.file,
                document_type,
                tags: submission.tags,
                import_id: workflow.import_id().cloned(),
                export_id: workflow.export_id().cloned(),
            }
        };

        let outcome = self
            .call("document upload", self.collaborators.documents.upload(upload))
            .await;

        let mut workflow = self.lock();
        workflow.finish_upload();
        match outcome {
            Ok(document) => workflow.add_document(document),
            Err(error) => {
                warn!(claim = %self.id, error = %error, "document upload failed");
                workflow.record_failure(WizardStep::UploadDocuments, OperationKind::Upload, &error);
            }
        }
        Ok(ClaimView::from_workflow(self.id.clone(), &workflow))
    }

    pub async fn delete_document(&self, document_id: &DocumentId) -> Result<ClaimView, ClaimError> {
        let outcome = self
            .call(
                "document delete",
                self.collaborators.documents.delete(document_id),
            )
            .await;

        let mut workflow = self.lock();
        match outcome {
            Ok(()) => {
                if workflow.remove_document(document_id).is_err() {
                    debug!(document = %document_id, "deleted document was not loaded locally");
                }
            }
            Err(CollaboratorError::NotFound(_)) => {
                return Err(ClaimError::not_found("document", document_id.to_string()));
            }
            Err(error) => {
                warn!(claim = %self.id, error = %error, "document delete failed");
                workflow.record_failure(WizardStep::UploadDocuments, OperationKind::Upload, &error);
            }
        }
        Ok(ClaimView::from_workflow(self.id.clone(), &workflow))
    }

    pub fn create_group(
        &self,
        name: &str,
        document_ids: &[DocumentId],
    ) -> Result<DocumentGroup, ClaimError> {
        self.lock().create_group(name, document_ids)
    }

    pub fn materialize_suggestion(&self, index: usize) -> Result<DocumentGroup, ClaimError> {
        self.lock().materialize_suggestion(index)
    }

    /// Generate the drawback entry form; completes the claim on success.
    pub async fn generate_form(&self, company: CompanyInfo) -> Result<ClaimView, ClaimError> {
        let request = self
            .lock()
            .begin_form(company, &self.settings.form_defaults)?;
        let Some(request) = request else {
            return Ok(self.view());
        };

        let outcome = self
            .call(
                "form generation",
                self.collaborators
                    .forms
                    .generate(&request.company, &request.reference),
            )
            .await;

        let applied = self.lock().apply_form(request.reference.key, outcome);
        match applied {
            Ok(_) => {}
            Err(error) if error.is_stale() => {
                debug!(claim = %self.id, "discarded form for a superseded claim");
            }
            Err(error) => return Err(error),
        }
        Ok(self.view())
    }

    pub fn dismiss_error(&self) -> ClaimView {
        let mut workflow = self.lock();
        workflow.dismiss_error();
        ClaimView::from_workflow(self.id.clone(), &workflow)
    }

    async fn upload_dataset(
        &self,
        file: UploadFile,
        document_type: &str,
        step: WizardStep,
    ) -> Result<Option<UploadedDocument>, ClaimError> {
        if file.filename.trim().is_empty() {
            return Err(ClaimError::missing_field("filename"));
        }

        self.lock().begin_upload();
        let upload = DocumentUpload {
            file,
            document_type: document_type.to_string(),
            tags: None,
            import_id: None,
            export_id: None,
        };
        let outcome = self
            .call("dataset upload", self.collaborators.documents.upload(upload))
            .await;

        let mut workflow = self.lock();
        workflow.finish_upload();
        match outcome {
            Ok(document) => Ok(Some(document)),
            Err(error) => {
                warn!(claim = %self.id, error = %error, "dataset upload failed");
                workflow.record_failure(step, OperationKind::Upload, &error);
                Ok(None)
            }
        }
    }

    async fn finish(&self, transition: Transition) -> Result<ClaimView, ClaimError> {
        self.run_effects(transition.effects).await;
        Ok(self.view())
    }

    async fn finish_optional(
        &self,
        transition: Option<Transition>,
    ) -> Result<ClaimView, ClaimError> {
        match transition {
            Some(transition) => self.finish(transition).await,
            None => Ok(self.view()),
        }
    }

    async fn run_effects(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Analyze(key) => {
                    let outcome = self
                        .call(
                            "analysis",
                            self.collaborators
                                .analysis
                                .analyze(&key.import_id, key.export_id.as_ref()),
                        )
                        .await;
                    let applied = self.lock().apply_analysis(key, outcome);
                    if let Err(error) = applied {
                        debug!(claim = %self.id, error = %error, "analysis response not applied");
                    }
                }
                Effect::RefreshDocuments(scope) => self.refresh_for(scope).await,
            }
        }
    }

    async fn refresh_for(&self, scope: DocumentScope) {
        let filter = DocumentFilter::default();
        let (listing, status) = tokio::join!(
            self.call(
                "document listing",
                self.collaborators.documents.list_documents(&filter)
            ),
            self.call(
                "requirement status",
                self.collaborators.requirements.status(&scope)
            ),
        );
        let applied = self.lock().apply_document_refresh(scope, listing, status);
        if let Err(error) = applied {
            debug!(claim = %self.id, error = %error, "requirement status not applied");
        }
    }

    async fn call<T, F>(&self, operation: &'static str, request: F) -> Result<T, CollaboratorError>
    where
        F: Future<Output = Result<T, CollaboratorError>>,
    {
        let limit = self.settings.collaborator_timeout;
        match tokio::time::timeout(limit, request).await {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(claim = %self.id, operation, "collaborator call timed out");
                Err(CollaboratorError::Timeout {
                    operation,
                    seconds: limit.as_secs(),
                })
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, ClaimWorkflow> {
        self.workflow
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for ClaimSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClaimSession")
            .field("id", &self.id)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}
