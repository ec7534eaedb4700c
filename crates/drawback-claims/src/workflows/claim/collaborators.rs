//! Contracts for the external services the claim workflow drives.
//!
//! Each trait is object safe so the session can hold `Arc<dyn ...>` handles and swap between
//! the offline backend, the HTTP backend and test doubles.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::catalog::DocumentRequirementCategory;
use super::completeness::CompletenessReport;
use super::domain::{
    AnalysisKey, AnalysisResult, CompanyInfo, DocumentId, DocumentScope, ExportId, FormReference,
    ImportId, UploadFile, UploadedDocument,
};

/// Failure raised by a collaborator call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollaboratorError {
    #[error("network error: {0}")]
    Network(String),
    #[error("service error {status}: {message}")]
    Service { status: u16, message: String },
    #[error("{operation} timed out after {seconds}s")]
    Timeout {
        operation: &'static str,
        seconds: u64,
    },
    #[error("{0} not found")]
    NotFound(String),
    #[error("unexpected response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait AnalysisService: Send + Sync {
    async fn analyze(
        &self,
        import_id: &ImportId,
        export_id: Option<&ExportId>,
    ) -> Result<AnalysisResult, CollaboratorError>;
}

/// Optional narrowing for document listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentFilter {
    pub import_id: Option<ImportId>,
    pub export_id: Option<ExportId>,
    pub document_type: Option<String>,
}

/// Upload request accepted by the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub file: UploadFile,
    pub document_type: String,
    pub tags: Option<String>,
    pub import_id: Option<ImportId>,
    pub export_id: Option<ExportId>,
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn list_documents(
        &self,
        filter: &DocumentFilter,
    ) -> Result<Vec<UploadedDocument>, CollaboratorError>;

    async fn upload(&self, upload: DocumentUpload) -> Result<UploadedDocument, CollaboratorError>;

    async fn delete(&self, document_id: &DocumentId) -> Result<(), CollaboratorError>;

    async fn detect_type(&self, file: &UploadFile) -> Result<Option<String>, CollaboratorError>;
}

/// Server-side requirement catalog and its precomputed completeness status.
#[async_trait]
pub trait RequirementService: Send + Sync {
    async fn requirements(&self) -> Result<Vec<DocumentRequirementCategory>, CollaboratorError>;

    async fn status(&self, scope: &DocumentScope) -> Result<CompletenessReport, CollaboratorError>;
}

/// Pointer to the analysis a form is generated from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReference {
    pub key: AnalysisKey,
    pub results_file: Option<String>,
}

#[async_trait]
pub trait FormGenerator: Send + Sync {
    async fn generate(
        &self,
        company: &CompanyInfo,
        analysis: &AnalysisReference,
    ) -> Result<FormReference, CollaboratorError>;
}

/// Handles to every collaborator a claim session talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub analysis: Arc<dyn AnalysisService>,
    pub documents: Arc<dyn DocumentStore>,
    pub requirements: Arc<dyn RequirementService>,
    pub forms: Arc<dyn FormGenerator>,
}

impl Collaborators {
    /// Use a single backend for every contract.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: AnalysisService + DocumentStore + RequirementService + FormGenerator + 'static,
    {
        Self {
            analysis: backend.clone(),
            documents: backend.clone(),
            requirements: backend.clone(),
            forms: backend,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}
