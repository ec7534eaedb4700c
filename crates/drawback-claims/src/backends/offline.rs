use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tracing::{debug, info};

use super::ledger::{parse_exports, parse_imports, LedgerError};
use super::scanner::scan;
use crate::workflows::claim::{
    evaluate, AnalysisReference, AnalysisResult, AnalysisService, CollaboratorError, CompanyInfo,
    CompletenessReport, DocumentFilter, DocumentId, DocumentRequirementCategory, DocumentScope,
    DocumentStore, DocumentUpload, ExportId, FormGenerator, FormReference, ImportId,
    RequirementCatalog, RequirementService, UploadFile, UploadedDocument,
};

/// Filename keywords mapped to document types, checked in order.
const TYPE_HINTS: &[(&[&str], &str)] = &[
    (&["7501"], "cbp_7501"),
    (&["7551"], "cbp_7551"),
    (&["7552"], "cbp_7552"),
    (&["entry_summary"], "entry_summary"),
    (&["certificate_of_delivery"], "certificate_of_delivery"),
    (&["duty", "receipt"], "duty_payment_receipt"),
    (&["bill_of_lading"], "bill_of_lading"),
    (&["bol"], "bill_of_lading"),
    (&["airway"], "airway_bill"),
    (&["clearance"], "customs_clearance"),
    (&["invoice", "export"], "commercial_invoice_export"),
    (&["invoice"], "commercial_invoice_import"),
    (&["import", ".csv"], "import_data"),
    (&["export", ".csv"], "export_data"),
];

/// Guess a document type from its filename. Heuristic only.
pub fn detect_document_type(filename: &str) -> Option<&'static str> {
    let lowered = filename.to_ascii_lowercase();
    TYPE_HINTS
        .iter()
        .find(|(keywords, _)| keywords.iter().all(|keyword| lowered.contains(keyword)))
        .map(|(_, document_type)| *document_type)
}

/// Uploads are limited to scanned paperwork and transaction spreadsheets.
pub fn is_allowed_upload(filename: &str) -> bool {
    mime_guess::from_path(filename).iter().any(|guess| {
        guess == mime::APPLICATION_PDF
            || guess == mime::IMAGE_PNG
            || guess == mime::IMAGE_JPEG
            || guess == mime::TEXT_CSV
            || guess.essence_str() == "image/tiff"
    })
}

#[derive(Debug)]
struct StoredDocument {
    meta: UploadedDocument,
    content: Vec<u8>,
}

#[derive(Debug, Default)]
struct OfflineState {
    documents: Vec<StoredDocument>,
    document_sequence: u64,
    forms_generated: u64,
}

impl OfflineState {
    fn content(&self, id: &str, label: &str) -> Result<Vec<u8>, CollaboratorError> {
        self.documents
            .iter()
            .find(|stored| stored.meta.id.0 == id)
            .map(|stored| stored.content.clone())
            .ok_or_else(|| CollaboratorError::NotFound(format!("{label} {id}")))
    }
}

/// In-process implementation of every collaborator contract.
#[derive(Debug)]
pub struct OfflineBackend {
    state: Mutex<OfflineState>,
    catalog: RequirementCatalog,
    today: Option<NaiveDate>,
}

impl Default for OfflineBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl OfflineBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(OfflineState::default()),
            catalog: RequirementCatalog::standard(),
            today: None,
        }
    }

    /// Pin the analysis date instead of using the current day.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn with_catalog(mut self, catalog: RequirementCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn document_count(&self) -> usize {
        self.lock().documents.len()
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    fn lock(&self) -> MutexGuard<'_, OfflineState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn ledger_failure(error: LedgerError) -> CollaboratorError {
    CollaboratorError::Service {
        status: 422,
        message: error.to_string(),
    }
}

fn slug(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
        } else if !slug.ends_with('_') && !slug.is_empty() {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

#[async_trait]
impl AnalysisService for OfflineBackend {
    async fn analyze(
        &self,
        import_id: &ImportId,
        export_id: Option<&ExportId>,
    ) -> Result<AnalysisResult, CollaboratorError> {
        let (import_bytes, export_bytes) = {
            let state = self.lock();
            let imports = state.content(&import_id.0, "import dataset")?;
            let exports = export_id
                .map(|id| state.content(&id.0, "export dataset"))
                .transpose()?;
            (imports, exports)
        };

        let imports = parse_imports(import_bytes.as_slice()).map_err(ledger_failure)?;
        let exports = export_bytes
            .map(|bytes| parse_exports(bytes.as_slice()))
            .transpose()
            .map_err(ledger_failure)?;

        let mut result = scan(&imports, exports.as_deref(), self.today());
        let results_name = match export_id {
            Some(export_id) => format!("{import_id}_{export_id}"),
            None => format!("{import_id}"),
        };
        result.results_file = Some(format!("results/drawback_analysis_{}.csv", slug(&results_name)));
        debug!(
            import_id = %import_id,
            eligible = result.eligible_transactions,
            "offline analysis complete"
        );
        Ok(result)
    }
}

#[async_trait]
impl DocumentStore for OfflineBackend {
    async fn list_documents(
        &self,
        filter: &DocumentFilter,
    ) -> Result<Vec<UploadedDocument>, CollaboratorError> {
        let scope = DocumentScope::for_claim(filter.import_id.clone(), filter.export_id.clone());
        let mut documents: Vec<UploadedDocument> = self
            .lock()
            .documents
            .iter()
            .map(|stored| &stored.meta)
            .filter(|meta| scope.includes(meta))
            .filter(|meta| {
                filter
                    .document_type
                    .as_deref()
                    .map_or(true, |kind| meta.document_type == kind)
            })
            .cloned()
            .collect();
        documents.sort_by(|left, right| right.upload_order().cmp(&left.upload_order()));
        Ok(documents)
    }

    async fn upload(&self, upload: DocumentUpload) -> Result<UploadedDocument, CollaboratorError> {
        let filename = upload.file.filename.trim().to_string();
        if filename.is_empty() {
            return Err(CollaboratorError::Service {
                status: 400,
                message: "no file selected".to_string(),
            });
        }
        if !is_allowed_upload(&filename) {
            return Err(CollaboratorError::Service {
                status: 415,
                message: format!("file type not allowed: {filename}"),
            });
        }

        let mut state = self.lock();
        state.document_sequence += 1;
        let meta = UploadedDocument {
            id: DocumentId(format!("doc-{:06}", state.document_sequence)),
            document_type: upload.document_type,
            filename,
            uploaded_at: Utc::now(),
            import_id: upload.import_id,
            export_id: upload.export_id,
            tags: upload.tags,
            file_size: upload.file.content.len() as u64,
        };
        info!(document = %meta.id, kind = %meta.document_type, "document stored");
        state.documents.push(StoredDocument {
            meta: meta.clone(),
            content: upload.file.content,
        });
        Ok(meta)
    }

    async fn delete(&self, document_id: &DocumentId) -> Result<(), CollaboratorError> {
        let mut state = self.lock();
        let position = state
            .documents
            .iter()
            .position(|stored| &stored.meta.id == document_id)
            .ok_or_else(|| CollaboratorError::NotFound(format!("document {document_id}")))?;
        state.documents.remove(position);
        Ok(())
    }

    async fn detect_type(&self, file: &UploadFile) -> Result<Option<String>, CollaboratorError> {
        Ok(detect_document_type(&file.filename).map(str::to_string))
    }
}

#[async_trait]
impl RequirementService for OfflineBackend {
    async fn requirements(&self) -> Result<Vec<DocumentRequirementCategory>, CollaboratorError> {
        Ok(self.catalog.categories().to_vec())
    }

    async fn status(&self, scope: &DocumentScope) -> Result<CompletenessReport, CollaboratorError> {
        let documents: Vec<UploadedDocument> = self
            .lock()
            .documents
            .iter()
            .map(|stored| stored.meta.clone())
            .collect();
        Ok(evaluate(self.catalog.categories(), &documents, scope))
    }
}

#[async_trait]
impl FormGenerator for OfflineBackend {
    async fn generate(
        &self,
        company: &CompanyInfo,
        analysis: &AnalysisReference,
    ) -> Result<FormReference, CollaboratorError> {
        if analysis.results_file.is_none() {
            return Err(CollaboratorError::Service {
                status: 400,
                message: "no analysis results available for form generation".to_string(),
            });
        }

        let mut state = self.lock();
        state.forms_generated += 1;
        let form_path = format!(
            "forms/cbp_7551_{}_{:03}.pdf",
            slug(&company.company_name),
            state.forms_generated
        );
        info!(key = %analysis.key, form_path = %form_path, "drawback form generated");
        Ok(FormReference { form_path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_keywords_pick_the_document_type() {
        assert_eq!(detect_document_type("CBP-7501 March.pdf"), Some("cbp_7501"));
        assert_eq!(
            detect_document_type("export_invoice_0042.pdf"),
            Some("commercial_invoice_export")
        );
        assert_eq!(
            detect_document_type("bill_of_lading_MSCU.png"),
            Some("bill_of_lading")
        );
        assert_eq!(detect_document_type("imports_q1.csv"), Some("import_data"));
        assert_eq!(detect_document_type("scan_0001.pdf"), None);
    }

    #[test]
    fn uploads_are_limited_to_documents_and_spreadsheets() {
        for accepted in ["a.pdf", "b.PNG", "c.jpg", "d.jpeg", "e.tif", "f.tiff", "g.csv"] {
            assert!(is_allowed_upload(accepted), "{accepted} should be accepted");
        }
        assert!(!is_allowed_upload("payload.exe"));
        assert!(!is_allowed_upload("notes"));
    }

    #[test]
    fn slugs_collapse_punctuation() {
        assert_eq!(slug("Acme Imports, LLC"), "acme_imports_llc");
        assert_eq!(slug("doc-000001_doc-000002"), "doc_000001_doc_000002");
    }
}
