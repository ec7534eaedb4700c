//! Collaborators backed by the drawback REST service.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::workflows::claim::{
    AnalysisReference, AnalysisResult, AnalysisService, CategoryCompleteness, CategoryStatus,
    CollaboratorError, CompanyInfo, CompletenessReport, DocumentFilter, DocumentId,
    DocumentRequirementCategory, DocumentScope, DocumentStore, DocumentUpload, ExportId,
    FormGenerator, FormReference, ImportId, RequirementService, UploadFile, UploadedDocument,
};

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| CollaboratorError::Network(error.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

fn transport(error: reqwest::Error) -> CollaboratorError {
    CollaboratorError::Network(error.to_string())
}

/// Map non-success statuses onto collaborator errors, preferring the service's `error` field.
async fn checked(response: Response) -> Result<Response, CollaboratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let path = response.url().path().to_string();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|value| value.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);

    if status == StatusCode::NOT_FOUND {
        return Err(CollaboratorError::NotFound(path));
    }
    Err(CollaboratorError::Service {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, CollaboratorError> {
    let response = checked(response).await?;
    response
        .json::<T>()
        .await
        .map_err(|error| CollaboratorError::Decode(error.to_string()))
}

/// Ids arrive as integers or strings depending on the endpoint.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) if text.is_empty() => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[derive(Debug, Deserialize)]
struct RemoteDocument {
    id: Value,
    filename: String,
    document_type: String,
    uploaded_at: String,
    #[serde(default)]
    import_transaction_id: Value,
    #[serde(default)]
    export_transaction_id: Value,
    #[serde(default)]
    tags: Option<String>,
    #[serde(default)]
    file_size: Option<u64>,
}

impl RemoteDocument {
    fn into_document(self) -> Result<UploadedDocument, CollaboratorError> {
        let id = id_string(&self.id)
            .ok_or_else(|| CollaboratorError::Decode("document without id".to_string()))?;
        let uploaded_at = parse_timestamp(&self.uploaded_at).ok_or_else(|| {
            CollaboratorError::Decode(format!("bad uploaded_at '{}'", self.uploaded_at))
        })?;
        Ok(UploadedDocument {
            id: DocumentId(id),
            document_type: self.document_type,
            filename: self.filename,
            uploaded_at,
            import_id: id_string(&self.import_transaction_id).map(ImportId),
            export_id: id_string(&self.export_transaction_id).map(ExportId),
            tags: self.tags.filter(|tags| !tags.is_empty()),
            file_size: self.file_size.unwrap_or_default(),
        })
    }
}

#[derive(Debug, Deserialize)]
struct DocumentList {
    documents: Vec<RemoteDocument>,
}

#[derive(Debug, Deserialize)]
struct UploadReceipt {
    document_id: Value,
    filename: String,
    document_type: String,
    uploaded_at: String,
}

#[derive(Debug, Deserialize)]
struct DetectedType {
    #[serde(default)]
    document_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RemoteRequirement {
    name: String,
    #[serde(default)]
    description: String,
    accepted_types: Vec<String>,
    #[serde(default = "default_required")]
    required: bool,
    #[serde(default)]
    can_generate: bool,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct RequirementList {
    requirements: BTreeMap<String, RemoteRequirement>,
}

#[derive(Debug, Deserialize)]
struct RemoteCategoryStatus {
    status: String,
    #[serde(default)]
    document_id: Value,
    #[serde(default)]
    filename: Option<String>,
    #[serde(default)]
    document_type: Option<String>,
    #[serde(default)]
    uploaded_at: Option<String>,
    #[serde(default)]
    can_generate: bool,
}

#[derive(Debug, Deserialize)]
struct RemoteStatus {
    documents: BTreeMap<String, RemoteCategoryStatus>,
    missing_count: usize,
    total_required: usize,
}

impl RemoteStatus {
    fn into_report(self) -> CompletenessReport {
        let categories = self
            .documents
            .into_iter()
            .map(|(key, entry)| {
                let status = if entry.status.eq_ignore_ascii_case("missing") {
                    CategoryStatus::Missing
                } else {
                    CategoryStatus::Satisfied
                };
                let completeness = CategoryCompleteness {
                    status,
                    document_id: id_string(&entry.document_id).map(DocumentId),
                    filename: entry.filename,
                    document_type: entry.document_type,
                    uploaded_at: entry.uploaded_at.as_deref().and_then(parse_timestamp),
                    can_generate: entry.can_generate,
                };
                (key, completeness)
            })
            .collect();
        CompletenessReport {
            categories,
            missing_count: self.missing_count,
            total_required: self.total_required,
        }
    }
}

#[derive(Debug, Serialize)]
struct FormWizardRequest<'a> {
    #[serde(flatten)]
    company: &'a CompanyInfo,
    results_file: &'a str,
}

#[derive(Debug, Deserialize)]
struct FormWizardResponse {
    form_path: String,
}

fn file_part(file: &UploadFile) -> Result<Part, CollaboratorError> {
    let mime = mime_guess::from_path(&file.filename).first_or_octet_stream();
    Part::bytes(file.content.clone())
        .file_name(file.filename.clone())
        .mime_str(mime.essence_str())
        .map_err(transport)
}

#[async_trait]
impl AnalysisService for HttpBackend {
    async fn analyze(
        &self,
        import_id: &ImportId,
        export_id: Option<&ExportId>,
    ) -> Result<AnalysisResult, CollaboratorError> {
        let mut query = vec![("import_id", import_id.0.as_str())];
        if let Some(export_id) = export_id {
            query.push(("export_id", export_id.0.as_str()));
        }
        debug!(import_id = %import_id, "requesting remote analysis");
        let response = self
            .client
            .get(self.url("/api/analyze"))
            .query(&query)
            .send()
            .await
            .map_err(transport)?;
        decode(response).await
    }
}

#[async_trait]
impl DocumentStore for HttpBackend {
    async fn list_documents(
        &self,
        filter: &DocumentFilter,
    ) -> Result<Vec<UploadedDocument>, CollaboratorError> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(import_id) = &filter.import_id {
            query.push(("import_transaction_id", import_id.0.as_str()));
        }
        if let Some(export_id) = &filter.export_id {
            query.push(("export_transaction_id", export_id.0.as_str()));
        }
        if let Some(document_type) = &filter.document_type {
            query.push(("document_type", document_type.as_str()));
        }

        let response = self
            .client
            .get(self.url("/api/documents"))
            .query(&query)
            .send()
            .await
            .map_err(transport)?;
        let list: DocumentList = decode(response).await?;
        list.documents
            .into_iter()
            .map(RemoteDocument::into_document)
            .collect()
    }

    async fn upload(&self, upload: DocumentUpload) -> Result<UploadedDocument, CollaboratorError> {
        let mut form = Form::new()
            .part("file", file_part(&upload.file)?)
            .text("document_type", upload.document_type.clone());
        if let Some(tags) = &upload.tags {
            form = form.text("tags", tags.clone());
        }
        if let Some(import_id) = &upload.import_id {
            form = form.text("import_transaction_id", import_id.0.clone());
        }
        if let Some(export_id) = &upload.export_id {
            form = form.text("export_transaction_id", export_id.0.clone());
        }

        let response = self
            .client
            .post(self.url("/api/documents/upload"))
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        let receipt: UploadReceipt = decode(response).await?;

        RemoteDocument {
            id: receipt.document_id,
            filename: receipt.filename,
            document_type: receipt.document_type,
            uploaded_at: receipt.uploaded_at,
            import_transaction_id: upload
                .import_id
                .map_or(Value::Null, |id| Value::String(id.0)),
            export_transaction_id: upload
                .export_id
                .map_or(Value::Null, |id| Value::String(id.0)),
            tags: upload.tags,
            file_size: Some(upload.file.content.len() as u64),
        }
        .into_document()
    }

    async fn delete(&self, document_id: &DocumentId) -> Result<(), CollaboratorError> {
        let response = self
            .client
            .delete(self.url(&format!("/api/documents/{document_id}")))
            .send()
            .await
            .map_err(transport)?;
        checked(response).await.map(|_| ())
    }

    async fn detect_type(&self, file: &UploadFile) -> Result<Option<String>, CollaboratorError> {
        let form = Form::new().part("file", file_part(file)?);
        let response = self
            .client
            .post(self.url("/api/documents/detect-type"))
            .multipart(form)
            .send()
            .await
            .map_err(transport)?;
        let detected: DetectedType = decode(response).await?;
        Ok(detected.document_type.filter(|kind| !kind.is_empty()))
    }
}

#[async_trait]
impl RequirementService for HttpBackend {
    async fn requirements(&self) -> Result<Vec<DocumentRequirementCategory>, CollaboratorError> {
        let response = self
            .client
            .get(self.url("/api/document-requirements"))
            .send()
            .await
            .map_err(transport)?;
        let list: RequirementList = decode(response).await?;
        Ok(list
            .requirements
            .into_iter()
            .filter(|(_, requirement)| requirement.required)
            .map(|(key, requirement)| DocumentRequirementCategory {
                key,
                name: requirement.name,
                description: requirement.description,
                accepted_types: requirement.accepted_types,
                can_generate: requirement.can_generate,
            })
            .collect())
    }

    async fn status(&self, scope: &DocumentScope) -> Result<CompletenessReport, CollaboratorError> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let Some(import_id) = &scope.import_id {
            query.push(("import_id", import_id.0.as_str()));
        }
        if let Some(export_id) = &scope.export_id {
            query.push(("export_id", export_id.0.as_str()));
        }
        let response = self
            .client
            .get(self.url("/api/document-requirements/status"))
            .query(&query)
            .send()
            .await
            .map_err(transport)?;
        let status: RemoteStatus = decode(response).await?;
        Ok(status.into_report())
    }
}

#[async_trait]
impl FormGenerator for HttpBackend {
    async fn generate(
        &self,
        company: &CompanyInfo,
        analysis: &AnalysisReference,
    ) -> Result<FormReference, CollaboratorError> {
        let request = FormWizardRequest {
            company,
            results_file: analysis.results_file.as_deref().unwrap_or_default(),
        };
        let response = self
            .client
            .post(self.url("/api/generate-form-wizard"))
            .json(&request)
            .send()
            .await
            .map_err(transport)?;
        let generated: FormWizardResponse = decode(response).await?;
        Ok(FormReference {
            form_path: generated.form_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_documents_accept_integer_ids_and_naive_timestamps() {
        let payload = serde_json::json!({
            "id": 17,
            "filename": "bol_0042.pdf",
            "document_type": "bill_of_lading",
            "uploaded_at": "2025-02-03T10:15:30.123456",
            "import_transaction_id": null,
            "export_transaction_id": 9,
            "tags": "",
            "file_size": 2048
        });
        let remote: RemoteDocument = serde_json::from_value(payload).expect("document decodes");
        let document = remote.into_document().expect("document converts");

        assert_eq!(document.id, DocumentId("17".to_string()));
        assert_eq!(document.import_id, None);
        assert_eq!(document.export_id, Some(ExportId("9".to_string())));
        assert_eq!(document.tags, None);
        assert_eq!(document.file_size, 2048);
    }

    #[test]
    fn remote_status_maps_provided_and_missing_entries() {
        let payload = serde_json::json!({
            "complete": false,
            "documents": {
                "ENTRY_SUMMARY": {
                    "status": "provided",
                    "document_id": 4,
                    "filename": "7501.pdf",
                    "uploaded_at": "2025-01-01T00:00:00",
                    "document_type": "cbp_7501",
                    "can_generate": false
                },
                "DRAWBACK_ENTRY": { "status": "missing", "can_generate": true }
            },
            "missing_documents": ["DRAWBACK_ENTRY"],
            "missing_count": 1,
            "total_required": 2
        });
        let remote: RemoteStatus = serde_json::from_value(payload).expect("status decodes");
        let report = remote.into_report();

        assert_eq!(report.missing_count, 1);
        assert_eq!(report.upload_missing_count(), 0);
        assert_eq!(
            report.categories["ENTRY_SUMMARY"].document_id,
            Some(DocumentId("4".to_string()))
        );
    }

    #[test]
    fn base_url_trailing_slash_is_dropped() {
        let backend = HttpBackend::new("http://localhost:5000/", Duration::from_secs(5))
            .expect("client builds");
        assert_eq!(backend.url("/api/analyze"), "http://localhost:5000/api/analyze");
    }
}
