use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::ClaimError;

/// Identifier of an uploaded import dataset (the document id returned by the store).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImportId(pub String);

/// Identifier of an uploaded export dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExportId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(pub u64);

impl fmt::Display for ImportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for ExportId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "group-{}", self.0)
    }
}

/// Ordered wizard positions. The declaration order is the navigation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Welcome,
    Instructions,
    UploadImports,
    UploadExports,
    Analysis,
    UploadDocuments,
    GenerateForm,
    Completed,
}

impl WizardStep {
    pub const fn ordered() -> [Self; 8] {
        [
            Self::Welcome,
            Self::Instructions,
            Self::UploadImports,
            Self::UploadExports,
            Self::Analysis,
            Self::UploadDocuments,
            Self::GenerateForm,
            Self::Completed,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Welcome => "Welcome",
            Self::Instructions => "Instructions",
            Self::UploadImports => "Import Data",
            Self::UploadExports => "Export Data",
            Self::Analysis => "Analysis",
            Self::UploadDocuments => "Documents",
            Self::GenerateForm => "Generate Form",
            Self::Completed => "Completed",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ordered().get(index).copied()
    }

    pub fn next(self) -> Option<Self> {
        Self::from_index(self.index() + 1)
    }

    pub fn previous(self) -> Option<Self> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    /// Percentage of the wizard covered once this step is reached.
    pub fn progress_percent(self) -> u8 {
        let last = (Self::ordered().len() - 1) as f64;
        ((self.index() as f64 / last) * 100.0).round() as u8
    }
}

/// Import line as received from an uploaded dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub entry_number: String,
    pub product_id: String,
    pub import_date: NaiveDate,
    pub quantity: u32,
    pub duty_paid: f64,
}

/// Export line as received from an uploaded dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRecord {
    pub export_reference: String,
    pub product_id: String,
    pub export_date: NaiveDate,
    pub quantity: u32,
    pub destination: String,
}

/// One import paired with the export that makes it refundable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawbackMatch {
    pub product_id: String,
    pub import_date: NaiveDate,
    pub import_qty: u32,
    pub duty_paid: f64,
    #[serde(default)]
    pub export_date: Option<NaiveDate>,
    #[serde(default)]
    pub export_qty: Option<u32>,
    pub refund_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnmatchedImport {
    pub product_id: String,
    pub import_date: NaiveDate,
    pub quantity: u32,
    pub duty_paid: f64,
    #[serde(alias = "eligible_for_future")]
    pub eligible_for_future_export: bool,
}

/// Eligibility aggregate for one import/export pair. Replaced wholesale on re-analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub eligible_transactions: u32,
    pub potential_refund: f64,
    #[serde(default)]
    pub matches: Vec<DrawbackMatch>,
    #[serde(default)]
    pub unmatched_imports: Vec<UnmatchedImport>,
    #[serde(default)]
    pub results_file: Option<String>,
}

/// The (import, export) pair an analysis, cache entry or form request belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnalysisKey {
    pub import_id: ImportId,
    pub export_id: Option<ExportId>,
}

impl AnalysisKey {
    pub fn new(import_id: ImportId, export_id: Option<ExportId>) -> Self {
        Self {
            import_id,
            export_id,
        }
    }
}

impl fmt::Display for AnalysisKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.export_id {
            Some(export_id) => write!(f, "{}/{}", self.import_id, export_id),
            None => write!(f, "{}/-", self.import_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadedDocument {
    pub id: DocumentId,
    pub document_type: String,
    pub filename: String,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub import_id: Option<ImportId>,
    #[serde(default)]
    pub export_id: Option<ExportId>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub file_size: u64,
}

impl UploadedDocument {
    /// Ordering key used wherever "most recent" or "upload order" is needed.
    pub(crate) fn upload_order(&self) -> (DateTime<Utc>, &DocumentId) {
        (self.uploaded_at, &self.id)
    }
}

/// Restricts document visibility to a claim context. Both ids absent means global.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentScope {
    pub import_id: Option<ImportId>,
    pub export_id: Option<ExportId>,
}

impl DocumentScope {
    pub fn global() -> Self {
        Self::default()
    }

    pub fn for_claim(import_id: Option<ImportId>, export_id: Option<ExportId>) -> Self {
        Self {
            import_id,
            export_id,
        }
    }

    pub fn is_global(&self) -> bool {
        self.import_id.is_none() && self.export_id.is_none()
    }

    /// A document is visible when it links to either scoped transaction.
    pub fn includes(&self, document: &UploadedDocument) -> bool {
        if self.is_global() {
            return true;
        }

        let import_match = matches!(
            (&self.import_id, &document.import_id),
            (Some(scope), Some(linked)) if scope == linked
        );
        let export_match = matches!(
            (&self.export_id, &document.export_id),
            (Some(scope), Some(linked)) if scope == linked
        );
        import_match || export_match
    }
}

/// Durable, named grouping of document ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentGroup {
    pub id: GroupId,
    pub name: String,
    pub document_ids: Vec<DocumentId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationKind {
    Basic,
    Complete,
}

/// Detector suggestion. Recomputed on every document-set change and never stored as is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PotentialApplication {
    pub name: String,
    pub kind: ApplicationKind,
    pub documents: Vec<UploadedDocument>,
}

impl PotentialApplication {
    pub fn document_ids(&self) -> Vec<DocumentId> {
        self.documents.iter().map(|doc| doc.id.clone()).collect()
    }
}

/// Raw file handed to the document store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadFile {
    pub filename: String,
    pub content: Vec<u8>,
}

impl UploadFile {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// Applicant details printed on the generated drawback entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyInfo {
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub company_address: String,
    #[serde(default)]
    pub company_city: String,
    #[serde(default)]
    pub company_state: String,
    #[serde(default)]
    pub company_zip: String,
    #[serde(default)]
    pub company_ein: String,
    #[serde(default)]
    pub contact_name: String,
    #[serde(default)]
    pub contact_phone: String,
    #[serde(default)]
    pub contact_email: String,
}

impl CompanyInfo {
    pub fn with_defaults(mut self, defaults: &FormDefaults) -> Self {
        if self.company_name.trim().is_empty() {
            if let Some(name) = &defaults.company_name {
                self.company_name = name.clone();
            }
        }
        self
    }

    pub fn validate(&self) -> Result<(), ClaimError> {
        let fields = [
            ("company_name", &self.company_name),
            ("company_address", &self.company_address),
            ("company_city", &self.company_city),
            ("company_state", &self.company_state),
            ("company_zip", &self.company_zip),
            ("company_ein", &self.company_ein),
            ("contact_name", &self.contact_name),
            ("contact_phone", &self.contact_phone),
            ("contact_email", &self.contact_email),
        ];

        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((field, _)) => Err(ClaimError::missing_field(field)),
            None => Ok(()),
        }
    }
}

/// Explicit defaults applied to form generation requests.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormDefaults {
    pub company_name: Option<String>,
}

/// Where the generated drawback entry form can be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormReference {
    pub form_path: String,
}
