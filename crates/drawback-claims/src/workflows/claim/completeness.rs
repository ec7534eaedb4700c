use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::catalog::DocumentRequirementCategory;
use super::domain::{DocumentId, DocumentScope, UploadedDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryStatus {
    Satisfied,
    Missing,
}

/// Per-category outcome. A satisfied entry carries its representative document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCompleteness {
    pub status: CategoryStatus,
    #[serde(default)]
    pub document_id: Option<DocumentId>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub uploaded_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub can_generate: bool,
}

impl CategoryCompleteness {
    fn satisfied_by(document: &UploadedDocument, can_generate: bool) -> Self {
        Self {
            status: CategoryStatus::Satisfied,
            document_id: Some(document.id.clone()),
            filename: Some(document.filename.clone()),
            document_type: Some(document.document_type.clone()),
            uploaded_at: Some(document.uploaded_at),
            can_generate,
        }
    }

    fn missing(can_generate: bool) -> Self {
        Self {
            status: CategoryStatus::Missing,
            document_id: None,
            filename: None,
            document_type: None,
            uploaded_at: None,
            can_generate,
        }
    }

    pub fn is_missing(&self) -> bool {
        self.status == CategoryStatus::Missing
    }

    /// Missing and not producible by the form generator.
    pub fn needs_upload(&self) -> bool {
        self.is_missing() && !self.can_generate
    }
}

/// Completeness of a document set against a list of requirement categories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletenessReport {
    pub categories: BTreeMap<String, CategoryCompleteness>,
    pub missing_count: usize,
    pub total_required: usize,
}

impl CompletenessReport {
    pub fn is_complete(&self) -> bool {
        self.missing_count == 0
    }

    /// Missing categories that only an upload can satisfy.
    pub fn upload_missing_count(&self) -> usize {
        self.categories
            .values()
            .filter(|entry| entry.needs_upload())
            .count()
    }

    pub fn missing_keys(&self) -> Vec<&str> {
        self.categories
            .iter()
            .filter(|(_, entry)| entry.is_missing())
            .map(|(key, _)| key.as_str())
            .collect()
    }
}

/// Evaluate every category against the documents visible in `scope`.
///
/// A category is satisfied by any document whose type is accepted; the representative is the
/// most recent upload, ties broken by document id. Pure: identical inputs give identical reports.
pub fn evaluate(
    categories: &[DocumentRequirementCategory],
    documents: &[UploadedDocument],
    scope: &DocumentScope,
) -> CompletenessReport {
    let visible: Vec<&UploadedDocument> = documents
        .iter()
        .filter(|document| scope.includes(document))
        .collect();

    let mut report = CompletenessReport {
        total_required: categories.len(),
        ..CompletenessReport::default()
    };

    for category in categories {
        let representative = visible
            .iter()
            .copied()
            .filter(|document| category.accepts(&document.document_type))
            .max_by(|left, right| left.upload_order().cmp(&right.upload_order()));

        let entry = match representative {
            Some(document) => CategoryCompleteness::satisfied_by(document, category.can_generate),
            None => {
                report.missing_count += 1;
                CategoryCompleteness::missing(category.can_generate)
            }
        };
        report.categories.insert(category.key.clone(), entry);
    }

    report
}
