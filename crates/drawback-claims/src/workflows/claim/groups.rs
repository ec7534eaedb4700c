use chrono::Utc;
use tracing::info;

use super::domain::{DocumentGroup, DocumentId, GroupId, PotentialApplication, UploadedDocument};
use super::ClaimError;

/// Named document groupings in creation order.
///
/// Membership is not exclusive: a document may belong to any number of groups.
#[derive(Debug, Default)]
pub struct DocumentGroupRegistry {
    groups: Vec<DocumentGroup>,
    next_id: u64,
}

impl DocumentGroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(
        &mut self,
        name: &str,
        document_ids: &[DocumentId],
        known: &[UploadedDocument],
    ) -> Result<DocumentGroup, ClaimError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ClaimError::missing_field("name"));
        }
        if document_ids.is_empty() {
            return Err(ClaimError::validation(
                "document_ids",
                "at least one document is required",
            ));
        }

        let mut unique: Vec<DocumentId> = Vec::with_capacity(document_ids.len());
        for id in document_ids {
            if !known.iter().any(|document| &document.id == id) {
                return Err(ClaimError::validation(
                    "document_ids",
                    format!("unknown document {id}"),
                ));
            }
            if !unique.contains(id) {
                unique.push(id.clone());
            }
        }

        self.next_id += 1;
        let group = DocumentGroup {
            id: GroupId(self.next_id),
            name: name.to_string(),
            document_ids: unique,
            created_at: Utc::now(),
        };
        info!(group = %group.id, documents = group.document_ids.len(), "created document group");
        self.groups.push(group.clone());
        Ok(group)
    }

    pub fn materialize_from_suggestion(
        &mut self,
        suggestion: &PotentialApplication,
        known: &[UploadedDocument],
    ) -> Result<DocumentGroup, ClaimError> {
        self.create(&suggestion.name, &suggestion.document_ids(), known)
    }

    pub fn list(&self) -> &[DocumentGroup] {
        &self.groups
    }
}
