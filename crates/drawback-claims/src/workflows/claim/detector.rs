use serde::{Deserialize, Serialize};

use super::domain::{ApplicationKind, PotentialApplication, UploadedDocument};

pub const COMPLETE_APPLICATION_NAME: &str = "Complete Drawback Application";

/// The four document roles a claim is assembled from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoreCategory {
    ImportEntry,
    ExportDeclaration,
    DutyProof,
    ExportProof,
}

impl CoreCategory {
    pub const fn ordered() -> [Self; 4] {
        [
            Self::ImportEntry,
            Self::ExportDeclaration,
            Self::DutyProof,
            Self::ExportProof,
        ]
    }

    pub const fn code(self) -> &'static str {
        match self {
            Self::ImportEntry => "import_entry",
            Self::ExportDeclaration => "export_declaration",
            Self::DutyProof => "proof_of_duty",
            Self::ExportProof => "proof_of_export",
        }
    }

    pub const fn accepted_types(self) -> &'static [&'static str] {
        match self {
            Self::ImportEntry => &["import_entry", "cbp_7501", "entry_summary"],
            Self::ExportDeclaration => &[
                "export_declaration",
                "export_invoice",
                "commercial_invoice_export",
            ],
            Self::DutyProof => &[
                "proof_of_duty",
                "cbp_7552",
                "certificate_of_delivery",
                "duty_payment_receipt",
            ],
            Self::ExportProof => &["proof_of_export", "bill_of_lading", "airway_bill"],
        }
    }

    pub fn accepts(self, document_type: &str) -> bool {
        self.accepted_types()
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(document_type))
    }
}

#[derive(Default)]
struct Buckets<'a> {
    import_entries: Vec<&'a UploadedDocument>,
    export_declarations: Vec<&'a UploadedDocument>,
    duty_proofs: Vec<&'a UploadedDocument>,
    export_proofs: Vec<&'a UploadedDocument>,
}

impl<'a> Buckets<'a> {
    fn fill(documents: &'a [UploadedDocument]) -> Self {
        let mut ordered: Vec<&UploadedDocument> = documents.iter().collect();
        ordered.sort_by(|left, right| left.upload_order().cmp(&right.upload_order()));

        let mut buckets = Self::default();
        for document in ordered {
            for category in CoreCategory::ordered() {
                if category.accepts(&document.document_type) {
                    buckets.bucket_mut(category).push(document);
                }
            }
        }
        buckets
    }

    fn bucket_mut(&mut self, category: CoreCategory) -> &mut Vec<&'a UploadedDocument> {
        match category {
            CoreCategory::ImportEntry => &mut self.import_entries,
            CoreCategory::ExportDeclaration => &mut self.export_declarations,
            CoreCategory::DutyProof => &mut self.duty_proofs,
            CoreCategory::ExportProof => &mut self.export_proofs,
        }
    }
}

/// Propose claim groupings for a document collection.
///
/// Every import entry is paired with every export declaration (one `basic` suggestion per pair,
/// so duplicates appear when a category holds several documents). When all four core categories
/// are populated a single `complete` suggestion follows, built from the earliest upload in each.
pub fn detect(documents: &[UploadedDocument]) -> Vec<PotentialApplication> {
    let buckets = Buckets::fill(documents);
    let mut applications = Vec::new();

    for import_doc in &buckets.import_entries {
        for export_doc in &buckets.export_declarations {
            applications.push(PotentialApplication {
                name: format!(
                    "Potential Application: {} + {}",
                    import_doc.filename, export_doc.filename
                ),
                kind: ApplicationKind::Basic,
                documents: vec![(*import_doc).clone(), (*export_doc).clone()],
            });
        }
    }

    if let (Some(import_doc), Some(export_doc), Some(duty_doc), Some(proof_doc)) = (
        buckets.import_entries.first(),
        buckets.export_declarations.first(),
        buckets.duty_proofs.first(),
        buckets.export_proofs.first(),
    ) {
        applications.push(PotentialApplication {
            name: COMPLETE_APPLICATION_NAME.to_string(),
            kind: ApplicationKind::Complete,
            documents: vec![
                (*import_doc).clone(),
                (*export_doc).clone(),
                (*duty_doc).clone(),
                (*proof_doc).clone(),
            ],
        });
    }

    applications
}
