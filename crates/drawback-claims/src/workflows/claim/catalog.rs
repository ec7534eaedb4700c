use serde::{Deserialize, Serialize};

/// A logical document requirement satisfiable by any of its accepted type codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRequirementCategory {
    pub key: String,
    pub name: String,
    pub description: String,
    pub accepted_types: Vec<String>,
    #[serde(default)]
    pub can_generate: bool,
}

impl DocumentRequirementCategory {
    pub fn new(
        key: &str,
        name: &str,
        description: &str,
        accepted_types: &[&str],
        can_generate: bool,
    ) -> Self {
        Self {
            key: key.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            accepted_types: accepted_types.iter().map(|t| t.to_string()).collect(),
            can_generate,
        }
    }

    pub fn accepts(&self, document_type: &str) -> bool {
        self.accepted_types
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(document_type))
    }
}

/// Required document categories for a drawback claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequirementCatalog {
    categories: Vec<DocumentRequirementCategory>,
}

impl RequirementCatalog {
    pub fn standard() -> Self {
        Self {
            categories: standard_categories(),
        }
    }

    pub fn from_categories(categories: Vec<DocumentRequirementCategory>) -> Self {
        Self { categories }
    }

    pub fn categories(&self) -> &[DocumentRequirementCategory] {
        &self.categories
    }

    pub fn find(&self, key: &str) -> Option<&DocumentRequirementCategory> {
        self.categories.iter().find(|category| category.key == key)
    }

    /// Categories a document of this type would satisfy.
    pub fn categories_for_type<'a>(
        &'a self,
        document_type: &'a str,
    ) -> impl Iterator<Item = &'a DocumentRequirementCategory> + 'a {
        self.categories
            .iter()
            .filter(move |category| category.accepts(document_type))
    }
}

impl Default for RequirementCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

fn standard_categories() -> Vec<DocumentRequirementCategory> {
    vec![
        DocumentRequirementCategory::new(
            "PROOF_OF_DUTY",
            "Proof of Duties Paid",
            "Certificate of Delivery (CBP Form 7552) proving all duties and taxes were paid",
            &["cbp_7552", "certificate_of_delivery", "duty_payment_receipt"],
            false,
        ),
        DocumentRequirementCategory::new(
            "ENTRY_SUMMARY",
            "Entry Summary",
            "CBP Form 7501 Entry Summary with import information",
            &["cbp_7501", "entry_summary"],
            false,
        ),
        DocumentRequirementCategory::new(
            "IMPORT_PROOF",
            "Proof of Import",
            "Customs clearance documentation with HS tariff classification and import value",
            &[
                "customs_clearance",
                "import_invoice",
                "commercial_invoice_import",
            ],
            false,
        ),
        DocumentRequirementCategory::new(
            "EXPORT_PROOF",
            "Proof of Export",
            "Documents showing export of goods (bill of lading, commercial invoices, etc.)",
            &[
                "bill_of_lading",
                "export_invoice",
                "commercial_invoice_export",
                "airway_bill",
            ],
            false,
        ),
        DocumentRequirementCategory::new(
            "DRAWBACK_ENTRY",
            "Drawback Entry Form",
            "CBP Form 7551 (Drawback Entry) completed and signed",
            &["cbp_7551", "drawback_entry"],
            true,
        ),
    ]
}
