//! Drawback claim wizard, document completeness and claim assembly.
//!
//! The synchronous [`ClaimWorkflow`] holds the wizard state; [`ClaimSession`] drives it against
//! the external collaborators and [`claim_router`] exposes sessions over HTTP.

pub mod cache;
pub mod catalog;
pub mod collaborators;
pub mod completeness;
pub mod detector;
pub mod domain;
mod errors;
pub mod groups;
pub mod router;
pub mod session;
pub mod views;
pub mod wizard;

#[cfg(test)]
mod tests;

pub use cache::AnalysisCache;
pub use catalog::{DocumentRequirementCategory, RequirementCatalog};
pub use collaborators::{
    AnalysisReference, AnalysisService, CollaboratorError, Collaborators, DocumentFilter,
    DocumentStore, DocumentUpload, FormGenerator, RequirementService,
};
pub use completeness::{evaluate, CategoryCompleteness, CategoryStatus, CompletenessReport};
pub use detector::{detect, CoreCategory};
pub use domain::{
    AnalysisKey, AnalysisResult, ApplicationKind, CompanyInfo, DocumentGroup, DocumentId,
    DocumentScope, DrawbackMatch, ExportId, ExportRecord, FormDefaults, FormReference, GroupId,
    ImportId, ImportRecord, PotentialApplication, UnmatchedImport, UploadFile,
    UploadedDocument, WizardStep,
};
pub use errors::ClaimError;
pub use groups::DocumentGroupRegistry;
pub use router::{claim_router, ClaimRegistry};
pub use session::{ClaimId, ClaimSession, SessionSettings};
pub use views::ClaimView;
pub use wizard::{ClaimWorkflow, Effect, InFlight, StepError, Transition, Trigger};
