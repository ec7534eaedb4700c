use serde::Serialize;

use super::completeness::CompletenessReport;
use super::domain::{
    AnalysisResult, DocumentGroup, ExportId, FormReference, ImportId, PotentialApplication,
    UploadedDocument, WizardStep,
};
use super::session::ClaimId;
use super::wizard::{ClaimWorkflow, InFlight, StatusSource, StepError, Trigger};

/// Step indicator entry rendered by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepIndicator {
    pub step: WizardStep,
    pub index: usize,
    pub label: &'static str,
    pub current: bool,
    pub completed: bool,
    pub reachable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentsView {
    pub source: StatusSource,
    pub complete: bool,
    pub upload_missing: usize,
    pub override_granted: bool,
    pub report: CompletenessReport,
    pub documents: Vec<UploadedDocument>,
    pub suggestions: Vec<PotentialApplication>,
    pub groups: Vec<DocumentGroup>,
}

/// Read-only snapshot of a claim session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClaimView {
    pub claim_id: ClaimId,
    pub step: WizardStep,
    pub step_label: &'static str,
    pub progress_percent: u8,
    pub steps: Vec<StepIndicator>,
    pub available_triggers: Vec<Trigger>,
    pub import_id: Option<ImportId>,
    pub export_id: Option<ExportId>,
    pub import_only: bool,
    pub analysis: Option<AnalysisResult>,
    pub analysis_stale: bool,
    pub generated_form: Option<FormReference>,
    pub documents: DocumentsView,
    pub in_flight: InFlight,
    pub error: Option<StepError>,
}

impl ClaimView {
    pub fn from_workflow(claim_id: ClaimId, workflow: &ClaimWorkflow) -> Self {
        let current = workflow.step();
        let steps = WizardStep::ordered()
            .into_iter()
            .map(|step| StepIndicator {
                step,
                index: step.index(),
                label: step.label(),
                current: step == current,
                completed: step < current,
                reachable: workflow.can_navigate_to(step),
            })
            .collect();

        let status = workflow.document_status();
        let documents = DocumentsView {
            source: status.source,
            complete: status.report.is_complete(),
            upload_missing: status.report.upload_missing_count(),
            override_granted: workflow.override_granted(),
            report: status.report,
            documents: workflow.documents().to_vec(),
            suggestions: workflow.suggestions().to_vec(),
            groups: workflow.groups().to_vec(),
        };

        Self {
            claim_id,
            step: current,
            step_label: current.label(),
            progress_percent: current.progress_percent(),
            steps,
            available_triggers: workflow.available_triggers(),
            import_id: workflow.import_id().cloned(),
            export_id: workflow.export_id().cloned(),
            import_only: workflow.import_id().is_some() && workflow.export_id().is_none(),
            analysis: workflow.current_analysis().cloned(),
            analysis_stale: workflow.analysis_is_stale(),
            generated_form: workflow.generated_form().cloned(),
            documents,
            in_flight: workflow.in_flight().clone(),
            error: workflow.error().cloned(),
        }
    }
}
