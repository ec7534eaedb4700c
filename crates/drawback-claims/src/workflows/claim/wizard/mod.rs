//! Synchronous claim wizard.
//!
//! [`ClaimWorkflow`] owns every piece of session state and never performs I/O. Moves return a
//! [`Transition`] listing the [`Effect`]s the caller must run; completed collaborator calls are
//! fed back through the `apply_*` methods, which compare the response key with the current
//! claim and discard anything stale. A failed guard leaves the workflow untouched.

mod transitions;

pub use transitions::{forward_rule, rule_for, Guard, TransitionRule, Trigger, TRANSITIONS};

use serde::Serialize;
use tracing::{debug, info, warn};

use super::cache::AnalysisCache;
use super::catalog::RequirementCatalog;
use super::collaborators::{AnalysisReference, CollaboratorError};
use super::completeness::{evaluate, CompletenessReport};
use super::detector::detect;
use super::domain::{
    AnalysisKey, AnalysisResult, CompanyInfo, DocumentGroup, DocumentId, DocumentScope,
    ExportId, FormDefaults, FormReference, ImportId, PotentialApplication, UploadedDocument,
    WizardStep,
};
use super::groups::DocumentGroupRegistry;
use super::ClaimError;

/// Collaborator work requested by a move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Analyze(AnalysisKey),
    RefreshDocuments(DocumentScope),
}

/// Outcome of a successful move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub from: WizardStep,
    pub to: WizardStep,
    pub trigger: Option<Trigger>,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Analysis,
    Upload,
    DocumentRefresh,
    FormGeneration,
}

/// Dismissible failure attached to the step whose operation failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepError {
    pub step: WizardStep,
    pub operation: OperationKind,
    pub message: String,
    pub retryable: bool,
}

impl StepError {
    fn from_collaborator(
        step: WizardStep,
        operation: OperationKind,
        error: &CollaboratorError,
    ) -> Self {
        let retryable = match error {
            CollaboratorError::Network(_) | CollaboratorError::Timeout { .. } => true,
            CollaboratorError::Service { status, .. } => *status >= 500,
            CollaboratorError::NotFound(_) | CollaboratorError::Decode(_) => false,
        };
        Self {
            step,
            operation,
            message: error.to_string(),
            retryable,
        }
    }
}

/// Outstanding collaborator requests, one marker per operation kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InFlight {
    pub analysis: Option<AnalysisKey>,
    pub documents: Option<DocumentScope>,
    pub form: Option<AnalysisKey>,
    pub uploads: u32,
}

impl InFlight {
    pub fn is_idle(&self) -> bool {
        self.analysis.is_none() && self.documents.is_none() && self.form.is_none() && self.uploads == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusSource {
    Server,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentStatus {
    pub scope: DocumentScope,
    pub source: StatusSource,
    pub report: CompletenessReport,
}

/// Validated form generation request handed to the form generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRequest {
    pub company: CompanyInfo,
    pub reference: AnalysisReference,
}

impl FormRequest {
    pub fn key(&self) -> &AnalysisKey {
        &self.reference.key
    }
}

#[derive(Debug, Default)]
struct ClaimContext {
    import_id: Option<ImportId>,
    export_id: Option<ExportId>,
    analysis: Option<(AnalysisKey, AnalysisResult)>,
    form: Option<(AnalysisKey, FormReference)>,
    documents_override: bool,
}

#[derive(Debug)]
pub struct ClaimWorkflow {
    step: WizardStep,
    context: ClaimContext,
    catalog: RequirementCatalog,
    cache: AnalysisCache,
    documents: Vec<UploadedDocument>,
    suggestions: Vec<PotentialApplication>,
    groups: DocumentGroupRegistry,
    server_status: Option<(DocumentScope, CompletenessReport)>,
    in_flight: InFlight,
    error: Option<StepError>,
}

impl ClaimWorkflow {
    pub fn new(catalog: RequirementCatalog) -> Self {
        Self {
            step: WizardStep::Welcome,
            context: ClaimContext::default(),
            catalog,
            cache: AnalysisCache::new(),
            documents: Vec::new(),
            suggestions: Vec::new(),
            groups: DocumentGroupRegistry::new(),
            server_status: None,
            in_flight: InFlight::default(),
            error: None,
        }
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn import_id(&self) -> Option<&ImportId> {
        self.context.import_id.as_ref()
    }

    pub fn export_id(&self) -> Option<&ExportId> {
        self.context.export_id.as_ref()
    }

    pub fn analysis_key(&self) -> Option<AnalysisKey> {
        self.context
            .import_id
            .clone()
            .map(|import_id| AnalysisKey::new(import_id, self.context.export_id.clone()))
    }

    pub fn scope(&self) -> DocumentScope {
        DocumentScope::for_claim(
            self.context.import_id.clone(),
            self.context.export_id.clone(),
        )
    }

    /// Analysis for the active (import, export) pair, if one has completed.
    pub fn current_analysis(&self) -> Option<&AnalysisResult> {
        let key = self.analysis_key()?;
        self.context
            .analysis
            .as_ref()
            .filter(|(stored, _)| *stored == key)
            .map(|(_, result)| result)
    }

    /// Whether the last stored analysis belongs to a different dataset pair.
    pub fn analysis_is_stale(&self) -> bool {
        self.context.analysis.is_some() && self.current_analysis().is_none()
    }

    pub fn generated_form(&self) -> Option<&FormReference> {
        let key = self.analysis_key()?;
        self.context
            .form
            .as_ref()
            .filter(|(stored, _)| *stored == key)
            .map(|(_, form)| form)
    }

    pub fn catalog(&self) -> &RequirementCatalog {
        &self.catalog
    }

    pub fn cache(&self) -> &AnalysisCache {
        &self.cache
    }

    pub fn documents(&self) -> &[UploadedDocument] {
        &self.documents
    }

    pub fn suggestions(&self) -> &[PotentialApplication] {
        &self.suggestions
    }

    pub fn groups(&self) -> &[DocumentGroup] {
        self.groups.list()
    }

    pub fn in_flight(&self) -> &InFlight {
        &self.in_flight
    }

    pub fn error(&self) -> Option<&StepError> {
        self.error.as_ref()
    }

    pub fn dismiss_error(&mut self) -> Option<StepError> {
        self.error.take()
    }

    pub fn override_granted(&self) -> bool {
        self.context.documents_override
    }

    /// Completeness for the active scope: the server's report when it matches, else local.
    pub fn document_status(&self) -> DocumentStatus {
        let scope = self.scope();
        match &self.server_status {
            Some((reported, report)) if *reported == scope => DocumentStatus {
                scope,
                source: StatusSource::Server,
                report: report.clone(),
            },
            _ => {
                let report = evaluate(self.catalog.categories(), &self.documents, &scope);
                DocumentStatus {
                    scope,
                    source: StatusSource::Local,
                    report,
                }
            }
        }
    }

    /// Whether every required category is satisfied for the active scope.
    pub fn documents_complete(&self) -> bool {
        self.document_status().report.missing_count == 0
    }

    /// Triggers whose guard currently holds.
    pub fn available_triggers(&self) -> Vec<Trigger> {
        TRANSITIONS
            .iter()
            .filter(|rule| rule.from == self.step && self.check_guard(rule.guard).is_ok())
            .map(|rule| rule.trigger)
            .collect()
    }

    pub fn can_navigate_to(&self, target: WizardStep) -> bool {
        self.navigation_rule(target).is_ok()
    }

    pub fn fire(&mut self, trigger: Trigger) -> Result<Transition, ClaimError> {
        let rule = rule_for(self.step, trigger).ok_or(ClaimError::TransitionUnavailable {
            step: self.step,
            trigger,
        })?;
        self.check_guard(rule.guard)
            .map_err(|reason| ClaimError::NavigationBlocked {
                from: self.step,
                to: rule.to,
                reason,
            })?;
        Ok(self.enter(rule.to, Some(trigger)))
    }

    /// Step-indicator navigation: any earlier step, or the next one when its guard holds.
    pub fn jump_to(&mut self, target: WizardStep) -> Result<Transition, ClaimError> {
        let rule = self.navigation_rule(target)?;
        Ok(self.enter(target, rule.map(|rule| rule.trigger)))
    }

    pub fn jump_to_index(&mut self, index: usize) -> Result<Transition, ClaimError> {
        let target = WizardStep::from_index(index)
            .ok_or_else(|| ClaimError::not_found("step", index.to_string()))?;
        self.jump_to(target)
    }

    pub fn go_back(&mut self) -> Result<Transition, ClaimError> {
        let target = self
            .step
            .previous()
            .ok_or(ClaimError::NavigationBlocked {
                from: self.step,
                to: self.step,
                reason: "already at the first step",
            })?;
        Ok(self.enter(target, None))
    }

    /// Record the uploaded import dataset; advances when waiting on it.
    pub fn import_received(&mut self, import_id: ImportId) -> Result<Option<Transition>, ClaimError> {
        if self.context.import_id.as_ref() != Some(&import_id) {
            if let Some(previous) = self.context.import_id.take() {
                self.cache.invalidate(Some(&previous), None);
            }
            info!(import_id = %import_id, "import dataset recorded");
            self.context.import_id = Some(import_id);
            self.server_status = None;
        }

        if self.step == WizardStep::UploadImports {
            return self.fire(Trigger::Continue).map(Some);
        }
        Ok(None)
    }

    /// Record the uploaded export dataset; advances to analysis when waiting on it.
    pub fn export_received(&mut self, export_id: ExportId) -> Result<Option<Transition>, ClaimError> {
        if self.context.export_id.as_ref() != Some(&export_id) {
            if let Some(previous) = self.context.export_id.take() {
                self.cache.invalidate(None, Some(&previous));
            }
            info!(export_id = %export_id, "export dataset recorded");
            self.context.export_id = Some(export_id);
            self.server_status = None;
        }

        if self.step == WizardStep::UploadExports {
            return self.fire(Trigger::Continue).map(Some);
        }
        Ok(None)
    }

    /// Re-request a failed analysis. A cached result for the active pair is reused.
    pub fn retry_analysis(&mut self) -> Result<Option<Effect>, ClaimError> {
        self.manual_analysis(false)
    }

    /// Re-run analysis for the active pair, bypassing the cache.
    pub fn refresh_analysis(&mut self) -> Result<Option<Effect>, ClaimError> {
        self.manual_analysis(true)
    }

    pub fn apply_analysis(
        &mut self,
        key: AnalysisKey,
        outcome: Result<AnalysisResult, CollaboratorError>,
    ) -> Result<(), ClaimError> {
        if self.in_flight.analysis.as_ref() == Some(&key) {
            self.in_flight.analysis = None;
        }
        self.ensure_current(&key)?;

        match outcome {
            Ok(result) => {
                info!(
                    key = %key,
                    eligible = result.eligible_transactions,
                    refund = result.potential_refund,
                    "analysis completed"
                );
                self.cache.put(key.clone(), result.clone());
                self.context.analysis = Some((key, result));
                self.clear_error(OperationKind::Analysis);
            }
            Err(error) => {
                warn!(key = %key, error = %error, "analysis failed");
                self.record_failure(WizardStep::Analysis, OperationKind::Analysis, &error);
            }
        }
        Ok(())
    }

    /// Mark a document refresh as running for the active scope.
    pub fn begin_document_refresh(&mut self) -> Option<Effect> {
        let scope = self.scope();
        if self.in_flight.documents.as_ref() == Some(&scope) {
            debug!("document refresh already in flight");
            return None;
        }
        self.in_flight.documents = Some(scope.clone());
        Some(Effect::RefreshDocuments(scope))
    }

    /// Apply a document listing and the server status fetched for `scope`.
    ///
    /// The listing is global and always applied. A status for an outdated scope is dropped and
    /// reported as stale; a failed status fetch falls back to local evaluation.
    pub fn apply_document_refresh(
        &mut self,
        scope: DocumentScope,
        listing: Result<Vec<UploadedDocument>, CollaboratorError>,
        status: Result<CompletenessReport, CollaboratorError>,
    ) -> Result<(), ClaimError> {
        if self.in_flight.documents.as_ref() == Some(&scope) {
            self.in_flight.documents = None;
        }

        match listing {
            Ok(documents) => {
                self.replace_documents(documents);
                self.clear_error(OperationKind::DocumentRefresh);
            }
            Err(error) => {
                warn!(error = %error, "document listing failed");
                self.record_failure(
                    WizardStep::UploadDocuments,
                    OperationKind::DocumentRefresh,
                    &error,
                );
            }
        }

        let active = self.scope();
        if scope != active {
            debug!("discarding requirement status for an outdated scope");
            return Err(ClaimError::StaleData {
                received: describe_scope(&scope),
                active: describe_scope(&active),
            });
        }

        match status {
            Ok(report) => self.server_status = Some((scope, report)),
            Err(error) => {
                warn!(error = %error, "requirement status unavailable, evaluating locally");
                self.server_status = None;
            }
        }
        Ok(())
    }

    pub fn begin_upload(&mut self) {
        self.in_flight.uploads += 1;
    }

    pub fn finish_upload(&mut self) {
        self.in_flight.uploads = self.in_flight.uploads.saturating_sub(1);
    }

    pub fn record_failure(
        &mut self,
        step: WizardStep,
        operation: OperationKind,
        error: &CollaboratorError,
    ) {
        self.error = Some(StepError::from_collaborator(step, operation, error));
    }

    pub fn replace_documents(&mut self, documents: Vec<UploadedDocument>) {
        self.documents = documents;
        self.redetect();
    }

    pub fn add_document(&mut self, document: UploadedDocument) {
        self.documents.retain(|existing| existing.id != document.id);
        self.documents.push(document);
        self.server_status = None;
        self.redetect();
    }

    pub fn remove_document(&mut self, document_id: &DocumentId) -> Result<UploadedDocument, ClaimError> {
        let position = self
            .documents
            .iter()
            .position(|document| &document.id == document_id)
            .ok_or_else(|| ClaimError::not_found("document", document_id.to_string()))?;
        let removed = self.documents.remove(position);
        self.server_status = None;
        self.redetect();
        Ok(removed)
    }

    pub fn create_group(
        &mut self,
        name: &str,
        document_ids: &[DocumentId],
    ) -> Result<DocumentGroup, ClaimError> {
        self.groups.create(name, document_ids, &self.documents)
    }

    /// Persist the suggestion at `index` as a group, then re-run detection.
    pub fn materialize_suggestion(&mut self, index: usize) -> Result<DocumentGroup, ClaimError> {
        let suggestion = self
            .suggestions
            .get(index)
            .cloned()
            .ok_or_else(|| ClaimError::not_found("suggestion", index.to_string()))?;
        let group = self
            .groups
            .materialize_from_suggestion(&suggestion, &self.documents)?;
        self.redetect();
        Ok(group)
    }

    /// Validate company details and mark form generation as in flight.
    ///
    /// Returns `None` when a request for the same analysis is already running.
    pub fn begin_form(
        &mut self,
        company: CompanyInfo,
        defaults: &FormDefaults,
    ) -> Result<Option<FormRequest>, ClaimError> {
        if self.step != WizardStep::GenerateForm {
            return Err(ClaimError::StepMismatch {
                expected: WizardStep::GenerateForm,
                actual: self.step,
            });
        }

        let company = company.with_defaults(defaults);
        company.validate()?;

        let key = self
            .analysis_key()
            .ok_or_else(|| ClaimError::missing_field("import_id"))?;
        let results_file = self
            .current_analysis()
            .ok_or_else(|| {
                ClaimError::validation("analysis", "no analysis available for the active datasets")
            })?
            .results_file
            .clone();

        if self.in_flight.form.as_ref() == Some(&key) {
            debug!(key = %key, "form generation already in flight");
            return Ok(None);
        }

        self.in_flight.form = Some(key.clone());
        self.clear_error(OperationKind::FormGeneration);
        Ok(Some(FormRequest {
            company,
            reference: AnalysisReference { key, results_file },
        }))
    }

    pub fn apply_form(
        &mut self,
        key: AnalysisKey,
        outcome: Result<FormReference, CollaboratorError>,
    ) -> Result<Option<Transition>, ClaimError> {
        if self.in_flight.form.as_ref() == Some(&key) {
            self.in_flight.form = None;
        }
        self.ensure_current(&key)?;

        match outcome {
            Ok(form) => {
                info!(key = %key, form_path = %form.form_path, "drawback form generated");
                self.context.form = Some((key, form));
                self.clear_error(OperationKind::FormGeneration);
                if self.step == WizardStep::GenerateForm {
                    return self.fire(Trigger::Continue).map(Some);
                }
                Ok(None)
            }
            Err(error) => {
                warn!(key = %key, error = %error, "form generation failed");
                self.record_failure(
                    WizardStep::GenerateForm,
                    OperationKind::FormGeneration,
                    &error,
                );
                Ok(None)
            }
        }
    }

    fn check_guard(&self, guard: Guard) -> Result<(), &'static str> {
        let failure = match guard {
            Guard::Always => None,
            Guard::ImportPresent => self
                .context
                .import_id
                .is_none()
                .then_some("an import dataset must be uploaded first"),
            Guard::AnalysisAvailable => self
                .current_analysis()
                .is_none()
                .then_some("analysis has not completed for the active datasets"),
            Guard::DocumentsComplete => (!self.context.documents_override
                && !self.documents_complete())
            .then_some("required documents are missing"),
            Guard::FormGenerated => self
                .generated_form()
                .is_none()
                .then_some("the drawback form has not been generated"),
        };
        failure.map_or(Ok(()), Err)
    }

    fn navigation_rule(
        &self,
        target: WizardStep,
    ) -> Result<Option<&'static TransitionRule>, ClaimError> {
        let current = self.step;
        if target <= current {
            return Ok(None);
        }

        let blocked = |reason: &'static str| ClaimError::NavigationBlocked {
            from: current,
            to: target,
            reason,
        };
        if Some(target) != current.next() {
            return Err(blocked("steps cannot be skipped"));
        }
        let rule = forward_rule(current).ok_or_else(|| blocked("no forward move from this step"))?;
        self.check_guard(rule.guard).map_err(blocked)?;
        Ok(Some(rule))
    }

    fn enter(&mut self, to: WizardStep, trigger: Option<Trigger>) -> Transition {
        let from = self.step;
        match trigger {
            Some(Trigger::SkipExports) => {
                if let Some(export_id) = self.context.export_id.take() {
                    debug!(export_id = %export_id, "export dataset dropped for import-only analysis");
                    self.server_status = None;
                }
            }
            Some(Trigger::OverrideDocuments) => {
                warn!("document requirements overridden");
                self.context.documents_override = true;
            }
            Some(Trigger::StartNewClaim) => self.reset_claim(),
            _ => {}
        }

        self.step = to;
        let effects = self.effects_on_entry(to);
        info!(from = from.label(), to = to.label(), "wizard step changed");
        Transition {
            from,
            to,
            trigger,
            effects,
        }
    }

    fn effects_on_entry(&mut self, step: WizardStep) -> Vec<Effect> {
        match step {
            WizardStep::Analysis => self.request_analysis(false).into_iter().collect(),
            WizardStep::UploadDocuments => self.begin_document_refresh().into_iter().collect(),
            _ => Vec::new(),
        }
    }

    fn manual_analysis(&mut self, force: bool) -> Result<Option<Effect>, ClaimError> {
        if self.step != WizardStep::Analysis {
            return Err(ClaimError::StepMismatch {
                expected: WizardStep::Analysis,
                actual: self.step,
            });
        }
        if self.context.import_id.is_none() {
            return Err(ClaimError::missing_field("import_id"));
        }
        self.clear_error(OperationKind::Analysis);
        Ok(self.request_analysis(force))
    }

    fn request_analysis(&mut self, force: bool) -> Option<Effect> {
        let key = self.analysis_key()?;

        if !force {
            if let Some(result) = self.cache.get(&key).cloned() {
                debug!(key = %key, "analysis served from cache");
                self.context.analysis = Some((key, result));
                return None;
            }
        }

        if self.in_flight.analysis.as_ref() == Some(&key) {
            debug!(key = %key, "analysis already in flight");
            return None;
        }

        self.in_flight.analysis = Some(key.clone());
        Some(Effect::Analyze(key))
    }

    fn ensure_current(&self, key: &AnalysisKey) -> Result<(), ClaimError> {
        let active = self.analysis_key();
        if active.as_ref() == Some(key) {
            return Ok(());
        }
        debug!(received = %key, "discarding stale response");
        Err(ClaimError::StaleData {
            received: key.to_string(),
            active: active.map_or_else(|| "none".to_string(), |key| key.to_string()),
        })
    }

    fn clear_error(&mut self, operation: OperationKind) {
        if self
            .error
            .as_ref()
            .is_some_and(|error| error.operation == operation)
        {
            self.error = None;
        }
    }

    fn redetect(&mut self) {
        self.suggestions = detect(&self.documents);
        debug!(
            documents = self.documents.len(),
            suggestions = self.suggestions.len(),
            "potential applications recomputed"
        );
    }

    fn reset_claim(&mut self) {
        info!("starting a new claim");
        self.context = ClaimContext::default();
        self.cache.clear();
        self.server_status = None;
        self.in_flight.analysis = None;
        self.in_flight.documents = None;
        self.in_flight.form = None;
        self.error = None;
    }
}

fn describe_scope(scope: &DocumentScope) -> String {
    format!(
        "{}/{}",
        scope.import_id.as_ref().map_or("-", |id| id.0.as_str()),
        scope.export_id.as_ref().map_or("-", |id| id.0.as_str())
    )
}
