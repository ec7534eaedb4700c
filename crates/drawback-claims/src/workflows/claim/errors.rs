use super::collaborators::CollaboratorError;
use super::domain::WizardStep;
use super::wizard::Trigger;

/// Failures surfaced by the claim workflow.
///
/// Collaborator failures normally never leave the session driver: they are converted into a
/// step-local [`StepError`](super::wizard::StepError). The variant exists for callers that
/// drive the synchronous core directly.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClaimError {
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
    #[error("response for {received} no longer matches the active claim ({active})")]
    StaleData { received: String, active: String },
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("cannot move from {} to {}: {reason}", .from.label(), .to.label())]
    NavigationBlocked {
        from: WizardStep,
        to: WizardStep,
        reason: &'static str,
    },
    #[error("{trigger:?} is not available from {}", .step.label())]
    TransitionUnavailable { step: WizardStep, trigger: Trigger },
    #[error("operation requires the {} step (currently {})", .expected.label(), .actual.label())]
    StepMismatch {
        expected: WizardStep,
        actual: WizardStep,
    },
}

impl ClaimError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn missing_field(field: &str) -> Self {
        Self::validation(field, "is required")
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn is_stale(&self) -> bool {
        matches!(self, Self::StaleData { .. })
    }
}
