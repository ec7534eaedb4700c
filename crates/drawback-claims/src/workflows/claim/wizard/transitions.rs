use serde::{Deserialize, Serialize};

use crate::workflows::claim::domain::WizardStep;

/// User or system event that asks the wizard to move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    Start,
    Continue,
    SkipInstructions,
    SkipExports,
    OverrideDocuments,
    StartNewClaim,
}

/// Condition that must hold before a transition is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    Always,
    ImportPresent,
    AnalysisAvailable,
    DocumentsComplete,
    FormGenerated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRule {
    pub from: WizardStep,
    pub trigger: Trigger,
    pub to: WizardStep,
    pub guard: Guard,
}

const fn rule(from: WizardStep, trigger: Trigger, to: WizardStep, guard: Guard) -> TransitionRule {
    TransitionRule {
        from,
        trigger,
        to,
        guard,
    }
}

/// Every legal wizard move. Anything not listed is rejected.
pub const TRANSITIONS: &[TransitionRule] = &[
    rule(
        WizardStep::Welcome,
        Trigger::Start,
        WizardStep::Instructions,
        Guard::Always,
    ),
    rule(
        WizardStep::Welcome,
        Trigger::Continue,
        WizardStep::Instructions,
        Guard::Always,
    ),
    rule(
        WizardStep::Instructions,
        Trigger::Continue,
        WizardStep::UploadImports,
        Guard::Always,
    ),
    rule(
        WizardStep::Instructions,
        Trigger::SkipInstructions,
        WizardStep::UploadImports,
        Guard::Always,
    ),
    rule(
        WizardStep::UploadImports,
        Trigger::Continue,
        WizardStep::UploadExports,
        Guard::ImportPresent,
    ),
    rule(
        WizardStep::UploadExports,
        Trigger::Continue,
        WizardStep::Analysis,
        Guard::ImportPresent,
    ),
    rule(
        WizardStep::UploadExports,
        Trigger::SkipExports,
        WizardStep::Analysis,
        Guard::ImportPresent,
    ),
    rule(
        WizardStep::Analysis,
        Trigger::Continue,
        WizardStep::UploadDocuments,
        Guard::AnalysisAvailable,
    ),
    rule(
        WizardStep::UploadDocuments,
        Trigger::Continue,
        WizardStep::GenerateForm,
        Guard::DocumentsComplete,
    ),
    rule(
        WizardStep::UploadDocuments,
        Trigger::OverrideDocuments,
        WizardStep::GenerateForm,
        Guard::Always,
    ),
    rule(
        WizardStep::GenerateForm,
        Trigger::Continue,
        WizardStep::Completed,
        Guard::FormGenerated,
    ),
    rule(
        WizardStep::Completed,
        Trigger::StartNewClaim,
        WizardStep::Welcome,
        Guard::Always,
    ),
];

pub fn rule_for(step: WizardStep, trigger: Trigger) -> Option<&'static TransitionRule> {
    TRANSITIONS
        .iter()
        .find(|rule| rule.from == step && rule.trigger == trigger)
}

/// The ordinary "next" edge out of a step, used when jumping one step ahead.
pub fn forward_rule(step: WizardStep) -> Option<&'static TransitionRule> {
    rule_for(step, Trigger::Continue)
}
