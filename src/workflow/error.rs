use crate::model::{CandidateId, Stage, Trigger};

/// Input problems caught locally; these never reach the backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Enter a sentence to simplify")]
    EmptySourceText,

    #[error("Temperature must be between 0.0 and 1.0 (got {0})")]
    TemperatureOutOfRange(f64),

    #[error("Select a candidate first")]
    NoCandidateSelected,

    #[error("Unknown candidate: {0}")]
    UnknownCandidate(CandidateId),

    #[error("The simplified sentence is empty")]
    EmptySimplifiedText,

    #[error("Enter a translation first")]
    EmptyTranslation,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("'{action}' is not available in stage {stage:?}")]
    NotAllowed { action: &'static str, stage: Stage },

    #[error("A {0} request is already in progress")]
    Busy(Trigger),

    /// Submitting without a translation needs an explicit yes from the user.
    #[error("No translation entered; confirm to finish anyway")]
    ConfirmationRequired,
}
