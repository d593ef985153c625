use thiserror::Error;

use lyra_contract::{LYRA_ERROR_INTERNAL, LYRA_ERROR_INVALID_INPUT, LYRA_ERROR_NOT_FOUND};

#[derive(Debug, Error)]
/// Enumerates supported `OrchestratorError` values.
///
/// Collaborator unavailability/failure never appears here: the reply
/// generator resolves both to a fallback reply, so only caller mistakes and
/// infrastructure failures escape the pipeline.
pub enum OrchestratorError {
    #[error("performer {0} not found")]
    PerformerNotFound(i64),
    #[error("conversation {0} not found")]
    ConversationNotFound(i64),
    #[error("draft message {0} not found")]
    DraftNotFound(i64),
    #[error("message {0} is not a draft")]
    MessageNotADraft(i64),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("infrastructure failure: {0}")]
    Infrastructure(#[from] anyhow::Error),
}

impl OrchestratorError {
    /// Stable error code surfaced through the gateway contract.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::PerformerNotFound(_)
            | Self::ConversationNotFound(_)
            | Self::DraftNotFound(_) => LYRA_ERROR_NOT_FOUND,
            Self::MessageNotADraft(_) | Self::InvalidInput(_) => LYRA_ERROR_INVALID_INPUT,
            Self::Infrastructure(_) => LYRA_ERROR_INTERNAL,
        }
    }
}
