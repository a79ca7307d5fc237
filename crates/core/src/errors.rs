use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("unknown intent label `{0}` (expected CODE_MODIFICATION|DEBUGGING_INQUIRY|GENERAL_CHAT)")]
    UnknownIntent(String),
    #[error("conversation history is empty")]
    EmptyHistory,
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("session `{0}` not found")]
    SessionNotFound(String),
    #[error("precondition failed: {0}")]
    Precondition(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("agent pipeline failure: {0}")]
    Pipeline(String),
}

impl ApplicationError {
    /// Precondition violations are user mistakes, everything else is a
    /// server-side failure. Transports map this to their status space.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Precondition(_) | Self::SessionNotFound(_) | Self::Domain(_)
        )
    }
}
