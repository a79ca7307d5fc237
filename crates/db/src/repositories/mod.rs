use async_trait::async_trait;
use thiserror::Error;

use terraloom_core::{Session, SessionId, SessionSummary};

pub mod memory;
pub mod session;

pub use memory::InMemorySessionRepository;
pub use session::SqlSessionRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

/// Durable, keyed storage of per-conversation state. Persisted copies are
/// exclusively owned by the store; callers load a working copy, mutate it,
/// and save it back once per request.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError>;
    async fn save(&self, session: &Session) -> Result<(), RepositoryError>;
    async fn list(&self) -> Result<Vec<SessionSummary>, RepositoryError>;
}
