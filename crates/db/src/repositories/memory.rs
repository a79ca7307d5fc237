use std::collections::HashMap;

use tokio::sync::RwLock;

use terraloom_core::{Session, SessionId, SessionSummary};

use super::{RepositoryError, SessionRepository};

/// Test double for the SQL-backed store. The core never treats in-memory
/// caching as authoritative; this exists for unit and router tests only.
#[derive(Default)]
pub struct InMemorySessionRepository {
    sessions: RwLock<HashMap<String, Session>>,
}

#[async_trait::async_trait]
impl SessionRepository for InMemorySessionRepository {
    async fn load(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(&id.0).cloned())
    }

    async fn save(&self, session: &Session) -> Result<(), RepositoryError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.0.clone(), session.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, RepositoryError> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions
            .values()
            .map(|session| SessionSummary {
                id: session.id.clone(),
                title: session.title.clone(),
                last_modified: session.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.last_modified.cmp(&a.last_modified));
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use terraloom_core::{Session, SessionId};

    use super::InMemorySessionRepository;
    use crate::repositories::SessionRepository;

    #[tokio::test]
    async fn save_then_load_returns_equal_session() {
        let repo = InMemorySessionRepository::default();
        let mut session = Session::new(SessionId("s-1".to_string()), PathBuf::from("/tmp/s-1"));
        session.push_user_turn("hello");

        repo.save(&session).await.expect("save");
        let loaded = repo.load(&session.id).await.expect("load").expect("present");
        assert_eq!(loaded, session);
    }

    #[tokio::test]
    async fn list_returns_summaries() {
        let repo = InMemorySessionRepository::default();
        let mut session = Session::new(SessionId("s-1".to_string()), PathBuf::from("/tmp/s-1"));
        session.push_user_turn("build me a vpc");
        repo.save(&session).await.expect("save");

        let summaries = repo.list().await.expect("list");
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].title, "build me a vpc");
    }
}
