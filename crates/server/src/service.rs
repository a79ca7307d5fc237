//! Session-scoped application service behind the HTTP surface.
//!
//! Every operation follows the same shape: acquire the per-session lock,
//! load a working copy, mutate, save once, release. Two requests for the
//! same session never interleave; requests for different sessions run
//! concurrently.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::Mutex;

use terraloom_agent::terraform::PlanResult;
use terraloom_agent::{Orchestrator, Provisioner};
use terraloom_core::{ApplicationError, Session, SessionId, SessionSummary};
use terraloom_db::SessionRepository;

/// The session state after an operation, plus the single user-facing
/// message the transport should surface for it.
pub struct ServiceReply {
    pub session: Session,
    pub response: String,
}

pub struct ChatService {
    repo: Arc<dyn SessionRepository>,
    orchestrator: Orchestrator,
    provisioner: Arc<dyn Provisioner>,
    generated_dir: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ChatService {
    pub fn new(
        repo: Arc<dyn SessionRepository>,
        orchestrator: Orchestrator,
        provisioner: Arc<dyn Provisioner>,
        generated_dir: PathBuf,
    ) -> Self {
        Self { repo, orchestrator, provisioner, generated_dir, locks: Mutex::new(HashMap::new()) }
    }

    /// Runs one conversational turn. A missing `session_id` starts a new
    /// session; an unknown one is the caller's error. A failed turn leaves
    /// the persisted session exactly as the previous turn left it.
    pub async fn send_message(
        &self,
        session_id: Option<SessionId>,
        message: &str,
    ) -> Result<ServiceReply, ApplicationError> {
        if message.trim().is_empty() {
            return Err(ApplicationError::Precondition("message must not be empty".to_string()));
        }

        let id = session_id.unwrap_or_else(SessionId::generate);
        let guard = self.lock_session(&id).await;
        let result = self.send_message_locked(&id, message).await;
        self.release_session(&id, guard).await;
        result
    }

    async fn send_message_locked(
        &self,
        id: &SessionId,
        message: &str,
    ) -> Result<ServiceReply, ApplicationError> {
        let mut session = match self.load(id).await? {
            Some(session) => session,
            None => Session::new(id.clone(), self.generated_dir.join(&id.0)),
        };

        session.push_user_turn(message);
        let report = self
            .orchestrator
            .run_turn(&mut session)
            .await
            .map_err(|err| ApplicationError::Pipeline(err.to_string()))?;

        session.push_assistant_turn(&report.response_text);
        self.save(&session).await?;

        Ok(ServiceReply { session, response: report.response_text })
    }

    /// Previews the current definition. Requires generated code; the plan
    /// invalidates any previous apply record.
    pub async fn compute_plan(&self, id: SessionId) -> Result<ServiceReply, ApplicationError> {
        let guard = self.lock_session(&id).await;
        let result = self.compute_plan_locked(&id).await;
        self.release_session(&id, guard).await;
        result
    }

    async fn compute_plan_locked(&self, id: &SessionId) -> Result<ServiceReply, ApplicationError> {
        let mut session = self.require(id).await?;

        if session.iac_code.is_empty() {
            return Err(ApplicationError::Precondition(
                "no infrastructure code to plan; generate code first".to_string(),
            ));
        }

        match self
            .provisioner
            .init_and_plan(&session.work_dir)
            .await
            .map_err(|err| ApplicationError::Pipeline(err.to_string()))?
        {
            PlanResult::InitFailed { message } => {
                session.plan_output = message.clone();
                session.error_message = message;
            }
            PlanResult::Planned { output } => {
                session.plan_output = output;
                // A recorded init failure would otherwise gate every later
                // generation turn; a successful plan supersedes it.
                session.error_message.clear();
            }
        }
        session.apply_output.clear();
        session.updated_at = chrono::Utc::now();
        self.save(&session).await?;

        let response = session.plan_output.clone();
        Ok(ServiceReply { session, response })
    }

    /// Executes the previewed change. Requires a stored plan; success
    /// clears it so the next apply must re-plan against fresh state.
    pub async fn apply_plan(&self, id: SessionId) -> Result<ServiceReply, ApplicationError> {
        let guard = self.lock_session(&id).await;
        let result = self.apply_plan_locked(&id).await;
        self.release_session(&id, guard).await;
        result
    }

    async fn apply_plan_locked(&self, id: &SessionId) -> Result<ServiceReply, ApplicationError> {
        let mut session = self.require(id).await?;

        if session.plan_output.is_empty() {
            return Err(ApplicationError::Precondition(
                "no plan to apply; run a plan first".to_string(),
            ));
        }

        let output = self
            .provisioner
            .apply(&session.work_dir)
            .await
            .map_err(|err| ApplicationError::Pipeline(err.to_string()))?;

        session.apply_output = output;
        session.plan_output.clear();
        session.updated_at = chrono::Utc::now();
        self.save(&session).await?;

        let response = session.apply_output.clone();
        Ok(ServiceReply { session, response })
    }

    pub async fn list_sessions(&self) -> Result<Vec<SessionSummary>, ApplicationError> {
        self.repo.list().await.map_err(|err| ApplicationError::Persistence(err.to_string()))
    }

    async fn require(&self, id: &SessionId) -> Result<Session, ApplicationError> {
        self.load(id).await?.ok_or_else(|| ApplicationError::SessionNotFound(id.0.clone()))
    }

    async fn load(&self, id: &SessionId) -> Result<Option<Session>, ApplicationError> {
        self.repo.load(id).await.map_err(|err| ApplicationError::Persistence(err.to_string()))
    }

    async fn save(&self, session: &Session) -> Result<(), ApplicationError> {
        self.repo.save(session).await.map_err(|err| ApplicationError::Persistence(err.to_string()))
    }

    /// Hands out the per-session mutex. The map itself is only locked long
    /// enough to clone the entry; the session lock is held by the caller
    /// for the duration of the operation.
    async fn lock_session(&self, id: &SessionId) -> tokio::sync::OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self.locks.lock().await;
            locks.entry(id.0.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
        };
        entry.lock_owned().await
    }

    /// Drops the guard and evicts the map entry when nothing else holds or
    /// awaits that lock, so the map stays bounded by in-flight sessions.
    /// A waiting request holds its own `Arc` clone and keeps the entry.
    async fn release_session(&self, id: &SessionId, guard: tokio::sync::OwnedMutexGuard<()>) {
        drop(guard);
        let mut locks = self.locks.lock().await;
        if locks.get(&id.0).is_some_and(|entry| Arc::strong_count(entry) == 1) {
            locks.remove(&id.0);
        }
    }

    #[cfg(test)]
    pub(crate) async fn lock_entries(&self) -> usize {
        self.locks.lock().await.len()
    }
}
