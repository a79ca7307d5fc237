//! The conversational state machine.
//!
//! intent-routing → {conversational, diagnostic, clarification-routing};
//! clarification-routing → {terminal-on-error, terminal-on-pending-questions,
//! generation}; generation → diagram → terminal. Guards at the
//! clarification-routing exit, in priority order: an existing error ends
//! the turn, then pending questions end the turn, otherwise generation
//! proceeds. Every terminal hands the full session back to the caller.

use std::sync::Arc;

use thiserror::Error;

use terraloom_core::{Intent, Session};

use crate::diagnostics::MetricsClient;
use crate::diagram::DiagramRenderer;
use crate::generate::GenerationOutcome;
use crate::llm::LlmClient;
use crate::{chat, clarify, generate, intent};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// Intent classification failed; fatal to the turn, no retry, no
    /// fallback label.
    #[error("intent classification failed: {0}")]
    Classification(String),
    /// Unexpected failure inside a pipeline handler.
    #[error("pipeline failure: {0}")]
    Pipeline(String),
}

/// Tagged union of pipeline results. Merging into session state goes
/// through exactly one total function (`apply`), so no branch can silently
/// drop a field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    Chat { answer: String },
    Clarification { questions: Vec<String> },
    Generated { code: String, diagram_path: String },
    GenerationFailed { error: String },
}

impl TurnOutcome {
    /// Merges the outcome into the session and reports whether new code
    /// was produced this turn. Every variant settles every per-turn signal
    /// field, which is what keeps the response precedence total.
    fn apply(self, session: &mut Session) -> bool {
        match self {
            Self::Chat { answer } => {
                session.chat_answer = answer;
                session.clarification_questions.clear();
                false
            }
            Self::Clarification { questions } => {
                session.chat_answer.clear();
                session.clarification_questions = questions;
                false
            }
            Self::Generated { code, diagram_path } => {
                session.chat_answer.clear();
                session.clarification_questions.clear();
                session.iac_code = code;
                session.iac_diagram_path = diagram_path;
                session.error_message.clear();
                true
            }
            Self::GenerationFailed { error } => {
                session.chat_answer.clear();
                session.clarification_questions.clear();
                session.iac_code.clear();
                session.iac_diagram_path.clear();
                session.error_message = error;
                false
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReport {
    pub outcome: TurnOutcome,
    /// The single user-facing signal selected by the fixed precedence.
    pub response_text: String,
}

pub struct Orchestrator {
    llm: Arc<dyn LlmClient>,
    metrics: Arc<dyn MetricsClient>,
    renderer: Arc<dyn DiagramRenderer>,
    default_region: String,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        metrics: Arc<dyn MetricsClient>,
        renderer: Arc<dyn DiagramRenderer>,
        default_region: impl Into<String>,
    ) -> Self {
        Self { llm, metrics, renderer, default_region: default_region.into() }
    }

    /// Executes one full graph run against a working copy of the session.
    /// The graph never loops; continuation is always the next inbound
    /// message, with classification re-run from scratch.
    pub async fn run_turn(&self, session: &mut Session) -> Result<TurnReport, OrchestratorError> {
        let intent = intent::classify(self.llm.as_ref(), &session.history)
            .await
            .map_err(|err| OrchestratorError::Classification(err.to_string()))?;
        session.last_intent = Some(intent);
        tracing::info!(session_id = %session.id, intent = intent.as_str(), "routing turn");

        let outcome = match intent {
            Intent::GeneralChat => {
                let answer = chat::answer(self.llm.as_ref(), &session.history)
                    .await
                    .map_err(|err| OrchestratorError::Pipeline(err.to_string()))?;
                TurnOutcome::Chat { answer }
            }
            Intent::DebuggingInquiry => {
                let answer = crate::diagnostics::diagnose(
                    self.llm.as_ref(),
                    self.metrics.as_ref(),
                    &session.history,
                )
                .await
                .map_err(|err| OrchestratorError::Pipeline(err.to_string()))?;
                TurnOutcome::Chat { answer }
            }
            Intent::CodeModification => self.run_generation_pipeline(session).await?,
        };

        let new_code_generated = outcome.clone().apply(session);
        session.updated_at = chrono::Utc::now();
        let response_text = session.response_text(new_code_generated);

        Ok(TurnReport { outcome, response_text })
    }

    async fn run_generation_pipeline(
        &self,
        session: &Session,
    ) -> Result<TurnOutcome, OrchestratorError> {
        let questions = clarify::questions(self.llm.as_ref(), &session.history)
            .await
            .map_err(|err| OrchestratorError::Pipeline(err.to_string()))?;

        // Guard order at the clarification-routing exit: error, then
        // pending questions, then generation.
        if !session.error_message.is_empty() {
            tracing::debug!(session_id = %session.id, "existing error ends the turn before generation");
            return Ok(TurnOutcome::Clarification { questions });
        }
        if !questions.is_empty() {
            tracing::debug!(session_id = %session.id, count = questions.len(), "pausing on clarification questions");
            return Ok(TurnOutcome::Clarification { questions });
        }

        let generated = generate::run(
            self.llm.as_ref(),
            &session.history,
            &session.iac_code,
            &self.default_region,
            &session.work_dir,
        )
        .await
        .map_err(|err| OrchestratorError::Pipeline(err.to_string()))?;

        match generated {
            GenerationOutcome::Rejected { error } => Ok(TurnOutcome::GenerationFailed { error }),
            GenerationOutcome::Generated { code } => {
                // Diagram rendering is best-effort; a failure degrades to
                // an empty artifact path, never a turn failure.
                let diagram_path = match self.renderer.render(&session.work_dir).await {
                    Ok(Some(path)) => path.to_string_lossy().into_owned(),
                    Ok(None) => String::new(),
                    Err(err) => {
                        tracing::warn!(error = %err, "diagram rendering failed");
                        String::new()
                    }
                };
                Ok(TurnOutcome::Generated { code, diagram_path })
            }
        }
    }
}
