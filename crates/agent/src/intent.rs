//! Single-shot intent classification over the full turn history.

use anyhow::{Context, Result};

use terraloom_core::{DomainError, Intent, Turn};

use crate::llm::LlmClient;
use crate::prompts;

/// Classifies the latest user message. Requires a non-empty history. Any
/// failure here — transport or an unparseable label — is fatal to the
/// turn; there is no local fallback label and no retry.
pub async fn classify(llm: &dyn LlmClient, history: &[Turn]) -> Result<Intent> {
    if history.is_empty() {
        return Err(DomainError::EmptyHistory.into());
    }

    let label = llm
        .complete(&prompts::intent_classification(history))
        .await
        .context("intent classification call failed")?;

    let intent = label.parse::<Intent>()?;
    tracing::debug!(intent = intent.as_str(), "classified user intent");
    Ok(intent)
}

#[cfg(test)]
mod tests {
    use terraloom_core::{Intent, Turn};

    use super::classify;
    use crate::llm::scripted::ScriptedLlm;

    #[tokio::test]
    async fn parses_label_with_whitespace() {
        let llm = ScriptedLlm::new();
        llm.push_response(" DEBUGGING_INQUIRY \n").await;

        let intent = classify(&llm, &[Turn::user("is my db up?")]).await.expect("classify");
        assert_eq!(intent, Intent::DebuggingInquiry);
    }

    #[tokio::test]
    async fn unknown_label_is_fatal() {
        let llm = ScriptedLlm::new();
        llm.push_response("SOMETHING_ELSE").await;
        assert!(classify(&llm, &[Turn::user("hi")]).await.is_err());
    }

    #[tokio::test]
    async fn llm_failure_propagates() {
        let llm = ScriptedLlm::new();
        llm.push_error("upstream 500").await;
        assert!(classify(&llm, &[Turn::user("hi")]).await.is_err());
    }

    #[tokio::test]
    async fn empty_history_is_rejected_before_any_call() {
        let llm = ScriptedLlm::new();
        assert!(classify(&llm, &[]).await.is_err());
        assert_eq!(llm.calls().await, 0);
    }
}
