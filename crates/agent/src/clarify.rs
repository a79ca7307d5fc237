//! Clarification gate ahead of code generation.
//!
//! The naming rule is fail-closed: a resource-creation request without a
//! user-supplied name must yield a question. The output parsing is
//! fail-open: a malformed model response counts as "no questions", so a
//! formatting slip can never deadlock the pipeline. This asymmetry is
//! deliberate; do not make both fail-closed.

use anyhow::{Context, Result};

use terraloom_core::definition::strip_code_fences;
use terraloom_core::Turn;

use crate::llm::LlmClient;
use crate::prompts;

pub async fn questions(llm: &dyn LlmClient, history: &[Turn]) -> Result<Vec<String>> {
    let raw = llm
        .complete(&prompts::clarification(history))
        .await
        .context("clarification completion failed")?;

    let stripped = strip_code_fences(&raw);
    match serde_json::from_str::<Vec<String>>(&stripped) {
        Ok(parsed) => Ok(parsed.into_iter().filter(|q| !q.trim().is_empty()).collect()),
        Err(err) => {
            tracing::warn!(error = %err, "clarification output not a JSON string array, treating as no questions");
            Ok(Vec::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use terraloom_core::Turn;

    use super::questions;
    use crate::llm::scripted::ScriptedLlm;

    fn history() -> Vec<Turn> {
        vec![Turn::user("create an s3 bucket")]
    }

    #[tokio::test]
    async fn parses_question_array() {
        let llm = ScriptedLlm::new();
        llm.push_response(r#"["What should the bucket be named?"]"#).await;

        let qs = questions(&llm, &history()).await.expect("questions");
        assert_eq!(qs, vec!["What should the bucket be named?"]);
    }

    #[tokio::test]
    async fn empty_array_means_unblocked() {
        let llm = ScriptedLlm::new();
        llm.push_response("[]").await;
        assert!(questions(&llm, &history()).await.expect("questions").is_empty());
    }

    #[tokio::test]
    async fn fenced_json_is_unwrapped() {
        let llm = ScriptedLlm::new();
        llm.push_response("```\n[\"Which region?\"]\n```").await;
        assert_eq!(questions(&llm, &history()).await.expect("questions"), vec!["Which region?"]);
    }

    #[tokio::test]
    async fn malformed_output_fails_open() {
        let llm = ScriptedLlm::new();
        llm.push_response("I think you should name the bucket yourself.").await;
        assert!(questions(&llm, &history()).await.expect("questions").is_empty());
    }

    #[tokio::test]
    async fn blank_questions_are_dropped() {
        let llm = ScriptedLlm::new();
        llm.push_response(r#"["", "  ", "Name for the instance?"]"#).await;
        assert_eq!(
            questions(&llm, &history()).await.expect("questions"),
            vec!["Name for the instance?"]
        );
    }

    #[tokio::test]
    async fn transport_failure_still_propagates() {
        let llm = ScriptedLlm::new();
        llm.push_error("unreachable").await;
        assert!(questions(&llm, &history()).await.is_err());
    }
}
