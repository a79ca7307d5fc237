//! Conversational Q&A branch. Pure function of history plus one completion
//! call; never touches the infrastructure definition.

use anyhow::{Context, Result};

use terraloom_core::Turn;

use crate::llm::LlmClient;
use crate::prompts;

pub async fn answer(llm: &dyn LlmClient, history: &[Turn]) -> Result<String> {
    let answer = llm
        .complete(&prompts::general_chat(history))
        .await
        .context("conversational completion failed")?;
    Ok(answer.trim().to_string())
}

#[cfg(test)]
mod tests {
    use terraloom_core::Turn;

    use super::answer;
    use crate::llm::scripted::ScriptedLlm;

    #[tokio::test]
    async fn returns_trimmed_answer() {
        let llm = ScriptedLlm::new();
        llm.push_response("  Terraform is an IaC tool.\n").await;

        let text = answer(&llm, &[Turn::user("what is terraform?")]).await.expect("answer");
        assert_eq!(text, "Terraform is an IaC tool.");
    }

    #[tokio::test]
    async fn propagates_llm_failure() {
        let llm = ScriptedLlm::new();
        llm.push_error("timeout").await;
        assert!(answer(&llm, &[Turn::user("hi")]).await.is_err());
    }
}
