//! Infrastructure-definition generation: full-file replace-and-validate.
//! The definition file is only ever written after validation passes;
//! rejected text survives solely inside the recorded error message.

use std::path::Path;

use anyhow::{Context, Result};

use terraloom_core::definition::{strip_code_fences, validate_definition};
use terraloom_core::Turn;

use crate::llm::LlmClient;
use crate::prompts;

pub const DEFINITION_FILE_NAME: &str = "main.tf";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenerationOutcome {
    /// Validated replacement definition, already written to the work dir.
    Generated { code: String },
    /// Validation rejected the model output; nothing was written.
    Rejected { error: String },
}

pub async fn run(
    llm: &dyn LlmClient,
    history: &[Turn],
    existing_code: &str,
    default_region: &str,
    work_dir: &Path,
) -> Result<GenerationOutcome> {
    // An existing definition that carries an error marker is stale
    // diagnostic text, not something to modify.
    let prompt = if !existing_code.is_empty() && !existing_code.contains("Error") {
        prompts::generate_modification(history, existing_code)
    } else {
        prompts::generate_from_scratch(history, default_region)
    };

    let raw = llm.complete(&prompt).await.context("generation completion failed")?;
    let code = strip_code_fences(&raw);

    if let Err(validation) = validate_definition(&code) {
        tracing::warn!(error = %validation, "generated definition rejected");
        return Ok(GenerationOutcome::Rejected { error: validation.to_string() });
    }

    tokio::fs::create_dir_all(work_dir)
        .await
        .with_context(|| format!("creating work dir {}", work_dir.display()))?;
    let definition_path = work_dir.join(DEFINITION_FILE_NAME);
    tokio::fs::write(&definition_path, &code)
        .await
        .with_context(|| format!("writing {}", definition_path.display()))?;

    tracing::info!(path = %definition_path.display(), bytes = code.len(), "definition written");
    Ok(GenerationOutcome::Generated { code })
}
