//! Provisioning gateway: terraform init/plan/apply, scoped to a session's
//! working directory. Not part of the conversational graph; invoked on
//! demand once a definition exists.
//!
//! The CLI's own output is opaque to the core: only the init exit status
//! is inspected, everything else is captured verbatim for display and the
//! success judgment is left to the user.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ToolRun {
    /// Combined stdout + stderr, verbatim.
    pub output: String,
    pub success: bool,
}

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("terraform cli not found: {0}")]
    CliNotFound(String),
    #[error("terraform failed to start: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("terraform command timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanResult {
    /// Backend initialization failed; no plan was attempted.
    InitFailed { message: String },
    Planned { output: String },
}

#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn init_and_plan(&self, work_dir: &Path) -> Result<PlanResult, ProvisionError>;
    async fn apply(&self, work_dir: &Path) -> Result<String, ProvisionError>;
}

#[derive(Clone, Debug, Default)]
pub struct TerraformCli;

impl TerraformCli {
    async fn run(&self, work_dir: &Path, args: &[&str]) -> Result<ToolRun, ProvisionError> {
        let binary =
            which::which("terraform").map_err(|err| ProvisionError::CliNotFound(err.to_string()))?;
        let chdir = format!("-chdir={}", work_dir.display());

        let invocation = Command::new(binary)
            .arg(&chdir)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output();

        let output = tokio::time::timeout(COMMAND_TIMEOUT, invocation)
            .await
            .map_err(|_| ProvisionError::Timeout(COMMAND_TIMEOUT))??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        Ok(ToolRun {
            output: format!("{stdout}\n{stderr}"),
            success: output.status.success(),
        })
    }
}

#[async_trait]
impl Provisioner for TerraformCli {
    async fn init_and_plan(&self, work_dir: &Path) -> Result<PlanResult, ProvisionError> {
        let init = self.run(work_dir, &["init", "-no-color", "-upgrade"]).await?;
        if !init.success {
            tracing::warn!("terraform init failed");
            return Ok(PlanResult::InitFailed {
                message: format!("Terraform Init Failed:\n{}", init.output),
            });
        }

        let plan = self.run(work_dir, &["plan", "-no-color"]).await?;
        tracing::info!(success = plan.success, "terraform plan completed");
        Ok(PlanResult::Planned { output: plan.output })
    }

    async fn apply(&self, work_dir: &Path) -> Result<String, ProvisionError> {
        let apply = self.run(work_dir, &["apply", "-auto-approve", "-no-color"]).await?;
        tracing::info!(success = apply.success, "terraform apply completed");
        Ok(apply.output)
    }
}
