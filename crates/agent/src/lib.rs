//! Conversational orchestration engine.
//!
//! The orchestrator (`graph`) classifies each inbound message and routes it
//! through one of three pipelines: conversational Q&A (`chat`), diagnostic
//! inquiry (`diagnostics`), or the code-generation pipeline
//! (`clarify` → `generate` → `diagram`). Every pipeline outcome is an
//! explicit variant merged into session state by one total function; the
//! graph never loops — continuation is always driven by the next inbound
//! message.
//!
//! External side-effecting collaborators sit behind capability traits so
//! each can fail (or be stubbed) independently:
//!
//! - `llm::LlmClient` — black-box text completion (Gemini in production)
//! - `diagnostics::MetricsClient` — cloud metrics queries
//! - `diagram::DiagramRenderer` — diagram subprocess
//! - `terraform::Provisioner` — provisioning CLI plan/apply, outside the
//!   graph, callable independently once a definition exists

pub mod chat;
pub mod clarify;
pub mod diagnostics;
pub mod diagram;
pub mod generate;
pub mod graph;
pub mod intent;
pub mod llm;
pub mod prompts;
pub mod terraform;

pub use diagram::{DiagramRenderer, DotRenderer};
pub use graph::{Orchestrator, OrchestratorError, TurnOutcome, TurnReport};
pub use llm::{GeminiClient, LlmClient};
pub use terraform::{Provisioner, ProvisionError, TerraformCli, ToolRun};
