use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use terraloom_agent::diagnostics::CloudWatchCli;
use terraloom_agent::llm::LlmError;
use terraloom_agent::{DotRenderer, GeminiClient, Orchestrator, TerraformCli};
use terraloom_core::config::{AppConfig, ConfigError, LoadOptions};
use terraloom_db::{connect, migrations, DbPool, SqlSessionRepository};

use crate::service::ChatService;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub service: Arc<ChatService>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("llm client construction failed: {0}")]
    Llm(#[source] LlmError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    bootstrap_with_config(AppConfig::load(options)?).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!("starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!("database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!("database migrations applied");

    let llm = GeminiClient::from_config(&config.llm).map_err(BootstrapError::Llm)?;
    let orchestrator = Orchestrator::new(
        Arc::new(llm),
        Arc::new(CloudWatchCli::new(&config.aws.default_region)),
        Arc::new(DotRenderer),
        &config.aws.default_region,
    );

    let service = Arc::new(ChatService::new(
        Arc::new(SqlSessionRepository::new(db_pool.clone())),
        orchestrator,
        Arc::new(TerraformCli),
        config.workspace.generated_dir.clone(),
    ));

    Ok(Application { config, db_pool, service })
}

#[cfg(test)]
mod tests {
    use terraloom_core::config::{ConfigOverrides, LoadOptions};

    use super::{bootstrap, BootstrapError};

    fn options(api_key: Option<&str>) -> LoadOptions {
        LoadOptions {
            ignore_env: true,
            overrides: ConfigOverrides {
                database_url: Some("sqlite::memory:".to_string()),
                llm_api_key: api_key.map(str::to_string),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    #[tokio::test]
    async fn bootstrap_runs_migrations_and_builds_the_service() {
        let app = bootstrap(options(Some("test-key"))).await.expect("bootstrap");

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'sessions'",
        )
        .fetch_one(&app.db_pool)
        .await
        .expect("sessions table present after bootstrap");
        assert_eq!(count, 1);

        app.db_pool.close().await;
    }

    #[tokio::test]
    async fn bootstrap_fails_fast_without_an_api_key() {
        let result = bootstrap(options(None)).await;
        assert!(matches!(result, Err(BootstrapError::Config(_))));
    }
}
