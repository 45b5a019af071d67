use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use deskline_agent::{Classifier, Generator, OpenAiChatClient, PipelineSettings, SupportPipeline};
use deskline_core::config::{AppConfig, ConfigError, LoadOptions};
use deskline_core::errors::PipelineError;
use deskline_db::{connect, migrations, DbPool, SqlFeedbackRepository, SqlTurnRepository};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub pipeline: Arc<SupportPipeline>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("pipeline construction failed: {0}")]
    Pipeline(#[source] PipelineError),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let db_pool = connect(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(event_name = "system.bootstrap.database_connected", "database connection established");

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(event_name = "system.bootstrap.migrations_applied", "database migrations applied");

    // One chat client serves both collaborator seams.
    let llm = Arc::new(OpenAiChatClient::new(&config.llm));
    let classifier: Arc<dyn Classifier> = llm.clone();
    let generator: Arc<dyn Generator> = llm;

    let pipeline = SupportPipeline::new(
        classifier,
        generator,
        Arc::new(SqlTurnRepository::new(db_pool.clone())),
        Arc::new(SqlFeedbackRepository::new(db_pool.clone())),
        PipelineSettings::from_config(&config),
    )
    .map_err(BootstrapError::Pipeline)?;

    Ok(Application { config, db_pool, pipeline: Arc::new(pipeline) })
}
