use std::sync::Arc;

use tertulia_agent::{TaskSettings, TurnRunner};
use tertulia_channel::connector::ReplyConnector;
use tertulia_core::config::{AppConfig, ConfigError, StateBackend};
use tertulia_db::{
    connect_from_config, migrations, ConversationStateRepository, DbPool,
    InMemoryConversationStateRepository, SqlConversationStateRepository,
};
use thiserror::Error;
use tracing::info;

use crate::connector::HttpConnector;
use crate::services::{dialog_services, http_client, BotCredentials};

pub struct Application {
    pub config: AppConfig,
    pub db_pool: Option<DbPool>,
    pub runner: Arc<TurnRunner>,
    pub connector: Arc<dyn ReplyConnector>,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
    #[error("http client could not be built: {0}")]
    HttpClient(#[source] reqwest::Error),
}

pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        state_backend = ?config.state.backend,
        "starting application bootstrap"
    );

    let (db_pool, repository) = state_repository(&config).await?;

    let client =
        http_client(config.server.outbound_timeout_secs).map_err(BootstrapError::HttpClient)?;
    let credentials = BotCredentials::from_config(&config.channel, client.clone()).map(Arc::new);
    let services = dialog_services(&config, &client, credentials.clone());
    let runner = TurnRunner::new(services, Arc::new(TaskSettings::from(&config)), repository);

    Ok(Application {
        db_pool,
        runner: Arc::new(runner),
        connector: Arc::new(HttpConnector::new(client, credentials)),
        config,
    })
}

async fn state_repository(
    config: &AppConfig,
) -> Result<(Option<DbPool>, Arc<dyn ConversationStateRepository>), BootstrapError> {
    if config.state.backend == StateBackend::Memory {
        return Ok((None, Arc::new(InMemoryConversationStateRepository::default())));
    }

    let db_pool =
        connect_from_config(&config.database).await.map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    Ok((Some(db_pool.clone()), Arc::new(SqlConversationStateRepository::new(db_pool))))
}

#[cfg(test)]
mod tests {
    use tertulia_core::config::{AppConfig, StateBackend};
    use tertulia_core::domain::activity::Activity;

    use crate::bootstrap::{bootstrap_with_config, BootstrapError};

    fn conversation(text: &str) -> Activity {
        let mut activity = Activity::message(text);
        activity.id = Some("act-1".to_string());
        activity.conversation.id = "conv-boot".to_string();
        activity.channel_id = "emulator".to_string();
        activity
    }

    #[tokio::test]
    async fn memory_backend_needs_no_database() {
        let app = bootstrap_with_config(AppConfig::default()).await.expect("bootstrap");

        assert!(app.db_pool.is_none());
        let replies = app.runner.on_turn(conversation("hola")).await;
        assert!(replies[0].text_content().starts_with("NOTE: LUIS is not configured"));
    }

    #[tokio::test]
    async fn sqlite_backend_applies_migrations() {
        let mut config = AppConfig::default();
        config.state.backend = StateBackend::Sqlite;
        config.database.url = "sqlite::memory:".to_string();

        let app = bootstrap_with_config(config).await.expect("bootstrap");
        let pool = app.db_pool.clone().expect("sqlite pool");

        let (table_count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'conversation_state'",
        )
        .fetch_one(&pool)
        .await
        .expect("schema query");
        assert_eq!(table_count, 1);

        pool.close().await;
    }

    #[tokio::test]
    async fn unreachable_database_fails_fast() {
        let mut config = AppConfig::default();
        config.state.backend = StateBackend::Sqlite;
        config.database.url = "sqlite:///nonexistent-dir/tertulia.db".to_string();
        config.database.timeout_secs = 1;

        let result = bootstrap_with_config(config).await;

        assert!(matches!(result, Err(BootstrapError::DatabaseConnect(_))));
    }
}
