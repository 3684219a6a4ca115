use std::sync::Arc;

use anyhow::{Context, Result};
use matchmaker_config::AppConfig;
use matchmaker_database::initialize_database;
use matchmaker_notifications::NotificationDispatcher;
use matchmaker_orchestrator::{CompletionProvider, GeminiClient, OrchestratorError};
use redis::aio::ConnectionManager;
use sqlx::SqlitePool;
use tracing::{info, warn};

pub mod telemetry {
    use anyhow::Result;
    use tracing::Level;
    use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

    pub fn init_tracing() -> Result<()> {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        let subscriber = SubscriberBuilder::default()
            .with_max_level(Level::INFO)
            .with_env_filter(env_filter)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .map_err(|error| anyhow::anyhow!("failed to set tracing subscriber: {error}"))
    }
}

/// Everything the HTTP layer and the maintenance commands share.
#[derive(Clone)]
pub struct BackendServices {
    pub db_pool: SqlitePool,
    pub dispatcher: NotificationDispatcher,
    /// `None` when no model API key is configured; AI matching is then disabled.
    pub completion: Option<Arc<dyn CompletionProvider>>,
    pub redis_conn: Option<ConnectionManager>,
}

impl BackendServices {
    pub async fn initialise(config: &AppConfig) -> Result<Self> {
        let db_pool = initialize_database(&config.database)
            .await
            .context("failed to initialise database")?;

        let dispatcher =
            NotificationDispatcher::from_config(config).context("failed to configure notification dispatcher")?;

        let completion: Option<Arc<dyn CompletionProvider>> = match GeminiClient::from_config(&config.ai) {
            Ok(client) => {
                info!(model = %config.ai.model, "ai matching ready");
                Some(Arc::new(client))
            }
            Err(OrchestratorError::ApiKeyMissing) => {
                warn!("no model API key configured, ai matching disabled");
                None
            }
            Err(error) => return Err(error).context("failed to configure ai matching"),
        };

        let redis_conn = match &config.rate_limit.redis_url {
            Some(url) => connect_redis(url).await,
            None => {
                info!("no redis url configured, rate limits are kept in process");
                None
            }
        };

        Ok(Self {
            db_pool,
            dispatcher,
            completion,
            redis_conn,
        })
    }
}

async fn connect_redis(url: &str) -> Option<ConnectionManager> {
    let client = match redis::Client::open(url) {
        Ok(client) => client,
        Err(e) => {
            warn!("failed to create redis client, proceeding without redis: {}", e);
            return None;
        }
    };

    match ConnectionManager::new(client).await {
        Ok(conn) => {
            info!("redis connection established");
            Some(conn)
        }
        Err(e) => {
            warn!("failed to connect to redis, proceeding without redis: {}", e);
            None
        }
    }
}

pub async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(?error, "failed to listen for shutdown signal");
    }
    info!("shutdown signal received");
}
