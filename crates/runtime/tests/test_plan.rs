use std::{env, path::Path};

use anyhow::{Context, Result};
use matchmaker_backend_runtime::{self, BackendServices};
use matchmaker_config::AppConfig;
use sqlx::Row;
use tempfile::TempDir;

fn sqlite_url(path: &Path) -> String {
    format!("sqlite://{}", path.to_string_lossy())
}

fn build_config(database_url: String, max_connections: u32) -> AppConfig {
    let mut config = AppConfig::default();
    config.database.url = database_url;
    config.database.max_connections = max_connections;
    config.ai.api_key = Some("unit-test-key".into());
    config
}

async fn initialise(config: &AppConfig) -> Result<BackendServices> {
    BackendServices::initialise(config)
        .await
        .context("failed to initialise backend services")
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_runs_migrations_and_enables_ai_matching() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/init.db");
    let config = build_config(sqlite_url(&db_path), 4);

    let services = initialise(&config).await?;
    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'match_suggestions', 'referrals') ORDER BY name",
    )
    .fetch_all(&services.db_pool)
    .await?;

    assert_eq!(tables, vec!["match_suggestions", "referrals", "users"]);
    let provider = services.completion.as_ref().context("ai matching should be enabled")?;
    assert_eq!(provider.name(), "gemini");
    assert!(services.redis_conn.is_none(), "no redis url configured");

    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_disables_ai_matching_without_api_key() -> Result<()> {
    env::remove_var("GOOGLE_API_KEY");
    let mut config = build_config("sqlite://:memory:".into(), 1);
    config.ai.api_key = None;

    let services = initialise(&config).await?;

    assert!(services.completion.is_none(), "missing api key should disable matching, not fail startup");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_ignores_unreachable_redis() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/redis.db");
    let mut config = build_config(sqlite_url(&db_path), 1);
    // Port 1 is reserved and never serves redis.
    config.rate_limit.redis_url = Some("redis://127.0.0.1:1".into());

    let services = initialise(&config).await?;

    assert!(services.redis_conn.is_none(), "redis connection errors should be tolerated");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn initialise_ignores_malformed_redis_url() -> Result<()> {
    let mut config = build_config("sqlite://:memory:".into(), 1);
    config.rate_limit.redis_url = Some("not a url".into());

    let services = initialise(&config).await?;

    assert!(services.redis_conn.is_none());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_creates_sqlite_directory_if_missing() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_dir = temp_dir.path().join("nested");
    let db_path = db_dir.join("prepared.db");
    let config = build_config(sqlite_url(&db_path), 2);

    assert!(!db_dir.exists());

    let services = initialise(&config).await?;
    assert!(db_dir.exists(), "database directory should be created");
    assert!(db_path.exists(), "sqlite database file should be created when missing");
    drop(services);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_enables_sqlite_foreign_keys() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/foreign_keys.db");
    let config = build_config(sqlite_url(&db_path), 2);

    let services = initialise(&config).await?;

    let enabled: i64 = sqlx::query_scalar("PRAGMA foreign_keys")
        .fetch_one(&services.db_pool)
        .await?;
    assert_eq!(1, enabled, "foreign key enforcement must be enabled");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn prepare_database_applies_max_connections_setting() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("runtime/max_conn.db");
    let max_connections = 3;
    let config = build_config(sqlite_url(&db_path), max_connections);

    let services = initialise(&config).await?;
    assert_eq!(max_connections, services.db_pool.options().get_max_connections());
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn memory_database_leaves_no_file_behind() -> Result<()> {
    let config = build_config("sqlite://:memory:".into(), 1);
    let services = initialise(&config).await?;

    let databases = sqlx::query("PRAGMA database_list")
        .fetch_all(&services.db_pool)
        .await?;
    let main_db = databases
        .into_iter()
        .find(|row| {
            row.try_get::<String, _>("name")
                .map(|name| name == "main")
                .unwrap_or(false)
        })
        .context("expected main in PRAGMA database_list")?;
    let file: String = main_db.try_get("file")?;
    assert!(file.is_empty(), "in-memory sqlite database should not create filesystem entries");
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn non_sqlite_urls_fail_without_touching_the_filesystem() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let target_dir = temp_dir.path().join("should_not_exist");
    let config = build_config(format!("postgres://{}/ignored.db", target_dir.to_string_lossy()), 1);

    let error = match BackendServices::initialise(&config).await {
        Ok(_) => panic!("expected sqlite connection to fail for non-sqlite URL"),
        Err(error) => error,
    };
    assert!(!target_dir.exists(), "non-sqlite URLs must not create filesystem structures");
    assert!(
        format!("{error:#}").contains("failed to initialise database"),
        "expected database failure context, got {error:#}"
    );
    Ok(())
}

#[test]
fn telemetry_init_tracing_sets_global_subscriber() {
    matchmaker_backend_runtime::telemetry::init_tracing().expect("first initialisation should succeed");

    let second = matchmaker_backend_runtime::telemetry::init_tracing();
    assert!(
        second.is_err(),
        "initialising telemetry twice should fail with global subscriber already set"
    );
}
