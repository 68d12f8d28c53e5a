use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create pipelines table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipelines (
            id UUID PRIMARY KEY,
            owner_id UUID NOT NULL,
            name VARCHAR(100) NOT NULL,
            description TEXT,
            trigger_token VARCHAR(64) NOT NULL UNIQUE,
            webhook_secret TEXT,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create configurations table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS configurations (
            id UUID PRIMARY KEY,
            pipeline_id UUID NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
            source VARCHAR(20) NOT NULL,
            definition TEXT,
            repo_url VARCHAR(500),
            repo_branch VARCHAR(100) NOT NULL DEFAULT 'main',
            definition_path VARCHAR(200) NOT NULL DEFAULT 'pipeline.yml',
            version INTEGER NOT NULL DEFAULT 1,
            is_active BOOLEAN NOT NULL DEFAULT TRUE,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // At most one active configuration per pipeline, enforced at write time
    sqlx::query(
        r#"
        CREATE UNIQUE INDEX IF NOT EXISTS idx_configurations_one_active
        ON configurations(pipeline_id) WHERE is_active
        "#,
    )
    .execute(pool)
    .await?;

    // Create executions table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS executions (
            id UUID PRIMARY KEY,
            pipeline_id UUID NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
            configuration_id UUID NOT NULL REFERENCES configurations(id),
            triggered_by UUID,
            trigger_method VARCHAR(20) NOT NULL,
            status VARCHAR(20) NOT NULL,
            started_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ,
            logs TEXT,
            error_message TEXT,
            metadata JSONB NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Indexes for poller and listing queries
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_executions_status ON executions(status)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_executions_pipeline_id ON executions(pipeline_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_configurations_pipeline_id ON configurations(pipeline_id)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
