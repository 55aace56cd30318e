use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

use crate::config::AppConfig;
use crate::errors::Result;

pub async fn get_db_pool(config: &AppConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await?;

    init_schema(&pool).await?;
    tracing::info!("✅ Connected to database");

    Ok(pool)
}

pub async fn init_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS otp_records (
            identity TEXT NOT NULL,
            role TEXT NOT NULL,
            purpose TEXT NOT NULL,
            code TEXT NOT NULL,
            issued_at TIMESTAMPTZ NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL,
            consumed BOOLEAN NOT NULL DEFAULT FALSE,
            failed_attempts INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (identity, role, purpose)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_otp_records_expires_at ON otp_records (expires_at)")
        .execute(pool)
        .await?;

    Ok(())
}
