use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgRow, PgPool, Row};

use crate::errors::{AppError, Result};
use crate::models::otp::{OtpKey, OtpRecord, Purpose, Role};

/// Keyed persistence for issued codes. One row per `OtpKey`.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Inserts the record or replaces whatever was stored under the same key.
    async fn upsert(&self, record: &OtpRecord) -> Result<()>;

    async fn find(&self, key: &OtpKey) -> Result<Option<OtpRecord>>;

    /// Counts one mismatched guess against the record, provided it still holds `stored_code`
    /// and has fewer than `max_attempts` failures. Returns the new count, or `None` when the
    /// guess was not counted because the cap was already reached or the code was replaced.
    async fn record_failed_attempt(
        &self,
        key: &OtpKey,
        stored_code: &str,
        max_attempts: u32,
    ) -> Result<Option<u32>>;

    /// Marks the record consumed if it still holds `code`, has not been consumed and is
    /// below the attempt cap. Returns false when any of those no longer holds.
    async fn consume(&self, key: &OtpKey, code: &str, max_attempts: u32) -> Result<bool>;

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64>;

    async fn ping(&self) -> Result<()>;
}

#[derive(Clone)]
pub struct PgOtpStore {
    pool: PgPool,
}

impl PgOtpStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn record_from_row(row: &PgRow) -> Result<OtpRecord> {
    let role: String = row.try_get("role")?;
    let purpose: String = row.try_get("purpose")?;
    let failed_attempts: i32 = row.try_get("failed_attempts")?;

    let role: Role = role
        .parse()
        .map_err(|_| AppError::corrupt(format!("unknown role '{}'", role)))?;
    let purpose = Purpose::parse(&purpose)
        .map_err(|_| AppError::corrupt(format!("invalid purpose '{}'", purpose)))?;

    Ok(OtpRecord {
        key: OtpKey::new(row.try_get::<String, _>("identity")?, role, purpose),
        code: row.try_get("code")?,
        issued_at: row.try_get("issued_at")?,
        expires_at: row.try_get("expires_at")?,
        consumed: row.try_get("consumed")?,
        failed_attempts: u32::try_from(failed_attempts).unwrap_or(0),
    })
}

#[async_trait]
impl OtpStore for PgOtpStore {
    async fn upsert(&self, record: &OtpRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO otp_records
                (identity, role, purpose, code, issued_at, expires_at, consumed, failed_attempts)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (identity, role, purpose) DO UPDATE SET
                code = EXCLUDED.code,
                issued_at = EXCLUDED.issued_at,
                expires_at = EXCLUDED.expires_at,
                consumed = EXCLUDED.consumed,
                failed_attempts = EXCLUDED.failed_attempts
            "#,
        )
        .bind(&record.key.identity)
        .bind(record.key.role.as_str())
        .bind(record.key.purpose.as_str())
        .bind(&record.code)
        .bind(record.issued_at)
        .bind(record.expires_at)
        .bind(record.consumed)
        .bind(i32::try_from(record.failed_attempts).unwrap_or(i32::MAX))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, key: &OtpKey) -> Result<Option<OtpRecord>> {
        let row = sqlx::query(
            r#"
            SELECT identity, role, purpose, code, issued_at, expires_at, consumed, failed_attempts
            FROM otp_records
            WHERE identity = $1 AND role = $2 AND purpose = $3
            "#,
        )
        .bind(&key.identity)
        .bind(key.role.as_str())
        .bind(key.purpose.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn record_failed_attempt(
        &self,
        key: &OtpKey,
        stored_code: &str,
        max_attempts: u32,
    ) -> Result<Option<u32>> {
        // The cap lives in the WHERE clause so parallel guesses cannot overshoot it
        let row = sqlx::query(
            r#"
            UPDATE otp_records SET failed_attempts = failed_attempts + 1
            WHERE identity = $1 AND role = $2 AND purpose = $3
              AND code = $4 AND failed_attempts < $5
            RETURNING failed_attempts
            "#,
        )
        .bind(&key.identity)
        .bind(key.role.as_str())
        .bind(key.purpose.as_str())
        .bind(stored_code)
        .bind(i32::try_from(max_attempts).unwrap_or(i32::MAX))
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let attempts: i32 = row.try_get("failed_attempts")?;
                Ok(Some(u32::try_from(attempts).unwrap_or(0)))
            }
            None => Ok(None),
        }
    }

    async fn consume(&self, key: &OtpKey, code: &str, max_attempts: u32) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE otp_records SET consumed = TRUE
            WHERE identity = $1 AND role = $2 AND purpose = $3
              AND code = $4 AND consumed = FALSE AND failed_attempts < $5
            "#,
        )
        .bind(&key.identity)
        .bind(key.role.as_str())
        .bind(key.purpose.as_str())
        .bind(code)
        .bind(i32::try_from(max_attempts).unwrap_or(i32::MAX))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM otp_records WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
