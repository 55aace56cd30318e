use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::config::OtpSettings;
use crate::database::otp_store::OtpStore;
use crate::errors::{AppError, Result};
use crate::models::otp::{OtpKey, OtpRecord, OTP_LENGTH};
use crate::services::mail_service::{render_otp_email, MailSender, MessageId};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub type CodeGenerator = Arc<dyn Fn() -> String + Send + Sync>;

// Generate 6-digit OTP
pub fn generate_otp() -> String {
    let mut rng = rand::thread_rng();
    format!("{:0width$}", rng.gen_range(0..1_000_000), width = OTP_LENGTH)
}

#[derive(Debug, Clone)]
pub struct OtpDispatch {
    pub sent: bool,
    pub expires_at: DateTime<Utc>,
    pub message_id: MessageId,
}

#[derive(Clone)]
pub struct OtpService {
    store: Arc<dyn OtpStore>,
    mailer: Arc<dyn MailSender>,
    clock: Arc<dyn Clock>,
    generator: CodeGenerator,
    settings: OtpSettings,
}

impl OtpService {
    pub fn new(store: Arc<dyn OtpStore>, mailer: Arc<dyn MailSender>, settings: OtpSettings) -> Self {
        Self {
            store,
            mailer,
            clock: Arc::new(SystemClock),
            generator: Arc::new(generate_otp),
            settings,
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[cfg(test)]
    pub fn with_generator(mut self, generator: CodeGenerator) -> Self {
        self.generator = generator;
        self
    }

    pub fn settings(&self) -> &OtpSettings {
        &self.settings
    }

    /// Issues a fresh code for `key`, replacing any earlier one, and emails it.
    ///
    /// The record is written before delivery is attempted, so a `DeliveryError`
    /// still leaves a verifiable code behind.
    pub async fn send_otp(&self, key: &OtpKey) -> Result<OtpDispatch> {
        let code = (self.generator)();
        let record = OtpRecord::issue(key.clone(), code, self.clock.now(), self.settings.ttl);

        self.store.upsert(&record).await?;

        let email = render_otp_email(&record.code, key.role, &key.purpose, self.settings.ttl);
        let message_id = self
            .mailer
            .send(&key.identity, &email.subject, &email.html_body)
            .await
            .map_err(|e| {
                tracing::error!("Failed to send OTP for {}: {}", key, e);
                match e {
                    err @ AppError::DeliveryError(_) => err,
                    other => AppError::delivery(other.to_string()),
                }
            })?;

        tracing::info!("OTP issued for {}, expires at {}", key, record.expires_at);

        Ok(OtpDispatch {
            sent: true,
            expires_at: record.expires_at,
            message_id,
        })
    }

    pub async fn verify_otp(&self, key: &OtpKey, submitted: &str) -> Result<()> {
        let record = self.store.find(key).await?.ok_or(AppError::OtpNotFound)?;
        let now = self.clock.now();

        if record.is_expired(now) {
            tracing::debug!("Expired OTP submitted for {}", key);
            return Err(AppError::OtpExpired);
        }

        let max_attempts = self.settings.max_attempts;
        if record.failed_attempts >= max_attempts {
            tracing::warn!("OTP for {} locked after {} failed attempts", key, record.failed_attempts);
            return Err(AppError::TooManyAttempts);
        }

        if record.code != submitted {
            // The guarded increment is the real cap check; the read above may be stale
            return match self
                .store
                .record_failed_attempt(key, &record.code, max_attempts)
                .await?
            {
                Some(attempts) => {
                    tracing::warn!("OTP mismatch for {} (attempt {})", key, attempts);
                    Err(AppError::OtpMismatch)
                }
                None => Err(self.refused_write(key, AppError::OtpMismatch).await?),
            };
        }

        if record.consumed {
            return Err(AppError::OtpAlreadyConsumed);
        }

        if !self.store.consume(key, submitted, max_attempts).await? {
            return Err(self.refused_write(key, AppError::OtpAlreadyConsumed).await?);
        }

        tracing::info!("OTP verified for {}", key);
        Ok(())
    }

    /// Picks the error for a guarded write that matched nothing. The record changed after
    /// it was read: either concurrent guesses locked it, or `otherwise` describes what did.
    async fn refused_write(&self, key: &OtpKey, otherwise: AppError) -> Result<AppError> {
        match self.store.find(key).await? {
            Some(current) if current.failed_attempts >= self.settings.max_attempts => {
                tracing::warn!("OTP for {} locked by concurrent attempts", key);
                Ok(AppError::TooManyAttempts)
            }
            _ => Ok(otherwise),
        }
    }

    pub async fn purge_expired(&self) -> Result<u64> {
        let removed = self.store.delete_expired(self.clock.now()).await?;
        if removed > 0 {
            tracing::info!("Purged {} expired OTP records", removed);
        }
        Ok(removed)
    }

    pub async fn store_healthy(&self) -> bool {
        self.store.ping().await.is_ok()
    }
}
