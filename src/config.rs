// config.rs
use std::env;
use std::str::FromStr;

use chrono::Duration;

use crate::errors::{AppError, Result};

const DEFAULT_MAIL_FROM: &str = "EHR Portal <no-reply@ehr.local>";
const MAX_OTP_TTL_SECS: i64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OtpSettings {
    pub ttl: Duration,
    pub max_attempts: u32,
}

impl Default for OtpSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::minutes(5),
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub smtp: Option<SmtpConfig>,
    pub mail_from: String,
    pub otp: OtpSettings,
    pub sweep_interval_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_url =
            get("DATABASE_URL").ok_or_else(|| AppError::configuration("DATABASE_URL must be set"))?;

        let smtp = match get("SMTP_HOST") {
            Some(host) => {
                let username = get("SMTP_USERNAME");
                let password = get("SMTP_PASSWORD");
                if username.is_some() != password.is_some() {
                    return Err(AppError::configuration(
                        "SMTP_USERNAME and SMTP_PASSWORD must be set together",
                    ));
                }
                Some(SmtpConfig {
                    host,
                    port: parse_or(get("SMTP_PORT"), "SMTP_PORT", 587)?,
                    username,
                    password,
                })
            }
            None => None,
        };

        let ttl_secs: i64 = parse_or(get("OTP_TTL_SECONDS"), "OTP_TTL_SECONDS", 300)?;
        if !(1..=MAX_OTP_TTL_SECS).contains(&ttl_secs) {
            return Err(AppError::configuration(format!(
                "OTP_TTL_SECONDS must be between 1 and {}",
                MAX_OTP_TTL_SECS
            )));
        }

        let max_attempts: u32 = parse_or(get("OTP_MAX_ATTEMPTS"), "OTP_MAX_ATTEMPTS", 5)?;
        if max_attempts == 0 {
            return Err(AppError::configuration("OTP_MAX_ATTEMPTS must be at least 1"));
        }

        Ok(AppConfig {
            database_url,
            database_max_connections: parse_or(
                get("DATABASE_MAX_CONNECTIONS"),
                "DATABASE_MAX_CONNECTIONS",
                5,
            )?,
            host: get("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(get("PORT"), "PORT", 3000)?,
            smtp,
            mail_from: get("MAIL_FROM").unwrap_or_else(|| DEFAULT_MAIL_FROM.to_string()),
            otp: OtpSettings {
                ttl: Duration::seconds(ttl_secs),
                max_attempts,
            },
            sweep_interval_secs: parse_or(
                get("OTP_SWEEP_INTERVAL_SECONDS"),
                "OTP_SWEEP_INTERVAL_SECONDS",
                600,
            )?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: FromStr>(value: Option<String>, key: &str, default: T) -> Result<T> {
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::configuration(format!("{} must be a number, got '{}'", key, raw))),
        None => Ok(default),
    }
}
