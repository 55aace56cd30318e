use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub const OTP_LENGTH: usize = 6;
const MAX_PURPOSE_LENGTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Patient,
    Doctor,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Doctor => "doctor",
            Role::Admin => "admin",
        }
    }

    // Human readable label used in email templates
    pub fn label(&self) -> &'static str {
        match self {
            Role::Patient => "Patient",
            Role::Doctor => "Doctor",
            Role::Admin => "Admin",
        }
    }

    /// Resolves the plural path segment used by the routes (`patients`, `doctors`, `admins`).
    pub fn from_collection(segment: &str) -> Result<Self, AppError> {
        segment
            .strip_suffix('s')
            .and_then(|singular| singular.parse().ok())
            .ok_or_else(|| AppError::UnknownRole(segment.to_string()))
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "patient" => Ok(Role::Patient),
            "doctor" => Ok(Role::Doctor),
            "admin" => Ok(Role::Admin),
            other => Err(AppError::UnknownRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a code was issued. Codes issued for one purpose never satisfy another.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Purpose(String);

impl Purpose {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let value = raw.trim();
        if value.is_empty() {
            return Err(AppError::invalid_data("purpose is required"));
        }
        if value.len() > MAX_PURPOSE_LENGTH {
            return Err(AppError::invalid_data("purpose is too long"));
        }
        if !value
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
        {
            return Err(AppError::invalid_data(
                "purpose may only contain lowercase letters, digits, '_' and '-'",
            ));
        }
        Ok(Purpose(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    // "reset_password" -> "reset password"
    pub fn describe(&self) -> String {
        self.0.replace(['_', '-'], " ")
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Store key: one record per (identity, role, purpose).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OtpKey {
    pub identity: String,
    pub role: Role,
    pub purpose: Purpose,
}

impl OtpKey {
    pub fn new(identity: impl Into<String>, role: Role, purpose: Purpose) -> Self {
        Self {
            identity: identity.into(),
            role,
            purpose,
        }
    }
}

impl fmt::Display for OtpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.role, self.purpose, self.identity)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpRecord {
    pub key: OtpKey,
    pub code: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub consumed: bool,
    pub failed_attempts: u32,
}

impl OtpRecord {
    pub fn issue(key: OtpKey, code: String, issued_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            key,
            code,
            issued_at,
            expires_at: issued_at + ttl,
            consumed: false,
            failed_attempts: 0,
        }
    }

    // The instant expires_at itself is already outside the window
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
