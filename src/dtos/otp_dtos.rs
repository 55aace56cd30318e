use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use validator::{Validate, ValidationError};

use crate::errors::Result;
use crate::models::otp::{OtpKey, Purpose, Role};

#[derive(Debug, Deserialize, Validate)]
pub struct SendOtpRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(email(message = "A valid email is required"))]
    pub email: String,

    #[validate(length(min = 1, max = 64, message = "purpose is required"))]
    pub purpose: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(email(message = "A valid email is required"))]
    pub email: String,

    #[validate(
        length(equal = 6, message = "OTP must be 6 digits"),
        custom(function = "validate_digits")
    )]
    pub otp: String,

    #[validate(length(min = 1, max = 64, message = "purpose is required"))]
    pub purpose: String,
}

// Surrounding whitespace is dropped before `validate` sees the value
fn trimmed<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}

fn validate_digits(value: &str) -> std::result::Result<(), ValidationError> {
    if value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("digits");
        err.message = Some("OTP must be 6 digits".into());
        Err(err)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

impl SendOtpRequest {
    pub fn into_key(self, role: Role) -> Result<OtpKey> {
        Ok(OtpKey::new(
            normalize_email(&self.email),
            role,
            Purpose::parse(&self.purpose)?,
        ))
    }
}

impl VerifyOtpRequest {
    pub fn into_parts(self, role: Role) -> Result<(OtpKey, String)> {
        let key = OtpKey::new(
            normalize_email(&self.email),
            role,
            Purpose::parse(&self.purpose)?,
        );
        Ok((key, self.otp))
    }
}

#[derive(Debug, Serialize)]
pub struct SendOtpResponse {
    pub success: bool,
    pub message: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct VerifyOtpResponse {
    pub success: bool,
    pub message: String,
}
