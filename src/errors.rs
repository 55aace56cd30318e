// src/errors.rs
use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Corrupt OTP record: {0}")]
    CorruptRecord(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("No OTP was issued for this email")]
    OtpNotFound,

    #[error("OTP has expired")]
    OtpExpired,

    #[error("OTP does not match")]
    OtpMismatch,

    #[error("OTP has already been used")]
    OtpAlreadyConsumed,

    #[error("Too many failed attempts, request a new OTP")]
    TooManyAttempts,

    #[error("Email delivery failed: {0}")]
    DeliveryError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Database(_) | AppError::CorruptRecord(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::UnknownRole(_) => StatusCode::NOT_FOUND,
            AppError::OtpNotFound => StatusCode::NOT_FOUND,
            AppError::OtpExpired => StatusCode::GONE,
            AppError::OtpMismatch => StatusCode::BAD_REQUEST,
            AppError::OtpAlreadyConsumed => StatusCode::CONFLICT,
            AppError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            AppError::DeliveryError(_) => StatusCode::BAD_GATEWAY,
            AppError::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    // Text shown inline by the frontend
    fn public_message(&self) -> String {
        match self {
            AppError::Database(_) | AppError::CorruptRecord(_) => "Database error".to_string(),
            AppError::ConfigurationError(_) => "Configuration error".to_string(),
            AppError::DeliveryError(_) => "Failed to send OTP email".to_string(),
            AppError::ValidationError(msg) => msg.clone(),
            AppError::UnknownRole(_) => "Unknown role".to_string(),
            AppError::OtpNotFound => "No OTP found, request a new one".to_string(),
            AppError::OtpExpired => "OTP has expired".to_string(),
            AppError::OtpMismatch => "Invalid OTP".to_string(),
            AppError::OtpAlreadyConsumed => "OTP has already been used".to_string(),
            AppError::TooManyAttempts => "Too many failed attempts, request a new OTP".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let public = self.public_message();
        let message = if status.is_server_error() {
            tracing::error!("{}", self);
            public.clone()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "error": public,
            "message": message,
            "success": false,
            "timestamp": chrono::Utc::now().to_rfc3339(),
        }));

        (status, body).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::ValidationError(err.to_string())
    }
}

impl From<JsonRejection> for AppError {
    fn from(err: JsonRejection) -> Self {
        AppError::ValidationError(format!("Invalid request body: {}", err.body_text()))
    }
}

impl From<lettre::error::Error> for AppError {
    fn from(err: lettre::error::Error) -> Self {
        AppError::DeliveryError(format!("Message build failed: {}", err))
    }
}

impl From<lettre::transport::smtp::Error> for AppError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        AppError::DeliveryError(err.to_string())
    }
}

impl From<lettre::address::AddressError> for AppError {
    fn from(err: lettre::address::AddressError) -> Self {
        AppError::DeliveryError(format!("Invalid address: {}", err))
    }
}

// Helper conversion functions
impl AppError {
    pub fn invalid_data(msg: impl Into<String>) -> Self {
        AppError::ValidationError(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        AppError::ConfigurationError(msg.into())
    }

    pub fn delivery(msg: impl Into<String>) -> Self {
        AppError::DeliveryError(msg.into())
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        AppError::CorruptRecord(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
