use axum::{extract::State, Json};

use crate::dtos::extractors::{RolePath, ValidatedJson};
use crate::dtos::otp_dtos::{SendOtpRequest, SendOtpResponse, VerifyOtpRequest, VerifyOtpResponse};
use crate::errors::Result;
use crate::state::AppState;

// 1. Send OTP
pub async fn send_otp(
    State(state): State<AppState>,
    RolePath(role): RolePath,
    ValidatedJson(req): ValidatedJson<SendOtpRequest>,
) -> Result<Json<SendOtpResponse>> {
    let key = req.into_key(role)?;
    let dispatch = state.otp_service.send_otp(&key).await?;
    tracing::debug!("OTP email {} handed to mailer", dispatch.message_id);

    Ok(Json(SendOtpResponse {
        success: dispatch.sent,
        message: format!("OTP sent to {}", key.identity),
        expires_at: dispatch.expires_at,
    }))
}

// 2. Verify OTP
pub async fn verify_otp(
    State(state): State<AppState>,
    RolePath(role): RolePath,
    ValidatedJson(req): ValidatedJson<VerifyOtpRequest>,
) -> Result<Json<VerifyOtpResponse>> {
    let (key, code) = req.into_parts(role)?;
    state.otp_service.verify_otp(&key, &code).await?;

    Ok(Json(VerifyOtpResponse {
        success: true,
        message: "OTP verified successfully".to_string(),
    }))
}
