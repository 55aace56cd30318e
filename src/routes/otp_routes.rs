use axum::{routing::post, Router};

use crate::{handlers::otp, state::AppState};

pub fn otp_routes() -> Router<AppState> {
    Router::new()
        // Issue and email a code, e.g. POST /patients/send-otp
        .route("/:collection/send-otp", post(otp::send_otp))
        // Check a submitted code, e.g. POST /doctors/verify-otp
        .route("/:collection/verify-otp", post(otp::verify_otp))
}
