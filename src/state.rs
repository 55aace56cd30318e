use crate::services::otp_service::OtpService;

#[derive(Clone)]
pub struct AppState {
    pub otp_service: OtpService,
}

impl AppState {
    pub fn new(otp_service: OtpService) -> Self {
        AppState { otp_service }
    }
}
