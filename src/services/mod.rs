pub mod mail_service;
pub mod otp_service;
pub mod sweeper;
