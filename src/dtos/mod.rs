pub mod extractors;
pub mod otp_dtos;
