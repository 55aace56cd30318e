pub mod connection;
#[cfg(test)]
pub mod memory_store;
pub mod otp_store;
