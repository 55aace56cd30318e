use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::services::otp_service::OtpService;

/// Periodically deletes expired OTP rows until `shutdown` is cancelled.
/// Returns `None` when the interval is zero (sweeping disabled).
pub fn spawn_expired_sweeper(
    service: OtpService,
    interval_secs: u64,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        tracing::info!("Expired OTP sweeper disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = service.purge_expired().await {
                        tracing::warn!("Failed to purge expired OTPs: {}", e);
                    }
                }
            }
        }
        tracing::info!("Expired OTP sweeper stopped");
    }))
}
