//! Digest and verdict polling.

use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, instrument, warn};
use vigil_core::VerdictSnapshot;
use vigil_error::{ScanError, ScanErrorKind, ScanResult};
use vigil_interface::VerdictService;

/// Polls before an analysis is given up on.
pub const MAX_POLL_ATTEMPTS: u32 = 30;

/// Lowercase hex SHA-256 of `bytes`.
///
/// # Examples
///
/// ```
/// use vigil_scan::sha256_hex;
///
/// assert_eq!(
///     sha256_hex(b"abc"),
///     "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
/// );
/// ```
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Wait before poll number `attempt` (zero-based): `min(5 + 2 * attempt, 30)`
/// seconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = 5u64.saturating_add(2 * u64::from(attempt)).min(30);
    Duration::from_secs(secs)
}

/// Poll until the analysis is terminal or the attempts run out.
///
/// Service errors end the wait immediately.
#[instrument(skip(service, api_key))]
pub async fn await_verdict(
    service: &dyn VerdictService,
    api_key: &str,
    analysis_id: &str,
) -> ScanResult<VerdictSnapshot> {
    for attempt in 0..MAX_POLL_ATTEMPTS {
        tokio::time::sleep(backoff_delay(attempt)).await;
        let status = service.poll(api_key, analysis_id).await?;
        if status.is_terminal() {
            debug!(attempt, "Analysis complete");
            return Ok(status.snapshot);
        }
        debug!(attempt, status = %status.status, "Analysis pending");
    }
    warn!(attempts = MAX_POLL_ATTEMPTS, "Analysis did not finish");
    Err(ScanError::new(ScanErrorKind::AnalysisTimeout {
        attempts: MAX_POLL_ATTEMPTS,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_then_caps() {
        assert_eq!(backoff_delay(0), Duration::from_secs(5));
        assert_eq!(backoff_delay(1), Duration::from_secs(7));
        assert_eq!(backoff_delay(12), Duration::from_secs(29));
        assert_eq!(backoff_delay(13), Duration::from_secs(30));
        assert_eq!(backoff_delay(29), Duration::from_secs(30));
    }

    #[test]
    fn test_digest_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
