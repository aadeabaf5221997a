//! Verdict service trait.

use async_trait::async_trait;
use vigil_core::VerdictSnapshot;
use vigil_error::ScanResult;

/// One poll of an analysis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisStatus {
    /// Raw status string, `completed` when done
    pub status: String,
    /// Stats and engine results reported so far
    pub snapshot: VerdictSnapshot,
}

impl AnalysisStatus {
    /// Completed with at least one engine counted.
    ///
    /// A completed analysis with all-zero stats is still warming up and
    /// must be polled again.
    pub fn is_terminal(&self) -> bool {
        self.status == "completed" && self.snapshot.stats.total() > 0
    }
}

/// External file analysis service.
#[async_trait]
pub trait VerdictService: Send + Sync {
    /// Upload a file and return the analysis ID.
    ///
    /// # Errors
    ///
    /// `InvalidApiKey` when the key is rejected, `UploadFailed` for other
    /// non-success statuses, `NetworkError` for transport failures.
    async fn submit(&self, api_key: &str, filename: &str, bytes: Vec<u8>) -> ScanResult<String>;

    /// Fetch the current state of an analysis.
    async fn poll(&self, api_key: &str, analysis_id: &str) -> ScanResult<AnalysisStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::VerdictStats;

    #[test]
    fn test_completed_with_zero_stats_is_not_terminal() {
        let mut status = AnalysisStatus {
            status: "completed".to_string(),
            snapshot: VerdictSnapshot::default(),
        };
        assert!(!status.is_terminal());

        status.snapshot.stats = VerdictStats {
            undetected: 60,
            ..VerdictStats::default()
        };
        assert!(status.is_terminal());

        status.status = "queued".to_string();
        assert!(!status.is_terminal());
    }
}
