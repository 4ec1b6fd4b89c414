use std::time::Duration;

use super::ServiceError;

/// Shared client for identity provider calls. `read_timeout_ms` bounds the
/// whole exchange so a stalled provider cannot hold a request open.
pub fn build_idp_client(connect_timeout_ms: u64, read_timeout_ms: u64) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_millis(connect_timeout_ms))
        .timeout(Duration::from_millis(read_timeout_ms))
        .build()
        .map_err(|e| ServiceError::Internal(anyhow::anyhow!("Failed to build HTTP client: {}", e)))
}
