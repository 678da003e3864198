//! Error types for the outbound HTTP clients.

/// Failure modes for catalog and review-service requests.
///
/// Callers at class or professor granularity treat any of these as
/// "no data for this request" and keep going; only the batch drivers
/// escalate them (missing root page, missing school row).
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("failed to parse response from {url}")]
    Parse {
        url: String,
        #[source]
        source: anyhow::Error,
    },
}

impl SourceError {
    /// Whether the failure is worth retrying: connection resets and
    /// timeouts, not HTTP status or body-shape errors.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Request { source, .. } => source.is_timeout() || source.is_connect(),
            SourceError::Status { .. } | SourceError::Parse { .. } => false,
        }
    }
}
