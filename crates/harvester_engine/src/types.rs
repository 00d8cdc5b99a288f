use std::fmt;
use std::time::Duration;

use bytes::Bytes;
use harvester_core::{ProgressSnapshot, RunSummary, WorkUnit};

/// Raw response body of one unit, with the header needed to decode it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Payload {
    pub body: Bytes,
    pub content_type: Option<String>,
}

impl Payload {
    pub fn new(body: impl Into<Bytes>, content_type: Option<&str>) -> Self {
        Self {
            body: body.into(),
            content_type: content_type.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ScopeDiscovered { total_pages: u32 },
    Enqueued(WorkUnit),
    UnitFailed { unit: WorkUnit, reason: String },
    Progress(ProgressSnapshot),
    Finished(RunSummary),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Transient failures: timeouts, busy signals, connection faults and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            FailureKind::Timeout | FailureKind::ServerBusy { .. } | FailureKind::Network => true,
            FailureKind::HttpStatus(code) => code >= 500,
            FailureKind::InvalidRequest | FailureKind::TooLarge { .. } | FailureKind::Internal => {
                false
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The unit cannot be expressed as a request against the configured source.
    InvalidRequest,
    HttpStatus(u16),
    /// 503 from the source, with its `Retry-After` hint when given.
    ServerBusy { retry_after: Option<Duration> },
    Timeout,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    Network,
    /// The unit's task died without producing an outcome.
    Internal,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidRequest => write!(f, "invalid request"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::ServerBusy {
                retry_after: Some(hint),
            } => write!(f, "server busy (retry after {}s)", hint.as_secs()),
            FailureKind::ServerBusy { retry_after: None } => write!(f, "server busy"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::Network => write!(f, "network error"),
            FailureKind::Internal => write!(f, "internal error"),
        }
    }
}
