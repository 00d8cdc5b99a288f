use harvester_core::Record;

use crate::Payload;

/// Result of extracting one payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extraction {
    pub records: Vec<Record>,
    /// Continuation token; `None` ends the chain.
    pub continuation: Option<String>,
    /// Set when the payload could not be parsed. Records and continuation are then empty.
    pub parse_error: Option<String>,
    pub complete_list_size: Option<u64>,
}

impl Extraction {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            parse_error: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Turns one raw payload into records. Pure; must not panic on malformed input.
pub trait Extractor: Send + Sync {
    fn extract(&self, payload: &Payload) -> Extraction;
}

/// Normalizes a continuation token: whitespace-only means "no more data".
pub(crate) fn non_blank(token: &str) -> Option<String> {
    let token = token.trim();
    (!token.is_empty()).then(|| token.to_string())
}
