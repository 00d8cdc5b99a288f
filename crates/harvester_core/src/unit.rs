use std::fmt;

/// One fetchable batch of a harvest run.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum WorkUnit {
    /// A 1-based page index of a paginated search listing.
    Page(u32),
    /// The first batch of a token chain; fetched without a token.
    Start,
    /// A server-issued continuation token. Opaque and single-use.
    Token(String),
}

impl fmt::Display for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkUnit::Page(n) => write!(f, "page {n}"),
            WorkUnit::Start => write!(f, "initial batch"),
            WorkUnit::Token(token) => write!(f, "token {token}"),
        }
    }
}
