use engine_logging::engine_info;
use harvester_core::WorkUnit;

use crate::{Fetcher, GivingUp, Payload, RetryPolicy, Sleeper};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageScope {
    pub total_pages: u32,
    pub has_results: bool,
}

/// Reads the size of a paginated listing from its first page.
pub trait ScopeProbe: Send + Sync {
    fn probe(&self, first_page: &Payload) -> PageScope;
}

/// Bootstraps the finite work set from page 1. Failure here is fatal to the run.
pub async fn discover_scope(
    fetcher: &dyn Fetcher,
    probe: &dyn ScopeProbe,
    retry: &RetryPolicy,
    sleeper: &dyn Sleeper,
) -> Result<PageScope, GivingUp> {
    let fetched = retry.execute(&WorkUnit::Page(1), fetcher, sleeper).await?;
    let scope = probe.probe(&fetched.payload);
    engine_info!(
        "Scope discovered: {} page(s){}",
        scope.total_pages,
        if scope.has_results { "" } else { ", first page has no results" }
    );
    Ok(scope)
}
