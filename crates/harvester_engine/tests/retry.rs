use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use harvester_core::WorkUnit;
use harvester_engine::{FailureKind, FetchError, Fetcher, Payload, RetryPolicy, Sleeper};
use pretty_assertions::assert_eq;

/// Fails the first `failures` calls with `kind`, then succeeds.
struct FlakyFetcher {
    failures: u32,
    kind: FailureKind,
    calls: AtomicU32,
}

impl FlakyFetcher {
    fn new(failures: u32, kind: FailureKind) -> Self {
        Self {
            failures,
            kind,
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Fetcher for FlakyFetcher {
    async fn fetch(&self, _unit: &WorkUnit) -> Result<Payload, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(FetchError::new(self.kind.clone(), "scripted failure"))
        } else {
            Ok(Payload::new("ok", None))
        }
    }
}

#[derive(Default)]
struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    fn slept(&self) -> Vec<u64> {
        self.slept.lock().unwrap().iter().map(Duration::as_secs).collect()
    }
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

#[tokio::test]
async fn succeeds_after_transient_failures_with_growing_backoff() {
    let fetcher = FlakyFetcher::new(3, FailureKind::Timeout);
    let sleeper = RecordingSleeper::default();
    let policy = RetryPolicy::new(5, Duration::from_secs(30));

    let fetched = policy
        .execute(&WorkUnit::Page(4), &fetcher, &sleeper)
        .await
        .expect("fourth attempt succeeds");

    assert_eq!(fetched.attempts, 4);
    assert_eq!(fetcher.calls(), 4);
    assert_eq!(sleeper.slept(), vec![1, 2, 4]);
}

#[tokio::test]
async fn gives_up_after_max_attempts_without_trailing_sleep() {
    let fetcher = FlakyFetcher::new(u32::MAX, FailureKind::Network);
    let sleeper = RecordingSleeper::default();
    let policy = RetryPolicy::new(3, Duration::from_secs(30));

    let giving_up = policy
        .execute(&WorkUnit::Token("t".into()), &fetcher, &sleeper)
        .await
        .unwrap_err();

    assert_eq!(giving_up.attempts, 3);
    assert_eq!(giving_up.unit, WorkUnit::Token("t".into()));
    assert_eq!(giving_up.last_error.kind, FailureKind::Network);
    assert_eq!(fetcher.calls(), 3);
    assert_eq!(sleeper.slept(), vec![1, 2]);
}

#[tokio::test]
async fn client_errors_fail_fast() {
    let fetcher = FlakyFetcher::new(u32::MAX, FailureKind::HttpStatus(404));
    let sleeper = RecordingSleeper::default();
    let policy = RetryPolicy::default();

    let giving_up = policy
        .execute(&WorkUnit::Page(2), &fetcher, &sleeper)
        .await
        .unwrap_err();

    assert_eq!(giving_up.attempts, 1);
    assert!(sleeper.slept().is_empty());
}

#[tokio::test]
async fn server_errors_are_retried() {
    let fetcher = FlakyFetcher::new(1, FailureKind::HttpStatus(502));
    let sleeper = RecordingSleeper::default();

    let fetched = RetryPolicy::default()
        .execute(&WorkUnit::Start, &fetcher, &sleeper)
        .await
        .unwrap();

    assert_eq!(fetched.attempts, 2);
}

#[tokio::test]
async fn busy_hint_sets_the_wait() {
    let fetcher = FlakyFetcher::new(
        1,
        FailureKind::ServerBusy {
            retry_after: Some(Duration::from_secs(12)),
        },
    );
    let sleeper = RecordingSleeper::default();

    RetryPolicy::default()
        .execute(&WorkUnit::Start, &fetcher, &sleeper)
        .await
        .unwrap();

    assert_eq!(sleeper.slept(), vec![12]);
}

#[tokio::test]
async fn single_attempt_policy_never_sleeps() {
    let fetcher = FlakyFetcher::new(u32::MAX, FailureKind::Timeout);
    let sleeper = RecordingSleeper::default();

    let giving_up = RetryPolicy::new(1, Duration::from_secs(30))
        .execute(&WorkUnit::Page(1), &fetcher, &sleeper)
        .await
        .unwrap_err();

    assert_eq!(giving_up.attempts, 1);
    assert!(sleeper.slept().is_empty());
}
