//! Helpers shared by the scenario tests.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing_subscriber::EnvFilter;

/// Scenario tests bubble up any collaborator or registry error with `?`.
pub type TestResult<T = ()> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Upper bound for a single scenario step.
pub const DEFAULT_TEST_TIMEOUT: Duration = Duration::from_secs(5);

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Routes slot task logs to the test writer. `RUST_LOG` wins over the
/// default of debug for the engine crates.
pub fn init_test_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn,simcat_terminal=debug,simcat_proto=debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Polls `check` every `poll` until it holds, failing after `limit`.
///
/// Used for state that slot tasks publish without an event, such as task
/// states reported by the registry.
pub async fn wait_for_condition<F, Fut>(mut check: F, limit: Duration, poll: Duration) -> TestResult
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let polled = timeout(limit, async {
        while !check().await {
            sleep(poll).await;
        }
    })
    .await;

    match polled {
        Ok(()) => Ok(()),
        Err(_) => Err(format!("condition still false after {limit:?}").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_condition_met_after_a_few_polls() {
        let polls = Arc::new(AtomicUsize::new(0));
        let counter = polls.clone();

        wait_for_condition(
            move || {
                let counter = counter.clone();
                async move { counter.fetch_add(1, Ordering::SeqCst) >= 3 }
            },
            Duration::from_secs(1),
            Duration::from_millis(1),
        )
        .await
        .unwrap();

        assert_eq!(polls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_condition_never_met() {
        let err = wait_for_condition(
            || async { false },
            Duration::from_millis(50),
            Duration::from_millis(10),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().starts_with("condition still false"));
    }
}
