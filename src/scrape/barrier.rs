//! Waiting on a known number of completion events under one ceiling timeout.
//!
//! Stands in for aggregating per-element load/error listeners: each watched
//! element becomes one future, and the barrier reports how many settled.

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarrierOutcome {
    pub completed: usize,
    pub expected: usize,
}

impl BarrierOutcome {
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.completed >= self.expected
    }
}

/// Drives `futures` concurrently and reports how many finished before the ceiling.
pub async fn await_completions<I>(futures: I, ceiling: Duration) -> BarrierOutcome
where
    I: IntoIterator,
    I::Item: Future,
{
    let mut pending: FuturesUnordered<_> = futures.into_iter().collect();
    let expected = pending.len();
    let deadline = Instant::now() + ceiling;
    let mut completed = 0;

    while completed < expected {
        match tokio::time::timeout_at(deadline, pending.next()).await {
            Ok(Some(_)) => completed += 1,
            Ok(None) | Err(_) => break,
        }
    }

    BarrierOutcome {
        completed,
        expected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_await_completions_honors_ceiling() {
        let futures = vec![
            Box::pin(async {}) as std::pin::Pin<Box<dyn Future<Output = ()> + Send>>,
            Box::pin(tokio::time::sleep(Duration::from_secs(60))),
        ];

        let outcome = await_completions(futures, Duration::from_millis(50)).await;
        assert_eq!(outcome.expected, 2);
        assert_eq!(outcome.completed, 1);
    }
}
