// Copyright 2026 BadCompany
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Bounded-concurrency fan-out, retry, and timeout primitives.
//!
//! `Executor` is the only sanctioned way to iterate async work over a
//! collection in this crate. Per-item loops with an await inside serialize
//! N lookups into N times one lookup's latency; `run_all` keeps the total
//! near a single lookup regardless of item count.
//!
//! Every entry point is safe for concurrent invocation by independent
//! callers; no state is shared between calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::FuturesUnordered;
use futures_util::StreamExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::engine_core::errors::FanOutError;

/// Partial-failure outcome of a tolerant fan-out.
///
/// Every input item lands in exactly one of the two lists. Ordering within
/// the lists follows completion order, not input order.
#[derive(Debug)]
pub struct BatchOutcome<T, R, E> {
    pub successes: Vec<R>,
    pub failures: Vec<(T, E)>,
}

impl<T, R, E> Default for BatchOutcome<T, R, E> {
    fn default() -> Self {
        Self {
            successes: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl<T, R, E> BatchOutcome<T, R, E> {
    pub fn total(&self) -> usize {
        self.successes.len() + self.failures.len()
    }

    /// Fraction of items that succeeded, in `[0, 1]`. An empty outcome
    /// reports 0 rather than dividing by zero.
    pub fn success_rate(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.successes.len() as f64 / total as f64,
        }
    }
}

pub struct Executor;

impl Executor {
    /// Run `op` over every item with at most `max_concurrency` invocations
    /// in flight (0 = unbounded), enforced by a counting semaphore held for
    /// the full duration of each invocation including failure paths.
    ///
    /// Results come back in input order regardless of completion order.
    /// After all outstanding work settles, the failure of the lowest-indexed
    /// failed item propagates. Empty input returns an empty vec without
    /// invoking `op`. `cancel` aborts outstanding work promptly.
    pub async fn run_all<T, R, E, F, Fut>(
        items: Vec<T>,
        op: F,
        max_concurrency: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<R>, FanOutError<E>>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        let total = items.len();
        let semaphore = bounded_semaphore(max_concurrency);
        let op = &op;

        let mut in_flight: FuturesUnordered<_> = items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| {
                let semaphore = semaphore.clone();
                async move {
                    let _permit = match semaphore {
                        Some(s) => match s.acquire_owned().await {
                            Ok(permit) => Some(permit),
                            // Only possible if the semaphore were closed.
                            Err(_) => return (idx, Err(FanOutError::Cancelled)),
                        },
                        None => None,
                    };
                    (idx, op(item).await.map_err(FanOutError::Op))
                }
            })
            .collect();

        let mut results: Vec<Option<R>> = (0..total).map(|_| None).collect();
        let mut first_failure: Option<(usize, FanOutError<E>)> = None;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FanOutError::Cancelled),
                settled = in_flight.next() => match settled {
                    Some((idx, Ok(value))) => results[idx] = Some(value),
                    Some((idx, Err(failure))) => {
                        let earlier = first_failure
                            .as_ref()
                            .map_or(true, |(seen, _)| idx < *seen);
                        if earlier {
                            first_failure = Some((idx, failure));
                        }
                    }
                    None => break,
                },
            }
        }

        if let Some((_, failure)) = first_failure {
            return Err(failure);
        }

        let collected: Vec<R> = results.into_iter().flatten().collect();
        debug_assert_eq!(collected.len(), total);
        Ok(collected)
    }

    /// Same fan-out discipline as [`run_all`](Self::run_all), but individual
    /// item failures never propagate: the caller gets a [`BatchOutcome`]
    /// partitioning every input item into successes and failures.
    pub async fn run_all_tolerant<T, R, E, F, Fut>(
        items: Vec<T>,
        op: F,
        max_concurrency: usize,
    ) -> BatchOutcome<T, R, E>
    where
        T: Clone,
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let semaphore = bounded_semaphore(max_concurrency);
        let op = &op;

        let mut in_flight: FuturesUnordered<_> = items
            .into_iter()
            .map(|item| {
                let semaphore = semaphore.clone();
                async move {
                    let _permit = match semaphore {
                        Some(s) => s.acquire_owned().await.ok(),
                        None => None,
                    };
                    let result = op(item.clone()).await;
                    (item, result)
                }
            })
            .collect();

        let mut outcome = BatchOutcome::default();
        while let Some((item, result)) = in_flight.next().await {
            match result {
                Ok(value) => outcome.successes.push(value),
                Err(error) => outcome.failures.push((item, error)),
            }
        }
        outcome
    }

    /// Partition `items` into consecutive chunks of `batch_size` and run the
    /// chunks strictly one after another, with unbounded concurrency inside
    /// each chunk and a cooperative yield between chunks so long batch runs
    /// do not starve sibling tasks.
    pub async fn run_in_batches<T, R, E, F, Fut>(
        items: Vec<T>,
        op: F,
        batch_size: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<R>, FanOutError<E>>
    where
        F: Fn(T) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        if batch_size == 0 {
            return Err(FanOutError::InvalidBatchSize);
        }

        let mut out = Vec::with_capacity(items.len());
        let mut remaining = items.into_iter();

        loop {
            let chunk: Vec<T> = remaining.by_ref().take(batch_size).collect();
            if chunk.is_empty() {
                break;
            }

            let chunk_results = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(FanOutError::Cancelled),
                results = futures::future::join_all(chunk.into_iter().map(&op)) => results,
            };

            // All chunk work has settled; the lowest-indexed failure wins.
            for result in chunk_results {
                out.push(result.map_err(FanOutError::Op)?);
            }

            tokio::task::yield_now().await;
        }

        Ok(out)
    }

    /// Invoke `op`, retrying on failure with exponential backoff
    /// (`initial_delay * 2^attempt`) up to `max_retries` additional
    /// attempts. On exhaustion the last attempt's failure is re-raised
    /// unchanged, not wrapped. `max_retries == 0` means exactly one attempt.
    pub async fn run_with_retries<R, E, F, Fut>(
        op: F,
        max_retries: u32,
        initial_delay: Duration,
    ) -> Result<R, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) if attempt >= max_retries => return Err(error),
                Err(_) => {
                    let factor = 2u32.saturating_pow(attempt);
                    let backoff = initial_delay
                        .checked_mul(factor)
                        .unwrap_or(Duration::MAX);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Race `op` against a timer. The operation receives a child
    /// `CancellationToken` that is cancelled when the timer fires, and the
    /// caller gets [`FanOutError::Timeout`] — always distinguishable from
    /// anything `op` itself raises. If `op` finishes first its result or
    /// failure passes through unchanged and the timer is discarded.
    pub async fn run_with_timeout<R, E, F, Fut>(
        op: F,
        timeout: Duration,
    ) -> Result<R, FanOutError<E>>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<R, E>>,
    {
        let token = CancellationToken::new();
        let work = op(token.child_token());
        tokio::pin!(work);

        tokio::select! {
            result = &mut work => result.map_err(FanOutError::Op),
            _ = tokio::time::sleep(timeout) => {
                token.cancel();
                Err(FanOutError::Timeout(timeout))
            }
        }
    }
}

fn bounded_semaphore(max_concurrency: usize) -> Option<Arc<Semaphore>> {
    (max_concurrency > 0).then(|| Arc::new(Semaphore::new(max_concurrency)))
}
