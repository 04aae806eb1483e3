// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Where a dispatched task actually runs is a swappable concern: the
//! scheduler only ever holds a `dyn WorkerPool` and never knows whether a
//! task ran in-process or on a remote worker over gRPC.

pub mod distributed;
pub mod local;

use crate::error::EngineError;
use crate::task::PartitionTaskHandle;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

const RETRY_BASE: Duration = Duration::from_millis(50);

/// Resolves to the same handle it was dispatched with, once that task has
/// reached a terminal state (`Done`/`Failed`/`Cancelled`) — never to `()`,
/// so a caller polling many of these at once can tell which task just
/// finished without a side-table keyed by task id.
pub type TaskFuture = Pin<Box<dyn Future<Output = PartitionTaskHandle> + Send>>;

/// Executes dispatched tasks, somewhere. Implementations own however they
/// actually run a task (a local thread pool, a remote gRPC worker); they
/// must call `mark_done`/`mark_failed` on the handle before the returned
/// future resolves.
pub trait WorkerPool: std::fmt::Debug + Send + Sync {
    fn dispatch(&self, task: PartitionTaskHandle) -> TaskFuture;
}

/// Waits for at least one of `in_flight` to complete, or until `timeout`
/// elapses, whichever comes first. Returns every task that completed
/// during the wait (possibly empty, if the timeout fired with none ready).
///
/// `in_flight` is a `FuturesUnordered` rather than something like
/// `futures::future::select_all` specifically because `select_all` takes
/// ownership of every future and, on a timeout, drops the ones that didn't
/// win the race — for a spawned task that would silently orphan the only
/// signal the scheduler has of its completion. `FuturesUnordered` is only
/// ever polled, so futures that aren't ready yet stay right where they are
/// for the next call to `wait`.
pub async fn wait(in_flight: &mut FuturesUnordered<TaskFuture>, timeout: Duration) -> Vec<PartitionTaskHandle> {
    let mut completed = Vec::new();
    tokio::select! {
        first = in_flight.next() => {
            if let Some(task) = first {
                completed.push(task);
            }
        }
        _ = tokio::time::sleep(timeout) => return completed,
    }
    // Drain any further completions that were already ready, without
    // blocking further: a single wave can report more than one task.
    while let Some(Some(task)) = futures::FutureExt::now_or_never(in_flight.next()) {
        completed.push(task);
    }
    completed
}

/// Retries `attempt` up to `max_attempts` times with fixed exponential
/// backoff, but only when it fails with `TaskTransient` — a `TaskFatal`
/// error is unwinding the query, not a worker hiccup, and must propagate on
/// the first try.
pub async fn with_retries<F, Fut, T>(mut attempt: F, max_attempts: usize) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut delay = RETRY_BASE;
    for try_num in 0..max_attempts {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(EngineError::TaskTransient(msg)) => {
                if try_num + 1 == max_attempts {
                    return Err(EngineError::TaskTransient(msg));
                }
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
            Err(other) => return Err(other),
        }
    }
    unreachable!("loop always returns by the final iteration")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{OpenTaskBuilder, OutputArity};
    use std::sync::Arc;
    use tokio::sync::Notify;

    fn pending_task(notify: Arc<Notify>) -> TaskFuture {
        let task = OpenTaskBuilder::new(0, vec![]).finalize_single();
        let out = task.clone();
        Box::pin(async move {
            notify.notified().await;
            out.mark_done(vec![], vec![]);
            out
        })
    }

    #[tokio::test]
    async fn wait_returns_empty_on_timeout_with_nothing_ready() {
        let notify = Arc::new(Notify::new());
        let mut in_flight = FuturesUnordered::new();
        in_flight.push(pending_task(notify));
        let completed = wait(&mut in_flight, Duration::from_millis(5)).await;
        assert!(completed.is_empty());
        // the still-pending future must not have been dropped.
        assert_eq!(in_flight.len(), 1);
    }

    #[tokio::test]
    async fn wait_reports_a_completed_task_promptly() {
        let notify = Arc::new(Notify::new());
        let mut in_flight = FuturesUnordered::new();
        in_flight.push(pending_task(notify.clone()));
        notify.notify_one();
        let completed = wait(&mut in_flight, Duration::from_secs(1)).await;
        assert_eq!(completed.len(), 1);
        assert!(completed[0].done());
    }

    #[test]
    fn output_arity_is_carried_through_single_finalize() {
        let task = OpenTaskBuilder::new(0, vec![]).finalize_single();
        assert_eq!(task.output_arity(), OutputArity::Single);
    }

    #[tokio::test]
    async fn with_retries_recovers_from_transient_failures() {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let result = with_retries(
            || async {
                let n = calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                if n < 2 {
                    Err(EngineError::TaskTransient("blip".to_string()))
                } else {
                    Ok(42)
                }
            },
            5,
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn with_retries_gives_up_on_a_fatal_error_immediately() {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let result: Result<(), EngineError> = with_retries(
            || async {
                calls.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                Err(EngineError::TaskFatal("nope".to_string()))
            },
            5,
        )
        .await;
        assert!(matches!(result, Err(EngineError::TaskFatal(_))));
        assert_eq!(calls.load(std::sync::atomic::Ordering::Relaxed), 1);
    }
}
