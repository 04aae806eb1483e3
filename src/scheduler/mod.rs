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

//! The dynamic scheduler: pulls finalized tasks out of a `Materialize`
//! plan, admits them against resource caps, dispatches them to a worker
//! pool, and waits for completions — repeating until the plan is
//! exhausted or a fatal task error unwinds the whole query.

pub mod admission;
pub mod partition_cache;
pub mod worker_pool;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::partition::PartitionHandle;
use crate::physical::generators::Materialize;
use crate::physical::{PhysicalPlan, PlanItem};
use crate::task::PartitionTaskHandle;
use admission::AdmissionController;
use futures::stream::FuturesUnordered;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use worker_pool::{TaskFuture, WorkerPool};

const MIN_WAIT: Duration = Duration::from_millis(10);
const MAX_WAIT: Duration = Duration::from_millis(1000);

/// Owns the admission state for one query's lifetime. Stateless across
/// queries: build a fresh `Scheduler` per `run()`.
#[derive(Debug)]
pub struct Scheduler {
    pool: Arc<dyn WorkerPool>,
    admission: AdmissionController,
}

impl Scheduler {
    pub fn new(pool: Arc<dyn WorkerPool>, config: &EngineConfig) -> Self {
        Self {
            pool,
            admission: AdmissionController::new(config.cap_cpu, config.cap_gpu, config.cap_mem),
        }
    }

    /// Drives `plan` to completion and returns its ordered output handles.
    ///
    /// `Materialize::poll()` only returns `None` once every task it has
    /// ever finalized is `Done` — and those are exactly the handles this
    /// loop's own `pending`/`dispatched` bookkeeping tracks, since both
    /// sides hold clones of the same `Arc`-backed `PartitionTaskHandle`.
    /// So `None` can only be observed once this loop's own queues are
    /// already empty, and `plan.collect()` can be called immediately with
    /// no extra bookkeeping to reconcile.
    pub async fn run(&mut self, mut plan: Materialize) -> EngineResult<Vec<PartitionHandle>> {
        let mut pending: VecDeque<PartitionTaskHandle> = VecDeque::new();
        let mut dispatched: HashMap<Uuid, PartitionTaskHandle> = HashMap::new();
        let mut in_flight: FuturesUnordered<TaskFuture> = FuturesUnordered::new();
        let mut timeout = MIN_WAIT;

        loop {
            loop {
                match plan.poll() {
                    Some(PlanItem::Open(_)) => {
                        unreachable!("the top-level Materialize sink never yields an unfinalized task")
                    }
                    Some(PlanItem::Finalized(handle)) => pending.push_back(handle),
                    Some(PlanItem::Suspend) => break,
                    None => return Ok(plan.collect()),
                }
            }

            let mut requeue = VecDeque::new();
            while let Some(task) = pending.pop_front() {
                match self.admission.try_admit(&task.resource_request()) {
                    Ok(true) => {
                        dispatched.insert(task.task_id(), task.clone());
                        in_flight.push(self.pool.dispatch(task));
                    }
                    Ok(false) => requeue.push_back(task),
                    Err(err) => {
                        requeue.push_back(task);
                        cancel_all(&requeue, &dispatched);
                        return Err(err);
                    }
                }
            }
            pending = requeue;

            if in_flight.is_empty() {
                return Err(EngineError::TaskFatal(
                    "plan suspended with no tasks in flight and none admissible".to_string(),
                ));
            }

            let completed = worker_pool::wait(&mut in_flight, timeout).await;
            if completed.is_empty() {
                timeout = (timeout * 2).min(MAX_WAIT);
                continue;
            }
            timeout = MIN_WAIT;

            for task in completed {
                dispatched.remove(&task.task_id());
                match task.failed() {
                    Some(err) if err.is_query_fatal() => {
                        cancel_all(&pending, &dispatched);
                        return Err(err);
                    }
                    Some(_) => {}
                    None => self.admission.release(&task.resource_request()),
                }
            }
        }
    }
}

fn cancel_all(pending: &VecDeque<PartitionTaskHandle>, dispatched: &HashMap<Uuid, PartitionTaskHandle>) {
    for task in pending {
        task.cancel();
    }
    for task in dispatched.values() {
        task.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::PartitionHandle;
    use crate::physical::generators::PartitionRead;
    use crate::scheduler::partition_cache::PartitionCache;
    use crate::scheduler::worker_pool::local::LocalWorkerPool;
    use crate::testutil::MemPartition;

    #[tokio::test]
    async fn drives_a_trivial_scan_to_completion() {
        let cache = PartitionCache::new();
        let (partition, _id) = MemPartition::from_i64_column("x", vec![1, 2, 3]);
        let handle = PartitionHandle::new();
        cache.insert(handle, partition);

        let plan = Materialize::new(Box::new(PartitionRead::new(0, vec![handle])));
        let pool = Arc::new(LocalWorkerPool::new(cache));
        let mut scheduler = Scheduler::new(pool, &EngineConfig::default());

        let outputs = scheduler.run(plan).await.unwrap();
        assert_eq!(outputs, vec![handle]);
    }

    #[tokio::test]
    async fn a_task_that_alone_exceeds_caps_fails_the_whole_query() {
        use crate::physical::generators::PipelineInstruction;
        use crate::task::{Instruction, ResourceRequest};

        let cache = PartitionCache::new();
        let (partition, _id) = MemPartition::from_i64_column("x", vec![1]);
        let handle = PartitionHandle::new();
        cache.insert(handle, partition);

        let child = PartitionRead::new(0, vec![handle]);
        let heavy = PipelineInstruction::new(Box::new(child), Instruction::LocalLimit(1), ResourceRequest::new(100.0, 0.0, 0));
        let plan = Materialize::new(Box::new(heavy));

        let mut config = EngineConfig::default();
        config.cap_cpu = 2.0;
        let pool = Arc::new(LocalWorkerPool::new(cache));
        let mut scheduler = Scheduler::new(pool, &config);

        let err = scheduler.run(plan).await.unwrap_err();
        assert!(matches!(err, EngineError::ResourceExhausted(_)));
    }
}
