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

//! Runs dispatched tasks on the local tokio runtime's blocking pool.
//! Stands in for a real worker process: same `Partition::execute`
//! boundary, same task state machine, just no network hop.

use crate::error::EngineError;
use crate::partition::{Partition, PartitionHandle};
use crate::scheduler::partition_cache::PartitionCache;
use crate::scheduler::worker_pool::{TaskFuture, WorkerPool};
use crate::task::PartitionTaskHandle;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct LocalWorkerPool {
    cache: PartitionCache,
}

impl LocalWorkerPool {
    pub fn new(cache: PartitionCache) -> Self {
        Self { cache }
    }
}

impl WorkerPool for LocalWorkerPool {
    fn dispatch(&self, task: PartitionTaskHandle) -> TaskFuture {
        let cache = self.cache.clone();
        Box::pin(async move {
            task.mark_running();
            let result = tokio::task::spawn_blocking({
                let cache = cache.clone();
                let task = task.clone();
                move || run_task(&cache, &task)
            })
            .await;
            match result {
                Ok(Ok((outputs, metadata))) => task.mark_done(outputs, metadata),
                Ok(Err(err)) => task.mark_failed(err),
                Err(join_err) => task.mark_failed(EngineError::TaskFatal(join_err.to_string())),
            }
            task
        })
    }
}

/// Runs every fused instruction of `task` against its cached input
/// partitions and returns the new output handles plus their metadata.
///
/// Instructions are threaded through `Partition::execute`'s `(self,
/// inputs)` split by treating the first partition in the running list as
/// the driver and the rest as its `inputs` slice. That convention happens
/// to fit every generator this engine builds: `Join` orders a task's
/// inputs `[left, right]`, `Reduce`/`Coalesce` put "the partition whose
/// slot a task's instructions run against" first among the handles being
/// merged, and `FanoutRange`'s task takes `[boundaries, source]` — the
/// boundaries partition plays the driver role there, which is a quirk of
/// this convention rather than a distinguished case it needs to special-
/// case.
fn run_task(cache: &PartitionCache, task: &PartitionTaskHandle) -> Result<(Vec<PartitionHandle>, Vec<crate::partition::PartitionMetadata>), EngineError> {
    let input_handles = task.inputs();
    let instructions = task.instructions();

    if instructions.is_empty() {
        // Identity pass-through: an unmodified scan reaching a sink
        // untouched. Reuse the existing handles rather than copy them.
        let metadata = input_handles
            .iter()
            .map(|h| cache.metadata(h).ok_or_else(|| missing_partition(h)))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok((input_handles, metadata));
    }

    let mut current: Vec<Arc<dyn Partition>> = input_handles
        .iter()
        .map(|h| cache.get(h).ok_or_else(|| missing_partition(h)))
        .collect::<Result<Vec<_>, _>>()?;

    for instruction in &instructions {
        let (driver, rest) = current.split_first().ok_or_else(|| {
            EngineError::TaskFatal(format!("task {} has instruction {} but no input partitions", task.task_id(), instruction.name()))
        })?;
        current = driver.execute(instruction, rest)?;
    }

    let mut outputs = Vec::with_capacity(current.len());
    let mut metadata = Vec::with_capacity(current.len());
    for partition in current {
        let handle = PartitionHandle::new();
        metadata.push(crate::partition::PartitionMetadata::new(partition.num_rows(), partition.size_bytes()));
        cache.insert(handle, partition);
        outputs.push(handle);
    }
    Ok((outputs, metadata))
}

fn missing_partition(handle: &PartitionHandle) -> EngineError {
    EngineError::TaskFatal(format!("partition {handle} missing from cache"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Instruction, OpenTaskBuilder, ResourceRequest};
    use crate::testutil::MemPartition;

    #[tokio::test]
    async fn runs_a_single_fused_instruction_and_caches_its_output() {
        let cache = PartitionCache::new();
        let (partition, id) = MemPartition::from_i64_column("x", vec![1, 2, 3]);
        let input = PartitionHandle::new();
        cache.insert(input, partition);

        let task = OpenTaskBuilder::new(0, vec![input])
            .add_instruction(Instruction::LocalLimit(2), ResourceRequest::default())
            .finalize_single();

        let pool = LocalWorkerPool::new(cache.clone());
        let done = pool.dispatch(task).await;
        assert!(done.done());
        assert_eq!(cache.metadata(&done.partition()).unwrap().num_rows, 2);
        let _ = id;
    }

    #[tokio::test]
    async fn identity_pass_through_reuses_the_input_handle() {
        let cache = PartitionCache::new();
        let (partition, _id) = MemPartition::from_i64_column("x", vec![1, 2, 3]);
        let input = PartitionHandle::new();
        cache.insert(input, partition);

        let task = OpenTaskBuilder::new(0, vec![input]).finalize_single();
        let pool = LocalWorkerPool::new(cache);
        let done = pool.dispatch(task).await;
        assert_eq!(done.partition(), input);
    }

    #[tokio::test]
    async fn a_missing_input_partition_fails_the_task() {
        let cache = PartitionCache::new();
        let task = OpenTaskBuilder::new(0, vec![PartitionHandle::new()])
            .add_instruction(Instruction::LocalLimit(1), ResourceRequest::default())
            .finalize_single();
        let pool = LocalWorkerPool::new(cache);
        let done = pool.dispatch(task).await;
        assert!(done.failed().is_some());
    }
}
