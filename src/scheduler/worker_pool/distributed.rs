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

//! Dispatches tasks to remote worker processes over gRPC. The worker
//! binary itself (the `WorkerService` server, and whatever shared storage
//! or shuffle layer actually moves partition bytes between workers) is out
//! of scope for this crate; this module is the scheduler-side client half
//! of the wire protocol in `proto/worker.proto`.

pub mod proto {
    tonic::include_proto!("swarmquery.worker");
}

use crate::error::EngineError;
use crate::partition::{PartitionHandle, PartitionMetadata};
use crate::scheduler::worker_pool::{self, TaskFuture, WorkerPool};
use crate::task::PartitionTaskHandle;
use proto::worker_service_client::WorkerServiceClient;
use proto::{CancelTaskRequest, ExecuteTaskRequest};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A partition handle only has meaning within the process that minted it.
/// Every output a remote worker reports is identified by an opaque wire
/// string (see `proto::PartitionMetadataProto::handle`); this pool mints a
/// fresh local `PartitionHandle` for each one and remembers the mapping so
/// that a later task depending on it can address it again on the wire.
#[derive(Debug)]
pub struct DistributedWorkerPool {
    addrs: Vec<String>,
    next_addr: AtomicUsize,
    remote_ids: Arc<Mutex<HashMap<PartitionHandle, String>>>,
}

impl DistributedWorkerPool {
    pub fn new(worker_addrs: Vec<String>) -> Self {
        assert!(!worker_addrs.is_empty(), "distributed worker pool needs at least one worker address");
        Self {
            addrs: worker_addrs,
            next_addr: AtomicUsize::new(0),
            remote_ids: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn pick_addr(&self) -> String {
        let i = self.next_addr.fetch_add(1, Ordering::Relaxed) % self.addrs.len();
        self.addrs[i].clone()
    }

    /// The id this handle is known by on the wire: the remote id a prior
    /// response taught us, or (for a handle never yet shipped to a worker,
    /// e.g. the very first scan) its local raw number, which the worker is
    /// expected to resolve against the shared storage/shuffle layer.
    fn wire_id(remote_ids: &Mutex<HashMap<PartitionHandle, String>>, handle: &PartitionHandle) -> String {
        remote_ids
            .lock()
            .unwrap()
            .get(handle)
            .cloned()
            .unwrap_or_else(|| handle.raw().to_string())
    }
}

const MAX_ATTEMPTS: usize = 4;

impl WorkerPool for DistributedWorkerPool {
    fn dispatch(&self, task: PartitionTaskHandle) -> TaskFuture {
        let addr = self.pick_addr();
        let remote_ids = self.remote_ids.clone();
        Box::pin(async move {
            task.mark_running();
            let result = worker_pool::with_retries(
                || execute_remote(addr.clone(), &remote_ids, &task),
                MAX_ATTEMPTS,
            )
            .await;
            match result {
                Ok((outputs, metadata)) => task.mark_done(outputs, metadata),
                Err(err) => task.mark_failed(err),
            }
            task
        })
    }
}

async fn execute_remote(
    addr: String,
    remote_ids: &Mutex<HashMap<PartitionHandle, String>>,
    task: &PartitionTaskHandle,
) -> Result<(Vec<PartitionHandle>, Vec<PartitionMetadata>), EngineError> {
    let instructions = task.instructions();
    let payload = serde_json::to_vec(&instructions).map_err(|e| EngineError::TaskFatal(format!("encoding instructions: {e}")))?;
    let input_handles = task
        .inputs()
        .iter()
        .map(|h| DistributedWorkerPool::wire_id(remote_ids, h))
        .collect();
    let request = ExecuteTaskRequest {
        task_id: task.task_id().to_string(),
        stage_id: task.stage_id(),
        input_handles,
        instructions: payload,
        num_cpus: task.resource_request().num_cpus,
        num_gpus: task.resource_request().num_gpus,
        memory_bytes: task.resource_request().memory_bytes,
    };

    let mut client = WorkerServiceClient::connect(addr)
        .await
        .map_err(|e| EngineError::TaskTransient(format!("connecting to worker: {e}")))?;
    let response = client
        .execute_task(request)
        .await
        .map_err(|status| {
            if status.code() == tonic::Code::Unavailable {
                EngineError::TaskTransient(status.message().to_string())
            } else {
                EngineError::TaskFatal(status.message().to_string())
            }
        })?
        .into_inner();

    if !response.success {
        return Err(if response.transient {
            EngineError::TaskTransient(response.error)
        } else {
            EngineError::TaskFatal(response.error)
        });
    }

    let mut outputs = Vec::with_capacity(response.outputs.len());
    let mut metadata = Vec::with_capacity(response.outputs.len());
    let mut ids = remote_ids.lock().unwrap();
    for out in response.outputs {
        let local = PartitionHandle::new();
        ids.insert(local, out.handle);
        metadata.push(PartitionMetadata::new(out.num_rows as usize, out.size_bytes));
        outputs.push(local);
    }
    Ok((outputs, metadata))
}

/// Best-effort: tells a worker to stop a task it may still be running.
/// Never awaited by the scheduler's hot path; cancellation is fire-and-
/// forget because `PartitionTaskHandle::cancel()` already made the task's
/// outputs unobservable locally regardless of whether the RPC lands.
pub async fn cancel_remote(addr: String, task_id: String) -> Result<(), tonic::Status> {
    let mut client = WorkerServiceClient::connect(addr).await.map_err(|e| tonic::Status::unavailable(e.to_string()))?;
    client.cancel_task(CancelTaskRequest { task_id }).await?;
    Ok(())
}
