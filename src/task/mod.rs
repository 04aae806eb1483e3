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

//! The task and instruction model: `OpenTaskBuilder` ("Created", fusible)
//! transitions into a `PartitionTaskHandle` ("Dispatched") once a
//! generator finalizes it, and the scheduler drives it through
//! `Running -> Done|Failed|Cancelled`.

mod instruction;
mod resource;

pub use instruction::Instruction;
pub use resource::ResourceRequest;

use crate::error::EngineError;
use crate::partition::{PartitionHandle, PartitionMetadata};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputArity {
    Single,
    Multi(usize),
}

#[derive(Debug, Clone)]
pub enum TaskState {
    Dispatched,
    Running,
    Done {
        outputs: Vec<PartitionHandle>,
        metadata: Vec<PartitionMetadata>,
    },
    Failed(EngineError),
    Cancelled,
}

/// A finalized, immutable task: stage id, resource request, ordered input
/// handles and instruction list, and declared output arity are fixed the
/// moment it is built. Only `state` mutates, and only the scheduler thread
/// mutates it.
#[derive(Debug)]
pub struct PartitionTaskInner {
    pub task_id: Uuid,
    pub stage_id: u64,
    pub inputs: Vec<PartitionHandle>,
    pub instructions: Vec<Instruction>,
    pub resource_request: ResourceRequest,
    pub output_arity: OutputArity,
    state: TaskState,
}

/// A cheaply-cloned handle onto a finalized task. Generators hold these in
/// their FIFO queues and poll `done()`/`partition()` to decide what to
/// emit next; the scheduler is the only thing that ever calls the
/// `mark_*` methods.
#[derive(Debug, Clone)]
pub struct PartitionTaskHandle(Arc<Mutex<PartitionTaskInner>>);

impl PartitionTaskHandle {
    pub fn new(
        stage_id: u64,
        inputs: Vec<PartitionHandle>,
        instructions: Vec<Instruction>,
        resource_request: ResourceRequest,
        output_arity: OutputArity,
    ) -> Self {
        Self(Arc::new(Mutex::new(PartitionTaskInner {
            task_id: Uuid::new_v4(),
            stage_id,
            inputs,
            instructions,
            resource_request,
            output_arity,
            state: TaskState::Dispatched,
        })))
    }

    pub fn task_id(&self) -> Uuid {
        self.0.lock().unwrap().task_id
    }

    pub fn stage_id(&self) -> u64 {
        self.0.lock().unwrap().stage_id
    }

    pub fn inputs(&self) -> Vec<PartitionHandle> {
        self.0.lock().unwrap().inputs.clone()
    }

    pub fn instructions(&self) -> Vec<Instruction> {
        self.0.lock().unwrap().instructions.clone()
    }

    pub fn resource_request(&self) -> ResourceRequest {
        self.0.lock().unwrap().resource_request
    }

    pub fn output_arity(&self) -> OutputArity {
        self.0.lock().unwrap().output_arity
    }

    pub fn state(&self) -> TaskState {
        self.0.lock().unwrap().state.clone()
    }

    pub fn done(&self) -> bool {
        matches!(
            self.0.lock().unwrap().state,
            TaskState::Done { .. } | TaskState::Cancelled
        )
    }

    pub fn failed(&self) -> Option<EngineError> {
        match &self.0.lock().unwrap().state {
            TaskState::Failed(e) => Some(e.clone()),
            _ => None,
        }
    }

    /// The single output partition of a `Single`-arity task. Panics if the
    /// task is not done or not single-output; callers only ever call this
    /// after checking `done()` on a task they finalized as single-output,
    /// matching the teacher's `SingleOutputPartitionTask.partition()`.
    pub fn partition(&self) -> PartitionHandle {
        match &self.0.lock().unwrap().state {
            TaskState::Done { outputs, .. } => outputs[0],
            other => panic!("partition() called on task in state {:?}", other),
        }
    }

    pub fn partitions(&self) -> Vec<PartitionHandle> {
        match &self.0.lock().unwrap().state {
            TaskState::Done { outputs, .. } => outputs.clone(),
            other => panic!("partitions() called on task in state {:?}", other),
        }
    }

    pub fn partition_metadata(&self) -> PartitionMetadata {
        match &self.0.lock().unwrap().state {
            TaskState::Done { metadata, .. } => metadata[0].clone(),
            other => panic!("partition_metadata() called on task in state {:?}", other),
        }
    }

    pub fn partition_metadata_at(&self, i: usize) -> PartitionMetadata {
        match &self.0.lock().unwrap().state {
            TaskState::Done { metadata, .. } => metadata[i].clone(),
            other => panic!("partition_metadata_at() called on task in state {:?}", other),
        }
    }

    pub fn mark_running(&self) {
        let mut inner = self.0.lock().unwrap();
        if matches!(inner.state, TaskState::Dispatched) {
            inner.state = TaskState::Running;
        }
    }

    pub fn mark_done(&self, outputs: Vec<PartitionHandle>, metadata: Vec<PartitionMetadata>) {
        let mut inner = self.0.lock().unwrap();
        // Outputs of a cancelled task must never be observed: the
        // cancellation-safety invariant wins over a late completion.
        if !matches!(inner.state, TaskState::Cancelled) {
            inner.state = TaskState::Done { outputs, metadata };
        }
    }

    pub fn mark_failed(&self, err: EngineError) {
        let mut inner = self.0.lock().unwrap();
        if !matches!(inner.state, TaskState::Cancelled) {
            inner.state = TaskState::Failed(err);
        }
    }

    /// Idempotent. Cancelling a `Done` task is a no-op; otherwise marks
    /// the task terminal so no later completion can install outputs.
    pub fn cancel(&self) {
        let mut inner = self.0.lock().unwrap();
        if !matches!(inner.state, TaskState::Done { .. }) {
            inner.state = TaskState::Cancelled;
        }
    }
}

/// A partially-built task: still accepts instruction fusion. Finalizing
/// converts it into an immutable, dispatchable `PartitionTaskHandle`.
#[derive(Debug, Clone)]
pub struct OpenTaskBuilder {
    pub stage_id: u64,
    pub inputs: Vec<PartitionHandle>,
    pub instructions: Vec<Instruction>,
    pub resource_request: ResourceRequest,
}

impl OpenTaskBuilder {
    pub fn new(stage_id: u64, inputs: Vec<PartitionHandle>) -> Self {
        Self {
            stage_id,
            inputs,
            instructions: Vec::new(),
            resource_request: ResourceRequest::default(),
        }
    }

    /// Fuse an instruction into this builder: appends to the instruction
    /// list and takes the fused resource request (max cpu/gpu, sum mem).
    pub fn add_instruction(mut self, instruction: Instruction, resource_request: ResourceRequest) -> Self {
        self.resource_request = self.resource_request.fuse(&resource_request);
        self.instructions.push(instruction);
        self
    }

    pub fn finalize_single(self) -> PartitionTaskHandle {
        PartitionTaskHandle::new(
            self.stage_id,
            self.inputs,
            self.instructions,
            self.resource_request,
            OutputArity::Single,
        )
    }

    pub fn finalize_multi(self, n: usize) -> PartitionTaskHandle {
        PartitionTaskHandle::new(
            self.stage_id,
            self.inputs,
            self.instructions,
            self.resource_request,
            OutputArity::Multi(n),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_is_idempotent_and_wins_over_late_completion() {
        let handle = OpenTaskBuilder::new(0, vec![]).finalize_single();
        handle.cancel();
        handle.cancel();
        assert!(handle.done());
        // A late completion must not resurrect a cancelled task.
        handle.mark_done(vec![PartitionHandle::new()], vec![PartitionMetadata::new(1, 1)]);
        assert!(matches!(handle.state(), TaskState::Cancelled));
    }

    #[test]
    fn cancelling_a_done_task_is_a_no_op() {
        let handle = OpenTaskBuilder::new(0, vec![]).finalize_single();
        let out = PartitionHandle::new();
        handle.mark_done(vec![out], vec![PartitionMetadata::new(1, 1)]);
        handle.cancel();
        assert_eq!(handle.partition(), out);
    }
}
