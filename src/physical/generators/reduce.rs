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

use crate::physical::{PhysicalPlan, PlanItem};
use crate::task::{Instruction, OpenTaskBuilder, PartitionTaskHandle, ResourceRequest};

/// Consumes a fanout child that produces a 2-D grid of partitions (one
/// multi-output task per fanout source); dispatches every fanout first,
/// then, once all are `Done`, emits one reduce task per output index
/// taking the `i`-th slice across every fanout source.
#[derive(Debug)]
pub struct Reduce {
    child: Box<dyn PhysicalPlan>,
    stage_id: u64,
    num_partitions: usize,
    reduce_instruction: Instruction,
    materializations: Vec<PartitionTaskHandle>,
    child_exhausted: bool,
    next_output_index: usize,
}

impl Reduce {
    pub fn new(child: Box<dyn PhysicalPlan>, stage_id: u64, num_partitions: usize, reduce_instruction: Instruction) -> Self {
        Self {
            child,
            stage_id,
            num_partitions,
            reduce_instruction,
            materializations: Vec::new(),
            child_exhausted: false,
            next_output_index: 0,
        }
    }
}

impl PhysicalPlan for Reduce {
    fn poll(&mut self) -> Option<PlanItem> {
        loop {
            if !self.child_exhausted {
                match self.child.poll() {
                    Some(PlanItem::Open(builder)) => {
                        let handle = builder.finalize_multi(self.num_partitions);
                        self.materializations.push(handle.clone());
                        return Some(PlanItem::Finalized(handle));
                    }
                    Some(other) => return Some(other),
                    None => {
                        self.child_exhausted = true;
                        continue;
                    }
                }
            }

            if self.materializations.iter().any(|t| !t.done()) {
                return Some(PlanItem::Suspend);
            }
            if self.next_output_index >= self.num_partitions {
                return None;
            }

            let i = self.next_output_index;
            self.next_output_index += 1;
            let inputs = self.materializations.iter().map(|t| t.partitions()[i]).collect();
            let memory_bytes = self.materializations.iter().map(|t| t.partition_metadata_at(i).size_bytes).sum();
            let builder = OpenTaskBuilder::new(self.stage_id, inputs)
                .add_instruction(self.reduce_instruction.clone(), ResourceRequest::with_memory(memory_bytes));
            return Some(PlanItem::Open(builder));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{PartitionHandle, PartitionMetadata};
    use crate::physical::generators::PartitionRead;

    #[test]
    fn waits_for_all_fanouts_then_reduces_by_slice() {
        let child = PartitionRead::new(0, vec![PartitionHandle::new(), PartitionHandle::new()]);
        let mut gen = Reduce::new(Box::new(child), 0, 2, Instruction::ReduceMerge);

        let mut handles = Vec::new();
        for _ in 0..2 {
            match gen.poll().unwrap() {
                PlanItem::Finalized(h) => handles.push(h),
                other => panic!("expected Finalized, got {:?}", other),
            }
        }
        assert!(matches!(gen.poll(), Some(PlanItem::Suspend)));
        for h in &handles {
            h.mark_done(
                vec![PartitionHandle::new(), PartitionHandle::new()],
                vec![PartitionMetadata::new(1, 10), PartitionMetadata::new(1, 20)],
            );
        }
        match gen.poll().unwrap() {
            PlanItem::Open(builder) => assert_eq!(builder.inputs.len(), 2),
            other => panic!("expected Open, got {:?}", other),
        }
        match gen.poll().unwrap() {
            PlanItem::Open(builder) => assert_eq!(builder.inputs.len(), 2),
            other => panic!("expected Open, got {:?}", other),
        }
        assert!(gen.poll().is_none());
    }
}
