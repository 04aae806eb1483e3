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
use std::collections::VecDeque;

/// Merges `from` input partitions down to `to` output partitions, no
/// rebalancing, only adjacent merges. `merges_per_output[i]` is
/// `ceil(from*(i+1)/to) - ceil(from*i/to)`, computed with integer
/// arithmetic so the boundaries land on exact partition indices.
#[derive(Debug)]
pub struct Coalesce {
    child: Box<dyn PhysicalPlan>,
    stage_id: u64,
    merges_per_output: VecDeque<usize>,
    buffer: VecDeque<PartitionTaskHandle>,
    child_exhausted: bool,
}

fn ceil_div(a: usize, b: usize) -> usize {
    (a + b - 1) / b
}

impl Coalesce {
    pub fn new(child: Box<dyn PhysicalPlan>, stage_id: u64, from: usize, to: usize) -> Self {
        let merges_per_output = (0..to)
            .map(|i| ceil_div(from * (i + 1), to) - ceil_div(from * i, to))
            .collect();
        Self {
            child,
            stage_id,
            merges_per_output,
            buffer: VecDeque::new(),
            child_exhausted: false,
        }
    }
}

impl PhysicalPlan for Coalesce {
    fn poll(&mut self) -> Option<PlanItem> {
        loop {
            if let Some(&k) = self.merges_per_output.front() {
                let ready = self.buffer.len() >= k && self.buffer.iter().take(k).all(|h| h.done());
                if ready {
                    let group: Vec<PartitionTaskHandle> = (0..k).map(|_| self.buffer.pop_front().unwrap()).collect();
                    self.merges_per_output.pop_front();
                    let inputs: Vec<_> = group.iter().map(|h| h.partition()).collect();
                    let memory_bytes = group.iter().map(|h| h.partition_metadata().size_bytes).sum();
                    let builder = OpenTaskBuilder::new(self.stage_id, inputs)
                        .add_instruction(Instruction::ReduceMerge, ResourceRequest::with_memory(memory_bytes));
                    return Some(PlanItem::Open(builder));
                }
            } else {
                return None;
            }

            if self.child_exhausted {
                return Some(PlanItem::Suspend);
            }
            match self.child.poll() {
                Some(PlanItem::Open(builder)) => {
                    let handle = builder.finalize_single();
                    self.buffer.push_back(handle.clone());
                    return Some(PlanItem::Finalized(handle));
                }
                Some(other) => return Some(other),
                None => {
                    self.child_exhausted = true;
                    continue;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{PartitionHandle, PartitionMetadata};
    use crate::physical::generators::PartitionRead;

    #[test]
    fn merges_per_output_splits_boundaries_as_expected() {
        let gen = Coalesce::new(Box::new(PartitionRead::new(0, vec![])), 0, 7, 3);
        assert_eq!(gen.merges_per_output, VecDeque::from(vec![3, 2, 2]));
    }

    #[test]
    fn emits_merge_only_once_all_inputs_in_group_are_done() {
        let handles: Vec<_> = (0..2).map(|_| PartitionHandle::new()).collect();
        let child = PartitionRead::new(0, handles);
        let mut gen = Coalesce::new(Box::new(child), 0, 2, 1);

        let h1 = match gen.poll().unwrap() {
            PlanItem::Finalized(h) => h,
            other => panic!("expected Finalized, got {:?}", other),
        };
        let h2 = match gen.poll().unwrap() {
            PlanItem::Finalized(h) => h,
            other => panic!("expected Finalized, got {:?}", other),
        };
        assert!(matches!(gen.poll(), Some(PlanItem::Suspend)));
        h1.mark_done(vec![PartitionHandle::new()], vec![PartitionMetadata::new(1, 10)]);
        h2.mark_done(vec![PartitionHandle::new()], vec![PartitionMetadata::new(1, 10)]);
        match gen.poll().unwrap() {
            PlanItem::Open(builder) => assert_eq!(builder.inputs.len(), 2),
            other => panic!("expected Open merge, got {:?}", other),
        }
        assert!(gen.poll().is_none());
    }
}
