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

use crate::physical::generators::LocalLimit;
use crate::physical::{PhysicalPlan, PlanItem};
use crate::task::{Instruction, OpenTaskBuilder, PartitionTaskHandle, ResourceRequest};
use std::collections::VecDeque;

/// Wraps the child in `local_limit(remaining)` (so no partition ever reads
/// more rows than could possibly be needed), materializes each partition
/// as single-output, and as they complete *in dispatch order* tightens the
/// running `remaining` budget. Once `remaining` hits zero, every further
/// declared output partition is satisfied by reusing the last completed
/// partition's handle with `LocalLimit(0)` rather than materializing or
/// even touching the rest of the child.
#[derive(Debug)]
pub struct GlobalLimit {
    inner: LocalLimit,
    stage_id: u64,
    remaining: usize,
    num_outputs: usize,
    output_index: usize,
    materializations: VecDeque<PartitionTaskHandle>,
    last_reusable: Option<PartitionTaskHandle>,
    inner_exhausted: bool,
    pending: VecDeque<PlanItem>,
    finished: bool,
}

impl GlobalLimit {
    pub fn new(child: Box<dyn PhysicalPlan>, stage_id: u64, n: usize, num_outputs: usize) -> Self {
        Self {
            inner: LocalLimit::new(child, n),
            stage_id,
            remaining: n,
            num_outputs,
            output_index: 0,
            materializations: VecDeque::new(),
            last_reusable: None,
            inner_exhausted: false,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    fn reuse_task(&self, handle: &PartitionTaskHandle) -> OpenTaskBuilder {
        OpenTaskBuilder::new(self.stage_id, vec![handle.partition()]).add_instruction(Instruction::LocalLimit(0), ResourceRequest::default())
    }
}

impl PhysicalPlan for GlobalLimit {
    fn poll(&mut self) -> Option<PlanItem> {
        if self.finished {
            return None;
        }
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }

            while self.remaining > 0 {
                let is_front_done = match self.materializations.front() {
                    Some(front) => front.done(),
                    None => break,
                };
                if !is_front_done {
                    break;
                }
                let done_task = self.materializations.pop_front().unwrap();
                let rows = done_task.partition_metadata().num_rows;
                let take = self.remaining.min(rows);
                self.remaining -= take;
                let builder = OpenTaskBuilder::new(self.stage_id, vec![done_task.partition()]).add_instruction(
                    Instruction::LocalLimit(take),
                    ResourceRequest::with_memory(done_task.partition_metadata().size_bytes),
                );
                self.pending.push_back(PlanItem::Open(builder));
                self.output_index += 1;
                self.last_reusable = Some(done_task);

                if self.remaining == 0 {
                    for handle in self.materializations.drain(..) {
                        handle.cancel();
                    }
                }
            }
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }

            if self.output_index >= self.num_outputs {
                self.finished = true;
                return None;
            }

            if self.remaining == 0 {
                return match &self.last_reusable {
                    Some(reusable) => {
                        self.output_index += 1;
                        Some(PlanItem::Open(self.reuse_task(reusable)))
                    }
                    None => {
                        self.finished = true;
                        None
                    }
                };
            }

            if !self.inner_exhausted {
                match self.inner.poll() {
                    Some(PlanItem::Open(builder)) => {
                        let handle = builder.finalize_single();
                        self.materializations.push_back(handle.clone());
                        return Some(PlanItem::Finalized(handle));
                    }
                    Some(other) => return Some(other),
                    None => {
                        self.inner_exhausted = true;
                        continue;
                    }
                }
            } else if self.materializations.is_empty() {
                self.finished = true;
                return None;
            } else {
                return Some(PlanItem::Suspend);
            }
        }
    }

    fn tighten(&mut self, new_limit: usize) {
        self.inner.tighten(new_limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::{PartitionHandle, PartitionMetadata};
    use crate::physical::generators::PartitionRead;

    #[test]
    fn bounds_total_rows_to_the_limit_and_reuses_for_remaining_outputs() {
        let handles = vec![PartitionHandle::new(), PartitionHandle::new()];
        let child = PartitionRead::new(0, handles);
        let mut gen = GlobalLimit::new(Box::new(child), 0, 3, 2);

        let h0 = match gen.poll().unwrap() {
            PlanItem::Finalized(h) => h,
            other => panic!("expected Finalized, got {:?}", other),
        };
        h0.mark_done(vec![PartitionHandle::new()], vec![PartitionMetadata::new(5, 500)]);

        match gen.poll().unwrap() {
            PlanItem::Open(builder) => assert!(matches!(builder.instructions[0], Instruction::LocalLimit(3))),
            other => panic!("expected Open LocalLimit(3), got {:?}", other),
        }
        // Second output partition is satisfied via reuse, never touching the second child partition.
        match gen.poll().unwrap() {
            PlanItem::Open(builder) => assert!(matches!(builder.instructions[0], Instruction::LocalLimit(0))),
            other => panic!("expected Open LocalLimit(0) reuse, got {:?}", other),
        }
        assert!(gen.poll().is_none());
    }
}
