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

use crate::logical::JoinType;
use crate::physical::{PhysicalPlan, PlanItem};
use crate::schema::ColumnId;
use crate::task::{Instruction, OpenTaskBuilder, PartitionTaskHandle, ResourceRequest};
use std::collections::VecDeque;

/// Greedy pairwise join: materializes both sides as single-output tasks
/// and, whenever the FIFO heads of both sides are `Done`, emits a join
/// task over them. While neither head is ready, pulls another step from
/// whichever side has fewer in-flight finalizations (ties favor the left,
/// matching the source's "pull child_plan first" bias).
#[derive(Debug)]
pub struct Join {
    left: Box<dyn PhysicalPlan>,
    right: Box<dyn PhysicalPlan>,
    stage_id: u64,
    left_on: Vec<ColumnId>,
    right_on: Vec<ColumnId>,
    how: JoinType,
    left_requests: VecDeque<PartitionTaskHandle>,
    right_requests: VecDeque<PartitionTaskHandle>,
    left_exhausted: bool,
    right_exhausted: bool,
}

impl Join {
    pub fn new(
        left: Box<dyn PhysicalPlan>,
        right: Box<dyn PhysicalPlan>,
        stage_id: u64,
        left_on: Vec<ColumnId>,
        right_on: Vec<ColumnId>,
        how: JoinType,
    ) -> Self {
        Self {
            left,
            right,
            stage_id,
            left_on,
            right_on,
            how,
            left_requests: VecDeque::new(),
            right_requests: VecDeque::new(),
            left_exhausted: false,
            right_exhausted: false,
        }
    }

    fn pull_side(
        side: &mut Box<dyn PhysicalPlan>,
        requests: &mut VecDeque<PartitionTaskHandle>,
        exhausted: &mut bool,
    ) -> Option<PlanItem> {
        match side.poll() {
            Some(PlanItem::Open(builder)) => {
                let handle = builder.finalize_single();
                requests.push_back(handle.clone());
                Some(PlanItem::Finalized(handle))
            }
            Some(other) => Some(other),
            None => {
                *exhausted = true;
                None
            }
        }
    }
}

impl PhysicalPlan for Join {
    fn poll(&mut self) -> Option<PlanItem> {
        loop {
            if let (Some(l), Some(r)) = (self.left_requests.front(), self.right_requests.front()) {
                if l.done() && r.done() {
                    let l = self.left_requests.pop_front().unwrap();
                    let r = self.right_requests.pop_front().unwrap();
                    let rr = ResourceRequest::with_memory(l.partition_metadata().size_bytes + r.partition_metadata().size_bytes);
                    let builder = OpenTaskBuilder::new(self.stage_id, vec![l.partition(), r.partition()]).add_instruction(
                        Instruction::Join {
                            left_on: self.left_on.clone(),
                            right_on: self.right_on.clone(),
                            how: self.how,
                        },
                        rr,
                    );
                    return Some(PlanItem::Open(builder));
                }
            }

            if self.left_exhausted && self.right_exhausted {
                return if self.left_requests.is_empty() && self.right_requests.is_empty() {
                    None
                } else {
                    Some(PlanItem::Suspend)
                };
            }

            // Tie favors the left, matching the source's left-biased pull.
            let pull_left_first = self.left_requests.len() <= self.right_requests.len();
            let order = if pull_left_first { [true, false] } else { [false, true] };
            let mut made_progress = false;
            for pull_left in order {
                if pull_left && !self.left_exhausted {
                    made_progress = true;
                    if let Some(item) = Self::pull_side(&mut self.left, &mut self.left_requests, &mut self.left_exhausted) {
                        return Some(item);
                    }
                } else if !pull_left && !self.right_exhausted {
                    made_progress = true;
                    if let Some(item) = Self::pull_side(&mut self.right, &mut self.right_requests, &mut self.right_exhausted) {
                        return Some(item);
                    }
                }
            }
            if !made_progress {
                // Both sides already exhausted but not yet caught by the
                // check above on this pass; loop will catch it next time.
                return Some(PlanItem::Suspend);
            }
            // A preferred side just became exhausted without yielding;
            // loop back around to re-check readiness or try the other.
        }
    }
}
