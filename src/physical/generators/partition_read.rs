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

use crate::partition::PartitionHandle;
use crate::physical::{PhysicalPlan, PlanItem};
use crate::task::OpenTaskBuilder;
use std::collections::VecDeque;

/// Leaf generator: one `Open` task per pre-existing partition handle, no
/// instructions fused yet.
#[derive(Debug)]
pub struct PartitionRead {
    stage_id: u64,
    handles: VecDeque<PartitionHandle>,
}

impl PartitionRead {
    pub fn new(stage_id: u64, handles: Vec<PartitionHandle>) -> Self {
        Self {
            stage_id,
            handles: handles.into(),
        }
    }
}

impl PhysicalPlan for PartitionRead {
    fn poll(&mut self) -> Option<PlanItem> {
        self.handles
            .pop_front()
            .map(|h| PlanItem::Open(OpenTaskBuilder::new(self.stage_id, vec![h])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_one_open_task_per_handle_then_exhausts() {
        let handles = vec![PartitionHandle::new(), PartitionHandle::new()];
        let mut gen = PartitionRead::new(0, handles);
        assert!(matches!(gen.poll(), Some(PlanItem::Open(_))));
        assert!(matches!(gen.poll(), Some(PlanItem::Open(_))));
        assert!(gen.poll().is_none());
    }
}
