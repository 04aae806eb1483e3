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
use crate::task::{Instruction, ResourceRequest};

/// Fuses `LocalLimit(n)` into every `Open` task from the child. `n` can be
/// tightened after the fact by an enclosing `global_limit`, which is why
/// this is the one generator that overrides `tighten`.
#[derive(Debug)]
pub struct LocalLimit {
    child: Box<dyn PhysicalPlan>,
    n: usize,
}

impl LocalLimit {
    pub fn new(child: Box<dyn PhysicalPlan>, n: usize) -> Self {
        Self { child, n }
    }
}

impl PhysicalPlan for LocalLimit {
    fn poll(&mut self) -> Option<PlanItem> {
        match self.child.poll()? {
            PlanItem::Open(builder) => Some(PlanItem::Open(builder.add_instruction(Instruction::LocalLimit(self.n), ResourceRequest::default()))),
            other => Some(other),
        }
    }

    fn tighten(&mut self, new_limit: usize) {
        self.n = new_limit;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::PartitionHandle;
    use crate::physical::generators::PartitionRead;

    #[test]
    fn tighten_changes_the_limit_fused_into_later_tasks() {
        let child = PartitionRead::new(0, vec![PartitionHandle::new(), PartitionHandle::new()]);
        let mut gen = LocalLimit::new(Box::new(child), 100);
        match gen.poll().unwrap() {
            PlanItem::Open(builder) => assert!(matches!(builder.instructions[0], Instruction::LocalLimit(100))),
            other => panic!("expected Open, got {:?}", other),
        }
        gen.tighten(3);
        match gen.poll().unwrap() {
            PlanItem::Open(builder) => assert!(matches!(builder.instructions[0], Instruction::LocalLimit(3))),
            other => panic!("expected Open, got {:?}", other),
        }
    }
}
