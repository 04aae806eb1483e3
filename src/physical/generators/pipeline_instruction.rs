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

/// Pass-through: fuses one instruction into every `Open` task from the
/// child; forwards anything else (`Finalized`, `Suspend`) unchanged.
#[derive(Debug)]
pub struct PipelineInstruction {
    child: Box<dyn PhysicalPlan>,
    instruction: Instruction,
    resource_request: ResourceRequest,
}

impl PipelineInstruction {
    pub fn new(child: Box<dyn PhysicalPlan>, instruction: Instruction, resource_request: ResourceRequest) -> Self {
        Self {
            child,
            instruction,
            resource_request,
        }
    }
}

impl PhysicalPlan for PipelineInstruction {
    fn poll(&mut self) -> Option<PlanItem> {
        match self.child.poll()? {
            PlanItem::Open(builder) => Some(PlanItem::Open(builder.add_instruction(self.instruction.clone(), self.resource_request))),
            other => Some(other),
        }
    }

    fn tighten(&mut self, new_limit: usize) {
        self.child.tighten(new_limit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physical::generators::PartitionRead;
    use crate::partition::PartitionHandle;

    #[test]
    fn fuses_instruction_into_every_open_task() {
        let child = PartitionRead::new(0, vec![PartitionHandle::new()]);
        let mut gen = PipelineInstruction::new(Box::new(child), Instruction::LocalLimit(5), ResourceRequest::default());
        match gen.poll() {
            Some(PlanItem::Open(builder)) => assert_eq!(builder.instructions.len(), 1),
            other => panic!("expected Open, got {:?}", other),
        }
        assert!(gen.poll().is_none());
    }
}
