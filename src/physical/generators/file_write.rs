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

use crate::logical::FileFormat;
use crate::physical::{PhysicalPlan, PlanItem};
use crate::task::{Instruction, ResourceRequest};

/// Fuses `WriteFile(partition_id)` into every `Open` task from the child,
/// numbering output partitions in emission order.
#[derive(Debug)]
pub struct FileWrite {
    child: Box<dyn PhysicalPlan>,
    format: FileFormat,
    path: String,
    next_partition_id: usize,
}

impl FileWrite {
    pub fn new(child: Box<dyn PhysicalPlan>, format: FileFormat, path: String) -> Self {
        Self {
            child,
            format,
            path,
            next_partition_id: 0,
        }
    }
}

impl PhysicalPlan for FileWrite {
    fn poll(&mut self) -> Option<PlanItem> {
        match self.child.poll()? {
            PlanItem::Open(builder) => {
                let partition_id = self.next_partition_id;
                self.next_partition_id += 1;
                Some(PlanItem::Open(builder.add_instruction(
                    Instruction::WriteFile {
                        partition_id,
                        format: self.format,
                        path: self.path.clone(),
                    },
                    ResourceRequest::default(),
                )))
            }
            other => Some(other),
        }
    }
}
