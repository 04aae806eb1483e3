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
use crate::task::{Instruction, OpenTaskBuilder, PartitionTaskHandle, ResourceRequest};
use std::collections::VecDeque;

/// Child yields file-listing partitions (one row per discovered file).
/// Each listing is finalized single-output; once done, this emits one
/// `Open` task per listed file carrying `ReadFile(index)`.
///
/// The listing's per-file size isn't individually visible through the
/// opaque `PartitionMetadata` (only the listing partition's aggregate
/// `size_bytes` is), so the per-file memory request is approximated as an
/// even split of the listing's total size across its files.
#[derive(Debug)]
pub struct FileRead {
    child: Box<dyn PhysicalPlan>,
    stage_id: u64,
    format: FileFormat,
    materializations: VecDeque<PartitionTaskHandle>,
    pending: VecDeque<PlanItem>,
    child_exhausted: bool,
}

impl FileRead {
    pub fn new(child: Box<dyn PhysicalPlan>, stage_id: u64, format: FileFormat) -> Self {
        Self {
            child,
            stage_id,
            format,
            materializations: VecDeque::new(),
            pending: VecDeque::new(),
            child_exhausted: false,
        }
    }
}

impl PhysicalPlan for FileRead {
    fn poll(&mut self) -> Option<PlanItem> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }

            while let Some(front) = self.materializations.front() {
                if !front.done() {
                    break;
                }
                let done_task = self.materializations.pop_front().unwrap();
                let meta = done_task.partition_metadata();
                let source = done_task.partition();
                let n_files = meta.num_rows;
                let per_file_bytes = if n_files == 0 { 0 } else { meta.size_bytes / n_files as u64 };
                for index in 0..n_files {
                    let builder = OpenTaskBuilder::new(self.stage_id, vec![source]).add_instruction(
                        Instruction::ReadFile { format: self.format, index },
                        ResourceRequest::with_memory(per_file_bytes),
                    );
                    self.pending.push_back(PlanItem::Open(builder));
                }
            }
            if let Some(item) = self.pending.pop_front() {
                return Some(item);
            }

            if self.child_exhausted {
                return if self.materializations.is_empty() { None } else { Some(PlanItem::Suspend) };
            }

            match self.child.poll() {
                Some(PlanItem::Open(builder)) => {
                    let handle = builder.finalize_single();
                    self.materializations.push_back(handle.clone());
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
    fn emits_one_read_per_listed_file() {
        let listing = PartitionHandle::new();
        let child = PartitionRead::new(0, vec![listing]);
        let mut gen = FileRead::new(Box::new(child), 0, FileFormat::Parquet);

        let finalized = match gen.poll().unwrap() {
            PlanItem::Finalized(handle) => handle,
            other => panic!("expected Finalized, got {:?}", other),
        };
        finalized.mark_done(vec![listing], vec![PartitionMetadata::new(3, 300)]);

        for _ in 0..3 {
            assert!(matches!(gen.poll(), Some(PlanItem::Open(_))));
        }
        assert!(gen.poll().is_none());
    }
}
