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
use crate::task::PartitionTaskHandle;

/// The sink at the top of every physical plan tree: finalizes any still-
/// `Open` task as single-output (every other generator only finalizes the
/// tasks it needs to observe itself), forwards everything else, and once
/// the child is exhausted and every task it ever finalized is `Done`,
/// yields the ordered list of output partition handles via `collect()`.
///
/// Unlike the other generators this isn't itself driven through `poll()`
/// returning query results — the scheduler calls `poll()` exactly like any
/// other generator and, once it returns `None`, calls `collect()` to get
/// the final output handles.
#[derive(Debug)]
pub struct Materialize {
    child: Box<dyn PhysicalPlan>,
    materializations: Vec<PartitionTaskHandle>,
    child_exhausted: bool,
}

impl Materialize {
    pub fn new(child: Box<dyn PhysicalPlan>) -> Self {
        Self {
            child,
            materializations: Vec::new(),
            child_exhausted: false,
        }
    }

    /// The ordered output partition handles. Panics if any materialized
    /// task isn't `Done` yet — callers only call this after `poll()`
    /// returns `None`.
    pub fn collect(&self) -> Vec<PartitionHandle> {
        self.materializations.iter().map(|t| t.partition()).collect()
    }
}

impl PhysicalPlan for Materialize {
    fn poll(&mut self) -> Option<PlanItem> {
        if !self.child_exhausted {
            match self.child.poll() {
                Some(PlanItem::Open(builder)) => {
                    let handle = builder.finalize_single();
                    self.materializations.push(handle.clone());
                    return Some(PlanItem::Finalized(handle));
                }
                Some(other) => return Some(other),
                None => self.child_exhausted = true,
            }
        }
        if self.materializations.iter().any(|t| !t.done()) {
            Some(PlanItem::Suspend)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::PartitionMetadata;
    use crate::physical::generators::PartitionRead;

    #[test]
    fn collects_outputs_once_everything_is_done() {
        let child = PartitionRead::new(0, vec![PartitionHandle::new(), PartitionHandle::new()]);
        let mut gen = Materialize::new(Box::new(child));

        let h1 = match gen.poll().unwrap() {
            PlanItem::Finalized(h) => h,
            other => panic!("expected Finalized, got {:?}", other),
        };
        let h2 = match gen.poll().unwrap() {
            PlanItem::Finalized(h) => h,
            other => panic!("expected Finalized, got {:?}", other),
        };
        assert!(matches!(gen.poll(), Some(PlanItem::Suspend)));
        h1.mark_done(vec![PartitionHandle::new()], vec![PartitionMetadata::new(1, 1)]);
        h2.mark_done(vec![PartitionHandle::new()], vec![PartitionMetadata::new(1, 1)]);
        assert!(gen.poll().is_none());
        assert_eq!(gen.collect().len(), 2);
    }
}
