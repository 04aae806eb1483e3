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
use crate::schema::ColumnId;
use crate::task::{Instruction, ResourceRequest};

/// Fuses `FanoutRandom(n, seed)` into every `Open` task from the child,
/// converting it to a multi-output task. The seed increments per task so
/// repeated calls don't all hash to the same bucket.
#[derive(Debug)]
pub struct FanoutRandom {
    child: Box<dyn PhysicalPlan>,
    n: usize,
    next_seed: u64,
}

impl FanoutRandom {
    pub fn new(child: Box<dyn PhysicalPlan>, n: usize) -> Self {
        Self { child, n, next_seed: 0 }
    }
}

impl PhysicalPlan for FanoutRandom {
    fn poll(&mut self) -> Option<PlanItem> {
        match self.child.poll()? {
            PlanItem::Open(builder) => {
                let seed = self.next_seed;
                self.next_seed += 1;
                Some(PlanItem::Open(builder.add_instruction(
                    Instruction::FanoutRandom { k: self.n, seed },
                    ResourceRequest::default(),
                )))
            }
            other => Some(other),
        }
    }
}

/// Fuses `FanoutHash(n, keys)` into every `Open` task from the child,
/// converting it to a multi-output task.
#[derive(Debug)]
pub struct FanoutHash {
    child: Box<dyn PhysicalPlan>,
    n: usize,
    keys: Vec<ColumnId>,
}

impl FanoutHash {
    pub fn new(child: Box<dyn PhysicalPlan>, n: usize, keys: Vec<ColumnId>) -> Self {
        Self { child, n, keys }
    }
}

impl PhysicalPlan for FanoutHash {
    fn poll(&mut self) -> Option<PlanItem> {
        match self.child.poll()? {
            PlanItem::Open(builder) => Some(PlanItem::Open(builder.add_instruction(
                Instruction::FanoutHash {
                    k: self.n,
                    keys: self.keys.clone(),
                },
                ResourceRequest::default(),
            ))),
            other => Some(other),
        }
    }
}

/// Fuses `FanoutBroadcast(n)` into every `Open` task from the child,
/// duplicating the task's partition into `n` identical copies rather than
/// splitting its rows across `n` buckets. Paired with a `Reduce` of `n`
/// outputs downstream, every output ends up holding every row from every
/// upstream task — a true broadcast, not a row-scatter shuffle.
#[derive(Debug)]
pub struct FanoutBroadcast {
    child: Box<dyn PhysicalPlan>,
    n: usize,
}

impl FanoutBroadcast {
    pub fn new(child: Box<dyn PhysicalPlan>, n: usize) -> Self {
        Self { child, n }
    }
}

impl PhysicalPlan for FanoutBroadcast {
    fn poll(&mut self) -> Option<PlanItem> {
        match self.child.poll()? {
            PlanItem::Open(builder) => Some(PlanItem::Open(builder.add_instruction(
                Instruction::FanoutBroadcast { k: self.n },
                ResourceRequest::default(),
            ))),
            other => Some(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::PartitionHandle;
    use crate::physical::generators::PartitionRead;

    #[test]
    fn fanout_random_increments_seed_per_task() {
        let child = PartitionRead::new(0, vec![PartitionHandle::new(), PartitionHandle::new()]);
        let mut gen = FanoutRandom::new(Box::new(child), 4);
        let seeds: Vec<u64> = (0..2)
            .map(|_| match gen.poll().unwrap() {
                PlanItem::Open(builder) => match builder.instructions[0] {
                    Instruction::FanoutRandom { seed, .. } => seed,
                    _ => panic!("expected FanoutRandom"),
                },
                other => panic!("expected Open, got {:?}", other),
            })
            .collect();
        assert_eq!(seeds, vec![0, 1]);
    }

    #[test]
    fn fanout_hash_fuses_keys_and_k() {
        let child = PartitionRead::new(0, vec![PartitionHandle::new()]);
        let mut gen = FanoutHash::new(Box::new(child), 8, vec![2]);
        match gen.poll().unwrap() {
            PlanItem::Open(builder) => match &builder.instructions[0] {
                Instruction::FanoutHash { k, keys } => {
                    assert_eq!(*k, 8);
                    assert_eq!(keys, &vec![2]);
                }
                other => panic!("expected FanoutHash, got {:?}", other),
            },
            other => panic!("expected Open, got {:?}", other),
        }
    }

    #[test]
    fn fanout_broadcast_fuses_k_with_no_keys() {
        let child = PartitionRead::new(0, vec![PartitionHandle::new()]);
        let mut gen = FanoutBroadcast::new(Box::new(child), 3);
        match gen.poll().unwrap() {
            PlanItem::Open(builder) => match &builder.instructions[0] {
                Instruction::FanoutBroadcast { k } => assert_eq!(*k, 3),
                other => panic!("expected FanoutBroadcast, got {:?}", other),
            },
            other => panic!("expected Open, got {:?}", other),
        }
    }
}
