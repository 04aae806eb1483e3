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

use crate::physical::generators::Reduce;
use crate::physical::{PhysicalPlan, PlanItem};
use crate::schema::ColumnId;
use crate::task::{Instruction, OpenTaskBuilder, PartitionTaskHandle, ResourceRequest};
use std::collections::VecDeque;

#[derive(Debug)]
enum Phase {
    Materializing,
    Sampling,
    WaitingBoundaries,
    Reducing,
}

/// A distributed sort, in four phases: materialize every source, sample
/// each one, reduce the samples to range boundaries, then fan every
/// source out across those boundaries and merge-sort the matching slices.
#[derive(Debug)]
pub struct Sort {
    child: Box<dyn PhysicalPlan>,
    stage_id: u64,
    keys: Vec<ColumnId>,
    desc: Vec<bool>,
    num_partitions: usize,
    phase: Phase,
    sources: Vec<PartitionTaskHandle>,
    sample_index: usize,
    sample_tasks: Vec<PartitionTaskHandle>,
    boundaries: Option<PartitionTaskHandle>,
    reduce: Option<Reduce>,
    /// `true` for a real `sort` (final reduce is `ReduceMergeAndSort`);
    /// `false` for a standalone range-scheme `Repartition`, which only
    /// needs rows with the same key co-located, not a sorted output
    /// (final reduce is plain `ReduceMerge`).
    sorted_merge: bool,
}

/// Feeds a pre-built queue of `Open` tasks into the `Reduce` generator
/// driving phase 4; every source's fanout is already known once phase 3
/// finishes, so there's nothing left to pull from.
#[derive(Debug)]
struct QueueFeed(VecDeque<OpenTaskBuilder>);

impl PhysicalPlan for QueueFeed {
    fn poll(&mut self) -> Option<PlanItem> {
        self.0.pop_front().map(PlanItem::Open)
    }
}

impl Sort {
    pub fn new(child: Box<dyn PhysicalPlan>, stage_id: u64, keys: Vec<ColumnId>, desc: Vec<bool>, num_partitions: usize) -> Self {
        Self::with_merge_kind(child, stage_id, keys, desc, num_partitions, true)
    }

    /// A standalone range-scheme repartition: co-locates rows sharing a
    /// key into the same output partition without guaranteeing the
    /// output is internally sorted.
    pub fn new_range_repartition(child: Box<dyn PhysicalPlan>, stage_id: u64, keys: Vec<ColumnId>, desc: Vec<bool>, num_partitions: usize) -> Self {
        Self::with_merge_kind(child, stage_id, keys, desc, num_partitions, false)
    }

    fn with_merge_kind(
        child: Box<dyn PhysicalPlan>,
        stage_id: u64,
        keys: Vec<ColumnId>,
        desc: Vec<bool>,
        num_partitions: usize,
        sorted_merge: bool,
    ) -> Self {
        Self {
            child,
            stage_id,
            keys,
            desc,
            num_partitions,
            phase: Phase::Materializing,
            sources: Vec::new(),
            sample_index: 0,
            sample_tasks: Vec::new(),
            boundaries: None,
            reduce: None,
            sorted_merge,
        }
    }

    fn build_boundaries_task(&self) -> PartitionTaskHandle {
        let inputs = self.sample_tasks.iter().map(|t| t.partition()).collect();
        OpenTaskBuilder::new(self.stage_id, inputs)
            .add_instruction(
                Instruction::ReduceToQuantiles {
                    k: self.num_partitions.saturating_sub(1),
                    keys: self.keys.clone(),
                    desc: self.desc.clone(),
                },
                ResourceRequest::default(),
            )
            .finalize_single()
    }

    fn build_fanout_feed(&self) -> QueueFeed {
        let boundaries = self.boundaries.as_ref().expect("boundaries must be done before fanout");
        let mut queue = VecDeque::new();
        for source in &self.sources {
            let builder = OpenTaskBuilder::new(self.stage_id, vec![boundaries.partition(), source.partition()]).add_instruction(
                Instruction::FanoutRange {
                    k: self.num_partitions,
                    keys: self.keys.clone(),
                    desc: self.desc.clone(),
                },
                ResourceRequest::with_memory(source.partition_metadata().size_bytes),
            );
            queue.push_back(builder);
        }
        QueueFeed(queue)
    }
}

impl PhysicalPlan for Sort {
    fn poll(&mut self) -> Option<PlanItem> {
        loop {
            match self.phase {
                Phase::Materializing => match self.child.poll() {
                    Some(PlanItem::Open(builder)) => {
                        let handle = builder.finalize_single();
                        self.sources.push(handle.clone());
                        return Some(PlanItem::Finalized(handle));
                    }
                    Some(other) => return Some(other),
                    None => self.phase = Phase::Sampling,
                },

                Phase::Sampling => {
                    if self.sample_index >= self.sources.len() {
                        let boundaries = self.build_boundaries_task();
                        self.boundaries = Some(boundaries.clone());
                        self.phase = Phase::WaitingBoundaries;
                        return Some(PlanItem::Finalized(boundaries));
                    }
                    let source = &self.sources[self.sample_index];
                    if !source.done() {
                        return Some(PlanItem::Suspend);
                    }
                    let sample = OpenTaskBuilder::new(self.stage_id, vec![source.partition()])
                        .add_instruction(
                            Instruction::Sample {
                                keys: self.keys.clone(),
                                desc: self.desc.clone(),
                            },
                            ResourceRequest::default(),
                        )
                        .finalize_single();
                    self.sample_tasks.push(sample.clone());
                    self.sample_index += 1;
                    return Some(PlanItem::Finalized(sample));
                }

                Phase::WaitingBoundaries => {
                    let boundaries = self.boundaries.as_ref().unwrap();
                    if !boundaries.done() {
                        return Some(PlanItem::Suspend);
                    }
                    let feed = self.build_fanout_feed();
                    let reduce_instruction = if self.sorted_merge {
                        Instruction::ReduceMergeAndSort {
                            keys: self.keys.clone(),
                            desc: self.desc.clone(),
                        }
                    } else {
                        Instruction::ReduceMerge
                    };
                    self.reduce = Some(Reduce::new(Box::new(feed), self.stage_id, self.num_partitions, reduce_instruction));
                    self.phase = Phase::Reducing;
                }

                Phase::Reducing => return self.reduce.as_mut().unwrap().poll(),
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
    fn runs_all_four_phases_to_a_reduce_per_output_partition() {
        let child = PartitionRead::new(0, vec![PartitionHandle::new(), PartitionHandle::new()]);
        let mut gen = Sort::new(Box::new(child), 0, vec![0], vec![false], 2);

        // Phase 1: materialize both sources.
        let mut sources = Vec::new();
        for _ in 0..2 {
            match gen.poll().unwrap() {
                PlanItem::Finalized(h) => sources.push(h),
                other => panic!("expected Finalized source, got {:?}", other),
            }
        }
        for s in &sources {
            s.mark_done(vec![PartitionHandle::new()], vec![PartitionMetadata::new(10, 1000)]);
        }

        // Phase 2: one sample per source.
        let mut samples = Vec::new();
        for _ in 0..2 {
            match gen.poll().unwrap() {
                PlanItem::Finalized(h) => samples.push(h),
                other => panic!("expected Finalized sample, got {:?}", other),
            }
        }
        for s in &samples {
            s.mark_done(vec![PartitionHandle::new()], vec![PartitionMetadata::new(2, 20)]);
        }

        // Phase 3: boundaries reduce task.
        let boundaries = match gen.poll().unwrap() {
            PlanItem::Finalized(h) => h,
            other => panic!("expected Finalized boundaries, got {:?}", other),
        };
        assert!(matches!(gen.poll(), Some(PlanItem::Suspend)));
        boundaries.mark_done(vec![PartitionHandle::new()], vec![PartitionMetadata::new(1, 10)]);

        // Phase 4: fanouts dispatched, then reduced per output index.
        let mut fanouts = Vec::new();
        for _ in 0..2 {
            match gen.poll().unwrap() {
                PlanItem::Finalized(h) => fanouts.push(h),
                other => panic!("expected Finalized fanout, got {:?}", other),
            }
        }
        for f in &fanouts {
            f.mark_done(
                vec![PartitionHandle::new(), PartitionHandle::new()],
                vec![PartitionMetadata::new(5, 50), PartitionMetadata::new(5, 50)],
            );
        }
        for _ in 0..2 {
            match gen.poll().unwrap() {
                PlanItem::Open(builder) => assert!(matches!(builder.instructions[0], Instruction::ReduceMergeAndSort { .. })),
                other => panic!("expected Open reduce, got {:?}", other),
            }
        }
        assert!(gen.poll().is_none());
    }
}
