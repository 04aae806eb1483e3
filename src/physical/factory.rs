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

//! Translates an optimized logical plan into a tree of physical plan
//! generators, one node at a time, bottom-up.

use crate::expr::Expr;
use crate::logical::{LogicalNode, LogicalNodeKind, PartitionScheme};
use crate::physical::generators::{Coalesce, FanoutBroadcast, FanoutHash, FanoutRandom, FileRead, FileWrite, Join, LocalLimit, GlobalLimit, PartitionRead, PipelineInstruction, Reduce, Sort};
use crate::physical::{PhysicalPlan, StageIdAllocator};
use crate::schema::{ColumnId, ResolvedSchema};
use crate::task::{Instruction, ResourceRequest};
use std::fmt;
use std::sync::Arc;

/// Resolves the scan-shaped leaves of a logical plan into concrete
/// partition handles. Implemented by whatever owns the catalog/storage
/// layer; the core only ever sees the handles it hands back.
pub trait ScanSource: fmt::Debug + Send + Sync {
    /// The partitions backing a named table scan.
    fn resolve_scan(&self, source_id: &str) -> Vec<crate::partition::PartitionHandle>;
    /// Lists `paths` eagerly and returns a single partition handle holding
    /// the listing (one row per matched file), ready to feed into a
    /// `file_read` generator.
    fn list_files(&self, paths: &[String]) -> crate::partition::PartitionHandle;
}

fn column_exprs(schema: &ResolvedSchema, ids: &[ColumnId]) -> Vec<Arc<Expr>> {
    ids.iter()
        .map(|id| match schema.field_by_id(*id) {
            Some(field) => Expr::column(*id, field.name.clone()),
            None => Expr::column(*id, format!("col_{id}")),
        })
        .collect()
}

pub fn build(node: &LogicalNode, stage_ids: &StageIdAllocator, sources: &dyn ScanSource) -> Box<dyn PhysicalPlan> {
    match node.kind() {
        LogicalNodeKind::Scan { source_id, columns, predicate } => {
            let handles = sources.resolve_scan(source_id);
            let mut plan: Box<dyn PhysicalPlan> = Box::new(PartitionRead::new(stage_ids.next(), handles));
            if !predicate.is_empty() {
                plan = Box::new(PipelineInstruction::new(plan, Instruction::Filter(predicate.clone()), ResourceRequest::default()));
            }
            if let Some(ids) = columns {
                let exprs = column_exprs(&node.output_schema(), ids);
                plan = Box::new(PipelineInstruction::new(plan, Instruction::Project(exprs), ResourceRequest::default()));
            }
            plan
        }

        LogicalNodeKind::InMemoryScan { partitions } => Box::new(PartitionRead::new(stage_ids.next(), partitions.clone())),

        LogicalNodeKind::TabularFilesScan { format, paths } => {
            let listing = sources.list_files(paths);
            let child: Box<dyn PhysicalPlan> = Box::new(PartitionRead::new(stage_ids.next(), vec![listing]));
            Box::new(FileRead::new(child, stage_ids.next(), *format))
        }

        LogicalNodeKind::Filter { conjuncts } => {
            let child = build(&node.children()[0], stage_ids, sources);
            Box::new(PipelineInstruction::new(child, Instruction::Filter(conjuncts.clone()), ResourceRequest::default()))
        }

        LogicalNodeKind::Projection { exprs } => {
            let child = build(&node.children()[0], stage_ids, sources);
            Box::new(PipelineInstruction::new(child, Instruction::Project(exprs.clone()), ResourceRequest::default()))
        }

        LogicalNodeKind::LocalAggregate { aggs, group_by } => {
            let child = build(&node.children()[0], stage_ids, sources);
            Box::new(PipelineInstruction::new(
                child,
                Instruction::Aggregate {
                    aggs: aggs.clone(),
                    group_by: group_by.clone(),
                },
                ResourceRequest::default(),
            ))
        }

        LogicalNodeKind::Join { left_on, right_on, how } => {
            let left = build(&node.children()[0], stage_ids, sources);
            let right = build(&node.children()[1], stage_ids, sources);
            Box::new(Join::new(left, right, stage_ids.next(), left_on.clone(), right_on.clone(), *how))
        }

        LogicalNodeKind::Sort { keys, desc } => {
            let child_node = &node.children()[0];
            let num_partitions = child_node.partition_spec().num_partitions;
            let child = build(child_node, stage_ids, sources);
            Box::new(Sort::new(child, stage_ids.next(), keys.clone(), desc.clone(), num_partitions))
        }

        LogicalNodeKind::LocalLimit { n } => {
            let child = build(&node.children()[0], stage_ids, sources);
            Box::new(LocalLimit::new(child, *n))
        }

        LogicalNodeKind::GlobalLimit { n } => {
            let child_node = &node.children()[0];
            let num_outputs = child_node.partition_spec().num_partitions;
            let child = build(child_node, stage_ids, sources);
            Box::new(GlobalLimit::new(child, stage_ids.next(), *n, num_outputs))
        }

        LogicalNodeKind::Coalesce { to } => {
            let child_node = &node.children()[0];
            let from = child_node.partition_spec().num_partitions;
            let child = build(child_node, stage_ids, sources);
            Box::new(Coalesce::new(child, stage_ids.next(), from, *to))
        }

        LogicalNodeKind::Repartition { scheme, to } => {
            let child = build(&node.children()[0], stage_ids, sources);
            match scheme {
                PartitionScheme::Hash(keys) => Box::new(Reduce::new(
                    Box::new(FanoutHash::new(child, *to, keys.clone())),
                    stage_ids.next(),
                    *to,
                    Instruction::ReduceMerge,
                )),
                PartitionScheme::Range(keys, desc) => Box::new(Sort::new_range_repartition(child, stage_ids.next(), keys.clone(), desc.clone(), *to)),
                // `Replicate` duplicates every upstream row into all `to`
                // outputs: `FanoutBroadcast` fans each task out whole, and
                // the downstream `Reduce`/`ReduceMerge` unions every
                // upstream task into each of the `to` outputs, so every
                // output ends up holding the full dataset.
                PartitionScheme::Replicate => Box::new(Reduce::new(
                    Box::new(FanoutBroadcast::new(child, *to)),
                    stage_ids.next(),
                    *to,
                    Instruction::ReduceMerge,
                )),
                // `Unknown` carries no partitioning guarantee to preserve,
                // so a random scatter is the cheapest correct shuffle into
                // `to` outputs.
                PartitionScheme::Random | PartitionScheme::Unknown => Box::new(Reduce::new(
                    Box::new(FanoutRandom::new(child, *to)),
                    stage_ids.next(),
                    *to,
                    Instruction::ReduceMerge,
                )),
            }
        }

        LogicalNodeKind::FileWrite { format, path, .. } => {
            let child = build(&node.children()[0], stage_ids, sources);
            Box::new(FileWrite::new(child, *format, path.clone()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logical::FileFormat;
    use crate::partition::PartitionHandle;
    use crate::physical::PlanItem;
    use crate::schema::{ResolvedField, ResolvedSchema};
    use arrow_schema::DataType;

    #[derive(Debug)]
    struct FixedSource {
        handles: Vec<PartitionHandle>,
    }

    impl ScanSource for FixedSource {
        fn resolve_scan(&self, _source_id: &str) -> Vec<PartitionHandle> {
            self.handles.clone()
        }
        fn list_files(&self, _paths: &[String]) -> PartitionHandle {
            self.handles[0]
        }
    }

    fn schema() -> ResolvedSchema {
        ResolvedSchema::new(vec![ResolvedField::new(0, "x", DataType::Int64, false)])
    }

    #[test]
    fn builds_a_partition_read_for_in_memory_scan() {
        let handle = PartitionHandle::new();
        let node = LogicalNode::in_memory_scan(vec![handle], schema());
        let stage_ids = StageIdAllocator::new();
        let source = FixedSource { handles: vec![handle] };
        let mut plan = build(&node, &stage_ids, &source);
        assert!(matches!(plan.poll(), Some(PlanItem::Open(_))));
        assert!(plan.poll().is_none());
    }

    #[test]
    fn builds_a_file_read_chain_for_tabular_files_scan() {
        let listing = PartitionHandle::new();
        let node = LogicalNode::tabular_files_scan(FileFormat::Parquet, vec!["s3://bucket/*.parquet".to_string()], schema());
        let stage_ids = StageIdAllocator::new();
        let source = FixedSource { handles: vec![listing] };
        let mut plan = build(&node, &stage_ids, &source);
        assert!(matches!(plan.poll(), Some(PlanItem::Finalized(_))));
    }
}
