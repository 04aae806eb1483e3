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

use crate::expr::{required_columns_of, Expr};
use crate::logical::{LogicalNode, LogicalNodeKind};
use crate::optimizer::Rule;
use crate::schema::ColumnId;
use std::collections::HashSet;
use std::sync::Arc;

/// Top-down column pruning: computes the column ids a parent actually
/// needs and drops anything the child produces but nobody above it reads,
/// inserting a trimming `Projection` where there's no more specific rule
/// (folding into an existing `Projection`/`LocalAggregate`). Never prunes
/// an aggregate down to zero output columns.
#[derive(Debug)]
pub struct PruneColumns;

impl Rule for PruneColumns {
    fn name(&self) -> &'static str {
        "PruneColumns"
    }

    fn apply(&self, parent: &LogicalNode, child: &LogicalNode) -> Option<LogicalNode> {
        match parent.kind() {
            LogicalNodeKind::Projection { exprs } => self.prune_under_projection(exprs, child),
            LogicalNodeKind::LocalAggregate { aggs, group_by } => self.prune_under_aggregate(aggs, group_by, child),
            _ => None,
        }
    }
}

impl PruneColumns {
    fn prune_under_projection(&self, exprs: &[Arc<Expr>], child: &LogicalNode) -> Option<LogicalNode> {
        let required = required_columns_of(exprs);

        match child.kind() {
            LogicalNodeKind::Projection { exprs: child_exprs } => {
                let child_output = child.output_schema().to_id_set();
                if child_output.is_subset(&required) {
                    return None;
                }
                let kept: Vec<_> = child_exprs.iter().filter(|e| required.contains(&e.id())).cloned().collect();
                if kept.is_empty() {
                    return None;
                }
                let grandchild = child.children()[0].clone();
                Some(LogicalNode::projection(LogicalNode::projection(grandchild, kept), exprs.to_vec()))
            }

            LogicalNodeKind::LocalAggregate { aggs, group_by } => {
                let agg_ids: HashSet<ColumnId> = aggs.iter().map(|e| e.id()).collect();
                if agg_ids.is_subset(&required) {
                    return None;
                }
                let kept_aggs: Vec<_> = aggs.iter().filter(|e| required.contains(&e.id())).cloned().collect();
                if kept_aggs.is_empty() {
                    // Never prune an aggregate to zero output columns.
                    return None;
                }
                let grandchild = child.children()[0].clone();
                Some(LogicalNode::projection(
                    LogicalNode::local_aggregate(grandchild, kept_aggs, group_by.clone()),
                    exprs.to_vec(),
                ))
            }

            _ => self.trim_generic_child(exprs, child, &required),
        }
    }

    /// `Projection` over anything else: if the child produces columns the
    /// projection above doesn't need, insert a narrower `Projection`
    /// beneath it selecting only the required ids.
    fn trim_generic_child(&self, exprs: &[Arc<Expr>], child: &LogicalNode, required: &HashSet<ColumnId>) -> Option<LogicalNode> {
        let child_schema = child.output_schema();
        let child_ids = child_schema.to_id_set();
        if child_ids.is_subset(required) {
            return None;
        }
        let needed: Vec<ColumnId> = child_schema.fields().iter().map(|f| f.id).filter(|id| required.contains(id)).collect();
        if needed.is_empty() {
            return None;
        }
        let trim_exprs: Vec<_> = needed
            .iter()
            .map(|id| Expr::column(*id, child_schema.field_by_id(*id).unwrap().name.clone()))
            .collect();
        Some(LogicalNode::projection(LogicalNode::projection(child.clone(), trim_exprs), exprs.to_vec()))
    }

    fn prune_under_aggregate(&self, aggs: &[Arc<Expr>], group_by: &[Arc<Expr>], child: &LogicalNode) -> Option<LogicalNode> {
        let mut required = required_columns_of(aggs);
        required.extend(required_columns_of(group_by));
        let child_schema = child.output_schema();
        let child_ids = child_schema.to_id_set();
        if child_ids.is_subset(&required) {
            return None;
        }
        let needed: Vec<ColumnId> = child_schema.fields().iter().map(|f| f.id).filter(|id| required.contains(id)).collect();
        if needed.is_empty() {
            return None;
        }
        let trim_exprs: Vec<_> = needed
            .iter()
            .map(|id| Expr::column(*id, child_schema.field_by_id(*id).unwrap().name.clone()))
            .collect();
        Some(LogicalNode::local_aggregate(
            LogicalNode::projection(child.clone(), trim_exprs),
            aggs.to_vec(),
            group_by.to_vec(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::AggFunc;
    use crate::schema::ResolvedField;
    use arrow_schema::DataType;

    fn schema() -> crate::schema::ResolvedSchema {
        crate::schema::ResolvedSchema::new(vec![
            ResolvedField::new(0, "x", DataType::Int64, false),
            ResolvedField::new(1, "y", DataType::Int64, false),
            ResolvedField::new(2, "z", DataType::Int64, false),
        ])
    }

    #[test]
    fn trims_unused_columns_beneath_projection() {
        let scan = LogicalNode::scan("t", schema(), 1);
        let outer = LogicalNode::projection(scan.clone(), vec![Expr::column(0, "x")]);

        let result = PruneColumns.apply(&outer, &scan).unwrap();
        match result.kind() {
            LogicalNodeKind::Projection { .. } => {
                let inner_schema = result.children()[0].output_schema();
                assert_eq!(inner_schema.to_id_set(), [0].into_iter().collect());
            }
            other => panic!("expected Projection, got {:?}", other),
        }
    }

    #[test]
    fn never_prunes_aggregate_to_zero_columns() {
        let scan = LogicalNode::scan("t", schema(), 1);
        let sum_x = Expr::agg(AggFunc::Sum, Expr::column(0, "x"));
        let agg = LogicalNode::local_aggregate(scan, vec![sum_x.clone()], vec![]);
        // Outer projection needs nothing the aggregate produces.
        let outer = LogicalNode::projection(agg.clone(), vec![Expr::literal(crate::expr::ScalarValue::Int64(1))]);

        assert!(PruneColumns.apply(&outer, &agg).is_none());
    }
}
