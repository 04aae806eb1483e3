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

use crate::logical::{LogicalNode, LogicalNodeKind};
use crate::optimizer::Rule;

/// Pushes each conjunct of a `Filter`'s predicate as far down the tree as
/// its required columns allow: merges into a child `Filter`, pushes into a
/// `Projection`'s input, passes unchanged through `Sort`/`Repartition`/
/// `Coalesce` (which never change the schema), or splits across a `Join`'s
/// two sides.
#[derive(Debug)]
pub struct PushDownPredicates;

impl Rule for PushDownPredicates {
    fn name(&self) -> &'static str {
        "PushDownPredicates"
    }

    fn apply(&self, parent: &LogicalNode, child: &LogicalNode) -> Option<LogicalNode> {
        let conjuncts = match parent.kind() {
            LogicalNodeKind::Filter { conjuncts } => conjuncts.clone(),
            _ => return None,
        };

        match child.kind() {
            LogicalNodeKind::Filter { conjuncts: child_conjuncts } => {
                let grandchild = child.children()[0].clone();
                let mut merged = child_conjuncts.clone();
                merged.extend(conjuncts);
                Some(LogicalNode::filter(grandchild, merged))
            }

            LogicalNodeKind::Projection { exprs } => {
                let grandchild = child.children()[0].clone();
                let grandchild_ids = grandchild.output_schema().to_id_set();
                let (can_push, cannot): (Vec<_>, Vec<_>) = conjuncts
                    .into_iter()
                    .partition(|c| c.required_columns().is_subset(&grandchild_ids));
                if can_push.is_empty() {
                    return None;
                }
                let pushed = LogicalNode::projection(LogicalNode::filter(grandchild, can_push), exprs.clone());
                if cannot.is_empty() {
                    Some(pushed)
                } else {
                    Some(LogicalNode::filter(pushed, cannot))
                }
            }

            LogicalNodeKind::Sort { .. } | LogicalNodeKind::Repartition { .. } | LogicalNodeKind::Coalesce { .. } => {
                // These nodes never change the schema, so every conjunct
                // that was valid above them is valid below them too.
                let grandchild = child.children()[0].clone();
                Some(child.copy_with_new_children(vec![LogicalNode::filter(grandchild, conjuncts)]))
            }

            LogicalNodeKind::Join { left_on, right_on, how } => {
                let left = child.children()[0].clone();
                let right = child.children()[1].clone();
                let left_ids = left.output_schema().to_id_set();
                let right_ids = right.output_schema().to_id_set();

                let mut left_push = Vec::new();
                let mut right_push = Vec::new();
                let mut cannot = Vec::new();
                for c in conjuncts {
                    let req = c.required_columns();
                    if req.is_subset(&left_ids) {
                        left_push.push(c);
                    } else if req.is_subset(&right_ids) {
                        right_push.push(c);
                    } else {
                        cannot.push(c);
                    }
                }
                if left_push.is_empty() && right_push.is_empty() {
                    return None;
                }

                let new_left = if left_push.is_empty() { left } else { LogicalNode::filter(left, left_push) };
                let new_right = if right_push.is_empty() { right } else { LogicalNode::filter(right, right_push) };
                let new_join = LogicalNode::join(new_left, new_right, left_on.clone(), right_on.clone(), *how);
                if cannot.is_empty() {
                    Some(new_join)
                } else {
                    Some(LogicalNode::filter(new_join, cannot))
                }
            }

            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{BinaryOp, Expr, ScalarValue};
    use crate::logical::JoinType;
    use crate::schema::{ResolvedField, ResolvedSchema};
    use arrow_schema::DataType;

    fn schema() -> ResolvedSchema {
        ResolvedSchema::new(vec![
            ResolvedField::new(0, "x", DataType::Int64, false),
            ResolvedField::new(1, "k", DataType::Int64, false),
        ])
    }

    #[test]
    fn splits_predicate_across_join_sides() {
        let left = LogicalNode::scan("a", schema(), 1);
        let right = LogicalNode::scan("b", schema(), 1);
        let joined = LogicalNode::join(left, right, vec![1], vec![1], JoinType::Inner);
        let pred = Expr::binary(BinaryOp::Gt, Expr::column(0, "x"), Expr::literal(ScalarValue::Int64(5)));
        let filtered = LogicalNode::filter(joined.clone(), vec![pred]);

        let result = PushDownPredicates.apply(&filtered, &joined).unwrap();
        match result.kind() {
            LogicalNodeKind::Join { .. } => {
                assert!(matches!(result.children()[0].kind(), LogicalNodeKind::Filter { .. }));
                assert!(matches!(result.children()[1].kind(), LogicalNodeKind::Scan { .. }));
            }
            other => panic!("expected Join, got {:?}", other),
        }
    }

    #[test]
    fn merges_adjacent_filters() {
        let scan = LogicalNode::scan("t", schema(), 1);
        let inner = LogicalNode::filter(scan.clone(), vec![Expr::column(0, "x")]);
        let outer = LogicalNode::filter(inner.clone(), vec![Expr::column(1, "k")]);

        let result = PushDownPredicates.apply(&outer, &inner).unwrap();
        match result.kind() {
            LogicalNodeKind::Filter { conjuncts } => assert_eq!(conjuncts.len(), 2),
            other => panic!("expected Filter, got {:?}", other),
        }
    }
}
