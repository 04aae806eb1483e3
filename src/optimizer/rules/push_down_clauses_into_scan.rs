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

use crate::expr::Expr;
use crate::logical::{LogicalNode, LogicalNodeKind};
use crate::optimizer::Rule;
use crate::schema::ColumnId;

/// Folds a required column list and a residual predicate directly into a
/// `Scan`, so the generated scan reads only the needed columns with an
/// embedded filter. A `Projection` that turns out to be the identity over
/// the (possibly narrowed) scan schema is elided entirely.
#[derive(Debug)]
pub struct PushDownClausesIntoScan;

impl Rule for PushDownClausesIntoScan {
    fn name(&self) -> &'static str {
        "PushDownClausesIntoScan"
    }

    fn apply(&self, parent: &LogicalNode, child: &LogicalNode) -> Option<LogicalNode> {
        match (parent.kind(), child.kind()) {
            (LogicalNodeKind::Filter { conjuncts }, LogicalNodeKind::Scan { source_id, columns, predicate }) => {
                let mut merged = predicate.clone();
                merged.extend(conjuncts.clone());
                Some(LogicalNode::new(
                    LogicalNodeKind::Scan {
                        source_id: source_id.clone(),
                        columns: columns.clone(),
                        predicate: merged,
                    },
                    Vec::new(),
                    child.output_schema(),
                    child.partition_spec(),
                ))
            }

            (LogicalNodeKind::Projection { exprs }, LogicalNodeKind::Scan { source_id, predicate, .. }) => {
                // Only a pure column-selection projection (no renaming or
                // computed expressions) can be folded into the scan's
                // column list without losing information the scan can't
                // represent.
                if !exprs.iter().all(|e| matches!(e.as_ref(), Expr::Column { .. })) {
                    return None;
                }
                let new_columns: Vec<ColumnId> = exprs.iter().map(|e| e.id()).collect();
                let full_schema = child.output_schema();
                let is_identity = new_columns == full_schema.ids();
                let narrowed_schema = full_schema.project(&new_columns);
                let scan = LogicalNode::new(
                    LogicalNodeKind::Scan {
                        source_id: source_id.clone(),
                        columns: Some(new_columns),
                        predicate: predicate.clone(),
                    },
                    Vec::new(),
                    narrowed_schema,
                    child.partition_spec(),
                );
                if is_identity {
                    Some(scan)
                } else {
                    Some(LogicalNode::projection(scan, exprs.clone()))
                }
            }

            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ResolvedField, ResolvedSchema};
    use arrow_schema::DataType;

    fn schema() -> ResolvedSchema {
        ResolvedSchema::new(vec![
            ResolvedField::new(0, "x", DataType::Int64, false),
            ResolvedField::new(1, "y", DataType::Int64, false),
        ])
    }

    #[test]
    fn folds_filter_into_scan() {
        let scan = LogicalNode::scan("t", schema(), 1);
        let filtered = LogicalNode::filter(scan.clone(), vec![Expr::column(0, "x")]);

        let result = PushDownClausesIntoScan.apply(&filtered, &scan).unwrap();
        match result.kind() {
            LogicalNodeKind::Scan { predicate, .. } => assert_eq!(predicate.len(), 1),
            other => panic!("expected Scan, got {:?}", other),
        }
    }

    #[test]
    fn elides_identity_projection_over_scan() {
        let scan = LogicalNode::scan("t", schema(), 1);
        let proj = LogicalNode::projection(scan.clone(), vec![Expr::column(0, "x"), Expr::column(1, "y")]);

        let result = PushDownClausesIntoScan.apply(&proj, &scan).unwrap();
        assert!(matches!(result.kind(), LogicalNodeKind::Scan { .. }));
    }

    #[test]
    fn keeps_projection_when_narrowing_columns() {
        let scan = LogicalNode::scan("t", schema(), 1);
        let proj = LogicalNode::projection(scan.clone(), vec![Expr::column(0, "x")]);

        let result = PushDownClausesIntoScan.apply(&proj, &scan).unwrap();
        match result.kind() {
            LogicalNodeKind::Projection { .. } => {
                assert!(matches!(result.children()[0].kind(), LogicalNodeKind::Scan { .. }));
            }
            other => panic!("expected Projection, got {:?}", other),
        }
    }
}
