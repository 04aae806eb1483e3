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

use crate::expr::required_columns_of;
use crate::logical::{LogicalNode, LogicalNodeKind};
use crate::optimizer::Rule;

/// Collapses `Projection(Projection(X))` into `Projection(X)` whenever the
/// outer projection doesn't actually need anything the inner projection
/// computed — only plain pass-through of `X`'s own columns.
#[derive(Debug)]
pub struct FoldProjections;

impl Rule for FoldProjections {
    fn name(&self) -> &'static str {
        "FoldProjections"
    }

    fn apply(&self, parent: &LogicalNode, child: &LogicalNode) -> Option<LogicalNode> {
        let outer_exprs = match parent.kind() {
            LogicalNodeKind::Projection { exprs } => exprs.clone(),
            _ => return None,
        };
        if !matches!(child.kind(), LogicalNodeKind::Projection { .. }) {
            return None;
        }

        let grandchild = child.children()[0].clone();
        let required = required_columns_of(&outer_exprs);
        let grandchild_ids = grandchild.output_schema().to_id_set();
        if required.is_subset(&grandchild_ids) {
            Some(LogicalNode::projection(grandchild, outer_exprs))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::schema::{ResolvedField, ResolvedSchema};
    use arrow_schema::DataType;

    #[test]
    fn collapses_double_projection_over_passthrough_columns() {
        let schema = ResolvedSchema::new(vec![ResolvedField::new(0, "x", DataType::Int64, false)]);
        let scan = LogicalNode::scan("t", schema, 1);
        let inner = LogicalNode::projection(scan.clone(), vec![Expr::column(0, "x")]);
        let outer = LogicalNode::projection(inner.clone(), vec![Expr::column(0, "x")]);

        let result = FoldProjections.apply(&outer, &inner).unwrap();
        assert_eq!(result.children(), &[scan]);
    }
}
