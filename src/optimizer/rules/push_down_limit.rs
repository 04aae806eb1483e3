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

enum LimitKind {
    Local,
    Global,
}

/// `Limit(Repartition|Coalesce|Projection(X)) -> same(Limit(X))`. Defined
/// only for these three node kinds because each preserves row order
/// within a partition, so taking the limit earlier and carrying fewer rows
/// through the pass-through op is still correct. Deliberately *not*
/// defined for `Filter` (a selective predicate could make "take N rows
/// early" wrong) even though this is conservative.
#[derive(Debug)]
pub struct PushDownLimit;

impl Rule for PushDownLimit {
    fn name(&self) -> &'static str {
        "PushDownLimit"
    }

    fn apply(&self, parent: &LogicalNode, child: &LogicalNode) -> Option<LogicalNode> {
        let (kind, n) = match parent.kind() {
            LogicalNodeKind::LocalLimit { n } => (LimitKind::Local, *n),
            LogicalNodeKind::GlobalLimit { n } => (LimitKind::Global, *n),
            _ => return None,
        };

        let pushable = matches!(
            child.kind(),
            LogicalNodeKind::Repartition { .. } | LogicalNodeKind::Coalesce { .. } | LogicalNodeKind::Projection { .. }
        );
        if !pushable {
            return None;
        }

        let grandchild = child.children()[0].clone();
        let new_limit = match kind {
            LimitKind::Local => LogicalNode::local_limit(grandchild, n),
            LimitKind::Global => LogicalNode::global_limit(grandchild, n),
        };
        Some(child.copy_with_new_children(vec![new_limit]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logical::PartitionScheme;
    use crate::schema::{ResolvedField, ResolvedSchema};
    use arrow_schema::DataType;

    #[test]
    fn pushes_global_limit_below_repartition() {
        let schema = ResolvedSchema::new(vec![ResolvedField::new(0, "x", DataType::Int64, false)]);
        let scan = LogicalNode::scan("t", schema, 1);
        let repart = LogicalNode::repartition(scan.clone(), PartitionScheme::Hash(vec![0]), 4);
        let limited = LogicalNode::global_limit(repart.clone(), 10);

        let result = PushDownLimit.apply(&limited, &repart).unwrap();
        match result.kind() {
            LogicalNodeKind::Repartition { .. } => {
                assert!(matches!(result.children()[0].kind(), LogicalNodeKind::GlobalLimit { n: 10 }));
            }
            other => panic!("expected Repartition, got {:?}", other),
        }
    }

    #[test]
    fn does_not_push_through_filter() {
        let schema = ResolvedSchema::new(vec![ResolvedField::new(0, "x", DataType::Int64, false)]);
        let scan = LogicalNode::scan("t", schema, 1);
        let filtered = LogicalNode::filter(scan, vec![crate::expr::Expr::column(0, "x")]);
        let limited = LogicalNode::global_limit(filtered.clone(), 10);

        assert!(PushDownLimit.apply(&limited, &filtered).is_none());
    }
}
