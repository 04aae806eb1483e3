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

use crate::logical::{LogicalNode, LogicalNodeKind, PartitionScheme};
use crate::optimizer::Rule;

/// Drops a `Repartition` whose spec already matches its child's spec
/// (`RANGE` excluded, since its boundaries are data-dependent and can't be
/// known equal just by comparing specs), and collapses
/// `Repartition(Repartition(X))` into the outer repartition.
#[derive(Debug)]
pub struct DropRepartition;

impl Rule for DropRepartition {
    fn name(&self) -> &'static str {
        "DropRepartition"
    }

    fn apply(&self, parent: &LogicalNode, child: &LogicalNode) -> Option<LogicalNode> {
        let (scheme, to) = match parent.kind() {
            LogicalNodeKind::Repartition { scheme, to } => (scheme.clone(), *to),
            _ => return None,
        };

        if let LogicalNodeKind::Repartition { .. } = child.kind() {
            let grandchild = child.children()[0].clone();
            return Some(LogicalNode::repartition(grandchild, scheme, to));
        }

        if matches!(scheme, PartitionScheme::Range(..)) {
            return None;
        }

        let child_spec = child.partition_spec();
        if child_spec.scheme == scheme && child_spec.num_partitions == to {
            Some(child.clone())
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ResolvedField, ResolvedSchema};
    use arrow_schema::DataType;

    fn schema() -> ResolvedSchema {
        ResolvedSchema::new(vec![ResolvedField::new(0, "k", DataType::Int64, false)])
    }

    #[test]
    fn drops_repartition_matching_child_spec() {
        let scan = LogicalNode::scan("t", schema(), 4);
        let already = LogicalNode::repartition(scan.clone(), PartitionScheme::Hash(vec![0]), 4);
        let redundant = LogicalNode::repartition(already.clone(), PartitionScheme::Hash(vec![0]), 4);

        let result = DropRepartition.apply(&redundant, &already).unwrap();
        assert_eq!(result, already);
    }

    #[test]
    fn never_drops_range_repartition() {
        let scan = LogicalNode::scan("t", schema(), 4);
        let ranged = LogicalNode::repartition(scan, PartitionScheme::Range(vec![0], vec![false]), 4);
        let redundant = LogicalNode::repartition(ranged.clone(), PartitionScheme::Range(vec![0], vec![false]), 4);
        assert!(DropRepartition.apply(&redundant, &ranged).is_none());
    }

    #[test]
    fn collapses_nested_repartitions() {
        let scan = LogicalNode::scan("t", schema(), 4);
        let inner = LogicalNode::repartition(scan.clone(), PartitionScheme::Hash(vec![0]), 4);
        let outer = LogicalNode::repartition(inner.clone(), PartitionScheme::Random, 8);

        let result = DropRepartition.apply(&outer, &inner).unwrap();
        match result.kind() {
            LogicalNodeKind::Repartition { scheme, to } => {
                assert_eq!(*scheme, PartitionScheme::Random);
                assert_eq!(*to, 8);
            }
            other => panic!("expected Repartition, got {:?}", other),
        }
        assert_eq!(result.children(), &[scan]);
    }
}
