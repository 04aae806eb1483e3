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

//! The logical plan: an immutable, persistent tree of relational nodes.
//! Every node exposes `children()`, `output_schema()`, `required_columns()`
//! and `partition_spec()`, plus `copy_with_new_children()` used by the
//! optimizer to rebuild subtrees. Equality is structural modulo node id.

use crate::expr::{required_columns_of, Expr};
use crate::partition::PartitionHandle;
use crate::schema::{ColumnId, ResolvedField, ResolvedSchema};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
}

/// Serialized onto the wire in `Instruction::ReadFile`/`WriteFile` for the
/// distributed worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFormat {
    Parquet,
    Csv,
    Json,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartitionScheme {
    Unknown,
    Hash(Vec<ColumnId>),
    /// Key list plus a per-key descending flag.
    Range(Vec<ColumnId>, Vec<bool>),
    Random,
    Replicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionSpec {
    pub scheme: PartitionScheme,
    pub num_partitions: usize,
}

impl PartitionSpec {
    pub fn unknown(num_partitions: usize) -> Self {
        Self {
            scheme: PartitionScheme::Unknown,
            num_partitions,
        }
    }

    pub fn hash(keys: Vec<ColumnId>, num_partitions: usize) -> Self {
        Self {
            scheme: PartitionScheme::Hash(keys),
            num_partitions,
        }
    }

    pub fn range(keys: Vec<ColumnId>, desc: Vec<bool>, num_partitions: usize) -> Self {
        Self {
            scheme: PartitionScheme::Range(keys, desc),
            num_partitions,
        }
    }

    /// Downgrade to `Unknown` if the spec's keys reference a column that a
    /// projection has dropped: a hash/range spec is only meaningful while
    /// its key columns are still present in the schema.
    fn downgrade_if_keys_dropped(&self, kept: &HashSet<ColumnId>) -> PartitionSpec {
        let keys_survive = match &self.scheme {
            PartitionScheme::Hash(keys) => keys.iter().all(|k| kept.contains(k)),
            PartitionScheme::Range(keys, _) => keys.iter().all(|k| kept.contains(k)),
            PartitionScheme::Unknown | PartitionScheme::Random | PartitionScheme::Replicate => true,
        };
        if keys_survive {
            self.clone()
        } else {
            PartitionSpec::unknown(self.num_partitions)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogicalNodeKind {
    Scan {
        source_id: String,
        /// `None` means "all columns"; pushdown narrows this.
        columns: Option<Vec<ColumnId>>,
        predicate: Vec<Arc<Expr>>,
    },
    InMemoryScan {
        partitions: Vec<PartitionHandle>,
    },
    Filter {
        conjuncts: Vec<Arc<Expr>>,
    },
    Projection {
        exprs: Vec<Arc<Expr>>,
    },
    LocalAggregate {
        aggs: Vec<Arc<Expr>>,
        group_by: Vec<Arc<Expr>>,
    },
    Join {
        left_on: Vec<ColumnId>,
        right_on: Vec<ColumnId>,
        how: JoinType,
    },
    Sort {
        keys: Vec<ColumnId>,
        desc: Vec<bool>,
    },
    LocalLimit {
        n: usize,
    },
    GlobalLimit {
        n: usize,
    },
    Coalesce {
        to: usize,
    },
    Repartition {
        scheme: PartitionScheme,
        to: usize,
    },
    FileWrite {
        format: FileFormat,
        path: String,
        partition_cols: Option<Vec<ColumnId>>,
    },
    TabularFilesScan {
        format: FileFormat,
        paths: Vec<String>,
    },
}

#[derive(Debug)]
struct LogicalNodeData {
    id: u64,
    kind: LogicalNodeKind,
    children: Vec<LogicalNode>,
    output_schema: ResolvedSchema,
    partition_spec: PartitionSpec,
}

/// An `Arc`-backed handle onto one node of the persistent tree: cloning a
/// `LogicalNode` shares the underlying structure, so optimizer rules that
/// rebuild only the spine touched by a rewrite don't copy untouched
/// subtrees.
#[derive(Debug, Clone)]
pub struct LogicalNode(Arc<LogicalNodeData>);

impl PartialEq for LogicalNode {
    /// Structural equality modulo node identity: two nodes are equal if
    /// their kind, children, schema and partition spec all match, even if
    /// they were constructed at different times (different ids).
    fn eq(&self, other: &Self) -> bool {
        self.0.kind == other.0.kind
            && self.0.children == other.0.children
            && self.0.output_schema == other.0.output_schema
            && self.0.partition_spec == other.0.partition_spec
    }
}

impl LogicalNode {
    /// Crate-internal: optimizer rules that need to rebuild a node with a
    /// different kind (e.g. folding a predicate into a `Scan`) go through
    /// this directly rather than one of the semantic constructors below.
    pub(crate) fn new(kind: LogicalNodeKind, children: Vec<LogicalNode>, output_schema: ResolvedSchema, partition_spec: PartitionSpec) -> Self {
        Self(Arc::new(LogicalNodeData {
            id: NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed),
            kind,
            children,
            output_schema,
            partition_spec,
        }))
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn kind(&self) -> &LogicalNodeKind {
        &self.0.kind
    }

    pub fn children(&self) -> &[LogicalNode] {
        &self.0.children
    }

    pub fn output_schema(&self) -> ResolvedSchema {
        self.0.output_schema.clone()
    }

    pub fn partition_spec(&self) -> PartitionSpec {
        self.0.partition_spec.clone()
    }

    /// Column ids this node's own operation reads from its child/children
    /// (as opposed to columns it merely passes through). Pass-through
    /// nodes (`LocalLimit`, `GlobalLimit`, `Coalesce`, `Repartition`) need
    /// nothing beyond what's already in the schema, so they report empty.
    pub fn required_columns(&self) -> HashSet<ColumnId> {
        match &self.0.kind {
            LogicalNodeKind::Scan { predicate, .. } => required_columns_of(predicate),
            LogicalNodeKind::InMemoryScan { .. } | LogicalNodeKind::TabularFilesScan { .. } => HashSet::new(),
            LogicalNodeKind::Filter { conjuncts } => required_columns_of(conjuncts),
            LogicalNodeKind::Projection { exprs } => required_columns_of(exprs),
            LogicalNodeKind::LocalAggregate { aggs, group_by } => {
                let mut ids = required_columns_of(aggs);
                ids.extend(required_columns_of(group_by));
                ids
            }
            LogicalNodeKind::Join { left_on, right_on, .. } => {
                left_on.iter().chain(right_on.iter()).copied().collect()
            }
            LogicalNodeKind::Sort { keys, .. } => keys.iter().copied().collect(),
            LogicalNodeKind::LocalLimit { .. } | LogicalNodeKind::GlobalLimit { .. } | LogicalNodeKind::Coalesce { .. } | LogicalNodeKind::Repartition { .. } => {
                HashSet::new()
            }
            LogicalNodeKind::FileWrite { partition_cols, .. } => {
                partition_cols.clone().unwrap_or_default().into_iter().collect()
            }
        }
    }

    /// Rebuild this node with a new set of children, keeping its own kind,
    /// output schema and partition spec untouched. This is the only way
    /// optimizer rules restructure the tree: they never mutate a node in
    /// place.
    pub fn copy_with_new_children(&self, new_children: Vec<LogicalNode>) -> LogicalNode {
        LogicalNode::new(self.0.kind.clone(), new_children, self.0.output_schema.clone(), self.0.partition_spec.clone())
    }

    // ---- constructors -------------------------------------------------

    pub fn scan(source_id: impl Into<String>, schema: ResolvedSchema, num_partitions: usize) -> LogicalNode {
        LogicalNode::new(
            LogicalNodeKind::Scan {
                source_id: source_id.into(),
                columns: None,
                predicate: Vec::new(),
            },
            Vec::new(),
            schema,
            PartitionSpec::unknown(num_partitions),
        )
    }

    pub fn in_memory_scan(partitions: Vec<PartitionHandle>, schema: ResolvedSchema) -> LogicalNode {
        let n = partitions.len().max(1);
        LogicalNode::new(LogicalNodeKind::InMemoryScan { partitions }, Vec::new(), schema, PartitionSpec::unknown(n))
    }

    pub fn tabular_files_scan(format: FileFormat, paths: Vec<String>, schema: ResolvedSchema) -> LogicalNode {
        let n = paths.len().max(1);
        LogicalNode::new(
            LogicalNodeKind::TabularFilesScan { format, paths },
            Vec::new(),
            schema,
            PartitionSpec::unknown(n),
        )
    }

    pub fn filter(child: LogicalNode, conjuncts: Vec<Arc<Expr>>) -> LogicalNode {
        let schema = child.output_schema();
        let spec = child.partition_spec();
        LogicalNode::new(LogicalNodeKind::Filter { conjuncts }, vec![child], schema, spec)
    }

    pub fn projection(child: LogicalNode, exprs: Vec<Arc<Expr>>) -> LogicalNode {
        let child_schema = child.output_schema();
        let fields: Vec<ResolvedField> = exprs
            .iter()
            .map(|e| resolve_field_for_expr(e, &child_schema))
            .collect();
        let kept: HashSet<ColumnId> = exprs.iter().map(|e| e.id()).collect();
        let spec = child.partition_spec().downgrade_if_keys_dropped(&kept);
        LogicalNode::new(LogicalNodeKind::Projection { exprs }, vec![child], ResolvedSchema::new(fields), spec)
    }

    pub fn local_aggregate(child: LogicalNode, aggs: Vec<Arc<Expr>>, group_by: Vec<Arc<Expr>>) -> LogicalNode {
        let child_schema = child.output_schema();
        let mut fields: Vec<ResolvedField> = group_by.iter().map(|e| resolve_field_for_expr(e, &child_schema)).collect();
        fields.extend(aggs.iter().map(|e| resolve_field_for_expr(e, &child_schema)));
        let num_partitions = child.partition_spec().num_partitions;
        LogicalNode::new(
            LogicalNodeKind::LocalAggregate { aggs, group_by },
            vec![child],
            ResolvedSchema::new(fields),
            PartitionSpec::unknown(num_partitions),
        )
    }

    pub fn join(left: LogicalNode, right: LogicalNode, left_on: Vec<ColumnId>, right_on: Vec<ColumnId>, how: JoinType) -> LogicalNode {
        let mut fields = left.output_schema().fields().to_vec();
        fields.extend(right.output_schema().fields().iter().cloned());
        let num_partitions = left.partition_spec().num_partitions.max(right.partition_spec().num_partitions);
        LogicalNode::new(
            LogicalNodeKind::Join { left_on, right_on, how },
            vec![left, right],
            ResolvedSchema::new(fields),
            PartitionSpec::unknown(num_partitions),
        )
    }

    pub fn sort(child: LogicalNode, keys: Vec<ColumnId>, desc: Vec<bool>) -> LogicalNode {
        let schema = child.output_schema();
        let num_partitions = child.partition_spec().num_partitions;
        LogicalNode::new(
            LogicalNodeKind::Sort {
                keys: keys.clone(),
                desc: desc.clone(),
            },
            vec![child],
            schema,
            PartitionSpec::range(keys, desc, num_partitions),
        )
    }

    pub fn local_limit(child: LogicalNode, n: usize) -> LogicalNode {
        let schema = child.output_schema();
        let spec = child.partition_spec();
        LogicalNode::new(LogicalNodeKind::LocalLimit { n }, vec![child], schema, spec)
    }

    pub fn global_limit(child: LogicalNode, n: usize) -> LogicalNode {
        let schema = child.output_schema();
        // Row membership below the limit is no longer determined by the
        // child's partitioning scheme once rows are truncated globally.
        let num_partitions = child.partition_spec().num_partitions;
        LogicalNode::new(LogicalNodeKind::GlobalLimit { n }, vec![child], schema, PartitionSpec::unknown(num_partitions))
    }

    pub fn coalesce(child: LogicalNode, to: usize) -> LogicalNode {
        let schema = child.output_schema();
        LogicalNode::new(LogicalNodeKind::Coalesce { to }, vec![child], schema, PartitionSpec::unknown(to))
    }

    pub fn repartition(child: LogicalNode, scheme: PartitionScheme, to: usize) -> LogicalNode {
        let schema = child.output_schema();
        LogicalNode::new(
            LogicalNodeKind::Repartition { scheme: scheme.clone(), to },
            vec![child],
            schema,
            PartitionSpec { scheme, num_partitions: to },
        )
    }

    pub fn file_write(child: LogicalNode, format: FileFormat, path: impl Into<String>, partition_cols: Option<Vec<ColumnId>>) -> LogicalNode {
        let schema = child.output_schema();
        let spec = child.partition_spec();
        LogicalNode::new(
            LogicalNodeKind::FileWrite {
                format,
                path: path.into(),
                partition_cols,
            },
            vec![child],
            schema,
            spec,
        )
    }
}

fn resolve_field_for_expr(expr: &Arc<Expr>, child_schema: &ResolvedSchema) -> ResolvedField {
    use crate::expr::Expr as E;
    match expr.as_ref() {
        E::Column { id, name } => child_schema
            .field_by_id(*id)
            .cloned()
            .unwrap_or_else(|| ResolvedField::new(*id, name.clone(), arrow_schema::DataType::Null, true)),
        E::Alias { id, name, expr: inner } => {
            let mut f = resolve_field_for_expr(inner, child_schema);
            f.id = *id;
            f.name = name.clone();
            f
        }
        _ => ResolvedField::new(expr.id(), expr.output_name(), arrow_schema::DataType::Null, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use arrow_schema::DataType;

    fn base_schema() -> ResolvedSchema {
        ResolvedSchema::new(vec![
            ResolvedField::new(0, "x", DataType::Int64, false),
            ResolvedField::new(1, "y", DataType::Int64, false),
        ])
    }

    #[test]
    fn copy_with_new_children_preserves_kind_and_schema() {
        let scan = LogicalNode::scan("t", base_schema(), 2);
        let filtered = LogicalNode::filter(scan.clone(), vec![Expr::column(0, "x")]);
        let rebuilt = filtered.copy_with_new_children(vec![scan.clone()]);
        assert_eq!(rebuilt.output_schema(), filtered.output_schema());
        assert_eq!(rebuilt.partition_spec(), filtered.partition_spec());
        assert_eq!(rebuilt.children(), &[scan]);
    }

    #[test]
    fn projection_downgrades_hash_spec_when_key_dropped() {
        let scan = LogicalNode::scan("t", base_schema(), 4);
        let repart = LogicalNode::repartition(scan, PartitionScheme::Hash(vec![0]), 4);
        let proj = LogicalNode::projection(repart, vec![Expr::column(1, "y")]);
        assert_eq!(proj.partition_spec().scheme, PartitionScheme::Unknown);
    }

    #[test]
    fn required_columns_of_join_is_its_keys() {
        let left = LogicalNode::scan("l", base_schema(), 2);
        let right = LogicalNode::scan("r", base_schema(), 2);
        let joined = LogicalNode::join(left, right, vec![0], vec![0], JoinType::Inner);
        assert_eq!(joined.required_columns(), [0].into_iter().collect());
    }
}
