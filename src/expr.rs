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

//! A minimal expression tree. The full expression language (and its type
//! checker) is an external collaborator; the core only needs enough of a
//! tree to (a) carry column identity through projections/aggregates and
//! (b) let the optimizer split and relocate conjunctive predicates.

use crate::schema::{next_column_id, ColumnId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int64(i64),
    Float64(f64),
    Utf8(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    And,
    Or,
    Plus,
    Minus,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggFunc {
    Sum,
    Count,
    Min,
    Max,
    Mean,
}

/// An expression node. Every node carries its own column id; for a plain
/// `Column` reference the id *is* the referenced column's id, so pushing a
/// `Column` through a projection/alias never loses track of identity.
///
/// Serializable (with serde's `rc` feature) so `Instruction::Filter`/
/// `Project` can cross the wire to a distributed worker unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Column {
        id: ColumnId,
        name: String,
    },
    Literal {
        id: ColumnId,
        value: ScalarValue,
    },
    Alias {
        id: ColumnId,
        name: String,
        expr: Arc<Expr>,
    },
    BinaryExpr {
        id: ColumnId,
        op: BinaryOp,
        left: Arc<Expr>,
        right: Arc<Expr>,
    },
    AggCall {
        id: ColumnId,
        func: AggFunc,
        arg: Arc<Expr>,
    },
}

impl Expr {
    pub fn column(id: ColumnId, name: impl Into<String>) -> Arc<Expr> {
        Arc::new(Expr::Column { id, name: name.into() })
    }

    pub fn literal(value: ScalarValue) -> Arc<Expr> {
        Arc::new(Expr::Literal {
            id: next_column_id(),
            value,
        })
    }

    pub fn alias(expr: Arc<Expr>, name: impl Into<String>) -> Arc<Expr> {
        Arc::new(Expr::Alias {
            id: next_column_id(),
            name: name.into(),
            expr,
        })
    }

    pub fn binary(op: BinaryOp, left: Arc<Expr>, right: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::BinaryExpr {
            id: next_column_id(),
            op,
            left,
            right,
        })
    }

    pub fn agg(func: AggFunc, arg: Arc<Expr>) -> Arc<Expr> {
        Arc::new(Expr::AggCall {
            id: next_column_id(),
            func,
            arg,
        })
    }

    /// The id this expression is known by to its parent. For `Column` this
    /// is the underlying column's id; for everything else it is the id
    /// minted when the expression was constructed (so e.g. `col("x") + 1`
    /// gets its own fresh id distinct from `x`'s).
    pub fn id(&self) -> ColumnId {
        match self {
            Expr::Column { id, .. }
            | Expr::Literal { id, .. }
            | Expr::Alias { id, .. }
            | Expr::BinaryExpr { id, .. }
            | Expr::AggCall { id, .. } => *id,
        }
    }

    pub fn output_name(&self) -> String {
        match self {
            Expr::Column { name, .. } | Expr::Alias { name, .. } => name.clone(),
            Expr::Literal { .. } => "literal".to_string(),
            Expr::BinaryExpr { .. } => "expr".to_string(),
            Expr::AggCall { func, arg, .. } => format!("{:?}({})", func, arg.output_name()).to_lowercase(),
        }
    }

    /// Column ids this expression reads from its input. Used by the
    /// optimizer to decide whether a predicate/projection can be pushed
    /// below a given node.
    pub fn required_columns(&self) -> HashSet<ColumnId> {
        let mut out = HashSet::new();
        self.collect_required_columns(&mut out);
        out
    }

    fn collect_required_columns(&self, out: &mut HashSet<ColumnId>) {
        match self {
            Expr::Column { id, .. } => {
                out.insert(*id);
            }
            Expr::Literal { .. } => {}
            Expr::Alias { expr, .. } => expr.collect_required_columns(out),
            Expr::BinaryExpr { left, right, .. } => {
                left.collect_required_columns(out);
                right.collect_required_columns(out);
            }
            Expr::AggCall { arg, .. } => arg.collect_required_columns(out),
        }
    }

    /// Is this expression exactly a reference to `id` with no renaming or
    /// computation? Used to detect "identity" projections that can be
    /// elided once folded into a scan.
    pub fn is_identity_column(&self, id: ColumnId) -> bool {
        matches!(self, Expr::Column { id: col_id, .. } if *col_id == id)
    }
}

/// Split a conjunctive predicate list into its top-level AND-conjuncts.
/// Predicates are already stored as a `Vec<Arc<Expr>>` of conjuncts
/// (see `logical::LogicalNodeKind::Filter`), so this just flattens any
/// nested `AND` nodes that arrived as a single expression.
pub fn split_conjunction(expr: &Arc<Expr>) -> Vec<Arc<Expr>> {
    match expr.as_ref() {
        Expr::BinaryExpr {
            op: BinaryOp::And,
            left,
            right,
            ..
        } => {
            let mut out = split_conjunction(left);
            out.extend(split_conjunction(right));
            out
        }
        _ => vec![expr.clone()],
    }
}

pub fn required_columns_of(exprs: &[Arc<Expr>]) -> HashSet<ColumnId> {
    let mut out = HashSet::new();
    for e in exprs {
        out.extend(e.required_columns());
    }
    out
}
