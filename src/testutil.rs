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

//! Test scaffolding standing in for the columnar data layer: a row-oriented
//! `Partition` that interprets every `Instruction` directly, plus a fixed
//! `ScanSource`. Neither ships any file codec or vectorized execution; they
//! exist only so `tests/` can drive a real `Scheduler` end to end.

use crate::error::EngineResult;
use crate::expr::{AggFunc, BinaryOp, Expr, ScalarValue};
use crate::logical::JoinType;
use crate::physical::factory::ScanSource;
use crate::partition::{Partition, PartitionHandle};
use crate::schema::{next_column_id, ColumnId, ResolvedField, ResolvedSchema};
use crate::task::Instruction;
use arrow_schema::DataType;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A partition stored as plain rows of `ScalarValue`. `size_bytes` is
/// approximated as 8 bytes/cell, which is all a test fixture needs.
#[derive(Debug, Clone)]
pub struct MemPartition {
    schema: ResolvedSchema,
    rows: Vec<Vec<ScalarValue>>,
}

impl MemPartition {
    pub fn new(schema: ResolvedSchema, rows: Vec<Vec<ScalarValue>>) -> Arc<Self> {
        Arc::new(Self { schema, rows })
    }

    pub fn empty(schema: ResolvedSchema) -> Arc<Self> {
        Arc::new(Self { schema, rows: Vec::new() })
    }

    /// Convenience constructor for the common single-`i64`-column fixture
    /// used throughout the scenario tests; returns the partition and the
    /// column id it minted for the column, so callers can build `Expr`s
    /// against it.
    pub fn from_i64_column(name: &str, values: Vec<i64>) -> (Arc<Self>, ColumnId) {
        let id = next_column_id();
        let schema = ResolvedSchema::new(vec![ResolvedField::new(id, name, DataType::Int64, false)]);
        let rows = values.into_iter().map(|v| vec![ScalarValue::Int64(v)]).collect();
        (Arc::new(Self { schema, rows }), id)
    }

    pub fn rows(&self) -> &[Vec<ScalarValue>] {
        &self.rows
    }

    pub fn as_i64_column(&self, id: ColumnId) -> Vec<i64> {
        let idx = self.col_index(id);
        self.rows
            .iter()
            .map(|r| match &r[idx] {
                ScalarValue::Int64(v) => *v,
                other => panic!("column {id} is not Int64: {other:?}"),
            })
            .collect()
    }

    fn col_index(&self, id: ColumnId) -> usize {
        self.schema
            .fields()
            .iter()
            .position(|f| f.id == id)
            .unwrap_or_else(|| panic!("unresolved column {id} in test fixture schema"))
    }

    fn eval(&self, expr: &Expr, row: &[ScalarValue]) -> ScalarValue {
        match expr {
            Expr::Column { id, .. } => row[self.col_index(*id)].clone(),
            Expr::Literal { value, .. } => value.clone(),
            Expr::Alias { expr, .. } => self.eval(expr, row),
            Expr::BinaryExpr { op, left, right, .. } => apply_binary(*op, &self.eval(left, row), &self.eval(right, row)),
            Expr::AggCall { .. } => panic!("AggCall must be evaluated over a group, not a single row"),
        }
    }

    fn key_tuple(&self, keys: &[ColumnId], row: &[ScalarValue]) -> Vec<ScalarValue> {
        keys.iter().map(|id| row[self.col_index(*id)].clone()).collect()
    }

    fn compare_key(desc: &[bool]) -> impl Fn(&[ScalarValue], &[ScalarValue]) -> std::cmp::Ordering + '_ {
        move |x, y| {
            for i in 0..x.len() {
                let ord = compare_scalar(&x[i], &y[i]);
                let ord = if desc.get(i).copied().unwrap_or(false) { ord.reverse() } else { ord };
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        }
    }
}

fn compare_scalar(a: &ScalarValue, b: &ScalarValue) -> std::cmp::Ordering {
    match (a, b) {
        (ScalarValue::Int64(x), ScalarValue::Int64(y)) => x.cmp(y),
        (ScalarValue::Float64(x), ScalarValue::Float64(y)) => x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal),
        (ScalarValue::Utf8(x), ScalarValue::Utf8(y)) => x.cmp(y),
        (ScalarValue::Bool(x), ScalarValue::Bool(y)) => x.cmp(y),
        (ScalarValue::Null, ScalarValue::Null) => std::cmp::Ordering::Equal,
        (ScalarValue::Null, _) => std::cmp::Ordering::Less,
        (_, ScalarValue::Null) => std::cmp::Ordering::Greater,
        _ => std::cmp::Ordering::Equal,
    }
}

fn apply_binary(op: BinaryOp, l: &ScalarValue, r: &ScalarValue) -> ScalarValue {
    use BinaryOp::*;
    match op {
        Eq => ScalarValue::Bool(compare_scalar(l, r) == std::cmp::Ordering::Equal),
        NotEq => ScalarValue::Bool(compare_scalar(l, r) != std::cmp::Ordering::Equal),
        Lt => ScalarValue::Bool(compare_scalar(l, r) == std::cmp::Ordering::Less),
        LtEq => ScalarValue::Bool(compare_scalar(l, r) != std::cmp::Ordering::Greater),
        Gt => ScalarValue::Bool(compare_scalar(l, r) == std::cmp::Ordering::Greater),
        GtEq => ScalarValue::Bool(compare_scalar(l, r) != std::cmp::Ordering::Less),
        And => ScalarValue::Bool(as_bool(l) && as_bool(r)),
        Or => ScalarValue::Bool(as_bool(l) || as_bool(r)),
        Plus | Minus | Multiply | Divide => {
            let (x, y) = (as_f64(l), as_f64(r));
            let v = match op {
                Plus => x + y,
                Minus => x - y,
                Multiply => x * y,
                Divide => x / y,
                _ => unreachable!(),
            };
            ScalarValue::Float64(v)
        }
    }
}

fn as_bool(v: &ScalarValue) -> bool {
    matches!(v, ScalarValue::Bool(true))
}

fn as_f64(v: &ScalarValue) -> f64 {
    match v {
        ScalarValue::Int64(n) => *n as f64,
        ScalarValue::Float64(n) => *n,
        _ => 0.0,
    }
}

fn hash_key(key: &[ScalarValue]) -> u64 {
    let mut hasher = DefaultHasher::new();
    for v in key {
        match v {
            ScalarValue::Int64(n) => n.hash(&mut hasher),
            ScalarValue::Utf8(s) => s.hash(&mut hasher),
            ScalarValue::Bool(b) => b.hash(&mut hasher),
            ScalarValue::Float64(f) => f.to_bits().hash(&mut hasher),
            ScalarValue::Null => 0u8.hash(&mut hasher),
        }
    }
    hasher.finish()
}

impl Partition for MemPartition {
    fn schema(&self) -> ResolvedSchema {
        self.schema.clone()
    }

    fn num_rows(&self) -> usize {
        self.rows.len()
    }

    fn size_bytes(&self) -> u64 {
        (self.rows.len() * self.schema.len() * 8) as u64
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn min_max(&self, column: ColumnId) -> Option<(ScalarValue, ScalarValue)> {
        let idx = self.schema.fields().iter().position(|f| f.id == column)?;
        let mut values = self.rows.iter().map(|r| r[idx].clone());
        let first = values.next()?;
        let (mut min, mut max) = (first.clone(), first);
        for v in values {
            if compare_scalar(&v, &min) == std::cmp::Ordering::Less {
                min = v.clone();
            }
            if compare_scalar(&v, &max) == std::cmp::Ordering::Greater {
                max = v;
            }
        }
        Some((min, max))
    }

    fn execute(&self, instruction: &Instruction, inputs: &[Arc<dyn Partition>]) -> EngineResult<Vec<Arc<dyn Partition>>> {
        let as_mem = |p: &Arc<dyn Partition>| -> Arc<MemPartition> { p.as_any_mem() };

        match instruction {
            Instruction::ReadFile { index, .. } => {
                let row = self.rows.get(*index).cloned().into_iter().collect::<Vec<_>>();
                Ok(vec![MemPartition::new(self.schema.clone(), row)])
            }

            Instruction::WriteFile { .. } => Ok(vec![MemPartition::new(self.schema.clone(), self.rows.clone())]),

            Instruction::LocalLimit(n) => {
                let rows = self.rows.iter().take(*n).cloned().collect();
                Ok(vec![MemPartition::new(self.schema.clone(), rows)])
            }

            Instruction::Filter(conjuncts) => {
                let rows = self
                    .rows
                    .iter()
                    .filter(|row| conjuncts.iter().all(|c| as_bool(&self.eval(c, row))))
                    .cloned()
                    .collect();
                Ok(vec![MemPartition::new(self.schema.clone(), rows)])
            }

            Instruction::Project(exprs) => {
                let fields = exprs
                    .iter()
                    .map(|e| ResolvedField::new(e.id(), e.output_name(), DataType::Int64, true))
                    .collect();
                let schema = ResolvedSchema::new(fields);
                let rows = self.rows.iter().map(|row| exprs.iter().map(|e| self.eval(e, row)).collect()).collect();
                Ok(vec![MemPartition::new(schema, rows)])
            }

            Instruction::Aggregate { aggs, group_by } => {
                let mut groups: Vec<(Vec<ScalarValue>, Vec<&Vec<ScalarValue>>)> = Vec::new();
                for row in &self.rows {
                    let key = group_by.iter().map(|e| self.eval(e, row)).collect::<Vec<_>>();
                    match groups.iter_mut().find(|(k, _)| k == &key) {
                        Some((_, rows)) => rows.push(row),
                        None => groups.push((key, vec![row])),
                    }
                }
                if groups.is_empty() && group_by.is_empty() {
                    groups.push((Vec::new(), Vec::new()));
                }
                let mut fields = Vec::new();
                for e in group_by {
                    fields.push(ResolvedField::new(e.id(), e.output_name(), DataType::Int64, true));
                }
                for e in aggs {
                    fields.push(ResolvedField::new(e.id(), e.output_name(), DataType::Float64, true));
                }
                let mut rows = Vec::new();
                for (key, group_rows) in &groups {
                    let mut out_row = key.clone();
                    for e in aggs {
                        let Expr::AggCall { func, arg, .. } = e.as_ref() else {
                            panic!("Aggregate.aggs must be AggCall expressions")
                        };
                        let values: Vec<f64> = group_rows.iter().map(|r| as_f64(&self.eval(arg, r))).collect();
                        let result = match func {
                            AggFunc::Sum => values.iter().sum(),
                            AggFunc::Count => values.len() as f64,
                            AggFunc::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
                            AggFunc::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                            AggFunc::Mean => values.iter().sum::<f64>() / (values.len().max(1) as f64),
                        };
                        out_row.push(ScalarValue::Float64(result));
                    }
                    rows.push(out_row);
                }
                Ok(vec![MemPartition::new(ResolvedSchema::new(fields), rows)])
            }

            Instruction::Join { left_on, right_on, how } => {
                let right = as_mem(&inputs[0]);
                let mut fields = self.schema.fields().to_vec();
                fields.extend(right.schema.fields().iter().cloned());
                let schema = ResolvedSchema::new(fields);
                let mut rows = Vec::new();
                let mut right_matched = vec![false; right.rows.len()];
                for lrow in &self.rows {
                    let lkey = self.key_tuple(left_on, lrow);
                    let mut matched = false;
                    for (ri, rrow) in right.rows.iter().enumerate() {
                        if right.key_tuple(right_on, rrow) == lkey {
                            matched = true;
                            right_matched[ri] = true;
                            let mut out = lrow.clone();
                            out.extend(rrow.clone());
                            rows.push(out);
                        }
                    }
                    if !matched && matches!(how, JoinType::Left | JoinType::Full) {
                        let mut out = lrow.clone();
                        out.extend(right.schema.fields().iter().map(|_| ScalarValue::Null));
                        rows.push(out);
                    }
                }
                if matches!(how, JoinType::Right | JoinType::Full) {
                    for (ri, rrow) in right.rows.iter().enumerate() {
                        if !right_matched[ri] {
                            let mut out: Vec<ScalarValue> = self.schema.fields().iter().map(|_| ScalarValue::Null).collect();
                            out.extend(rrow.clone());
                            rows.push(out);
                        }
                    }
                }
                Ok(vec![MemPartition::new(schema, rows)])
            }

            Instruction::Sample { .. } => Ok(vec![MemPartition::new(self.schema.clone(), self.rows.clone())]),

            Instruction::ReduceToQuantiles { k, keys, desc } => {
                let mut all_rows = self.rows.clone();
                for p in inputs {
                    all_rows.extend(as_mem(p).rows.clone());
                }
                all_rows.sort_by(|a, b| Self::compare_key(desc)(&self.key_tuple(keys, a), &self.key_tuple(keys, b)));
                let n = all_rows.len();
                let mut boundary_rows = Vec::new();
                if n > 0 {
                    for i in 1..=*k {
                        let idx = (i * n / (k + 1)).min(n - 1);
                        boundary_rows.push(all_rows[idx].clone());
                    }
                }
                Ok(vec![MemPartition::new(self.schema.clone(), boundary_rows)])
            }

            Instruction::FanoutRange { k, keys, desc } => {
                // `self` is the boundaries partition, `inputs[0]` the source.
                let source = as_mem(&inputs[0]);
                let boundaries = &self.rows;
                let mut buckets: Vec<Vec<Vec<ScalarValue>>> = vec![Vec::new(); *k];
                for row in &source.rows {
                    let key = source.key_tuple(keys, row);
                    let mut bucket = boundaries.len();
                    for (i, b) in boundaries.iter().enumerate() {
                        let bkey = self.key_tuple(keys, b);
                        if Self::compare_key(desc)(&key, &bkey) != std::cmp::Ordering::Greater {
                            bucket = i;
                            break;
                        }
                    }
                    buckets[bucket.min(k - 1)].push(row.clone());
                }
                Ok(buckets
                    .into_iter()
                    .map(|rows| MemPartition::new(source.schema.clone(), rows) as Arc<dyn Partition>)
                    .collect())
            }

            Instruction::FanoutHash { k, keys } => {
                let mut buckets: Vec<Vec<Vec<ScalarValue>>> = vec![Vec::new(); *k];
                for row in &self.rows {
                    let key = self.key_tuple(keys, row);
                    let bucket = (hash_key(&key) % (*k as u64)) as usize;
                    buckets[bucket].push(row.clone());
                }
                Ok(buckets
                    .into_iter()
                    .map(|rows| MemPartition::new(self.schema.clone(), rows) as Arc<dyn Partition>)
                    .collect())
            }

            Instruction::FanoutRandom { k, seed } => {
                let mut rng = StdRng::seed_from_u64(*seed);
                let mut buckets: Vec<Vec<Vec<ScalarValue>>> = vec![Vec::new(); *k];
                for row in &self.rows {
                    let bucket = rng.gen_range(0..*k);
                    buckets[bucket].push(row.clone());
                }
                Ok(buckets
                    .into_iter()
                    .map(|rows| MemPartition::new(self.schema.clone(), rows) as Arc<dyn Partition>)
                    .collect())
            }

            Instruction::FanoutBroadcast { k } => Ok((0..*k)
                .map(|_| MemPartition::new(self.schema.clone(), self.rows.clone()) as Arc<dyn Partition>)
                .collect()),

            Instruction::ReduceMerge => {
                let mut rows = self.rows.clone();
                for p in inputs {
                    rows.extend(as_mem(p).rows.clone());
                }
                Ok(vec![MemPartition::new(self.schema.clone(), rows)])
            }

            Instruction::ReduceMergeAndSort { keys, desc } => {
                let mut rows = self.rows.clone();
                for p in inputs {
                    rows.extend(as_mem(p).rows.clone());
                }
                rows.sort_by(|a, b| Self::compare_key(desc)(&self.key_tuple(keys, a), &self.key_tuple(keys, b)));
                Ok(vec![MemPartition::new(self.schema.clone(), rows)])
            }
        }
    }
}

/// Downcasting helper so `execute()` can treat its `&[Arc<dyn Partition>]`
/// peers as `MemPartition`; production data layers wouldn't need this since
/// they'd own a single concrete partition type end to end.
trait AsMemPartition {
    fn as_any_mem(&self) -> Arc<MemPartition>;
}

impl AsMemPartition for Arc<dyn Partition> {
    fn as_any_mem(&self) -> Arc<MemPartition> {
        self.as_any()
            .downcast_ref::<MemPartition>()
            .cloned()
            .map(Arc::new)
            .expect("testutil executes only against MemPartition fixtures")
    }
}

/// A `ScanSource` backed by pre-registered handles, for driving
/// `physical::factory::build` in integration tests without a real catalog.
#[derive(Debug, Default)]
pub struct FixedScanSource {
    scans: HashMap<String, Vec<PartitionHandle>>,
    listing: Option<PartitionHandle>,
}

impl FixedScanSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scan(mut self, source_id: impl Into<String>, handles: Vec<PartitionHandle>) -> Self {
        self.scans.insert(source_id.into(), handles);
        self
    }

    pub fn with_listing(mut self, listing: PartitionHandle) -> Self {
        self.listing = Some(listing);
        self
    }
}

impl ScanSource for FixedScanSource {
    fn resolve_scan(&self, source_id: &str) -> Vec<PartitionHandle> {
        self.scans.get(source_id).cloned().unwrap_or_default()
    }

    fn list_files(&self, _paths: &[String]) -> PartitionHandle {
        self.listing.expect("FixedScanSource has no registered listing handle")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;

    #[test]
    fn filter_keeps_only_matching_rows() {
        let (partition, id) = MemPartition::from_i64_column("x", vec![1, 2, 3, 4]);
        let pred = Expr::binary(BinaryOp::Gt, Expr::column(id, "x"), Expr::literal(ScalarValue::Int64(2)));
        let out = partition.execute(&Instruction::Filter(vec![pred]), &[]).unwrap();
        assert_eq!(out[0].num_rows(), 2);
    }

    #[test]
    fn fanout_hash_co_locates_equal_keys() {
        let (partition, id) = MemPartition::from_i64_column("k", (0..20).map(|i| i % 4).collect());
        let out = partition.execute(&Instruction::FanoutHash { k: 4, keys: vec![id] }, &[]).unwrap();
        assert_eq!(out.len(), 4);
        assert_eq!(out.iter().map(|p| p.num_rows()).sum::<usize>(), 20);
    }

    #[test]
    fn reduce_merge_and_sort_orders_by_key() {
        let (a, id) = MemPartition::from_i64_column("x", vec![3, 1]);
        let (b, _) = MemPartition::from_i64_column("x", vec![2, 4]);
        let out = a
            .execute(&Instruction::ReduceMergeAndSort { keys: vec![id], desc: vec![false] }, &[b as Arc<dyn Partition>])
            .unwrap();
        assert_eq!(out[0].as_any_mem().as_i64_column(id), vec![1, 2, 3, 4]);
    }
}
