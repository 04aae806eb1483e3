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

//! The partition interface: the boundary between the core (which only
//! ever holds opaque handles) and the columnar data layer (which is an
//! external collaborator, out of scope for this crate).

use crate::error::EngineResult;
use crate::schema::{ColumnId, ResolvedSchema};
use crate::task::Instruction;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(0);

/// An opaque, stable identifier for a partition held in the scheduler's
/// partition cache. The core never dereferences a handle itself; it only
/// passes handles to the partition interface and the worker pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionHandle(u64);

impl PartitionHandle {
    pub fn new() -> Self {
        Self(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for PartitionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PartitionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

/// Lightweight statistics the scheduler and optimizer can reason about
/// without touching partition contents.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionMetadata {
    pub num_rows: usize,
    pub size_bytes: u64,
    /// Reserved for a future statistics-pushdown rule. Populated by
    /// `Partition` implementations that track nulls cheaply, but nothing
    /// in this crate reads it yet: a partition only has metadata once a
    /// task has materialized it, which is too late to prune the `Scan`
    /// that produced it.
    pub null_counts: Option<Vec<(ColumnId, usize)>>,
    /// Reserved; see `null_counts`.
    pub min_max: Option<Vec<(ColumnId, crate::expr::ScalarValue, crate::expr::ScalarValue)>>,
}

impl PartitionMetadata {
    pub fn new(num_rows: usize, size_bytes: u64) -> Self {
        Self {
            num_rows,
            size_bytes,
            null_counts: None,
            min_max: None,
        }
    }
}

/// Implemented by the data layer. `execute` is the only place instruction
/// semantics are interpreted; the core treats instructions as opaque
/// descriptors it fuses, fans out, and schedules, never runs.
pub trait Partition: fmt::Debug + Send + Sync {
    fn schema(&self) -> ResolvedSchema;
    fn num_rows(&self) -> usize;
    fn size_bytes(&self) -> u64;
    fn execute(
        &self,
        instruction: &Instruction,
        inputs: &[Arc<dyn Partition>],
    ) -> EngineResult<Vec<Arc<dyn Partition>>>;
    /// Reserved for a future statistics-pushdown rule; no caller in this
    /// crate invokes it yet (see `PartitionMetadata::min_max`).
    fn min_max(&self, column: ColumnId) -> Option<(crate::expr::ScalarValue, crate::expr::ScalarValue)>;
    /// Lets an implementation recover its concrete type from the trait
    /// object `execute` receives its sibling inputs as.
    fn as_any(&self) -> &dyn std::any::Any;
}
