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

//! Physical plan generators: a lazy pull-based pipeline of `PlanItem`s.
//!
//! There is no native Rust analogue of the source system's two-way
//! generator (`child_plan.send(new_limit)`), so each generator here is an
//! explicit state machine behind the `PhysicalPlan` trait: `poll()` is the
//! "next" half, and the rare send-back (`local_limit`'s per-partition cap
//! tightened by its enclosing `global_limit`) is its own trait method,
//! `tighten`, with a no-op default for generators that don't need it.

pub mod factory;
pub mod generators;

use crate::task::{OpenTaskBuilder, PartitionTaskHandle};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// One step out of a physical plan generator.
#[derive(Debug, Clone)]
pub enum PlanItem {
    /// A partially-built task a downstream generator may still fuse
    /// instructions into, or finalize.
    Open(OpenTaskBuilder),
    /// An already-finalized, dispatchable task.
    Finalized(PartitionTaskHandle),
    /// "I have nothing more to emit until some previously yielded task
    /// completes." The scheduler must await at least one completion
    /// before polling this plan again.
    Suspend,
}

/// A lazy, pull-based physical plan. `poll()` returns `None` once the plan
/// is exhausted (the generator's `StopIteration`/`return`).
pub trait PhysicalPlan: fmt::Debug + Send {
    fn poll(&mut self) -> Option<PlanItem>;

    /// Tighten a downstream `local_limit`'s per-partition cap. Only
    /// `local_limit` itself overrides this; every other generator either
    /// doesn't have one in its subtree or passes it straight through.
    fn tighten(&mut self, _new_limit: usize) {}
}

/// Mints stage ids for tracing. One allocator is shared by an entire
/// physical plan tree built by the factory for a single query.
#[derive(Debug, Default)]
pub struct StageIdAllocator(AtomicU64);

impl StageIdAllocator {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}
