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
use crate::logical::{FileFormat, JoinType};
use crate::schema::ColumnId;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A pure function from `k` input partitions to `m` output partitions. The
/// core never interprets these; they are opaque descriptors fused into
/// tasks and handed to `Partition::execute` on the worker side. Derives
/// `Serialize`/`Deserialize` so the distributed worker pool can ship an
/// instruction list across the wire as opaque bytes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Instruction {
    ReadFile {
        format: FileFormat,
        index: usize,
    },
    WriteFile {
        partition_id: usize,
        format: FileFormat,
        path: String,
    },
    LocalLimit(usize),
    Filter(Vec<Arc<Expr>>),
    Project(Vec<Arc<Expr>>),
    Aggregate {
        aggs: Vec<Arc<Expr>>,
        group_by: Vec<Arc<Expr>>,
    },
    Join {
        left_on: Vec<ColumnId>,
        right_on: Vec<ColumnId>,
        how: JoinType,
    },
    Sample {
        keys: Vec<ColumnId>,
        desc: Vec<bool>,
    },
    ReduceToQuantiles {
        k: usize,
        keys: Vec<ColumnId>,
        desc: Vec<bool>,
    },
    FanoutRange {
        k: usize,
        keys: Vec<ColumnId>,
        desc: Vec<bool>,
    },
    FanoutHash {
        k: usize,
        keys: Vec<ColumnId>,
    },
    FanoutRandom {
        k: usize,
        seed: u64,
    },
    FanoutBroadcast {
        k: usize,
    },
    ReduceMerge,
    ReduceMergeAndSort {
        keys: Vec<ColumnId>,
        desc: Vec<bool>,
    },
}

impl Instruction {
    /// Number of output partitions this instruction alone produces from a
    /// single input, when known statically. Fanouts are the only multi-
    /// output instructions; everything else is single-output (`Some(1)`)
    /// or data-dependent (`None`, e.g. `ReadFile` which may expand a file
    /// listing partition into many single-file partitions).
    pub fn static_output_arity(&self) -> Option<usize> {
        match self {
            Instruction::FanoutRange { k, .. }
            | Instruction::FanoutHash { k, .. }
            | Instruction::FanoutRandom { k, .. }
            | Instruction::FanoutBroadcast { k, .. } => Some(*k),
            Instruction::ReadFile { .. } => None,
            _ => Some(1),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Instruction::ReadFile { .. } => "ReadFile",
            Instruction::WriteFile { .. } => "WriteFile",
            Instruction::LocalLimit(_) => "LocalLimit",
            Instruction::Filter(_) => "Filter",
            Instruction::Project(_) => "Project",
            Instruction::Aggregate { .. } => "Aggregate",
            Instruction::Join { .. } => "Join",
            Instruction::Sample { .. } => "Sample",
            Instruction::ReduceToQuantiles { .. } => "ReduceToQuantiles",
            Instruction::FanoutRange { .. } => "FanoutRange",
            Instruction::FanoutHash { .. } => "FanoutHash",
            Instruction::FanoutRandom { .. } => "FanoutRandom",
            Instruction::FanoutBroadcast { .. } => "FanoutBroadcast",
            Instruction::ReduceMerge => "ReduceMerge",
            Instruction::ReduceMergeAndSort { .. } => "ReduceMergeAndSort",
        }
    }
}
