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

//! The engine's error taxonomy. Every variant here maps to exactly one row
//! of the policy table: planning errors are fatal before dispatch, task
//! errors distinguish transient (retryable by the worker pool) from fatal
//! (unwinds the whole query), and `Cancelled` is explicitly not surfaced as
//! a user-visible failure.

use crate::schema::ColumnId;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

#[derive(Debug, thiserror::Error, Clone)]
pub enum EngineError {
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("unresolved column id {0}")]
    UnresolvedColumn(ColumnId),

    #[error("unsupported instruction: {0}")]
    UnsupportedInstruction(String),

    /// A worker-reported error believed to be transient (network blip,
    /// temporary 5xx). The worker pool retries internally; this variant
    /// only escapes the pool after retries are exhausted, at which point
    /// the scheduler treats it the same as `TaskFatal`.
    #[error("transient task error: {0}")]
    TaskTransient(String),

    #[error("task failed: {0}")]
    TaskFatal(String),

    /// Not a failure: a cancelled task's outputs are dropped silently.
    /// Exists as an error variant only so `PartitionTask::result()` has a
    /// uniform `Result` return type; callers must not log this as an error.
    #[error("task cancelled")]
    Cancelled,

    #[error("resource request exceeds admission caps: {0}")]
    ResourceExhausted(String),
}

impl EngineError {
    /// Whether the scheduler should cancel the rest of the query on this
    /// error, per the propagation rule in the error handling design: first
    /// error wins, everything else is unwound.
    pub fn is_query_fatal(&self) -> bool {
        !matches!(self, EngineError::Cancelled)
    }
}
