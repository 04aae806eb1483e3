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

//! swarmquery: the physical execution layer of a distributed DataFrame
//! query engine. A logical plan is rule-optimized (`optimizer`), lowered
//! into a tree of lazily-pulled physical plan generators (`physical`), and
//! driven to completion by a dynamic `scheduler` against a swappable
//! worker pool (in-process threads, or a fleet of `WorkerService` gRPC
//! workers). Columnar execution, file codecs, and the user-facing
//! DataFrame API are external collaborators, specified here only as the
//! `partition::Partition` and `storage::Storage` trait boundaries.

pub mod config;
pub mod error;
pub mod expr;
pub mod logical;
pub mod optimizer;
pub mod partition;
pub mod physical;
pub mod schema;
pub mod scheduler;
pub mod storage;
pub mod task;
pub mod trace;

#[cfg(any(test, feature = "test-util"))]
pub mod testutil;
