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

mod drop_repartition;
mod fold_projections;
mod prune_columns;
mod push_down_clauses_into_scan;
mod push_down_limit;
mod push_down_predicates;

pub use drop_repartition::DropRepartition;
pub use fold_projections::FoldProjections;
pub use prune_columns::PruneColumns;
pub use push_down_clauses_into_scan::PushDownClausesIntoScan;
pub use push_down_limit::PushDownLimit;
pub use push_down_predicates::PushDownPredicates;
