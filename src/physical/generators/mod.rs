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

mod coalesce;
mod fanout;
mod file_read;
mod file_write;
mod global_limit;
mod join;
mod local_limit;
mod materialize;
mod partition_read;
mod pipeline_instruction;
mod reduce;
mod sort;

pub use coalesce::Coalesce;
pub use fanout::{FanoutBroadcast, FanoutHash, FanoutRandom};
pub use file_read::FileRead;
pub use file_write::FileWrite;
pub use global_limit::GlobalLimit;
pub use join::Join;
pub use local_limit::LocalLimit;
pub use materialize::Materialize;
pub use partition_read::PartitionRead;
pub use pipeline_instruction::PipelineInstruction;
pub use reduce::Reduce;
pub use sort::Sort;
