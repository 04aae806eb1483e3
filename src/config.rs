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

//! Engine-wide configuration. Every field here is an enumerated
//! configuration knob from the external interfaces section: admission
//! caps, trace output, the file writer's target size, and the optimizer's
//! fixed-point iteration bound.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RunnerKind {
    Local,
    Distributed { worker_addrs: Vec<String> },
}

impl Default for RunnerKind {
    fn default() -> Self {
        RunnerKind::Local
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizerConfig {
    pub fixed_point_max_iters: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            fixed_point_max_iters: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub runner: RunnerKind,
    pub cap_cpu: f64,
    pub cap_gpu: f64,
    pub cap_mem: u64,
    pub trace_enabled: bool,
    pub trace_dir: String,
    pub parquet_target_filesize: u64,
    pub optimizer: OptimizerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get() as f64)
            .unwrap_or(1.0);
        Self {
            runner: RunnerKind::default(),
            // Leave a safety margin below the host's full core count, per
            // the admission model's "minus a safety margin" default rule.
            cap_cpu: (cpus - 1.0).max(1.0),
            cap_gpu: 0.0,
            cap_mem: 4 * 1024 * 1024 * 1024,
            trace_enabled: false,
            trace_dir: "./traces".to_string(),
            parquet_target_filesize: 128 * 1024 * 1024,
            optimizer: OptimizerConfig::default(),
        }
    }
}
