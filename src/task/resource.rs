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

use serde::{Deserialize, Serialize};

/// Resource request for a task. Additive under fusion: fusing two
/// instructions takes the element-wise maximum of cpu/gpu and the sum of
/// memory, matching how two ops squeezed into one task neither run
/// concurrently with each other (peak cpu/gpu is whichever is bigger) nor
/// share buffers for free (memory adds up).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ResourceRequest {
    pub num_cpus: f64,
    pub num_gpus: f64,
    pub memory_bytes: u64,
}

impl ResourceRequest {
    pub fn new(num_cpus: f64, num_gpus: f64, memory_bytes: u64) -> Self {
        Self {
            num_cpus,
            num_gpus,
            memory_bytes,
        }
    }

    pub fn with_memory(memory_bytes: u64) -> Self {
        Self {
            memory_bytes,
            ..Default::default()
        }
    }

    pub fn with_cpus(num_cpus: f64) -> Self {
        Self {
            num_cpus,
            ..Default::default()
        }
    }

    pub fn fuse(&self, other: &ResourceRequest) -> ResourceRequest {
        ResourceRequest {
            num_cpus: self.num_cpus.max(other.num_cpus),
            num_gpus: self.num_gpus.max(other.num_gpus),
            memory_bytes: self.memory_bytes + other.memory_bytes,
        }
    }

    pub fn exceeds_caps(&self, cap_cpu: f64, cap_gpu: f64, cap_mem: u64) -> bool {
        self.num_cpus > cap_cpu || self.num_gpus > cap_gpu || self.memory_bytes > cap_mem
    }
}
