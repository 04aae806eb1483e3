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

use crate::error::EngineError;
use crate::task::ResourceRequest;

/// Caps concurrent in-flight tasks by aggregate cpu/gpu/memory. Mutated
/// only by the scheduler thread: `try_admit` reserves resources for a task
/// about to be dispatched, `release` gives them back once it completes.
#[derive(Debug)]
pub struct AdmissionController {
    cap_cpu: f64,
    cap_gpu: f64,
    cap_mem: u64,
    used_cpu: f64,
    used_gpu: f64,
    used_mem: u64,
}

impl AdmissionController {
    pub fn new(cap_cpu: f64, cap_gpu: f64, cap_mem: u64) -> Self {
        Self {
            cap_cpu,
            cap_gpu,
            cap_mem,
            used_cpu: 0.0,
            used_gpu: 0.0,
            used_mem: 0,
        }
    }

    /// `Ok(true)`: admitted, resources reserved. `Ok(false)`: caps are busy,
    /// the caller should requeue the task for the next wave. `Err`: the
    /// request alone exceeds the hard caps and can never be admitted.
    pub fn try_admit(&mut self, req: &ResourceRequest) -> Result<bool, EngineError> {
        if req.exceeds_caps(self.cap_cpu, self.cap_gpu, self.cap_mem) {
            return Err(EngineError::ResourceExhausted(format!(
                "task requires {:.1} cpu / {:.1} gpu / {} bytes, which alone exceeds caps of {:.1} / {:.1} / {}",
                req.num_cpus, req.num_gpus, req.memory_bytes, self.cap_cpu, self.cap_gpu, self.cap_mem
            )));
        }
        let fits = self.used_cpu + req.num_cpus <= self.cap_cpu
            && self.used_gpu + req.num_gpus <= self.cap_gpu
            && self.used_mem + req.memory_bytes <= self.cap_mem;
        if fits {
            self.used_cpu += req.num_cpus;
            self.used_gpu += req.num_gpus;
            self.used_mem += req.memory_bytes;
        }
        Ok(fits)
    }

    pub fn release(&mut self, req: &ResourceRequest) {
        self.used_cpu = (self.used_cpu - req.num_cpus).max(0.0);
        self.used_gpu = (self.used_gpu - req.num_gpus).max(0.0);
        self.used_mem = self.used_mem.saturating_sub(req.memory_bytes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_while_under_caps_and_requeues_once_full() {
        let mut admission = AdmissionController::new(2.0, 0.0, 1000);
        let a = ResourceRequest::new(1.0, 0.0, 400);
        let b = ResourceRequest::new(1.0, 0.0, 400);
        let c = ResourceRequest::new(1.0, 0.0, 400);
        assert_eq!(admission.try_admit(&a).unwrap(), true);
        assert_eq!(admission.try_admit(&b).unwrap(), true);
        // cpu is now at cap (2.0); a third 1-cpu task must wait.
        assert_eq!(admission.try_admit(&c).unwrap(), false);
        admission.release(&a);
        assert_eq!(admission.try_admit(&c).unwrap(), true);
    }

    #[test]
    fn a_request_that_alone_exceeds_hard_caps_is_resource_exhausted() {
        let mut admission = AdmissionController::new(2.0, 0.0, 1000);
        let huge = ResourceRequest::new(4.0, 0.0, 100);
        assert!(matches!(admission.try_admit(&huge), Err(EngineError::ResourceExhausted(_))));
    }
}
