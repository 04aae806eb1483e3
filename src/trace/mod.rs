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

//! Chrome Trace Event Format sink. Every stage entry/exit, task
//! create/dispatch/complete, wave, and node assignment is recorded here so a
//! finished query can be loaded into `chrome://tracing` or Perfetto.
//!
//! Trace I/O failures use `std::io::Result`, not `EngineError`: a trace file
//! that can't be written is never a reason to fail a query.

use log::debug;
use serde::{Deserialize, Serialize};
use std::io::Write;

/// Process id reserved for scheduler-level events (waves, admission,
/// dispatch phases).
pub const PID_SCHEDULER: u64 = 1;
/// Process id reserved for stage lifecycle events (generator entry/exit).
pub const PID_STAGES: u64 = 2;
/// Node (worker) thread ids start here, one per distinct worker the pool
/// dispatches to.
pub const NODE_ID_BASE: u64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceEvent {
    pub name: String,
    /// One of `M`, `B`, `E`, `b`, `e`, `n`, `s`, `f`, `C`.
    pub ph: &'static str,
    pub pid: u64,
    pub tid: u64,
    /// Microseconds. The caller owns the clock; this sink never reads one
    /// itself so traces stay reproducible in tests.
    pub ts: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<serde_json::Value>,
}

/// Accumulates `TraceEvent`s and writes them out as a Chrome Trace Event
/// Format JSON array on `finish()`.
#[derive(Debug, Default)]
pub struct ChromeTraceWriter {
    events: Vec<TraceEvent>,
}

impl ChromeTraceWriter {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// `M` metadata events naming the two reserved processes. Call once,
    /// before any other event.
    pub fn metadata_names(&mut self, ts: u64) {
        self.push(TraceEvent {
            name: "process_name".to_string(),
            ph: "M",
            pid: PID_SCHEDULER,
            tid: 0,
            ts,
            id: None,
            args: Some(serde_json::json!({ "name": "scheduler" })),
        });
        self.push(TraceEvent {
            name: "process_name".to_string(),
            ph: "M",
            pid: PID_STAGES,
            tid: 0,
            ts,
            id: None,
            args: Some(serde_json::json!({ "name": "stages" })),
        });
    }

    /// `B`: a stage or dispatch-phase duration begins on `(pid, tid)`.
    pub fn duration_begin(&mut self, name: &str, pid: u64, tid: u64, ts: u64) {
        self.push(TraceEvent {
            name: name.to_string(),
            ph: "B",
            pid,
            tid,
            ts,
            id: None,
            args: None,
        });
    }

    /// `E`: matches the most recent `duration_begin` on the same `(pid, tid)`.
    pub fn duration_end(&mut self, pid: u64, tid: u64, ts: u64) {
        self.push(TraceEvent {
            name: String::new(),
            ph: "E",
            pid,
            tid,
            ts,
            id: None,
            args: None,
        });
    }

    /// `b`: a per-task execution begins. `id` must be unique per task and
    /// reused by the matching `async_end`.
    pub fn async_begin(&mut self, name: &str, pid: u64, tid: u64, ts: u64, id: u64) {
        self.push(TraceEvent {
            name: name.to_string(),
            ph: "b",
            pid,
            tid,
            ts,
            id: Some(id),
            args: None,
        });
    }

    /// `e`: matches an `async_begin` with the same `id`.
    pub fn async_end(&mut self, name: &str, pid: u64, tid: u64, ts: u64, id: u64) {
        self.push(TraceEvent {
            name: name.to_string(),
            ph: "e",
            pid,
            tid,
            ts,
            id: Some(id),
            args: None,
        });
    }

    /// `n`: an instant within an already-open async event, e.g. "task
    /// retried".
    pub fn async_instant(&mut self, name: &str, pid: u64, tid: u64, ts: u64, id: u64) {
        self.push(TraceEvent {
            name: name.to_string(),
            ph: "n",
            pid,
            tid,
            ts,
            id: Some(id),
            args: None,
        });
    }

    /// `s`: a flow starts at a stage, linking it to the node a task was
    /// assigned to.
    pub fn flow_start(&mut self, name: &str, pid: u64, tid: u64, ts: u64, id: u64) {
        self.push(TraceEvent {
            name: name.to_string(),
            ph: "s",
            pid,
            tid,
            ts,
            id: Some(id),
            args: None,
        });
    }

    /// `f`: matches a `flow_start` with the same `id`, landing on the node.
    pub fn flow_finish(&mut self, name: &str, pid: u64, tid: u64, ts: u64, id: u64) {
        self.push(TraceEvent {
            name: name.to_string(),
            ph: "f",
            pid,
            tid,
            ts,
            id: Some(id),
            args: None,
        });
    }

    /// `C`: a counter sample, e.g. inflight-task count after a wave.
    pub fn counter(&mut self, name: &str, pid: u64, ts: u64, series: &str, value: i64) {
        self.push(TraceEvent {
            name: name.to_string(),
            ph: "C",
            pid,
            tid: 0,
            ts,
            id: None,
            args: Some(serde_json::json!({ series: value })),
        });
    }

    fn push(&mut self, event: TraceEvent) {
        self.events.push(event);
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    /// Writes the accumulated events as a JSON array to `path`.
    pub fn finish(self, path: &std::path::Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        serde_json::to_writer(&mut writer, &self.events)?;
        writer.flush()?;
        debug!("wrote {} trace events to {}", self.events.len(), path.display());
        Ok(())
    }
}

/// Checks invariant 11: every async `b` has a matching `e` with the same
/// `id`, and every `B` has a matching `E` on the same `(pid, tid)`. Matching
/// is by simple stack discipline per key, mirroring how Chrome's own
/// tracing viewer pairs begin/end events.
pub fn is_well_formed(events: &[TraceEvent]) -> bool {
    let mut async_open: std::collections::HashSet<u64> = std::collections::HashSet::new();
    let mut duration_stack: std::collections::HashMap<(u64, u64), usize> = std::collections::HashMap::new();

    for event in events {
        match event.ph {
            "b" => {
                let Some(id) = event.id else { return false };
                if !async_open.insert(id) {
                    return false;
                }
            }
            "e" => {
                let Some(id) = event.id else { return false };
                if !async_open.remove(&id) {
                    return false;
                }
            }
            "B" => {
                *duration_stack.entry((event.pid, event.tid)).or_insert(0) += 1;
            }
            "E" => {
                let depth = duration_stack.entry((event.pid, event.tid)).or_insert(0);
                if *depth == 0 {
                    return false;
                }
                *depth -= 1;
            }
            _ => {}
        }
    }

    async_open.is_empty() && duration_stack.values().all(|&depth| depth == 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paired_begin_end_events_are_well_formed() {
        let mut writer = ChromeTraceWriter::new();
        writer.duration_begin("stage:scan", PID_STAGES, 0, 0);
        writer.async_begin("task", PID_SCHEDULER, NODE_ID_BASE, 1, 7);
        writer.async_end("task", PID_SCHEDULER, NODE_ID_BASE, 2, 7);
        writer.duration_end(PID_STAGES, 0, 3);
        assert!(is_well_formed(writer.events()));
    }

    #[test]
    fn an_unmatched_async_begin_is_not_well_formed() {
        let mut writer = ChromeTraceWriter::new();
        writer.async_begin("task", PID_SCHEDULER, NODE_ID_BASE, 0, 1);
        assert!(!is_well_formed(writer.events()));
    }

    #[test]
    fn an_unmatched_duration_end_is_not_well_formed() {
        let mut writer = ChromeTraceWriter::new();
        writer.duration_end(PID_STAGES, 0, 0);
        assert!(!is_well_formed(writer.events()));
    }

    #[test]
    fn finish_writes_a_json_array_to_disk() {
        let dir = std::env::temp_dir().join(format!("swarmquery-trace-test-{}", std::process::id()));
        let path = dir.join("trace.json");
        let mut writer = ChromeTraceWriter::new();
        writer.metadata_names(0);
        writer.counter("inflight", PID_SCHEDULER, 0, "tasks", 3);
        writer.finish(&path).unwrap();

        let contents: &'static str = Box::leak(std::fs::read_to_string(&path).unwrap().into_boxed_str());
        let parsed: Vec<TraceEvent> = serde_json::from_str(contents).unwrap();
        assert_eq!(parsed.len(), 2);
        std::fs::remove_dir_all(&dir).ok();
    }
}
