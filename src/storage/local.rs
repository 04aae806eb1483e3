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

//! A `Storage` backed by the local filesystem, useful for tests and single-
//! node deployments. File listing is glob-pattern matching, not a real
//! object-store prefix scan.

use crate::error::{EngineError, EngineResult};
use crate::storage::{EntryKind, Storage, StorageEntry};
use std::fs;
use std::io::{Read, Write};

#[derive(Debug, Default, Clone)]
pub struct LocalFs;

impl LocalFs {
    pub fn new() -> Self {
        Self
    }
}

impl Storage for LocalFs {
    fn list(&self, path_glob: &str) -> EngineResult<Vec<StorageEntry>> {
        let paths = glob::glob(path_glob).map_err(|e| EngineError::UnsupportedInstruction(format!("bad glob pattern {path_glob:?}: {e}")))?;
        let mut entries = Vec::new();
        for entry in paths {
            let path = entry.map_err(|e| EngineError::TaskFatal(format!("reading glob entry: {e}")))?;
            let meta = fs::metadata(&path).map_err(|e| EngineError::TaskFatal(format!("stat {}: {e}", path.display())))?;
            entries.push(StorageEntry {
                path: path.to_string_lossy().into_owned(),
                size: meta.len(),
                kind: if meta.is_dir() { EntryKind::Directory } else { EntryKind::File },
            });
        }
        Ok(entries)
    }

    fn open_read(&self, path: &str) -> EngineResult<Box<dyn Read>> {
        let file = fs::File::open(path).map_err(|e| EngineError::TaskFatal(format!("opening {path} for read: {e}")))?;
        Ok(Box::new(file))
    }

    fn open_write(&self, path: &str) -> EngineResult<Box<dyn Write>> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent).map_err(|e| EngineError::TaskFatal(format!("creating {}: {e}", parent.display())))?;
        }
        let file = fs::File::create(path).map_err(|e| EngineError::TaskFatal(format!("opening {path} for write: {e}")))?;
        Ok(Box::new(file))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn list_matches_a_glob_pattern() {
        let dir = std::env::temp_dir().join(format!("swarmquery-localfs-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("a.parquet"), b"x").unwrap();
        fs::write(dir.join("b.parquet"), b"y").unwrap();
        fs::write(dir.join("c.csv"), b"z").unwrap();

        let storage = LocalFs::new();
        let pattern = dir.join("*.parquet").to_string_lossy().into_owned();
        let mut entries = storage.list(&pattern).unwrap();
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().all(|e| e.kind == EntryKind::File));

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn round_trips_a_write_then_a_read() {
        let dir = std::env::temp_dir().join(format!("swarmquery-localfs-rw-{}", std::process::id()));
        let path = dir.join("out.bin");
        let storage = LocalFs::new();

        let mut sink = storage.open_write(path.to_str().unwrap()).unwrap();
        sink.write_all(b"hello").unwrap();
        drop(sink);

        let mut source = storage.open_read(path.to_str().unwrap()).unwrap();
        let mut contents = String::new();
        source.read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "hello");

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn a_missing_file_fails_with_a_task_fatal_error() {
        let storage = LocalFs::new();
        let result = storage.open_read("/nonexistent/path/does-not-exist");
        assert!(matches!(result, Err(EngineError::TaskFatal(_))));
    }
}
