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

//! The storage interface: the boundary between the core and whatever object
//! store or filesystem actually holds query input/output files. Credentials
//! are opaque to the core; a `Storage` impl owns however it authenticates.

pub mod local;

use crate::error::EngineResult;
use std::io::{Read, Write};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageEntry {
    pub path: String,
    pub size: u64,
    pub kind: EntryKind,
}

/// Narrower than a byte-range-seekable stream: `open_read` returns
/// `Box<dyn Read>` rather than an async stream with a `range` parameter.
/// Every caller in this crate reads a whole file's instruction input in one
/// pass (file readers fuse at partition granularity, never sub-file
/// ranges), so the extra range parameter the core's external-interface
/// description allows for has no caller to exercise. A remote-object-store
/// backend can still implement ranged fetches internally; it just doesn't
/// need to expose that as part of this trait.
pub trait Storage: std::fmt::Debug + Send + Sync {
    fn list(&self, path_glob: &str) -> EngineResult<Vec<StorageEntry>>;
    fn open_read(&self, path: &str) -> EngineResult<Box<dyn Read>>;
    fn open_write(&self, path: &str) -> EngineResult<Box<dyn Write>>;
}
