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

use crate::partition::{Partition, PartitionHandle, PartitionMetadata};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

struct Entry {
    partition: Arc<dyn Partition>,
    metadata: PartitionMetadata,
}

/// Maps partition handles to their payload and metadata. Mutated only by
/// the scheduler thread (directly, or through a worker pool it owns);
/// generators never see this, only the opaque handles.
#[derive(Clone)]
pub struct PartitionCache(Arc<Mutex<HashMap<PartitionHandle, Entry>>>);

impl PartitionCache {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(HashMap::new())))
    }

    pub fn insert(&self, handle: PartitionHandle, partition: Arc<dyn Partition>) {
        let metadata = PartitionMetadata::new(partition.num_rows(), partition.size_bytes());
        self.0.lock().unwrap().insert(handle, Entry { partition, metadata });
    }

    pub fn get(&self, handle: &PartitionHandle) -> Option<Arc<dyn Partition>> {
        self.0.lock().unwrap().get(handle).map(|e| e.partition.clone())
    }

    pub fn metadata(&self, handle: &PartitionHandle) -> Option<PartitionMetadata> {
        self.0.lock().unwrap().get(handle).map(|e| e.metadata.clone())
    }

    /// Drops a partition once no in-flight task references it any longer.
    pub fn release(&self, handle: &PartitionHandle) {
        self.0.lock().unwrap().remove(handle);
    }

    pub fn len(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PartitionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PartitionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PartitionCache({} entries)", self.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MemPartition;

    #[test]
    fn insert_then_get_round_trips_the_payload_and_derives_metadata() {
        let cache = PartitionCache::new();
        let (partition, _id) = MemPartition::from_i64_column("x", vec![1, 2, 3]);
        let handle = PartitionHandle::new();
        cache.insert(handle, partition);
        assert_eq!(cache.metadata(&handle).unwrap().num_rows, 3);
        assert!(cache.get(&handle).is_some());
        cache.release(&handle);
        assert!(cache.get(&handle).is_none());
    }
}
