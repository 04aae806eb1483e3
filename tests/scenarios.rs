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

//! Crate-level end-to-end scenarios (S1-S6) driving a real `Scheduler`
//! against the in-memory test fixtures: optimize, lower to a physical
//! plan, schedule, and check the rows that actually come back out.

use std::sync::Arc;

use swarmquery::config::EngineConfig;
use swarmquery::logical::{JoinType, LogicalNode, PartitionScheme};
use swarmquery::physical::factory;
use swarmquery::physical::generators::Materialize;
use swarmquery::physical::StageIdAllocator;
use swarmquery::scheduler::partition_cache::PartitionCache;
use swarmquery::scheduler::worker_pool::local::LocalWorkerPool;
use swarmquery::scheduler::Scheduler;
use swarmquery::testutil::{FixedScanSource, MemPartition};

fn collect_i64(cache: &PartitionCache, handle: swarmquery::partition::PartitionHandle, col: swarmquery::schema::ColumnId) -> Vec<i64> {
    let partition = cache.get(&handle).unwrap();
    partition
        .as_any()
        .downcast_ref::<MemPartition>()
        .unwrap()
        .as_i64_column(col)
}

#[tokio::test]
async fn s2_sort_correctness_across_three_partitions() {
    let cache = PartitionCache::new();
    let (p0, id) = MemPartition::from_i64_column("x", vec![3, 1, 4]);
    let (p1, _) = MemPartition::from_i64_column("x", vec![1, 5, 9]);
    let (p2, _) = MemPartition::from_i64_column("x", vec![2, 6, 5]);
    let h0 = swarmquery::partition::PartitionHandle::new();
    let h1 = swarmquery::partition::PartitionHandle::new();
    let h2 = swarmquery::partition::PartitionHandle::new();
    cache.insert(h0, p0);
    cache.insert(h1, p1);
    cache.insert(h2, p2);

    let schema = swarmquery::schema::ResolvedSchema::new(vec![swarmquery::schema::ResolvedField::new(
        id,
        "x",
        arrow_schema::DataType::Int64,
        false,
    )]);
    let scan = LogicalNode::in_memory_scan(vec![h0, h1, h2], schema);
    let sorted = LogicalNode::sort(scan, vec![id], vec![false]);

    let stage_ids = StageIdAllocator::new();
    let sources = FixedScanSource::new();
    let plan = factory::build(&sorted, &stage_ids, &sources);
    let mut scheduler = Scheduler::new(Arc::new(LocalWorkerPool::new(cache.clone())), &EngineConfig::default());
    let outputs = scheduler.run(Materialize::new(plan)).await.unwrap();

    assert_eq!(outputs.len(), 2);
    let mut all_sorted: Vec<i64> = Vec::new();
    for h in &outputs {
        let col = collect_i64(&cache, *h, id);
        assert!(col.windows(2).all(|w| w[0] <= w[1]), "partition {col:?} is not internally sorted");
        all_sorted.extend(col);
    }
    assert_eq!(all_sorted, vec![1, 1, 2, 3, 4, 5, 5, 6, 9]);
    // Partition boundaries are non-decreasing: the whole concatenation is sorted.
    assert!(all_sorted.windows(2).all(|w| w[0] <= w[1]));
}

#[tokio::test]
async fn s3_coalesce_merges_seven_inputs_into_three_by_ceiling_boundaries() {
    let cache = PartitionCache::new();
    let mut handles = Vec::new();
    let mut id = 0;
    for i in 0..7i64 {
        let (p, col_id) = MemPartition::from_i64_column("x", vec![i]);
        id = col_id;
        let h = swarmquery::partition::PartitionHandle::new();
        cache.insert(h, p);
        handles.push(h);
    }

    let schema = swarmquery::schema::ResolvedSchema::new(vec![swarmquery::schema::ResolvedField::new(
        id,
        "x",
        arrow_schema::DataType::Int64,
        false,
    )]);
    let scan = LogicalNode::in_memory_scan(handles, schema);
    let coalesced = LogicalNode::coalesce(scan, 3);

    let stage_ids = StageIdAllocator::new();
    let sources = FixedScanSource::new();
    let plan = factory::build(&coalesced, &stage_ids, &sources);
    let mut scheduler = Scheduler::new(Arc::new(LocalWorkerPool::new(cache.clone())), &EngineConfig::default());
    let outputs = scheduler.run(Materialize::new(plan)).await.unwrap();

    assert_eq!(outputs.len(), 3);
    let groups: Vec<Vec<i64>> = outputs.iter().map(|h| collect_i64(&cache, *h, id)).collect();
    assert_eq!(groups[0], vec![0, 1, 2]);
    assert_eq!(groups[1], vec![3, 4]);
    assert_eq!(groups[2], vec![5, 6]);
}

#[tokio::test]
async fn s5_global_limit_tightens_downstream_partitions_and_reuses_handles() {
    let cache = PartitionCache::new();
    let (p0, id) = MemPartition::from_i64_column("x", vec![1, 2, 3, 4, 5]);
    let (p1, _) = MemPartition::from_i64_column("x", vec![6, 7, 8, 9, 10]);
    let h0 = swarmquery::partition::PartitionHandle::new();
    let h1 = swarmquery::partition::PartitionHandle::new();
    cache.insert(h0, p0);
    cache.insert(h1, p1);

    let schema = swarmquery::schema::ResolvedSchema::new(vec![swarmquery::schema::ResolvedField::new(
        id,
        "x",
        arrow_schema::DataType::Int64,
        false,
    )]);
    let scan = LogicalNode::in_memory_scan(vec![h0, h1], schema);
    let limited = LogicalNode::global_limit(scan, 3);

    let stage_ids = StageIdAllocator::new();
    let sources = FixedScanSource::new();
    let plan = factory::build(&limited, &stage_ids, &sources);
    let mut scheduler = Scheduler::new(Arc::new(LocalWorkerPool::new(cache.clone())), &EngineConfig::default());
    let outputs = scheduler.run(Materialize::new(plan)).await.unwrap();

    assert_eq!(outputs.len(), 2);
    let total: usize = outputs.iter().map(|h| cache.metadata(h).unwrap().num_rows).sum();
    assert_eq!(total, 3);
}

#[tokio::test]
async fn s6_hash_repartition_co_locates_every_key_in_exactly_one_output() {
    let cache = PartitionCache::new();
    let values: Vec<i64> = (0..1000).map(|i| i % 10).collect();
    let (p, id) = MemPartition::from_i64_column("k", values);
    let h = swarmquery::partition::PartitionHandle::new();
    cache.insert(h, p);

    let schema = swarmquery::schema::ResolvedSchema::new(vec![swarmquery::schema::ResolvedField::new(
        id,
        "k",
        arrow_schema::DataType::Int64,
        false,
    )]);
    let scan = LogicalNode::in_memory_scan(vec![h], schema);
    let repartitioned = LogicalNode::repartition(scan, PartitionScheme::Hash(vec![id]), 4);

    let stage_ids = StageIdAllocator::new();
    let sources = FixedScanSource::new();
    let plan = factory::build(&repartitioned, &stage_ids, &sources);
    let mut scheduler = Scheduler::new(Arc::new(LocalWorkerPool::new(cache.clone())), &EngineConfig::default());
    let outputs = scheduler.run(Materialize::new(plan)).await.unwrap();

    assert_eq!(outputs.len(), 4);
    let mut key_to_partition: std::collections::HashMap<i64, usize> = std::collections::HashMap::new();
    let mut total_rows = 0;
    for (i, h) in outputs.iter().enumerate() {
        let col = collect_i64(&cache, *h, id);
        total_rows += col.len();
        for key in col {
            if let Some(&owner) = key_to_partition.get(&key) {
                assert_eq!(owner, i, "key {key} spans partitions {owner} and {i}");
            } else {
                key_to_partition.insert(key, i);
            }
        }
    }
    assert_eq!(total_rows, 1000);
}

#[tokio::test]
async fn join_end_to_end_through_the_scheduler() {
    let cache = PartitionCache::new();
    let (left, lk) = MemPartition::from_i64_column("k", vec![1, 2, 3]);
    let (right, rk) = MemPartition::from_i64_column("k", vec![2, 3, 4]);
    let hl = swarmquery::partition::PartitionHandle::new();
    let hr = swarmquery::partition::PartitionHandle::new();
    cache.insert(hl, left);
    cache.insert(hr, right);

    let lschema = swarmquery::schema::ResolvedSchema::new(vec![swarmquery::schema::ResolvedField::new(
        lk,
        "k",
        arrow_schema::DataType::Int64,
        false,
    )]);
    let rschema = swarmquery::schema::ResolvedSchema::new(vec![swarmquery::schema::ResolvedField::new(
        rk,
        "k",
        arrow_schema::DataType::Int64,
        false,
    )]);
    let left_scan = LogicalNode::in_memory_scan(vec![hl], lschema);
    let right_scan = LogicalNode::in_memory_scan(vec![hr], rschema);
    let joined = LogicalNode::join(left_scan, right_scan, vec![lk], vec![rk], JoinType::Inner);

    let stage_ids = StageIdAllocator::new();
    let sources = FixedScanSource::new();
    let plan = factory::build(&joined, &stage_ids, &sources);
    let mut scheduler = Scheduler::new(Arc::new(LocalWorkerPool::new(cache.clone())), &EngineConfig::default());
    let outputs = scheduler.run(Materialize::new(plan)).await.unwrap();

    assert_eq!(outputs.len(), 1);
    assert_eq!(cache.metadata(&outputs[0]).unwrap().num_rows, 2);
}
