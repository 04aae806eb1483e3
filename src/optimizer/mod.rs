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

//! The rule-based optimizer. A `Rule` inspects a parent node and its
//! single child and either returns a replacement subtree or signals "no
//! change". Rules run in named `RuleBatch`es with a fixed order, each
//! batch either applied once (top-down) or to a fixed point.

pub mod rules;

use crate::config::EngineConfig;
use crate::logical::LogicalNode;
use log::debug;

/// `(ParentKind, ChildKind) -> Option<LogicalNode>`. A rule that cannot
/// fire for this particular parent/child pair returns `None`; it must
/// never panic on an unrecognized combination, since the optimizer tries
/// every rule at every qualifying node.
pub trait Rule: std::fmt::Debug {
    fn name(&self) -> &'static str;
    fn apply(&self, parent: &LogicalNode, child: &LogicalNode) -> Option<LogicalNode>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPolicy {
    Once,
    FixedPoint(usize),
}

pub struct RuleBatch {
    pub name: &'static str,
    pub policy: BatchPolicy,
    pub rules: Vec<Box<dyn Rule>>,
}

impl RuleBatch {
    pub fn new(name: &'static str, policy: BatchPolicy, rules: Vec<Box<dyn Rule>>) -> Self {
        Self { name, policy, rules }
    }

    /// One top-down pass over the tree: at every node with exactly one
    /// child, try each rule of the batch in order against `(node, child)`;
    /// a match replaces the node and the next rule is tried against the
    /// replacement's (possibly new) child, so several rules in the same
    /// batch can fire at one node within a single pass. Then recurse into
    /// children.
    fn apply_once(&self, node: &LogicalNode) -> (LogicalNode, bool) {
        let mut current = node.clone();
        let mut changed = false;

        if current.children().len() == 1 {
            for rule in &self.rules {
                let child = current.children()[0].clone();
                if let Some(replacement) = rule.apply(&current, &child) {
                    debug!("rule {} fired on node {}", rule.name(), current.id());
                    current = replacement;
                    changed = true;
                }
            }
        }

        let children = current.children().to_vec();
        let mut new_children = Vec::with_capacity(children.len());
        let mut child_changed = false;
        for c in &children {
            let (rewritten, did_change) = self.apply_once(c);
            child_changed |= did_change;
            new_children.push(rewritten);
        }
        if child_changed {
            current = current.copy_with_new_children(new_children);
            changed = true;
        }
        (current, changed)
    }

    fn run(&self, plan: LogicalNode) -> LogicalNode {
        match self.policy {
            BatchPolicy::Once => {
                let (next, _) = self.apply_once(&plan);
                next
            }
            BatchPolicy::FixedPoint(max_iters) => {
                let mut current = plan;
                for _ in 0..max_iters {
                    let (next, changed) = self.apply_once(&current);
                    current = next;
                    if !changed {
                        break;
                    }
                }
                current
            }
        }
    }
}

pub struct Optimizer {
    batches: Vec<RuleBatch>,
}

impl Optimizer {
    pub fn new(batches: Vec<RuleBatch>) -> Self {
        Self { batches }
    }

    /// The two required batches, in order: a single top-down pass of
    /// predicate/column pushdowns, then a fixed-point pass that lets limit
    /// pushdown and repartition elision interact (pushing a limit below a
    /// repartition can expose a now-redundant repartition, and so on).
    pub fn standard(config: &EngineConfig) -> Self {
        Self::new(vec![
            RuleBatch::new(
                "SinglePassPushDowns",
                BatchPolicy::Once,
                vec![
                    Box::new(rules::DropRepartition),
                    Box::new(rules::PushDownPredicates),
                    Box::new(rules::PruneColumns),
                    Box::new(rules::FoldProjections),
                    Box::new(rules::PushDownClausesIntoScan),
                ],
            ),
            RuleBatch::new(
                "PushDownLimitsAndRepartitions",
                BatchPolicy::FixedPoint(config.optimizer.fixed_point_max_iters),
                vec![
                    Box::new(rules::PushDownLimit),
                    Box::new(rules::DropRepartition),
                    Box::new(rules::FoldProjections),
                ],
            ),
        ])
    }

    pub fn optimize(&self, plan: LogicalNode) -> LogicalNode {
        let mut current = plan;
        for batch in &self.batches {
            debug!("running optimizer batch {}", batch.name);
            current = batch.run(current);
        }
        current
    }
}
