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

//! Column identity. Every expression and every schema field carries an
//! integer id assigned once, at construction, from a process-wide counter.
//! Optimizer rules compare schemas and predicates by id, never by name, so
//! a column surviving a rename through a projection is still recognized as
//! "the same column" downstream.

use arrow_schema::{DataType, Field as ArrowField};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};

pub type ColumnId = u32;

static NEXT_COLUMN_ID: AtomicU32 = AtomicU32::new(0);

/// Allocate the next column id. Global rather than per-plan: the source
/// system assigns ids process-wide at expression-construction time (see
/// the design notes on column identity), and a global counter is the
/// direct Rust analogue.
pub fn next_column_id() -> ColumnId {
    NEXT_COLUMN_ID.fetch_add(1, Ordering::Relaxed)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedField {
    pub id: ColumnId,
    pub name: String,
    pub data_type: DataType,
    pub nullable: bool,
}

impl ResolvedField {
    pub fn new(id: ColumnId, name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            id,
            name: name.into(),
            data_type,
            nullable,
        }
    }

    pub fn to_arrow(&self) -> ArrowField {
        ArrowField::new(self.name.clone(), self.data_type.clone(), self.nullable)
    }
}

/// A resolved schema: an ordered list of fields, each carrying a stable
/// column id. Two schemas are compared structurally by id set when
/// reasoning about pushdown, and by field order/type when checking
/// compatibility (`SchemaMismatch`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedSchema {
    fields: Vec<ResolvedField>,
}

impl ResolvedSchema {
    pub fn new(fields: Vec<ResolvedField>) -> Self {
        Self { fields }
    }

    pub fn empty() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn fields(&self) -> &[ResolvedField] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_by_id(&self, id: ColumnId) -> Option<&ResolvedField> {
        self.fields.iter().find(|f| f.id == id)
    }

    pub fn to_id_set(&self) -> HashSet<ColumnId> {
        self.fields.iter().map(|f| f.id).collect()
    }

    pub fn ids(&self) -> Vec<ColumnId> {
        self.fields.iter().map(|f| f.id).collect()
    }

    pub fn project(&self, ids: &[ColumnId]) -> ResolvedSchema {
        let mut fields = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(f) = self.field_by_id(*id) {
                fields.push(f.clone());
            }
        }
        ResolvedSchema::new(fields)
    }

    pub fn to_arrow(&self) -> arrow_schema::Schema {
        arrow_schema::Schema::new(self.fields.iter().map(|f| f.to_arrow()).collect::<Vec<_>>())
    }
}
