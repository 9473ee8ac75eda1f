// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Table name to data source registry

use super::traits::{Connection, DataSource};
use super::types::{StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::Arc;

/// Registry of data sources, built once and handed to the executor
#[derive(Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<String, Arc<dyn DataSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `table` to `source`, replacing any previous route
    pub fn register(&mut self, table: impl Into<String>, source: Arc<dyn DataSource>) {
        let table = table.into();
        log::debug!("registering data source for table '{}'", table);
        self.sources.insert(table, source);
    }

    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sources.keys().cloned().collect();
        names.sort();
        names
    }

    /// Open a connection to `table` through its registered source
    pub fn open(&self, table: &str) -> StorageResult<Box<dyn Connection>> {
        let source = self
            .sources
            .get(table)
            .ok_or_else(|| StorageError::TableNotFound(table.to_string()))?;
        source.open(table)
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("tables", &self.table_names())
            .finish()
    }
}
