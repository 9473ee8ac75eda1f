// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage backend contracts and the in-memory reference backend
//!
//! This module provides:
//! - Capability traits the engine calls (scan, put, patch, delete)
//! - An explicit table-to-source registry passed to the executor
//! - An in-memory backend used for embedding and tests

pub mod memory;
pub mod registry;
pub mod traits;
pub mod types;

pub use memory::{MemoryDatabase, MemoryTable, TableCapabilities};
pub use registry::SourceRegistry;
pub use traits::{Connection, DataSource, Deletion, PatchWhere, RowIterator, Scanner, Upsert};
pub use types::{RowValues, StorageError, StorageResult, WriteContext};
