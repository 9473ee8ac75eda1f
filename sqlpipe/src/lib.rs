// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! sqlpipe - An embeddable streaming SQL execution engine
//!
//! sqlpipe executes already-planned SQL statements. A plan is a tree of
//! operators (scan, filter, group, order, project, join, insert, update,
//! delete) that the engine turns into concurrently running tasks connected
//! by bounded channels. Storage is pluggable through the traits in
//! [`storage`]; an in-memory backend ships with the crate.
//!
//! # Features
//!
//! - **Streaming pipelines**: rows flow between tasks as they are produced
//! - **Cooperative cancellation**: one signal stops every task of a statement
//! - **Capability-based storage**: backends advertise scan, upsert, patch and delete
//! - **JSON plans**: plans serialize with serde, so a planner can live elsewhere
//!
//! # Usage
//!
//! ```ignore
//! let db = MemoryDatabase::new();
//! db.create_table("orders", &["user", "price"], None)?;
//! let mut registry = SourceRegistry::new();
//! db.register_all(&mut registry);
//!
//! let plan = PlanNode::from_json(plan_json)?;
//! let result = Executor::build(&plan, &registry, EngineConfig::default())?
//!     .execute()
//!     .await?;
//! ```

pub mod config;
pub mod exec;
pub mod expr;
pub mod functions;
pub mod plan;
pub mod storage;
pub mod types;

pub use config::EngineConfig;
pub use exec::{CancelHandle, ExecutionError, Executor, MutationSummary, QueryResult, Row};
pub use expr::Expr;
pub use plan::PlanNode;
pub use storage::{MemoryDatabase, SourceRegistry};
pub use types::Value;

/// sqlpipe version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// sqlpipe crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
