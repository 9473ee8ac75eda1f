// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Query execution engine
//!
//! This module turns statement plans into trees of concurrently running
//! tasks connected by bounded channels, and collects their output.

pub mod channel;
pub mod composite;
pub mod context;
pub mod error;
pub mod executor;
pub mod filter;
pub mod group_by;
pub mod join;
pub mod message;
pub mod mutation;
pub mod order;
pub mod projection;
pub mod result;
pub mod source;
pub mod task;

// Re-export the main types for convenience
pub use channel::{message_channel, MessageReceiver, MessageSender, Signal};
pub use composite::{Parallel, Sequential};
pub use context::ExecutionContext;
pub use error::ExecutionError;
pub use executor::{CancelHandle, Executor};
pub use message::{ColumnIndex, Message, RowMessage, ValuesMessage};
pub use result::{MutationSummary, QueryResult, Row};
pub use task::{Task, TaskBase, TaskResult};
