// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Statement-wide execution context shared by every task

use super::channel::Signal;
use super::error::ExecutionError;
use crate::config::EngineConfig;
use crate::expr::Evaluator;
use crate::storage::WriteContext;
use parking_lot::Mutex;
use uuid::Uuid;

#[derive(Debug)]
pub struct ExecutionContext {
    /// Identifies the statement in logs and backend write calls
    pub statement_id: Uuid,
    pub config: EngineConfig,
    pub evaluator: Evaluator,
    signal: Signal,
    /// First fatal error reported by any task
    first_error: Mutex<Option<ExecutionError>>,
}

impl ExecutionContext {
    pub fn new(config: EngineConfig, evaluator: Evaluator) -> Self {
        Self {
            statement_id: Uuid::new_v4(),
            config,
            evaluator,
            signal: Signal::new(),
            first_error: Mutex::new(None),
        }
    }

    pub fn signal(&self) -> &Signal {
        &self.signal
    }

    pub fn is_cancelled(&self) -> bool {
        self.signal.is_closed()
    }

    /// Record a fatal error and stop every task of the statement.
    /// Only the first error is kept.
    pub fn report_error(&self, error: ExecutionError) {
        {
            let mut slot = self.first_error.lock();
            if slot.is_none() {
                log::debug!("statement {} failed: {}", self.statement_id, error);
                *slot = Some(error);
            }
        }
        self.signal.close();
    }

    pub fn first_error(&self) -> Option<ExecutionError> {
        self.first_error.lock().clone()
    }

    pub fn write_context(&self) -> WriteContext {
        WriteContext::new(self.statement_id, self.evaluator.clone())
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(EngineConfig::default(), Evaluator::default())
    }
}
