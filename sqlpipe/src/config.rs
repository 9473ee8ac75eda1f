// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Engine configuration

use crate::exec::error::ExecutionError;
use serde::{Deserialize, Serialize};

/// Per-statement execution settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Capacity of every inter-task message channel
    pub channel_capacity: usize,

    /// Ceiling on state held by a materializing operator: buffered rows for
    /// order and each join side, distinct groups for group by
    pub max_buffered_rows: Option<usize>,

    /// Log every row dropped by a filter or key evaluation failure
    pub log_dropped_rows: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 100,
            max_buffered_rows: None,
            log_dropped_rows: false,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, ExecutionError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ExecutionError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_max_buffered_rows(mut self, limit: usize) -> Self {
        self.max_buffered_rows = Some(limit);
        self
    }

    pub fn with_log_dropped_rows(mut self, enabled: bool) -> Self {
        self.log_dropped_rows = enabled;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ExecutionError> {
        if self.channel_capacity == 0 {
            return Err(ExecutionError::ConfigError(
                "channel_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_buffered_rows == Some(0) {
            return Err(ExecutionError::ConfigError(
                "max_buffered_rows must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.channel_capacity, 100);
        assert_eq!(config.max_buffered_rows, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = EngineConfig::from_json(r#"{"max_buffered_rows": 10}"#).unwrap();
        assert_eq!(config.channel_capacity, 100);
        assert_eq!(config.max_buffered_rows, Some(10));
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = EngineConfig::from_json(r#"{"channel_capacity": 0}"#).unwrap_err();
        assert!(matches!(err, ExecutionError::ConfigError(_)));
        assert!(EngineConfig::from_json("not json").is_err());
    }
}
