// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Temporal function implementations
//!
//! - NOW: current UTC timestamp
//! - TO_TIMESTAMP: parses RFC 3339 strings, `YYYY-MM-DD` dates, or epoch seconds

use super::function_trait::{Function, FunctionContext, FunctionError, FunctionResult};
use crate::types::Value;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};

#[derive(Debug)]
pub struct NowFunction;

impl NowFunction {
    pub fn new() -> Self {
        Self
    }
}

impl Function for NowFunction {
    fn name(&self) -> &str {
        "NOW"
    }

    fn description(&self) -> &str {
        "Returns the current UTC timestamp"
    }

    fn argument_count(&self) -> usize {
        0
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        context.validate_argument_count(0)?;
        Ok(Value::Time(Utc::now()))
    }

    fn return_type(&self) -> &str {
        "Time"
    }
}

#[derive(Debug)]
pub struct ToTimestampFunction;

impl ToTimestampFunction {
    pub fn new() -> Self {
        Self
    }

    fn parse(text: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.with_timezone(&Utc));
        }
        let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
        Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?))
    }
}

impl Function for ToTimestampFunction {
    fn name(&self) -> &str {
        "TO_TIMESTAMP"
    }

    fn description(&self) -> &str {
        "Converts a string or epoch seconds into a timestamp"
    }

    fn argument_count(&self) -> usize {
        1
    }

    fn execute(&self, context: &FunctionContext) -> FunctionResult<Value> {
        context.validate_argument_count(1)?;
        match context.get_argument(0)? {
            Value::Null => Ok(Value::Null),
            Value::Time(t) => Ok(Value::Time(*t)),
            Value::Int(secs) => Utc
                .timestamp_opt(*secs, 0)
                .single()
                .map(Value::Time)
                .ok_or_else(|| FunctionError::ExecutionError {
                    message: format!("epoch seconds out of range: {}", secs),
                }),
            Value::String(s) => Self::parse(s.trim())
                .map(Value::Time)
                .ok_or_else(|| FunctionError::InvalidArgumentType {
                    message: format!("cannot parse '{}' as a timestamp", s),
                }),
            other => Err(FunctionError::InvalidArgumentType {
                message: format!("TO_TIMESTAMP cannot convert {}", other.type_name()),
            }),
        }
    }

    fn return_type(&self) -> &str {
        "Time"
    }
}
