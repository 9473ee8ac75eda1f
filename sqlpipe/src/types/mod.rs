// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Value types shared by the evaluator, the operators and the backends

pub mod value;

pub use value::Value;
