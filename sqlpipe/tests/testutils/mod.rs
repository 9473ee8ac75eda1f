//! Test utilities for sqlpipe integration tests
//!
//! `TestFixture` owns an in-memory database and the registry routing every
//! table to it. The `plans` helpers build the plan trees a planner would
//! hand to the engine.

#![allow(dead_code)]

pub mod plans;
pub mod test_fixture;
